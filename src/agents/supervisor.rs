use async_trait::async_trait;
use tracing::info;

use crate::llm::{ChatMessage, LlmClient};
use crate::types::{Plan, SupervisorVerdict};

use super::{Agent, AgentError};

/// Judges after each step whether the goal has been reached.
#[derive(Clone)]
pub struct SupervisorAgent {
    client: LlmClient,
}

impl SupervisorAgent {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

pub struct CompletionCheck {
    pub goal: String,
    pub plan: Plan,
    pub observation: String,
}

fn build_prompt(check: &CompletionCheck) -> Result<String, AgentError> {
    let plan = serde_json::to_string(&check.plan)?;
    Ok(format!(
        r#"
As a supervisor, your job is to determine if the original goal has been fully achieved.
- Original Goal: "{}"
- The Full Plan: {}
- The result of the last executed step was: "{}"
Based on the result of the last step, has the original goal been fully completed? The goal is complete only if the final step of the plan was a test that produced a successful result. Respond with only "YES" or "NO".
"#,
        check.goal, plan, check.observation
    ))
}

/// Any occurrence of an upper-case `YES` counts as completion.
pub fn interpret(reply: &str) -> bool {
    reply.contains("YES")
}

#[async_trait]
impl Agent for SupervisorAgent {
    type Input = CompletionCheck;
    type Output = SupervisorVerdict;

    async fn execute(&self, check: &Self::Input) -> Result<Self::Output, AgentError> {
        info!("SupervisorAgent: checking if goal is complete");
        let prompt = build_prompt(check)?;
        let raw = self.client.chat_text(&[ChatMessage::user(prompt)]).await?;
        let complete = interpret(&raw);
        info!("SupervisorAgent: complete={}", complete);
        Ok(SupervisorVerdict { complete, raw })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer};

    use super::*;
    use crate::llm::test_support::{chat_response, config_for};
    use crate::types::PlanStep;

    fn check() -> CompletionCheck {
        CompletionCheck {
            goal: "make tests pass".to_string(),
            plan: vec![PlanStep {
                tool: "execute_shell_command".to_string(),
                args: serde_json::from_str(r#"{"command":"pytest"}"#).unwrap(),
            }],
            observation: "3 passed".to_string(),
        }
    }

    #[test]
    fn yes_detection_is_case_sensitive_substring() {
        assert!(interpret("YES"));
        assert!(interpret("YES."));
        assert!(interpret("Answer: YES"));
        assert!(!interpret("NO"));
        assert!(!interpret("yes"));
    }

    #[test]
    fn prompt_carries_goal_plan_and_observation() {
        let prompt = build_prompt(&check()).unwrap();
        assert!(prompt.contains(r#"Original Goal: "make tests pass""#));
        assert!(prompt.contains(r#""tool":"execute_shell_command""#));
        assert!(prompt.contains(r#"last executed step was: "3 passed""#));
    }

    #[tokio::test]
    async fn execute_returns_verdict_with_raw_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("As a supervisor"))
            .respond_with(chat_response("YES"))
            .expect(1)
            .mount(&server)
            .await;

        let supervisor = SupervisorAgent::new(LlmClient::new(config_for(&server.uri())).unwrap());
        let verdict = supervisor.execute(&check()).await.unwrap();
        assert!(verdict.complete);
        assert_eq!(verdict.raw, "YES");
    }
}
