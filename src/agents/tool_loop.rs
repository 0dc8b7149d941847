use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::llm::{ChatMessage, LlmClient, ToolCall};
use crate::tools::{ToolArgs, ToolRegistry};
use crate::types::ToolLoopOutcome;

use super::{Agent, AgentError};

/// Lets the model call tools natively until it answers in plain text.
#[derive(Clone)]
pub struct FunctionCallingAgent {
    client: LlmClient,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl FunctionCallingAgent {
    pub fn new(client: LlmClient, tools: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        Self {
            client,
            tools,
            max_iterations,
        }
    }

    async fn run_call(&self, call: &ToolCall) -> Result<String, AgentError> {
        let name = call.function.name.as_str();
        if !self.tools.contains(name) {
            return Err(AgentError::UnknownTool(name.to_string()));
        }

        let raw_args = if call.function.arguments.trim().is_empty() {
            "{}"
        } else {
            call.function.arguments.as_str()
        };
        let result = match serde_json::from_str::<ToolArgs>(raw_args) {
            Ok(args) => {
                info!("  - Calling: {}({})", name, raw_args);
                self.tools
                    .invoke(name, &args)
                    .await
                    .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?
            }
            Err(e) => format!("Error: invalid arguments for '{name}': {e}"),
        };
        Ok(json!({ "result": result }).to_string())
    }
}

#[async_trait]
impl Agent for FunctionCallingAgent {
    type Input = String;
    type Output = ToolLoopOutcome;

    async fn execute(&self, task: &Self::Input) -> Result<Self::Output, AgentError> {
        info!("FunctionCallingAgent: running task");
        let definitions = self.tools.function_definitions();
        let mut messages = vec![ChatMessage::user(task.clone())];
        let mut tool_calls = 0;

        for turn in 1..=self.max_iterations {
            let reply = self.client.chat_with_tools(&messages, &definitions).await?;

            if !reply.has_tool_calls() {
                info!("FunctionCallingAgent: task finished after {} turns", turn);
                return Ok(ToolLoopOutcome {
                    answer: reply.text(),
                    tool_calls,
                    turns: turn,
                });
            }
            let calls = reply.tool_calls.clone().unwrap_or_default();

            info!(
                "FunctionCallingAgent: model wants to call {} tool(s)",
                calls.len()
            );
            messages.push(reply);
            for call in &calls {
                let content = self.run_call(call).await?;
                messages.push(ChatMessage::tool_result(call.id.clone(), content));
                tool_calls += 1;
            }
        }

        Err(AgentError::IterationLimit(self.max_iterations))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::SandboxConfig;
    use crate::llm::test_support::{chat_response, config_for};
    use crate::tools::Workspace;

    fn tool_call_response(name: &str, arguments: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": name, "arguments": arguments }
                    }]
                }
            }]
        }))
    }

    fn agent(server: &MockServer, dir: &std::path::Path, max_iterations: usize) -> FunctionCallingAgent {
        let tools = ToolRegistry::function_calling(Workspace::new(dir), SandboxConfig::default());
        FunctionCallingAgent::new(
            LlmClient::new(config_for(&server.uri())).unwrap(),
            Arc::new(tools),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn executes_tool_then_returns_answer() {
        let server = MockServer::start().await;
        // Follow-up request carries the tool result and takes priority over the first reply
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(r#""role":"tool""#))
            .respond_with(chat_response("Created notes.txt"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(tool_call_response(
                "write_file",
                r#"{"filepath":"notes.txt","content":"remember"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let outcome = agent(&server, dir.path(), 5)
            .execute(&"write a note".to_string())
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Created notes.txt");
        assert_eq!(outcome.tool_calls, 1);
        assert_eq!(outcome.turns, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "remember"
        );
    }

    #[tokio::test]
    async fn unknown_tool_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(tool_call_response("format_disk", "{}"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = agent(&server, dir.path(), 5)
            .execute(&"anything".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "format_disk"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_to_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("invalid arguments for 'read_file'"))
            .respond_with(chat_response("Sorry, I sent bad arguments."))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(tool_call_response("read_file", "{not json"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let outcome = agent(&server, dir.path(), 5)
            .execute(&"read something".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Sorry, I sent bad arguments.");
    }

    #[tokio::test]
    async fn stops_at_iteration_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(tool_call_response("list_directory", r#"{"path":"."}"#))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = agent(&server, dir.path(), 2)
            .execute(&"loop forever".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::IterationLimit(2)));
    }
}
