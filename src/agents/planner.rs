use async_trait::async_trait;
use tracing::{info, warn};

use crate::llm::{ChatMessage, LlmClient};
use crate::tools::ToolRegistry;
use crate::types::Plan;

use super::{Agent, AgentError};

const ACKNOWLEDGEMENT: &str = "OK, I will create a plan using the exact tool signatures provided.";

/// Turns a goal into an ordered list of tool calls restricted to the registry's tools.
#[derive(Clone)]
pub struct PlannerAgent {
    client: LlmClient,
    system_prompt: String,
}

impl PlannerAgent {
    pub fn new(client: LlmClient, tools: &ToolRegistry) -> Self {
        Self {
            client,
            system_prompt: build_system_prompt(tools),
        }
    }
}

fn build_system_prompt(tools: &ToolRegistry) -> String {
    format!(
        r#"
You are an expert software architect. Your only job is to create a plan of tool calls to achieve a user's goal.
The plan must ONLY use the following available tools, and you MUST use the exact argument names specified in the function signature:
{}
You MUST follow these rules:
1.  Create a realistic plan assuming all file operations happen in the current directory.
2.  The plan must include a final step to test that the goal was achieved.
3.  Respond with ONLY a valid JSON array of objects. Each object must have a "tool" key and an "args" key.
4.  Do NOT add any other text.
"#,
        tools.describe()
    )
}

/// Extract the outermost JSON array from a model reply, tolerating prose or code fences around it.
pub fn parse_plan(text: &str) -> Result<Plan, AgentError> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(AgentError::PlanParse(
            "no JSON array found in response".to_string(),
        ));
    };
    if end < start {
        return Err(AgentError::PlanParse(
            "no JSON array found in response".to_string(),
        ));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| AgentError::PlanParse(e.to_string()))
}

#[async_trait]
impl Agent for PlannerAgent {
    type Input = String;
    type Output = Plan;

    async fn execute(&self, goal: &Self::Input) -> Result<Self::Output, AgentError> {
        info!("PlannerAgent: generating plan for goal '{}'", goal);

        let messages = vec![
            ChatMessage::user(self.system_prompt.clone()),
            ChatMessage::assistant(ACKNOWLEDGEMENT),
            ChatMessage::user(goal.clone()),
        ];

        let raw = self.client.chat_text(&messages).await?;
        info!("PlannerAgent: received model response, parsing plan");
        let plan = parse_plan(&raw).inspect_err(|e| {
            warn!("PlannerAgent: {}", e);
        })?;
        info!("PlannerAgent: plan has {} steps", plan.len());
        Ok(plan)
    }
}
