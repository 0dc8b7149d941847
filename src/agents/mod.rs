use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Could not parse a plan from the model response: {0}")]
    PlanParse(String),
    #[error("Tool '{0}' not found")]
    UnknownTool(String),
    #[error("No final answer after {0} model turns")]
    IterationLimit(usize),
}

#[async_trait]
pub trait Agent {
    type Input: Send + Sync;
    type Output: Send + Sync;
    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, AgentError>;
}

pub mod planner;
pub mod supervisor;
pub mod tool_loop;

pub use planner::PlannerAgent;
pub use supervisor::{CompletionCheck, SupervisorAgent};
pub use tool_loop::FunctionCallingAgent;
