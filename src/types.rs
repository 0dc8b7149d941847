use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// One tool invocation proposed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, JsonValue>,
}

impl std::fmt::Display for PlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.tool, JsonValue::Object(self.args.clone()))
    }
}

pub type Plan = Vec<PlanStep>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorVerdict {
    pub complete: bool,
    /// Unmodified supervisor reply
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Tool ran, supervisor judged the goal not yet met
    Executed,
    /// Tool ran and the supervisor declared the goal complete
    Completed,
    UnknownTool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub tool: String,
    pub args: Map<String, JsonValue>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<SupervisorVerdict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Every step ran without the supervisor confirming completion
    Exhausted,
    NoPlan,
    /// The supervisor could not be reached; the report covers the steps run so far
    Aborted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Exhausted => "exhausted",
            RunOutcome::NoPlan => "no_plan",
            RunOutcome::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub goal: String,
    pub plan: Plan,
    pub steps: Vec<StepRecord>,
    pub outcome: RunOutcome,
    pub started_at: String,  // RFC3339
    pub finished_at: String, // RFC3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final answer of a function-calling session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLoopOutcome {
    pub answer: String,
    pub tool_calls: usize,
    pub turns: usize,
}

/// Summary of a codebase ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_added: usize,
    pub total_documents: usize,
}
