use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{Agent, CompletionCheck, PlannerAgent, SupervisorAgent};
use crate::console::Console;
use crate::tools::ToolRegistry;
use crate::types::{RunOutcome, RunReport, StepRecord, StepStatus};

/// Plan, execute step by step, and stop as soon as the supervisor is satisfied.
pub struct Orchestrator {
    planner: PlannerAgent,
    supervisor: SupervisorAgent,
    tools: Arc<ToolRegistry>,
    report_path: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(planner: PlannerAgent, supervisor: SupervisorAgent, tools: Arc<ToolRegistry>) -> Self {
        Self {
            planner,
            supervisor,
            tools,
            report_path: None,
        }
    }

    /// Also write the final report as pretty JSON to `path`.
    pub fn with_report_path(mut self, path: PathBuf) -> Self {
        self.report_path = Some(path);
        self
    }

    pub async fn run(&self, goal: &str) -> Result<RunReport> {
        let started_at = Utc::now().to_rfc3339();
        let run_id = Uuid::new_v4();
        info!("Run {}: generating plan", run_id);
        Console::display_goal(goal);

        let plan = match self.planner.execute(&goal.to_string()).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Planning failed: {}", e);
                Vec::new()
            }
        };

        let mut report = RunReport {
            run_id,
            goal: goal.to_string(),
            plan: plan.clone(),
            steps: Vec::new(),
            outcome: RunOutcome::Exhausted,
            started_at,
            finished_at: String::new(),
            error: None,
        };

        if plan.is_empty() {
            Console::display_no_plan();
            report.outcome = RunOutcome::NoPlan;
            return self.finish(report).await;
        }

        Console::display_plan(&plan);

        let total = plan.len();
        for (idx, step) in plan.iter().enumerate() {
            let index = idx + 1;
            Console::display_step_header(index, total, step);

            let Some(observation) = self.tools.invoke(&step.tool, &step.args).await else {
                error!("Tool '{}' not found", step.tool);
                Console::display_unknown_tool(&step.tool);
                report.steps.push(StepRecord {
                    index,
                    tool: step.tool.clone(),
                    args: step.args.clone(),
                    status: StepStatus::UnknownTool,
                    observation: None,
                    verdict: None,
                });
                continue;
            };
            Console::display_observation(&observation);

            let check = CompletionCheck {
                goal: goal.to_string(),
                plan: plan.clone(),
                observation: observation.clone(),
            };
            let verdict = match self.supervisor.execute(&check).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!("Supervisor failed at step {}: {}", index, e);
                    report.steps.push(StepRecord {
                        index,
                        tool: step.tool.clone(),
                        args: step.args.clone(),
                        status: StepStatus::Executed,
                        observation: Some(observation),
                        verdict: None,
                    });
                    report.outcome = RunOutcome::Aborted;
                    report.error = Some(e.to_string());
                    self.finish(report).await?;
                    return Err(e.into());
                }
            };
            let complete = verdict.complete;

            report.steps.push(StepRecord {
                index,
                tool: step.tool.clone(),
                args: step.args.clone(),
                status: if complete {
                    StepStatus::Completed
                } else {
                    StepStatus::Executed
                },
                observation: Some(observation),
                verdict: Some(verdict),
            });

            if complete {
                info!("Supervisor: goal completed at step {} of {}", index, total);
                report.outcome = RunOutcome::Completed;
                break;
            }
        }

        self.finish(report).await
    }

    async fn finish(&self, mut report: RunReport) -> Result<RunReport> {
        report.finished_at = Utc::now().to_rfc3339();
        Console::display_run_summary(&report);

        if let Some(path) = &self.report_path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let pretty = serde_json::to_string_pretty(&report)?;
            tokio::fs::write(path, pretty).await?;
            info!("Saved run report to {}", path.display());
        }
        Ok(report)
    }
}
