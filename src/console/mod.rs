use anyhow::{Error, Result};
use colored::*;
use tokio::select;

use crate::llm::ModelInfo;
use crate::rag::{CodebaseAssistant, VectorStore};
use crate::types::{IngestReport, PlanStep, RunReport, ToolLoopOutcome};

mod input;
mod render;

/// Terminal front-end for the agents and the codebase assistant
pub struct Console;

impl Console {
    pub fn display_welcome() {
        render::display_welcome();
    }

    /// Get user input from the console (async)
    pub async fn get_user_input() -> Result<String> {
        input::get_user_input().await
    }

    /// Check if the input is a quit command
    pub fn is_quit_command(input_text: &str) -> bool {
        input::is_quit_command(input_text)
    }

    pub fn display_loading() {
        render::display_loading();
    }

    pub fn display_goal(goal: &str) {
        render::display_goal(goal);
    }

    pub fn display_no_plan() {
        render::display_no_plan();
    }

    pub fn display_plan(plan: &[PlanStep]) {
        render::display_plan(plan);
    }

    pub fn display_step_header(index: usize, total: usize, step: &PlanStep) {
        render::display_step_header(index, total, step);
    }

    pub fn display_unknown_tool(tool: &str) {
        render::display_unknown_tool(tool);
    }

    pub fn display_observation(observation: &str) {
        render::display_observation(observation);
    }

    pub fn display_run_summary(report: &RunReport) {
        render::display_run_summary(report);
    }

    pub fn display_answer(answer: &str) {
        render::display_answer(answer);
    }

    pub fn display_tool_loop_outcome(outcome: &ToolLoopOutcome) {
        render::display_tool_loop_outcome(outcome);
    }

    pub fn display_ingest_report(report: &IngestReport) {
        render::display_ingest_report(report);
    }

    pub fn display_models(models: &[ModelInfo]) {
        render::display_models(models);
    }

    /// Display an error message with context-aware messaging
    pub fn display_error(error: &Error) {
        render::display_error(error);
    }

    pub fn display_goodbye() {
        render::display_goodbye();
    }

    /// Interactive question loop over an ingested codebase. Ends on a quit command or Ctrl+C.
    pub async fn run_query_chat<S: VectorStore>(assistant: &CodebaseAssistant<S>) -> Result<()> {
        Self::display_welcome();

        loop {
            select! {
                _ = tokio::signal::ctrl_c() => {
                    Self::display_goodbye();
                    break;
                }
                input_result = Self::get_user_input() => {
                    let question = match input_result {
                        Ok(question) => question,
                        Err(e) => {
                            println!("{} {}", "Error reading input:".red(), e);
                            continue;
                        }
                    };

                    if question.is_empty() {
                        continue;
                    }

                    if Self::is_quit_command(&question) {
                        Self::display_goodbye();
                        break;
                    }

                    Self::display_loading();

                    // Allow request to be cancelled by Ctrl+C
                    select! {
                        _ = tokio::signal::ctrl_c() => {
                            println!("\n⚠️ Request cancelled by user");
                            Self::display_goodbye();
                            break;
                        }
                        result = assistant.query(&question) => {
                            match result {
                                Ok(answer) => Self::display_answer(&answer),
                                Err(e) => Self::display_error(&Error::new(e)),
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
