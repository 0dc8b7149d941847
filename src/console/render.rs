use anyhow::Error;
use colored::*;

use crate::agents::AgentError;
use crate::llm::{LlmError, ModelInfo};
use crate::rag::RagError;
use crate::types::{IngestReport, PlanStep, RunOutcome, RunReport, StepStatus, ToolLoopOutcome};

const RULE: &str = "─────────────────────────────────────────────────────────────";

pub fn display_welcome() {
    println!("{}", "🤖 Codebase Assistant".bright_blue().bold());
    println!(
        "{}",
        "Entering interactive chat mode. Questions are answered from the ingested codebase only."
            .blue()
    );
    println!("{}", "Type 'exit' to end.\n".blue());
}

pub fn display_loading() {
    println!("{}", "🔄 Searching the codebase...".blue().italic());
}

pub fn display_goal(goal: &str) {
    println!("\n{}", "🚀 Autonomous AI Engineer".bright_blue().bold());
    println!("{} {}", "🎯 Goal:".yellow(), goal.bright_white());
}

pub fn display_no_plan() {
    println!(
        "{}",
        "⚠️ Could not generate a plan. Shutting down.".bright_yellow().bold()
    );
}

pub fn display_plan(plan: &[PlanStep]) {
    println!("\n{}", "🗒️  Plan".bright_yellow().bold());
    println!("{}", format!("┌{RULE}").yellow());
    for (idx, step) in plan.iter().enumerate() {
        println!("{} {}", format!("│ Step {}:", idx + 1).yellow(), step.to_string().white());
    }
    println!("{}", format!("└{RULE}\n").yellow());
}

pub fn display_step_header(index: usize, total: usize, step: &PlanStep) {
    println!(
        "\n{} {}",
        format!("🛠️  Executing step {index} of {total}:").bright_cyan().bold(),
        step.to_string().bright_white()
    );
}

pub fn display_unknown_tool(tool: &str) {
    println!(
        "{} {}",
        "❌ Tool not found:".bright_red().bold(),
        tool.red()
    );
}

pub fn display_observation(observation: &str) {
    println!("{}", "│ 👀 Observation:".cyan());
    for line in observation.lines() {
        println!("│   {}", line.white());
    }
}

pub fn display_run_summary(report: &RunReport) {
    let outcome = report.outcome.to_string();
    let outcome = match report.outcome {
        RunOutcome::Completed => outcome.bright_green().bold(),
        RunOutcome::Exhausted => outcome.bright_yellow().bold(),
        RunOutcome::NoPlan | RunOutcome::Aborted => outcome.bright_red().bold(),
    };
    println!("\n{}", "🧪 Run Summary".bright_magenta().bold());
    println!("{}", format!("┌{RULE}").magenta());
    println!("{} {}", "│ 🆔 Run ID:".magenta(), report.run_id.to_string().bright_white());
    println!("{} {}", "│ ⚖️  Outcome:".magenta(), outcome);
    println!(
        "{} {} of {}",
        "│ 🔢 Steps run:".magenta(),
        report.steps.len(),
        report.plan.len()
    );
    for step in &report.steps {
        let icon = match step.status {
            StepStatus::Completed => "✔".bright_green(),
            StepStatus::Executed => "•".white(),
            StepStatus::UnknownTool => "✖".bright_red(),
        };
        println!("│   {} {}. {}", icon, step.index, step.tool.bright_white());
    }
    println!("{}", format!("└{RULE}\n").magenta());
    if report.outcome == RunOutcome::Completed {
        println!("{}", "✅ Goal has been successfully completed!".bright_green().bold());
    }
}

pub fn display_answer(answer: &str) {
    println!("\n{}\n", "--- AI's Answer ---".bright_green().bold());
    println!("{}", answer);
    println!("\n{}\n", "---------------------".bright_green());
}

pub fn display_tool_loop_outcome(outcome: &ToolLoopOutcome) {
    println!(
        "{} {}",
        "✅ Task finished".bright_green().bold(),
        format!("({} tool calls, {} turns)", outcome.tool_calls, outcome.turns).white()
    );
    display_answer(&outcome.answer);
}

pub fn display_ingest_report(report: &IngestReport) {
    println!("\n{}", "📚 Ingestion complete!".bright_green().bold());
    println!("{} {}", "│ 📄 Files processed:".green(), report.files_processed);
    if report.files_failed > 0 {
        println!("{} {}", "│ ⚠️  Files failed:".yellow(), report.files_failed);
    }
    println!("{} {}", "│ 🧩 Chunks added:".green(), report.chunks_added);
    println!(
        "{} {}",
        "│ 🗃️  Total documents in collection:".green(),
        report.total_documents
    );
}

pub fn display_models(models: &[ModelInfo]) {
    println!("\n{}", "--- Available Models ---".bright_blue().bold());
    if models.is_empty() {
        println!("{}", "No models were found.".yellow());
    }
    for model in models {
        match &model.owned_by {
            Some(owner) => println!("{} {}", model.id.bright_white(), format!("({owner})").white()),
            None => println!("{}", model.id.bright_white()),
        }
    }
    println!("{}", "------------------------".bright_blue());
}

/// Which endpoint family an LLM failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LlmOrigin {
    /// Planner, supervisor or function-calling agent
    Agent,
    /// Ingestion or codebase questions, where the embedding endpoint is usually at fault
    Retrieval,
    Direct,
}

/// The LLM failure behind an error, looking through agent and retrieval wrappers.
fn find_llm_error(error: &Error) -> Option<(&LlmError, LlmOrigin)> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<LlmError>() {
            return Some((e, LlmOrigin::Direct));
        }
        match cause.downcast_ref::<AgentError>() {
            Some(AgentError::Llm(e)) => return Some((e, LlmOrigin::Agent)),
            Some(_) => return None,
            None => {}
        }
        match cause.downcast_ref::<RagError>() {
            Some(RagError::Llm(e)) => Some((e, LlmOrigin::Retrieval)),
            _ => None,
        }
    })
}

pub fn display_error(error: &Error) {
    if let Some((llm_error, origin)) = find_llm_error(error) {
        display_llm_error(llm_error, origin);
    } else {
        println!(
            "{} {}",
            "❌ Error:".bright_red().bold(),
            format!("{error:#}").red()
        );
        println!(
            "{}",
            "Please check your configuration and try again.\n".red()
        );
    }
}

fn llm_error_tip(error: &LlmError, origin: LlmOrigin) -> &'static str {
    let retrieval = origin == LlmOrigin::Retrieval;
    match error {
        LlmError::ServerBusy => "Try again in a few minutes when server load is lower.",
        LlmError::NetworkError { .. } if retrieval => {
            "Check EMBEDDING_BASE_URL and that the embedding server is reachable."
        }
        LlmError::NetworkError { .. } => {
            "Check DEEPSEEK_BASE_URL, your internet connection and firewall settings."
        }
        LlmError::Timeout { .. } => {
            "Raise DEEPSEEK_TIMEOUT; reasoning models used as supervisor can take minutes to answer."
        }
        LlmError::ApiError { status: 401 | 403, .. } if retrieval => {
            "Check EMBEDDING_API_KEY (it falls back to DEEPSEEK_API_KEY when unset)."
        }
        LlmError::ApiError { status: 401 | 403, .. } => {
            "Check DEEPSEEK_API_KEY in your environment or .env file."
        }
        LlmError::ApiError { status: 404, .. } if retrieval => {
            "Check EMBEDDING_MODEL and EMBEDDING_BASE_URL against `models` on that endpoint."
        }
        LlmError::ApiError { status: 404, .. } if origin == LlmOrigin::Agent => {
            "Check DEEPSEEK_MODEL and SUPERVISOR_MODEL; `autonomous-engineer models` lists what is served."
        }
        LlmError::ApiError { status: 404, .. } => {
            "Check DEEPSEEK_MODEL and DEEPSEEK_BASE_URL; `autonomous-engineer models` lists what is served."
        }
        LlmError::ApiError { .. } => "Check the provider's API documentation for more details.",
        LlmError::ParseError { .. } if retrieval => {
            "The embeddings response was not OpenAI-compatible. Check EMBEDDING_BASE_URL."
        }
        LlmError::ParseError { .. } => {
            "The model reply was not OpenAI-compatible. Check DEEPSEEK_BASE_URL."
        }
        LlmError::ConfigError { .. } => "Check your environment variables and configuration.",
    }
}

fn display_llm_error(error: &LlmError, origin: LlmOrigin) {
    let user_message = error.user_message();
    let tip = format!("💡 Tip: {}", llm_error_tip(error, origin));
    match error {
        LlmError::ServerBusy | LlmError::Timeout { .. } => {
            println!("{}", user_message.bright_yellow().bold());
            println!("{}", tip.yellow());
        }
        LlmError::ParseError { .. } => {
            println!("{}", user_message.bright_magenta().bold());
            println!("{}", tip.magenta());
        }
        _ => {
            println!("{}", user_message.bright_red().bold());
            println!("{}", tip.red());
        }
    }
    println!();
}

pub fn display_goodbye() {
    println!("{}", "👋 Goodbye!".bright_yellow().bold());
}
