mod agents;
mod config;
mod console;
mod llm;
mod orchestrator;
mod rag;
mod tools;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use crate::agents::{Agent, FunctionCallingAgent, PlannerAgent, SupervisorAgent};
use crate::config::AppConfig;
use crate::console::Console;
use crate::llm::LlmClient;
use crate::orchestrator::Orchestrator;
use crate::rag::{CodebaseAssistant, JsonVectorStore};
use crate::tools::{ToolRegistry, Workspace};

#[derive(Debug, Parser)]
#[command(name = "autonomous-engineer", about = "An autonomous AI software engineer.")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan tool calls for a goal, execute them and stop once a supervisor confirms success
    Run {
        /// The high-level goal
        goal: String,

        /// Directory for the run report
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Directory the tools operate in (defaults to the current directory)
        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// Let the model call tools directly until it answers
    Chat {
        /// The task for the agent
        task: String,

        #[arg(long)]
        workdir: Option<PathBuf>,
    },

    /// Ingest a codebase into the vector database
    Ingest {
        /// The path to the codebase directory to ingest
        path: PathBuf,
    },

    /// Ask a question about the ingested codebase. Without a question, enters interactive chat mode
    Query { question: Option<String> },

    /// List the models available on the configured endpoint
    Models,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // logging
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter_layer).init();

    if let Err(e) = run(args).await {
        Console::display_error(&e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = AppConfig::load()?;

    match args.command {
        Command::Run {
            goal,
            out_dir,
            workdir,
        } => {
            tracing::info!("Initializing autonomous AI engineer");
            let workspace = workspace(workdir)?;
            let tools = Arc::new(ToolRegistry::senior(
                workspace,
                cfg.sandbox.clone(),
                LlmClient::new(cfg.vision.clone())?,
            ));
            let planner = PlannerAgent::new(LlmClient::new(cfg.llm.clone())?, &tools);
            let supervisor = SupervisorAgent::new(LlmClient::new(cfg.supervisor())?);

            let report_path = out_dir.join("run_report.json");
            let report = Orchestrator::new(planner, supervisor, tools)
                .with_report_path(report_path.clone())
                .run(&goal)
                .await?;
            tracing::info!("Run finished with outcome {}", report.outcome);
            println!("Artifacts:\n  {}", report_path.display());
        }
        Command::Chat { task, workdir } => {
            let tools = Arc::new(ToolRegistry::function_calling(
                workspace(workdir)?,
                cfg.sandbox.clone(),
            ));
            let agent = FunctionCallingAgent::new(
                LlmClient::new(cfg.llm.clone())?,
                tools,
                cfg.max_tool_iterations,
            );
            let outcome = agent.execute(&task).await?;
            Console::display_tool_loop_outcome(&outcome);
        }
        Command::Ingest { path } => {
            let mut assistant = assistant(&cfg).await?;
            let report = assistant.ingest(&path).await?;
            Console::display_ingest_report(&report);
        }
        Command::Query { question } => {
            let assistant = assistant(&cfg).await?;
            match question {
                Some(question) => {
                    let answer = assistant.query(&question).await?;
                    Console::display_answer(&answer);
                }
                None => Console::run_query_chat(&assistant).await?,
            }
        }
        Command::Models => {
            let client = LlmClient::new(cfg.llm.clone())?;
            let models = client.list_models().await?;
            Console::display_models(&models);
        }
    }

    Ok(())
}

fn workspace(workdir: Option<PathBuf>) -> Result<Workspace> {
    Ok(match workdir {
        Some(dir) => Workspace::new(std::path::absolute(dir)?),
        None => Workspace::current()?,
    })
}

async fn assistant(cfg: &AppConfig) -> Result<CodebaseAssistant<JsonVectorStore>> {
    let store = JsonVectorStore::open(&cfg.store.db_path, &cfg.store.collection).await?;
    tracing::info!("Using vector store at {}", store.path().display());
    Ok(CodebaseAssistant::new(
        LlmClient::new(cfg.llm.clone())?,
        LlmClient::new(cfg.embedding.clone())?,
        store,
    ))
}
