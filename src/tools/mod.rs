//! The agent's toolbox: file helpers, sandboxed execution and image analysis.
//!
//! Every tool reports failures as an observation string rather than aborting the
//! caller, so a plan can keep going after a bad step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue, json};
use thiserror::Error;

use crate::config::SandboxConfig;
use crate::llm::{FunctionDefinition, LlmClient, LlmError, ToolDefinition};

mod fs;
mod sandbox;
mod vision;

pub use fs::{ListDirectory, ReadFile, WriteFile};
pub use sandbox::{ExecutePythonCode, ExecuteShellCommand, Sandbox};
pub use vision::AnalyzeImage;

/// Arguments passed to a tool, keyed by parameter name.
pub type ToolArgs = Map<String, JsonValue>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{0}' must be a string")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Sandbox(String),

    #[error("{0}")]
    Vision(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ToolError {
    /// Render the error the way it is fed back to the model.
    pub fn observation(&self) -> String {
        match self {
            ToolError::Sandbox(message) => format!("Docker Error: {message}"),
            ToolError::Vision(message) => format!("Error analyzing image: {message}"),
            ToolError::Llm(e) => format!("Error analyzing image: {e}"),
            other => format!("Error: {other}"),
        }
    }
}

/// A named string parameter of a tool.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub description: &'static str,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn params(&self) -> &'static [Param];
    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError>;

    /// Human-readable signature, e.g. `write_file(filepath: string, content: string)`.
    fn signature(&self) -> String {
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|p| format!("{}: string", p.name))
            .collect();
        format!("{}({})", self.name(), params.join(", "))
    }
}

pub(crate) fn required_str<'a>(args: &'a ToolArgs, name: &str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        None | Some(JsonValue::Null) => Err(ToolError::MissingArgument(name.to_string())),
        Some(JsonValue::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ToolError::InvalidArgument(name.to_string())),
    }
}

/// Resolves user-supplied paths against the agent's working directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn current() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

/// Ordered mapping from tool name to implementation.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<&'static str>,
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tools available to the planner: file I/O, shell in a container, image analysis.
    pub fn senior(workspace: Workspace, sandbox: SandboxConfig, vision: LlmClient) -> Self {
        let sandbox = Sandbox::new(sandbox, workspace.clone());
        Self::new()
            .with(ReadFile::new(workspace.clone()))
            .with(WriteFile::new(workspace.clone()))
            .with(ListDirectory::new(workspace.clone()))
            .with(ExecuteShellCommand::new(sandbox))
            .with(AnalyzeImage::new(vision, workspace))
    }

    /// Tools exposed through native function calling.
    pub fn function_calling(workspace: Workspace, sandbox: SandboxConfig) -> Self {
        let sandbox = Sandbox::new(sandbox, workspace.clone());
        Self::new()
            .with(ReadFile::new(workspace.clone()))
            .with(WriteFile::new(workspace.clone()))
            .with(ListDirectory::new(workspace))
            .with(ExecutePythonCode::new(sandbox))
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// One line per tool: ``- `signature`: description``.
    pub fn describe(&self) -> String {
        self.iter()
            .map(|tool| format!("- `{}`: {}\n", tool.signature(), tool.description()))
            .collect()
    }

    pub fn function_definitions(&self) -> Vec<ToolDefinition> {
        self.iter()
            .map(|tool| {
                let properties: Map<String, JsonValue> = tool
                    .params()
                    .iter()
                    .map(|p| {
                        (
                            p.name.to_string(),
                            json!({ "type": "string", "description": p.description }),
                        )
                    })
                    .collect();
                let required: Vec<&str> = tool.params().iter().map(|p| p.name).collect();
                ToolDefinition {
                    tool_type: "function".to_string(),
                    function: FunctionDefinition {
                        name: tool.name().to_string(),
                        description: tool.description().to_string(),
                        parameters: json!({
                            "type": "object",
                            "properties": properties,
                            "required": required,
                        }),
                    },
                }
            })
            .collect()
    }

    /// Run a tool and turn its result into an observation. `None` if the tool is unknown.
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> Option<String> {
        let tool = self.tools.get(name)?;
        tracing::debug!(tool = name, "invoking tool");
        let observation = match tool.call(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool failed");
                e.observation()
            }
        };
        Some(observation)
    }
}
