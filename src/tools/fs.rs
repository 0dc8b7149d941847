use async_trait::async_trait;
use tokio::fs;

use super::{Param, Tool, ToolArgs, ToolError, Workspace, required_str};

pub struct ReadFile {
    workspace: Workspace,
}

impl ReadFile {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Reads the content of a specified file."
    }

    fn params(&self) -> &'static [Param] {
        &[Param {
            name: "filepath",
            description: "Path of the file to read",
        }]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let filepath = required_str(args, "filepath")?;
        Ok(fs::read_to_string(self.workspace.resolve(filepath)).await?)
    }
}

pub struct WriteFile {
    workspace: Workspace,
}

impl WriteFile {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Writes content to a specified file, creating parent directories as needed."
    }

    fn params(&self) -> &'static [Param] {
        &[
            Param {
                name: "filepath",
                description: "Path of the file to write",
            },
            Param {
                name: "content",
                description: "Full content to write to the file",
            },
        ]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let filepath = required_str(args, "filepath")?;
        let content = required_str(args, "content")?;

        let target = self.workspace.resolve(filepath);
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, content).await?;
        Ok(format!("Success: Content written to '{filepath}'."))
    }
}

pub struct ListDirectory {
    workspace: Workspace,
}

impl ListDirectory {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "Lists the files and directories in a specified path."
    }

    fn params(&self) -> &'static [Param] {
        &[Param {
            name: "path",
            description: "Directory to list",
        }]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let path = required_str(args, "path")?;
        let dir = self.workspace.resolve(path);

        if !fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(format!("Error: '{path}' is not a valid directory."));
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        if names.is_empty() {
            return Ok(format!("The directory '{path}' is empty."));
        }
        Ok(format!("Contents of '{path}':\n- {}", names.join("\n- ")))
    }
}
