use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use super::{Param, Tool, ToolArgs, ToolError, Workspace, required_str};
use crate::config::SandboxConfig;

const CONTAINER_WORKDIR: &str = "/workspace";
const CONTAINER_PREFIX: &str = "autonomous-engineer";
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A fresh container name, so a timed-out run can be removed by name.
pub fn container_name() -> String {
    format!("{CONTAINER_PREFIX}-{}", Uuid::new_v4())
}

/// Runs commands in a throwaway container.
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    workspace: Workspace,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, workspace: Workspace) -> Self {
        Self { config, workspace }
    }

    /// `run` arguments for a shell command with the workspace mounted read-write.
    pub fn shell_args(&self, name: &str, command: &str) -> Vec<String> {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "--name".into(), name.into()];
        args.push("-v".into());
        args.push(format!(
            "{}:{CONTAINER_WORKDIR}:rw",
            self.workspace.root().display()
        ));
        args.extend(["-w".into(), CONTAINER_WORKDIR.into()]);
        args.push(self.config.image.clone());
        args.extend(["/bin/sh".into(), "-c".into(), command.to_string()]);
        args
    }

    /// `run` arguments for an inline Python snippet, without any host mount.
    pub fn python_args(&self, name: &str, code: &str) -> Vec<String> {
        vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            name.into(),
            self.config.image.clone(),
            "python".into(),
            "-c".into(),
            code.to_string(),
        ]
    }

    /// Run the runtime with `args`. On timeout the container `name` is force-removed,
    /// since killing the runtime client leaves the container running.
    pub async fn run(&self, name: &str, args: Vec<String>) -> Result<String, ToolError> {
        let mut cmd = Command::new(&self.config.runtime);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Ok(output) => output.map_err(|e| {
                ToolError::Sandbox(format!("failed to run {}: {e}", self.config.runtime))
            })?,
            Err(_) => {
                self.remove_container(name).await;
                return Err(ToolError::Sandbox(format!(
                    "execution timed out after {}s",
                    self.config.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(format!("{stdout}{stderr}"))
        } else {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            Err(ToolError::Sandbox(format!(
                "command exited with status {code}: {}{}",
                stdout,
                stderr.trim_end()
            )))
        }
    }

    async fn remove_container(&self, name: &str) {
        let status = Command::new(&self.config.runtime)
            .args(["rm", "-f", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(CLEANUP_TIMEOUT, status).await {
            Ok(Ok(status)) if status.success() => {
                tracing::info!(container = name, "removed timed-out container");
            }
            Ok(Ok(status)) => {
                tracing::warn!(container = name, %status, "container removal failed");
            }
            Ok(Err(e)) => tracing::warn!(container = name, error = %e, "container removal failed"),
            Err(_) => tracing::warn!(container = name, "container removal timed out"),
        }
    }
}

pub struct ExecuteShellCommand {
    sandbox: Sandbox,
}

impl ExecuteShellCommand {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ExecuteShellCommand {
    fn name(&self) -> &'static str {
        "execute_shell_command"
    }

    fn description(&self) -> &'static str {
        "Executes a shell command in a secure container with the current directory mounted at /workspace."
    }

    fn params(&self) -> &'static [Param] {
        &[Param {
            name: "command",
            description: "Shell command to run with /bin/sh -c",
        }]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let command = required_str(args, "command")?;
        tracing::info!(%command, "executing shell command in sandbox");
        let name = container_name();
        self.sandbox.run(&name, self.sandbox.shell_args(&name, command)).await
    }
}

pub struct ExecutePythonCode {
    sandbox: Sandbox,
}

impl ExecutePythonCode {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ExecutePythonCode {
    fn name(&self) -> &'static str {
        "execute_python_code"
    }

    fn description(&self) -> &'static str {
        "Executes Python code in a secure container."
    }

    fn params(&self) -> &'static [Param] {
        &[Param {
            name: "code",
            description: "Python source passed to python -c",
        }]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let code = required_str(args, "code")?;
        tracing::info!("executing python code in sandbox");
        let name = container_name();
        self.sandbox.run(&name, self.sandbox.python_args(&name, code)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sandbox(runtime: &str) -> Sandbox {
        sandbox_with_timeout(runtime, Duration::from_secs(5))
    }

    fn sandbox_with_timeout(runtime: &str, timeout: Duration) -> Sandbox {
        Sandbox::new(
            SandboxConfig {
                runtime: runtime.to_string(),
                image: "python:3.9-slim".to_string(),
                timeout,
            },
            Workspace::new("/home/dev/project"),
        )
    }

    #[test]
    fn shell_args_mount_workspace() {
        let args = sandbox("docker").shell_args("ae-test", "pytest -q");
        assert_eq!(
            args,
            [
                "run",
                "--rm",
                "--name",
                "ae-test",
                "-v",
                "/home/dev/project:/workspace:rw",
                "-w",
                "/workspace",
                "python:3.9-slim",
                "/bin/sh",
                "-c",
                "pytest -q",
            ]
        );
    }

    #[test]
    fn python_args_do_not_mount() {
        let args = sandbox("docker").python_args("ae-test", "print(1)");
        assert_eq!(
            args,
            ["run", "--rm", "--name", "ae-test", "python:3.9-slim", "python", "-c", "print(1)"]
        );
    }

    #[test]
    fn container_names_are_unique() {
        let (a, b) = (container_name(), container_name());
        assert!(a.starts_with("autonomous-engineer-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn missing_runtime_is_reported_as_docker_error() {
        let tool = ExecuteShellCommand::new(sandbox("definitely-not-a-container-runtime"));
        let mut args = ToolArgs::new();
        args.insert("command".into(), json!("echo hi"));

        let err = tool.call(&args).await.unwrap_err();
        assert!(matches!(err, ToolError::Sandbox(_)));
        assert!(err.observation().starts_with("Docker Error: failed to run"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_exit_status_is_reported() {
        // `false` ignores its arguments and exits 1, standing in for a container runtime
        let err = sandbox("false").run("ae-test", vec!["run".into()]).await.unwrap_err();
        assert!(err.observation().starts_with("Docker Error: command exited with status 1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_output_is_returned() {
        let out = sandbox("echo").run("ae-test", vec!["hello".into()]).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_container_is_removed_by_name() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cleanup.log");
        let runtime = dir.path().join("fake-runtime");
        std::fs::write(
            &runtime,
            format!(
                "#!/bin/sh\nif [ \"$1\" = rm ]; then echo \"$@\" >> {}; exit 0; fi\nexec sleep 30\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sandbox = sandbox_with_timeout(runtime.to_str().unwrap(), Duration::from_secs(1));
        let name = container_name();
        let err = sandbox
            .run(&name, sandbox.shell_args(&name, "while true; do :; done"))
            .await
            .unwrap_err();

        assert_eq!(err.observation(), "Docker Error: execution timed out after 1s");
        let removed = std::fs::read_to_string(&log).unwrap();
        assert_eq!(removed.trim(), format!("rm -f {name}"));
    }
}
