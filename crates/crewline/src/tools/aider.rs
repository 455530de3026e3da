//! Code editing through the external `aider` assistant.
//!
//! [`CodeEditor`] runs one non-interactive aider invocation with a wall-clock
//! limit. [`AiderTool`] exposes it to the developer and QA agents.
//!
//! ```text
//! aider --message <instruction> --yes --auto-commits --no-dirty-commits <files...>
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use super::core::{Tool, ToolFailure, ToolFuture, parse_tool_args};
use crate::ToolDef;

/// Tool name the agents see.
pub const AIDER_TOOL_NAME: &str = "aider_coding_tool";

/// Default limit for one aider run.
pub const DEFAULT_AIDER_TIMEOUT: Duration = Duration::from_secs(600);

/// How to launch the code editor.
#[derive(Debug, Clone)]
pub struct CodeEditorConfig {
    /// Executable name or path. Default: `aider` (resolved through `PATH`).
    pub program: String,
    /// Arguments placed before the generated ones.
    pub leading_args: Vec<String>,
    /// Directory the editor runs in.
    pub workdir: PathBuf,
    pub timeout: Duration,
}

impl Default for CodeEditorConfig {
    fn default() -> Self {
        Self {
            program: "aider".to_string(),
            leading_args: Vec::new(),
            workdir: PathBuf::from("."),
            timeout: DEFAULT_AIDER_TIMEOUT,
        }
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeEditOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Failure modes of a code editor run.
#[derive(Debug, Error, PartialEq)]
pub enum CodeEditError {
    #[error("'{0}' command not found")]
    NotFound(String),
    #[error("editor exited with {code:?}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("editor timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to run editor: {0}")]
    Io(String),
}

/// Runs aider-compatible editors.
#[derive(Debug, Clone, Default)]
pub struct CodeEditor {
    config: CodeEditorConfig,
}

impl CodeEditor {
    pub fn new(config: CodeEditorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodeEditorConfig {
        &self.config
    }

    /// Full argument list for one run.
    pub fn command_args(&self, instruction: &str, files: &[&str]) -> Vec<String> {
        let mut args = self.config.leading_args.clone();
        args.extend(
            [
                "--message",
                instruction,
                "--yes",
                "--auto-commits",
                "--no-dirty-commits",
            ]
            .map(String::from),
        );
        args.extend(files.iter().map(|f| (*f).to_string()));
        args
    }

    /// Run the editor once. The child is killed if the timeout expires.
    pub async fn run(&self, instruction: &str, files: &[&str]) -> Result<CodeEditOutput, CodeEditError> {
        let args = self.command_args(instruction, files);
        info!(
            "[AiderTool] Executing: {} {}",
            self.config.program,
            args.join(" ")
        );

        let child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CodeEditError::NotFound(self.config.program.clone()),
                _ => CodeEditError::Io(e.to_string()),
            })?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| CodeEditError::Timeout(self.config.timeout))?
            .map_err(|e| CodeEditError::Io(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(CodeEditOutput { stdout, stderr })
        } else {
            Err(CodeEditError::NonZeroExit {
                code: output.status.code(),
                stdout,
                stderr,
            })
        }
    }
}

// ── Tool adapter ───────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct AiderArgs {
    /// Natural language description of what code to write or change.
    pub instruction: String,
    /// Space-separated list of file paths to edit.
    pub files: String,
}

/// [`CodeEditor`] as an agent tool.
///
/// A non-zero exit is handed back to the model as text so it can adjust the
/// instruction. A missing binary or a timeout fails the stage.
#[derive(Debug, Clone, Default)]
pub struct AiderTool {
    editor: CodeEditor,
}

impl AiderTool {
    pub fn new(config: CodeEditorConfig) -> Self {
        Self {
            editor: CodeEditor::new(config),
        }
    }
}

impl Tool for AiderTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            AIDER_TOOL_NAME,
            "Invokes the Aider AI coding assistant to modify files based on instructions. \
             Use it to implement code, refactor, write tests or fix bugs in specific files. \
             Changes are committed automatically.",
            crate::json_schema_for::<AiderArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: AiderArgs = match parse_tool_args(&arguments) {
                Ok(a) => a,
                Err(e) => return Ok(e),
            };
            let files: Vec<&str> = args.files.split_whitespace().collect();

            match self.editor.run(&args.instruction, &files).await {
                Ok(out) => Ok(format!("Aider successfully executed. Output:\n{}", out.stdout)),
                Err(CodeEditError::NonZeroExit {
                    code,
                    stdout,
                    stderr,
                }) => {
                    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    warn!("[AiderTool] exited with {code}");
                    Ok(format!(
                        "Aider failed (Exit {code}).\nError: {stderr}\nOutput: {stdout}"
                    ))
                }
                Err(CodeEditError::Timeout(after)) => Err(ToolFailure::Timeout {
                    name: AIDER_TOOL_NAME.to_string(),
                    after,
                }),
                Err(e) => Err(ToolFailure::Unavailable {
                    name: AIDER_TOOL_NAME.to_string(),
                    reason: e.to_string(),
                }),
            }
        })
    }
}
