// ABOUTME: Tool set the coding agent uses against its sandbox
// ABOUTME: terminal, createOrUpdateFiles, and readFiles; failures come back as text for the model

use codingcat_ai::ToolDefinition;
use codingcat_core::{truncate, FileMap};
use codingcat_sandbox::SandboxProvider;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const TOOL_TERMINAL: &str = "terminal";
pub const TOOL_CREATE_OR_UPDATE_FILES: &str = "createOrUpdateFiles";
pub const TOOL_READ_FILES: &str = "readFiles";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    pub path: String,
    pub content: String,
}

/// Outcome of a write tool call. Only `Written` may be merged into agent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFilesResult {
    Written(FileMap),
    Failed(String),
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    Terminal { command: String },
    CreateOrUpdateFiles { files: Vec<FileInput> },
    ReadFiles { files: Vec<String> },
}

#[derive(Deserialize)]
struct TerminalArgs {
    command: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    files: Vec<FileInput>,
}

#[derive(Deserialize)]
struct ReadArgs {
    files: Vec<String>,
}

impl ToolInvocation {
    /// Validate a tool call from the model. The error text is meant for the model.
    pub fn parse(name: &str, input: &Value) -> std::result::Result<Self, String> {
        let invalid = |e: serde_json::Error| format!("Error: invalid arguments for {}: {}", name, e);

        match name {
            TOOL_TERMINAL => {
                let args: TerminalArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(ToolInvocation::Terminal {
                    command: args.command,
                })
            }
            TOOL_CREATE_OR_UPDATE_FILES => {
                let args: WriteArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(ToolInvocation::CreateOrUpdateFiles { files: args.files })
            }
            TOOL_READ_FILES => {
                let args: ReadArgs = serde_json::from_value(input.clone()).map_err(invalid)?;
                Ok(ToolInvocation::ReadFiles { files: args.files })
            }
            other => Err(format!(
                "Error: unknown tool '{}'. Available tools: {}, {}, {}",
                other, TOOL_TERMINAL, TOOL_CREATE_OR_UPDATE_FILES, TOOL_READ_FILES
            )),
        }
    }

    /// Step name this invocation is memoized under
    pub fn step_name(&self) -> &'static str {
        match self {
            ToolInvocation::Terminal { .. } => TOOL_TERMINAL,
            ToolInvocation::CreateOrUpdateFiles { .. } => TOOL_CREATE_OR_UPDATE_FILES,
            ToolInvocation::ReadFiles { .. } => TOOL_READ_FILES,
        }
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_TERMINAL.to_string(),
            description: "Use the terminal to run commands".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"}
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: TOOL_CREATE_OR_UPDATE_FILES.to_string(),
            description: "Create or update files in the sandbox".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": {"type": "string"},
                                "content": {"type": "string"}
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["files"]
            }),
        },
        ToolDefinition {
            name: TOOL_READ_FILES.to_string(),
            description: "Read files from the sandbox".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "files": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["files"]
            }),
        },
    ]
}

/// Run a shell command. Returns stdout, or a failure report with the partial output.
pub async fn terminal(provider: &dyn SandboxProvider, sandbox_id: &str, command: &str) -> String {
    match provider.run_command(sandbox_id, command).await {
        Ok(output) => output.stdout,
        Err(failure) => {
            let report = format!(
                "Command failed: {} \nstdout: {}\nstderr: {}",
                failure.error, failure.stdout, failure.stderr
            );
            warn!(
                sandbox_id = %sandbox_id,
                command = %truncate(command, 200),
                "{}",
                truncate(&report, 2000)
            );
            report
        }
    }
}

/// Write files in order. Any failure fails the whole call and nothing is reported as written.
pub async fn write_files(
    provider: &dyn SandboxProvider,
    sandbox_id: &str,
    files: &[FileInput],
    current: &FileMap,
) -> WriteFilesResult {
    let mut updated = current.clone();

    for file in files {
        if let Err(e) = provider.write_file(sandbox_id, &file.path, &file.content).await {
            warn!(sandbox_id = %sandbox_id, path = %file.path, "File write failed: {}", e);
            return WriteFilesResult::Failed(format!("Error: {}", e));
        }
        updated.insert(file.path.clone(), file.content.clone());
    }

    debug!(sandbox_id = %sandbox_id, count = files.len(), "Files written");
    WriteFilesResult::Written(updated)
}

/// Read files and return them as a JSON array of `{path, content}`
pub async fn read_files(provider: &dyn SandboxProvider, sandbox_id: &str, paths: &[String]) -> String {
    let mut contents = Vec::with_capacity(paths.len());

    for path in paths {
        match provider.read_file(sandbox_id, path).await {
            Ok(content) => contents.push(FileInput {
                path: path.clone(),
                content,
            }),
            Err(e) => return format!("Error: {}", e),
        }
    }

    serde_json::to_string(&contents).unwrap_or_else(|e| format!("Error: {}", e))
}

/// Text shown to the model after a write call
pub fn describe_write(files: &[FileInput], result: &WriteFilesResult) -> String {
    match result {
        WriteFilesResult::Written(_) => {
            let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
            format!("Files written: {}", paths.join(", "))
        }
        WriteFilesResult::Failed(error) => error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_terminal() {
        let call = ToolInvocation::parse("terminal", &json!({"command": "ls"})).unwrap();
        assert_eq!(
            call,
            ToolInvocation::Terminal {
                command: "ls".to_string()
            }
        );
        assert_eq!(call.step_name(), "terminal");
    }

    #[test]
    fn test_parse_write_files() {
        let call = ToolInvocation::parse(
            "createOrUpdateFiles",
            &json!({"files": [{"path": "a.txt", "content": "x"}]}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolInvocation::CreateOrUpdateFiles {
                files: vec![FileInput {
                    path: "a.txt".to_string(),
                    content: "x".to_string()
                }]
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let err = ToolInvocation::parse("readFiles", &json!({"files": "a.txt"})).unwrap_err();
        assert!(err.starts_with("Error: invalid arguments for readFiles"));
    }

    #[test]
    fn test_parse_rejects_unknown_tool() {
        let err = ToolInvocation::parse("deleteEverything", &json!({})).unwrap_err();
        assert!(err.contains("unknown tool 'deleteEverything'"));
    }

    #[test]
    fn test_write_result_wire_format() {
        let failed = WriteFilesResult::Failed("Error: disk full".to_string());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"failed": "Error: disk full"})
        );
    }

    #[test]
    fn test_tool_definitions_names() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["terminal", "createOrUpdateFiles", "readFiles"]);
    }
}
