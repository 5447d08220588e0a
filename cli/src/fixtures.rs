//! Local collaborators the CLI wires an [`appforge_core::AgentRegistry`]
//! up to: a filesystem-backed sandbox and a scripted inference client.
//! Neither implementation talks to a real sandbox runtime or model
//! provider — those are out-of-scope external collaborators; this crate
//! only needs something that behaves like them closely enough to drive
//! the pipeline end-to-end for a demo or smoke test.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value;
use tokio::fs;

use appforge_core::error::AgentError;
use appforge_core::error::Result;
use appforge_core::inference::ChatTurn;
use appforge_core::inference::ChatWithToolsRequest;
use appforge_core::inference::ChunkSink;
use appforge_core::inference::InferenceClient;
use appforge_core::inference::StructuredOutputRequest;
use appforge_core::sandbox::CommandOutput;
use appforge_core::sandbox::DeployResult;
use appforge_core::sandbox::SandboxClient;
use appforge_core::sandbox::StaticAnalysisResult;

/// Writes generated files under `base_dir/<session id>/<path>`. Static
/// analysis always reports clean (this fixture has no real compiler to
/// call); it exists to give the CLI's filesystem writes somewhere real
/// to land, not to validate code.
pub struct LocalFilesystemSandbox {
    base_dir: PathBuf,
}

impl LocalFilesystemSandbox {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(session_id)
    }

    fn resolve(&self, session_id: &str, path: &str) -> Result<PathBuf> {
        if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
            return Err(AgentError::Fatal(format!("refusing to write outside the session dir: {path}")));
        }
        Ok(self.session_dir(session_id).join(path))
    }
}

#[async_trait]
impl SandboxClient for LocalFilesystemSandbox {
    async fn bootstrap(&self, template_name: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = self.session_dir(&session_id);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(".appforge-template"), template_name).await?;
        Ok(session_id)
    }

    async fn write_file(&self, session_id: &str, path: &str, contents: &str) -> Result<()> {
        let full_path = self.resolve(session_id, path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(full_path, contents).await?;
        Ok(())
    }

    async fn read_file(&self, session_id: &str, path: &str) -> Result<Option<String>> {
        let full_path = self.resolve(session_id, path)?;
        match fs::read_to_string(&full_path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn run_command(&self, session_id: &str, command: &str) -> Result<CommandOutput> {
        let dir = self.session_dir(session_id);
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&dir)
            .output()
            .await?;
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn static_analysis(&self, _session_id: &str) -> Result<StaticAnalysisResult> {
        Ok(StaticAnalysisResult::default())
    }

    async fn deploy_preview(&self, session_id: &str) -> Result<DeployResult> {
        let dir = self.session_dir(session_id);
        Ok(DeployResult { preview_url: format!("file://{}", dir.display()), tunnel_url: None })
    }
}

/// A deterministic, fully offline stand-in for a model endpoint: the
/// blueprint is a fixed two-phase plan shaped by the query, and phase
/// file generation returns a small placeholder module per requested
/// path. Chat turns never call `edit_app`.
pub struct ScriptedInferenceClient;

#[async_trait]
impl InferenceClient for ScriptedInferenceClient {
    async fn structured_output(
        &self,
        request: StructuredOutputRequest,
        on_chunk: Option<ChunkSink<'_>>,
    ) -> Result<Value> {
        if let Some(sink) = on_chunk {
            sink(&request.prompt);
        }
        match request.schema_name.as_str() {
            "blueprint" => Ok(json!({
                "title": "Generated App",
                "description": request.prompt,
                "frameworks": ["react", "vite"],
                "phases": [
                    {
                        "name": "scaffold",
                        "description": "project shell and entry point",
                        "files": [
                            { "path": "src/App.tsx", "purpose": "root component" },
                            { "path": "src/main.tsx", "purpose": "entry point" }
                        ]
                    },
                    {
                        "name": "feature",
                        "description": "primary requested feature",
                        "files": [{ "path": "src/Feature.tsx", "purpose": "feature component" }]
                    }
                ]
            })),
            "code_fix_edits" => Ok(json!([])),
            _ => Ok(file_stub_response(&request.prompt)),
        }
    }

    async fn chat_with_tools(
        &self,
        request: ChatWithToolsRequest,
        _available_tools: &[String],
        on_chunk: Option<ChunkSink<'_>>,
    ) -> Result<ChatTurn> {
        let text = format!(
            "Acknowledged: {}",
            request.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
        );
        if let Some(sink) = on_chunk {
            sink(&text);
        }
        Ok(ChatTurn { text, tool_calls: vec![] })
    }
}

/// Builds a `{ path: contents }` response for a "implement phase" prompt
/// by pulling the `Files: a, b, c.` clause the phase executor's prompt
/// always includes.
fn file_stub_response(prompt: &str) -> Value {
    let files = prompt
        .split("Files: ")
        .nth(1)
        .map(|rest| rest.split(" User suggestions:").next().unwrap_or(rest))
        .map(|list| list.trim_end_matches('.'))
        .map(|list| list.split(", ").map(str::trim).filter(|p| !p.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut object = serde_json::Map::new();
    for path in files {
        let stub = format!("// generated stub for {path}\nexport default {{}};\n");
        object.insert(path.to_string(), Value::String(stub));
    }
    Value::Object(object)
}
