//! Runs one implement → validate → fix cycle for a single blueprint phase.
//! Owns no state of its own beyond the `generatedFilesMap` slice it is
//! handed; every write is keyed by file path so re-running a phase is
//! idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use appforge_protocol::Event;
use appforge_protocol::GeneratedFile;
use appforge_protocol::GeneratedPhase;
use appforge_protocol::Phase;

use crate::config::PipelineLimits;
use crate::error::AgentError;
use crate::error::Result;
use crate::inference::InferenceClient;
use crate::inference::StructuredOutputRequest;
use crate::sandbox::SandboxClient;
use crate::sandbox::StaticAnalysisResult;

const CHUNK_SIZE: usize = 2048;

/// Where the executor sends every typed event it produces. The session
/// agent implements this as "fan out to subscribers"; tests implement it as
/// "push into a Vec".
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseExecutionResult {
    pub generated_phase: GeneratedPhase,
    pub static_analysis: StaticAnalysisResult,
    /// Suggestions the model volunteered beyond what the blueprint asked
    /// for; surfaced to the caller rather than acted on automatically.
    pub user_suggestions: Vec<String>,
    pub issues_found: bool,
}

#[derive(Debug, Deserialize)]
struct CodeFixEdit {
    file_path: String,
    search: String,
    replacement: String,
}

pub struct PhaseExecutor {
    sandbox: Arc<dyn SandboxClient>,
    inference: Arc<dyn InferenceClient>,
    limits: PipelineLimits,
}

impl PhaseExecutor {
    pub fn new(
        sandbox: Arc<dyn SandboxClient>,
        inference: Arc<dyn InferenceClient>,
        limits: PipelineLimits,
    ) -> Self {
        Self { sandbox, inference, limits }
    }

    /// Runs phase `phase` to completion, mutating `files` in place.
    /// `client_reported_errors` are folded into the `code_reviewing` counts
    /// but owned by the caller (the agent), not this executor.
    pub async fn run_phase(
        &self,
        session_id: &str,
        phase: &Phase,
        files: &mut BTreeMap<String, GeneratedFile>,
        drained_user_inputs: &[String],
        client_reported_errors: &[String],
        events: &dyn EventSink,
    ) -> Result<PhaseExecutionResult> {
        events.emit(Event::PhaseGenerating { message: format!("generating phase {}", phase.name) });

        let touched = self.generate_phase_files(session_id, phase, drained_user_inputs, files, events).await?;

        events.emit(Event::PhaseValidating { message: format!("validating phase {}", phase.name) });
        let mut analysis = self.sandbox.static_analysis(session_id).await?;

        let mut cycles = 0usize;
        while !analysis.is_clean() && cycles < self.limits.max_review_cycles {
            cycles += 1;
            let fixed_deterministically = self.run_deterministic_fix_loop(files, &mut analysis, session_id).await?;
            if fixed_deterministically {
                break;
            }
            self.run_model_fix_turn(files, &analysis).await?;
            analysis = self.sandbox.static_analysis(session_id).await?;
        }

        events.emit(Event::CodeReviewing {
            static_analysis_issue_count: analysis.issues.len(),
            runtime_error_count: analysis.runtime_errors.len(),
            client_error_count: client_reported_errors.len(),
        });

        let issues_found = !analysis.is_clean();
        events.emit(Event::CodeReviewed {
            issues_found,
            files_to_fix: analysis.issues.iter().filter_map(|i| i.file_path.clone()).collect(),
        });

        if !issues_found {
            events.emit(Event::PhaseValidated { message: format!("phase {} validated", phase.name) });
        }

        let generated_phase = GeneratedPhase {
            name: phase.name.clone(),
            description: phase.description.clone(),
            files: touched,
            completed: !issues_found,
        };

        if !issues_found {
            events.emit(Event::PhaseImplemented {
                message: format!("phase {} implemented", phase.name),
                phase_name: phase.name.clone(),
            });
        }

        Ok(PhaseExecutionResult {
            generated_phase,
            static_analysis: analysis,
            user_suggestions: Vec::new(),
            issues_found,
        })
    }

    async fn generate_phase_files(
        &self,
        _session_id: &str,
        phase: &Phase,
        drained_user_inputs: &[String],
        files: &mut BTreeMap<String, GeneratedFile>,
        events: &dyn EventSink,
    ) -> Result<Vec<String>> {
        let mut prompt = format!(
            "Implement phase \"{}\": {}. Files: {}.",
            phase.name,
            phase.description,
            phase.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>().join(", ")
        );
        if !drained_user_inputs.is_empty() {
            prompt.push_str(&format!(" User suggestions: {}.", drained_user_inputs.join("; ")));
        }

        let response = self
            .inference
            .structured_output(
                StructuredOutputRequest { prompt, schema_name: "phase_files".to_string() },
                None,
            )
            .await?;

        let produced = parse_phase_files(&response)?;

        // The model may add files beyond the blueprint's list but may not
        // drop any the blueprint declared.
        let mut paths: Vec<String> = phase.files.iter().map(|f| f.path.clone()).collect();
        for path in produced.keys() {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths.sort();

        let mut touched = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = produced.get(&path).cloned().unwrap_or_else(|| {
                files.get(&path).map(|f| f.contents.clone()).unwrap_or_default()
            });
            let is_regeneration = files.contains_key(&path);
            self.emit_file_production(&path, &contents, is_regeneration, events);
            files.insert(
                path.clone(),
                GeneratedFile { contents, last_phase_name: phase.name.clone() },
            );
            touched.push(path);
        }
        Ok(touched)
    }

    fn emit_file_production(&self, path: &str, contents: &str, is_regeneration: bool, events: &dyn EventSink) {
        if is_regeneration {
            events.emit(Event::FileRegenerating { file_path: path.to_string() });
        } else {
            events.emit(Event::FileGenerating { file_path: path.to_string() });
        }
        for chunk in chunk_contents(contents) {
            events.emit(Event::FileChunkGenerated { file_path: path.to_string(), chunk });
        }
        if is_regeneration {
            events.emit(Event::FileRegenerated {
                file_path: path.to_string(),
                file_contents: contents.to_string(),
            });
        } else {
            events.emit(Event::FileGenerated {
                file_path: path.to_string(),
                file_contents: contents.to_string(),
            });
        }
    }

    /// Deterministic-fixer + re-validate, bounded by
    /// `max_validate_iterations`. Returns `true` if the project ends clean.
    async fn run_deterministic_fix_loop(
        &self,
        files: &mut BTreeMap<String, GeneratedFile>,
        analysis: &mut StaticAnalysisResult,
        session_id: &str,
    ) -> Result<bool> {
        for _ in 0..self.limits.max_validate_iterations {
            if analysis.is_clean() {
                return Ok(true);
            }
            let snapshot: BTreeMap<String, String> =
                files.iter().map(|(path, f)| (path.clone(), f.contents.clone())).collect();
            let outcome = appforge_codefixer::fix_project_issues(
                snapshot,
                &analysis.issues,
                &appforge_codefixer::NoopFetcher,
            );
            if outcome.fixed.is_empty() {
                return Ok(false);
            }
            for (path, contents) in outcome.files {
                let last_phase_name = files
                    .get(&path)
                    .map(|f| f.last_phase_name.clone())
                    .unwrap_or_else(|| "fixer".to_string());
                for (p, c) in self.apply_sandbox_write(session_id, &path, &contents).await {
                    files.insert(p, GeneratedFile { contents: c, last_phase_name: last_phase_name.clone() });
                }
            }
            *analysis = self.sandbox.static_analysis(session_id).await?;
        }
        Ok(analysis.is_clean())
    }

    async fn apply_sandbox_write(&self, session_id: &str, path: &str, contents: &str) -> Vec<(String, String)> {
        let _ = self.sandbox.write_file(session_id, path, contents).await;
        vec![(path.to_string(), contents.to_string())]
    }

    /// A single model-based fix turn producing literal search/replace
    /// edits, applied first-match.
    async fn run_model_fix_turn(
        &self,
        files: &mut BTreeMap<String, GeneratedFile>,
        analysis: &StaticAnalysisResult,
    ) -> Result<()> {
        let issue_summaries: Vec<String> = analysis
            .issues
            .iter()
            .map(|i| format!("{}: {} ({})", i.rule_id, i.message, i.file_path.as_deref().unwrap_or("?")))
            .collect();
        let prompt = format!("Fix the following issues with literal edits: {}", issue_summaries.join("; "));

        let response = self
            .inference
            .structured_output(
                StructuredOutputRequest { prompt, schema_name: "code_fix_edits".to_string() },
                None,
            )
            .await?;

        let edits: Vec<CodeFixEdit> = serde_json::from_value(response).unwrap_or_default();
        for edit in edits {
            if let Some(file) = files.get_mut(&edit.file_path) {
                if let Some(pos) = file.contents.find(&edit.search) {
                    file.contents.replace_range(pos..pos + edit.search.len(), &edit.replacement);
                }
            }
        }
        Ok(())
    }
}

fn parse_phase_files(value: &Value) -> Result<BTreeMap<String, String>> {
    let object = value.as_object().ok_or_else(|| {
        AgentError::Fatal("phase generation response was not a JSON object of path -> contents".to_string())
    })?;
    let mut out = BTreeMap::new();
    for (path, contents) in object {
        let contents = contents.as_str().ok_or_else(|| {
            AgentError::Fatal(format!("phase generation response for {path} was not a string"))
        })?;
        out.insert(path.clone(), contents.to_string());
    }
    Ok(out)
}

fn chunk_contents(contents: &str) -> Vec<String> {
    if contents.is_empty() {
        return Vec::new();
    }
    contents
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use serde_json::Value;

    use appforge_protocol::PhaseFile;
    use appforge_protocol::StaticAnalysisIssue;

    use crate::inference::ChatTurn;
    use crate::inference::ChatWithToolsRequest;
    use crate::inference::ChunkSink;
    use crate::inference::InferenceClient;
    use crate::inference::StructuredOutputRequest;
    use crate::sandbox::CommandOutput;
    use crate::sandbox::DeployResult;
    use crate::sandbox::SandboxClient;
    use crate::sandbox::StaticAnalysisResult;

    use super::*;

    struct RecordingSink(Mutex<Vec<Event>>);

    impl RecordingSink {
        fn new() -> Self {
            Self(Mutex::new(Vec::new()))
        }

        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// Sandbox whose static analysis reports `issues` once and is clean
    /// thereafter, simulating a deterministic fixer clearing the project
    /// within a single re-validate pass.
    struct ScriptedSandbox {
        issues: Mutex<Vec<Vec<StaticAnalysisIssue>>>,
    }

    impl ScriptedSandbox {
        fn clean() -> Self {
            Self { issues: Mutex::new(vec![Vec::new()]) }
        }

        fn with_issue_sequence(sequence: Vec<Vec<StaticAnalysisIssue>>) -> Self {
            Self { issues: Mutex::new(sequence) }
        }
    }

    #[async_trait]
    impl SandboxClient for ScriptedSandbox {
        async fn bootstrap(&self, _template_name: &str) -> Result<String> {
            Ok("session-1".to_string())
        }

        async fn write_file(&self, _session_id: &str, _path: &str, _contents: &str) -> Result<()> {
            Ok(())
        }

        async fn read_file(&self, _session_id: &str, _path: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn run_command(&self, _session_id: &str, _command: &str) -> Result<CommandOutput> {
            Ok(CommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
        }

        async fn static_analysis(&self, _session_id: &str) -> Result<StaticAnalysisResult> {
            let mut issues = self.issues.lock().unwrap();
            let next = if issues.len() > 1 { issues.remove(0) } else { issues[0].clone() };
            Ok(StaticAnalysisResult { issues: next, runtime_errors: Vec::new() })
        }

        async fn deploy_preview(&self, _session_id: &str) -> Result<DeployResult> {
            Ok(DeployResult { preview_url: "https://preview.example/app".to_string(), tunnel_url: None })
        }
    }

    /// Inference client whose structured-output response is always the
    /// same fixed file map, regardless of the prompt asked.
    struct FixedFilesInference {
        files: Value,
    }

    #[async_trait]
    impl InferenceClient for FixedFilesInference {
        async fn structured_output(
            &self,
            _request: StructuredOutputRequest,
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<Value> {
            Ok(self.files.clone())
        }

        async fn chat_with_tools(
            &self,
            _request: ChatWithToolsRequest,
            _available_tools: &[String],
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<ChatTurn> {
            Ok(ChatTurn { text: String::new(), tool_calls: vec![] })
        }
    }

    fn phase(name: &str, paths: &[&str]) -> Phase {
        Phase {
            name: name.to_string(),
            description: format!("{name} description"),
            files: paths
                .iter()
                .map(|p| PhaseFile { path: p.to_string(), purpose: "entry point".to_string() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn clean_phase_reports_no_issues_and_emits_lifecycle_events_in_order() {
        let executor = PhaseExecutor::new(
            Arc::new(ScriptedSandbox::clean()),
            Arc::new(FixedFilesInference {
                files: json!({ "src/App.tsx": "export default function App() { return null; }" }),
            }),
            PipelineLimits::default(),
        );
        let sink = RecordingSink::new();
        let mut files = BTreeMap::new();

        let result = executor
            .run_phase("session-1", &phase("scaffold", &["src/App.tsx"]), &mut files, &[], &[], &sink)
            .await
            .unwrap();

        assert!(!result.issues_found);
        assert!(result.generated_phase.completed);
        assert_eq!(files["src/App.tsx"].last_phase_name, "scaffold");

        let kinds: Vec<&str> = sink
            .events()
            .iter()
            .map(|e| match e {
                Event::PhaseGenerating { .. } => "phase_generating",
                Event::FileGenerating { .. } => "file_generating",
                Event::FileGenerated { .. } => "file_generated",
                Event::PhaseValidating { .. } => "phase_validating",
                Event::CodeReviewing { .. } => "code_reviewing",
                Event::CodeReviewed { .. } => "code_reviewed",
                Event::PhaseValidated { .. } => "phase_validated",
                Event::PhaseImplemented { .. } => "phase_implemented",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "phase_generating",
                "file_generating",
                "file_generated",
                "phase_validating",
                "code_reviewing",
                "code_reviewed",
                "phase_validated",
                "phase_implemented",
            ]
        );
    }

    #[tokio::test]
    async fn deterministic_fixer_clears_a_fixable_issue_within_the_phase() {
        let issue = StaticAnalysisIssue::new(
            "TS2724",
            "'\"@/components/ui/sonner\"' has no exported member named 'toast'. Did you mean 'Toaster'?",
        )
        .with_file("src/App.tsx");

        let executor = PhaseExecutor::new(
            Arc::new(ScriptedSandbox::with_issue_sequence(vec![vec![issue], Vec::new()])),
            Arc::new(FixedFilesInference {
                files: json!({
                    "src/App.tsx": "import { toast } from \"@/components/ui/sonner\";\n\nfunction App() {\n  toast(\"hi\");\n}\n"
                }),
            }),
            PipelineLimits::default(),
        );
        let sink = RecordingSink::new();
        let mut files = BTreeMap::new();

        let result = executor
            .run_phase("session-1", &phase("scaffold", &["src/App.tsx"]), &mut files, &[], &[], &sink)
            .await
            .unwrap();

        assert!(!result.issues_found, "the deterministic fixer should clear this issue without a model turn");
        assert!(files["src/App.tsx"].contents.contains("Toaster"));
    }

    #[tokio::test]
    async fn unfixable_issue_surfaces_as_code_reviewed_with_issues_found() {
        let issue = StaticAnalysisIssue::new("TS9999", "some error with no registered fixer")
            .with_file("src/App.tsx");

        let mut limits = PipelineLimits::default();
        limits.max_review_cycles = 1;
        limits.max_validate_iterations = 1;

        let executor = PhaseExecutor::new(
            Arc::new(ScriptedSandbox::with_issue_sequence(vec![vec![issue]])),
            Arc::new(FixedFilesInference {
                files: json!({ "src/App.tsx": "export default function App() { return null; }" }),
            }),
            limits,
        );
        let sink = RecordingSink::new();
        let mut files = BTreeMap::new();

        let result = executor
            .run_phase("session-1", &phase("scaffold", &["src/App.tsx"]), &mut files, &[], &[], &sink)
            .await
            .unwrap();

        assert!(result.issues_found);
        assert!(!result.generated_phase.completed);
        assert!(!sink.events().iter().any(|e| matches!(e, Event::PhaseImplemented { .. })));
    }

    #[tokio::test]
    async fn model_may_add_files_beyond_the_blueprint_but_declared_files_are_never_dropped() {
        let executor = PhaseExecutor::new(
            Arc::new(ScriptedSandbox::clean()),
            Arc::new(FixedFilesInference {
                files: json!({
                    "src/App.tsx": "export default function App() { return null; }",
                    "src/utils/helpers.ts": "export const noop = () => {};"
                }),
            }),
            PipelineLimits::default(),
        );
        let sink = RecordingSink::new();
        let mut files = BTreeMap::new();

        let result = executor
            .run_phase("session-1", &phase("scaffold", &["src/App.tsx"]), &mut files, &[], &[], &sink)
            .await
            .unwrap();

        assert!(files.contains_key("src/App.tsx"));
        assert!(files.contains_key("src/utils/helpers.ts"));
        assert!(result.generated_phase.files.contains(&"src/utils/helpers.ts".to_string()));
    }

    #[tokio::test]
    async fn regenerating_an_existing_path_emits_regeneration_events_not_generation_events() {
        let executor = PhaseExecutor::new(
            Arc::new(ScriptedSandbox::clean()),
            Arc::new(FixedFilesInference {
                files: json!({ "src/App.tsx": "export default function App() { return 1; }" }),
            }),
            PipelineLimits::default(),
        );
        let sink = RecordingSink::new();
        let mut files = BTreeMap::new();
        files.insert(
            "src/App.tsx".to_string(),
            GeneratedFile { contents: "stale".to_string(), last_phase_name: "scaffold".to_string() },
        );

        executor
            .run_phase("session-1", &phase("polish", &["src/App.tsx"]), &mut files, &[], &[], &sink)
            .await
            .unwrap();

        let events = sink.events();
        assert!(events.iter().any(|e| matches!(e, Event::FileRegenerating { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::FileRegenerated { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::FileGenerating { .. })));
    }
}
