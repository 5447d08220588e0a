//! Renders the agent's event stream to the terminal: one `Style` field
//! per color used, all `--color=never` dispatch going through `.style()`
//! so plain output never falls back to raw ANSI literals.

use chrono::Utc;
use owo_colors::OwoColorize;
use owo_colors::Style;

use appforge_core::elapsed::format_elapsed;
use appforge_protocol::Event;

pub struct EventProcessor {
    bold: Style,
    dimmed: Style,
    cyan: Style,
    green: Style,
    yellow: Style,
    red: Style,
    started_at: chrono::DateTime<Utc>,
}

impl EventProcessor {
    pub fn create_with_ansi(with_ansi: bool) -> Self {
        let started_at = Utc::now();
        if with_ansi {
            Self {
                bold: Style::new().bold(),
                dimmed: Style::new().dimmed(),
                cyan: Style::new().cyan(),
                green: Style::new().green(),
                yellow: Style::new().yellow(),
                red: Style::new().red(),
                started_at,
            }
        } else {
            Self {
                bold: Style::new(),
                dimmed: Style::new(),
                cyan: Style::new(),
                green: Style::new(),
                yellow: Style::new(),
                red: Style::new(),
                started_at,
            }
        }
    }

    pub fn process_event(&mut self, event: &Event) {
        match event {
            Event::CfAgentState { state } => {
                println!(
                    "{} query={:?} dev_state={:?}",
                    "cf_agent_state".style(self.dimmed),
                    state.query,
                    state.current_dev_state
                );
            }
            Event::FileGenerating { file_path } => {
                println!("{} {file_path}", "generating".style(self.cyan));
            }
            Event::FileChunkGenerated { .. } => {}
            Event::FileGenerated { file_path, .. } => {
                println!("{} {file_path}", "file".style(self.green));
            }
            Event::FileRegenerating { file_path } => {
                println!("{} {file_path}", "regenerating".style(self.cyan));
            }
            Event::FileRegenerated { file_path, .. } => {
                println!("{} {file_path}", "file (updated)".style(self.green));
            }
            Event::GenerationStarted { total_files } => {
                println!("{} {total_files} files planned", "generation_started".style(self.bold));
            }
            Event::GenerationComplete => {
                println!(
                    "{} in {}",
                    "generation_complete".style(self.bold.green()),
                    format_elapsed(self.started_at)
                );
            }
            Event::GenerationStopped => {
                println!("{}", "generation_stopped".style(self.yellow));
            }
            Event::GenerationResumed => {
                println!("{}", "generation_resumed".style(self.cyan));
            }
            Event::PhaseImplementing { message, phase_name } => {
                println!("{} {phase_name}: {message}", "phase_implementing".style(self.bold));
            }
            Event::PhaseValidating { message } => {
                println!("{} {message}", "phase_validating".style(self.dimmed));
            }
            Event::PhaseValidated { message } => {
                println!("{} {message}", "phase_validated".style(self.green));
            }
            Event::PhaseImplemented { message, phase_name } => {
                println!("{} {phase_name}: {message}", "phase_implemented".style(self.bold.green()));
            }
            Event::PhaseGenerating { message } => {
                println!("{} {message}", "phase_generating".style(self.dimmed));
            }
            Event::PhaseGenerated { message } => {
                println!("{} {message}", "phase_generated".style(self.dimmed));
            }
            Event::CodeReviewing {
                static_analysis_issue_count,
                runtime_error_count,
                client_error_count,
            } => {
                println!(
                    "{} static={static_analysis_issue_count} runtime={runtime_error_count} client={client_error_count}",
                    "code_reviewing".style(self.dimmed)
                );
            }
            Event::CodeReviewed { issues_found, files_to_fix } => {
                let style = if *issues_found { self.yellow } else { self.green };
                println!(
                    "{} issues_found={issues_found} files={}",
                    "code_reviewed".style(style),
                    files_to_fix.join(", ")
                );
            }
            Event::DeploymentStarted => println!("{}", "deployment_started".style(self.cyan)),
            Event::DeploymentCompleted { preview_url, tunnel_url } => {
                println!(
                    "{} {preview_url}{}",
                    "deployment_completed".style(self.bold.green()),
                    tunnel_url.as_deref().map(|t| format!(" (tunnel {t})")).unwrap_or_default()
                );
            }
            Event::RuntimeErrorFound { count, errors } => {
                println!("{} {count}: {}", "runtime_error_found".style(self.yellow), errors.join("; "));
            }
            Event::ConversationResponse { conversation_id, message, is_streaming } => {
                if !is_streaming {
                    println!("{} [{conversation_id}] {message}", "conversation".style(self.cyan));
                }
            }
            Event::TerminalOutput { output, .. } => {
                println!("{} {output}", "terminal".style(self.dimmed));
            }
            Event::ServerLog { message, level, .. } => {
                println!("{} [{level}] {message}", "log".style(self.dimmed));
            }
            Event::Error { error } => {
                println!("{} {error}", "error".style(self.red.bold()));
            }
            Event::RateLimitError { error } => {
                println!(
                    "{} {} ({})",
                    "rate_limit_error".style(self.red),
                    error.message,
                    error.limit_type
                );
            }
            Event::CloudflareDeploymentStarted => {
                println!("{}", "cloudflare_deployment_started".style(self.cyan));
            }
            Event::CloudflareDeploymentCompleted { preview_url } => {
                println!("{} {preview_url}", "cloudflare_deployment_completed".style(self.bold.green()));
            }
            Event::CloudflareDeploymentError { error } => {
                println!("{} {error}", "cloudflare_deployment_error".style(self.red));
            }
        }
    }
}
