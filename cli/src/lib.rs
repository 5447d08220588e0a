//! `appforge-cli`: a headless driver that wires one [`appforge_core::AgentRegistry`]
//! to a local filesystem sandbox and a scripted inference client, then runs
//! one query end-to-end while printing the event stream: no interactive
//! UI, just `run_main` doing setup, drive, and teardown in a straight
//! line.

mod cli;
mod event_processor;
mod fixtures;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use appforge_core::agent::AgentMode;
use appforge_core::agent::InitializeRequest;
use appforge_core::persistence::InMemoryStateStore;
use appforge_core::registry::AgentFactory;
use appforge_core::registry::AgentRegistry;
use appforge_core::AgentConfig;
use appforge_protocol::AgentId;
use appforge_protocol::Command;
use appforge_protocol::DevState;
use appforge_protocol::Event;

pub use cli::Cli;
pub use cli::Color;

use event_processor::EventProcessor;
use fixtures::LocalFilesystemSandbox;
use fixtures::ScriptedInferenceClient;

/// Runs one session to completion, returning once generation finishes (or
/// is stopped) and, unless `--skip-deploy` was passed, a preview deploy has
/// been attempted.
pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    // try_init rather than init: multiple sessions (or multiple tests) in
    // one process must not panic on a second global subscriber install.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let with_ansi = match cli.color {
        Color::Always => true,
        Color::Never => false,
        Color::Auto => std::io::stdout().is_terminal(),
    };

    let workdir = cli
        .workdir
        .unwrap_or_else(|| std::env::temp_dir().join(format!("appforge-{}", uuid::Uuid::new_v4())));
    std::fs::create_dir_all(&workdir).context("creating sandbox workdir")?;
    info!(workdir = %workdir.display(), "sandbox workdir ready");

    let registry = AgentRegistry::new(
        Arc::new(InMemoryStateStore::new()),
        AgentFactory {
            sandbox: Arc::new(LocalFilesystemSandbox::new(workdir)),
            inference: Arc::new(ScriptedInferenceClient),
            config: AgentConfig::default(),
        },
    );

    let agent_id = AgentId::new(uuid::Uuid::new_v4().to_string());
    let agent = registry.get_or_create(&agent_id).await.context("creating session agent")?;

    let (_subscriber_id, mut rx) = agent.subscribe();

    let init_agent = agent.clone();
    let query = cli.query.clone();
    let template = cli.template.clone();
    let init_handle = tokio::spawn(async move {
        init_agent
            .initialize(InitializeRequest { query, template_name: template, agent_mode: AgentMode::Smart })
            .await
    });

    let mut processor = EventProcessor::create_with_ansi(with_ansi);
    let mut deploy_requested = cli.skip_deploy;
    let mut exit_code = 0;

    while let Some(event) = rx.recv().await {
        processor.process_event(&event);
        match event {
            Event::Error { .. } | Event::RateLimitError { .. } => {
                exit_code = 1;
                break;
            }
            Event::GenerationStopped => break,
            Event::GenerationComplete => {
                if deploy_requested {
                    break;
                }
                deploy_requested = true;
                agent.command(Command::Preview).await;
            }
            Event::DeploymentCompleted { .. } | Event::CloudflareDeploymentCompleted { .. } => break,
            Event::CloudflareDeploymentError { .. } => {
                exit_code = 1;
                break;
            }
            _ => {}
        }
    }

    init_handle.await.context("initialize task panicked")?.context("initialize failed")?;

    let final_state = agent.get_full_state();
    if final_state.current_dev_state != DevState::Terminal && exit_code == 0 {
        tracing::warn!(dev_state = ?final_state.current_dev_state, "session ended before reaching Terminal");
    }

    if exit_code != 0 {
        anyhow::bail!("session ended with an error");
    }
    Ok(())
}
