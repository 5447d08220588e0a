use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = appforge_cli::Cli::parse();
    appforge_cli::run_main(cli).await
}
