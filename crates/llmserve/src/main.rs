use clap::Parser;
use llmserve::{Cli, init_tracing, run};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;
    info!(model = %cli.model, "Starting llm-serve");
    run(cli).await
}
