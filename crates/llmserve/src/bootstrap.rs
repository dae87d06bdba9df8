//! Startup sequence: hub login, engine, tokenizer, HTTP server.

use crate::cli::Cli;
use llmserve_engine::{
    EngineClient, EngineLauncher, EngineProcess, ExecutorLauncher, ExecutorProcess, HfTokenizer,
    HubClient, InferenceEngine, hub_login,
};
use llmserve_server::OpenAiServer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run `llm-serve` until Ctrl-C.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let auth = hub_login();
    let engine_config = cli.engine_config()?;
    info!(
        model = %engine_config.model(),
        tp_size = engine_config.tensor_parallel_size(),
        pp_size = engine_config.pipeline_parallel_size(),
        "Engine configuration ready"
    );

    let (base_url, executor) = match &cli.engine_url {
        Some(url) => {
            info!(url = %url, "Using running executor");
            (url.clone(), None)
        }
        None => {
            let process =
                ExecutorLauncher::start(cli.executor_config(engine_config.clone(), auth.clone())?)?;
            if let Err(e) = process.wait_until_ready(cli.startup_timeout()).await {
                process.stop()?;
                return Err(e.into());
            }
            (process.base_url(), Some(process))
        }
    };

    let engine = EngineClient::new(base_url, engine_config.model().clone())
        .with_poll_interval(cli.poll_interval());
    engine.health_check().await?;

    let source = engine_config.tokenizer_source().to_string();
    let tokenizer = tokio::task::spawn_blocking(move || {
        let hub = HubClient::new(&auth)?;
        HfTokenizer::from_pretrained(&source, &hub)
    })
    .await??;

    let server = OpenAiServer::new(cli.server_config()?, Arc::new(engine), Arc::new(tokenizer));
    let served = server.serve(shutdown_signal()).await;
    stop_executor(executor);
    served?;
    Ok(())
}

fn stop_executor(executor: Option<ExecutorProcess>) {
    let Some(process) = executor else {
        return;
    };
    if let Err(e) = process.stop() {
        warn!(error = %e, "Failed to stop executor");
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
