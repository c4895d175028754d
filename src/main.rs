use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use simple_logger::SimpleLogger;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

mod color;
mod config;
mod controller;
mod effect;
mod error;
mod lights;
mod protocol;
mod server;

use config::Config;
use controller::EffectController;
use server::EffectServer;

/// Effect requests waiting for the controller
const REQUEST_QUEUE: usize = 32;

fn main() -> Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref())?;

    SimpleLogger::new()
        .with_level(config.log_level()?)
        .init()
        .map_err(|e| anyhow!("Failed to set up logging: {}", e))?;

    let rt = Runtime::new().context("Failed to start the runtime")?;

    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let timing = config.timing()?;
    log::debug!("Effect timing {:?}", timing);

    let (gateway, backend) = lights::channel();
    let lights = lights::start(&config.backend, backend);

    // Startup fails if the backend never reports its state
    let led_count = gateway
        .wait_ready(config.backend_wait()?)
        .await
        .context("LED backend did not come up")?;
    log::info!("LED backend ready with {} LEDs", led_count);

    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
    let controller = EffectController::new(timing, gateway, config.render_timeout()?);
    let server = EffectServer::bind(config.listen).await?;

    tokio::select! {
        result = controller.run(requests_rx) => result.context("Effect controller stopped"),
        result = server.run(requests_tx) => result.context("Effect server stopped"),
        result = lights => match result {
            Ok(Ok(())) => Err(anyhow!("Lights stopped unexpectedly")),
            Ok(Err(e)) => Err(e.context("Lights failed")),
            Err(e) => Err(anyhow!("Lights task panicked: {}", e)),
        },
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
            Ok(())
        }
    }
}
