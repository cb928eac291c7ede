//! # engine_app
//!
//! Runs one [`Scene`](engine_system::Scene) at a fixed rate.
//!
//! ## Startup Sequence
//!
//! 1. Read configuration from `ENGINE_*` variables (see [`config`]).
//! 2. Build the scene: load the snapshot named on the command line, or fall
//!    back to the demo scene.
//! 3. Enter the tick loop until `ENGINE_MAX_TICKS` is reached or the process
//!    is interrupted.

mod config;
mod demo;
mod motion;
mod tick;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use tick::TickLoop;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    info!(?config, "engine starting");

    let mut scene = demo::empty_scene(config.world)?;
    match &config.scene_path {
        Some(path) => {
            let format = config::scene_format(path)?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let roots = scene
                .load(&bytes, format)
                .with_context(|| format!("loading {}", path.display()))?;
            info!(path = %path.display(), roots = roots.len(), "scene loaded");
        }
        None => {
            demo::populate(&mut scene)?;
        }
    }

    let mut tick_loop = TickLoop::new(config.tick, scene);
    tick_loop.run_async().await?;

    info!(ticks = tick_loop.tick_id(), "engine shut down");
    Ok(())
}
