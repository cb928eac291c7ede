//! Process configuration read from the environment and the command line.
//!
//! | Variable           | Meaning                         | Default   |
//! |--------------------|---------------------------------|-----------|
//! | `ENGINE_TICK_RATE` | ticks per second                | `60`      |
//! | `ENGINE_MAX_TICKS` | stop after this many, 0 = never | `0`       |
//! | `ENGINE_ID_MODE`   | `reuse` or `generational`       | `reuse`   |
//!
//! The first command-line argument, if present, is a scene snapshot to load
//! instead of the built-in demo scene. Its format follows the extension.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use engine_component::IdMode;
use engine_system::{SnapshotFormat, WorldConfig};

use crate::tick::TickConfig;

pub const TICK_RATE_ENV: &str = "ENGINE_TICK_RATE";
pub const MAX_TICKS_ENV: &str = "ENGINE_MAX_TICKS";
pub const ID_MODE_ENV: &str = "ENGINE_ID_MODE";

/// Everything `main` needs to start.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub tick: TickConfig,
    pub world: WorldConfig,
    pub scene_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read the process environment and arguments.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), std::env::args().nth(1))
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but does not parse, or if the tick rate
    /// is not positive.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        scene_arg: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(TICK_RATE_ENV) {
            let rate: f64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{TICK_RATE_ENV}={raw:?} is not a number"))?;
            if !(rate.is_finite() && rate > 0.0) {
                bail!("{TICK_RATE_ENV} must be positive, got {rate}");
            }
            config.tick.tick_rate = rate;
        }
        if let Some(raw) = lookup(MAX_TICKS_ENV) {
            config.tick.max_ticks = raw
                .trim()
                .parse()
                .with_context(|| format!("{MAX_TICKS_ENV}={raw:?} is not a tick count"))?;
        }
        if let Some(raw) = lookup(ID_MODE_ENV) {
            let mode: IdMode = raw
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {ID_MODE_ENV}"))?;
            config.world = config.world.with_id_mode(mode);
        }
        config.scene_path = scene_arg.map(PathBuf::from);
        Ok(config)
    }
}

/// Snapshot format implied by `path`'s extension.
///
/// # Errors
///
/// Fails for a missing or unrecognised extension.
pub fn scene_format(path: &Path) -> Result<SnapshotFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SnapshotFormat::from_extension)
        .with_context(|| format!("cannot tell snapshot format of {}", path.display()))
}
