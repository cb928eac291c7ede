//! Fixed-timestep tick loop.
//!
//! Each tick:
//!
//! 1. Await the motion step spawned by the previous tick and apply its
//!    updates to the scene's transforms.
//! 2. Run [`Scene::tick`], which refreshes pending transitions and then runs
//!    every system.
//! 3. Capture a new motion step and hand it to a blocking task.
//!
//! The scene itself never leaves the loop's task; only the captured samples
//! cross to the blocking pool, and at most one step is in flight.

use std::time::{Duration, Instant};

use anyhow::Result;
use engine_system::Scene;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::motion::{MotionStep, MotionUpdate};

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

/// Drives one [`Scene`] at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    scene: Scene,
    /// Motion step spawned by the previous tick, if any.
    in_flight: Option<JoinHandle<Vec<MotionUpdate>>>,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, scene: Scene) -> Self {
        Self {
            config,
            scene,
            in_flight: None,
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.scene.tick_id()
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Wait for the in-flight motion step, if any, and apply it.
    ///
    /// Returns the number of transforms updated.
    ///
    /// # Errors
    ///
    /// Fails if the motion task panicked or if applying its updates fails.
    pub async fn settle_motion(&mut self) -> Result<usize> {
        let Some(task) = self.in_flight.take() else {
            return Ok(0);
        };
        let updates = task.await?;
        let applied = MotionStep::apply(&mut self.scene, &updates)?;
        debug!(
            tick_id = self.tick_id(),
            updates = updates.len(),
            applied,
            "motion step applied"
        );
        Ok(applied)
    }

    /// Run one tick with step length `dt` seconds.
    ///
    /// # Errors
    ///
    /// Propagates motion and scene errors.
    pub async fn tick(&mut self, dt: f64) -> Result<()> {
        self.settle_motion().await?;
        self.scene.tick(dt)?;

        let step = MotionStep::capture(&self.scene, dt as f32)?;
        if !step.is_empty() {
            self.in_flight = Some(tokio::task::spawn_blocking(move || step.integrate()));
        }
        Ok(())
    }

    /// Run for the configured number of ticks, or until `ctrl_c` when
    /// unlimited. Any motion step still in flight is applied before
    /// returning.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`TickLoop::tick`].
    pub async fn run_async(&mut self) -> Result<()> {
        let tick_duration = self.config.tick_duration();
        let dt = tick_duration.as_secs_f64();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(dt).await?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                tokio::select! {
                    () = tokio::time::sleep(tick_duration - elapsed) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!(ticks = tick_count, "interrupted, stopping tick loop");
                        break;
                    }
                }
            } else {
                warn!(
                    tick_id = self.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        self.settle_motion().await?;
        Ok(())
    }
}
