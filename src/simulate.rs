// 文件: simulate.rs
// 作用: 在确定性的 FrameLoop 上运行一个弹簧，记录每一帧的值和速度。
// 命令行的 `oscilla simulate` 用它输出表格或 JSON。

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;

use crate::animation::{Clock, ConfigError, Spring, SpringConfig, SpringConfigPatch};
use crate::cli::UpdateAt;
use crate::frame_clock::FrameLoop;

/// One `update` notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSample {
    /// Index of the frame, counted from the start of the simulation.
    pub frame: u64,
    /// Frame timestamp in milliseconds.
    pub time_ms: f64,
    pub value: f64,
    pub velocity: f64,
}

/// Result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub config: SpringConfig,
    pub samples: Vec<FrameSample>,
    /// Whether the spring came to rest within the frame budget.
    pub settled: bool,
    pub frames: u64,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub config: SpringConfig,
    pub refresh_interval: Duration,
    pub rate: f64,
    pub max_frames: u64,
    pub updates: Vec<UpdateAt>,
}

impl Simulation {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            config,
            refresh_interval: crate::frame_clock::DEFAULT_REFRESH_INTERVAL,
            rate: 1.,
            max_frames: 1000,
            updates: Vec::new(),
        }
    }

    /// Sets the refresh interval from a refresh rate in Hz.
    pub fn with_refresh_hz(mut self, hz: f64) -> Self {
        if !(hz.is_finite() && hz > 0.) {
            warn!("ignoring invalid refresh rate {hz}");
            return self;
        }

        match Duration::try_from_secs_f64(1. / hz) {
            Ok(interval) => self.refresh_interval = interval,
            Err(err) => warn!("ignoring invalid refresh rate {hz}: {err}"),
        }
        self
    }

    /// Runs the spring until it stops or `max_frames` frames have passed.
    ///
    /// Patches are applied right before their frame, in the order given. A patch scheduled
    /// after the spring stopped restarts it.
    pub fn run(&self) -> Result<Report, ConfigError> {
        let _span = tracy_client::span!("Simulation::run");

        let mut clock = Clock::with_time(Duration::ZERO);
        clock.set_rate(self.rate);
        let frame_loop = FrameLoop::new(clock, self.refresh_interval);
        let spring = Spring::new(self.config, frame_loop.clone())?;

        let samples = Rc::new(RefCell::new(Vec::new()));
        let samples_ = samples.clone();
        let frame_loop_ = frame_loop.clone();
        spring.on_update(Rc::new(move |spring: &Spring| {
            samples_.borrow_mut().push(FrameSample {
                frame: frame_loop_.frames(),
                time_ms: frame_loop_.clock().now_unadjusted().as_secs_f64() * 1000.,
                value: spring.current_value(),
                velocity: spring.current_velocity(),
            });
        }));

        let mut updates = self.updates.clone();
        updates.sort_by_key(|update| update.frame);
        let mut updates = updates.into_iter().peekable();

        spring.start();

        let mut frame = 0;
        while frame < self.max_frames {
            let mut patched = false;
            while let Some(update) = updates.next_if(|update| update.frame <= frame) {
                spring.update_config(update.patch)?;
                patched = true;
            }
            if patched && !spring.is_animating() {
                spring.start();
            }

            if frame_loop.pending() == 0 && updates.peek().is_none() {
                break;
            }

            frame_loop.advance();
            frame += 1;
        }

        let settled = !spring.is_animating() && spring.is_at_rest();
        if !settled {
            warn!("spring did not come to rest within {} frames", self.max_frames);
        }

        let samples = samples.take();
        debug!(frames = frame, samples = samples.len(), "simulation finished");

        Ok(Report {
            config: spring.config(),
            samples,
            settled,
            frames: frame,
        })
    }
}

/// Merges command line overrides into `config`.
pub fn apply_overrides(
    config: SpringConfig,
    overrides: &SpringConfigPatch,
) -> Result<SpringConfig, ConfigError> {
    let config = config.merged(overrides);
    config.validate()?;
    Ok(config)
}
