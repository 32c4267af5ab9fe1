// 文件: animation/mod.rs
// 作用: 弹簧动画引擎：持有配置和运动状态，每帧推进一次，静止后自动停止。
//       在帧之间可以随时修改配置（目标值、刚度、速度等），运动保持连续。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

pub use oscilla_config::{ConfigError, SpringConfig, SpringConfigPatch};

use crate::frame_clock::{FrameHandle, FrameScheduler};

mod clock;
pub use clock::Clock;

mod listeners;
pub use listeners::{Callback, Event, Listeners};

mod spring;
pub use spring::{Motion, Regime, SpringParams};

/// Frame-driven damped spring animating one scalar.
///
/// `Spring` is a cheap handle: clones refer to the same spring. It is single-threaded and
/// driven by a [`FrameScheduler`], which it asks for at most one frame at a time while
/// animating. Each frame advances the spring once along the exact solution of the damped
/// oscillator and notifies `update` listeners; once the spring is at rest it snaps to the
/// target, notifies `stop` listeners and stops asking for frames.
///
/// Listener callbacks run synchronously from [`Spring::start`], [`Spring::stop`] or the frame
/// callback, without any internal borrow held. They may freely call back into the spring. A
/// panicking listener is not caught and unwinds into whoever drove the call.
#[derive(Clone)]
pub struct Spring {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    config: SpringConfig,
    value: f64,
    velocity: f64,
    /// Timestamp of the last applied step. `None` until the first frame of a run.
    last_timestamp: Option<Duration>,
    active: bool,
    pending: Option<PendingFrame>,
    next_token: u64,
    scheduler: Box<dyn FrameScheduler>,
    listeners: Listeners,
}

#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    token: u64,
    handle: FrameHandle,
}

impl Spring {
    /// Creates a spring at rest at `config.from_value`.
    ///
    /// Fails if the configuration has invalid parameters.
    pub fn new(
        config: SpringConfig,
        scheduler: impl FrameScheduler + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        note_overdamping(&config);

        let inner = Inner {
            value: config.from_value,
            velocity: config.initial_velocity,
            config,
            last_timestamp: None,
            active: false,
            pending: None,
            next_token: 0,
            scheduler: Box::new(scheduler),
            listeners: Listeners::default(),
        };

        Ok(Self {
            inner: Rc::new(RefCell::new(inner)),
        })
    }

    /// Creates a spring with [`SpringConfig::default`].
    pub fn with_defaults(scheduler: impl FrameScheduler + 'static) -> Result<Self, ConfigError> {
        Self::new(SpringConfig::default(), scheduler)
    }

    /// Starts a new run from `from_value` with `initial_velocity`.
    ///
    /// Does nothing if the spring is already animating. Notifies `start` listeners before any
    /// motion. If the spring is already at rest, it notifies `stop` listeners right away and
    /// does not ask for a frame.
    pub fn start(&self) -> &Self {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.active {
                return self;
            }

            // 每次启动都从配置的起点和初速度重新开始
            inner.value = inner.config.from_value;
            inner.velocity = inner.config.initial_velocity;
            inner.last_timestamp = None;
            inner.active = true;

            debug!(
                from = inner.config.from_value,
                to = inner.config.to_value,
                velocity = inner.velocity,
                "spring started"
            );
        }

        self.emit(Event::Start);

        let mut inner = self.inner.borrow_mut();
        // A start listener may have stopped the spring already.
        if !inner.active {
            return self;
        }

        if inner.is_at_rest() {
            inner.settle();
            inner.active = false;
            debug!("spring started at rest");
            drop(inner);

            self.emit(Event::Stop);
            return self;
        }

        self.schedule(&mut inner);
        self
    }

    /// Stops the spring where it is and notifies `stop` listeners.
    ///
    /// Does nothing if the spring is not animating. The spring is not snapped to the target, so
    /// [`Spring::is_at_rest`] tells an interrupted run from a settled one.
    pub fn stop(&self) -> &Self {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.active {
                return self;
            }

            inner.active = false;
            inner.cancel_pending();
            debug!(value = inner.value, velocity = inner.velocity, "spring stopped");
        }

        self.emit(Event::Stop);
        self
    }

    /// Applies the fields present in `patch` to the live configuration.
    ///
    /// Parameter and target changes take effect on the next frame, continuing from the current
    /// value and velocity. `from_value` alone only moves the spring between [`Spring::start`] and
    /// the first frame of the run. While animating, `initial_velocity` replaces the current
    /// velocity right away, and `from_value` together with `initial_velocity` replaces the whole
    /// current state.
    ///
    /// Never notifies listeners: if the spring ends up at rest, the next frame stops it. On
    /// error nothing is changed.
    pub fn update_config(&self, patch: SpringConfigPatch) -> Result<&Self, ConfigError> {
        let mut inner = self.inner.borrow_mut();

        // 先合并再校验，失败时不改动任何状态
        let config = inner.config.merged(&patch);
        config.validate()?;

        if patch.stiffness.is_some()
            || patch.damping.is_some()
            || patch.mass.is_some()
            || patch.allows_overdamping.is_some()
        {
            note_overdamping(&config);
        }

        inner.config = config;

        if inner.active {
            match (patch.from_value, patch.initial_velocity) {
                (Some(value), Some(velocity)) => {
                    inner.value = value;
                    inner.velocity = velocity;
                }
                // 还没有推进过任何一帧，起点仍可以改。
                (Some(value), None) if inner.last_timestamp.is_none() => inner.value = value,
                (None, Some(velocity)) => inner.velocity = velocity,
                _ => (),
            }
        }

        trace!(?patch, "spring config updated");
        Ok(self)
    }

    /// Registers a listener notified when a run starts.
    pub fn on_start(&self, callback: Callback) -> &Self {
        self.inner.borrow_mut().listeners.add(Event::Start, callback);
        self
    }

    /// Registers a listener notified once per frame while animating.
    pub fn on_update(&self, callback: Callback) -> &Self {
        self.inner
            .borrow_mut()
            .listeners
            .add(Event::Update, callback);
        self
    }

    /// Registers a listener notified when a run ends, settled or interrupted.
    pub fn on_stop(&self, callback: Callback) -> &Self {
        self.inner.borrow_mut().listeners.add(Event::Stop, callback);
        self
    }

    /// Removes every registration of this exact callback.
    pub fn remove_listener(&self, callback: &Callback) -> &Self {
        self.inner.borrow_mut().listeners.remove(callback);
        self
    }

    pub fn remove_all_listeners(&self) -> &Self {
        self.inner.borrow_mut().listeners.clear();
        self
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn current_value(&self) -> f64 {
        self.inner.borrow().value
    }

    pub fn current_velocity(&self) -> f64 {
        self.inner.borrow().velocity
    }

    /// Whether both the displacement from the target and the speed are within the rest
    /// thresholds.
    pub fn is_at_rest(&self) -> bool {
        self.inner.borrow().is_at_rest()
    }

    /// Whether a run is in progress.
    pub fn is_animating(&self) -> bool {
        self.inner.borrow().active
    }

    pub fn config(&self) -> SpringConfig {
        self.inner.borrow().config
    }

    fn schedule(&self, inner: &mut Inner) {
        if inner.pending.is_some() {
            return;
        }

        let token = inner.next_token;
        inner.next_token += 1;

        // 帧回调只持有弱引用，弹簧被丢弃后回调什么也不做
        let weak = Rc::downgrade(&self.inner);
        let handle = inner.scheduler.request_frame(Box::new(move |now| {
            if let Some(inner) = weak.upgrade() {
                Spring { inner }.on_frame(token, now);
            }
        }));

        inner.pending = Some(PendingFrame { token, handle });
    }

    fn on_frame(&self, token: u64, now: Duration) {
        let _span = tracy_client::span!("Spring::on_frame");

        let settled = {
            let mut inner = self.inner.borrow_mut();
            // Stale frame from a cancelled request.
            if inner.pending.map(|pending| pending.token) != Some(token) {
                return;
            }
            inner.pending = None;

            if !inner.active {
                return;
            }

            inner.step(now)
        };

        self.emit(Event::Update);

        let mut inner = self.inner.borrow_mut();
        // Update listeners may have stopped or restarted the spring.
        if !inner.active || inner.pending.is_some() {
            return;
        }

        if settled {
            inner.active = false;
            debug!(value = inner.value, "spring came to rest");
            drop(inner);

            self.emit(Event::Stop);
        } else {
            self.schedule(&mut inner);
        }
    }

    fn emit(&self, event: Event) {
        let callbacks = self.inner.borrow().listeners.snapshot(event);
        for callback in callbacks {
            callback(self);
        }
    }
}

impl Inner {
    /// Applies one step up to `now` and returns whether the spring settled.
    fn step(&mut self, now: Duration) -> bool {
        // 每次运行的第一帧只记录时间原点，不推进。
        let dt = match self.last_timestamp {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last_timestamp = Some(now);

        if !dt.is_zero() {
            let to = self.config.to_value;
            let params = SpringParams::from_config(&self.config);
            let motion = params.advance(Motion::new(self.value - to, self.velocity), dt);

            self.value = to + motion.displacement;
            self.velocity = motion.velocity;
        }

        trace!(?dt, value = self.value, velocity = self.velocity, "spring step");

        if self.is_overshooting() || self.is_at_rest() {
            self.settle();
            true
        } else {
            false
        }
    }

    fn is_at_rest(&self) -> bool {
        (self.value - self.config.to_value).abs() <= self.config.rest_displacement_threshold
            && self.velocity.abs() <= self.config.rest_speed_threshold
    }

    /// Whether the value crossed the target in the direction of travel from `from_value`.
    fn is_overshooting(&self) -> bool {
        let SpringConfig {
            from_value: from,
            to_value: to,
            overshoot_clamping,
            ..
        } = self.config;

        overshoot_clamping && ((from < to && self.value > to) || (from > to && self.value < to))
    }

    /// Snaps to exactly the target so that repeated reads are stable.
    fn settle(&mut self) {
        self.value = self.config.to_value;
        self.velocity = 0.;
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.scheduler.cancel_frame(pending.handle);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl fmt::Debug for Spring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Spring")
            .field("config", &inner.config)
            .field("value", &inner.value)
            .field("velocity", &inner.velocity)
            .field("active", &inner.active)
            .field("listeners", &inner.listeners)
            .finish()
    }
}

fn note_overdamping(config: &SpringConfig) {
    if !config.allows_overdamping && config.damping > config.critical_damping() {
        debug!(
            damping_ratio = config.damping_ratio(),
            "overdamped spring, clamping to critical damping"
        );
    }
}
