// 文件: frame_clock.rs
// 作用: 帧调度。弹簧只依赖 FrameScheduler 这一个原语：
//   "下一帧调用这个回调一次，并给我一个可以取消的句柄"。
// FrameLoop 是一个确定性的宿主实现，测试和命令行都用它驱动弹簧。

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroU64;
use std::rc::Rc;
use std::time::Duration;

use crate::animation::Clock;

/// Refresh interval of a 60 Hz display.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Callback run once on the next frame with the frame timestamp.
pub type FrameCallback = Box<dyn FnOnce(Duration)>;

/// Handle to a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Host primitive for per-frame callbacks.
pub trait FrameScheduler {
    /// Requests `callback` to be run once on the next frame.
    ///
    /// The callback must not run from inside this call.
    fn request_frame(&mut self, callback: FrameCallback) -> FrameHandle;

    /// Cancels a pending request. Unknown or already fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Deterministic frame loop driven by explicit [`FrameLoop::advance`] calls.
///
/// Each frame moves the clock forward by the refresh interval and runs every request that was
/// pending when the frame began. Requests made while a frame runs wait for the next one.
#[derive(Clone)]
pub struct FrameLoop {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    clock: Clock,
    refresh_interval_ns: NonZeroU64,
    next_id: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
    /// Handles cancelled while the frame they belong to is being dispatched.
    cancelled: Vec<FrameHandle>,
    frames: u64,
}

impl FrameLoop {
    pub fn new(clock: Clock, refresh_interval: Duration) -> Self {
        let nanos = u64::try_from(refresh_interval.as_nanos()).unwrap_or(u64::MAX);
        let refresh_interval_ns = NonZeroU64::new(nanos).unwrap_or(NonZeroU64::MIN);

        Self {
            inner: Rc::new(RefCell::new(Inner {
                clock,
                refresh_interval_ns,
                next_id: 1,
                pending: Vec::new(),
                cancelled: Vec::new(),
                frames: 0,
            })),
        }
    }

    /// Creates a 60 Hz loop with a clock starting at zero.
    pub fn with_default_refresh() -> Self {
        Self::new(Clock::with_time(Duration::ZERO), DEFAULT_REFRESH_INTERVAL)
    }

    pub fn clock(&self) -> Clock {
        self.inner.borrow().clock.clone()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_nanos(self.inner.borrow().refresh_interval_ns.get())
    }

    /// Number of requests waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Number of frames run so far.
    pub fn frames(&self) -> u64 {
        self.inner.borrow().frames
    }

    /// Runs one frame and returns its timestamp.
    pub fn advance(&self) -> Duration {
        let _span = tracy_client::span!("FrameLoop::advance");

        let (now, batch) = {
            let mut inner = self.inner.borrow_mut();
            let interval = Duration::from_nanos(inner.refresh_interval_ns.get());
            inner.clock.advance_unadjusted(interval);
            inner.frames += 1;
            inner.cancelled.clear();
            (inner.clock.now(), std::mem::take(&mut inner.pending))
        };

        trace!(?now, requests = batch.len(), "running frame");

        // No borrow is held while callbacks run: they are expected to request new frames.
        for (handle, callback) in batch {
            let cancelled = self.inner.borrow().cancelled.contains(&handle);
            if cancelled {
                continue;
            }
            callback(now);
        }

        self.inner.borrow_mut().cancelled.clear();
        now
    }

    /// Runs as many whole frames as fit into `duration` and returns how many ran.
    pub fn run_for(&self, duration: Duration) -> u64 {
        let interval = self.inner.borrow().refresh_interval_ns.get();
        let frames = u64::try_from(duration.as_nanos() / u128::from(interval)).unwrap_or(u64::MAX);
        for _ in 0..frames {
            self.advance();
        }
        frames
    }

    /// Runs frames until nothing is pending or `max_frames` frames have run.
    pub fn run_until_idle(&self, max_frames: u64) -> u64 {
        let mut frames = 0;
        while frames < max_frames && self.pending() > 0 {
            self.advance();
            frames += 1;
        }
        frames
    }
}

impl FrameScheduler for FrameLoop {
    fn request_frame(&mut self, callback: FrameCallback) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = FrameHandle(inner.next_id);
        inner.next_id += 1;
        inner.pending.push((handle, callback));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut inner = self.inner.borrow_mut();
        let before = inner.pending.len();
        inner.pending.retain(|(h, _)| *h != handle);
        if inner.pending.len() == before {
            // Possibly part of the frame being dispatched right now.
            inner.cancelled.push(handle);
        }
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::with_default_refresh()
    }
}

impl fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FrameLoop")
            .field("clock", &inner.clock)
            .field("refresh_interval_ns", &inner.refresh_interval_ns)
            .field("pending", &inner.pending.len())
            .field("frames", &inner.frames)
            .finish()
    }
}
