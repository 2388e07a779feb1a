//! Wall-clock driven animation tick
//!
//! The host owns the frame loop. The clock asks for the next frame through a
//! [`FrameScheduler`] and the host calls [`AnimationClock::on_frame`] with a
//! timestamp when it fires.

use tracing::debug;

/// Tick counter wraps at this value
pub const TICK_MODULUS: u32 = 2048;

/// Ticks per second at flow speed 1
pub const TICKS_PER_SECOND: f64 = 10.0;

/// "Run a callback on the next frame" primitive supplied by the host
pub trait FrameScheduler {
    fn request_frame(&mut self);

    /// Drop a pending request. Harmless when nothing is pending.
    fn cancel_frame(&mut self);
}

#[derive(Clone, Debug, Default)]
pub struct AnimationClock {
    tick: u32,
    running: bool,
    /// Timestamp of the previous frame in seconds
    last_ts: Option<f64>,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self, sched: &mut dyn FrameScheduler) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_ts = None;
        sched.request_frame();
        debug!(tick = self.tick, "Clock started");
    }

    /// Halt and forget the last timestamp. The tick is kept.
    pub fn stop(&mut self, sched: &mut dyn FrameScheduler) {
        if !self.running {
            return;
        }
        self.running = false;
        self.last_ts = None;
        sched.cancel_frame();
        debug!(tick = self.tick, "Clock stopped");
    }

    /// Set the tick directly, wrapped into range
    pub fn seek(&mut self, tick: u32) {
        self.tick = tick % TICK_MODULUS;
    }

    /// Advance for a frame at `ts` seconds. Returns the ticks advanced, zero
    /// when stopped. Requests the following frame while running.
    pub fn on_frame(&mut self, ts: f64, flow_speed: f64, sched: &mut dyn FrameScheduler) -> u32 {
        if !self.running {
            return 0;
        }
        let dt = match self.last_ts {
            Some(last) if ts.is_finite() => (ts - last).max(0.0),
            _ => 0.0,
        };
        if ts.is_finite() {
            self.last_ts = Some(ts);
        }
        let advance = (dt * TICKS_PER_SECOND * flow_speed).floor();
        let advance = if advance.is_finite() && advance >= 1.0 {
            (advance.min(TICK_MODULUS as f64) as u32).max(1)
        } else {
            1
        };
        self.tick = (self.tick + advance) % TICK_MODULUS;
        sched.request_frame();
        advance
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::FrameScheduler;

    /// Counts scheduler traffic; `pending` mirrors a single outstanding request
    #[derive(Debug, Default)]
    pub struct ManualScheduler {
        pub pending: bool,
        pub requests: usize,
        pub cancels: usize,
    }

    impl FrameScheduler for ManualScheduler {
        fn request_frame(&mut self) {
            self.pending = true;
            self.requests += 1;
        }

        fn cancel_frame(&mut self) {
            self.pending = false;
            self.cancels += 1;
        }
    }
}
