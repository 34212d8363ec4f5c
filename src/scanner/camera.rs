//! Camera and display-refresh seams.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Which camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear-facing ("environment") camera.
    Environment,
    User,
}

/// Reasons the platform refused a camera stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// No camera, or no camera API on this platform.
    #[error("camera unavailable")]
    Unavailable,
    /// The user or OS denied access.
    #[error("camera permission denied")]
    PermissionDenied,
}

/// Off-screen RGBA buffer a frame is copied into before decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl FrameBuffer {
    /// Resize to the source dimensions, reusing the allocation.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rgba.resize(width as usize * height as usize * 4, 0);
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A platform camera that can be asked for a video stream.
pub trait Camera {
    type Stream: VideoStream;

    /// Request a stream, preferring `facing`.
    fn open(
        &mut self,
        facing: FacingMode,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// An acquired video stream. Holds the camera until its tracks are stopped.
pub trait VideoStream {
    /// Whether the source currently has at least one decodable frame.
    fn ready(&mut self) -> bool;

    /// Copy the current frame into `buffer`, resizing it to the frame size.
    fn copy_frame(&mut self, buffer: &mut FrameBuffer);

    /// Stop every track. Must be safe to call more than once.
    fn stop_tracks(&mut self);
}

/// Display refresh signal: one tick per rendered frame.
pub trait FrameClock {
    /// Wait for the next rendered frame.
    fn next_frame(&mut self) -> impl Future<Output = ()> + Send;

    /// Drop any pending frame request.
    fn cancel_pending(&mut self);
}

/// [`FrameClock`] driven by a tokio interval at a fixed refresh rate.
///
/// Missed ticks are skipped, never bunched, so decode attempts never run
/// faster than the refresh rate.
#[derive(Debug)]
pub struct IntervalClock {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalClock {
    pub fn new(refresh_hz: u32) -> Self {
        let hz = u64::from(refresh_hz.max(1));
        Self {
            period: Duration::from_micros(1_000_000 / hz),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameClock for IntervalClock {
    fn next_frame(&mut self) -> impl Future<Output = ()> + Send {
        let period = self.period;
        // Created lazily so the clock can be built outside a runtime.
        let interval = self.interval.get_or_insert_with(|| {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        async move {
            interval.tick().await;
        }
    }

    fn cancel_pending(&mut self) {
        self.interval = None;
    }
}
