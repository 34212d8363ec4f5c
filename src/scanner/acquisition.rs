// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The acquisition state machine.
//!
//! One [`AcquisitionLoop`] owns at most one camera stream. A run requests the
//! camera, then races three things until one finishes:
//!
//! 1. the frame loop (one decode attempt per display frame),
//! 2. the acquisition timeout,
//! 3. an explicit cancel.
//!
//! Whichever finishes first decides the terminal state; the others are
//! dropped with the `select!`. The camera is then released. Release also runs
//! before every new request and when the loop is dropped.

use super::camera::{Camera, FacingMode, FrameBuffer, FrameClock, VideoStream};
use super::decoder::QrDecoder;
use super::{matches_token, normalize_payload, ScanFailure, ScanState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

/// Cancels the current acquisition run.
#[derive(Clone, Default)]
pub struct ScanCanceller {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    requested: AtomicBool,
    notify: Notify,
}

impl ScanCanceller {
    /// Request cancellation of the run in progress (if any).
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    fn reset(&self) {
        self.inner.requested.store(false, Ordering::SeqCst);
    }

    async fn cancelled(&self) {
        loop {
            // Registered before the flag check so a concurrent cancel() is not lost.
            let notified = self.inner.notify.notified();
            if self.inner.requested.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// QR acquisition state machine over a camera, a frame clock and a decoder.
pub struct AcquisitionLoop<C, K, D>
where
    C: Camera,
    K: FrameClock,
    D: QrDecoder,
{
    camera: C,
    clock: K,
    decoder: D,
    expected_token: String,
    timeout: Duration,
    stream: Option<C::Stream>,
    buffer: FrameBuffer,
    state: watch::Sender<ScanState>,
    canceller: ScanCanceller,
}

impl<C, K, D> AcquisitionLoop<C, K, D>
where
    C: Camera,
    K: FrameClock,
    D: QrDecoder,
{
    pub fn new(camera: C, clock: K, decoder: D, expected_token: &str, timeout: Duration) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            camera,
            clock,
            decoder,
            expected_token: normalize_payload(expected_token),
            timeout,
            stream: None,
            buffer: FrameBuffer::default(),
            state,
            canceller: ScanCanceller::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Handle that cancels runs of this loop.
    pub fn canceller(&self) -> ScanCanceller {
        self.canceller.clone()
    }

    /// Whether a camera stream is currently held.
    pub fn holds_camera(&self) -> bool {
        self.stream.is_some()
    }

    /// Run one acquisition attempt to a terminal state.
    ///
    /// Calling this again after a terminal state is a retry: any held stream is
    /// released before the camera is requested again.
    pub async fn run(&mut self) -> ScanState {
        self.release();
        self.canceller.reset();
        self.transition(ScanState::Requesting);

        let canceller = self.canceller.clone();
        let stream = tokio::select! {
            biased;
            _ = canceller.cancelled() => return self.finish(ScanState::Failure(ScanFailure::Cancelled)),
            opened = self.camera.open(FacingMode::Environment) => match opened {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "Camera request failed");
                    return self.finish(ScanState::Failure(e.into()));
                }
            },
        };
        self.stream = Some(stream);
        self.transition(ScanState::Scanning);

        let outcome = match self.stream.as_mut() {
            Some(stream) => {
                tokio::select! {
                    biased;
                    _ = canceller.cancelled() => ScanState::Failure(ScanFailure::Cancelled),
                    _ = tokio::time::sleep(self.timeout) => ScanState::Failure(ScanFailure::NoMatchTimeout),
                    payload = sample_until_match(
                        stream,
                        &mut self.clock,
                        &mut self.decoder,
                        &mut self.buffer,
                        &self.expected_token,
                    ) => {
                        tracing::info!(payload = %payload.trim(), "Charger QR code verified");
                        ScanState::Success
                    }
                }
            }
            None => ScanState::Failure(ScanFailure::CameraUnavailable),
        };

        self.finish(outcome)
    }

    /// Stop camera tracks and drop the pending frame request.
    ///
    /// Unconditional and idempotent: safe to call repeatedly and when nothing
    /// was acquired.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            tracing::debug!("Camera released");
        }
        self.clock.cancel_pending();
    }

    fn finish(&mut self, terminal: ScanState) -> ScanState {
        self.release();
        self.transition(terminal);
        terminal
    }

    fn transition(&self, next: ScanState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "Scan state transition");
    }
}

impl<C, K, D> Drop for AcquisitionLoop<C, K, D>
where
    C: Camera,
    K: FrameClock,
    D: QrDecoder,
{
    fn drop(&mut self) {
        self.release();
    }
}

/// Per-frame loop: wait for a frame, copy it, decode once, compare.
/// Returns the first matching payload; never returns otherwise.
async fn sample_until_match<S, K, D>(
    stream: &mut S,
    clock: &mut K,
    decoder: &mut D,
    buffer: &mut FrameBuffer,
    expected: &str,
) -> String
where
    S: VideoStream,
    K: FrameClock,
    D: QrDecoder,
{
    loop {
        clock.next_frame().await;

        if !stream.ready() {
            continue;
        }

        stream.copy_frame(buffer);
        if let Some(payload) = decoder.decode(buffer) {
            if matches_token(&payload, expected) {
                return payload;
            }
            tracing::trace!(payload = %payload, "Decoded QR code does not match charger token");
        }
    }
}

// ─── Spawned loop ────────────────────────────────────────────────

/// A loop running on its own task, driven by start/cancel calls.
///
/// Dropping the handle aborts the task, which drops the loop and releases the
/// camera (the "view went away" path).
pub struct ScanHandle {
    starts: mpsc::UnboundedSender<()>,
    canceller: ScanCanceller,
    state: watch::Receiver<ScanState>,
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// Move `acquisition` onto a new task. It stays `Idle` until [`start`](Self::start).
    pub fn spawn<C, K, D>(mut acquisition: AcquisitionLoop<C, K, D>) -> Self
    where
        C: Camera + Send + 'static,
        C::Stream: Send,
        K: FrameClock + Send + 'static,
        D: QrDecoder + Send + 'static,
    {
        let (starts, mut start_rx) = mpsc::unbounded_channel::<()>();
        let canceller = acquisition.canceller();
        let state = acquisition.subscribe();

        let task = tokio::spawn(async move {
            while start_rx.recv().await.is_some() {
                acquisition.run().await;
            }
        });

        Self {
            starts,
            canceller,
            state,
            task,
        }
    }

    /// Begin an acquisition run.
    pub fn start(&self) -> bool {
        self.starts.send(()).is_ok()
    }

    /// Abandon the current run (if any) and start a fresh one.
    pub fn retry(&self) -> bool {
        self.canceller.cancel();
        self.start()
    }

    /// Cancel the current run.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `pred`.
    pub async fn wait_for<F>(&mut self, pred: F) -> Option<ScanState>
    where
        F: FnMut(&ScanState) -> bool,
    {
        self.state.wait_for(pred).await.ok().map(|s| *s)
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::camera::CameraError;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::AtomicUsize;

    const FRAME: Duration = Duration::from_millis(16);
    const TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Clone, Debug)]
    enum Feed {
        NotReady,
        Code(String),
    }

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        stops: AtomicUsize,
        decodes: AtomicUsize,
        cancels: AtomicUsize,
    }

    struct FakeStream {
        feed: VecDeque<Feed>,
        counters: Arc<Counters>,
    }

    impl VideoStream for FakeStream {
        fn ready(&mut self) -> bool {
            if matches!(self.feed.front(), Some(Feed::NotReady)) {
                self.feed.pop_front();
                return false;
            }
            true
        }

        fn copy_frame(&mut self, buffer: &mut FrameBuffer) {
            let payload = match self.feed.pop_front() {
                Some(Feed::Code(text)) => text.into_bytes(),
                _ => Vec::new(),
            };
            buffer.width = payload.len() as u32;
            buffer.height = 1;
            buffer.rgba = payload;
        }

        fn stop_tracks(&mut self) {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeCamera {
        result: Result<(), CameraError>,
        feed: Vec<Feed>,
        counters: Arc<Counters>,
    }

    impl Camera for FakeCamera {
        type Stream = FakeStream;

        fn open(
            &mut self,
            facing: FacingMode,
        ) -> impl Future<Output = Result<FakeStream, CameraError>> + Send {
            assert_eq!(facing, FacingMode::Environment);
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            let result = self.result.map(|_| FakeStream {
                feed: self.feed.iter().cloned().collect(),
                counters: self.counters.clone(),
            });
            async move { result }
        }
    }

    struct FakeClock {
        counters: Arc<Counters>,
    }

    impl FrameClock for FakeClock {
        fn next_frame(&mut self) -> impl Future<Output = ()> + Send {
            tokio::time::sleep(FRAME)
        }

        fn cancel_pending(&mut self) {
            self.counters.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Reads the frame bytes back as text; empty frames carry no code.
    struct FakeDecoder {
        counters: Arc<Counters>,
    }

    impl QrDecoder for FakeDecoder {
        fn decode(&mut self, frame: &FrameBuffer) -> Option<String> {
            self.counters.decodes.fetch_add(1, Ordering::SeqCst);
            if frame.rgba.is_empty() {
                return None;
            }
            String::from_utf8(frame.rgba.clone()).ok()
        }
    }

    fn code(payload: &str) -> Feed {
        Feed::Code(payload.to_string())
    }

    type TestLoop = AcquisitionLoop<FakeCamera, FakeClock, FakeDecoder>;

    fn make_loop(result: Result<(), CameraError>, feed: Vec<Feed>) -> (TestLoop, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let acquisition = AcquisitionLoop::new(
            FakeCamera {
                result,
                feed,
                counters: counters.clone(),
            },
            FakeClock {
                counters: counters.clone(),
            },
            FakeDecoder {
                counters: counters.clone(),
            },
            "infispark",
            TIMEOUT,
        );
        (acquisition, counters)
    }

    #[tokio::test(start_paused = true)]
    async fn matching_code_succeeds_and_releases_camera() {
        let (mut acq, counters) = make_loop(
            Ok(()),
            vec![
                Feed::NotReady,
                code("hello"),
                code("  InfiSpark \n"),
                code("never reached"),
            ],
        );

        assert_eq!(acq.run().await, ScanState::Success);
        assert_eq!(acq.state(), ScanState::Success);
        assert!(!acq.holds_camera());
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        // NotReady frame is skipped without a decode attempt.
        assert_eq!(counters.decodes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_fails_without_scanning() {
        let (mut acq, counters) = make_loop(Err(CameraError::PermissionDenied), vec![]);
        let mut states = acq.subscribe();

        assert_eq!(
            acq.run().await,
            ScanState::Failure(ScanFailure::PermissionDenied)
        );
        assert_eq!(counters.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
        assert_eq!(
            *states.borrow_and_update(),
            ScanState::Failure(ScanFailure::PermissionDenied)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_camera_is_unavailable() {
        let (mut acq, _) = make_loop(Err(CameraError::Unavailable), vec![]);
        assert_eq!(
            acq.run().await,
            ScanState::Failure(ScanFailure::CameraUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_exactly_once() {
        let (mut acq, counters) = make_loop(Ok(()), vec![code("wrong")]);
        let mut states = acq.subscribe();

        let started = tokio::time::Instant::now();
        let outcome = acq.run().await;
        assert_eq!(outcome, ScanState::Failure(ScanFailure::NoMatchTimeout));
        assert!(started.elapsed() >= TIMEOUT);
        assert!(started.elapsed() < TIMEOUT + FRAME);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);

        states.borrow_and_update();
        let decodes = counters.decodes.load(Ordering::SeqCst);

        // Late frames after the timeout change nothing.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!states.has_changed().unwrap());
        assert_eq!(counters.decodes.load(Ordering::SeqCst), decodes);
        assert_eq!(
            acq.state(),
            ScanState::Failure(ScanFailure::NoMatchTimeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent() {
        let (mut acq, counters) = make_loop(Ok(()), vec![code("infispark")]);

        // Nothing acquired yet.
        acq.release();
        acq.release();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
        assert_eq!(acq.state(), ScanState::Idle);

        assert_eq!(acq.run().await, ScanState::Success);
        acq.release();
        acq.release();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(acq.state(), ScanState::Success);
        assert!(!acq.holds_camera());
    }

    #[tokio::test(start_paused = true)]
    async fn release_cancels_pending_frame_request() {
        let (mut acq, counters) = make_loop(Ok(()), vec![code("infispark")]);
        let before = counters.cancels.load(Ordering::SeqCst);
        acq.run().await;
        // Once before requesting, once on leaving Scanning.
        assert_eq!(counters.cancels.load(Ordering::SeqCst), before + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_requests_a_fresh_stream() {
        let (mut acq, counters) = make_loop(Ok(()), vec![code("infispark")]);

        assert_eq!(acq.run().await, ScanState::Success);
        assert_eq!(acq.run().await, ScanState::Success);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_cancel_stops_scanning() {
        let (acq, counters) = make_loop(Ok(()), vec![]);
        let mut handle = ScanHandle::spawn(acq);

        assert!(handle.start());
        handle.wait_for(|s| *s == ScanState::Scanning).await;
        handle.cancel();

        let end = handle.wait_for(|s| s.is_terminal()).await;
        assert_eq!(end, Some(ScanState::Failure(ScanFailure::Cancelled)));
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_retry_while_scanning_releases_first() {
        let (acq, counters) = make_loop(Ok(()), vec![]);
        let mut handle = ScanHandle::spawn(acq);

        handle.start();
        handle.wait_for(|s| *s == ScanState::Scanning).await;
        handle.retry();

        // The abandoned run ends, then a new stream is opened.
        while counters.opens.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(FRAME).await;
        }
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        handle.wait_for(|s| *s == ScanState::Scanning).await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_releases_camera() {
        let (acq, counters) = make_loop(Ok(()), vec![]);
        let mut handle = ScanHandle::spawn(acq);

        handle.start();
        handle.wait_for(|s| *s == ScanState::Scanning).await;
        drop(handle);

        // Abort lands on the next scheduler turn.
        tokio::time::sleep(FRAME).await;
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    fn payload() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("infispark".to_string()),
            Just("  InfiSpark\n".to_string()),
            Just("infi spark".to_string()),
            Just("infispark!".to_string()),
            "[a-zA-Z ]{0,12}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn succeeds_iff_some_payload_normalizes_to_token(
            payloads in proptest::collection::vec(payload(), 0..12)
        ) {
            let should_match = payloads
                .iter()
                .any(|p| p.trim().to_lowercase() == "infispark");
            let feed = payloads.into_iter().map(Feed::Code).collect();
            let (mut acq, counters) = make_loop(Ok(()), feed);

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let outcome = rt.block_on(acq.run());

            if should_match {
                prop_assert_eq!(outcome, ScanState::Success);
            } else {
                prop_assert_eq!(outcome, ScanState::Failure(ScanFailure::NoMatchTimeout));
            }
            prop_assert!(!acq.holds_camera());
            prop_assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        }
    }
}
