//! Recompression orchestrator.
//!
//! Turns a stream of user edits into compression jobs and publishes only the
//! newest result. The discipline is last-write-wins, not a queue:
//!
//! ```text
//! upload / preset switch ──────────────► issue(seq = n+1) ──► worker pool
//! quality / size edit ──► debounce ──────┘   │ cancels seq n      │
//!                                            ▼                    ▼
//!                               ResultSlot  ◄── publish(seq) ── job done
//!                               (rejects any seq that is not the latest issued)
//! ```
//!
//! ## Ordering
//!
//! Every issued request takes the next sequence number. A finishing job may
//! only write the slot if its number is still the highest issued, so a slow
//! stale job can never overwrite a newer one regardless of completion order.
//! Issuing also trips the previous job's [`CancelToken`]; the encoder checks
//! it between quality-search steps and gives up early.
//!
//! ## Debounce
//!
//! Quality and dimension edits go through [`Orchestrator::submit_debounced`].
//! Each edit restarts the quiet-period timer and replaces the pending
//! request. Any input, debounced or not, bumps an input epoch; a pending
//! request whose epoch is no longer current when its timer fires is dropped,
//! so a late timer cannot resurrect settings the user already moved past.
//!
//! ## Uploads
//!
//! A new source image is committed together with its first published result,
//! so [`Orchestrator::source`] and [`Orchestrator::current`] always describe
//! the same image and a failed first upload leaves the orchestrator Idle.
//! While an upload is in flight, edits are refused with `SourceLoading`:
//! they could only be built against the previous image.
//!
//! ## Failures
//!
//! `UnknownPreset`, `InvalidBounds` and `SourceLoading` are returned
//! synchronously and schedule nothing. Decode and encode failures arrive as [`OrchestratorEvent::Failed`].
//! Neither kind clears the current result. Cancellation is silent.

use crate::config::CompressorConfig;
use crate::error::CompressError;
use crate::imaging::{
    CancelToken, CustomBounds, EncodeSettings, ImageBackend, Quality, compress, preset_bounds,
};
use crate::preset::Preset;
use crate::types::{CompressedResult, CompressionRequest, SourceImage};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No source image loaded.
    Idle,
    /// A source image is loaded and nothing is in flight.
    Ready,
    /// A request is in flight.
    Compressing,
}

/// Outcomes delivered to the collaborator. Cancelled requests produce no event.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Published {
        seq: u64,
        /// The preset the request was issued with.
        preset: Preset,
        result: Arc<CompressedResult>,
    },
    Failed {
        seq: u64,
        error: CompressError,
    },
}

impl OrchestratorEvent {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Published { seq, .. } | Self::Failed { seq, .. } => *seq,
        }
    }
}

/// Identifies an issued request so it can be cancelled.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    seq: u64,
    cancel: CancelToken,
}

impl RequestHandle {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// The single mutable cell holding the latest result, plus the bookkeeping
/// that decides whether a finishing job may write it.
#[derive(Debug, Default)]
struct ResultSlot {
    source: Option<Arc<SourceImage>>,
    current: Option<Arc<CompressedResult>>,
    last_error: Option<CompressError>,
    latest_issued: u64,
    in_flight: Option<(u64, CancelToken)>,
    /// Sequence number of an upload that has not settled yet.
    uploading: Option<u64>,
    input_epoch: u64,
}

impl ResultSlot {
    /// Record that the user changed something. In-flight work is now stale.
    fn note_input(&mut self) -> u64 {
        self.input_epoch += 1;
        if let Some((_, token)) = &self.in_flight {
            token.cancel();
        }
        self.input_epoch
    }

    fn issue(&mut self) -> RequestHandle {
        self.latest_issued += 1;
        let cancel = CancelToken::new();
        if let Some((_, previous)) = self.in_flight.replace((self.latest_issued, cancel.clone())) {
            previous.cancel();
        }
        RequestHandle {
            seq: self.latest_issued,
            cancel,
        }
    }

    fn is_latest(&self, seq: u64) -> bool {
        seq == self.latest_issued
    }

    fn settle(&mut self, seq: u64) {
        if self.in_flight.as_ref().is_some_and(|(s, _)| *s == seq) {
            self.in_flight = None;
        }
        if self.uploading == Some(seq) {
            self.uploading = None;
        }
    }

    /// Store `result` and the image it was built from if `seq` is still the
    /// newest issued request.
    fn publish(
        &mut self,
        seq: u64,
        source: Arc<SourceImage>,
        result: Arc<CompressedResult>,
    ) -> bool {
        self.settle(seq);
        if !self.is_latest(seq) {
            return false;
        }
        self.source = Some(source);
        self.current = Some(result);
        self.last_error = None;
        true
    }

    /// Record a failure if `seq` is still the newest issued request. The
    /// current result is left alone.
    fn fail(&mut self, seq: u64, error: CompressError) -> bool {
        self.settle(seq);
        if !self.is_latest(seq) {
            return false;
        }
        self.last_error = Some(error);
        true
    }

    /// The loaded image, unless an upload is about to replace it.
    fn loaded_source(&self) -> Result<Arc<SourceImage>, CompressError> {
        if self.uploading.is_some() {
            return Err(CompressError::SourceLoading);
        }
        self.source.clone().ok_or(CompressError::NoSourceImage)
    }

    fn state(&self) -> OrchestratorState {
        if self.in_flight.is_some() {
            OrchestratorState::Compressing
        } else if self.current.is_some() {
            OrchestratorState::Ready
        } else {
            OrchestratorState::Idle
        }
    }
}

enum Job {
    Upload {
        bytes: Vec<u8>,
        preset: Preset,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    },
    Compress(CompressionRequest),
}

struct Pending {
    epoch: u64,
    request: CompressionRequest,
    deadline: Instant,
}

struct Inner {
    backend: Arc<dyn ImageBackend>,
    settings: EncodeSettings,
    pool: rayon::ThreadPool,
    slot: Mutex<ResultSlot>,
    events: Sender<OrchestratorEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ResultSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(self: &Arc<Self>, handle: &RequestHandle, job: Job) {
        let inner = Arc::clone(self);
        let seq = handle.seq;
        let cancel = handle.cancel.clone();
        self.pool.spawn(move || inner.run(seq, &cancel, job));
    }

    fn run(&self, seq: u64, cancel: &CancelToken, job: Job) {
        let preset = match &job {
            Job::Upload { preset, .. } => *preset,
            Job::Compress(request) => request.preset,
        };
        let outcome = match job {
            Job::Compress(request) => {
                compress(self.backend.as_ref(), &request, &self.settings, cancel)
                    .map(|result| (request.source, result))
            }
            Job::Upload {
                bytes,
                preset,
                quality,
                custom_bounds,
            } => self.decode_and_compress(seq, cancel, &bytes, preset, quality, custom_bounds),
        };
        self.finish(seq, preset, cancel, outcome);
    }

    fn decode_and_compress(
        &self,
        seq: u64,
        cancel: &CancelToken,
        bytes: &[u8],
        preset: Preset,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    ) -> Result<(Arc<SourceImage>, CompressedResult), CompressError> {
        if cancel.is_cancelled() {
            return Err(CompressError::Cancelled);
        }
        let source = SourceImage::decode(self.backend.as_ref(), bytes)?;
        if cancel.is_cancelled() {
            return Err(CompressError::Cancelled);
        }
        log::debug!(
            "request #{seq}: decoded {}x{} source ({} bytes)",
            source.dimensions().width,
            source.dimensions().height,
            source.original_byte_size()
        );
        let request = CompressionRequest::new(source, preset, quality, custom_bounds);
        let result = compress(self.backend.as_ref(), &request, &self.settings, cancel)?;
        Ok((request.source, result))
    }

    fn finish(
        &self,
        seq: u64,
        preset: Preset,
        cancel: &CancelToken,
        outcome: Result<(Arc<SourceImage>, CompressedResult), CompressError>,
    ) {
        // A job cancelled during its last encode still returns a result.
        let outcome = if cancel.is_cancelled() {
            Err(CompressError::Cancelled)
        } else {
            outcome
        };
        let mut slot = self.lock();
        let event = match outcome {
            Ok((source, result)) => {
                let result = Arc::new(result);
                if !slot.publish(seq, source, Arc::clone(&result)) {
                    log::debug!("request #{seq}: discarding stale result");
                    return;
                }
                log::info!(
                    "request #{seq}: {}x{} at q{} → {} bytes",
                    result.width,
                    result.height,
                    result.quality_used,
                    result.byte_size
                );
                OrchestratorEvent::Published {
                    seq,
                    preset,
                    result,
                }
            }
            Err(CompressError::Cancelled) => {
                slot.settle(seq);
                log::debug!("request #{seq}: cancelled");
                return;
            }
            Err(error) => {
                if !slot.fail(seq, error.clone()) {
                    log::debug!("request #{seq}: discarding stale failure: {error}");
                    return;
                }
                log::warn!("request #{seq}: {error}");
                OrchestratorEvent::Failed { seq, error }
            }
        };
        // Sent under the lock so events arrive in slot order.
        if self.events.send(event).is_err() {
            log::debug!("request #{seq}: event receiver gone");
        }
    }

    fn fire_debounced(self: &Arc<Self>, pending: Pending) {
        let handle = {
            let mut slot = self.lock();
            if slot.input_epoch != pending.epoch {
                log::debug!("dropping debounced request superseded by newer input");
                return;
            }
            slot.issue()
        };
        self.spawn(&handle, Job::Compress(pending.request));
    }
}

/// Sequences compression requests for one source image at a time.
///
/// Results and failures are delivered on the `events` channel given to
/// [`Orchestrator::new`]; the latest result is also readable via
/// [`Orchestrator::current`].
pub struct Orchestrator {
    inner: Arc<Inner>,
    debounce: Duration,
    timer_tx: Option<Sender<Pending>>,
    timer: Option<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        config: &CompressorConfig,
        events: Sender<OrchestratorEvent>,
    ) -> std::io::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.orchestrator.workers.max(1))
            .thread_name(|i| format!("compress-{i}"))
            .build()
            .map_err(std::io::Error::other)?;

        let inner = Arc::new(Inner {
            backend,
            settings: config.encode_settings(),
            pool,
            slot: Mutex::new(ResultSlot::default()),
            events,
        });

        let (timer_tx, timer_rx) = mpsc::channel();
        let timer_inner = Arc::clone(&inner);
        let timer = std::thread::Builder::new()
            .name("debounce".into())
            .spawn(move || debounce_loop(&timer_inner, &timer_rx))?;

        Ok(Self {
            inner,
            debounce: config.orchestrator.debounce(),
            timer_tx: Some(timer_tx),
            timer: Some(timer),
        })
    }

    /// Load new image bytes and compress them straight away.
    ///
    /// Decoding runs on the worker pool; a bad file arrives as a
    /// `DecodeFailure` event. Bad custom bounds are rejected here.
    pub fn upload(
        &self,
        bytes: Vec<u8>,
        preset: Preset,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    ) -> Result<RequestHandle, CompressError> {
        preset_bounds(&preset, custom_bounds, self.inner.settings.max_custom_dimension)?;
        let handle = {
            let mut slot = self.inner.lock();
            slot.note_input();
            let handle = slot.issue();
            slot.uploading = Some(handle.seq);
            handle
        };
        log::debug!("request #{}: upload of {} bytes", handle.seq, bytes.len());
        self.inner.spawn(
            &handle,
            Job::Upload {
                bytes,
                preset,
                quality,
                custom_bounds,
            },
        );
        Ok(handle)
    }

    /// Issue a request immediately (preset switches).
    pub fn submit(&self, request: CompressionRequest) -> Result<RequestHandle, CompressError> {
        self.validate(&request)?;
        let handle = {
            let mut slot = self.inner.lock();
            if slot.uploading.is_some() {
                return Err(CompressError::SourceLoading);
            }
            slot.note_input();
            slot.issue()
        };
        log::debug!(
            "request #{}: {} at q{}",
            handle.seq,
            request.preset.name,
            request.quality.value()
        );
        self.inner.spawn(&handle, Job::Compress(request));
        Ok(handle)
    }

    /// Issue a request once input has been quiet for the debounce period
    /// (quality slider, dimension fields). A later call replaces this one.
    pub fn submit_debounced(&self, request: CompressionRequest) -> Result<(), CompressError> {
        self.validate(&request)?;
        let epoch = {
            let mut slot = self.inner.lock();
            if slot.uploading.is_some() {
                return Err(CompressError::SourceLoading);
            }
            slot.note_input()
        };
        let pending = Pending {
            epoch,
            request,
            deadline: Instant::now() + self.debounce,
        };
        if let Some(tx) = &self.timer_tx {
            if tx.send(pending).is_err() {
                log::warn!("debounce timer stopped; edit dropped");
            }
        }
        Ok(())
    }

    /// Best-effort cooperative cancellation. A cancelled request publishes nothing.
    pub fn cancel(&self, handle: &RequestHandle) {
        handle.cancel.cancel();
    }

    /// Build a request against the currently loaded image.
    ///
    /// Fails with `NoSourceImage` while Idle and `SourceLoading` while an
    /// upload is still in flight.
    pub fn request(
        &self,
        preset: Preset,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    ) -> Result<CompressionRequest, CompressError> {
        let source = self.inner.lock().loaded_source()?;
        Ok(CompressionRequest::new(source, preset, quality, custom_bounds))
    }

    /// Drop the loaded image and result, cancelling anything in flight.
    pub fn reset(&self) {
        let mut slot = self.inner.lock();
        slot.note_input();
        // Retire the in-flight sequence number so a late finisher cannot publish.
        let retired = slot.issue();
        retired.cancel.cancel();
        slot.in_flight = None;
        slot.uploading = None;
        slot.source = None;
        slot.current = None;
        slot.last_error = None;
    }

    pub fn state(&self) -> OrchestratorState {
        self.inner.lock().state()
    }

    pub fn current(&self) -> Option<Arc<CompressedResult>> {
        self.inner.lock().current.clone()
    }

    pub fn last_error(&self) -> Option<CompressError> {
        self.inner.lock().last_error.clone()
    }

    pub fn source(&self) -> Option<Arc<SourceImage>> {
        self.inner.lock().source.clone()
    }

    fn validate(&self, request: &CompressionRequest) -> Result<(), CompressError> {
        preset_bounds(
            &request.preset,
            request.custom_bounds,
            self.inner.settings.max_custom_dimension,
        )
        .map(|_| ())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Closing the channel stops the timer thread; pending edits are dropped.
        self.timer_tx.take();
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

fn debounce_loop(inner: &Arc<Inner>, rx: &Receiver<Pending>) {
    let mut pending: Option<Pending> = None;
    loop {
        let received = match &pending {
            Some(p) => rx.recv_timeout(p.deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(next) => pending = Some(next),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(p) = pending.take() {
                    inner.fire_debounced(p);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
