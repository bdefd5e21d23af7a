use rodio::source::SeekError;
use rodio::Source;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Deserialize;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const BLACKMAN_ALPHA: f32 = 0.16;
/// Samples buffered inside the audio callback before taking the ring lock.
const TAP_BATCH: usize = 128;
/// Gaps between tap writes shorter than this are audio buffers landing
/// between frames, not a stopped source.
const STALE_AFTER: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    /// Weight of the previous frame, 0 = no smoothing.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        AnalyserConfig {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(self) -> Result<Self> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(Error::Config(format!(
                "fft_size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(Error::Config(format!(
                "smoothing must be in 0..=1, got {}",
                self.smoothing
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(Error::Config(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(self)
    }
}

/// Turns a block of time-domain samples into byte magnitudes per frequency bin.
///
/// Windowing, smoothing and the decibel-to-byte mapping follow the usual
/// analyser-node recipe, so 128 bins out of a 256-point FFT look the same as
/// a browser visualizer fed the same audio.
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let n = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);

        SpectrumAnalyser {
            config,
            fft,
            window: blackman_window(n),
            buffer: vec![Complex::new(0.0, 0.0); n],
            smoothed: vec![0.0; config.bin_count()],
        }
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Writes `min(out.len(), bin_count)` bins into `out`.
    pub fn byte_frequency_data(&mut self, time_domain: &[f32], out: &mut [u8]) {
        let n = self.config.fft_size;

        // newest samples are at the end; pad missing history with silence
        let take = time_domain.len().min(n);
        let pad = n - take;
        let recent = &time_domain[time_domain.len() - take..];
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let tau = self.config.smoothing;
        let norm = 1.0 / n as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * norm;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }

        let min_db = self.config.min_decibels;
        let scale = 255.0 / (self.config.max_decibels - min_db);
        for (byte, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = 20.0 * magnitude.log10();
            let scaled = (scale * (db - min_db)).floor();
            *byte = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    let a0 = (1.0 - BLACKMAN_ALPHA) / 2.0;
    let a1 = 0.5;
    let a2 = BLACKMAN_ALPHA / 2.0;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Most recent mono samples pushed by the audio thread.
#[derive(Debug)]
struct SampleRing {
    samples: VecDeque<f32>,
    capacity: usize,
    written: u64,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        SampleRing {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            written: 0,
        }
    }

    fn extend(&mut self, batch: &[f32]) {
        for &s in batch {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(s);
        }
        self.written += batch.len() as u64;
    }
}

fn lock_ring(ring: &Mutex<SampleRing>) -> MutexGuard<'_, SampleRing> {
    // a panic on the audio thread must not take the visualizer down with it
    ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write end of a sampler. Once the sampler re-attaches, detaches or is
/// dropped, every write through an older tap is ignored.
#[derive(Debug, Clone)]
pub struct SampleTap {
    ring: Weak<Mutex<SampleRing>>,
}

impl SampleTap {
    /// A tap connected to nothing.
    pub fn disconnected() -> Self {
        SampleTap { ring: Weak::new() }
    }

    /// Returns `false` once the owning sampler has let go of this tap.
    pub fn write(&self, batch: &[f32]) -> bool {
        match self.ring.upgrade() {
            Some(ring) => {
                lock_ring(&ring).extend(batch);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ring.strong_count() > 0
    }
}

/// Passes a decoded source through untouched while copying a mono mix of it
/// into a [`SampleTap`].
pub struct TappedSource<S> {
    inner: S,
    tap: Option<SampleTap>,
    pending: Vec<f32>,
    frame_sum: f32,
    channel: u16,
}

impl<S> TappedSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, tap: SampleTap) -> Self {
        TappedSource {
            inner,
            tap: Some(tap),
            pending: Vec::with_capacity(TAP_BATCH),
            frame_sum: 0.0,
            channel: 0,
        }
    }

    fn flush(&mut self) {
        if let Some(tap) = &self.tap {
            if !tap.write(&self.pending) {
                self.tap = None;
            }
        }
        self.pending.clear();
    }
}

impl<S> Iterator for TappedSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(sample) = self.inner.next() else {
            if !self.pending.is_empty() {
                self.flush();
            }
            return None;
        };
        if self.tap.is_none() {
            return Some(sample);
        }

        let channels = self.inner.channels().max(1);
        self.frame_sum += sample;
        self.channel += 1;
        if self.channel >= channels {
            self.pending.push(self.frame_sum / channels as f32);
            self.frame_sum = 0.0;
            self.channel = 0;
            if self.pending.len() >= TAP_BATCH {
                self.flush();
            }
        }
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> Source for TappedSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> std::result::Result<(), SeekError> {
        self.pending.clear();
        self.frame_sum = 0.0;
        self.channel = 0;
        self.inner.try_seek(pos)
    }
}

/// A ring prepared for a new source but not yet read by the sampler. Dropping
/// it disconnects its tap and leaves the sampler's current tap alone.
pub struct PendingTap {
    ring: Arc<Mutex<SampleRing>>,
}

impl PendingTap {
    pub fn tap(&self) -> SampleTap {
        SampleTap {
            ring: Arc::downgrade(&self.ring),
        }
    }
}

/// Owns the latest spectrum snapshot and refreshes it once per frame from
/// whatever the attached tap has written.
pub struct SpectrumSampler {
    analyser: SpectrumAnalyser,
    ring: Option<Arc<Mutex<SampleRing>>>,
    last_written: u64,
    last_fresh: Option<Instant>,
    scratch: Vec<f32>,
    snapshot: Vec<u8>,
}

impl SpectrumSampler {
    pub fn new(config: AnalyserConfig) -> Self {
        let analyser = SpectrumAnalyser::new(config);
        let bins = analyser.bin_count();
        SpectrumSampler {
            analyser,
            ring: None,
            last_written: 0,
            last_fresh: None,
            scratch: Vec::with_capacity(config.fft_size),
            snapshot: vec![0; bins],
        }
    }

    pub fn prepare(&self) -> PendingTap {
        PendingTap {
            ring: Arc::new(Mutex::new(SampleRing::new(self.analyser.config().fft_size))),
        }
    }

    /// Starts reading from `pending`. The previous tap is released.
    pub fn install(&mut self, pending: PendingTap) {
        self.detach();
        self.ring = Some(pending.ring);
        tracing::debug!(bins = self.snapshot.len(), "spectrum sampler attached");
    }

    /// Hands out a fresh tap for a new source. Any previous tap is released.
    pub fn attach(&mut self) -> SampleTap {
        let pending = self.prepare();
        let tap = pending.tap();
        self.install(pending);
        tap
    }

    pub fn detach(&mut self) {
        if self.ring.take().is_some() {
            tracing::debug!("spectrum sampler detached");
        }
        self.last_written = 0;
        self.last_fresh = None;
        self.analyser.reset();
        self.snapshot.iter_mut().for_each(|b| *b = 0);
    }

    pub fn is_attached(&self) -> bool {
        self.ring.is_some()
    }

    pub fn bin_count(&self) -> usize {
        self.snapshot.len()
    }

    /// Refreshes the snapshot. Once the tap has been quiet for longer than
    /// [`STALE_AFTER`] (paused, or the track ended) the analyser sees silence,
    /// so the bars fall off instead of freezing.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        let Some(ring) = &self.ring else {
            return;
        };

        self.scratch.clear();
        {
            let ring = lock_ring(ring);
            if ring.written != self.last_written {
                self.last_written = ring.written;
                self.last_fresh = Some(now);
            }
            let live = self
                .last_fresh
                .is_some_and(|at| now.saturating_duration_since(at) < STALE_AFTER);
            if live {
                self.scratch.extend(ring.samples.iter().copied());
            }
        }

        self.analyser
            .byte_frequency_data(&self.scratch, &mut self.snapshot);
        tracing::trace!(snapshot = ?self.snapshot, "frequency data");
    }
    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }
}
