use std::path::{Path, PathBuf};

use crate::calculation::{self, format_time, is_known_duration};
use crate::error::Result;
use crate::spectrum::SampleTap;

/// Lifecycle notifications a backend reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate { current_time: f64 },
    Ended,
    Error(String),
}

/// The handful of media operations the player needs. Anything that can
/// decode and play a file can sit behind this.
pub trait MediaBackend {
    /// Starts loading `path`. Decoded samples are copied into `tap`.
    /// Loading finishes asynchronously and is reported through
    /// [`MediaBackend::poll_events`].
    fn load(&mut self, path: &Path, tap: SampleTap) -> Result<()>;
    fn source(&self) -> Option<&Path>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64) -> Result<()>;
    fn duration(&self) -> f64;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub source: Option<PathBuf>,
    pub is_playing: bool,
    pub current_time: f64,
    /// Zero until the backend reports metadata.
    pub duration: f64,
    pub volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState {
            source: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
        }
    }
}

impl PlaybackState {
    pub fn progress(&self) -> f64 {
        calculation::progress_ratio(self.current_time, self.duration)
    }

    pub fn current_label(&self) -> String {
        format_time(self.current_time)
    }

    pub fn duration_label(&self) -> String {
        format_time(self.duration)
    }

    pub fn volume_label(&self) -> String {
        format!("{}%", calculation::volume_percent(self.volume))
    }

    pub fn track_name(&self) -> Option<String> {
        self.source
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    fn clamp_time(&self, secs: f64) -> f64 {
        if !secs.is_finite() || secs < 0.0 {
            return 0.0;
        }
        if is_known_duration(self.duration) {
            secs.min(self.duration)
        } else {
            secs
        }
    }
}

pub struct PlaybackController<B> {
    backend: B,
    state: PlaybackState,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(backend: B, volume: f32) -> Self {
        let mut controller = PlaybackController {
            backend,
            state: PlaybackState::default(),
        };
        controller.set_volume(volume);
        controller
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Loads a new source. `None` (dialog cancelled, nothing dropped) is a no-op.
    /// Returns whether the backend took the new source.
    pub fn load_file(&mut self, path: Option<&Path>, tap: SampleTap) -> bool {
        let Some(path) = path else {
            tracing::debug!("no file selected");
            return false;
        };

        self.pause();
        match self.backend.load(path, tap) {
            Ok(()) => {
                tracing::info!(?path, "loading audio");
                self.state.source = Some(path.to_path_buf());
                self.state.current_time = 0.0;
                self.state.duration = 0.0;
                true
            }
            Err(e) => {
                tracing::warn!(?path, "failed to load audio: {}", e);
                false
            }
        }
    }

    pub fn play(&mut self) {
        match self.backend.play() {
            Ok(()) => self.state.is_playing = true,
            Err(e) => tracing::warn!("play failed: {}", e),
        }
    }

    pub fn pause(&mut self) {
        self.backend.pause();
        self.state.is_playing = false;
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seeks to `secs`, clamped to the known duration.
    pub fn seek(&mut self, secs: f64) {
        let target = if is_known_duration(self.state.duration) {
            self.state.clamp_time(secs)
        } else {
            0.0
        };
        if let Err(e) = self.backend.set_current_time(target) {
            tracing::warn!(target, "seek failed: {}", e);
            return;
        }
        self.state.current_time = target;
    }

    /// Seek from a click `offset` pixels into a bar `width` pixels wide.
    pub fn seek_from_click(&mut self, offset: f32, width: f32) {
        let target = calculation::time_from_offset(offset, width, self.state.duration);
        self.seek(target);
    }

    pub fn skip(&mut self, delta_secs: f64) {
        self.seek(self.state.current_time + delta_secs);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.backend.set_volume(volume);
        self.state.volume = volume;
    }

    pub fn set_volume_from_click(&mut self, offset: f32, width: f32) {
        self.set_volume(calculation::ratio_from_offset(offset, width));
    }

    pub fn nudge_volume(&mut self, delta: f32) {
        self.set_volume(self.state.volume + delta);
    }

    /// Mirrors everything the backend reported since the last call into state.
    pub fn sync(&mut self) {
        for event in self.backend.poll_events() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                self.state.duration = if is_known_duration(duration) {
                    duration
                } else {
                    0.0
                };
                self.state.current_time = self.state.clamp_time(self.state.current_time);
                tracing::info!(duration = self.state.duration, "metadata loaded");
            }
            MediaEvent::TimeUpdate { current_time } => {
                self.state.current_time = self.state.clamp_time(current_time);
            }
            MediaEvent::Ended => {
                tracing::debug!("playback ended");
                self.state.is_playing = false;
            }
            MediaEvent::Error(message) => {
                tracing::warn!("media error: {}", message);
                self.state.is_playing = false;
            }
        }
    }
}
