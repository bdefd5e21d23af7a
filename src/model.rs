use nannou::prelude::Key;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use crate::backend::RodioBackend;
use crate::playback::{MediaBackend, PlaybackController, PlaybackState};
use crate::render_drawing::DrawConfig;
use crate::spectrum::{AnalyserConfig, SampleTap, SpectrumSampler};
use crate::ui::UiAction;

const SKIP_SECS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "oga", "m4a", "aac", "mp4"];

/// Keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shortcut {
    TogglePlay,
    Skip(f64),
    Volume(f32),
    NextStyle,
    Open,
}

pub fn shortcut(key: Key) -> Option<Shortcut> {
    match key {
        Key::Space => Some(Shortcut::TogglePlay),
        Key::Left => Some(Shortcut::Skip(-SKIP_SECS)),
        Key::Right => Some(Shortcut::Skip(SKIP_SECS)),
        Key::Up => Some(Shortcut::Volume(VOLUME_STEP)),
        Key::Down => Some(Shortcut::Volume(-VOLUME_STEP)),
        Key::V => Some(Shortcut::NextStyle),
        Key::O => Some(Shortcut::Open),
        _ => None,
    }
}

/// Shows the native file picker. `None` when the user cancels.
pub fn pick_audio_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Upload Audio")
        .add_filter("Audio", AUDIO_EXTENSIONS)
        .pick_file()
}

/// Playback, spectrum and drawing settings wired together, independent of
/// the window.
pub struct Player<B> {
    pub controller: PlaybackController<B>,
    pub sampler: SpectrumSampler,
    pub draw_config: DrawConfig,
}

impl<B: MediaBackend> Player<B> {
    pub fn new(backend: B, analyser: AnalyserConfig, draw_config: DrawConfig, volume: f32) -> Self {
        Player {
            controller: PlaybackController::new(backend, volume),
            sampler: SpectrumSampler::new(analyser),
            draw_config,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        self.controller.state()
    }

    pub fn snapshot(&self) -> &[u8] {
        self.sampler.snapshot()
    }

    /// Switches to a new source. The sampler moves to the new tap only once the
    /// backend accepts the file, so a failed load keeps the old track visible.
    pub fn open(&mut self, path: Option<&Path>) {
        let Some(path) = path else {
            self.controller.load_file(None, SampleTap::disconnected());
            return;
        };
        let pending = self.sampler.prepare();
        if self.controller.load_file(Some(path), pending.tap()) {
            self.sampler.install(pending);
        }
    }

    /// Runs once per frame, before drawing.
    pub fn tick(&mut self) {
        self.controller.sync();
        self.sampler.tick();
    }

    pub fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::Upload => {
                let picked = pick_audio_file();
                self.open(picked.as_deref());
            }
            UiAction::TogglePlay => self.controller.toggle_play_pause(),
            UiAction::Seek { offset, width } => self.controller.seek_from_click(offset, width),
            UiAction::Volume { offset, width } => {
                self.controller.set_volume_from_click(offset, width)
            }
        }
    }

    pub fn apply_shortcut(&mut self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::TogglePlay => self.controller.toggle_play_pause(),
            Shortcut::Skip(delta) => self.controller.skip(delta),
            Shortcut::Volume(delta) => self.controller.nudge_volume(delta),
            Shortcut::NextStyle => {
                self.draw_config.style = self.draw_config.style.next();
                tracing::info!(style = ?self.draw_config.style, "visual style changed");
            }
            Shortcut::Open => self.apply(UiAction::Upload),
        }
    }

    /// Releases the tap so nothing keeps writing into a sampler that's going away.
    pub fn teardown(&mut self) {
        self.controller.pause();
        self.sampler.detach();
    }
}

pub struct Model {
    pub player: Player<RodioBackend>,
    _log_guard: Option<WorkerGuard>,
}

impl Model {
    pub fn new(player: Player<RodioBackend>, log_guard: Option<WorkerGuard>) -> Self {
        Model {
            player,
            _log_guard: log_guard,
        }
    }
}
