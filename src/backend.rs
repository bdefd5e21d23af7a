//! rodio-backed media pipeline.
//!
//! rodio's `OutputStream` can't leave the thread that opened it, so a
//! dedicated audio thread owns the stream and the current `Sink`. The UI side
//! sends it `Command`s and drains `MediaEvent`s back once per frame.

use lofty::prelude::*;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::playback::{MediaBackend, MediaEvent};
use crate::spectrum::{SampleTap, TappedSource};

/// How often the audio thread reports the playback position.
const TICK: Duration = Duration::from_millis(50);

enum Command {
    Load { path: PathBuf, tap: SampleTap },
    Play,
    Pause,
    Seek(Duration),
    Volume(f32),
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    position: Duration,
    duration: Option<Duration>,
}

pub struct RodioBackend {
    sender: Sender<Command>,
    events: Receiver<MediaEvent>,
    shared: Arc<Mutex<Shared>>,
    source: Option<PathBuf>,
    volume: f32,
    worker: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (event_sender, events) = mpsc::channel::<MediaEvent>();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let shared_clone = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name("audio-control".into())
            .spawn(move || audio_control_thread(receiver, event_sender, shared_clone))?;
        tracing::info!("audio thread spawned");

        Ok(RodioBackend {
            sender,
            events,
            shared,
            source: None,
            volume: 1.0,
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.sender.send(command).map_err(|_| Error::Backend)
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MediaBackend for RodioBackend {
    fn load(&mut self, path: &Path, tap: SampleTap) -> Result<()> {
        self.send(Command::Load {
            path: path.to_path_buf(),
            tap,
        })?;
        self.source = Some(path.to_path_buf());
        *self.shared() = Shared::default();
        Ok(())
    }

    fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSource);
        }
        self.send(Command::Play)
    }

    fn pause(&mut self) {
        if let Err(e) = self.send(Command::Pause) {
            tracing::warn!("pause failed: {}", e);
        }
    }

    fn current_time(&self) -> f64 {
        self.shared().position.as_secs_f64()
    }

    fn set_current_time(&mut self, secs: f64) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSource);
        }
        let position = Duration::try_from_secs_f64(secs).map_err(|e| Error::Seek(e.to_string()))?;
        self.send(Command::Seek(position))?;
        self.shared().position = position;
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.shared()
            .duration
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Err(e) = self.send(Command::Volume(volume)) {
            tracing::warn!("volume change failed: {}", e);
        }
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        self.events.try_iter().collect()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("audio thread panicked");
            }
        }
    }
}

/// Everything the audio thread knows about the current track.
struct Player {
    handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    path: Option<PathBuf>,
    tap: SampleTap,
    volume: f32,
    playing: bool,
    ended: bool,
    events: Sender<MediaEvent>,
    shared: Arc<Mutex<Shared>>,
}

impl Player {
    fn emit(&self, event: MediaEvent) {
        // the UI side only disappears during shutdown
        let _ = self.events.send(event);
    }

    fn set_shared(&self, f: impl FnOnce(&mut Shared)) {
        let mut shared = self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut shared);
    }

    fn load(&mut self, path: PathBuf, tap: SampleTap) {
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        self.path = Some(path);
        self.tap = tap;
        self.playing = false;
        self.ended = false;

        match self.open_sink() {
            Ok(duration) => {
                self.set_shared(|s| {
                    s.position = Duration::ZERO;
                    s.duration = duration;
                });
                let secs = duration.map(|d| d.as_secs_f64()).unwrap_or(0.0);
                self.emit(MediaEvent::LoadedMetadata { duration: secs });
            }
            Err(e) => {
                tracing::warn!("could not load {:?}: {}", self.path, e);
                self.emit(MediaEvent::Error(e.to_string()));
            }
        }
    }

    /// Decodes the current path into a fresh, paused sink.
    fn open_sink(&mut self) -> Result<Option<Duration>> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::Output("no audio output device".into()))?;
        let path = self.path.as_deref().ok_or(Error::NoSource)?;

        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let duration = probe_duration(path).or_else(|| decoder.total_duration());

        let sink = Sink::try_new(handle).map_err(|e| Error::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(TappedSource::new(
            decoder.convert_samples::<f32>(),
            self.tap.clone(),
        ));
        self.sink = Some(sink);
        tracing::debug!(?path, ?duration, "sink ready");
        Ok(duration)
    }

    /// A drained sink can't be rewound, so replaying after the end decodes
    /// the file again.
    fn rewind_if_ended(&mut self) -> Result<()> {
        let drained = self.sink.as_ref().map_or(true, |s| s.empty());
        if drained && self.path.is_some() {
            self.open_sink()?;
            self.ended = false;
            self.set_shared(|s| s.position = Duration::ZERO);
        }
        Ok(())
    }

    fn play(&mut self) {
        if let Err(e) = self.rewind_if_ended() {
            self.emit(MediaEvent::Error(e.to_string()));
            return;
        }
        if let Some(sink) = &self.sink {
            tracing::debug!("playing audio");
            sink.play();
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            tracing::debug!("pausing audio");
            sink.pause();
        }
        self.playing = false;
    }

    fn seek(&mut self, position: Duration) {
        if let Err(e) = self.rewind_if_ended() {
            self.emit(MediaEvent::Error(e.to_string()));
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        tracing::debug!(?position, "seeking audio");
        match sink.try_seek(position) {
            Ok(()) => {
                self.set_shared(|s| s.position = position);
                self.emit(MediaEvent::TimeUpdate {
                    current_time: position.as_secs_f64(),
                });
            }
            Err(e) => {
                tracing::warn!("failed to seek: {}", e);
                self.emit(MediaEvent::Error(Error::Seek(e.to_string()).to_string()));
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    /// Reports progress while playing and the end of the track exactly once.
    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        if sink.empty() {
            if !self.ended {
                self.ended = true;
                self.playing = false;
                if let Some(duration) = self.shared.lock().ok().and_then(|s| s.duration) {
                    self.emit(MediaEvent::TimeUpdate {
                        current_time: duration.as_secs_f64(),
                    });
                }
                self.emit(MediaEvent::Ended);
            }
            return;
        }
        let position = sink.get_pos();
        self.set_shared(|s| s.position = position);
        self.emit(MediaEvent::TimeUpdate {
            current_time: position.as_secs_f64(),
        });
    }

    fn shutdown(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.tap = SampleTap::disconnected();
    }
}

fn audio_control_thread(
    receiver: Receiver<Command>,
    events: Sender<MediaEvent>,
    shared: Arc<Mutex<Shared>>,
) {
    // keep the stream alive for as long as this thread runs
    let (_stream, handle) = match OutputStream::try_default() {
        Ok((stream, handle)) => (Some(stream), Some(handle)),
        Err(e) => {
            tracing::error!("failed to open audio output: {}", e);
            (None, None)
        }
    };

    let mut player = Player {
        handle,
        sink: None,
        path: None,
        tap: SampleTap::disconnected(),
        volume: 1.0,
        playing: false,
        ended: false,
        events,
        shared,
    };

    loop {
        match receiver.recv_timeout(TICK) {
            Ok(Command::Load { path, tap }) => player.load(path, tap),
            Ok(Command::Play) => player.play(),
            Ok(Command::Pause) => player.pause(),
            Ok(Command::Seek(position)) => player.seek(position),
            Ok(Command::Volume(volume)) => player.set_volume(volume),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        player.tick();
    }

    player.shutdown();
    tracing::info!("audio thread stopped");
}

/// Reads the duration from the container's properties. Zero means unknown.
fn probe_duration(path: &Path) -> Option<Duration> {
    match lofty::read_from_path(path) {
        Ok(tagged) => Some(tagged.properties().duration()).filter(|d| !d.is_zero()),
        Err(e) => {
            tracing::debug!(?path, "no tag properties: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_an_error_event() {
        let Ok(mut backend) = RodioBackend::spawn() else {
            return;
        };
        backend
            .load(Path::new("/definitely/not/here.mp3"), SampleTap::disconnected())
            .unwrap();
        assert_eq!(backend.source(), Some(Path::new("/definitely/not/here.mp3")));

        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(backend.poll_events());
            if !events.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(events.first(), Some(MediaEvent::Error(_))));
    }

    #[test]
    fn play_without_source_is_rejected() {
        let Ok(mut backend) = RodioBackend::spawn() else {
            return;
        };
        assert!(matches!(backend.play(), Err(Error::NoSource)));
        assert!(matches!(backend.set_current_time(3.0), Err(Error::NoSource)));
        assert_eq!(backend.duration(), 0.0);
        assert_eq!(backend.current_time(), 0.0);
    }

    #[test]
    fn volume_is_remembered() {
        let Ok(mut backend) = RodioBackend::spawn() else {
            return;
        };
        backend.set_volume(0.3);
        assert_eq!(backend.volume(), 0.3);
    }
}
