//! Looped background music.
//!
//! The overlay talks to a [`Playback`] rather than to kira directly, so the
//! scene runs (silently) on machines without an output device and tests can
//! drive the music toggle without one.
//!
//! The track is fetched and decoded on a background thread as soon as the
//! player opens. A play request while that is still running waits briefly
//! and otherwise reports [`AudioError::Loading`].

use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::sound::PlaybackState;
use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend, Tween};

use crate::assets::{self, AssetSource};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// How long a play request waits for a track that is still loading.
const LOAD_WAIT: Duration = Duration::from_millis(250);

/// Something that can start and pause the background track.
pub trait Playback {
    /// Start or resume. On error nothing is playing.
    fn play(&mut self) -> Result<(), AudioError>;

    fn pause(&mut self);
}

type TrackResult = Result<StaticSoundData, AudioError>;

enum Track {
    Loading(Receiver<TrackResult>),
    Ready(StaticSoundData),
    Failed(String),
}

/// Music through kira's default backend.
pub struct MusicPlayer {
    manager: AudioManager<DefaultBackend>,
    uri: String,
    track: Track,
    handle: Option<StaticSoundHandle>,
}

impl MusicPlayer {
    /// Open the default output device and start loading the track.
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        let source = track_source(config)?;
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| AudioError::NoDevice(e.to_string()))?;

        let uri = source.to_string();
        let (tx, rx) = mpsc::channel();
        let volume = config.volume;
        let looped = config.looped;
        let track = match std::thread::Builder::new()
            .name("music-loader".into())
            .spawn(move || {
                let agent = assets::http_agent();
                let _ = tx.send(load_track(&source, &agent, volume, looped));
            }) {
            Ok(_) => Track::Loading(rx),
            Err(e) => Track::Failed(e.to_string()),
        };

        Ok(Self {
            manager,
            uri,
            track,
            handle: None,
        })
    }

    fn sound(&mut self) -> Result<StaticSoundData, AudioError> {
        let outcome = match &self.track {
            Track::Loading(rx) => Some(rx.recv_timeout(LOAD_WAIT)),
            _ => None,
        };
        match outcome {
            Some(Ok(Ok(data))) => {
                log::info!("music loaded: {}", self.uri);
                self.track = Track::Ready(data);
            }
            Some(Ok(Err(e))) => {
                log::warn!("{}", e);
                self.track = Track::Failed(e.to_string());
            }
            Some(Err(RecvTimeoutError::Timeout)) => {
                return Err(AudioError::Loading(self.uri.clone()));
            }
            Some(Err(RecvTimeoutError::Disconnected)) => {
                self.track = Track::Failed("loader stopped".into());
            }
            None => {}
        }

        match &self.track {
            Track::Ready(data) => Ok(data.clone()),
            Track::Failed(message) => Err(AudioError::Load {
                uri: self.uri.clone(),
                message: message.clone(),
            }),
            Track::Loading(_) => Err(AudioError::Loading(self.uri.clone())),
        }
    }
}

impl Playback for MusicPlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        if let Some(handle) = &mut self.handle {
            if handle.state() != PlaybackState::Stopped {
                handle.resume(Tween::default());
                return Ok(());
            }
        }
        let data = self.sound()?;
        let handle = self
            .manager
            .play(data)
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        self.handle = Some(handle);
        log::info!("music playing: {}", self.uri);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(handle) = &mut self.handle {
            handle.pause(Tween::default());
        }
    }
}

/// Stand-in when no device or no track is available. Every play fails.
#[derive(Debug, Default)]
pub struct Silence {
    reason: Option<String>,
}

impl Silence {
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl Playback for Silence {
    fn play(&mut self) -> Result<(), AudioError> {
        match &self.reason {
            Some(reason) => Err(AudioError::NoDevice(reason.clone())),
            None => Err(AudioError::NoTrack),
        }
    }

    fn pause(&mut self) {}
}

/// Resolve the configured track URI.
pub fn track_source(config: &AudioConfig) -> Result<AssetSource, AudioError> {
    let uri = config
        .track
        .as_deref()
        .filter(|uri| !uri.is_empty())
        .ok_or(AudioError::NoTrack)?;
    AssetSource::parse(uri).map_err(|e| AudioError::Load {
        uri: uri.to_string(),
        message: e.to_string(),
    })
}

/// Fetch and decode a track, applying volume and looping.
pub fn load_track(
    source: &AssetSource,
    agent: &ureq::Agent,
    volume: f32,
    looped: bool,
) -> Result<StaticSoundData, AudioError> {
    let load_error = |message: String| AudioError::Load {
        uri: source.to_string(),
        message,
    };
    let mut data = match source {
        AssetSource::File(path) => StaticSoundData::from_file(path),
        AssetSource::Http(_) => {
            let bytes = source.fetch(agent).map_err(|e| load_error(e.to_string()))?;
            StaticSoundData::from_cursor(Cursor::new(bytes))
        }
    }
    .map_err(|e| load_error(e.to_string()))?;

    data = data.volume(amplitude_to_db(volume));
    if looped {
        data = data.loop_region(..);
    }
    Ok(data)
}

/// Open the configured track, degrading to [`Silence`].
pub fn open(config: &AudioConfig) -> Box<dyn Playback> {
    match MusicPlayer::new(config) {
        Ok(player) => Box::new(player),
        Err(AudioError::NoTrack) => {
            log::info!("no music track configured, running silent");
            Box::new(Silence::default())
        }
        Err(e) => {
            log::warn!("audio unavailable ({}), running silent", e);
            Box::new(Silence::because(e.to_string()))
        }
    }
}

/// Convert a linear amplitude to decibels, floored at -60 dB.
fn amplitude_to_db(amplitude: f32) -> Decibels {
    if amplitude <= 0.0 {
        Decibels(-60.0)
    } else {
        Decibels((20.0 * amplitude.log10()).max(-60.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TRACK;

    fn silent_config() -> AudioConfig {
        AudioConfig {
            track: None,
            ..AudioConfig::default()
        }
    }

    #[test]
    fn test_amplitude_to_db() {
        assert_eq!(amplitude_to_db(1.0), Decibels(0.0));
        assert_eq!(amplitude_to_db(0.0), Decibels(-60.0));
        assert!((amplitude_to_db(0.3).0 + 10.457575).abs() < 1e-4);
    }

    #[test]
    fn test_silence_never_plays() {
        let mut silence = Silence::because("no device");
        assert!(matches!(silence.play(), Err(AudioError::NoDevice(_))));

        let mut silence = Silence::default();
        assert!(matches!(silence.play(), Err(AudioError::NoTrack)));
    }

    #[test]
    fn test_default_track_is_remote() {
        let source = track_source(&AudioConfig::default()).unwrap();
        assert_eq!(source, AssetSource::Http(DEFAULT_TRACK.to_string()));
        assert!(!source.to_string().is_empty());
    }

    #[test]
    fn test_no_track_or_empty_track() {
        assert!(matches!(track_source(&silent_config()), Err(AudioError::NoTrack)));
        let empty = AudioConfig {
            track: Some(String::new()),
            ..AudioConfig::default()
        };
        assert!(matches!(track_source(&empty), Err(AudioError::NoTrack)));
    }

    #[test]
    fn test_local_track_paths() {
        let config = AudioConfig {
            track: Some("file:///music/carol%201.ogg".into()),
            ..AudioConfig::default()
        };
        assert_eq!(
            track_source(&config).unwrap(),
            AssetSource::File("/music/carol 1.ogg".into())
        );
    }

    #[test]
    fn test_missing_track_fails_to_load() {
        let source = AssetSource::parse("/definitely/not/here.ogg").unwrap();
        let err = load_track(&source, &assets::http_agent(), 0.3, true).unwrap_err();
        assert!(matches!(err, AudioError::Load { ref uri, .. } if uri == "/definitely/not/here.ogg"));
    }

    #[test]
    fn test_open_without_track_is_silent() {
        let mut playback = open(&silent_config());
        assert!(matches!(playback.play(), Err(AudioError::NoTrack)));
    }
}
