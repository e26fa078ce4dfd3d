//! Start/stop of track sets: loading guard, implicit restart, exclusivity.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::AdaptiveEngine;
use crate::container::library::{LayerPaths, PlaybackMode, PlaylistConfig, SoundConfig};
use crate::error::{EngineError, EngineResult};
use crate::mix::LayerSlots;
use crate::playback::events::{EngineEvent, StopReason};
use crate::playback::layer::SoundLayer;
use crate::playback::track_set::TrackSet;

/// Everything needed to start one adaptive sound.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub sound_id: String,
    pub container_id: String,
    pub paths: LayerPaths,
    pub looping: bool,
    pub mode: PlaybackMode,
    /// The sound's own configured volume.
    pub base_volume: f32,
}

impl StartRequest {
    pub fn new(
        sound_id: impl Into<String>,
        container_id: impl Into<String>,
        paths: LayerPaths,
    ) -> Self {
        Self {
            sound_id: sound_id.into(),
            container_id: container_id.into(),
            paths,
            looping: false,
            mode: PlaybackMode::default(),
            base_volume: 1.0,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn base_volume(mut self, volume: f32) -> Self {
        self.base_volume = volume;
        self
    }

    /// Request for a library sound inside its playlist.
    pub fn for_sound(playlist: &PlaylistConfig, sound: &SoundConfig) -> Self {
        Self::new(sound.id.clone(), playlist.id.clone(), sound.layer_paths())
            .looping(sound.repeat)
            .mode(playlist.mode)
            .base_volume(sound.volume)
    }
}

/// Result of a start request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The track set is registered and playing.
    Started,
    /// A load for the same sound is already in flight; nothing was done.
    AlreadyLoading,
    /// The sound has no Mid or Low layer; the host should play it natively.
    NotAdaptive,
    /// A later start in the same exclusive playlist registered first.
    Superseded,
}

/// Holds a sound id in the loading set until dropped.
struct LoadingGuard {
    loading: Arc<Mutex<HashSet<String>>>,
    sound_id: String,
}

impl LoadingGuard {
    /// Claim `sound_id`, or `None` when a load for it is already running.
    fn acquire(loading: &Arc<Mutex<HashSet<String>>>, sound_id: &str) -> Option<Self> {
        if !loading.lock().insert(sound_id.to_string()) {
            return None;
        }
        Some(Self {
            loading: loading.clone(),
            sound_id: sound_id.to_string(),
        })
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.loading.lock().remove(&self.sound_id);
    }
}

impl AdaptiveEngine {
    /// Load every layer of a sound and start them together.
    ///
    /// An existing track set for the same sound is stopped first. In an
    /// exclusive playlist every other track set of that playlist is stopped
    /// before loading begins, and again at registration for any set that
    /// started earlier than this one. Nothing stays registered on failure.
    pub fn start(&self, request: StartRequest) -> EngineResult<StartOutcome> {
        if !request.paths.is_adaptive() {
            warn!(
                "sound {} has no mid or low layer configured; leaving it to native playback",
                request.sound_id
            );
            return Ok(StartOutcome::NotAdaptive);
        }

        let Some(_loading) = LoadingGuard::acquire(&self.loading, &request.sound_id) else {
            debug!("sound {} is already loading; ignoring start", request.sound_id);
            return Ok(StartOutcome::AlreadyLoading);
        };
        let sequence = self.start_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if self.tracks.lock().contains_key(&request.sound_id) {
            self.stop_with_reason(&request.sound_id, StopReason::Restarted, true);
        }
        if request.mode.is_exclusive() {
            for sound_id in self.sounds_in_container(&request.container_id, &request.sound_id) {
                self.stop_with_reason(&sound_id, StopReason::Exclusive, false);
            }
        }

        debug!(
            "loading {} layers of sound {}",
            request.paths.slots().len(),
            request.sound_id
        );
        let layers = match self.load_layers(&request) {
            Ok(layers) => layers,
            Err(err) => {
                warn!("{}", err);
                return Err(err);
            }
        };

        let set = TrackSet::new(
            request.sound_id.clone(),
            request.container_id.clone(),
            request.base_volume,
            request.looping,
            sequence,
            layers,
        );
        self.register(set, request.mode.is_exclusive())
    }

    fn load_layers(&self, request: &StartRequest) -> EngineResult<LayerSlots<Box<dyn SoundLayer>>> {
        let paths = request.paths.slots();
        let expected = paths.len();
        let timeout = self.tuning.lock().load_timeout;

        let (sender, receiver) = mpsc::channel();
        for (kind, path) in paths.iter() {
            let loader = self.loader.clone();
            let sender = sender.clone();
            let path = path.clone();
            thread::spawn(move || {
                let result = loader.load(&path);
                // The receiver is gone once the start gave up on this load.
                let _ = sender.send((kind, result));
            });
        }
        drop(sender);

        // A timeout too large to represent waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut layers = LayerSlots::default();
        for _ in 0..expected {
            let received = match deadline {
                Some(deadline) => {
                    receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((kind, Ok(layer))) => layers.set(kind, layer),
                Ok((kind, Err(source))) => {
                    return Err(EngineError::Load {
                        sound_id: request.sound_id.clone(),
                        layer: kind,
                        source,
                    })
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(EngineError::LoadTimeout {
                        sound_id: request.sound_id.clone(),
                        timeout_ms: timeout.as_millis(),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::LoaderExited(request.sound_id.clone()))
                }
            }
        }
        Ok(layers)
    }

    /// Start a loaded set and make it the active one for its sound.
    fn register(&self, mut set: TrackSet, exclusive: bool) -> EngineResult<StartOutcome> {
        let sound_id = set.sound_id().to_string();
        let mut evicted = Vec::new();
        {
            let core = self.mix.lock();
            let mut tracks = self.tracks.lock();

            if exclusive {
                let newer = tracks.values().find(|other| {
                    other.container_id() == set.container_id()
                        && other.sound_id() != sound_id
                        && other.sequence() > set.sequence()
                });
                if let Some(newer) = newer {
                    info!(
                        "sound {} superseded by {} in playlist {}",
                        sound_id,
                        newer.sound_id(),
                        set.container_id()
                    );
                    return Ok(StartOutcome::Superseded);
                }
            }

            if let Err(source) = set.begin_playback(&core.state) {
                warn!("failed to start sound {}: {}", sound_id, source);
                return Err(EngineError::Start { sound_id, source });
            }

            let stale: Vec<String> = tracks
                .values()
                .filter(|other| {
                    other.sound_id() == sound_id
                        || (exclusive && other.container_id() == set.container_id())
                })
                .map(|other| other.sound_id().to_string())
                .collect();
            for id in stale {
                if let Some(mut old) = tracks.remove(&id) {
                    old.stop_all();
                    evicted.push(id);
                }
            }

            tracks.insert(sound_id.clone(), set);
        }

        if let Some(sound) = self.library.lock().sound_mut(&sound_id) {
            sound.playing = true;
        }
        self.ensure_drift_monitor();
        info!("sound {} playing", sound_id);

        for id in evicted {
            let reason = if id == sound_id {
                StopReason::Restarted
            } else {
                self.after_stop(&id, false);
                StopReason::Exclusive
            };
            self.events.emit(EngineEvent::TrackStopped {
                sound_id: id,
                reason,
            });
        }
        self.events.emit(EngineEvent::TrackStarted { sound_id });
        Ok(StartOutcome::Started)
    }

    pub(super) fn sounds_in_container(&self, container_id: &str, except: &str) -> Vec<String> {
        self.tracks
            .lock()
            .values()
            .filter(|set| set.container_id() == container_id && set.sound_id() != except)
            .map(|set| set.sound_id().to_string())
            .collect()
    }

    /// Stop a sound. Returns `false` when it had no track set.
    pub fn stop(&self, sound_id: &str, skip_external_notify: bool) -> bool {
        self.stop_with_reason(sound_id, StopReason::Requested, skip_external_notify)
    }

    pub(super) fn stop_with_reason(
        &self,
        sound_id: &str,
        reason: StopReason,
        skip_external_notify: bool,
    ) -> bool {
        let removed = self.tracks.lock().remove(sound_id);
        let Some(mut set) = removed else {
            debug!("stop: sound {} is not playing", sound_id);
            return false;
        };
        set.stop_all();
        self.halt_drift_monitor_if_idle();
        info!("sound {} stopped ({:?})", sound_id, reason);

        self.after_stop(sound_id, skip_external_notify);
        self.events.emit(EngineEvent::TrackStopped {
            sound_id: sound_id.to_string(),
            reason,
        });
        true
    }

    /// Record a stopped sound locally and, unless skipped, with the host.
    fn after_stop(&self, sound_id: &str, skip_external_notify: bool) {
        if let Some(sound) = self.library.lock().sound_mut(sound_id) {
            sound.playing = false;
        }
        if skip_external_notify {
            return;
        }
        if let Err(err) = self.host.mark_sound_stopped(sound_id) {
            warn!("could not mark sound {} as stopped: {}", sound_id, err);
        }
    }

    /// Stop every sound of a playlist. Returns how many were stopped.
    pub fn stop_playlist(&self, playlist_id: &str) -> usize {
        self.sounds_in_container(playlist_id, "")
            .into_iter()
            .filter(|sound_id| self.stop(sound_id, false))
            .count()
    }

    pub fn stop_all(&self) -> usize {
        let sound_ids: Vec<String> = self.tracks.lock().keys().cloned().collect();
        sound_ids
            .into_iter()
            .filter(|sound_id| self.stop(sound_id, false))
            .count()
    }

    /// Start a sound from the library.
    pub fn play_sound(&self, sound_id: &str) -> EngineResult<StartOutcome> {
        let request = {
            let library = self.library.lock();
            let Some((playlist, sound)) = library.find_sound(sound_id) else {
                return Err(EngineError::UnknownSound(sound_id.to_string()));
            };
            if !playlist.is_adaptive {
                debug!("playlist {} is not adaptive", playlist.id);
                return Ok(StartOutcome::NotAdaptive);
            }
            StartRequest::for_sound(playlist, sound)
        };
        self.start(request)
    }

    /// Sounds with a registered track set.
    pub fn is_playing(&self, sound_id: &str) -> bool {
        self.tracks.lock().contains_key(sound_id)
    }

    pub fn is_loading(&self, sound_id: &str) -> bool {
        self.loading.lock().contains(sound_id)
    }
}
