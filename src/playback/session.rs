use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::sink::AudioSink;

use super::track::{PlayableItem, TrackMeta};

/// Motivo por el que terminó un track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// El sink terminó de reproducir el recurso
    Completed,
    /// Parada forzada: voto de salto o parada administrativa
    Stopped,
    /// El sink reportó un error durante la reproducción
    Failed(String),
}

/// Evento emitido exactamente una vez por cada track que llegó a sonar
#[derive(Debug, Clone)]
pub struct TrackEnded {
    pub meta: TrackMeta,
    pub reason: EndReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Playing,
}

#[derive(Debug)]
struct PlayState {
    phase: Phase,
    current: Option<PlayableItem>,
}

/// Sesión de reproducción de una sala.
///
/// Máquina de estados `Idle → Starting → Playing → fin → Idle`. Cualquier
/// señal de terminación que llegue con la sesión en `Idle` es un no-op, así
/// que un voto de salto y un fin natural compitiendo por el mismo track
/// producen una sola transición terminal.
pub struct PlaybackSession {
    sink: Arc<dyn AudioSink>,
    state: Mutex<PlayState>,
    /// Metadatos del track sonando, legibles sin tocar el lock async
    now_playing: RwLock<Option<TrackMeta>>,
    length_max: RwLock<Option<Duration>>,
    default_volume: f32,
    events: mpsc::UnboundedSender<TrackEnded>,
}

impl PlaybackSession {
    pub fn new(
        sink: Arc<dyn AudioSink>,
        default_volume: f32,
    ) -> (Self, mpsc::UnboundedReceiver<TrackEnded>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            sink,
            state: Mutex::new(PlayState {
                phase: Phase::Idle,
                current: None,
            }),
            now_playing: RwLock::new(None),
            length_max: RwLock::new(None),
            default_volume,
            events,
        };
        (session, receiver)
    }

    /// Valida la política de duración y entrega el track al sink.
    ///
    /// `PolicyViolation` se detecta antes de tocar el sink: el item nunca
    /// llega a enlazarse. Si el sink rechaza el recurso, el item se libera y
    /// el error vuelve al loop, que avanza al siguiente.
    pub async fn bind(&self, item: PlayableItem) -> Result<(), PlaybackError> {
        if let Some(limit) = *self.length_max.read() {
            if item.meta.duration > limit {
                return Err(PlaybackError::PolicyViolation {
                    duration: item.meta.duration,
                    limit,
                });
            }
        }

        let mut state = self.state.lock().await;
        state.phase = Phase::Starting;
        let path = item.resource.path().to_path_buf();
        match self.sink.play(path, self.default_volume).await {
            Ok(()) => {
                state.phase = Phase::Playing;
                *self.now_playing.write() = Some(item.meta.clone());
                info!("🎵 Reproduciendo: {}", item.meta.title);
                state.current = Some(item);
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::Idle;
                warn!("❌ El sink rechazó {}: {}", item.meta.title, e);
                // `item` se suelta aquí y su recurso se libera
                Err(PlaybackError::Sink(e))
            }
        }
    }

    /// Señal de fin proveniente del adaptador del sink
    pub async fn handle_track_end(&self, reason: EndReason) {
        let mut state = self.state.lock().await;
        self.finish_locked(&mut state, reason);
    }

    /// Para el track activo. No-op idempotente si no hay nada sonando.
    pub async fn force_stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.phase {
            Phase::Starting | Phase::Playing => {
                // stop() garantiza que no llegan más eventos de fin de este
                // track, tampoco después de un bind posterior
                self.sink.stop().await;
                self.finish_locked(&mut state, EndReason::Stopped);
                true
            }
            Phase::Idle => false,
        }
    }

    /// Ajusta el volumen del track activo; no persiste entre tracks
    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        if !(0.0..=2.0).contains(&volume) {
            return Err(PlaybackError::VolumeOutOfRange(volume));
        }
        let state = self.state.lock().await;
        if state.phase != Phase::Playing {
            return Err(PlaybackError::NoActiveTrack);
        }
        self.sink.set_volume(volume).await?;
        info!("🔊 Volumen ajustado a {}%", (volume * 100.0) as u16);
        Ok(())
    }

    /// Metadatos del track sonando, lectura pura
    pub fn now_playing(&self) -> Option<TrackMeta> {
        self.now_playing.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.now_playing.read().is_some()
    }

    pub fn set_length_max(&self, limit: Option<Duration>) {
        *self.length_max.write() = limit;
    }

    fn finish_locked(&self, state: &mut PlayState, reason: EndReason) {
        if state.phase == Phase::Idle {
            debug!("señal de fin ignorada: no hay track enlazado");
            return;
        }
        state.phase = Phase::Idle;
        *self.now_playing.write() = None;
        if let Some(item) = state.current.take() {
            let _ = self.events.send(TrackEnded {
                meta: item.meta.clone(),
                reason,
            });
            // el recurso local se libera aquí, exactamente una vez
            drop(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::ids::UserId;
    use crate::playback::track::LocalResource;
    use crate::sink::MockAudioSink;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn item(title: &str, secs: u64) -> PlayableItem {
        PlayableItem {
            meta: TrackMeta {
                id: format!("test:{title}"),
                title: title.to_string(),
                duration: Duration::from_secs(secs),
                requested_by: UserId(1),
            },
            resource: LocalResource::Unmanaged(PathBuf::from(format!("/tmp/{title}.opus"))),
        }
    }

    #[tokio::test]
    async fn bind_hands_resource_to_sink_at_default_volume() {
        let mut sink = MockAudioSink::new();
        sink.expect_play()
            .withf(|path, volume| path == &PathBuf::from("/tmp/canción.opus") && *volume == 0.5)
            .times(1)
            .returning(|_, _| Ok(()));
        let (session, _events) = PlaybackSession::new(Arc::new(sink), 0.5);

        session.bind(item("canción", 180)).await.unwrap();
        assert_eq!(session.now_playing().unwrap().title, "canción");
    }

    #[tokio::test]
    async fn bind_rejects_item_over_length_max_without_touching_sink() {
        let mut sink = MockAudioSink::new();
        sink.expect_play().times(0);
        let (session, _events) = PlaybackSession::new(Arc::new(sink), 0.5);
        session.set_length_max(Some(Duration::from_secs(300)));

        let err = session.bind(item("larguísima", 400)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::PolicyViolation { .. }));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn sink_rejection_unwinds_to_idle() {
        let mut sink = MockAudioSink::new();
        sink.expect_play()
            .returning(|_, _| Err(SinkError("archivo ilegible".into())));
        let (session, mut events) = PlaybackSession::new(Arc::new(sink), 0.5);

        let err = session.bind(item("rota", 60)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Sink(_)));
        assert!(!session.is_active());
        // ningún evento: el track nunca llegó a sonar
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn only_first_termination_signal_counts() {
        let mut sink = MockAudioSink::new();
        sink.expect_play().returning(|_, _| Ok(()));
        sink.expect_stop().times(1).return_const(());
        let (session, mut events) = PlaybackSession::new(Arc::new(sink), 0.5);
        session.bind(item("disputada", 60)).await.unwrap();

        // fin natural y parada forzada compitiendo por el mismo track
        session.handle_track_end(EndReason::Completed).await;
        let stopped = session.force_stop().await;

        assert!(!stopped);
        let end = events.try_recv().unwrap();
        assert_eq!(end.reason, EndReason::Completed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_transition_releases_the_resource() {
        let mut sink = MockAudioSink::new();
        sink.expect_play().returning(|_, _| Ok(()));
        let (session, mut events) = PlaybackSession::new(Arc::new(sink), 0.5);

        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let item = PlayableItem {
            meta: TrackMeta {
                id: "test:tmp".into(),
                title: "tmp".into(),
                duration: Duration::from_secs(1),
                requested_by: UserId(1),
            },
            resource: LocalResource::Temp(file.into_temp_path()),
        };

        session.bind(item).await.unwrap();
        assert!(path.exists());

        session.handle_track_end(EndReason::Completed).await;
        assert!(!path.exists());
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn force_stop_is_idempotent() {
        let mut sink = MockAudioSink::new();
        sink.expect_play().returning(|_, _| Ok(()));
        sink.expect_stop().times(1).return_const(());
        let (session, mut events) = PlaybackSession::new(Arc::new(sink), 0.5);

        assert!(!session.force_stop().await);

        session.bind(item("una", 60)).await.unwrap();
        assert!(session.force_stop().await);
        assert!(!session.force_stop().await);

        let end = events.try_recv().unwrap();
        assert_eq!(end.reason, EndReason::Stopped);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn volume_is_validated_and_needs_an_active_track() {
        let mut sink = MockAudioSink::new();
        sink.expect_play().returning(|_, _| Ok(()));
        sink.expect_set_volume()
            .withf(|v| (*v - 1.5).abs() < f32::EPSILON)
            .times(1)
            .returning(|_| Ok(()));
        let (session, _events) = PlaybackSession::new(Arc::new(sink), 0.5);

        assert!(matches!(
            session.set_volume(2.5).await,
            Err(PlaybackError::VolumeOutOfRange(_))
        ));
        assert!(matches!(
            session.set_volume(1.0).await,
            Err(PlaybackError::NoActiveTrack)
        ));

        session.bind(item("sonando", 60)).await.unwrap();
        session.set_volume(1.5).await.unwrap();
    }
}
