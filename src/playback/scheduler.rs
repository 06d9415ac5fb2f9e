use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::ids::{RoomId, UserId};
use crate::sink::AudioSink;
use crate::storage::{ConfigStore, RoomConfig};

use super::presence::RoomReport;
use super::queue::RoomQueue;
use super::session::{EndReason, PlaybackSession, TrackEnded};
use super::track::{PlayableItem, QueuedTrack, RequestContext, TrackMeta};
use super::votes::VoteTracker;

/// Resultado de un voto de salto
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Voto registrado, aún faltan votos
    VoteRegistered { votes: usize, required: usize },
    /// Umbral alcanzado: el track actual fue detenido
    Skipped,
}

/// Qué entrada remover de la cola
#[derive(Debug, Clone, Copy)]
pub enum RemoveSelector {
    /// Posición 1-based en la vista actual de la cola
    Index(usize),
    /// La entrada más reciente del propio solicitante
    LastBySubmitter,
}

/// Notificación estructurada que el integrador convierte en mensaje de chat
#[derive(Debug, Clone)]
pub enum Notification {
    NowPlaying {
        meta: TrackMeta,
        requested_by: UserId,
        notify: Vec<UserId>,
    },
    /// El item fue rechazado por política antes de sonar
    ItemSkipped { title: String, reason: String },
    /// El sink falló; la cola avanza igual que con un fin natural
    TrackFailed { title: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct RoomNotification {
    pub room_id: RoomId,
    pub context: RequestContext,
    pub kind: Notification,
}

/// Scheduler de reproducción de una sala.
///
/// Un task de fondo por sala consume la cola y conduce la sesión; las
/// operaciones de comandos corren en el task del llamador y solo comparten
/// con el loop la cola, los votos y el puntero al track actual. Los únicos
/// puntos de suspensión del loop son la espera de cola y la espera de fin
/// de reproducción.
pub struct RoomScheduler {
    room_id: RoomId,
    queue: RoomQueue,
    votes: VoteTracker,
    session: PlaybackSession,
    config: RwLock<RoomConfig>,
    store: Arc<dyn ConfigStore>,
    notify_tx: mpsc::UnboundedSender<RoomNotification>,
}

impl RoomScheduler {
    pub(crate) fn new(
        room_id: RoomId,
        sink: Arc<dyn AudioSink>,
        default_volume: f32,
        store: Arc<dyn ConfigStore>,
        notify_tx: mpsc::UnboundedSender<RoomNotification>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TrackEnded>) {
        let (session, ended_rx) = PlaybackSession::new(sink, default_volume);
        let scheduler = Arc::new(Self {
            room_id,
            queue: RoomQueue::new(),
            votes: VoteTracker::new(),
            session,
            config: RwLock::new(RoomConfig::default()),
            store,
            notify_tx,
        });
        (scheduler, ended_rx)
    }

    /// Loop de fondo de la sala. Nunca termina por sí solo: solo el
    /// teardown del registry lo cancela.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut ended: mpsc::UnboundedReceiver<TrackEnded>,
        cancel: CancellationToken,
    ) {
        self.refresh_config().await;
        info!("🎛️ Loop de la sala {} iniciado", self.room_id);

        loop {
            let entry = tokio::select! {
                _ = cancel.cancelled() => break,
                entry = self.queue.dequeue() => entry,
            };

            self.votes.reset();

            let QueuedTrack {
                item,
                requested_by,
                context,
                notify,
                ..
            } = entry;
            let meta = item.meta.clone();

            match self.session.bind(item).await {
                Ok(()) => {}
                Err(PlaybackError::PolicyViolation { duration, limit }) => {
                    warn!(
                        "⏭️ {} excede el límite de la sala {} ({}s > {}s)",
                        meta.title,
                        self.room_id,
                        duration.as_secs(),
                        limit.as_secs()
                    );
                    self.publish(
                        context,
                        Notification::ItemSkipped {
                            title: meta.title,
                            reason: PlaybackError::PolicyViolation { duration, limit }
                                .to_string(),
                        },
                    );
                    continue;
                }
                Err(e) => {
                    self.publish(
                        context,
                        Notification::TrackFailed {
                            title: meta.title,
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            }

            self.publish(
                context.clone(),
                Notification::NowPlaying {
                    meta: meta.clone(),
                    requested_by,
                    notify,
                },
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.session.force_stop().await;
                    break;
                }
                end = ended.recv() => {
                    match end {
                        Some(TrackEnded { reason: EndReason::Failed(e), meta }) => {
                            warn!("❌ Fallo reproduciendo {}: {}", meta.title, e);
                            self.publish(
                                context,
                                Notification::TrackFailed {
                                    title: meta.title,
                                    reason: e,
                                },
                            );
                        }
                        Some(TrackEnded { reason, meta }) => {
                            debug!("Track {} terminado: {:?}", meta.title, reason);
                        }
                        // el canal solo se cierra si la sesión murió
                        None => break,
                    }
                }
            }

            self.votes.reset();
        }

        // teardown: detener el sink en vuelo y soltar todo lo pendiente
        self.session.force_stop().await;
        let drained = self.queue.drain_all();
        if !drained.is_empty() {
            info!(
                "🗑️ Sala {}: {} canciones pendientes liberadas",
                self.room_id,
                drained.len()
            );
        }
        info!("👋 Loop de la sala {} terminado", self.room_id);
    }

    /// Encola un track respetando la política de la sala
    pub async fn enqueue(
        &self,
        item: PlayableItem,
        requested_by: UserId,
        context: RequestContext,
        notify: Vec<UserId>,
    ) -> Result<usize, PlaybackError> {
        self.refresh_config().await;
        let (songs_max, locked) = {
            let config = self.config.read();
            (config.songs_max, config.locked.contains(&requested_by))
        };
        if locked {
            return Err(PlaybackError::PermissionDenied);
        }

        let entry = QueuedTrack {
            item,
            requested_by,
            context,
            enqueued_at: Utc::now(),
            notify,
        };
        self.queue.enqueue(entry, songs_max)
    }

    /// Vota por saltar el track actual; al llegar al umbral lo detiene
    pub async fn vote_skip(
        &self,
        voter: UserId,
        eligible_listeners: usize,
    ) -> Result<SkipOutcome, PlaybackError> {
        if !self.session.is_active() {
            return Err(PlaybackError::NoActiveTrack);
        }

        let votes = self.votes.register(voter)?;
        let required = VoteTracker::required_votes(eligible_listeners);

        if self.votes.has_threshold(eligible_listeners) {
            info!(
                "⏭️ Umbral de salto alcanzado en la sala {} ({}/{})",
                self.room_id, votes, required
            );
            self.session.force_stop().await;
            self.votes.reset();
            Ok(SkipOutcome::Skipped)
        } else {
            Ok(SkipOutcome::VoteRegistered { votes, required })
        }
    }

    /// Parada administrativa: vacía la cola y detiene el track actual
    pub async fn admin_stop(&self) -> Result<(), PlaybackError> {
        let drained = self.queue.drain_all();
        let stopped = self.session.force_stop().await;
        if stopped || !drained.is_empty() {
            info!("⏹️ Sala {} detenida por un administrador", self.room_id);
            Ok(())
        } else {
            Err(PlaybackError::NoActiveTrack)
        }
    }

    /// Remueve una entrada de la cola. Sin autoridad solo se pueden remover
    /// las entradas propias.
    pub fn remove_entry(
        &self,
        selector: RemoveSelector,
        requester: UserId,
        is_authority: bool,
    ) -> Result<TrackMeta, PlaybackError> {
        let removed = match selector {
            RemoveSelector::LastBySubmitter => self.queue.remove_last_by_submitter(requester)?,
            RemoveSelector::Index(index) => self.queue.remove_at(index, |entry| {
                is_authority || entry.requested_by == requester
            })?,
        };
        Ok(removed.item.meta.clone())
        // el recurso de la entrada removida se libera al soltarla
    }

    /// Instantánea de la sala: track actual y cola, lectura pura
    pub fn report(&self) -> RoomReport {
        RoomReport {
            current: self.session.now_playing(),
            queued: self.queue.peek_all(),
        }
    }

    /// Ajusta el volumen del track activo
    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.session.set_volume(volume).await
    }

    /// Señal de fin del track proveniente del adaptador del sink
    pub async fn notify_track_end(&self, reason: EndReason) {
        self.session.handle_track_end(reason).await;
    }

    /// Relee la configuración de la sala; ante un error del store conserva
    /// la copia anterior
    pub async fn refresh_config(&self) {
        match self.store.get(self.room_id).await {
            Ok(config) => {
                self.session
                    .set_length_max(config.length_max.map(Duration::from_secs));
                *self.config.write() = config;
            }
            Err(e) => {
                warn!(
                    "⚠️ No se pudo leer la configuración de la sala {}: {} (se conserva la anterior)",
                    self.room_id, e
                );
            }
        }
    }

    pub fn config_snapshot(&self) -> RoomConfig {
        self.config.read().clone()
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    fn publish(&self, context: RequestContext, kind: Notification) {
        let _ = self.notify_tx.send(RoomNotification {
            room_id: self.room_id,
            context,
            kind,
        });
    }
}
