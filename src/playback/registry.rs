use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::ids::RoomId;
use crate::sink::AudioSink;
use crate::storage::ConfigStore;

use super::scheduler::{RoomNotification, RoomScheduler};

struct RoomHandle {
    scheduler: Arc<RoomScheduler>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Registro de salas activas del proceso.
///
/// Objeto explícito e inyectable, no un singleton: cada sala se crea
/// perezosamente con el primer comando que la toca y se destruye solo con
/// un teardown explícito. El registry retiene el handle del task de fondo
/// para que el teardown sea determinista.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomHandle>,
    config: Arc<Config>,
    store: Arc<dyn ConfigStore>,
    notify_tx: mpsc::UnboundedSender<RoomNotification>,
}

impl RoomRegistry {
    /// Crea el registry junto con el receptor de notificaciones que el
    /// integrador debe consumir
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ConfigStore>,
    ) -> (Self, mpsc::UnboundedReceiver<RoomNotification>) {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let registry = Self {
            rooms: DashMap::new(),
            config,
            store,
            notify_tx,
        };
        (registry, notify_rx)
    }

    pub fn get(&self, room_id: RoomId) -> Option<Arc<RoomScheduler>> {
        self.rooms.get(&room_id).map(|h| h.scheduler.clone())
    }

    /// Obtiene el scheduler de la sala, creándolo (y arrancando su loop) si
    /// es la primera vez. El `sink` solo se usa en la creación.
    pub fn get_or_create(&self, room_id: RoomId, sink: Arc<dyn AudioSink>) -> Arc<RoomScheduler> {
        let handle = self.rooms.entry(room_id).or_insert_with(|| {
            let (scheduler, ended_rx) = RoomScheduler::new(
                room_id,
                sink,
                self.config.default_volume,
                self.store.clone(),
                self.notify_tx.clone(),
            );
            let cancel = CancellationToken::new();
            let task = tokio::spawn(scheduler.clone().run(ended_rx, cancel.clone()));
            info!("🎛️ Sala {} registrada", room_id);
            RoomHandle {
                scheduler,
                task,
                cancel,
            }
        });
        handle.scheduler.clone()
    }

    /// Da de baja una sala: cancela su loop, espera a que suelte el sink y
    /// drene la cola. Devuelve `false` si la sala no estaba registrada.
    pub async fn teardown(&self, room_id: RoomId) -> bool {
        let Some((_, handle)) = self.rooms.remove(&room_id) else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            error!("Error esperando el loop de la sala {}: {:?}", room_id, e);
        }
        info!("👋 Sala {} liberada", room_id);
        true
    }

    /// Da de baja todas las salas, p. ej. en el shutdown del proceso
    pub async fn teardown_all(&self) {
        let rooms: Vec<RoomId> = self.rooms.iter().map(|entry| *entry.key()).collect();
        futures::future::join_all(rooms.into_iter().map(|room_id| self.teardown(room_id))).await;
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
