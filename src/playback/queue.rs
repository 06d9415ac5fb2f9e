use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::ids::UserId;

use super::track::{QueuedTrack, TrackMeta};

/// Vista clonable de una entrada en cola, para reportes
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub meta: TrackMeta,
    pub requested_by: UserId,
    pub enqueued_at: DateTime<Utc>,
}

/// Cola FIFO de una sala.
///
/// El orden de inserción es el único orden. El único consumidor lógico de
/// [`dequeue`](RoomQueue::dequeue) es el loop del scheduler de la sala; las
/// demás operaciones pueden llamarse concurrentemente desde los comandos.
#[derive(Debug, Default)]
pub struct RoomQueue {
    items: Mutex<VecDeque<QueuedTrack>>,
    available: Notify,
}

impl RoomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una entrada al final de la cola.
    ///
    /// El límite `songs_max` se aplica solo en el momento de la admisión,
    /// nunca retroactivamente. Devuelve la posición 1-based asignada.
    pub fn enqueue(
        &self,
        entry: QueuedTrack,
        songs_max: Option<usize>,
    ) -> Result<usize, PlaybackError> {
        let position = {
            let mut items = self.items.lock();
            if let Some(max) = songs_max {
                if items.len() >= max {
                    return Err(PlaybackError::QueueFull { max });
                }
            }
            info!("➕ Agregado a la cola: {}", entry.item.meta.title);
            items.push_back(entry);
            items.len()
        };
        self.available.notify_one();
        Ok(position)
    }

    /// Saca la siguiente entrada, suspendiendo al llamador hasta que haya una
    pub async fn dequeue(&self) -> QueuedTrack {
        loop {
            if let Some(entry) = self.items.lock().pop_front() {
                return entry;
            }
            self.available.notified().await;
        }
    }

    /// Vista ordenada de la cola sin remover nada
    pub fn peek_all(&self) -> Vec<QueueSnapshot> {
        self.items
            .lock()
            .iter()
            .map(|entry| QueueSnapshot {
                meta: entry.item.meta.clone(),
                requested_by: entry.requested_by,
                enqueued_at: entry.enqueued_at,
            })
            .collect()
    }

    /// Remueve la entrada más reciente del usuario, buscando desde el final
    pub fn remove_last_by_submitter(&self, user_id: UserId) -> Result<QueuedTrack, PlaybackError> {
        let mut items = self.items.lock();
        let index = items
            .iter()
            .rposition(|entry| entry.requested_by == user_id)
            .ok_or(PlaybackError::NotFound)?;
        let entry = items.remove(index).ok_or(PlaybackError::NotFound)?;
        debug!("❌ Removida la última canción de {}", user_id);
        Ok(entry)
    }

    /// Remueve la entrada en la posición 1-based si `may_remove` lo permite.
    ///
    /// La inspección y la remoción son atómicas respecto a otras mutaciones.
    pub fn remove_at(
        &self,
        index: usize,
        may_remove: impl FnOnce(&QueuedTrack) -> bool,
    ) -> Result<QueuedTrack, PlaybackError> {
        let mut items = self.items.lock();
        if index == 0 || index > items.len() {
            return Err(PlaybackError::OutOfRange);
        }
        if !may_remove(&items[index - 1]) {
            return Err(PlaybackError::PermissionDenied);
        }
        let entry = items.remove(index - 1).ok_or(PlaybackError::OutOfRange)?;
        debug!("❌ Removida la canción en posición {}", index);
        Ok(entry)
    }

    /// Vacía la cola atómicamente y devuelve todo lo removido
    pub fn drain_all(&self) -> Vec<QueuedTrack> {
        let drained: Vec<_> = self.items.lock().drain(..).collect();
        if !drained.is_empty() {
            info!("🗑️ Cola vaciada: {} canciones removidas", drained.len());
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
