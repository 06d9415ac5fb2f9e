use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;

use crate::ids::{ChannelId, UserId};

/// Metadatos de un track ya resuelto
#[derive(Debug, Clone)]
pub struct TrackMeta {
    /// Identificador estable del track (URL, hash o ruta de origen)
    pub id: String,
    pub title: String,
    pub duration: Duration,
    pub requested_by: UserId,
}

/// Recurso de audio local que respalda un track.
///
/// Propiedad exclusiva: primero de la entrada en cola, luego de la sesión
/// durante la reproducción. Se libera exactamente una vez, al soltarlo.
#[derive(Debug)]
pub enum LocalResource {
    /// Archivo temporal, se borra del disco al soltar el recurso
    Temp(TempPath),
    /// Ruta que el core no gestiona (p. ej. biblioteca local)
    Unmanaged(PathBuf),
}

impl LocalResource {
    pub fn path(&self) -> &Path {
        match self {
            LocalResource::Temp(p) => p,
            LocalResource::Unmanaged(p) => p,
        }
    }
}

/// Track listo para reproducirse: metadatos más su recurso local
#[derive(Debug)]
pub struct PlayableItem {
    pub meta: TrackMeta,
    pub resource: LocalResource,
}

/// Contexto de la petición que originó un track; el dispatcher lo usa para
/// responder por el mismo canal
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub channel_id: Option<ChannelId>,
}

impl RequestContext {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id: Some(channel_id),
        }
    }
}

/// Entrada de la cola de una sala
#[derive(Debug)]
pub struct QueuedTrack {
    pub item: PlayableItem,
    pub requested_by: UserId,
    pub context: RequestContext,
    pub enqueued_at: DateTime<Utc>,
    /// Usuarios a mencionar cuando el track empiece a sonar
    pub notify: Vec<UserId>,
}

impl QueuedTrack {
    pub fn new(item: PlayableItem, requested_by: UserId, context: RequestContext) -> Self {
        Self {
            item,
            requested_by,
            context,
            enqueued_at: Utc::now(),
            notify: Vec::new(),
        }
    }
}
