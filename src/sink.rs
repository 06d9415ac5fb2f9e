use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::SinkError;
use crate::ids::RoomId;

/// Dispositivo externo que renderiza audio desde un recurso local.
///
/// El sink confirma el arranque al retornar de [`play`](AudioSink::play);
/// el fin del track (natural o por error) lo entrega el integrador llamando
/// a [`PlaybackSession::handle_track_end`](crate::playback::session::PlaybackSession::handle_track_end).
/// Tras retornar de [`stop`](AudioSink::stop) no deben llegar más eventos de
/// fin del track detenido, en particular después de un `play` posterior.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Entrega un recurso al dispositivo y espera el acuse de arranque
    async fn play(&self, resource: PathBuf, volume: f32) -> Result<(), SinkError>;

    /// Ajusta el volumen del track activo
    async fn set_volume(&self, volume: f32) -> Result<(), SinkError>;

    /// Detiene el track activo
    async fn stop(&self);
}

/// Obtiene el sink de salida de una sala (p. ej. la conexión de voz del
/// servidor). Lo implementa el integrador sobre su capa de transporte.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SinkProvider: Send + Sync {
    async fn acquire(&self, room_id: RoomId) -> Result<Arc<dyn AudioSink>, SinkError>;
}
