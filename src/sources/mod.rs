pub mod local;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::ResolutionError;
use crate::ids::UserId;
use crate::playback::track::PlayableItem;

pub use local::LocalFileResolver;

/// Frontera con la canalización de resolución/extracción.
///
/// Convierte una consulta de texto libre o un archivo subido en un track
/// reproducible con su recurso local. La resolución puede ser lenta (ligada
/// a red); corre en el task del llamador y nunca bloquea el loop de ninguna
/// sala.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una consulta de texto libre
    async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<PlayableItem, ResolutionError>;

    /// Resuelve un archivo ya presente en el disco local
    async fn resolve_file(
        &self,
        path: PathBuf,
        requested_by: UserId,
    ) -> Result<PlayableItem, ResolutionError>;
}
