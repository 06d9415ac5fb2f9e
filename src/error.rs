use std::time::Duration;
use thiserror::Error;

/// Fallo reportado por el dispositivo de salida de audio
#[derive(Debug, Clone, Error)]
#[error("fallo del sink de audio: {0}")]
pub struct SinkError(pub String);

/// Error al resolver una consulta o un archivo en un track reproducible
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no se pudo leer el archivo: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("formato no soportado: {0}")]
    Unsupported(String),
    #[error("fallo del backend de resolución: {0}")]
    Backend(String),
}

/// Error del almacenamiento de configuración por sala
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error de E/S en el almacenamiento: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuración corrupta: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errores de las operaciones de reproducción. Todos son locales a una sala
/// y recuperables; ninguno tumba el proceso.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("la cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },
    #[error("la canción dura {}s y el límite de la sala es {}s", .duration.as_secs(), .limit.as_secs())]
    PolicyViolation { duration: Duration, limit: Duration },
    #[error("no tienes permiso para hacer eso")]
    PermissionDenied,
    #[error("número de canción fuera de rango")]
    OutOfRange,
    #[error("no hay canciones tuyas en la cola")]
    NotFound,
    #[error("ya votaste para saltar esta canción")]
    AlreadyVoted,
    #[error("no hay nada reproduciéndose")]
    NoActiveTrack,
    #[error("volumen fuera de rango (0.0 a 2.0): {0}")]
    VolumeOutOfRange(f32),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
