use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::TempPath;
use tracing::debug;

use crate::error::ResolutionError;
use crate::ids::UserId;
use crate::playback::track::{LocalResource, PlayableItem, TrackMeta};

use super::TrackResolver;

/// Resuelve archivos subidos por los usuarios.
///
/// Sondea el contenedor con symphonia para validar el formato y derivar la
/// duración; el título sale del nombre del archivo. El archivo queda
/// gestionado como recurso temporal: se borra al terminar de sonar.
#[derive(Debug, Default)]
pub struct LocalFileResolver;

impl LocalFileResolver {
    pub fn new() -> Self {
        Self
    }

    fn probe_duration(path: &Path) -> Result<Duration, ResolutionError> {
        let file = std::fs::File::open(path)?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ResolutionError::Unsupported(e.to_string()))?;

        let track = probed
            .format
            .default_track()
            .ok_or_else(|| ResolutionError::Unsupported("sin pistas de audio".into()))?;

        let params = &track.codec_params;
        match (params.n_frames, params.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => {
                Ok(Duration::from_secs_f64(frames as f64 / rate as f64))
            }
            _ => Err(ResolutionError::Unsupported(
                "el contenedor no declara la duración".into(),
            )),
        }
    }
}

#[async_trait]
impl TrackResolver for LocalFileResolver {
    async fn resolve(
        &self,
        query: &str,
        _requested_by: UserId,
    ) -> Result<PlayableItem, ResolutionError> {
        Err(ResolutionError::Backend(format!(
            "este origen solo reproduce archivos locales, no consultas: {query}"
        )))
    }

    async fn resolve_file(
        &self,
        path: PathBuf,
        requested_by: UserId,
    ) -> Result<PlayableItem, ResolutionError> {
        let probe_path = path.clone();
        let duration = tokio::task::spawn_blocking(move || Self::probe_duration(&probe_path))
            .await
            .map_err(|e| ResolutionError::Backend(e.to_string()))??;

        let title = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("archivo")
            .to_string();
        debug!("🎧 Archivo sondeado: {} ({:?})", title, duration);

        Ok(PlayableItem {
            meta: TrackMeta {
                id: format!("file:{}", path.display()),
                title,
                duration,
                requested_by,
            },
            resource: LocalResource::Temp(TempPath::from_path(path)),
        })
    }
}
