use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Paths
    pub data_dir: PathBuf,

    // Audio
    pub default_volume: f32,

    // Límites de proceso (las salas afinan los suyos en el ConfigStore)
    pub max_queue_size: usize,

    // UI
    pub queue_page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            queue_page_size: std::env::var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;
        Ok(config)
    }

    /// Valida los valores de configuración antes de arrancar
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 2.0, se recibió: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor que 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("El tamaño de página de la cola debe ser mayor que 0");
        }

        Ok(())
    }

    /// Resumen de la configuración para el log de arranque, sin secretos
    pub fn summary(&self) -> String {
        format!(
            "Config: data_dir={}, volumen {}%, cola máx {} canciones, páginas de {}",
            self.data_dir.display(),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.queue_page_size
        )
    }
}

/// Valores por defecto, pensados para un despliegue en contenedor
impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "/app/data".into(),
            default_volume: 0.5,
            max_queue_size: 1000,
            queue_page_size: 10,
        }
    }
}
