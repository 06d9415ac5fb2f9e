use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::ids::{RoleId, RoomId, UserId};

/// Configuración persistida de una sala
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Rol cuyo poseedor puede administrar la reproducción de la sala
    pub role_id: Option<RoleId>,
    /// Límite de canciones en cola; sin límite si es `None`
    pub songs_max: Option<usize>,
    /// Duración máxima admitida por canción, en segundos
    pub length_max: Option<u64>,
    /// Usuarios bloqueados para usar el bot en esta sala
    #[serde(default)]
    pub locked: Vec<UserId>,
}

impl RoomConfig {
    /// Predicado de autoridad: el llamador posee el rol maestro de la sala
    pub fn is_authority(&self, caller_roles: &[RoleId]) -> bool {
        self.role_id
            .map(|role| caller_roles.contains(&role))
            .unwrap_or(false)
    }
}

/// Almacenamiento de configuración por sala.
///
/// El scheduler trata los errores del store como "conservar la copia
/// cacheada y avisar"; nunca son fatales.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, room_id: RoomId) -> Result<RoomConfig, StoreError>;
    async fn set_master_role(&self, room_id: RoomId, role: Option<RoleId>)
        -> Result<(), StoreError>;
    async fn set_songs_max(&self, room_id: RoomId, value: Option<usize>)
        -> Result<(), StoreError>;
    async fn set_length_max(&self, room_id: RoomId, value: Option<u64>)
        -> Result<(), StoreError>;
    async fn lock_user(&self, room_id: RoomId, user_id: UserId) -> Result<(), StoreError>;
    /// Devuelve `false` si el usuario no estaba bloqueado
    async fn unlock_user(&self, room_id: RoomId, user_id: UserId) -> Result<bool, StoreError>;
}

/// Manager de almacenamiento basado en archivos JSON, uno por sala
pub struct JsonStorage {
    data_dir: PathBuf,
    rooms_cache: RwLock<HashMap<RoomId, RoomConfig>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir.join("rooms")).await?;
        info!("📁 Storage inicializado en: {}", data_dir.display());

        let storage = Self {
            data_dir,
            rooms_cache: RwLock::new(HashMap::new()),
        };
        storage.load_all_rooms().await?;
        Ok(storage)
    }

    async fn load_room_config(&self, room_id: RoomId) -> Result<RoomConfig, StoreError> {
        let content = fs::read_to_string(self.room_file_path(room_id)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_room_config(
        &self,
        room_id: RoomId,
        config: &RoomConfig,
    ) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(self.room_file_path(room_id), content).await?;
        Ok(())
    }

    async fn load_all_rooms(&self) -> Result<(), StoreError> {
        let rooms_dir = self.data_dir.join("rooms");
        let mut files = fs::read_dir(&rooms_dir).await?;
        let mut loaded = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(raw_id) = name.strip_prefix("room_") else {
                continue;
            };
            let Ok(room_id) = raw_id.parse::<u64>().map(RoomId) else {
                continue;
            };
            match self.load_room_config(room_id).await {
                Ok(config) => {
                    self.rooms_cache.write().insert(room_id, config);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Error cargando configuración de la sala {}: {}", room_id, e);
                }
            }
        }

        if loaded > 0 {
            info!("📂 Cargadas {} configuraciones de sala", loaded);
        }
        Ok(())
    }

    async fn update(
        &self,
        room_id: RoomId,
        mutate: impl FnOnce(&mut RoomConfig) + Send,
    ) -> Result<(), StoreError> {
        let mut config = self.get(room_id).await?;
        mutate(&mut config);
        self.save_room_config(room_id, &config).await?;
        self.rooms_cache.write().insert(room_id, config);
        info!("💾 Configuración actualizada para la sala {}", room_id);
        Ok(())
    }

    fn room_file_path(&self, room_id: RoomId) -> PathBuf {
        self.data_dir
            .join("rooms")
            .join(format!("room_{}.json", room_id))
    }
}

#[async_trait]
impl ConfigStore for JsonStorage {
    async fn get(&self, room_id: RoomId) -> Result<RoomConfig, StoreError> {
        if let Some(config) = self.rooms_cache.read().get(&room_id) {
            return Ok(config.clone());
        }
        match self.load_room_config(room_id).await {
            Ok(config) => {
                self.rooms_cache.write().insert(room_id, config.clone());
                Ok(config)
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                // sala nueva: configuración por defecto, sin tocar el disco
                Ok(RoomConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_master_role(
        &self,
        room_id: RoomId,
        role: Option<RoleId>,
    ) -> Result<(), StoreError> {
        self.update(room_id, |c| c.role_id = role).await
    }

    async fn set_songs_max(
        &self,
        room_id: RoomId,
        value: Option<usize>,
    ) -> Result<(), StoreError> {
        self.update(room_id, |c| c.songs_max = value).await
    }

    async fn set_length_max(
        &self,
        room_id: RoomId,
        value: Option<u64>,
    ) -> Result<(), StoreError> {
        self.update(room_id, |c| c.length_max = value).await
    }

    async fn lock_user(&self, room_id: RoomId, user_id: UserId) -> Result<(), StoreError> {
        self.update(room_id, |c| {
            if !c.locked.contains(&user_id) {
                c.locked.push(user_id);
            }
        })
        .await
    }

    async fn unlock_user(&self, room_id: RoomId, user_id: UserId) -> Result<bool, StoreError> {
        let mut was_locked = false;
        self.update(room_id, |c| {
            let before = c.locked.len();
            c.locked.retain(|u| *u != user_id);
            was_locked = c.locked.len() != before;
        })
        .await?;
        Ok(was_locked)
    }
}
