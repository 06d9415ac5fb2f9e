use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PlaybackError;
use crate::ids::{RoleId, RoomId, UserId};
use crate::playback::presence::QueuePage;
use crate::playback::queue::QueueSnapshot;
use crate::playback::registry::RoomRegistry;
use crate::playback::scheduler::{RemoveSelector, RoomScheduler, SkipOutcome};
use crate::playback::track::{RequestContext, TrackMeta};
use crate::sink::SinkProvider;
use crate::sources::TrackResolver;
use crate::storage::{ConfigStore, RoomConfig};

/// Invocación estructurada entregada por el gateway de chat
#[derive(Debug)]
pub struct Invocation {
    pub room_id: RoomId,
    pub caller: UserId,
    /// Roles del llamador, para el predicado de autoridad
    pub caller_roles: Vec<RoleId>,
    /// El llamador es administrador del servidor
    pub is_admin: bool,
    pub context: RequestContext,
    pub operation: Operation,
}

#[derive(Debug)]
pub enum Operation {
    /// Resuelve una consulta y la encola
    Play { query: String },
    /// Encola un archivo ya subido al disco local
    PlayFile { path: PathBuf },
    /// Vota por saltar el track actual
    Skip { eligible_listeners: usize },
    /// [M] Vacía la cola y detiene la reproducción
    Stop,
    Queue { page: usize },
    MyQueue,
    NowPlaying,
    /// Remueve la entrada en esa posición 1-based
    Remove { index: usize },
    /// Remueve la última entrada propia
    Unqueue,
    /// [M] Ajusta el volumen del track actual
    Volume { value: f32 },
    /// [A] Define el rol maestro de la sala
    SetMaster { role: Option<RoleId> },
    /// [M] Bloquea a un usuario
    Lock { user: UserId },
    /// [M] Desbloquea a un usuario
    Unlock { user: UserId },
    /// [M] Lista los usuarios bloqueados
    Locked,
    /// [M] Límite de canciones en cola
    SetSongsMax { value: Option<usize> },
    /// [M] Límite de duración por canción, en segundos
    SetLengthMax { value: Option<u64> },
}

/// Respuesta estructurada; el gateway la convierte en texto por su canal
#[derive(Debug)]
pub enum Reply {
    Enqueued { title: String, position: usize },
    VoteRegistered { votes: usize, required: usize },
    Skipped,
    Stopped,
    QueuePage(QueuePage),
    UserQueue(Vec<QueueSnapshot>),
    NowPlaying(Option<TrackMeta>),
    Removed { title: String },
    VolumeSet { value: f32 },
    ConfigUpdated,
    LockedUsers(Vec<UserId>),
}

/// Enruta invocaciones del gateway hacia las salas.
///
/// Resuelve el predicado de autoridad una vez por operación a partir de la
/// configuración de la sala y nunca formatea mensajes de chat.
pub struct CommandDispatcher {
    config: Arc<Config>,
    registry: Arc<RoomRegistry>,
    store: Arc<dyn ConfigStore>,
    resolver: Arc<dyn TrackResolver>,
    sinks: Arc<dyn SinkProvider>,
}

impl CommandDispatcher {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<RoomRegistry>,
        store: Arc<dyn ConfigStore>,
        resolver: Arc<dyn TrackResolver>,
        sinks: Arc<dyn SinkProvider>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            resolver,
            sinks,
        }
    }

    /// Ejecuta una invocación y devuelve la respuesta estructurada
    pub async fn execute(&self, invocation: Invocation) -> Result<Reply, PlaybackError> {
        let Invocation {
            room_id,
            caller,
            caller_roles,
            is_admin,
            context,
            operation,
        } = invocation;

        let room_config = match self.store.get(room_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "⚠️ No se pudo leer la configuración de la sala {}: {}",
                    room_id, e
                );
                RoomConfig::default()
            }
        };
        let is_authority = room_config.is_authority(&caller_roles);

        // los usuarios bloqueados no operan el bot en esta sala
        if room_config.locked.contains(&caller) && !is_admin {
            return Err(PlaybackError::PermissionDenied);
        }

        info!("📝 Operación {:?} de {} en la sala {}", operation, caller, room_id);

        match operation {
            Operation::Play { query } => {
                let item = self.resolver.resolve(&query, caller).await?;
                self.enqueue_resolved(room_id, caller, context, item).await
            }
            Operation::PlayFile { path } => {
                let item = self.resolver.resolve_file(path, caller).await?;
                self.enqueue_resolved(room_id, caller, context, item).await
            }
            Operation::Skip { eligible_listeners } => {
                let scheduler = self.active_room(room_id)?;
                match scheduler.vote_skip(caller, eligible_listeners).await? {
                    SkipOutcome::Skipped => Ok(Reply::Skipped),
                    SkipOutcome::VoteRegistered { votes, required } => {
                        Ok(Reply::VoteRegistered { votes, required })
                    }
                }
            }
            Operation::Stop => {
                self.require_authority(is_authority, is_admin)?;
                let scheduler = self.active_room(room_id)?;
                scheduler.admin_stop().await?;
                Ok(Reply::Stopped)
            }
            Operation::Queue { page } => {
                let scheduler = self.active_room(room_id)?;
                Ok(Reply::QueuePage(
                    scheduler.report().page(page, self.config.queue_page_size),
                ))
            }
            Operation::MyQueue => {
                let scheduler = self.active_room(room_id)?;
                Ok(Reply::UserQueue(scheduler.report().queued_by(caller)))
            }
            Operation::NowPlaying => {
                let scheduler = self.active_room(room_id)?;
                Ok(Reply::NowPlaying(scheduler.report().current))
            }
            Operation::Remove { index } => {
                let scheduler = self.active_room(room_id)?;
                let removed = scheduler.remove_entry(
                    RemoveSelector::Index(index),
                    caller,
                    is_authority || is_admin,
                )?;
                Ok(Reply::Removed {
                    title: removed.title,
                })
            }
            Operation::Unqueue => {
                let scheduler = self.active_room(room_id)?;
                let removed =
                    scheduler.remove_entry(RemoveSelector::LastBySubmitter, caller, false)?;
                Ok(Reply::Removed {
                    title: removed.title,
                })
            }
            Operation::Volume { value } => {
                self.require_authority(is_authority, is_admin)?;
                let scheduler = self.active_room(room_id)?;
                scheduler.set_volume(value).await?;
                Ok(Reply::VolumeSet { value })
            }
            Operation::SetMaster { role } => {
                // solo administradores cambian quién administra
                if !is_admin {
                    return Err(PlaybackError::PermissionDenied);
                }
                self.store.set_master_role(room_id, role).await?;
                self.refresh_room(room_id).await;
                Ok(Reply::ConfigUpdated)
            }
            Operation::Lock { user } => {
                self.require_authority(is_authority, is_admin)?;
                self.store.lock_user(room_id, user).await?;
                self.refresh_room(room_id).await;
                Ok(Reply::ConfigUpdated)
            }
            Operation::Unlock { user } => {
                self.require_authority(is_authority, is_admin)?;
                if !self.store.unlock_user(room_id, user).await? {
                    return Err(PlaybackError::NotFound);
                }
                self.refresh_room(room_id).await;
                Ok(Reply::ConfigUpdated)
            }
            Operation::Locked => {
                self.require_authority(is_authority, is_admin)?;
                Ok(Reply::LockedUsers(room_config.locked))
            }
            Operation::SetSongsMax { value } => {
                self.require_authority(is_authority, is_admin)?;
                self.store.set_songs_max(room_id, value).await?;
                self.refresh_room(room_id).await;
                Ok(Reply::ConfigUpdated)
            }
            Operation::SetLengthMax { value } => {
                self.require_authority(is_authority, is_admin)?;
                self.store.set_length_max(room_id, value).await?;
                self.refresh_room(room_id).await;
                Ok(Reply::ConfigUpdated)
            }
        }
    }

    /// Desregistra una sala, p. ej. cuando el bot sale de su canal de voz
    pub async fn leave_room(&self, room_id: RoomId) -> bool {
        self.registry.teardown(room_id).await
    }

    async fn enqueue_resolved(
        &self,
        room_id: RoomId,
        caller: UserId,
        context: RequestContext,
        item: crate::playback::track::PlayableItem,
    ) -> Result<Reply, PlaybackError> {
        let title = item.meta.title.clone();
        let sink = self.sinks.acquire(room_id).await?;
        let scheduler = self.registry.get_or_create(room_id, sink);
        let position = scheduler.enqueue(item, caller, context, vec![]).await?;
        Ok(Reply::Enqueued { title, position })
    }

    fn active_room(&self, room_id: RoomId) -> Result<Arc<RoomScheduler>, PlaybackError> {
        self.registry.get(room_id).ok_or(PlaybackError::NoActiveTrack)
    }

    /// Propaga un cambio de configuración al scheduler de la sala, si existe
    async fn refresh_room(&self, room_id: RoomId) {
        if let Some(scheduler) = self.registry.get(room_id) {
            scheduler.refresh_config().await;
        }
    }

    fn require_authority(&self, is_authority: bool, is_admin: bool) -> Result<(), PlaybackError> {
        if is_authority || is_admin {
            Ok(())
        } else {
            Err(PlaybackError::PermissionDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::playback::track::{LocalResource, PlayableItem};
    use crate::sink::{MockAudioSink, MockSinkProvider};
    use crate::sources::MockTrackResolver;
    use crate::storage::MockConfigStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn item(title: &str, user: u64) -> PlayableItem {
        PlayableItem {
            meta: TrackMeta {
                id: format!("test:{title}"),
                title: title.to_string(),
                duration: Duration::from_secs(120),
                requested_by: UserId(user),
            },
            resource: LocalResource::Unmanaged(PathBuf::from(format!("/tmp/{title}.opus"))),
        }
    }

    fn invocation(caller: u64, operation: Operation) -> Invocation {
        Invocation {
            room_id: RoomId(1),
            caller: UserId(caller),
            caller_roles: vec![],
            is_admin: false,
            context: RequestContext::default(),
            operation,
        }
    }

    struct Fixture {
        dispatcher: CommandDispatcher,
        registry: Arc<RoomRegistry>,
    }

    fn fixture(room_config: RoomConfig) -> Fixture {
        let mut store = MockConfigStore::new();
        let for_get = room_config.clone();
        store.expect_get().returning(move |_| Ok(for_get.clone()));
        store.expect_set_master_role().returning(|_, _| Ok(()));
        store.expect_lock_user().returning(|_, _| Ok(()));
        store.expect_unlock_user().returning(|_, _| Ok(true));
        store.expect_set_songs_max().returning(|_, _| Ok(()));
        store.expect_set_length_max().returning(|_, _| Ok(()));
        let store: Arc<dyn ConfigStore> = Arc::new(store);

        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .returning(|query, user| Ok(item(query, user.0)));

        let mut sinks = MockSinkProvider::new();
        sinks.expect_acquire().returning(|_| {
            let mut sink = MockAudioSink::new();
            sink.expect_play().returning(|_, _| Ok(()));
            sink.expect_stop().return_const(());
            Ok(Arc::new(sink) as Arc<dyn crate::sink::AudioSink>)
        });

        let config = Arc::new(Config::default());
        let (registry, _notify_rx) = RoomRegistry::new(config.clone(), store.clone());
        let registry = Arc::new(registry);

        Fixture {
            dispatcher: CommandDispatcher::new(
                config,
                registry.clone(),
                store,
                Arc::new(resolver),
                Arc::new(sinks),
            ),
            registry,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("la condición esperada nunca se cumplió");
    }

    #[tokio::test]
    async fn play_resolves_and_enqueues() {
        let f = fixture(RoomConfig::default());

        let reply = f
            .dispatcher
            .execute(invocation(1, Operation::Play { query: "tema".into() }))
            .await
            .unwrap();
        assert!(matches!(
            reply,
            Reply::Enqueued { ref title, position: 1 } if title == "tema"
        ));

        // la sala quedó registrada y el loop la está reproduciendo
        let scheduler = f.registry.get(RoomId(1)).unwrap();
        wait_until(|| scheduler.report().current.is_some()).await;

        f.registry.teardown_all().await;
    }

    #[tokio::test]
    async fn locked_user_cannot_operate() {
        let f = fixture(RoomConfig {
            locked: vec![UserId(66)],
            ..RoomConfig::default()
        });

        let err = f
            .dispatcher
            .execute(invocation(66, Operation::Play { query: "x".into() }))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::PermissionDenied));
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn authority_gated_operations_check_the_master_role() {
        let f = fixture(RoomConfig {
            role_id: Some(RoleId(10)),
            ..RoomConfig::default()
        });

        // sin el rol maestro no se puede bloquear usuarios
        let err = f
            .dispatcher
            .execute(invocation(1, Operation::Lock { user: UserId(2) }))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::PermissionDenied));

        // con el rol sí
        let mut inv = invocation(1, Operation::Lock { user: UserId(2) });
        inv.caller_roles = vec![RoleId(10)];
        let reply = f.dispatcher.execute(inv).await.unwrap();
        assert!(matches!(reply, Reply::ConfigUpdated));
    }

    #[tokio::test]
    async fn set_master_requires_administrator() {
        let f = fixture(RoomConfig::default());

        let err = f
            .dispatcher
            .execute(invocation(1, Operation::SetMaster { role: Some(RoleId(9)) }))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::PermissionDenied));

        let mut inv = invocation(1, Operation::SetMaster { role: Some(RoleId(9)) });
        inv.is_admin = true;
        let reply = f.dispatcher.execute(inv).await.unwrap();
        assert!(matches!(reply, Reply::ConfigUpdated));
    }

    #[tokio::test]
    async fn remove_respects_ownership_and_authority() {
        let f = fixture(RoomConfig {
            role_id: Some(RoleId(10)),
            ..RoomConfig::default()
        });

        // dos canciones: la primera pasa a sonar, la segunda queda en cola
        f.dispatcher
            .execute(invocation(1, Operation::Play { query: "sonando".into() }))
            .await
            .unwrap();
        let scheduler = f.registry.get(RoomId(1)).unwrap();
        wait_until(|| scheduler.report().current.is_some()).await;
        f.dispatcher
            .execute(invocation(1, Operation::Play { query: "encolada".into() }))
            .await
            .unwrap();

        // otro usuario sin autoridad no puede removerla
        let err = f
            .dispatcher
            .execute(invocation(2, Operation::Remove { index: 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::PermissionDenied));

        // con el rol maestro sí
        let mut inv = invocation(2, Operation::Remove { index: 1 });
        inv.caller_roles = vec![RoleId(10)];
        let reply = f.dispatcher.execute(inv).await.unwrap();
        assert!(matches!(reply, Reply::Removed { ref title } if title == "encolada"));

        f.registry.teardown_all().await;
    }

    #[tokio::test]
    async fn operations_on_an_unused_room_report_nothing_playing() {
        let f = fixture(RoomConfig::default());

        let err = f
            .dispatcher
            .execute(invocation(1, Operation::NowPlaying))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::NoActiveTrack));
    }

    #[tokio::test]
    async fn resolution_failure_enqueues_nothing() {
        let mut store = MockConfigStore::new();
        store.expect_get().returning(|_| Ok(RoomConfig::default()));
        let store: Arc<dyn ConfigStore> = Arc::new(store);

        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|_, _| {
            Err(crate::error::ResolutionError::Backend("no hay red".into()))
        });

        let mut sinks = MockSinkProvider::new();
        sinks
            .expect_acquire()
            .returning(|_| Err(SinkError("no debería llegar aquí".into())));

        let config = Arc::new(Config::default());
        let (registry, _notify_rx) = RoomRegistry::new(config.clone(), store.clone());
        let registry = Arc::new(registry);
        let dispatcher = CommandDispatcher::new(
            config,
            registry.clone(),
            store,
            Arc::new(resolver),
            Arc::new(sinks),
        );

        let err = dispatcher
            .execute(invocation(1, Operation::Play { query: "x".into() }))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Resolution(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn leave_room_tears_the_room_down() {
        let f = fixture(RoomConfig::default());

        f.dispatcher
            .execute(invocation(1, Operation::Play { query: "algo".into() }))
            .await
            .unwrap();
        assert_eq!(f.registry.len(), 1);

        assert!(f.dispatcher.leave_room(RoomId(1)).await);
        assert!(f.registry.is_empty());
    }
}
