//! # Open Jukebox
//!
//! Multi-room playback scheduling core for music bots.
//!
//! The crate coordinates playback of user-submitted audio across many
//! independent, concurrently active rooms: per-room FIFO queues, democratic
//! skip votes, administrative stops and per-room policy (queue cap,
//! duration cap, locked users). The chat gateway, the query-resolution
//! pipeline and the audio output device are external collaborators reached
//! through the [`sink`] and [`sources`] traits; this core never talks to
//! the network and never formats chat messages.
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use open_jukebox::config::Config;
//! use open_jukebox::dispatch::CommandDispatcher;
//! use open_jukebox::playback::registry::RoomRegistry;
//! use open_jukebox::sources::LocalFileResolver;
//! use open_jukebox::storage::JsonStorage;
//!
//! # async fn wire(sinks: Arc<dyn open_jukebox::sink::SinkProvider>) -> anyhow::Result<()> {
//! let config = Arc::new(Config::load()?);
//! let store = Arc::new(JsonStorage::new(config.data_dir.clone()).await?);
//! let (registry, notifications) = RoomRegistry::new(config.clone(), store.clone());
//! let dispatcher = CommandDispatcher::new(
//!     config,
//!     Arc::new(registry),
//!     store,
//!     Arc::new(LocalFileResolver::new()),
//!     sinks,
//! );
//! // el gateway consume `notifications` y alimenta `dispatcher.execute(...)`
//! # let _ = (dispatcher, notifications);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod playback;
pub mod sink;
pub mod sources;
pub mod storage;

pub use config::Config;
pub use dispatch::{CommandDispatcher, Invocation, Operation, Reply};
pub use error::PlaybackError;
pub use ids::{ChannelId, RoleId, RoomId, UserId};
pub use playback::registry::RoomRegistry;
pub use playback::scheduler::{RoomNotification, RoomScheduler, SkipOutcome};
