//! # Playback Module
//!
//! Per-room playback scheduling for Open Jukebox.
//!
//! Each room (one per server the bot serves) gets its own FIFO queue, its
//! own currently-playing track and its own skip-vote count, driven by a
//! dedicated background task. Rooms are fully independent: there is no
//! ordering relationship and no shared lock across them.
//!
//! ## Architecture
//!
//! ### [`registry`] - Room Registry
//! - Process-wide map of active rooms, created lazily on first use
//! - Retains the task handle of every room loop for deterministic teardown
//!
//! ### [`scheduler`] - Room Scheduler
//! - The long-lived loop: dequeue → bind → await completion → advance
//! - Policy enforcement: queue cap, duration cap, locked users
//! - Command-facing operations: enqueue, vote-skip, admin stop, remove
//!
//! ### [`session`] - Playback Session
//! - State machine driving the external audio sink
//! - Exactly one terminal transition per bound track, race-free
//!
//! ### [`queue`] / [`votes`] / [`presence`] - Supporting state
//! - FIFO queue with blocking dequeue and targeted removal
//! - Distinct-voter skip threshold, reset on every track change
//! - Read-only "now playing" / queue snapshots with paging
//!
//! ## Concurrency Model
//!
//! One background task per room; command operations run on the caller's
//! task. The queue, the vote set and the current-track pointer are the only
//! shared state, each behind its own lock. The loop suspends exactly at two
//! points: waiting for the next queue entry and waiting for the end of
//! playback.

pub mod presence;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod track;
pub mod votes;
