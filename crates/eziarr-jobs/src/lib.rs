//! # eziarr-jobs
//!
//! Background work for eziarr.
//!
//! This crate provides:
//! - The sync pass mirroring upstream "missing" listings into the record store
//! - The hunter, triggering at most one paced search per run
//! - The adaptive grab protocol
//! - The downloads sweeper
//! - The scheduler that keeps all of the above running per the settings table
//! - User-initiated library actions (search, unmonitor, import)
//!
//! ## Example
//!
//! ```ignore
//! use eziarr_jobs::{JobContext, Scheduler, SchedulerConfig};
//! use eziarr_db::Database;
//!
//! let db = Database::connect("sqlite://media.sqlite?mode=rwc").await?;
//! let ctx = JobContext::from_database(&db, eziarr_arr::media_services_from_env()?);
//!
//! let handle = Scheduler::new(ctx, SchedulerConfig::from_env())
//!     .with_change_notify(db.settings.change_notify())
//!     .start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod actions;
pub mod context;
pub mod grab;
pub mod hunter;
pub mod scheduler;
pub mod sweeper;
pub mod sync;

#[cfg(test)]
mod testing;

pub use context::JobContext;
pub use grab::{needs_profile_switch, needs_queue_clear, GrabProtocol};
pub use hunter::{hunt, hunt_at, HuntOutcome};
pub use scheduler::{
    Reconfigurator, Scheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle, TimerSlot,
};
pub use sweeper::{SweepReport, Sweeper};
pub use sync::{sync_missing, SyncReport};
