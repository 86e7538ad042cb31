//! Conduit Engine
//!
//! The orchestration engine: maps pipeline definitions onto backend jobs,
//! assigns work to worker nodes, sequences stages with approval gating, and
//! keeps activities in sync with the backend's progress reports.
//!
//! Data flow:
//! - [`Orchestrator`] builds a [`job_spec::JobSpecBuilder`] spec per stage, which
//!   compiles every step through the [`compiler::CommandCompiler`]
//! - [`scheduler::SyncScheduler`] polls the backend per activity through
//!   [`sync::sync_activity`], which feeds transcripts to [`log_split`]
//! - [`completion::CompletionHandler`] cleans up once an activity is done

pub mod completion;
pub mod compiler;
pub mod config;
pub mod error;
pub mod job_spec;
pub mod locks;
pub mod log_split;
pub mod node;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod services;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use completion::CompletionHandler;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use locks::ActivityLocks;
pub use notify::{Notification, Notifier, TracingNotifier};
pub use orchestrator::Orchestrator;
pub use scheduler::{StepEvent, StepOutcome, SyncScheduler, SyncTrigger};
pub use service::ActivityService;
pub use store::{ActivityStore, MemoryStore};
