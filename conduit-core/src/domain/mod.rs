//! Core domain types
//!
//! A [`pipeline::Pipeline`] is the user's definition. Running it produces an
//! [`activity::Activity`] that embeds a snapshot of the pipeline and tracks
//! per-stage and per-step progress.

pub mod activity;
pub mod pipeline;
pub mod step;
