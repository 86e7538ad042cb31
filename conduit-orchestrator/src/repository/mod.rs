//! Repository Module
//!
//! Postgres persistence for pipelines and activities.

pub mod object;

pub use object::PgStore;
