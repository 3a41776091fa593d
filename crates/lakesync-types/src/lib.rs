//! Shared data model for the lakesync incremental table sync engine.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod record;
pub mod table;
