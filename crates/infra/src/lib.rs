//! Infrastructure layer: config, Postgres plumbing, stores and startup.

pub mod config;
pub mod db;
pub mod migration;
pub mod read_model;
pub mod repository;
pub mod startup;

pub use startup::{RequestServer, StartupError, StartupPhase, StartupSequencer};
