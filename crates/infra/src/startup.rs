//! Startup sequencing.
//!
//! Before any request is served the process:
//!
//! 1. validates and compiles the mapping configuration,
//! 2. migrates the write store, then the event store,
//! 3. creates missing read-side collections,
//!
//! in that order, each step only acting when its store reports pending work.
//! The first failure is logged with the phase it happened in and returned; the
//! sequencer does not retry.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use keystone_core::StoreError;
use keystone_mapping::{ConfigurationError, MappingConfiguration};

use crate::migration::MigrationTarget;
use crate::read_model::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    ValidatingMappings,
    MigratingWriteStore,
    MigratingEventStore,
    EnsuringReadCollections,
    Serving,
    Failed,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidatingMappings => "validating_mappings",
            Self::MigratingWriteStore => "migrating_write_store",
            Self::MigratingEventStore => "migrating_event_store",
            Self::EnsuringReadCollections => "ensuring_read_collections",
            Self::Serving => "serving",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid mapping configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("request server failed: {0}")]
    Serve(#[from] io::Error),
}

/// Whatever serves requests once startup completes.
#[async_trait]
pub trait RequestServer: Send {
    /// Runs until shutdown.
    async fn serve(self) -> io::Result<()>;
}

pub struct StartupSequencer {
    mappings: Arc<dyn MappingConfiguration>,
    write_store: Arc<dyn MigrationTarget>,
    event_store: Arc<dyn MigrationTarget>,
    read_store: Arc<dyn DocumentStore>,
    history: Vec<StartupPhase>,
}

impl StartupSequencer {
    pub fn new(
        mappings: Arc<dyn MappingConfiguration>,
        write_store: Arc<dyn MigrationTarget>,
        event_store: Arc<dyn MigrationTarget>,
        read_store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            mappings,
            write_store,
            event_store,
            read_store,
            history: Vec::new(),
        }
    }

    /// Current phase, `None` before the first step.
    pub fn phase(&self) -> Option<StartupPhase> {
        self.history.last().copied()
    }

    /// Phases entered so far, in order.
    pub fn history(&self) -> &[StartupPhase] {
        &self.history
    }

    /// Prepare every store, then hand control to `server`.
    pub async fn run<S: RequestServer>(&mut self, server: S) -> Result<(), StartupError> {
        self.prepare().await?;

        self.enter(StartupPhase::Serving);
        server.serve().await.map_err(|err| self.fail(err.into()))
    }

    /// Run every startup step without serving.
    pub async fn prepare(&mut self) -> Result<(), StartupError> {
        match self.run_steps().await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn run_steps(&mut self) -> Result<(), StartupError> {
        self.enter(StartupPhase::ValidatingMappings);
        self.mappings.assert_valid()?;
        self.mappings.compile();
        tracing::info!("mapping configuration validated and compiled");

        self.enter(StartupPhase::MigratingWriteStore);
        migrate_if_pending(self.write_store.as_ref()).await?;

        self.enter(StartupPhase::MigratingEventStore);
        migrate_if_pending(self.event_store.as_ref()).await?;

        self.enter(StartupPhase::EnsuringReadCollections);
        ensure_collections(self.read_store.as_ref()).await?;

        Ok(())
    }

    fn enter(&mut self, phase: StartupPhase) {
        tracing::info!(%phase, "startup phase");
        self.history.push(phase);
    }

    fn fail(&mut self, err: StartupError) -> StartupError {
        let phase = self
            .phase()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        tracing::error!(%phase, error = %err, "startup failed");
        self.history.push(StartupPhase::Failed);
        err
    }
}

async fn migrate_if_pending(target: &dyn MigrationTarget) -> Result<(), StoreError> {
    let store = target.name();
    if !target.has_pending_changes().await? {
        tracing::info!(store, "schema already up to date");
        return Ok(());
    }

    tracing::info!(store, "applying pending migrations");
    target.migrate().await?;
    tracing::info!(store, "migrations applied");
    Ok(())
}

async fn ensure_collections(store: &dyn DocumentStore) -> Result<(), StoreError> {
    let name = store.name();
    let missing = store.missing_collections().await?;
    if missing.is_empty() {
        tracing::info!(store = name, "collections already up to date");
        return Ok(());
    }

    tracing::info!(store = name, ?missing, "creating missing collections");
    store.ensure_collections().await?;
    tracing::info!(store = name, "collections created");
    Ok(())
}
