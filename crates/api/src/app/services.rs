//! Store wiring shared by every request.

use std::sync::Arc;

use anyhow::Context;

use keystone_customers::{CUSTOMER_VIEWS, Customer, register_mappings};
use keystone_infra::config::{AppConfig, DatabaseConfig};
use keystone_infra::db::connect_lazy;
use keystone_infra::migration::{
    EVENT_STORE_MIGRATIONS, InMemorySchema, MigrationTarget, PostgresSchema, WRITE_STORE_MIGRATIONS,
};
use keystone_infra::read_model::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use keystone_infra::repository::{
    InMemoryUnitOfWorkFactory, MemoryTable, PgUnitOfWorkFactory, UnitOfWork, UnitOfWorkFactory,
    WriteRepository,
};
use keystone_infra::StartupSequencer;
use keystone_mapping::MapperConfiguration;

pub type CustomerRepository = WriteRepository<Customer, Box<dyn UnitOfWork<Customer>>>;

pub struct AppServices {
    pub mappings: Arc<MapperConfiguration>,
    pub customers: Arc<dyn UnitOfWorkFactory<Customer>>,
    pub read_store: Arc<dyn DocumentStore>,
    pub write_schema: Arc<dyn MigrationTarget>,
    pub event_schema: Arc<dyn MigrationTarget>,
}

fn mappings() -> MapperConfiguration {
    let mut config = MapperConfiguration::new();
    register_mappings(&mut config);
    config
}

impl AppServices {
    /// Postgres stores when configured, in-memory otherwise.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.database {
            Some(database) => {
                tracing::info!("using Postgres stores");
                Self::postgres(database)
            }
            None => {
                tracing::warn!("USE_PERSISTENT_STORES is off; using in-memory stores");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            mappings: Arc::new(mappings()),
            customers: Arc::new(InMemoryUnitOfWorkFactory::new(Arc::new(
                MemoryTable::<Customer>::new(),
            ))),
            read_store: Arc::new(InMemoryDocumentStore::new([CUSTOMER_VIEWS])),
            write_schema: Arc::new(InMemorySchema::new("write-store")),
            event_schema: Arc::new(InMemorySchema::new("event-store")),
        }
    }

    /// Pools connect lazily; an unreachable database fails the first migration step.
    pub fn postgres(database: &DatabaseConfig) -> anyhow::Result<Self> {
        let max = database.max_connections;
        let write_pool =
            connect_lazy(&database.write_url, max).context("invalid WRITE_DATABASE_URL")?;
        let event_pool = connect_lazy(&database.event_store_url, max)
            .context("invalid EVENT_STORE_DATABASE_URL")?;
        let read_pool =
            connect_lazy(&database.read_url, max).context("invalid READ_DATABASE_URL")?;

        Ok(Self {
            mappings: Arc::new(mappings()),
            customers: Arc::new(PgUnitOfWorkFactory::<Customer>::new(write_pool.clone())),
            read_store: Arc::new(PostgresDocumentStore::new(read_pool, [CUSTOMER_VIEWS])?),
            write_schema: Arc::new(PostgresSchema::new(
                "write-store",
                write_pool,
                &WRITE_STORE_MIGRATIONS,
            )),
            event_schema: Arc::new(PostgresSchema::new(
                "event-store",
                event_pool,
                &EVENT_STORE_MIGRATIONS,
            )),
        })
    }

    pub fn startup_sequencer(&self) -> StartupSequencer {
        StartupSequencer::new(
            self.mappings.clone(),
            Arc::clone(&self.write_schema),
            Arc::clone(&self.event_schema),
            Arc::clone(&self.read_store),
        )
    }

    /// A repository over a fresh unit of work, scoped to one request.
    pub fn customer_repository(&self) -> CustomerRepository {
        WriteRepository::new(self.customers.begin())
    }
}
