use std::sync::Arc;

use anyhow::Context;

use keystone_api::app::{self, services::AppServices};
use keystone_api::server::HttpServer;
use keystone_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    keystone_observability::init(config.log_format);

    let services = Arc::new(AppServices::from_config(&config)?);
    let router = app::build_app(Arc::clone(&services));
    let server = HttpServer::new(config.address(), router);

    let mut sequencer = services.startup_sequencer();
    sequencer.run(server).await?;

    Ok(())
}
