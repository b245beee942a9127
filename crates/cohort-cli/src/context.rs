use std::sync::Arc;

use anyhow::Context;
use cohort_bus::{Broker, EventPublisher, MemoryBroker, NatsBroker, PublishPolicy};
use cohort_cache::MemoryRoundCache;
use cohort_config::{BrokerConfig, CohortConfig};
use cohort_coordinator::Coordinator;
use cohort_db::CohortDb;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub coordinator: Coordinator,
    pub config: CohortConfig,
}

impl AppContext {
    /// Open the database, cache and broker selected by `config`.
    pub async fn init(config: CohortConfig) -> anyhow::Result<Self> {
        let db = CohortDb::open(&config.database)
            .await
            .context("failed to open cohort database")?;
        let cache = Arc::new(MemoryRoundCache::new(config.cache.capacity));
        let broker = connect_broker(&config.broker).await?;
        let publisher = EventPublisher::new(broker, PublishPolicy::from(&config.coordinator));

        let coordinator = Coordinator::new(
            db,
            cache,
            publisher,
            config.cache.clone(),
            config.coordinator.clone(),
        );
        Ok(Self {
            coordinator,
            config,
        })
    }
}

/// NATS when a broker URL is configured, otherwise the in-process broker.
pub async fn connect_broker(config: &BrokerConfig) -> anyhow::Result<Arc<dyn Broker>> {
    if config.is_configured() {
        let broker = NatsBroker::connect(config)
            .await
            .with_context(|| format!("failed to connect to broker at {}", config.url))?;
        return Ok(Arc::new(broker));
    }
    tracing::warn!("no broker configured; events stay in this process");
    Ok(Arc::new(MemoryBroker::new()))
}
