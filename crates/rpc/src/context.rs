//! Application context - wires every component together

use std::sync::Arc;

use tokenguard_alerts::{AlertFactory, AlertHub, AlertTransport};
use tokenguard_core::{JsonlSink, MemorySink, RecordSink};
use tokenguard_lifecycle::LifecycleStore;
use tokenguard_risk::{Evaluator, InMemoryIdentityRegistry, InMemoryRiskScreen};
use tracing::info;

use crate::config::{AppConfig, SeedData};
use crate::error::RpcResult;
use crate::pipeline::Pipeline;

/// Owns one instance of every component; nothing here is global
pub struct AppContext {
    pub config: AppConfig,
    pub lifecycle: Arc<LifecycleStore>,
    pub identity: Arc<InMemoryIdentityRegistry>,
    pub screening: Arc<InMemoryRiskScreen>,
    pub sink: Arc<dyn RecordSink>,
    pub pipeline: Arc<Pipeline>,
}

impl AppContext {
    /// Build the component graph and load seed data.
    ///
    /// Decisions and alerts share one record sink: the JSONL file named in
    /// the config, or memory when none is set.
    pub fn new(config: AppConfig, transport: Arc<dyn AlertTransport>) -> RpcResult<Self> {
        config.validate()?;

        let sink: Arc<dyn RecordSink> = match &config.server.records_path {
            Some(path) => Arc::new(JsonlSink::new(path)?),
            None => Arc::new(MemorySink::new()),
        };

        let lifecycle = Arc::new(LifecycleStore::new());
        let identity = Arc::new(InMemoryIdentityRegistry::new());
        let screening = Arc::new(InMemoryRiskScreen::new());
        seed(&config.seed, &lifecycle, &identity, &screening)?;

        let evaluator = Evaluator::builder(config.risk.clone())
            .with_cache_config(config.cache.clone())
            .with_lifecycle(lifecycle.clone())
            .with_identity_provider(identity.clone())
            .with_screen_provider(screening.clone())
            .with_sink(sink.clone())
            .build()?;

        let hub = AlertHub::new(config.hub.clone(), transport)?.with_sink(sink.clone());
        let factory = AlertFactory::new(config.alerts.clone());

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(evaluator),
            Arc::new(hub),
            factory,
            lifecycle.clone(),
        ));

        Ok(Self {
            config,
            lifecycle,
            identity,
            screening,
            sink,
            pipeline,
        })
    }

    pub fn hub(&self) -> &Arc<AlertHub> {
        self.pipeline.hub()
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        self.pipeline.evaluator()
    }
}

fn seed(
    data: &SeedData,
    lifecycle: &LifecycleStore,
    identity: &InMemoryIdentityRegistry,
    screening: &InMemoryRiskScreen,
) -> RpcResult<()> {
    for token in &data.tokens {
        lifecycle.register(token.clone())?;
    }
    for holding in &data.holdings {
        lifecycle.update_holding(&holding.token_id, &holding.holder_id, holding.amount)?;
    }
    for (token_id, holders) in &data.allow_lists {
        lifecycle.set_allow_list(token_id, holders.iter().cloned());
    }
    for (subject_id, status) in &data.identities {
        identity.set_status(subject_id.clone(), *status);
    }
    for (subject_id, result) in &data.screenings {
        screening.set_screen(subject_id.clone(), result.clone());
    }

    info!(
        tokens = data.tokens.len(),
        holdings = data.holdings.len(),
        identities = data.identities.len(),
        screenings = data.screenings.len(),
        "Seed data loaded"
    );
    Ok(())
}
