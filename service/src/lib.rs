//! Fieldkit Service - async orchestration over the fieldkit-engine core.
//!
//! This crate wires the pure engine to the outside world: repositories
//! (Postgres via sqlx, plus an in-memory backend for embedding and tests),
//! the availability and search-index collaborators, audit and event sinks,
//! admin-gated schema mutations, the search pipeline, and best-effort index
//! synchronization.
//!
//! Cancellation follows the usual tokio model: dropping an operation's
//! future cancels it, and an in-flight database transaction rolls back on
//! drop, so partial writes are never visible.

pub mod audit;
pub mod config;
pub mod context;
pub mod definitions;
pub mod error;
pub mod external;
pub mod grouping;
pub mod indexing;
pub mod instances;
pub mod repo;
pub mod search;
pub mod values;

pub use audit::{AuditEntry, AuditSink, DomainEvent, EventSink, NoopEventSink, TracingAuditSink};
pub use config::{Config, ConfigError};
pub use context::{parse_guid, ActorContext, Role};
pub use definitions::DefinitionService;
pub use error::{ServiceError, Result};
pub use external::{
    AlwaysAvailable, AttributeEvent, AttributeOp, AvailabilityProvider, InstanceDocument,
    NoopIndexClient, SearchIndexClient,
};
pub use grouping::GroupingService;
pub use indexing::IndexSync;
pub use instances::InstanceService;
pub use repo::{
    memory::MemoryBackend,
    pg::{create_pool, run_migrations, PgBackend},
    DefinitionRepo, GroupRepo, InstanceRepo, SearchLogEntry, SearchLogRepo, ValueRepo,
};
pub use search::SearchService;
pub use values::ValueService;

/// Initialize tracing for embedders and tests. Respects `RUST_LOG`, with a
/// sensible default filter.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldkit_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Milliseconds since the Unix epoch, the engine's timestamp unit.
pub(crate) fn now_ms() -> fieldkit_engine::Timestamp {
    chrono::Utc::now().timestamp_millis() as u64
}
