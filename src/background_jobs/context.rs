use crate::aggregation::YearlyAggregator;
use crate::cache::ResponseCache;
use crate::ingestion::IngestionService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Runtime used by blocking jobs to drive async work.
    pub runtime: tokio::runtime::Handle,

    pub ingestion: Arc<IngestionService>,
    pub aggregator: YearlyAggregator,
    pub cache: Arc<ResponseCache>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        runtime: tokio::runtime::Handle,
        ingestion: Arc<IngestionService>,
        aggregator: YearlyAggregator,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            cancellation_token,
            runtime,
            ingestion,
            aggregator,
            cache,
        }
    }

    /// Same resources, with a different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
