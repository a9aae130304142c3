use adintel_core::PageRef;
use async_trait::async_trait;

use super::{AcquisitionStrategy, Harvest, StrategyKind};
use crate::api::GraphClient;
use crate::error::ScraperError;
use crate::options::AcquireOptions;

/// Structured-API discovery through the Graph `ads_archive` endpoint.
#[derive(Debug)]
pub struct ApiStrategy {
    client: GraphClient,
    concurrency: usize,
}

impl ApiStrategy {
    #[must_use]
    pub fn new(client: GraphClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for ApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn discover(
        &self,
        page: &PageRef,
        options: &AcquireOptions,
        harvest: &mut Harvest,
    ) -> Result<(), ScraperError> {
        let report = self
            .client
            .discover_into(
                &page.page_id,
                &options.countries,
                options.status,
                options.limit,
                self.concurrency,
                harvest,
            )
            .await?;
        if !report.markets_failed.is_empty() {
            tracing::warn!(
                page_id = %page.page_id,
                failed = report.markets_failed.len(),
                queried = report.markets_queried.len(),
                "some markets failed, results are partial"
            );
        }
        harvest.markets_failed = report.markets_failed;
        Ok(())
    }

    async fn teardown(&self) {}
}
