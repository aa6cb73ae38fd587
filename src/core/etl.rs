use crate::core::Pipeline;
use crate::domain::model::{DomainConfig, DomainRunSummary};
use crate::utils::error::Result;

/// Runs the pipeline over every configured domain, one after another.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    dry_run: bool,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            dry_run: false,
        }
    }

    /// Fetch and transform, but never write to the warehouse.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Stops at the first failing domain; the error names the domain.
    pub async fn run(&self, domains: &[DomainConfig]) -> Result<Vec<DomainRunSummary>> {
        tracing::info!("Starting ETL run over {} domains", domains.len());
        let mut summaries = Vec::with_capacity(domains.len());

        for domain in domains {
            let summary = self
                .run_domain(domain)
                .await
                .map_err(|e| e.in_domain(&domain.name))?;
            summaries.push(summary);
        }

        Ok(summaries)
    }

    pub async fn run_domain(&self, domain: &DomainConfig) -> Result<DomainRunSummary> {
        // Extract
        let watermark = self.pipeline.watermark(domain).await?;
        match watermark {
            Some(ts) => tracing::info!("Last close for {} was on: {}", domain.name, ts),
            None => tracing::info!("No previous close for {}, fetching full history", domain.name),
        }
        let orders = self.pipeline.extract(domain, watermark).await?;

        let mut summary = DomainRunSummary {
            domain: domain.name.clone(),
            watermark,
            orders_fetched: orders.len(),
            rows_loaded: 0,
            skipped: false,
        };

        if orders.is_empty() {
            tracing::info!("No new orders to process for {}.", domain.name);
            summary.skipped = true;
            return Ok(summary);
        }

        // Transform
        let result = self.pipeline.transform(orders).await?;

        // Load
        if self.dry_run {
            tracing::info!(
                "🔍 Dry run: {} rows for {} not loaded into {}",
                result.rows.len(),
                domain.name,
                domain.table_id
            );
            return Ok(summary);
        }
        summary.rows_loaded = self.pipeline.load(domain, result).await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CellValue, OrderRow, RawOrder, TransformResult};
    use crate::utils::error::EtlError;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Orders still to deliver and rows loaded, per domain.
    #[derive(Default)]
    struct FakePipeline {
        pending: Mutex<HashMap<String, Vec<RawOrder>>>,
        loaded: Mutex<HashMap<String, usize>>,
        failing_domain: Option<String>,
    }

    impl FakePipeline {
        fn with_pending(domain: &str, count: usize) -> Self {
            let fake = Self::default();
            let orders = (0..count).map(|_| RawOrder::new()).collect();
            fake.pending.lock().unwrap().insert(domain.to_string(), orders);
            fake
        }

        fn loaded(&self, domain: &str) -> usize {
            self.loaded.lock().unwrap().get(domain).copied().unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for FakePipeline {
        async fn watermark(&self, _domain: &DomainConfig) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }

        async fn extract(
            &self,
            domain: &DomainConfig,
            _since: Option<DateTime<Utc>>,
        ) -> Result<Vec<RawOrder>> {
            if self.failing_domain.as_deref() == Some(domain.name.as_str()) {
                return Err(EtlError::HttpStatusError {
                    status: 500,
                    url: domain.api_url.clone(),
                    body: String::new(),
                });
            }
            // 取走後即清空，模擬下一輪沒有新訂單
            Ok(self
                .pending
                .lock()
                .unwrap()
                .remove(&domain.name)
                .unwrap_or_default())
        }

        async fn transform(&self, orders: Vec<RawOrder>) -> Result<TransformResult> {
            let rows = orders
                .iter()
                .map(|_| OrderRow {
                    values: vec![CellValue::Null],
                })
                .collect();
            Ok(TransformResult {
                rows,
                order_count: orders.len(),
            })
        }

        async fn load(&self, domain: &DomainConfig, result: TransformResult) -> Result<usize> {
            *self
                .loaded
                .lock()
                .unwrap()
                .entry(domain.name.clone())
                .or_default() += result.rows.len();
            Ok(result.rows.len())
        }
    }

    fn domain(name: &str) -> DomainConfig {
        DomainConfig {
            name: name.to_string(),
            table_id: format!("{}_orders", name),
            api_url: format!("https://{}.example.com/orders.json", name),
            api_key: "k".to_string(),
            api_password: "p".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_run_without_new_orders_is_a_skip() {
        let engine = EtlEngine::new(FakePipeline::with_pending("basket", 3));
        let domains = vec![domain("basket")];

        let first = engine.run(&domains).await.unwrap();
        assert_eq!(first[0].rows_loaded, 3);
        assert!(!first[0].skipped);

        let second = engine.run(&domains).await.unwrap();
        assert!(second[0].skipped);
        assert_eq!(second[0].orders_fetched, 0);
        assert_eq!(engine.pipeline().loaded("basket"), 3);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_load() {
        let engine = EtlEngine::new(FakePipeline::with_pending("rugby", 2)).with_dry_run(true);

        let summaries = engine.run(&[domain("rugby")]).await.unwrap();

        assert_eq!(summaries[0].orders_fetched, 2);
        assert_eq!(summaries[0].rows_loaded, 0);
        assert_eq!(engine.pipeline().loaded("rugby"), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_the_run_and_names_the_domain() {
        let mut fake = FakePipeline::with_pending("foot", 1);
        fake.failing_domain = Some("rugby".to_string());
        let engine = EtlEngine::new(fake);

        let err = engine
            .run(&[domain("basket"), domain("rugby"), domain("foot")])
            .await
            .unwrap_err();

        match err {
            EtlError::DomainError { domain, .. } => assert_eq!(domain, "rugby"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(engine.pipeline().loaded("foot"), 0);
    }
}
