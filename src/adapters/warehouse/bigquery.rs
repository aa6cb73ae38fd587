use crate::core::schema::{parse_timestamp, TableSchema, CLOSED_AT_COLUMN};
use crate::domain::model::OrderRow;
use crate::domain::ports::Warehouse;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

const MULTIPART_BOUNDARY: &str = "shop_orders_etl_load_job";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryConfig {
    pub project: String,
    pub dataset: String,
    pub access_token: String,
    pub endpoint: String,
}

/// BigQuery over its REST API: `jobs.query` for the watermark and a
/// `WRITE_APPEND` load job for appends.
pub struct BigQueryWarehouse {
    client: Client,
    config: BigQueryConfig,
    poll_interval: Duration,
    load_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    f: Vec<QueryCell>,
}

#[derive(Debug, Deserialize)]
struct QueryCell {
    v: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<Value>,
}

impl BigQueryWarehouse {
    pub fn new(config: BigQueryConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            poll_interval: Duration::from_secs(2),
            load_timeout: Duration::from_secs(600),
        })
    }

    /// How often a running load job is polled, and how long to wait for it.
    pub fn with_polling(mut self, poll_interval: Duration, load_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.load_timeout = load_timeout;
        self
    }

    fn qualified_table(&self, table_id: &str) -> String {
        format!("{}.{}.{}", self.config.project, self.config.dataset, table_id)
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    /// Media uploads go to `/upload/bigquery/v2` next to the regular API root.
    fn upload_endpoint(&self) -> String {
        let endpoint = self.endpoint();
        match endpoint.strip_suffix("/bigquery/v2") {
            Some(root) => format!("{}/upload/bigquery/v2", root),
            None => format!("{}/upload", endpoint),
        }
    }

    fn load_job_metadata(&self, table_id: &str, schema: &TableSchema) -> Value {
        let fields: Vec<Value> = schema
            .columns
            .iter()
            .map(|spec| json!({"name": spec.name, "type": spec.column_type, "mode": "NULLABLE"}))
            .collect();
        json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.config.project,
                        "datasetId": self.config.dataset,
                        "tableId": table_id,
                    },
                    "schema": {"fields": fields},
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_IF_NEEDED",
                }
            }
        })
    }

    async fn get_job(&self, reference: &JobReference) -> Result<Job> {
        let url = format!(
            "{}/projects/{}/jobs/{}",
            self.endpoint(),
            self.config.project,
            reference.job_id
        );
        let mut request = self.client.get(&url).bearer_auth(&self.config.access_token);
        if let Some(location) = &reference.location {
            request = request.query(&[("location", location)]);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::WarehouseError {
                message: format!("polling job {} failed with {}: {}", reference.job_id, status, body),
            });
        }
        Ok(response.json().await?)
    }

    /// Polls until the job is `DONE`; a job that finishes with an error result loaded nothing.
    async fn wait_for_job(&self, table_id: &str, mut job: Job) -> Result<()> {
        let started = tokio::time::Instant::now();
        while job.status.state != "DONE" {
            if started.elapsed() >= self.load_timeout {
                return Err(EtlError::WarehouseError {
                    message: format!(
                        "load job {} into {} still {} after {:?}",
                        job.job_reference.job_id, table_id, job.status.state, self.load_timeout
                    ),
                });
            }
            tracing::debug!(
                "⏳ Load job {} is {}",
                job.job_reference.job_id,
                job.status.state
            );
            tokio::time::sleep(self.poll_interval).await;
            job = self.get_job(&job.job_reference).await?;
        }

        match job.status.error_result {
            Some(error) => Err(EtlError::WarehouseError {
                message: format!(
                    "load job {} into {} failed: {}",
                    job.job_reference.job_id, table_id, error
                ),
            }),
            None => Ok(()),
        }
    }
}

/// BigQuery returns TIMESTAMP cells as epoch seconds in a string, e.g. `"1.7092944E9"`.
fn parse_bigquery_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    if let Ok(epoch) = text.parse::<f64>() {
        let secs = epoch.floor();
        let nanos = ((epoch - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
        return DateTime::from_timestamp(secs as i64, nanos);
    }
    parse_timestamp(text)
}

/// `multipart/related` body: job metadata first, then the NDJSON rows.
fn multipart_body(metadata: &Value, ndjson: &str) -> (String, String) {
    let metadata = metadata.to_string();
    let mut boundary = MULTIPART_BOUNDARY.to_string();
    while ndjson.contains(&boundary) || metadata.contains(&boundary) {
        boundary.push('_');
    }

    let body = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n\
         --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{d}\r\n\
         --{b}--\r\n",
        b = boundary,
        m = metadata,
        d = ndjson
    );
    (format!("multipart/related; boundary={}", boundary), body)
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn max_closed_at(&self, table_id: &str) -> Result<Option<DateTime<Utc>>> {
        let url = format!("{}/projects/{}/queries", self.endpoint(), self.config.project);
        let query = format!(
            "SELECT MAX({}) AS last_close FROM `{}`",
            CLOSED_AT_COLUMN,
            self.qualified_table(table_id)
        );
        tracing::debug!("🔎 {}", query);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&json!({"query": query, "useLegacySql": false, "timeoutMs": 60000}))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("Table {} not found, starting without watermark", table_id);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::WarehouseError {
                message: format!("watermark query failed with {}: {}", status, body),
            });
        }

        let body: QueryResponse = response.json().await?;
        if body.job_complete == Some(false) {
            return Err(EtlError::WarehouseError {
                message: format!("watermark query on {} did not complete in time", table_id),
            });
        }

        Ok(body
            .rows
            .first()
            .and_then(|row| row.f.first())
            .and_then(|cell| parse_bigquery_timestamp(&cell.v)))
    }

    async fn append(
        &self,
        table_id: &str,
        schema: &TableSchema,
        rows: &[OrderRow],
    ) -> Result<usize> {
        schema.validate_rows(rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let ndjson: String = rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = schema
                    .columns
                    .iter()
                    .zip(&row.values)
                    .map(|(spec, cell)| (spec.name.to_string(), cell.to_json()))
                    .collect();
                Value::Object(record).to_string() + "\n"
            })
            .collect();

        let (content_type, body) =
            multipart_body(&self.load_job_metadata(table_id, schema), &ndjson);
        let url = format!(
            "{}/projects/{}/jobs",
            self.upload_endpoint(),
            self.config.project
        );
        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&self.config.access_token)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::WarehouseError {
                message: format!("load job into {} rejected with {}: {}", table_id, status, body),
            });
        }

        let job: Job = response.json().await?;
        tracing::info!(
            "🚚 Load job {} started for {} rows into {}",
            job.job_reference.job_id,
            rows.len(),
            self.qualified_table(table_id)
        );
        self.wait_for_job(table_id, job).await?;

        tracing::debug!("💾 Loaded {} rows into {}", rows.len(), self.qualified_table(table_id));
        Ok(rows.len())
    }
}
