use crate::domain::model::{DomainConfig, RawOrder};
use crate::domain::ports::OrderSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{LINK, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Orders requested per page.
pub const PAGE_SIZE: u32 = 250;

/// Bounded exponential backoff applied to 429 responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(120),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based). A server `Retry-After`
    /// wins when longer; both are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let backoff = self.base_delay.saturating_mul(factor);
        let delay = match retry_after {
            Some(hint) => backoff.max(hint),
            None => backoff,
        };
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub timeout: Duration,
    /// Keep the pages fetched before a non-success response instead of failing the domain.
    pub load_partial_pages: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            load_partial_pages: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<serde_json::Value>,
}

/// REST client for the shop order endpoint of each domain.
pub struct ShopifyClient {
    client: Client,
    options: FetchOptions,
}

impl ShopifyClient {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self { client, options })
    }

    async fn get_with_retry(&self, domain: &DomainConfig, url: &str) -> Result<Response> {
        let mut retries = 0;
        loop {
            tracing::debug!("🌐 {}: GET {}", domain.name, url);
            let response = self
                .client
                .get(url)
                .basic_auth(&domain.api_key, Some(&domain.api_password))
                .send()
                .await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > self.options.retry.max_retries {
                return Err(EtlError::RateLimitExceeded {
                    url: url.to_string(),
                    attempts: retries,
                });
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            let delay = self.options.retry.delay_for(retries, retry_after);
            tracing::warn!(
                "⏳ {}: rate limited, retry {}/{} in {:?}",
                domain.name,
                retries,
                self.options.retry.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl OrderSource for ShopifyClient {
    async fn fetch_new_orders(
        &self,
        domain: &DomainConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>> {
        let mut next = Some(initial_url(&domain.api_url, since)?.to_string());
        let mut orders = Vec::new();
        let mut page = 0;

        while let Some(url) = next.take() {
            let response = self.get_with_retry(domain, &url).await?;
            let status = response.status();

            // 只接受 200，其他 2xx（例如 204 沒有內容）也視為失敗頁
            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    "❌ Failed to fetch orders for {}: {} - {}",
                    domain.name,
                    status,
                    body
                );
                if self.options.load_partial_pages {
                    tracing::warn!(
                        "⚠️ {}: keeping {} orders from {} earlier pages",
                        domain.name,
                        orders.len(),
                        page
                    );
                    break;
                }
                return Err(EtlError::HttpStatusError {
                    status: status.as_u16(),
                    url,
                    body,
                });
            }

            next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let body: OrdersPage = response.json().await?;
            let fetched = body.orders.len();
            orders.extend(body.orders.into_iter().filter_map(|order| match order {
                serde_json::Value::Object(obj) => Some(obj),
                other => {
                    tracing::warn!("Skipping non-object order entry: {}", other);
                    None
                }
            }));
            page += 1;
            tracing::info!("📥 Fetched {} orders for {} (page {})", fetched, domain.name, page);
        }

        Ok(orders)
    }
}

/// First page URL: fixed page size, any status, and `created_at_min` one
/// second past the watermark when there is one.
pub fn initial_url(base_url: &str, since: Option<DateTime<Utc>>) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|e| EtlError::InvalidConfigValueError {
        field: "api_url".to_string(),
        value: base_url.to_string(),
        reason: e.to_string(),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("limit", &PAGE_SIZE.to_string());
        query.append_pair("status", "any");
        if let Some(min) = created_at_min(since) {
            query.append_pair("created_at_min", &min);
        }
    }

    Ok(url)
}

pub fn created_at_min(since: Option<DateTime<Utc>>) -> Option<String> {
    since.map(|ts| {
        (ts + chrono::Duration::seconds(1))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    })
}

/// Extracts the `rel="next"` target of an RFC 8288 `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    fn domain(api_url: String) -> DomainConfig {
        DomainConfig {
            name: "basket".to_string(),
            table_id: "basket_orders".to_string(),
            api_url,
            api_key: "key".to_string(),
            api_password: "secret".to_string(),
        }
    }

    fn fast_options(load_partial_pages: bool) -> FetchOptions {
        FetchOptions {
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                max_retries: 3,
            },
            timeout: Duration::from_secs(5),
            load_partial_pages,
        }
    }

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://shop.example.com/admin/orders.json?limit=250&page_info=abc>; rel="next""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://shop.example.com/admin/orders.json?limit=250&page_info=abc")
        );

        let both = r#"<https://s.example.com/o.json?page_info=prev>; rel="previous", <https://s.example.com/o.json?page_info=nxt>; rel="next""#;
        assert_eq!(
            parse_next_link(both).as_deref(),
            Some("https://s.example.com/o.json?page_info=nxt")
        );

        let previous_only = r#"<https://s.example.com/o.json?page_info=prev>; rel="previous""#;
        assert_eq!(parse_next_link(previous_only), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_initial_url_without_watermark() {
        let url = initial_url("https://shop.example.com/admin/orders.json", None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop.example.com/admin/orders.json?limit=250&status=any"
        );
    }

    #[test]
    fn test_initial_url_adds_one_second_to_watermark() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            created_at_min(Some(since)).as_deref(),
            Some("2024-03-01T12:00:01Z")
        );

        let url = initial_url("https://shop.example.com/admin/orders.json", Some(since)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("created_at_min".to_string(), "2024-03-01T12:00:01Z".to_string())));
    }

    #[test]
    fn test_initial_url_rejects_garbage() {
        assert!(matches!(
            initial_url("not a url", None),
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_retry_policy_backoff_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(40));
        assert_eq!(policy.delay_for(10, None), Duration::from_secs(120));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(120)
        );
    }

    #[tokio::test]
    async fn test_fetch_follows_next_links_with_basic_auth() {
        let server = MockServer::start();

        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/admin/orders.json")
                .query_param("limit", "250")
                .query_param("status", "any")
                .header("Authorization", "Basic a2V5OnNlY3JldA==");
            then.status(200)
                .header("Content-Type", "application/json")
                .header(
                    "Link",
                    format!(
                        "<{}>; rel=\"next\"",
                        server.url("/admin/orders.json?limit=250&page_info=p2")
                    ),
                )
                .json_body(serde_json::json!({"orders": [{"id": 1}, {"id": 2}]}));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/admin/orders.json")
                .query_param("page_info", "p2");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"orders": [{"id": 3}]}));
        });

        let client = ShopifyClient::new(fast_options(false)).unwrap();
        let orders = client
            .fetch_new_orders(&domain(server.url("/admin/orders.json")), None)
            .await
            .unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = orders.iter().map(|o| o["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_sends_watermark_bound() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("created_at_min", "2024-03-01T12:00:01Z");
            then.status(200).json_body(serde_json::json!({"orders": []}));
        });

        let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let client = ShopifyClient::new(fast_options(false)).unwrap();
        let orders = client
            .fetch_new_orders(&domain(server.url("/orders.json")), Some(since))
            .await
            .unwrap();

        mock.assert();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_ceiling() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/orders.json");
            then.status(429);
        });

        let client = ShopifyClient::new(fast_options(false)).unwrap();
        let err = client
            .fetch_new_orders(&domain(server.url("/orders.json")), None)
            .await
            .unwrap_err();

        mock.assert_hits(4);
        assert!(matches!(err, EtlError::RateLimitExceeded { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn test_failed_page_aborts_by_default() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/orders.json").query_param("status", "any");
            then.status(200)
                .header("Link", format!("<{}>; rel=\"next\"", server.url("/orders.json?page_info=p2")))
                .json_body(serde_json::json!({"orders": [{"id": 1}]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/orders.json").query_param("page_info", "p2");
            then.status(500).body("boom");
        });

        let client = ShopifyClient::new(fast_options(false)).unwrap();
        let err = client
            .fetch_new_orders(&domain(server.url("/orders.json")), None)
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::HttpStatusError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_no_content_page_is_a_failed_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/orders.json");
            then.status(204);
        });

        let client = ShopifyClient::new(fast_options(false)).unwrap();
        let err = client
            .fetch_new_orders(&domain(server.url("/orders.json")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::HttpStatusError { status: 204, .. }));

        let client = ShopifyClient::new(fast_options(true)).unwrap();
        let orders = client
            .fetch_new_orders(&domain(server.url("/orders.json")), None)
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_pages_when_allowed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/orders.json").query_param("status", "any");
            then.status(200)
                .header("Link", format!("<{}>; rel=\"next\"", server.url("/orders.json?page_info=p2")))
                .json_body(serde_json::json!({"orders": [{"id": 1}, "garbage"]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/orders.json").query_param("page_info", "p2");
            then.status(503);
        });

        let client = ShopifyClient::new(fast_options(true)).unwrap();
        let orders = client
            .fetch_new_orders(&domain(server.url("/orders.json")), None)
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["id"], serde_json::json!(1));
    }
}
