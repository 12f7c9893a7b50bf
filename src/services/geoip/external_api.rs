//! 外部 GeoIP 批量 API 实现
//!
//! POST `[{"query": "<ip>"}, ...]` 到批量端点，响应为等长数组。
//! 内置 Moka 缓存，只把未命中的 IP 发往网络；失败记录同样缓存（负缓存）。
//! 请求失败不重试，直接向上返回错误。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, trace, warn};
use ureq::Agent;

use super::provider::GeoIpLookup;
use super::record::{BatchQuery, GeoRecord};
use crate::config::{GeoIpConfig, MAX_GEOIP_BATCH_SIZE};
use crate::errors::{GeoTraceError, Result};

/// 外部 API GeoIP Provider
pub struct ExternalApiProvider {
    api_url: String,
    batch_size: usize,
    agent: Agent,
    /// IP → GeoRecord 缓存
    cache: Cache<String, GeoRecord>,
}

impl ExternalApiProvider {
    pub fn new(config: &GeoIpConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
            .build()
            .into();

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .max_capacity(config.cache_max_capacity)
            .build();

        Self {
            api_url: config.api_url.clone(),
            batch_size: config.batch_size.clamp(1, MAX_GEOIP_BATCH_SIZE),
            agent,
            cache,
        }
    }

    /// 单次批量请求（同步，在 spawn_blocking 中调用）
    fn fetch_chunk_sync(agent: &Agent, url: &str, ips: &[String]) -> Result<Vec<GeoRecord>> {
        let payload: Vec<BatchQuery> = ips.iter().map(BatchQuery::new).collect();

        let resp = agent.post(url).send_json(&payload).map_err(|e| {
            warn!("GeoIP batch request to \"{}\" failed: {}", url, e);
            GeoTraceError::geoip_lookup(format!("batch request failed: {}", e))
        })?;

        let records: Vec<GeoRecord> = resp.into_body().read_json().map_err(|e| {
            warn!("GeoIP batch response from \"{}\" parse failed: {}", url, e);
            GeoTraceError::geoip_lookup(format!("malformed batch response: {}", e))
        })?;

        normalize_chunk(ips, records)
    }

    async fn fetch_chunk(&self, ips: Vec<String>) -> Result<Vec<GeoRecord>> {
        let agent = self.agent.clone();
        let url = self.api_url.clone();

        tokio::task::spawn_blocking(move || Self::fetch_chunk_sync(&agent, &url, &ips))
            .await
            .map_err(|e| GeoTraceError::geoip_lookup(format!("lookup task failed: {}", e)))?
    }
}

/// 校验响应长度并补齐 query 字段
fn normalize_chunk(requested: &[String], records: Vec<GeoRecord>) -> Result<Vec<GeoRecord>> {
    if records.len() != requested.len() {
        return Err(GeoTraceError::geoip_lookup(format!(
            "batch response size mismatch: requested {}, got {}",
            requested.len(),
            records.len()
        )));
    }

    Ok(requested
        .iter()
        .zip(records)
        .map(|(ip, mut record)| {
            if record.query.is_empty() {
                record.query = ip.clone();
            }
            record
        })
        .collect())
}

#[async_trait]
impl GeoIpLookup for ExternalApiProvider {
    async fn lookup_batch(&self, ips: &[String]) -> Result<Vec<GeoRecord>> {
        let mut resolved: HashMap<String, GeoRecord> = HashMap::with_capacity(ips.len());
        let mut misses: Vec<String> = Vec::new();

        for ip in ips {
            if resolved.contains_key(ip) || misses.contains(ip) {
                continue;
            }
            match self.cache.get(ip).await {
                Some(record) => {
                    resolved.insert(ip.clone(), record);
                }
                None => misses.push(ip.clone()),
            }
        }

        trace!(
            "GeoIP batch: {} requested, {} cached, {} to fetch",
            ips.len(),
            resolved.len(),
            misses.len()
        );

        for chunk in misses.chunks(self.batch_size) {
            let records = self.fetch_chunk(chunk.to_vec()).await?;
            debug!("GeoIP batch chunk of {} resolved", records.len());

            for (ip, record) in chunk.iter().zip(records) {
                self.cache.insert(ip.clone(), record.clone()).await;
                resolved.insert(ip.clone(), record);
            }
        }

        ips.iter()
            .map(|ip| {
                resolved.get(ip).cloned().ok_or_else(|| {
                    GeoTraceError::geoip_lookup(format!("no record resolved for {}", ip))
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "ExternalAPI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geoip::GeoStatus;
    use actix_web::dev::ServerHandle;
    use actix_web::{App, HttpResponse, HttpServer, web};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_chunk_fills_missing_query() {
        let requested = ips(&["8.8.8.8", "1.1.1.1"]);
        let records = vec![
            GeoRecord {
                status: GeoStatus::Success,
                ..Default::default()
            },
            GeoRecord {
                query: "1.1.1.1".into(),
                status: GeoStatus::Success,
                ..Default::default()
            },
        ];

        let normalized = normalize_chunk(&requested, records).unwrap();
        assert_eq!(normalized[0].query, "8.8.8.8");
        assert_eq!(normalized[1].query, "1.1.1.1");
    }

    #[test]
    fn test_normalize_chunk_rejects_size_mismatch() {
        let requested = ips(&["8.8.8.8", "1.1.1.1"]);
        let err = normalize_chunk(&requested, vec![GeoRecord::default()]).unwrap_err();
        assert!(matches!(err, GeoTraceError::GeoIpLookup(_)));
    }

    #[test]
    fn test_batch_size_clamped_to_api_limit() {
        let config = GeoIpConfig {
            batch_size: 500,
            ..Default::default()
        };
        let provider = ExternalApiProvider::new(&config);
        assert_eq!(provider.batch_size, MAX_GEOIP_BATCH_SIZE);
    }

    #[tokio::test]
    async fn test_cached_records_skip_network() {
        // 不可达端点：只要命中缓存就不会发请求
        let config = GeoIpConfig {
            api_url: "http://192.0.2.1/batch".into(),
            timeout_secs: 1,
            ..Default::default()
        };
        let provider = ExternalApiProvider::new(&config);
        provider
            .cache
            .insert("8.8.8.8".into(), GeoRecord::failed("8.8.8.8", "cached"))
            .await;

        let records = provider
            .lookup_batch(&ips(&["8.8.8.8", "8.8.8.8"]))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message.as_deref(), Some("cached"));
    }

    // =========================================================================
    // 本地批量端点
    // =========================================================================

    type BatchLog = Arc<Mutex<Vec<usize>>>;

    struct LocalBatchApi {
        base_url: String,
        batches: BatchLog,
        handle: ServerHandle,
    }

    impl LocalBatchApi {
        fn provider(&self, path: &str) -> ExternalApiProvider {
            ExternalApiProvider::new(&GeoIpConfig {
                api_url: format!("{}{}", self.base_url, path),
                batch_size: 50,
                timeout_secs: 5,
                ..Default::default()
            })
        }

        fn batches(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    fn queries(body: &[Value]) -> Vec<String> {
        body.iter()
            .map(|item| item["query"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// 按请求顺序逐条回显成功记录
    async fn echo_batch(log: web::Data<BatchLog>, body: web::Json<Vec<Value>>) -> HttpResponse {
        log.lock().unwrap().push(body.len());
        let records: Vec<Value> = queries(&body)
            .into_iter()
            .map(|ip| {
                json!({
                    "query": ip,
                    "status": "success",
                    "countryCode": "US",
                    "city": format!("city-{}", ip),
                    "lat": 37.751,
                    "lon": -97.822,
                })
            })
            .collect();
        HttpResponse::Ok().json(records)
    }

    /// 少返回一条
    async fn truncated_batch(body: web::Json<Vec<Value>>) -> HttpResponse {
        let records: Vec<Value> = queries(&body)
            .into_iter()
            .skip(1)
            .map(|ip| json!({ "query": ip, "status": "success" }))
            .collect();
        HttpResponse::Ok().json(records)
    }

    async fn start_local_api() -> LocalBatchApi {
        let batches: BatchLog = Arc::new(Mutex::new(Vec::new()));
        let log = batches.clone();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(log.clone()))
                .route("/batch", web::post().to(echo_batch))
                .route("/truncated", web::post().to(truncated_batch))
                .route(
                    "/error",
                    web::post().to(|| async { HttpResponse::InternalServerError().finish() }),
                )
                .route(
                    "/malformed",
                    web::post().to(|| async {
                        HttpResponse::Ok()
                            .content_type("application/json")
                            .body("[{\"query\": \"8.8.8.8\", ")
                    }),
                )
        })
        .workers(1)
        .disable_signals()
        .listen(listener)
        .unwrap()
        .run();

        let handle = server.handle();
        actix_rt::spawn(server);

        LocalBatchApi {
            base_url: format!("http://{}", addr),
            batches,
            handle,
        }
    }

    #[actix_rt::test]
    async fn test_lookup_splits_misses_into_api_sized_chunks() {
        let api = start_local_api().await;
        let provider = api.provider("/batch");

        let requested: Vec<String> = (1..=120).map(|i| format!("203.0.113.{}", i)).collect();
        let records = provider.lookup_batch(&requested).await.unwrap();

        assert_eq!(api.batches(), vec![50, 50, 20]);
        assert_eq!(records.len(), 120);
        for (ip, record) in requested.iter().zip(&records) {
            assert_eq!(&record.query, ip);
            assert!(record.is_success());
        }

        // 第二次全部命中缓存
        let again = provider.lookup_batch(&requested[..10]).await.unwrap();
        assert_eq!(again.len(), 10);
        assert_eq!(api.batches(), vec![50, 50, 20]);

        api.handle.stop(false).await;
    }

    #[actix_rt::test]
    async fn test_lookup_keeps_input_order_around_cached_entries() {
        let api = start_local_api().await;
        let provider = api.provider("/batch");
        provider
            .cache
            .insert("9.9.9.9".into(), GeoRecord::failed("9.9.9.9", "cached"))
            .await;

        let requested = ips(&["1.1.1.1", "9.9.9.9", "8.8.4.4", "1.1.1.1", "9.9.9.9"]);
        let records = provider.lookup_batch(&requested).await.unwrap();

        // 缓存命中与重复 IP 都不进入请求
        assert_eq!(api.batches(), vec![2]);
        let order: Vec<&str> = records.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(
            order,
            vec!["1.1.1.1", "9.9.9.9", "8.8.4.4", "1.1.1.1", "9.9.9.9"]
        );
        assert_eq!(records[1].message.as_deref(), Some("cached"));
        assert!(!records[4].is_success());
        assert_eq!(records[2].city.as_deref(), Some("city-8.8.4.4"));

        api.handle.stop(false).await;
    }

    #[actix_rt::test]
    async fn test_bad_upstream_responses_are_lookup_errors() {
        let api = start_local_api().await;
        let requested = ips(&["8.8.8.8", "1.1.1.1"]);

        for path in ["/error", "/malformed", "/truncated"] {
            let provider = api.provider(path);
            let err = provider.lookup_batch(&requested).await.unwrap_err();
            assert!(
                matches!(err, GeoTraceError::GeoIpLookup(_)),
                "{} gave {:?}",
                path,
                err
            );
            // 失败的批次不写缓存
            assert!(provider.cache.get("8.8.8.8").await.is_none());
        }

        api.handle.stop(false).await;
    }

    /// 依赖外部网络服务，CI 环境可能失败
    #[tokio::test]
    #[ignore]
    async fn test_external_batch_lookup_real() {
        let provider = ExternalApiProvider::new(&GeoIpConfig::default());
        let records = provider
            .lookup_batch(&ips(&["8.8.8.8", "10.0.0.1"]))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].is_success());
        assert_eq!(records[0].country_code.as_deref(), Some("US"));
        assert!(!records[1].is_success());
    }
}
