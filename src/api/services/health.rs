use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::{error, trace};

use super::error_code::ErrorCode;
use super::helpers::json_response;
use crate::services::GeoIpProvider;
use crate::storage::SeaOrmStorage;

/// 健康检查数据库探测超时
const STORAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct StorageCheck {
    pub status: &'static str,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub storage: StorageCheck,
    pub geoip_provider: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub checks: HealthChecks,
    pub response_time_ms: u64,
}

async fn probe_storage(storage: &SeaOrmStorage) -> StorageCheck {
    let error = match tokio::time::timeout(STORAGE_PROBE_TIMEOUT, storage.ping()).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!("Storage health check failed: {}", e);
            Some(e.public_message().to_string())
        }
        Err(_) => {
            error!("Storage health check timeout");
            Some("timeout".to_string())
        }
    };

    StorageCheck {
        status: if error.is_none() {
            "healthy"
        } else {
            "unhealthy"
        },
        backend: storage.backend_name().to_string(),
        error,
    }
}

pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        storage: web::Data<Arc<SeaOrmStorage>>,
        geoip: web::Data<GeoIpProvider>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let started = Instant::now();
        trace!("Received health check request");

        let storage_check = probe_storage(&storage).await;
        let healthy = storage_check.error.is_none();
        let now = chrono::Utc::now();

        let data = HealthResponse {
            status: storage_check.status,
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            checks: HealthChecks {
                storage: storage_check,
                geoip_provider: geoip.provider_name(),
            },
            response_time_ms: started.elapsed().as_millis() as u64,
        };

        if healthy {
            json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
        } else {
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ServiceUnavailable,
                "Service Unavailable",
                Some(data),
            )
        }
    }

    /// 就绪检查：数据库可用才算就绪
    pub async fn readiness_check(storage: web::Data<Arc<SeaOrmStorage>>) -> impl Responder {
        trace!("Received readiness check request");
        let check = probe_storage(&storage).await;
        if check.error.is_none() {
            HttpResponse::Ok()
                .append_header(("Content-Type", "text/plain"))
                .body("OK")
        } else {
            HttpResponse::ServiceUnavailable()
                .append_header(("Content-Type", "text/plain"))
                .body("Not Ready")
        }
    }

    /// 存活检查
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");
        HttpResponse::NoContent().finish()
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
