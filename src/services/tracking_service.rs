//! Tracking link service
//!
//! 链接管理（按所有者隔离）与访问记录。访问记录不会因为地理位置查询失败而中断。

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AnomalyConfig, StaticConfig, TrackingConfig};
use crate::errors::{GeoTraceError, Result};
use crate::services::alerts::{Alert, AlertSink};
use crate::services::geoip::{GeoIpProvider, GeoRecord};
use crate::services::threat::{ThreatLevel, ThreatScorer};
use crate::storage::{
    AnomalyRecord, NewVisit, SeaOrmStorage, TrackingLink, VisitLocation, VisitorLog,
};
use crate::utils::ip::{is_non_routable, parse_ip_input};
use crate::utils::{generate_random_code, is_valid_short_code, normalize_label, validate_url};

/// 自动生成短码时的最大尝试次数
const MAX_CODE_ATTEMPTS: usize = 5;

/// 创建链接请求
#[derive(Debug, Clone, Default)]
pub struct CreateLinkRequest {
    pub target_url: String,
    /// 不指定时自动生成
    pub code: Option<String>,
    pub label: Option<String>,
}

/// 一次访问的上下文（来自 HTTP 请求）
#[derive(Debug, Clone)]
pub struct VisitContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// cookie 中的会话 ID
    pub session_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// 访问处理结果
#[derive(Debug, Clone, Serialize)]
pub struct VisitOutcome {
    pub target_url: String,
    pub session_id: String,
    pub new_session: bool,
    pub anomaly: Option<AnomalyRecord>,
}

pub struct TrackingService {
    storage: Arc<SeaOrmStorage>,
    geoip: GeoIpProvider,
    scorer: Arc<ThreatScorer>,
    alerts: Arc<dyn AlertSink>,
    tracking: TrackingConfig,
    anomaly: AnomalyConfig,
}

impl TrackingService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        geoip: GeoIpProvider,
        scorer: Arc<ThreatScorer>,
        alerts: Arc<dyn AlertSink>,
        config: &StaticConfig,
    ) -> Self {
        Self {
            storage,
            geoip,
            scorer,
            alerts,
            tracking: config.tracking.clone(),
            anomaly: config.anomaly.clone(),
        }
    }

    pub fn tracking_config(&self) -> &TrackingConfig {
        &self.tracking
    }

    // ============ Link management ============

    pub async fn create_link(&self, owner: &str, req: CreateLinkRequest) -> Result<TrackingLink> {
        let target_url = req.target_url.trim().to_string();
        validate_url(&target_url).map_err(|e| GeoTraceError::validation(e.to_string()))?;

        let label = normalize_label(req.label)?;

        match req.code.filter(|c| !c.is_empty()) {
            Some(code) => {
                if !is_valid_short_code(&code) {
                    return Err(GeoTraceError::validation(format!(
                        "Invalid tracking code '{}'. Only letters, digits, '-' and '_' are allowed (max 64)",
                        code
                    )));
                }
                let link = self.new_link(owner, code, target_url, label);
                self.storage.insert_link(&link).await?;
                Ok(link)
            }
            None => {
                for _ in 0..MAX_CODE_ATTEMPTS {
                    let code = generate_random_code(self.tracking.code_length);
                    let link = self.new_link(owner, code, target_url.clone(), label.clone());
                    match self.storage.insert_link(&link).await {
                        Ok(()) => return Ok(link),
                        Err(GeoTraceError::Conflict(_)) => {
                            debug!("Generated code {} collided, retrying", link.code);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(GeoTraceError::conflict(
                    "Unable to generate a unique tracking code, try again",
                ))
            }
        }
    }

    fn new_link(
        &self,
        owner: &str,
        code: String,
        target_url: String,
        label: Option<String>,
    ) -> TrackingLink {
        TrackingLink {
            code,
            owner: owner.to_string(),
            target_url,
            label,
            enabled: true,
            created_at: Utc::now(),
            visit_count: 0,
        }
    }

    pub async fn list_links(&self, owner: &str) -> Result<Vec<TrackingLink>> {
        self.storage
            .list_links(owner, self.tracking.list_limit)
            .await
    }

    pub async fn get_link(&self, owner: &str, code: &str) -> Result<TrackingLink> {
        self.storage
            .get_owned_link(owner, code)
            .await?
            .ok_or_else(|| GeoTraceError::not_found(format!("Tracking link '{}' not found", code)))
    }

    pub async fn delete_link(&self, owner: &str, code: &str) -> Result<()> {
        if self.storage.delete_link(owner, code).await? {
            Ok(())
        } else {
            Err(GeoTraceError::not_found(format!(
                "Tracking link '{}' not found",
                code
            )))
        }
    }

    pub async fn list_visits(&self, owner: &str, code: &str) -> Result<Vec<VisitorLog>> {
        self.get_link(owner, code).await?;
        self.storage
            .list_visits(code, self.tracking.list_limit)
            .await
    }

    pub async fn list_anomalies(&self, owner: &str, code: &str) -> Result<Vec<AnomalyRecord>> {
        self.get_link(owner, code).await?;
        self.storage
            .list_anomalies(code, self.tracking.list_limit)
            .await
    }

    // ============ Visits ============

    /// 记录一次访问并返回跳转目标
    pub async fn record_visit(&self, code: &str, ctx: VisitContext) -> Result<VisitOutcome> {
        let link = self
            .storage
            .get_link(code)
            .await?
            .filter(|l| l.enabled)
            .ok_or_else(|| GeoTraceError::not_found(format!("Tracking link '{}' not found", code)))?;

        let ip = ctx.ip.as_deref().and_then(parse_ip_input);
        let geo = match ip {
            Some(addr) => self.locate(&addr).await,
            None => None,
        };

        let (threat_score, threat_level) = match ip {
            Some(addr) => {
                let assessment = self.scorer.assess(&addr, geo.as_ref());
                (assessment.score, assessment.level)
            }
            None => (0, ThreatLevel::Low),
        };

        let visit = NewVisit {
            link_code: link.code.clone(),
            session_id: ctx.session_id.filter(|s| !s.is_empty()),
            visited_at: ctx.at,
            ip_address: if self.tracking.enable_ip_logging {
                ip.map(|a| a.to_string())
            } else {
                None
            },
            user_agent: ctx.user_agent,
            referrer: ctx.referrer,
            location: geo.as_ref().map(location_from_record).unwrap_or_default(),
            threat_score,
            threat_level: threat_level.to_string(),
        };

        let recorded = self
            .storage
            .record_visit(visit, self.tracking.session_idle_secs, &self.anomaly)
            .await?;

        if let Some(anomaly) = &recorded.anomaly {
            self.alerts.notify(&Alert::RapidGeoChange {
                link_code: anomaly.link_code.clone(),
                session_id: anomaly.session_id.clone(),
                distance_km: anomaly.distance_km,
                elapsed_secs: anomaly.elapsed_secs,
                severity: anomaly.severity.clone(),
            });
        }

        if threat_level == ThreatLevel::High {
            info!(
                "High threat visitor on link {} (score {})",
                link.code, threat_score
            );
        }

        Ok(VisitOutcome {
            target_url: link.target_url,
            session_id: recorded.session.id,
            new_session: recorded.new_session,
            anomaly: recorded.anomaly,
        })
    }

    /// 公网地址查询地理位置；失败时只记日志
    async fn locate(&self, ip: &IpAddr) -> Option<GeoRecord> {
        if !self.tracking.enable_geo_lookup || is_non_routable(ip) {
            return None;
        }

        match self.geoip.lookup(&ip.to_string()).await {
            Ok(record) if record.is_success() => Some(record),
            Ok(record) => {
                debug!(
                    "Geolocation failed for {}: {}",
                    ip,
                    record.message.as_deref().unwrap_or("unknown")
                );
                None
            }
            Err(e) => {
                warn!("Geolocation lookup error for {}: {}", ip, e);
                None
            }
        }
    }
}

fn location_from_record(record: &GeoRecord) -> VisitLocation {
    let coords = record.coordinates();
    VisitLocation {
        country: record.country.clone(),
        country_code: record.country_code.clone(),
        region: record.region_name.clone().or_else(|| record.region.clone()),
        city: record.city.clone(),
        isp: record.isp.clone(),
        as_name: record.as_name.clone(),
        latitude: coords.map(|c| c.0),
        longitude: coords.map(|c| c.1),
    }
}
