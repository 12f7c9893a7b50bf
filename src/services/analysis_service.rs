//! IP analysis service
//!
//! 一批 IP → 去重 → 私有地址直接跳过 → 批量地理位置查询 → 威胁评分 → 汇总。
//! `analyze` 额外落库并对 high 结果发出告警。

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::{AnalysisConfig, StaticConfig};
use crate::errors::{GeoTraceError, Result};
use crate::services::alerts::{Alert, AlertSink};
use crate::services::geoip::{GeoIpProvider, GeoRecord};
use crate::services::threat::{ThreatLevel, ThreatScorer, reputation_links};
use crate::storage::{AnalysisDetail, AnalysisEntry, AnalysisSession, SeaOrmStorage};
use crate::utils::ip::{is_non_routable, parse_ip_input};
use crate::utils::normalize_label;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAIL: &str = "fail";
pub const STATUS_PRIVATE: &str = "private";

/// 各等级计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub total: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    /// 地理位置查询失败的条目
    pub failed: u32,
    /// 私有 / 保留地址（未查询）
    pub private: u32,
}

impl AnalysisSummary {
    pub fn from_entries(entries: &[AnalysisEntry]) -> Self {
        let mut summary = Self {
            total: entries.len() as u32,
            ..Default::default()
        };
        for entry in entries {
            match entry.threat_level.parse::<ThreatLevel>() {
                Ok(ThreatLevel::High) => summary.high += 1,
                Ok(ThreatLevel::Medium) => summary.medium += 1,
                _ => summary.low += 1,
            }
            match entry.status.as_str() {
                STATUS_FAIL => summary.failed += 1,
                STATUS_PRIVATE => summary.private += 1,
                _ => {}
            }
        }
        summary
    }
}

/// 未落库的分析结果
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub summary: AnalysisSummary,
    pub results: Vec<AnalysisEntry>,
}

pub struct AnalysisService {
    storage: Option<Arc<SeaOrmStorage>>,
    geoip: GeoIpProvider,
    scorer: Arc<ThreatScorer>,
    alerts: Arc<dyn AlertSink>,
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        geoip: GeoIpProvider,
        scorer: Arc<ThreatScorer>,
        alerts: Arc<dyn AlertSink>,
        config: &StaticConfig,
    ) -> Self {
        Self {
            storage: Some(storage),
            geoip,
            scorer,
            alerts,
            config: config.analysis.clone(),
        }
    }

    /// 不落库的实例（CLI 一次性分析）
    pub fn detached(
        geoip: GeoIpProvider,
        scorer: Arc<ThreatScorer>,
        alerts: Arc<dyn AlertSink>,
        config: &StaticConfig,
    ) -> Self {
        Self {
            storage: None,
            geoip,
            scorer,
            alerts,
            config: config.analysis.clone(),
        }
    }

    fn storage(&self) -> Result<&SeaOrmStorage> {
        self.storage
            .as_deref()
            .ok_or_else(|| GeoTraceError::config("analysis storage is not configured"))
    }

    /// 解析输入：去空白、去重（保留首次出现顺序）
    ///
    /// 任一条目无法解析时整体拒绝
    pub fn parse_inputs(&self, inputs: &[String]) -> Result<Vec<IpAddr>> {
        let mut seen = HashSet::new();
        let mut ips = Vec::new();
        let mut invalid = Vec::new();

        for raw in inputs.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            match parse_ip_input(raw) {
                Some(ip) => {
                    if seen.insert(ip) {
                        ips.push(ip);
                    }
                }
                None => invalid.push(raw.to_string()),
            }
        }

        if !invalid.is_empty() {
            let shown: Vec<&str> = invalid.iter().take(5).map(String::as_str).collect();
            return Err(GeoTraceError::validation(format!(
                "Invalid IP address(es): {}{}",
                shown.join(", "),
                if invalid.len() > shown.len() { ", ..." } else { "" }
            )));
        }

        if ips.is_empty() {
            return Err(GeoTraceError::validation("At least one IP address is required"));
        }

        if ips.len() > self.config.max_ips_per_analysis {
            return Err(GeoTraceError::validation(format!(
                "Too many IP addresses: {} (max {})",
                ips.len(),
                self.config.max_ips_per_analysis
            )));
        }

        Ok(ips)
    }

    /// 查询并评分，不落库
    pub async fn evaluate(&self, inputs: &[String]) -> Result<Evaluation> {
        let ips = self.parse_inputs(inputs)?;

        let public: Vec<String> = ips
            .iter()
            .filter(|ip| !is_non_routable(ip))
            .map(|ip| ip.to_string())
            .collect();

        let mut records = if public.is_empty() {
            Vec::new()
        } else {
            self.geoip.lookup_batch(&public).await?
        }
        .into_iter();

        let results: Vec<AnalysisEntry> = ips
            .iter()
            .map(|ip| {
                if is_non_routable(ip) {
                    self.private_entry(ip)
                } else {
                    let record = records
                        .next()
                        .unwrap_or_else(|| GeoRecord::failed(ip.to_string(), "no record returned"));
                    self.entry_from_record(ip, &record)
                }
            })
            .collect();

        Ok(Evaluation {
            summary: AnalysisSummary::from_entries(&results),
            results,
        })
    }

    /// 分析并保存
    pub async fn analyze(
        &self,
        owner: &str,
        label: Option<String>,
        inputs: &[String],
    ) -> Result<AnalysisDetail> {
        let storage = self.storage()?;
        let label = normalize_label(label)?;
        let evaluation = self.evaluate(inputs).await?;
        let summary = evaluation.summary;

        let session = AnalysisSession {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            label,
            created_at: Utc::now(),
            total_ips: summary.total,
            high_count: summary.high,
            medium_count: summary.medium,
            low_count: summary.low,
            failed_count: summary.failed,
        };

        storage
            .insert_analysis(&session, &evaluation.results)
            .await?;

        for entry in evaluation
            .results
            .iter()
            .filter(|e| e.threat_level == ThreatLevel::High.as_ref())
        {
            self.alerts.notify(&Alert::HighThreat {
                owner: owner.to_string(),
                ip: entry.ip_address.clone(),
                score: entry.threat_score,
                checks: entry.checks.iter().map(|c| c.name.clone()).collect(),
            });
        }

        info!(
            "Analysis {} completed: {} IPs ({} high, {} medium, {} low, {} failed)",
            session.id, summary.total, summary.high, summary.medium, summary.low, summary.failed
        );

        Ok(AnalysisDetail {
            session,
            results: evaluation.results,
        })
    }

    pub async fn list_sessions(&self, owner: &str) -> Result<Vec<AnalysisSession>> {
        self.storage()?
            .list_analyses(owner, self.config.list_limit)
            .await
    }

    pub async fn get_session(&self, owner: &str, id: &str) -> Result<AnalysisDetail> {
        self.storage()?
            .get_analysis(owner, id)
            .await?
            .ok_or_else(|| GeoTraceError::not_found(format!("Analysis '{}' not found", id)))
    }

    fn private_entry(&self, ip: &IpAddr) -> AnalysisEntry {
        let assessment = self.scorer.assess(ip, None);
        AnalysisEntry {
            ip_address: ip.to_string(),
            status: STATUS_PRIVATE.to_string(),
            message: Some("private or reserved address".to_string()),
            country: None,
            country_code: None,
            region: None,
            city: None,
            latitude: None,
            longitude: None,
            timezone: None,
            isp: None,
            org: None,
            as_number: None,
            as_name: None,
            threat_score: assessment.score,
            threat_level: assessment.level.to_string(),
            checks: assessment.checks,
            reputation_links: Vec::new(),
        }
    }

    fn entry_from_record(&self, ip: &IpAddr, record: &GeoRecord) -> AnalysisEntry {
        let assessment = self.scorer.assess(ip, Some(record));
        let coords = record.coordinates();
        AnalysisEntry {
            ip_address: ip.to_string(),
            status: if record.is_success() {
                STATUS_SUCCESS
            } else {
                STATUS_FAIL
            }
            .to_string(),
            message: record.message.clone(),
            country: record.country.clone(),
            country_code: record.country_code.clone(),
            region: record.region_name.clone().or_else(|| record.region.clone()),
            city: record.city.clone(),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            timezone: record.timezone.clone(),
            isp: record.isp.clone(),
            org: record.org.clone(),
            as_number: record.as_number.clone(),
            as_name: record.as_name.clone(),
            threat_score: assessment.score,
            threat_level: assessment.level.to_string(),
            checks: assessment.checks,
            reputation_links: reputation_links(ip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alerts::TracingAlertSink;
    use crate::services::geoip::DisabledProvider;

    fn service(max: usize) -> AnalysisService {
        let mut config = StaticConfig::default();
        config.analysis.max_ips_per_analysis = max;
        AnalysisService::detached(
            GeoIpProvider::from_lookup(Arc::new(DisabledProvider)),
            Arc::new(ThreatScorer::new(&config.threat)),
            Arc::new(TracingAlertSink),
            &config,
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_inputs_dedups_in_order() {
        let ips = service(10)
            .parse_inputs(&strings(&[" 8.8.8.8 ", "1.1.1.1", "8.8.8.8", "", "1.1.1.1:53"]))
            .unwrap();
        let rendered: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
        assert_eq!(rendered, vec!["8.8.8.8", "1.1.1.1"]);
    }

    #[test]
    fn test_parse_inputs_rejects_empty_invalid_and_oversized() {
        let svc = service(2);
        assert!(matches!(
            svc.parse_inputs(&strings(&["", "  "])),
            Err(GeoTraceError::Validation(_))
        ));
        assert!(matches!(
            svc.parse_inputs(&strings(&["8.8.8.8", "not-an-ip"])),
            Err(GeoTraceError::Validation(_))
        ));
        assert!(matches!(
            svc.parse_inputs(&strings(&["1.1.1.1", "8.8.8.8", "9.9.9.9"])),
            Err(GeoTraceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_private_addresses_skip_lookup() {
        let evaluation = service(10)
            .evaluate(&strings(&["192.168.1.10", "8.8.8.8"]))
            .await
            .unwrap();

        assert_eq!(evaluation.results[0].status, STATUS_PRIVATE);
        assert!(evaluation.results[0].reputation_links.is_empty());
        // 地理位置关闭时公网地址为 fail
        assert_eq!(evaluation.results[1].status, STATUS_FAIL);
        assert_eq!(evaluation.summary.private, 1);
        assert_eq!(evaluation.summary.failed, 1);
        assert_eq!(evaluation.summary.low, 2);
    }

    #[tokio::test]
    async fn test_analyze_without_storage_is_config_error() {
        let err = service(10)
            .analyze("alice", None, &strings(&["8.8.8.8"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GeoTraceError::Config(_)));
    }
}
