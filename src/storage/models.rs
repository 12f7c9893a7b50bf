//! 存储层领域模型
//!
//! 与 `migration::entities` 一一对应，但带 serde 支持，可直接作为 API 响应数据

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::threat::{ReputationLink, ThreatCheck};

/// 跟踪链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingLink {
    pub code: String,
    #[serde(skip_serializing)]
    pub owner: String,
    pub target_url: String,
    pub label: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub visit_count: u64,
}

/// 访客会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorSession {
    pub id: String,
    pub link_code: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub visit_count: u64,
    pub first_ip: Option<String>,
}

/// 访问记录上的位置信息（查询失败或关闭时全部为空）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitLocation {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
    pub as_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl VisitLocation {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// 单次访问
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorLog {
    pub id: i64,
    pub link_code: String,
    pub session_id: String,
    pub visited_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    #[serde(flatten)]
    pub location: VisitLocation,
    pub threat_score: u32,
    pub threat_level: String,
}

/// 写入一次访问所需的数据
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub link_code: String,
    /// 来自 cookie 的会话 ID
    pub session_id: Option<String>,
    pub visited_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub location: VisitLocation,
    pub threat_score: u32,
    pub threat_level: String,
}

/// 位置突变记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: i64,
    pub link_code: String,
    pub session_id: String,
    pub visitor_log_id: i64,
    pub previous_log_id: i64,
    pub anomaly_type: String,
    pub distance_km: f64,
    pub elapsed_secs: i64,
    /// null 表示速度无穷大
    pub speed_kmh: Option<f64>,
    pub severity: String,
    pub detected_at: DateTime<Utc>,
}

/// 一次访问写入后的结果
#[derive(Debug, Clone)]
pub struct RecordedVisit {
    pub log: VisitorLog,
    pub session: VisitorSession,
    /// 会话是否为本次新建
    pub new_session: bool,
    pub anomaly: Option<AnomalyRecord>,
}

/// 分析会话汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: String,
    #[serde(skip_serializing)]
    pub owner: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_ips: u32,
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
    pub failed_count: u32,
}

/// 单个 IP 的分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub ip_address: String,
    /// `success` / `fail` / `private`
    pub status: String,
    pub message: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    pub as_number: Option<String>,
    pub as_name: Option<String>,
    pub threat_score: u32,
    pub threat_level: String,
    pub checks: Vec<ThreatCheck>,
    /// 第三方信誉站点链接（不落库，读取时按 IP 生成）
    #[serde(default)]
    pub reputation_links: Vec<ReputationLink>,
}

/// 分析会话及其全部结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetail {
    #[serde(flatten)]
    pub session: AnalysisSession,
    pub results: Vec<AnalysisEntry>,
}
