//! Entity Model ↔ 领域模型转换

use tracing::warn;

use crate::services::threat::{ThreatCheck, reputation_links};
use crate::utils::ip::{is_non_routable, parse_ip_input};
use crate::storage::models::{
    AnalysisEntry, AnalysisSession, AnomalyRecord, TrackingLink, VisitLocation, VisitorLog,
    VisitorSession,
};

use migration::entities::{
    analysis_result, analysis_session, anomaly_detection, tracking_link, visitor_log,
    visitor_session,
};

fn non_negative_u64(value: i64) -> u64 {
    value.max(0) as u64
}

fn non_negative_u32(value: i32) -> u32 {
    value.max(0) as u32
}

pub fn model_to_link(model: tracking_link::Model) -> TrackingLink {
    TrackingLink {
        code: model.code,
        owner: model.owner,
        target_url: model.target_url,
        label: model.label,
        enabled: model.enabled,
        created_at: model.created_at,
        visit_count: non_negative_u64(model.visit_count),
    }
}

pub fn model_to_session(model: visitor_session::Model) -> VisitorSession {
    VisitorSession {
        id: model.id,
        link_code: model.link_code,
        first_seen_at: model.first_seen_at,
        last_seen_at: model.last_seen_at,
        visit_count: non_negative_u64(model.visit_count),
        first_ip: model.first_ip,
    }
}

pub fn model_to_visit(model: visitor_log::Model) -> VisitorLog {
    VisitorLog {
        id: model.id,
        link_code: model.link_code,
        session_id: model.session_id,
        visited_at: model.visited_at,
        ip_address: model.ip_address,
        user_agent: model.user_agent,
        referrer: model.referrer,
        location: VisitLocation {
            country: model.country,
            country_code: model.country_code,
            region: model.region,
            city: model.city,
            isp: model.isp,
            as_name: model.as_name,
            latitude: model.latitude,
            longitude: model.longitude,
        },
        threat_score: non_negative_u32(model.threat_score),
        threat_level: model.threat_level,
    }
}

pub fn model_to_anomaly(model: anomaly_detection::Model) -> AnomalyRecord {
    AnomalyRecord {
        id: model.id,
        link_code: model.link_code,
        session_id: model.session_id,
        visitor_log_id: model.visitor_log_id,
        previous_log_id: model.previous_log_id,
        anomaly_type: model.anomaly_type,
        distance_km: model.distance_km,
        elapsed_secs: model.elapsed_secs,
        speed_kmh: model.speed_kmh,
        severity: model.severity,
        detected_at: model.detected_at,
    }
}

pub fn model_to_analysis_session(model: analysis_session::Model) -> AnalysisSession {
    AnalysisSession {
        id: model.id,
        owner: model.owner,
        label: model.label,
        created_at: model.created_at,
        total_ips: non_negative_u32(model.total_ips),
        high_count: non_negative_u32(model.high_count),
        medium_count: non_negative_u32(model.medium_count),
        low_count: non_negative_u32(model.low_count),
        failed_count: non_negative_u32(model.failed_count),
    }
}

pub fn model_to_analysis_entry(model: analysis_result::Model) -> AnalysisEntry {
    let checks: Vec<ThreatCheck> = serde_json::from_str(&model.checks).unwrap_or_else(|e| {
        warn!(
            "Malformed checks column for analysis result {}: {}",
            model.id, e
        );
        Vec::new()
    });
    // 私有地址没有公网信誉可查
    let links = parse_ip_input(&model.ip_address)
        .filter(|ip| !is_non_routable(ip))
        .map(|ip| reputation_links(&ip))
        .unwrap_or_default();

    AnalysisEntry {
        ip_address: model.ip_address,
        status: model.status,
        message: model.message,
        country: model.country,
        country_code: model.country_code,
        region: model.region,
        city: model.city,
        latitude: model.latitude,
        longitude: model.longitude,
        timezone: model.timezone,
        isp: model.isp,
        org: model.org,
        as_number: model.as_number,
        as_name: model.as_name,
        threat_score: non_negative_u32(model.threat_score),
        threat_level: model.threat_level,
        checks,
        reputation_links: links,
    }
}

/// 分析结果 → ActiveModel（checks 序列化为 JSON 文本）
pub fn analysis_entry_to_active_model(
    session_id: &str,
    position: usize,
    entry: &AnalysisEntry,
) -> serde_json::Result<analysis_result::ActiveModel> {
    use sea_orm::ActiveValue::Set;

    Ok(analysis_result::ActiveModel {
        session_id: Set(session_id.to_string()),
        position: Set(position as i32),
        ip_address: Set(entry.ip_address.clone()),
        status: Set(entry.status.clone()),
        message: Set(entry.message.clone()),
        country: Set(entry.country.clone()),
        country_code: Set(entry.country_code.clone()),
        region: Set(entry.region.clone()),
        city: Set(entry.city.clone()),
        latitude: Set(entry.latitude),
        longitude: Set(entry.longitude),
        timezone: Set(entry.timezone.clone()),
        isp: Set(entry.isp.clone()),
        org: Set(entry.org.clone()),
        as_number: Set(entry.as_number.clone()),
        as_name: Set(entry.as_name.clone()),
        threat_score: Set(entry.threat_score as i32),
        threat_level: Set(entry.threat_level.clone()),
        checks: Set(serde_json::to_string(&entry.checks)?),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_negative_counters_clamp_to_zero() {
        let link = model_to_link(tracking_link::Model {
            code: "abc".into(),
            owner: "alice".into(),
            target_url: "https://example.com".into(),
            label: None,
            enabled: true,
            created_at: Utc::now(),
            visit_count: -3,
        });
        assert_eq!(link.visit_count, 0);
    }

    #[test]
    fn test_malformed_checks_become_empty() {
        let entry = model_to_analysis_entry(analysis_result::Model {
            id: 1,
            session_id: "s".into(),
            position: 0,
            ip_address: "8.8.8.8".into(),
            status: "success".into(),
            message: None,
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
            threat_score: 40,
            threat_level: "medium".into(),
            checks: "not json".into(),
        });
        assert!(entry.checks.is_empty());
        assert_eq!(entry.threat_score, 40);
        assert_eq!(entry.reputation_links.len(), 3);
    }
}
