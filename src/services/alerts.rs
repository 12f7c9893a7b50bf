//! 本地告警
//!
//! 高威胁分析结果与位置突变都会产生一条告警，默认输出为结构化 warn 日志

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

/// 告警内容
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    HighThreat {
        owner: String,
        ip: String,
        score: u32,
        checks: Vec<String>,
    },
    RapidGeoChange {
        link_code: String,
        session_id: String,
        distance_km: f64,
        elapsed_secs: i64,
        severity: String,
    },
}

/// 告警出口
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &Alert);
}

/// 写入 tracing 的告警出口
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, alert: &Alert) {
        match alert {
            Alert::HighThreat {
                owner,
                ip,
                score,
                checks,
            } => warn!(
                target: "geotrace::alert",
                owner = %owner,
                ip = %ip,
                score = *score,
                checks = %checks.join(","),
                "High threat address detected"
            ),
            Alert::RapidGeoChange {
                link_code,
                session_id,
                distance_km,
                elapsed_secs,
                severity,
            } => warn!(
                target: "geotrace::alert",
                link = %link_code,
                session = %session_id,
                distance_km = *distance_km,
                elapsed_secs = *elapsed_secs,
                severity = %severity,
                "Rapid geolocation change detected"
            ),
        }
    }
}

/// 内存告警出口，收集所有告警（测试 / 嵌入场景）
#[derive(Debug, Default, Clone)]
pub struct MemoryAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for MemoryAlertSink {
    fn notify(&self, alert: &Alert) {
        if let Ok(mut guard) = self.alerts.lock() {
            guard.push(alert.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_alerts() {
        let sink = MemoryAlertSink::new();
        let alert = Alert::HighThreat {
            owner: "alice".into(),
            ip: "185.220.101.4".into(),
            score: 85,
            checks: vec!["suspicious_prefix".into()],
        };

        sink.notify(&alert);
        TracingAlertSink.notify(&alert);

        assert_eq!(sink.alerts(), vec![alert]);
    }

    #[test]
    fn test_alert_serializes_with_kind_tag() {
        let alert = Alert::RapidGeoChange {
            link_code: "abc".into(),
            session_id: "s1".into(),
            distance_km: 5837.0,
            elapsed_secs: 600,
            severity: "high".into(),
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["kind"], "rapid_geo_change");
        assert_eq!(value["link_code"], "abc");
    }
}
