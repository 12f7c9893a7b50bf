//! 位置突变检测
//!
//! 同一会话中相邻两次已定位访问之间，按大圆距离与时间差估算移动速度，
//! 超过阈值即判定为不可能的移动。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::config::AnomalyConfig;

/// 地球平均半径（km）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const RAPID_GEO_CHANGE: &str = "rapid_geo_change";

/// 异常严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnomalySeverity {
    Medium,
    High,
}

/// 一次已定位的访问
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub at: DateTime<Utc>,
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAnomaly {
    pub distance_km: f64,
    pub elapsed_secs: i64,
    /// None 表示时间差为 0（速度无穷大）
    pub speed_kmh: Option<f64>,
    pub severity: AnomalySeverity,
}

/// 大圆距离（haversine）
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// 比较同一会话的前后两次访问
pub fn detect_rapid_geo_change(
    previous: &GeoPoint,
    current: &GeoPoint,
    rules: &AnomalyConfig,
) -> Option<GeoAnomaly> {
    let elapsed_secs = (current.at - previous.at).num_seconds().max(0);
    if elapsed_secs > rules.window_secs {
        return None;
    }

    let distance_km = haversine_km((previous.lat, previous.lon), (current.lat, current.lon));
    if distance_km < rules.min_distance_km {
        return None;
    }

    let speed_kmh = if elapsed_secs == 0 {
        None
    } else {
        Some(distance_km / (elapsed_secs as f64 / 3600.0))
    };

    let severity = match speed_kmh {
        None => AnomalySeverity::High,
        Some(speed) if speed <= rules.max_speed_kmh => return None,
        Some(speed) if speed >= rules.max_speed_kmh * 2.0 => AnomalySeverity::High,
        Some(_) => AnomalySeverity::Medium,
    };

    Some(GeoAnomaly {
        distance_km,
        elapsed_secs,
        speed_kmh,
        severity,
    })
}
