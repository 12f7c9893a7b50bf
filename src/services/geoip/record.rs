//! 地理位置记录
//!
//! 字段名兼容 ip-api.com 的 camelCase 响应（`countryCode`、`regionName`、`as`、`asname`），
//! 对外序列化统一为 snake_case

use serde::{Deserialize, Serialize};

/// 批量请求体中的单个条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchQuery {
    pub query: String,
}

impl BatchQuery {
    pub fn new(ip: impl Into<String>) -> Self {
        Self { query: ip.into() }
    }
}

/// 查询状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoStatus {
    Success,
    #[default]
    Fail,
}

/// 单个 IP 的地理位置记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeoRecord {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub status: GeoStatus,
    /// 失败原因（`private range`、`reserved range`、`invalid query` 等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "countryCode")]
    pub country_code: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "regionName")]
    pub region_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    /// 形如 `AS15169 Google LLC`
    #[serde(default, alias = "as")]
    pub as_number: Option<String>,
    #[serde(default, alias = "asname")]
    pub as_name: Option<String>,
    #[serde(default)]
    pub mobile: bool,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub hosting: bool,
}

impl GeoRecord {
    /// 构造失败记录
    pub fn failed(ip: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: ip.into(),
            status: GeoStatus::Fail,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GeoStatus::Success
    }

    /// 有效坐标（成功且经纬度都存在）
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if !self.is_success() {
            return None;
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// 用于名称匹配的字段：AS 名称、AS 号串、ISP、组织
    pub fn network_names(&self) -> impl Iterator<Item = &str> {
        [
            self.as_name.as_deref(),
            self.as_number.as_deref(),
            self.isp.as_deref(),
            self.org.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_api_success_record() {
        let json = r#"{
            "status": "success",
            "country": "United States",
            "countryCode": "US",
            "region": "VA",
            "regionName": "Virginia",
            "city": "Ashburn",
            "zip": "20149",
            "lat": 39.03,
            "lon": -77.5,
            "timezone": "America/New_York",
            "isp": "Google LLC",
            "org": "Google Public DNS",
            "as": "AS15169 Google LLC",
            "asname": "GOOGLE",
            "mobile": false,
            "proxy": false,
            "hosting": true,
            "query": "8.8.8.8"
        }"#;

        let record: GeoRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_success());
        assert_eq!(record.country_code.as_deref(), Some("US"));
        assert_eq!(record.region_name.as_deref(), Some("Virginia"));
        assert_eq!(record.as_number.as_deref(), Some("AS15169 Google LLC"));
        assert_eq!(record.as_name.as_deref(), Some("GOOGLE"));
        assert!(record.hosting);
        assert_eq!(record.coordinates(), Some((39.03, -77.5)));
    }

    #[test]
    fn test_parse_ip_api_fail_record() {
        let json = r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#;
        let record: GeoRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_success());
        assert_eq!(record.message.as_deref(), Some("private range"));
        assert_eq!(record.coordinates(), None);
        assert!(!record.proxy);
    }

    #[test]
    fn test_serializes_snake_case() {
        let record = GeoRecord {
            query: "1.1.1.1".into(),
            status: GeoStatus::Success,
            country_code: Some("AU".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["country_code"], "AU");
        assert_eq!(value["status"], "success");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_network_names_skips_missing() {
        let record = GeoRecord {
            isp: Some("Hetzner Online GmbH".into()),
            org: Some(String::new()),
            ..Default::default()
        };
        let names: Vec<&str> = record.network_names().collect();
        assert_eq!(names, vec!["Hetzner Online GmbH"]);
    }
}
