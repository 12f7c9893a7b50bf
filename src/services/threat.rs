//! 启发式威胁评分
//!
//! 对一组静态名单做前缀 / 子串匹配，每条命中的规则贡献一次权重，
//! 总分截断到 100 后按阈值映射为 low / medium / high。

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::config::{ThreatConfig, ThreatWeights};
use crate::services::geoip::GeoRecord;
use crate::utils::ip::matches_ip_rule;

/// 最高分
pub const MAX_THREAT_SCORE: u32 = 100;

/// 威胁等级
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// 命中的单条规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatCheck {
    pub name: String,
    pub weight: u32,
    pub detail: String,
}

/// 评分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub score: u32,
    pub level: ThreatLevel,
    pub checks: Vec<ThreatCheck>,
}

/// 外部信誉查询站点（仅作为信息链接返回，不主动调用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationLink {
    pub name: String,
    pub url: String,
}

/// 规则集（从配置构建，名单统一转小写）
#[derive(Debug, Clone)]
pub struct ThreatRules {
    suspicious_prefixes: Vec<String>,
    hosting_providers: Vec<String>,
    anonymizer_keywords: Vec<String>,
    high_risk_countries: Vec<String>,
    weights: ThreatWeights,
    medium_threshold: u32,
    high_threshold: u32,
}

impl From<&ThreatConfig> for ThreatRules {
    fn from(config: &ThreatConfig) -> Self {
        fn normalized(list: &[String]) -> Vec<String> {
            list.iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.trim().is_empty())
                .collect()
        }

        Self {
            suspicious_prefixes: normalized(&config.suspicious_prefixes),
            hosting_providers: normalized(&config.hosting_providers),
            anonymizer_keywords: normalized(&config.anonymizer_keywords),
            high_risk_countries: config
                .high_risk_countries
                .iter()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
            weights: config.weights.clone(),
            medium_threshold: config.medium_threshold,
            high_threshold: config.high_threshold,
        }
    }
}

/// 威胁评分器
#[derive(Debug, Clone)]
pub struct ThreatScorer {
    rules: ThreatRules,
}

impl ThreatScorer {
    pub fn new(config: &ThreatConfig) -> Self {
        Self {
            rules: ThreatRules::from(config),
        }
    }

    /// 评估单个 IP
    ///
    /// `geo` 为 None 或失败记录时只做 IP 前缀检查
    pub fn assess(&self, ip: &IpAddr, geo: Option<&GeoRecord>) -> ThreatAssessment {
        let rules = &self.rules;
        let weights = &rules.weights;
        let mut checks = Vec::new();

        if let Some(rule) = rules
            .suspicious_prefixes
            .iter()
            .find(|rule| matches_ip_rule(ip, rule))
        {
            checks.push(ThreatCheck {
                name: "suspicious_prefix".into(),
                weight: weights.suspicious_prefix,
                detail: format!("address matches {}", rule),
            });
        }

        if let Some(geo) = geo.filter(|g| g.is_success()) {
            let names: Vec<String> = geo.network_names().map(str::to_lowercase).collect();

            if let Some((provider, name)) = find_substring(&names, &rules.hosting_providers) {
                checks.push(ThreatCheck {
                    name: "hosting_asn".into(),
                    weight: weights.hosting_asn,
                    detail: format!("network '{}' matches hosting provider '{}'", name, provider),
                });
            }

            if let Some((keyword, name)) = find_substring(&names, &rules.anonymizer_keywords) {
                checks.push(ThreatCheck {
                    name: "anonymizer_keyword".into(),
                    weight: weights.anonymizer_keyword,
                    detail: format!("network '{}' contains '{}'", name, keyword.trim()),
                });
            }

            if geo.proxy {
                checks.push(ThreatCheck {
                    name: "proxy_flag".into(),
                    weight: weights.proxy_flag,
                    detail: "geolocation marks address as proxy/VPN/Tor".into(),
                });
            }

            if geo.hosting {
                checks.push(ThreatCheck {
                    name: "hosting_flag".into(),
                    weight: weights.hosting_flag,
                    detail: "geolocation marks address as hosting/datacenter".into(),
                });
            }

            if let Some(code) = geo.country_code.as_deref().map(str::to_uppercase)
                && rules.high_risk_countries.contains(&code)
            {
                checks.push(ThreatCheck {
                    name: "high_risk_country".into(),
                    weight: weights.high_risk_country,
                    detail: format!("country {} is on the high-risk list", code),
                });
            }
        }

        let score = checks
            .iter()
            .map(|c| c.weight)
            .sum::<u32>()
            .min(MAX_THREAT_SCORE);

        ThreatAssessment {
            score,
            level: self.level_for(score),
            checks,
        }
    }

    /// 分数 → 等级
    pub fn level_for(&self, score: u32) -> ThreatLevel {
        if score >= self.rules.high_threshold {
            ThreatLevel::High
        } else if score >= self.rules.medium_threshold {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }
}

/// 在任一名称中查找任一片段，返回 (片段, 名称)
fn find_substring<'a>(names: &'a [String], needles: &'a [String]) -> Option<(&'a str, &'a str)> {
    needles.iter().find_map(|needle| {
        names
            .iter()
            .find(|name| name.contains(needle.as_str()))
            .map(|name| (needle.as_str(), name.as_str()))
    })
}

/// 第三方信誉站点链接
pub fn reputation_links(ip: &IpAddr) -> Vec<ReputationLink> {
    let ip = ip.to_string();
    vec![
        ReputationLink {
            name: "AbuseIPDB".into(),
            url: format!("https://www.abuseipdb.com/check/{}", ip),
        },
        ReputationLink {
            name: "VirusTotal".into(),
            url: format!("https://www.virustotal.com/gui/ip-address/{}", ip),
        },
        ReputationLink {
            name: "Shodan".into(),
            url: format!("https://www.shodan.io/host/{}", ip),
        },
    ]
}
