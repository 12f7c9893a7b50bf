use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{GeoTraceError, Result};

/// 外部批量 API 单次请求上限
pub const MAX_GEOIP_BATCH_SIZE: usize = 50;

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量
/// - database: 数据库连接配置
/// - logging: 日志配置
/// - geoip: 批量地理位置查询
/// - threat: 威胁评分规则（名单 + 权重 + 阈值）
/// - anomaly: 位置突变检测参数
/// - tracking: 跟踪链接与访客会话
/// - analysis: IP 分析会话
/// - api: API token → owner 映射
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub threat: ThreatConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：GT，分隔符：__
    /// 示例：GT__SERVER__PORT=9999
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or("config.toml");

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 GT，分隔符 __
            .add_source(
                Environment::with_prefix("GT")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 校验配置之间的约束
    pub fn validate(&self) -> Result<()> {
        if self.geoip.batch_size == 0 || self.geoip.batch_size > MAX_GEOIP_BATCH_SIZE {
            return Err(GeoTraceError::config(format!(
                "geoip.batch_size must be within 1..={}, got {}",
                MAX_GEOIP_BATCH_SIZE, self.geoip.batch_size
            )));
        }

        if self.threat.medium_threshold >= self.threat.high_threshold {
            return Err(GeoTraceError::config(format!(
                "threat.medium_threshold ({}) must be lower than threat.high_threshold ({})",
                self.threat.medium_threshold, self.threat.high_threshold
            )));
        }

        if self.threat.high_threshold > 100 {
            return Err(GeoTraceError::config(
                "threat.high_threshold must not exceed 100",
            ));
        }

        if !(self.anomaly.max_speed_kmh > 0.0) {
            return Err(GeoTraceError::config(
                "anomaly.max_speed_kmh must be positive",
            ));
        }

        if self.anomaly.min_distance_km < 0.0 {
            return Err(GeoTraceError::config(
                "anomaly.min_distance_km must not be negative",
            ));
        }

        if !(4..=64).contains(&self.tracking.code_length) {
            return Err(GeoTraceError::config(format!(
                "tracking.code_length must be within 4..=64, got {}",
                self.tracking.code_length
            )));
        }

        if self.tracking.session_cookie.is_empty() {
            return Err(GeoTraceError::config(
                "tracking.session_cookie must not be empty",
            ));
        }

        if self.analysis.max_ips_per_analysis == 0 {
            return Err(GeoTraceError::config(
                "analysis.max_ips_per_analysis must be positive",
            ));
        }

        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 批量地理位置查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// 关闭后访问记录不含位置信息，分析结果全部为 fail
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 批量查询端点，POST `[{"query": "<ip>"}]`
    #[serde(default = "default_geoip_api_url")]
    pub api_url: String,
    /// 单次请求的 IP 数量，上限 50
    #[serde(default = "default_geoip_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_geoip_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_geoip_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_geoip_cache_max_capacity")]
    pub cache_max_capacity: u64,
}

/// 各检查项的权重
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatWeights {
    #[serde(default = "default_weight_suspicious_prefix")]
    pub suspicious_prefix: u32,
    #[serde(default = "default_weight_hosting_asn")]
    pub hosting_asn: u32,
    #[serde(default = "default_weight_anonymizer_keyword")]
    pub anonymizer_keyword: u32,
    #[serde(default = "default_weight_proxy_flag")]
    pub proxy_flag: u32,
    #[serde(default = "default_weight_hosting_flag")]
    pub hosting_flag: u32,
    #[serde(default = "default_weight_high_risk_country")]
    pub high_risk_country: u32,
}

/// 威胁评分配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatConfig {
    /// CIDR（`185.220.100.0/22`）或字符串前缀（`185.220.`）
    #[serde(default = "default_suspicious_prefixes")]
    pub suspicious_prefixes: Vec<String>,
    /// 机房 / 云厂商名称片段，匹配 AS 名称、ISP、组织
    #[serde(default = "default_hosting_providers")]
    pub hosting_providers: Vec<String>,
    #[serde(default = "default_anonymizer_keywords")]
    pub anonymizer_keywords: Vec<String>,
    /// ISO 3166-1 alpha-2 国家代码
    #[serde(default = "default_high_risk_countries")]
    pub high_risk_countries: Vec<String>,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: u32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u32,
    #[serde(default)]
    pub weights: ThreatWeights,
}

/// 位置突变检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 只比较该时间窗口内的相邻两次访问
    #[serde(default = "default_anomaly_window_secs")]
    pub window_secs: i64,
    /// 超过该速度视为不可能的移动
    #[serde(default = "default_anomaly_max_speed_kmh")]
    pub max_speed_kmh: f64,
    /// 小于该距离忽略（GeoIP 城市级精度误差）
    #[serde(default = "default_anomaly_min_distance_km")]
    pub min_distance_km: f64,
}

/// 跟踪链接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: i64,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_true")]
    pub enable_ip_logging: bool,
    #[serde(default = "default_true")]
    pub enable_geo_lookup: bool,
    /// 可信反向代理（IP 或 CIDR），只有来自这些地址的 X-Forwarded-For 才被采信
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// 访问记录 / 异常列表单次返回上限
    #[serde(default = "default_list_limit")]
    pub list_limit: u64,
}

/// IP 分析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_ips_per_analysis")]
    pub max_ips_per_analysis: usize,
    #[serde(default = "default_list_limit")]
    pub list_limit: u64,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// token → owner，为空时 API 关闭
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

// ============================================================
// Default value functions
// ============================================================

fn default_true() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "sqlite://geotrace.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_geoip_api_url() -> String {
    "http://ip-api.com/batch?fields=status,message,country,countryCode,region,regionName,city,zip,lat,lon,timezone,isp,org,as,asname,mobile,proxy,hosting,query".to_string()
}

fn default_geoip_batch_size() -> usize {
    MAX_GEOIP_BATCH_SIZE
}

fn default_geoip_timeout_secs() -> u64 {
    5
}

fn default_geoip_cache_ttl_secs() -> u64 {
    15 * 60
}

fn default_geoip_cache_max_capacity() -> u64 {
    10_000
}

fn default_weight_suspicious_prefix() -> u32 {
    40
}

fn default_weight_hosting_asn() -> u32 {
    25
}

fn default_weight_anonymizer_keyword() -> u32 {
    30
}

fn default_weight_proxy_flag() -> u32 {
    30
}

fn default_weight_hosting_flag() -> u32 {
    20
}

fn default_weight_high_risk_country() -> u32 {
    15
}

fn default_suspicious_prefixes() -> Vec<String> {
    [
        "185.220.100.0/22",
        "185.220.",
        "45.155.205.",
        "193.142.146.",
        "89.248.165.",
        "141.98.10.",
        "2a0b:f4c2::/32",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hosting_providers() -> Vec<String> {
    [
        "amazon",
        "aws",
        "google cloud",
        "microsoft",
        "azure",
        "digitalocean",
        "ovh",
        "hetzner",
        "linode",
        "akamai",
        "vultr",
        "choopa",
        "m247",
        "leaseweb",
        "contabo",
        "alibaba",
        "tencent",
        "oracle",
        "scaleway",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_anonymizer_keywords() -> Vec<String> {
    ["vpn", "proxy", "tor ", "tor-exit", "anonymous", "privacy", "relay"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_high_risk_countries() -> Vec<String> {
    ["KP", "IR", "SY", "CU", "RU", "BY"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_medium_threshold() -> u32 {
    30
}

fn default_high_threshold() -> u32 {
    60
}

fn default_anomaly_window_secs() -> i64 {
    3600
}

fn default_anomaly_max_speed_kmh() -> f64 {
    900.0
}

fn default_anomaly_min_distance_km() -> f64 {
    100.0
}

fn default_code_length() -> usize {
    8
}

fn default_session_idle_secs() -> i64 {
    30 * 60
}

fn default_session_cookie() -> String {
    "gt_sid".to_string()
}

fn default_max_ips_per_analysis() -> usize {
    1000
}

fn default_list_limit() -> u64 {
    100
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_geoip_api_url(),
            batch_size: default_geoip_batch_size(),
            timeout_secs: default_geoip_timeout_secs(),
            cache_ttl_secs: default_geoip_cache_ttl_secs(),
            cache_max_capacity: default_geoip_cache_max_capacity(),
        }
    }
}

impl Default for ThreatWeights {
    fn default() -> Self {
        Self {
            suspicious_prefix: default_weight_suspicious_prefix(),
            hosting_asn: default_weight_hosting_asn(),
            anonymizer_keyword: default_weight_anonymizer_keyword(),
            proxy_flag: default_weight_proxy_flag(),
            hosting_flag: default_weight_hosting_flag(),
            high_risk_country: default_weight_high_risk_country(),
        }
    }
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            suspicious_prefixes: default_suspicious_prefixes(),
            hosting_providers: default_hosting_providers(),
            anonymizer_keywords: default_anonymizer_keywords(),
            high_risk_countries: default_high_risk_countries(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            weights: ThreatWeights::default(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_anomaly_window_secs(),
            max_speed_kmh: default_anomaly_max_speed_kmh(),
            min_distance_km: default_anomaly_min_distance_km(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            session_idle_secs: default_session_idle_secs(),
            session_cookie: default_session_cookie(),
            enable_ip_logging: true,
            enable_geo_lookup: true,
            trusted_proxies: Vec::new(),
            list_limit: default_list_limit(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_ips_per_analysis: default_max_ips_per_analysis(),
            list_limit: default_list_limit(),
        }
    }
}
