//! GeoIP Provider 抽象层
//!
//! 统一的批量查询接口，根据配置选择实现：
//! - geoip.enabled = true → ExternalApiProvider
//! - geoip.enabled = false → DisabledProvider（所有查询返回 fail 记录）

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::disabled::DisabledProvider;
use super::external_api::ExternalApiProvider;
use super::record::GeoRecord;
use crate::config::GeoIpConfig;
use crate::errors::{GeoTraceError, Result};

/// GeoIP 批量查询 trait
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// 批量查询，返回结果与输入一一对应、顺序一致
    async fn lookup_batch(&self, ips: &[String]) -> Result<Vec<GeoRecord>>;

    /// 查询单个 IP
    async fn lookup(&self, ip: &str) -> Result<GeoRecord> {
        let mut records = self.lookup_batch(&[ip.to_string()]).await?;
        records
            .pop()
            .ok_or_else(|| GeoTraceError::geoip_lookup(format!("no record returned for {}", ip)))
    }

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 统一 GeoIP Provider
///
/// 启动时根据配置自动选择实现
#[derive(Clone)]
pub struct GeoIpProvider {
    inner: Arc<dyn GeoIpLookup>,
}

impl GeoIpProvider {
    pub fn new(config: &GeoIpConfig) -> Self {
        let inner: Arc<dyn GeoIpLookup> = if config.enabled {
            Arc::new(ExternalApiProvider::new(config))
        } else {
            Arc::new(DisabledProvider)
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self { inner }
    }

    /// 使用自定义实现（测试 / 嵌入场景）
    pub fn from_lookup(inner: Arc<dyn GeoIpLookup>) -> Self {
        Self { inner }
    }

    pub async fn lookup_batch(&self, ips: &[String]) -> Result<Vec<GeoRecord>> {
        self.inner.lookup_batch(ips).await
    }

    pub async fn lookup(&self, ip: &str) -> Result<GeoRecord> {
        self.inner.lookup(ip).await
    }

    /// 获取当前使用的 provider 名称
    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}
