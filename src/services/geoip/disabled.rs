use async_trait::async_trait;

use super::provider::GeoIpLookup;
use super::record::GeoRecord;
use crate::errors::Result;

/// 地理位置查询关闭时使用，不发起任何网络请求
pub struct DisabledProvider;

#[async_trait]
impl GeoIpLookup for DisabledProvider {
    async fn lookup_batch(&self, ips: &[String]) -> Result<Vec<GeoRecord>> {
        Ok(ips
            .iter()
            .map(|ip| GeoRecord::failed(ip.as_str(), "geolocation disabled"))
            .collect())
    }

    fn name(&self) -> &'static str {
        "Disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_provider_returns_fail_records_in_order() {
        let ips = vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()];
        let records = DisabledProvider.lookup_batch(&ips).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query, "8.8.8.8");
        assert_eq!(records[1].query, "1.1.1.1");
        assert!(records.iter().all(|r| !r.is_success()));
    }
}
