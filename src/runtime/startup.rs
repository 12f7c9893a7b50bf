//! 服务器启动准备：存储、GeoIP、评分器与两个业务服务

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::StaticConfig;
use crate::errors::Result;
use crate::services::{
    AlertSink, AnalysisService, GeoIpProvider, ThreatScorer, TrackingService, TracingAlertSink,
};
use crate::storage::{SeaOrmStorage, StorageFactory};

/// 启动后各 worker 共享的组件
#[derive(Clone)]
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub geoip: GeoIpProvider,
    pub tracking_service: Arc<TrackingService>,
    pub analysis_service: Arc<AnalysisService>,
}

impl StartupContext {
    /// 用已有存储组装（测试中使用临时数据库）
    pub fn assemble(
        config: &StaticConfig,
        storage: Arc<SeaOrmStorage>,
        geoip: GeoIpProvider,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let scorer = Arc::new(ThreatScorer::new(&config.threat));

        let tracking_service = Arc::new(TrackingService::new(
            storage.clone(),
            geoip.clone(),
            scorer.clone(),
            alerts.clone(),
            config,
        ));
        let analysis_service = Arc::new(AnalysisService::new(
            storage.clone(),
            geoip.clone(),
            scorer,
            alerts,
            config,
        ));

        Self {
            storage,
            geoip,
            tracking_service,
            analysis_service,
        }
    }
}

pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let storage = StorageFactory::create(&config.database).await?;
    info!("Using storage backend: {}", storage.backend_name());

    let geoip = GeoIpProvider::new(&config.geoip);

    if config.api.tokens.is_empty() {
        warn!("api.tokens is empty: only tracking redirects and health checks are served");
    } else {
        info!("API enabled for {} token(s)", config.api.tokens.len());
    }

    Ok(StartupContext::assemble(
        config,
        storage,
        geoip,
        Arc::new(TracingAlertSink),
    ))
}
