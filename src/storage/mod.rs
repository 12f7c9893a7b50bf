use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::{
    AnalysisDetail, AnalysisEntry, AnalysisSession, AnomalyRecord, NewVisit, RecordedVisit,
    TrackingLink, VisitLocation, VisitorLog, VisitorSession,
};

pub struct StorageFactory;

impl StorageFactory {
    /// 按 database_url 推断后端并完成连接与迁移
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<SeaOrmStorage>> {
        let storage = SeaOrmStorage::new(config).await?;
        Ok(Arc::new(storage))
    }
}
