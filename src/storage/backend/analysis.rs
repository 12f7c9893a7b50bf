//! 分析会话持久化

use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use tracing::info;

use super::converters::{
    analysis_entry_to_active_model, model_to_analysis_entry, model_to_analysis_session,
};
use super::{SeaOrmStorage, retry};
use crate::errors::{GeoTraceError, Result};
use crate::storage::models::{AnalysisDetail, AnalysisEntry, AnalysisSession};

use migration::entities::{analysis_result, analysis_session};

/// 单条 INSERT 的结果行数（控制 SQLite 绑定参数数量）
const RESULT_INSERT_CHUNK: usize = 200;

impl SeaOrmStorage {
    /// 在一个事务中写入会话汇总与全部结果，冲突时整个事务重试
    pub async fn insert_analysis(
        &self,
        session: &AnalysisSession,
        entries: &[AnalysisEntry],
    ) -> Result<()> {
        let rows = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| analysis_entry_to_active_model(&session.id, position, entry))
            .collect::<serde_json::Result<Vec<_>>>()?;

        let db = &self.db;
        let rows = &rows;
        retry::with_retry(
            &format!("insert_analysis({})", session.id),
            self.retry_config,
            || async move {
                let txn = db.begin().await?;

                analysis_session::Entity::insert(analysis_session::ActiveModel {
                    id: Set(session.id.clone()),
                    owner: Set(session.owner.clone()),
                    label: Set(session.label.clone()),
                    created_at: Set(session.created_at),
                    total_ips: Set(session.total_ips as i32),
                    high_count: Set(session.high_count as i32),
                    medium_count: Set(session.medium_count as i32),
                    low_count: Set(session.low_count as i32),
                    failed_count: Set(session.failed_count as i32),
                })
                .exec(&txn)
                .await?;

                for chunk in rows.chunks(RESULT_INSERT_CHUNK) {
                    analysis_result::Entity::insert_many(chunk.to_vec())
                        .exec(&txn)
                        .await?;
                }

                txn.commit().await
            },
        )
        .await
        .map_err(|e| GeoTraceError::database_operation(format!("保存分析结果失败: {}", e)))?;

        info!(
            "Analysis session stored: {} ({} results, owner: {})",
            session.id,
            entries.len(),
            session.owner
        );
        Ok(())
    }

    /// 所有者的分析会话，最新在前
    pub async fn list_analyses(&self, owner: &str, limit: u64) -> Result<Vec<AnalysisSession>> {
        let db = &self.db;
        let models = retry::with_retry("list_analyses", self.retry_config, || async {
            analysis_session::Entity::find()
                .filter(analysis_session::Column::Owner.eq(owner))
                .order_by_desc(analysis_session::Column::CreatedAt)
                .limit(limit)
                .all(db)
                .await
        })
        .await?;

        Ok(models.into_iter().map(model_to_analysis_session).collect())
    }

    /// 单个会话及结果（按提交顺序）
    pub async fn get_analysis(&self, owner: &str, id: &str) -> Result<Option<AnalysisDetail>> {
        let db = &self.db;
        let session = retry::with_retry("get_analysis", self.retry_config, || async {
            analysis_session::Entity::find_by_id(id.to_string())
                .filter(analysis_session::Column::Owner.eq(owner))
                .one(db)
                .await
        })
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let results = retry::with_retry("get_analysis(results)", self.retry_config, || async {
            analysis_result::Entity::find()
                .filter(analysis_result::Column::SessionId.eq(id))
                .order_by_asc(analysis_result::Column::Position)
                .all(db)
                .await
        })
        .await?;

        Ok(Some(AnalysisDetail {
            session: model_to_analysis_session(session),
            results: results.into_iter().map(model_to_analysis_entry).collect(),
        }))
    }
}
