//! Tracking link 读写

use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::info;

use super::converters::model_to_link;
use super::{SeaOrmStorage, is_unique_violation, retry};
use crate::errors::{GeoTraceError, Result};
use crate::storage::models::TrackingLink;

use migration::entities::{anomaly_detection, tracking_link, visitor_log, visitor_session};

impl SeaOrmStorage {
    /// 插入新链接，短码已存在时返回 Conflict
    pub async fn insert_link(&self, link: &TrackingLink) -> Result<()> {
        let model = tracking_link::ActiveModel {
            code: Set(link.code.clone()),
            owner: Set(link.owner.clone()),
            target_url: Set(link.target_url.clone()),
            label: Set(link.label.clone()),
            enabled: Set(link.enabled),
            created_at: Set(link.created_at),
            visit_count: Set(link.visit_count as i64),
        };

        let db = &self.db;
        retry::with_retry(
            &format!("insert_link({})", link.code),
            self.retry_config,
            || async { tracking_link::Entity::insert(model.clone()).exec(db).await },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                GeoTraceError::conflict(format!("Tracking code already exists: {}", link.code))
            } else {
                GeoTraceError::database_operation(format!("创建跟踪链接失败: {}", e))
            }
        })?;

        info!("Tracking link created: {} (owner: {})", link.code, link.owner);
        Ok(())
    }

    /// 按短码查询（不区分所有者，用于跳转）
    pub async fn get_link(&self, code: &str) -> Result<Option<TrackingLink>> {
        let db = &self.db;
        let model = retry::with_retry(&format!("get_link({})", code), self.retry_config, || async {
            tracking_link::Entity::find_by_id(code.to_string()).one(db).await
        })
        .await?;

        Ok(model.map(model_to_link))
    }

    /// 按所有者查询单条
    pub async fn get_owned_link(&self, owner: &str, code: &str) -> Result<Option<TrackingLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_owned_link({})", code),
            self.retry_config,
            || async {
                tracking_link::Entity::find_by_id(code.to_string())
                    .filter(tracking_link::Column::Owner.eq(owner))
                    .one(db)
                    .await
            },
        )
        .await?;

        Ok(model.map(model_to_link))
    }

    /// 列出所有者的链接，按创建时间倒序
    pub async fn list_links(&self, owner: &str, limit: u64) -> Result<Vec<TrackingLink>> {
        let db = &self.db;
        let models = retry::with_retry("list_links", self.retry_config, || async {
            tracking_link::Entity::find()
                .filter(tracking_link::Column::Owner.eq(owner))
                .order_by_desc(tracking_link::Column::CreatedAt)
                .order_by_asc(tracking_link::Column::Code)
                .limit(limit)
                .all(db)
                .await
        })
        .await?;

        Ok(models.into_iter().map(model_to_link).collect())
    }

    /// 删除链接及其访问记录、会话、异常记录
    ///
    /// 返回 false 表示链接不存在或不属于该所有者
    pub async fn delete_link(&self, owner: &str, code: &str) -> Result<bool> {
        let db = &self.db;
        let deleted = retry::with_retry(
            &format!("delete_link({})", code),
            self.retry_config,
            || delete_link_txn(db, owner, code),
        )
        .await
        .map_err(|e| GeoTraceError::database_operation(format!("删除跟踪链接失败: {}", e)))?;

        if deleted {
            info!("Tracking link deleted: {} (owner: {})", code, owner);
        }
        Ok(deleted)
    }
}

async fn delete_link_txn(
    db: &DatabaseConnection,
    owner: &str,
    code: &str,
) -> std::result::Result<bool, DbErr> {
    let txn = db.begin().await?;

    let deleted = tracking_link::Entity::delete_many()
        .filter(tracking_link::Column::Code.eq(code))
        .filter(tracking_link::Column::Owner.eq(owner))
        .exec(&txn)
        .await?;

    if deleted.rows_affected == 0 {
        txn.rollback().await?;
        return Ok(false);
    }

    anomaly_detection::Entity::delete_many()
        .filter(anomaly_detection::Column::LinkCode.eq(code))
        .exec(&txn)
        .await?;
    visitor_log::Entity::delete_many()
        .filter(visitor_log::Column::LinkCode.eq(code))
        .exec(&txn)
        .await?;
    visitor_session::Entity::delete_many()
        .filter(visitor_session::Column::LinkCode.eq(code))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(true)
}
