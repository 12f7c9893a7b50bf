//! 访问记录、访客会话与异常检测
//!
//! 一次访问在单个事务中完成：会话续期或新建、写访问记录、计数、位置突变检测。
//! 事务冲突时整体重试。

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, ExprTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::{debug, info};

use super::converters::{model_to_anomaly, model_to_session, model_to_visit};
use super::{SeaOrmStorage, retry};
use crate::config::AnomalyConfig;
use crate::errors::{GeoTraceError, Result};
use crate::services::anomaly::{GeoPoint, RAPID_GEO_CHANGE, detect_rapid_geo_change};
use crate::storage::models::{AnomalyRecord, NewVisit, RecordedVisit, VisitorLog, VisitorSession};

use migration::entities::{anomaly_detection, tracking_link, visitor_log, visitor_session};

/// 会话是否还能续用：同一链接，且最后活跃时间在空闲上限内
pub fn session_is_reusable(
    session: &VisitorSession,
    link_code: &str,
    now: DateTime<Utc>,
    idle_secs: i64,
) -> bool {
    session.link_code == link_code && (now - session.last_seen_at).num_seconds() <= idle_secs
}

impl SeaOrmStorage {
    /// 写入一次访问
    ///
    /// 整个事务在 `with_retry` 内重建，SQLite WAL 下并发写同一会话时的快照冲突会被重放
    pub async fn record_visit(
        &self,
        visit: NewVisit,
        session_idle_secs: i64,
        anomaly_rules: &AnomalyConfig,
    ) -> Result<RecordedVisit> {
        let db = &self.db;
        let visit = &visit;
        let recorded = retry::with_retry(
            &format!("record_visit({})", visit.link_code),
            self.retry_config,
            || record_visit_txn(db, visit, session_idle_secs, anomaly_rules),
        )
        .await
        .map_err(|e| GeoTraceError::database_operation(format!("写入访问记录失败: {}", e)))?;

        debug!(
            "Visit recorded: link={} session={} new_session={}",
            recorded.log.link_code, recorded.log.session_id, recorded.new_session
        );
        Ok(recorded)
    }

    pub async fn get_visitor_session(&self, id: &str) -> Result<Option<VisitorSession>> {
        let db = &self.db;
        let model = retry::with_retry("get_visitor_session", self.retry_config, || async {
            visitor_session::Entity::find_by_id(id.to_string()).one(db).await
        })
        .await?;
        Ok(model.map(model_to_session))
    }

    /// 链接的访问记录，最新在前
    pub async fn list_visits(&self, link_code: &str, limit: u64) -> Result<Vec<VisitorLog>> {
        let db = &self.db;
        let models = retry::with_retry("list_visits", self.retry_config, || async {
            visitor_log::Entity::find()
                .filter(visitor_log::Column::LinkCode.eq(link_code))
                .order_by_desc(visitor_log::Column::VisitedAt)
                .order_by_desc(visitor_log::Column::Id)
                .limit(limit)
                .all(db)
                .await
        })
        .await?;
        Ok(models.into_iter().map(model_to_visit).collect())
    }

    /// 链接的异常记录，最新在前
    pub async fn list_anomalies(&self, link_code: &str, limit: u64) -> Result<Vec<AnomalyRecord>> {
        let db = &self.db;
        let models = retry::with_retry("list_anomalies", self.retry_config, || async {
            anomaly_detection::Entity::find()
                .filter(anomaly_detection::Column::LinkCode.eq(link_code))
                .order_by_desc(anomaly_detection::Column::DetectedAt)
                .order_by_desc(anomaly_detection::Column::Id)
                .limit(limit)
                .all(db)
                .await
        })
        .await?;
        Ok(models.into_iter().map(model_to_anomaly).collect())
    }
}

/// 单次事务：会话、访问记录、计数、位置突变
async fn record_visit_txn(
    db: &DatabaseConnection,
    visit: &NewVisit,
    session_idle_secs: i64,
    anomaly_rules: &AnomalyConfig,
) -> std::result::Result<RecordedVisit, DbErr> {
    let txn = db.begin().await?;

    let (session, new_session) = resolve_session(&txn, visit, session_idle_secs).await?;

    let previous = if anomaly_rules.enabled && visit.location.coordinates().is_some() {
        latest_located_visit(&txn, &session.id).await?
    } else {
        None
    };

    let log = visitor_log::ActiveModel {
        link_code: Set(visit.link_code.clone()),
        session_id: Set(session.id.clone()),
        visited_at: Set(visit.visited_at),
        ip_address: Set(visit.ip_address.clone()),
        user_agent: Set(visit.user_agent.clone()),
        referrer: Set(visit.referrer.clone()),
        country: Set(visit.location.country.clone()),
        country_code: Set(visit.location.country_code.clone()),
        region: Set(visit.location.region.clone()),
        city: Set(visit.location.city.clone()),
        isp: Set(visit.location.isp.clone()),
        as_name: Set(visit.location.as_name.clone()),
        latitude: Set(visit.location.latitude),
        longitude: Set(visit.location.longitude),
        threat_score: Set(visit.threat_score as i32),
        threat_level: Set(visit.threat_level.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    tracking_link::Entity::update_many()
        .col_expr(
            tracking_link::Column::VisitCount,
            Expr::col(tracking_link::Column::VisitCount).add(1i64),
        )
        .filter(tracking_link::Column::Code.eq(&visit.link_code))
        .exec(&txn)
        .await?;

    let anomaly = match (previous, visit.location.coordinates()) {
        (Some(prev), Some((lat, lon))) => {
            detect_and_store(&txn, anomaly_rules, &prev, &log, (lat, lon)).await?
        }
        _ => None,
    };

    txn.commit().await?;

    Ok(RecordedVisit {
        log: model_to_visit(log),
        session,
        new_session,
        anomaly,
    })
}

/// 续用 cookie 中的会话，或新建一个
async fn resolve_session(
    txn: &DatabaseTransaction,
    visit: &NewVisit,
    idle_secs: i64,
) -> std::result::Result<(VisitorSession, bool), DbErr> {
    if let Some(id) = visit.session_id.as_deref() {
        let existing = visitor_session::Entity::find_by_id(id.to_string())
            .one(txn)
            .await?;

        if let Some(model) = existing {
            let current = model_to_session(model.clone());
            if session_is_reusable(&current, &visit.link_code, visit.visited_at, idle_secs) {
                let mut active: visitor_session::ActiveModel = model.into();
                // 乱序到达的请求不回拨 last_seen_at
                active.last_seen_at = Set(Ord::max(current.last_seen_at, visit.visited_at));
                active.visit_count = Set(current.visit_count as i64 + 1);
                let updated = active.update(txn).await?;
                return Ok((model_to_session(updated), false));
            }
        }
    }

    let model = visitor_session::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        link_code: Set(visit.link_code.clone()),
        first_seen_at: Set(visit.visited_at),
        last_seen_at: Set(visit.visited_at),
        visit_count: Set(1),
        first_ip: Set(visit.ip_address.clone()),
    }
    .insert(txn)
    .await?;

    Ok((model_to_session(model), true))
}

/// 会话中最近一次带坐标的访问
async fn latest_located_visit(
    txn: &DatabaseTransaction,
    session_id: &str,
) -> std::result::Result<Option<visitor_log::Model>, DbErr> {
    visitor_log::Entity::find()
        .filter(visitor_log::Column::SessionId.eq(session_id))
        .filter(visitor_log::Column::Latitude.is_not_null())
        .filter(visitor_log::Column::Longitude.is_not_null())
        .order_by_desc(visitor_log::Column::VisitedAt)
        .order_by_desc(visitor_log::Column::Id)
        .one(txn)
        .await
}

async fn detect_and_store(
    txn: &DatabaseTransaction,
    rules: &AnomalyConfig,
    previous: &visitor_log::Model,
    current: &visitor_log::Model,
    (lat, lon): (f64, f64),
) -> std::result::Result<Option<AnomalyRecord>, DbErr> {
    let (Some(prev_lat), Some(prev_lon)) = (previous.latitude, previous.longitude) else {
        return Ok(None);
    };

    let prev_point = GeoPoint {
        lat: prev_lat,
        lon: prev_lon,
        at: previous.visited_at,
    };
    let cur_point = GeoPoint {
        lat,
        lon,
        at: current.visited_at,
    };

    let Some(found) = detect_rapid_geo_change(&prev_point, &cur_point, rules) else {
        return Ok(None);
    };

    let model = anomaly_detection::ActiveModel {
        link_code: Set(current.link_code.clone()),
        session_id: Set(current.session_id.clone()),
        visitor_log_id: Set(current.id),
        previous_log_id: Set(previous.id),
        anomaly_type: Set(RAPID_GEO_CHANGE.to_string()),
        distance_km: Set(found.distance_km),
        elapsed_secs: Set(found.elapsed_secs),
        speed_kmh: Set(found.speed_kmh),
        severity: Set(found.severity.as_ref().to_string()),
        detected_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    info!(
        "Rapid geo change: session={} {:.0} km in {} s",
        current.session_id, found.distance_km, found.elapsed_secs
    );

    Ok(Some(model_to_anomaly(model)))
}
