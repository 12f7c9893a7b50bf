//! Anomaly detection entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "anomaly_detections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub link_code: String,
    pub session_id: String,
    pub visitor_log_id: i64,
    pub previous_log_id: i64,
    pub anomaly_type: String,
    pub distance_km: f64,
    pub elapsed_secs: i64,
    /// None 表示两次访问时间戳相同（速度无穷大）
    pub speed_kmh: Option<f64>,
    pub severity: String,
    pub detected_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
