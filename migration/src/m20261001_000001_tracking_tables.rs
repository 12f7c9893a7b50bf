//! Tracking 相关表迁移
//!
//! 创建以下表：
//! - tracking_links: 短码 → 目标 URL
//! - visitor_sessions: 访客会话
//! - visitor_logs: 每次访问的明细（含地理位置与威胁评分）
//! - anomaly_detections: 异常检测结果

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 tracking_links 表
        manager
            .create_table(
                Table::create()
                    .table(TrackingLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingLinks::Code)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TrackingLinks::Owner).string_len(128).not_null())
                    .col(ColumnDef::new(TrackingLinks::TargetUrl).text().not_null())
                    .col(ColumnDef::new(TrackingLinks::Label).string_len(255).null())
                    .col(
                        ColumnDef::new(TrackingLinks::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(TrackingLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingLinks::VisitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracking_links_owner")
                    .table(TrackingLinks::Table)
                    .col(TrackingLinks::Owner)
                    .to_owned(),
            )
            .await?;

        // 创建 visitor_sessions 表
        manager
            .create_table(
                Table::create()
                    .table(VisitorSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorSessions::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VisitorSessions::LinkCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitorSessions::FirstSeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitorSessions::LastSeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitorSessions::VisitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(VisitorSessions::FirstIp).string_len(45).null())
                    .to_owned(),
            )
            .await?;

        // 创建 visitor_logs 表
        manager
            .create_table(
                Table::create()
                    .table(VisitorLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VisitorLogs::LinkCode).string_len(64).not_null())
                    .col(ColumnDef::new(VisitorLogs::SessionId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(VisitorLogs::VisitedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VisitorLogs::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(VisitorLogs::UserAgent).text().null())
                    .col(ColumnDef::new(VisitorLogs::Referrer).text().null())
                    .col(ColumnDef::new(VisitorLogs::Country).string_len(100).null())
                    .col(ColumnDef::new(VisitorLogs::CountryCode).string_len(2).null())
                    .col(ColumnDef::new(VisitorLogs::Region).string_len(100).null())
                    .col(ColumnDef::new(VisitorLogs::City).string_len(100).null())
                    .col(ColumnDef::new(VisitorLogs::Isp).string_len(255).null())
                    .col(ColumnDef::new(VisitorLogs::AsName).string_len(255).null())
                    .col(ColumnDef::new(VisitorLogs::Latitude).double().null())
                    .col(ColumnDef::new(VisitorLogs::Longitude).double().null())
                    .col(
                        ColumnDef::new(VisitorLogs::ThreatScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VisitorLogs::ThreatLevel)
                            .string_len(16)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 复合索引：按 session 查找上一条定位记录
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visitor_logs_session_time")
                    .table(VisitorLogs::Table)
                    .col(VisitorLogs::SessionId)
                    .col(VisitorLogs::VisitedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visitor_logs_link_time")
                    .table(VisitorLogs::Table)
                    .col(VisitorLogs::LinkCode)
                    .col(VisitorLogs::VisitedAt)
                    .to_owned(),
            )
            .await?;

        // 创建 anomaly_detections 表
        manager
            .create_table(
                Table::create()
                    .table(AnomalyDetections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnomalyDetections::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::LinkCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::SessionId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::VisitorLogId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::PreviousLogId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::AnomalyType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::DistanceKm)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::ElapsedSecs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnomalyDetections::SpeedKmh).double().null())
                    .col(
                        ColumnDef::new(AnomalyDetections::Severity)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnomalyDetections::DetectedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_anomaly_detections_link")
                    .table(AnomalyDetections::Table)
                    .col(AnomalyDetections::LinkCode)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnomalyDetections::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisitorLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisitorSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrackingLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TrackingLinks {
    #[sea_orm(iden = "tracking_links")]
    Table,
    Code,
    Owner,
    TargetUrl,
    Label,
    Enabled,
    CreatedAt,
    VisitCount,
}

#[derive(DeriveIden)]
enum VisitorSessions {
    #[sea_orm(iden = "visitor_sessions")]
    Table,
    Id,
    LinkCode,
    FirstSeenAt,
    LastSeenAt,
    VisitCount,
    FirstIp,
}

#[derive(DeriveIden)]
enum VisitorLogs {
    #[sea_orm(iden = "visitor_logs")]
    Table,
    Id,
    LinkCode,
    SessionId,
    VisitedAt,
    IpAddress,
    UserAgent,
    Referrer,
    Country,
    CountryCode,
    Region,
    City,
    Isp,
    AsName,
    Latitude,
    Longitude,
    ThreatScore,
    ThreatLevel,
}

#[derive(DeriveIden)]
enum AnomalyDetections {
    #[sea_orm(iden = "anomaly_detections")]
    Table,
    Id,
    LinkCode,
    SessionId,
    VisitorLogId,
    PreviousLogId,
    AnomalyType,
    DistanceKm,
    ElapsedSecs,
    SpeedKmh,
    Severity,
    DetectedAt,
}
