//! 分析会话表迁移
//!
//! analysis_sessions 记录每次提交，analysis_results 记录每个 IP 的结果

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisSessions::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalysisSessions::Owner)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisSessions::Label).string_len(255).null())
                    .col(
                        ColumnDef::new(AnalysisSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisSessions::TotalIps).integer().not_null())
                    .col(ColumnDef::new(AnalysisSessions::HighCount).integer().not_null())
                    .col(ColumnDef::new(AnalysisSessions::MediumCount).integer().not_null())
                    .col(ColumnDef::new(AnalysisSessions::LowCount).integer().not_null())
                    .col(ColumnDef::new(AnalysisSessions::FailedCount).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_analysis_sessions_owner_time")
                    .table(AnalysisSessions::Table)
                    .col(AnalysisSessions::Owner)
                    .col(AnalysisSessions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalysisResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisResults::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::SessionId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisResults::Position).integer().not_null())
                    .col(
                        ColumnDef::new(AnalysisResults::IpAddress)
                            .string_len(45)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisResults::Status).string_len(16).not_null())
                    .col(ColumnDef::new(AnalysisResults::Message).string_len(255).null())
                    .col(ColumnDef::new(AnalysisResults::Country).string_len(100).null())
                    .col(ColumnDef::new(AnalysisResults::CountryCode).string_len(2).null())
                    .col(ColumnDef::new(AnalysisResults::Region).string_len(100).null())
                    .col(ColumnDef::new(AnalysisResults::City).string_len(100).null())
                    .col(ColumnDef::new(AnalysisResults::Latitude).double().null())
                    .col(ColumnDef::new(AnalysisResults::Longitude).double().null())
                    .col(ColumnDef::new(AnalysisResults::Timezone).string_len(64).null())
                    .col(ColumnDef::new(AnalysisResults::Isp).string_len(255).null())
                    .col(ColumnDef::new(AnalysisResults::Org).string_len(255).null())
                    .col(ColumnDef::new(AnalysisResults::AsNumber).string_len(255).null())
                    .col(ColumnDef::new(AnalysisResults::AsName).string_len(255).null())
                    .col(
                        ColumnDef::new(AnalysisResults::ThreatScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AnalysisResults::ThreatLevel)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisResults::Checks).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_analysis_results_session")
                    .table(AnalysisResults::Table)
                    .col(AnalysisResults::SessionId)
                    .col(AnalysisResults::Position)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalysisSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AnalysisSessions {
    #[sea_orm(iden = "analysis_sessions")]
    Table,
    Id,
    Owner,
    Label,
    CreatedAt,
    TotalIps,
    HighCount,
    MediumCount,
    LowCount,
    FailedCount,
}

#[derive(DeriveIden)]
enum AnalysisResults {
    #[sea_orm(iden = "analysis_results")]
    Table,
    Id,
    SessionId,
    Position,
    IpAddress,
    Status,
    Message,
    Country,
    CountryCode,
    Region,
    City,
    Latitude,
    Longitude,
    Timezone,
    Isp,
    Org,
    AsNumber,
    AsName,
    ThreatScore,
    ThreatLevel,
    Checks,
}
