use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tracking_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub owner: String,
    #[sea_orm(column_type = "Text")]
    pub target_url: String,
    pub label: Option<String>,
    #[sea_orm(default_value = true)]
    pub enabled: bool,
    pub created_at: DateTimeUtc,
    pub visit_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
