//! `/api/v1/analyses`

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::helpers::api_result;
use crate::api::middleware::Owner;
use crate::services::AnalysisService;

#[derive(Debug, Clone, Deserialize)]
pub struct PostAnalysis {
    #[serde(alias = "addresses")]
    pub ips: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

pub async fn create_analysis(
    owner: Owner,
    body: web::Json<PostAnalysis>,
    service: web::Data<Arc<AnalysisService>>,
) -> HttpResponse {
    let PostAnalysis { ips, label } = body.into_inner();
    api_result(service.analyze(owner.as_str(), label, &ips).await)
}

pub async fn list_analyses(
    owner: Owner,
    service: web::Data<Arc<AnalysisService>>,
) -> HttpResponse {
    api_result(service.list_sessions(owner.as_str()).await)
}

pub async fn get_analysis(
    owner: Owner,
    path: web::Path<String>,
    service: web::Data<Arc<AnalysisService>>,
) -> HttpResponse {
    api_result(service.get_session(owner.as_str(), &path.into_inner()).await)
}
