//! `/api/v1/links`

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::helpers::api_result;
use crate::api::middleware::Owner;
use crate::services::{CreateLinkRequest, TrackingService};

#[derive(Debug, Clone, Deserialize)]
pub struct PostLink {
    #[serde(alias = "targetUrl", alias = "target")]
    pub target_url: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

pub async fn create_link(
    owner: Owner,
    body: web::Json<PostLink>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    let PostLink {
        target_url,
        code,
        label,
    } = body.into_inner();
    let req = CreateLinkRequest {
        target_url,
        code,
        label,
    };
    api_result(service.create_link(owner.as_str(), req).await)
}

pub async fn list_links(owner: Owner, service: web::Data<Arc<TrackingService>>) -> HttpResponse {
    api_result(service.list_links(owner.as_str()).await)
}

pub async fn get_link(
    owner: Owner,
    path: web::Path<String>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    api_result(service.get_link(owner.as_str(), &path.into_inner()).await)
}

pub async fn delete_link(
    owner: Owner,
    path: web::Path<String>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    let code = path.into_inner();
    api_result(
        service
            .delete_link(owner.as_str(), &code)
            .await
            .map(|()| serde_json::json!({ "deleted": code })),
    )
}

pub async fn list_visits(
    owner: Owner,
    path: web::Path<String>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    api_result(service.list_visits(owner.as_str(), &path.into_inner()).await)
}

pub async fn list_anomalies(
    owner: Owner,
    path: web::Path<String>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    api_result(service.list_anomalies(owner.as_str(), &path.into_inner()).await)
}
