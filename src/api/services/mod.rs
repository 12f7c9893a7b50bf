pub mod analysis;
pub mod error_code;
pub mod health;
pub mod helpers;
pub mod links;
pub mod redirect;

use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::{error, web};

use crate::api::middleware::ApiAuth;
use error_code::ErrorCode;
use helpers::error_response;

pub use health::{AppStartTime, HealthService, health_routes};

/// JSON 请求体上限
const JSON_BODY_LIMIT: usize = 256 * 1024;

/// JSON 解析失败时返回统一信封
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            let message = format!("Invalid request body: {}", err);
            let response = error_response(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, &message);
            error::InternalError::from_response(err, response).into()
        })
}

/// 注册全部路由：`/api/v1`（需要 bearer token）、`/t/{code}`、`/health`
pub fn configure_routes(cfg: &mut web::ServiceConfig, tokens: HashMap<String, String>) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(ApiAuth::new(tokens))
            .app_data(json_config())
            .service(
                web::resource("/analyses")
                    .route(web::post().to(analysis::create_analysis))
                    .route(web::get().to(analysis::list_analyses)),
            )
            .route("/analyses/{id}", web::get().to(analysis::get_analysis))
            .service(
                web::resource("/links")
                    .route(web::post().to(links::create_link))
                    .route(web::get().to(links::list_links)),
            )
            .service(
                web::resource("/links/{code}")
                    .route(web::get().to(links::get_link))
                    .route(web::delete().to(links::delete_link)),
            )
            .route("/links/{code}/visits", web::get().to(links::list_visits))
            .route(
                "/links/{code}/anomalies",
                web::get().to(links::list_anomalies),
            ),
    )
    .service(health_routes())
    .service(tracking_routes());
}

/// 公开的跟踪跳转
pub fn tracking_routes() -> actix_web::Scope {
    web::scope("/t").route("/{code}", web::get().to(redirect::track_redirect))
}
