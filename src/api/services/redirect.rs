//! `GET /t/{code}`：记录访问并 307 跳转

use std::sync::Arc;

use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::http::StatusCode;
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERER, USER_AGENT};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use tracing::{debug, error, trace};

use crate::errors::GeoTraceError;
use crate::services::{TrackingService, VisitContext};
use crate::utils::ip::extract_client_ip;
use crate::utils::is_valid_short_code;

/// 会话 cookie 只在跟踪路径下发送
const SESSION_COOKIE_PATH: &str = "/t";

fn header_string(req: &HttpRequest, name: actix_web::http::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn plain_response(status: StatusCode, body: &'static str) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
        .insert_header((CACHE_CONTROL, "no-store"))
        .body(body)
}

pub async fn track_redirect(
    req: HttpRequest,
    path: web::Path<String>,
    service: web::Data<Arc<TrackingService>>,
) -> HttpResponse {
    let code = path.into_inner();
    if !is_valid_short_code(&code) {
        trace!("Invalid tracking code rejected: {}", code);
        return plain_response(StatusCode::NOT_FOUND, "Not Found");
    }

    let config = service.tracking_config();
    let ctx = VisitContext {
        ip: extract_client_ip(&req, &config.trusted_proxies),
        user_agent: header_string(&req, USER_AGENT),
        referrer: header_string(&req, REFERER),
        session_id: req
            .cookie(&config.session_cookie)
            .map(|c| c.value().to_string()),
        at: Utc::now(),
    };

    match service.record_visit(&code, ctx).await {
        Ok(outcome) => {
            let mut cookie = Cookie::new(config.session_cookie.clone(), outcome.session_id);
            cookie.set_path(SESSION_COOKIE_PATH);
            cookie.set_http_only(true);
            cookie.set_same_site(SameSite::Lax);
            cookie.set_max_age(CookieDuration::seconds(config.session_idle_secs.max(0)));

            HttpResponse::TemporaryRedirect()
                .insert_header((LOCATION, outcome.target_url))
                .insert_header((CACHE_CONTROL, "no-store"))
                .cookie(cookie)
                .finish()
        }
        Err(GeoTraceError::NotFound(_)) => {
            debug!("Tracking link not found: {}", code);
            plain_response(StatusCode::NOT_FOUND, "Not Found")
        }
        Err(e) => {
            error!("Failed to record visit for {}: {}", code, e);
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
