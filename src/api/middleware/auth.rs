//! API 身份识别
//!
//! `Authorization: Bearer <token>`，token 在配置的 token → owner 映射中查找，
//! 命中后把 owner 写入 request extensions。映射为空时整个 API 关闭（404）。

use std::collections::HashMap;
use std::future::{Ready as StdReady, ready as std_ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
    body::EitherBody,
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::header::{AUTHORIZATION, CONTENT_TYPE},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{debug, info, warn};

use crate::api::services::error_code::ErrorCode;
use crate::api::services::helpers::ApiResponse;

/// 调用方身份
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for Owner {
    type Error = Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        std_ready(
            req.extensions()
                .get::<Owner>()
                .cloned()
                .ok_or_else(|| actix_web::error::ErrorUnauthorized("missing caller identity")),
        )
    }
}

#[derive(Clone)]
pub struct ApiAuth {
    tokens: Arc<HashMap<String, String>>,
}

impl ApiAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        let tokens: HashMap<String, String> = tokens
            .into_iter()
            .filter(|(token, owner)| !token.trim().is_empty() && !owner.trim().is_empty())
            .collect();
        if tokens.is_empty() {
            warn!("No API tokens configured - /api endpoints disabled");
        }
        Self {
            tokens: Arc::new(tokens),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiAuthMiddleware {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct ApiAuthMiddleware<S> {
    service: Rc<S>,
    tokens: Arc<HashMap<String, String>>,
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S, B> Service<ServiceRequest> for ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let tokens = self.tokens.clone();

        Box::pin(async move {
            if tokens.is_empty() {
                return Ok(req.into_response(
                    HttpResponse::NotFound()
                        .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                        .body("Not Found")
                        .map_into_right_body(),
                ));
            }

            let owner = bearer_token(&req).and_then(|token| tokens.get(token)).cloned();

            let Some(owner) = owner else {
                info!("API authentication failed: invalid or missing bearer token");
                return Ok(req.into_response(
                    HttpResponse::Unauthorized()
                        .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                        .json(ApiResponse::<()> {
                            code: ErrorCode::Unauthorized as i32,
                            message: "Unauthorized: invalid or missing token".to_string(),
                            data: None,
                        })
                        .map_into_right_body(),
                ));
            };

            debug!("API request authenticated as {}", owner);
            req.extensions_mut().insert(Owner(owner));
            Ok(srv.call(req).await?.map_into_left_body())
        })
    }
}
