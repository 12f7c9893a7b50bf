//! Server mode
//!
//! Wires the startup components into actix-web and runs until Ctrl+C.

use std::time::Duration;

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{error, warn};

use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::{AppStartTime, configure_routes};
use crate::config::StaticConfig;
use crate::runtime::{shutdown, startup};

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let ctx = startup::prepare_server_startup(config)
        .await
        .inspect_err(|e| error!("Server startup failed: {}", e))?;

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let tokens = config.api.tokens.clone();
    let db_for_shutdown = ctx.storage.get_db().clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(Compress::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .app_data(web::Data::new(ctx.storage.clone()))
            .app_data(web::Data::new(ctx.geoip.clone()))
            .app_data(web::Data::new(ctx.tracking_service.clone()))
            .app_data(web::Data::new(ctx.analysis_service.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(web::PayloadConfig::new(1024 * 1024))
            .configure(|cfg| configure_routes(cfg, tokens.clone()))
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = shutdown::listen_for_shutdown(db_for_shutdown) => {
            warn!("Graceful shutdown: database connection released");
        }
    }

    Ok(())
}
