//! GeoTrace - IP intelligence and visitor tracking service
//!
//! # Architecture
//! - `services`: batch geolocation, threat scoring, anomaly detection, alerts
//! - `storage`: sea-orm persistence (links, sessions, visits, analyses)
//! - `api`: HTTP handlers and middleware
//! - `cli`: command-line interface
//! - `config`: static configuration (TOML + environment)
//! - `runtime`: server startup and shutdown
//! - `system`: logging setup
//!
//! `api` 与 `runtime` 需要 `server` feature，CLI 子命令需要 `cli` feature

#[cfg(feature = "server")]
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
#[cfg(feature = "server")]
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
