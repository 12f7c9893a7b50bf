//! Service layer for business logic
//!
//! HTTP API 与 CLI 共用的业务逻辑

pub mod alerts;
mod analysis_service;
pub mod anomaly;
pub mod geoip;
pub mod threat;
mod tracking_service;

pub use alerts::{Alert, AlertSink, MemoryAlertSink, TracingAlertSink};
pub use analysis_service::*;
pub use geoip::{GeoIpLookup, GeoIpProvider, GeoRecord};
pub use threat::{ThreatAssessment, ThreatLevel, ThreatScorer};
pub use tracking_service::*;
