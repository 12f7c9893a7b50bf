pub mod analysis_result;
pub mod analysis_session;
pub mod anomaly_detection;
pub mod tracking_link;
pub mod visitor_log;
pub mod visitor_session;

pub use analysis_result::Entity as AnalysisResultEntity;
pub use analysis_session::Entity as AnalysisSessionEntity;
pub use anomaly_detection::Entity as AnomalyDetectionEntity;
pub use tracking_link::Entity as TrackingLinkEntity;
pub use visitor_log::Entity as VisitorLogEntity;
pub use visitor_session::Entity as VisitorSessionEntity;
