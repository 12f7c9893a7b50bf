//! GeoIP 服务模块
//!
//! 通过第三方批量 API（ip-api.com `/batch` 兼容格式）查询 IP 地理位置、ISP 与 ASN

mod disabled;
mod external_api;
mod provider;
mod record;

pub use disabled::DisabledProvider;
pub use external_api::ExternalApiProvider;
pub use provider::{GeoIpLookup, GeoIpProvider};
pub use record::{BatchQuery, GeoRecord, GeoStatus};
