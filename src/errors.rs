use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum GeoTraceError {
    Config(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Serialization(String),
    GeoIpLookup(String),
    Unauthorized(String),
}

impl GeoTraceError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            GeoTraceError::Config(_) => "E001",
            GeoTraceError::DatabaseConfig(_) => "E002",
            GeoTraceError::DatabaseConnection(_) => "E003",
            GeoTraceError::DatabaseOperation(_) => "E004",
            GeoTraceError::FileOperation(_) => "E005",
            GeoTraceError::Validation(_) => "E006",
            GeoTraceError::NotFound(_) => "E007",
            GeoTraceError::Conflict(_) => "E008",
            GeoTraceError::Serialization(_) => "E009",
            GeoTraceError::GeoIpLookup(_) => "E010",
            GeoTraceError::Unauthorized(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            GeoTraceError::Config(_) => "Configuration Error",
            GeoTraceError::DatabaseConfig(_) => "Database Configuration Error",
            GeoTraceError::DatabaseConnection(_) => "Database Connection Error",
            GeoTraceError::DatabaseOperation(_) => "Database Operation Error",
            GeoTraceError::FileOperation(_) => "File Operation Error",
            GeoTraceError::Validation(_) => "Validation Error",
            GeoTraceError::NotFound(_) => "Resource Not Found",
            GeoTraceError::Conflict(_) => "Resource Conflict",
            GeoTraceError::Serialization(_) => "Serialization Error",
            GeoTraceError::GeoIpLookup(_) => "GeoIP Lookup Error",
            GeoTraceError::Unauthorized(_) => "Unauthorized",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            GeoTraceError::Config(msg)
            | GeoTraceError::DatabaseConfig(msg)
            | GeoTraceError::DatabaseConnection(msg)
            | GeoTraceError::DatabaseOperation(msg)
            | GeoTraceError::FileOperation(msg)
            | GeoTraceError::Validation(msg)
            | GeoTraceError::NotFound(msg)
            | GeoTraceError::Conflict(msg)
            | GeoTraceError::Serialization(msg)
            | GeoTraceError::GeoIpLookup(msg)
            | GeoTraceError::Unauthorized(msg) => msg,
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            GeoTraceError::Validation(_) => StatusCode::BAD_REQUEST,
            GeoTraceError::NotFound(_) => StatusCode::NOT_FOUND,
            GeoTraceError::Conflict(_) => StatusCode::CONFLICT,
            GeoTraceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GeoTraceError::GeoIpLookup(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 对外暴露的消息
    ///
    /// 内部错误只返回通用描述，细节写日志
    pub fn public_message(&self) -> &str {
        match self {
            GeoTraceError::Validation(msg)
            | GeoTraceError::NotFound(msg)
            | GeoTraceError::Conflict(msg)
            | GeoTraceError::Unauthorized(msg) => msg,
            GeoTraceError::GeoIpLookup(_) => "Geolocation service unavailable, try again later",
            _ => "Internal server error",
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for GeoTraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for GeoTraceError {}

// 便捷的构造函数
impl GeoTraceError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::Config(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::Conflict(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::Serialization(msg.into())
    }

    pub fn geoip_lookup<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::GeoIpLookup(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        GeoTraceError::Unauthorized(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for GeoTraceError {
    fn from(err: sea_orm::DbErr) -> Self {
        GeoTraceError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for GeoTraceError {
    fn from(err: std::io::Error) -> Self {
        GeoTraceError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for GeoTraceError {
    fn from(err: serde_json::Error) -> Self {
        GeoTraceError::Serialization(err.to_string())
    }
}

impl From<ureq::Error> for GeoTraceError {
    fn from(err: ureq::Error) -> Self {
        GeoTraceError::GeoIpLookup(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoTraceError>;
