pub mod ip;
pub mod url_validator;

pub use url_validator::{UrlValidationError, validate_url};

use crate::errors::{GeoTraceError, Result};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 短码最大长度
pub const MAX_CODE_LENGTH: usize = 64;

/// 标签最大字符数（与 label 列 VARCHAR(255) 一致）
pub const MAX_LABEL_LENGTH: usize = 255;

/// 去掉首尾空白，空标签视为未设置；超长返回 Validation 错误
pub fn normalize_label(label: Option<String>) -> Result<Option<String>> {
    let Some(label) = label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let chars = label.chars().count();
    if chars > MAX_LABEL_LENGTH {
        return Err(GeoTraceError::validation(format!(
            "Label is too long ({} characters, max {})",
            chars, MAX_LABEL_LENGTH
        )));
    }
    Ok(Some(label))
}

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| CODE_CHARSET[rand::random_range(0..CODE_CHARSET.len())] as char)
        .take(length)
        .collect()
}

/// 短码只允许字母、数字、`-`、`_`
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_code_length_and_charset() {
        let code = generate_random_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
    }

    #[test]
    fn test_is_valid_short_code() {
        assert!(is_valid_short_code("abc-DEF_123"));
        assert!(!is_valid_short_code(""));
        assert!(!is_valid_short_code("with space"));
        assert!(!is_valid_short_code("../etc"));
        assert!(!is_valid_short_code(&"a".repeat(MAX_CODE_LENGTH + 1)));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(None).unwrap(), None);
        assert_eq!(normalize_label(Some("   ".into())).unwrap(), None);
        assert_eq!(
            normalize_label(Some("  spring promo ".into())).unwrap(),
            Some("spring promo".to_string())
        );

        // 按字符计数，多字节字符不提前超限
        let wide = "é".repeat(MAX_LABEL_LENGTH);
        assert_eq!(normalize_label(Some(wide.clone())).unwrap(), Some(wide));

        let err = normalize_label(Some("x".repeat(MAX_LABEL_LENGTH + 1))).unwrap_err();
        assert!(matches!(err, GeoTraceError::Validation(_)));
    }
}
