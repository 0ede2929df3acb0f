pub mod url_validator;

pub use url_validator::validate_url;

/// 短码字符集
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 用户自定义短码的最大长度
pub const MAX_CUSTOM_CODE_LEN: usize = 64;

pub fn generate_random_code(length: usize) -> String {
    std::iter::repeat_with(|| CODE_CHARSET[rand::random_range(0..CODE_CHARSET.len())] as char)
        .take(length)
        .collect()
}

/// User-chosen codes: `[A-Za-z0-9_-]{1,64}`
pub fn is_valid_custom_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CUSTOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_use_charset() {
        let code = generate_random_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
        assert!(is_valid_custom_code(&code));
    }

    #[test]
    fn test_custom_code_rules() {
        assert!(is_valid_custom_code("my-link_01"));
        assert!(is_valid_custom_code(&"a".repeat(64)));
        assert!(!is_valid_custom_code(&"a".repeat(65)));
        assert!(!is_valid_custom_code(""));
        assert!(!is_valid_custom_code("has space"));
        assert!(!is_valid_custom_code("slash/path"));
        assert!(!is_valid_custom_code("ünïcode"));
    }
}
