use crate::error::{MigrationError, Result};

pub fn load_env(key: &str) -> String {
    let result = std::env::var(key);
    result.unwrap_or_default()
}

pub fn load_required(key: &str) -> Result<String> {
    let value = load_env(key);
    if value.trim().is_empty() {
        return Err(MigrationError::InvalidConfig(format!("{key} must be set")));
    }
    Ok(value.trim().to_string())
}

pub fn load_optional(key: &str) -> Option<String> {
    let value = load_env(key);
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn load_flag(key: &str) -> bool {
    parse_flag(&load_env(key))
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        for truthy in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(parse_flag(truthy), "{truthy}");
        }
        for falsy in ["", "0", "false", "no", "off", "maybe"] {
            assert!(!parse_flag(falsy), "{falsy}");
        }
    }
}
