/// Show at most the first 8 characters of an API key.
pub fn redact_api_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_api_key() {
        assert_eq!(redact_api_key("sk-ant-api03-abcdefgh"), "sk-ant-a...");
        assert_eq!(redact_api_key("abc"), "abc...");
    }
}
