//! Ambient configuration: server/client config structs and the access-key
//! resolver, grounded on `base.py`'s `_find_access_key`/`_verify_access_key`.

use std::env;
use std::time::Duration;

/// Where to look for an access key, checked in this exact order:
/// direct argument, `POE_ACCESS_KEY`, the deprecated `api_key` argument,
/// then `POE_API_KEY`. The latter two log a deprecation warning when used.
pub fn resolve_access_key(access_key: Option<&str>, api_key: Option<&str>) -> Option<String> {
    if let Some(key) = access_key.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    if let Ok(key) = env::var("POE_ACCESS_KEY") {
        if !key.is_empty() {
            return Some(key);
        }
    }
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        log::warn!("the `api_key` argument is deprecated, use `access_key` instead");
        return Some(key.to_string());
    }
    if let Ok(key) = env::var("POE_API_KEY") {
        if !key.is_empty() {
            log::warn!("the POE_API_KEY environment variable is deprecated, use POE_ACCESS_KEY instead");
            return Some(key);
        }
    }
    None
}

/// An access key must be exactly 32 characters; anything else is fatal at
/// boot, matching `_verify_access_key`'s `sys.exit(1)`.
pub fn verify_access_key(access_key: Option<&str>, allow_without_key: bool) -> Result<(), String> {
    match access_key {
        None if allow_without_key => Ok(()),
        None => Err("access key is required (set POE_ACCESS_KEY or pass one explicitly)".to_string()),
        Some(key) if key.len() == 32 => Ok(()),
        Some(key) => Err(format!(
            "access key must be 32 characters, got {} characters",
            key.len()
        )),
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub path: String,
    pub bot_name: Option<String>,
    pub access_key: Option<String>,
    pub allow_without_key: bool,
    pub protocol_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            bot_name: None,
            access_key: None,
            allow_without_key: false,
            protocol_version: crate::protocol::PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_bot_name(mut self, bot_name: impl Into<String>) -> Self {
        self.bot_name = Some(bot_name.into());
        self
    }

    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn allow_without_key(mut self, allow: bool) -> Self {
        self.allow_without_key = allow;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub upload_base_url: String,
    pub registry_base_url: String,
    pub num_tries: u32,
    pub retry_sleep: Duration,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub cost_timeout: Duration,
    pub access_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.poe.com/bot".to_string(),
            upload_base_url: "https://www.quora.com/poe_api/file_attachment_3RD_PARTY_POST".to_string(),
            registry_base_url: "https://api.poe.com/bot".to_string(),
            num_tries: 2,
            retry_sleep: Duration::from_millis(500),
            request_timeout: Duration::from_secs(600),
            upload_timeout: Duration::from_secs(120),
            cost_timeout: Duration::from_secs(300),
            access_key: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn with_num_tries(mut self, num_tries: u32) -> Self {
        self.num_tries = num_tries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Access-key resolution touches process env vars; serialize tests that
    // mutate them so they don't race under the test harness's thread pool.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn direct_argument_wins_over_everything() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("POE_ACCESS_KEY");
        env::remove_var("POE_API_KEY");
        let key = resolve_access_key(Some("direct-key"), Some("legacy-key"));
        assert_eq!(key.as_deref(), Some("direct-key"));
    }

    #[test]
    fn env_access_key_wins_over_legacy_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("POE_ACCESS_KEY", "env-key");
        env::remove_var("POE_API_KEY");
        let key = resolve_access_key(None, Some("legacy-key"));
        env::remove_var("POE_ACCESS_KEY");
        assert_eq!(key.as_deref(), Some("env-key"));
    }

    #[test]
    fn legacy_api_key_wins_over_legacy_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("POE_ACCESS_KEY");
        env::set_var("POE_API_KEY", "legacy-env-key");
        let key = resolve_access_key(None, Some("legacy-key"));
        env::remove_var("POE_API_KEY");
        assert_eq!(key.as_deref(), Some("legacy-key"));
    }

    #[test]
    fn falls_back_to_legacy_env_when_nothing_else_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("POE_ACCESS_KEY");
        env::set_var("POE_API_KEY", "legacy-env-key");
        let key = resolve_access_key(None, None);
        env::remove_var("POE_API_KEY");
        assert_eq!(key.as_deref(), Some("legacy-env-key"));
    }

    #[test]
    fn verify_rejects_wrong_length() {
        assert!(verify_access_key(Some("short"), false).is_err());
    }

    #[test]
    fn verify_accepts_32_chars() {
        let key = "a".repeat(32);
        assert!(verify_access_key(Some(&key), false).is_ok());
    }

    #[test]
    fn verify_allows_missing_when_explicitly_opted_in() {
        assert!(verify_access_key(None, true).is_ok());
    }
}
