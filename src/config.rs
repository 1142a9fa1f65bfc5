use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 运行配置，全部来自环境变量（.env 会先被加载）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub per_page: u32,
    pub download_dir: PathBuf,
    pub timeout: Duration,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token: Option<String>,
    pub token_command: Option<String>,
    pub state_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            download_dir: PathBuf::from("downloads"),
            timeout: Duration::from_secs(30),
            auth: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数构造，便于测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = AppConfig::default();

        if let Some(url) = get("FORMULARY_API_URL") {
            cfg.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("FORMULARY_PER_PAGE") {
            let n = raw.parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "FORMULARY_PER_PAGE",
                value: raw.clone(),
            })?;
            cfg.per_page = n.clamp(1, MAX_PER_PAGE);
        }
        if let Some(dir) = get("FORMULARY_DOWNLOAD_DIR") {
            cfg.download_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("FORMULARY_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "FORMULARY_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            cfg.timeout = Duration::from_secs(secs.max(1));
        }

        let auth_on = get("FORMULARY_AUTH")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"))
            .unwrap_or(false);
        if auth_on {
            cfg.auth = Some(AuthConfig {
                access_token: get("FORMULARY_ACCESS_TOKEN"),
                token_command: get("FORMULARY_TOKEN_COMMAND"),
                state_path: get("FORMULARY_AUTH_STATE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".formulary-auth.json")),
            });
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.per_page, 20);
        assert!(cfg.auth.is_none());
    }

    #[test]
    fn per_page_is_clamped_and_url_trimmed() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("FORMULARY_API_URL", "https://catalog.example.com/api/"),
            ("FORMULARY_PER_PAGE", "500"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_url, "https://catalog.example.com/api");
        assert_eq!(cfg.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn auth_section_only_when_enabled() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("FORMULARY_AUTH", "on"),
            ("FORMULARY_TOKEN_COMMAND", "az account get-access-token"),
        ]))
        .unwrap();
        let auth = cfg.auth.expect("auth enabled");
        assert_eq!(auth.token_command.as_deref(), Some("az account get-access-token"));
        assert!(auth.access_token.is_none());
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("FORMULARY_PER_PAGE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("FORMULARY_PER_PAGE"));
    }
}
