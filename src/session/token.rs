use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{info, warn};
use std::sync::Mutex;

/// 提前多久视为即将过期
pub const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    /// 静默获取不可用，需要交互式登录
    #[error("interaction required")]
    InteractionRequired,
    #[error("token acquisition failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub raw: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// 若是 JWT，读取 payload 中的 `exp`
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into().trim().to_string();
        let expires_at = jwt_expiry(&raw);
        Self { raw, expires_at }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp - Duration::seconds(REFRESH_MARGIN_SECS) > now,
            None => true,
        }
    }
}

fn jwt_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let payload = raw.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let v: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = v.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// 令牌来源：先静默，失败再交互
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire_silent(&self) -> Result<AccessToken, TokenError>;
    async fn acquire_interactive(&self) -> Result<AccessToken, TokenError>;
    /// 退出登录时丢弃缓存
    fn forget(&self) {}
}

/// 命令行令牌来源
///
/// 静默：缓存或 `FORMULARY_ACCESS_TOKEN`；交互：执行配置的登录命令，
/// 取其标准输出的最后一个非空行作为令牌。
pub struct CommandTokenSource {
    static_token: Option<String>,
    command: Option<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl CommandTokenSource {
    pub fn new(static_token: Option<String>, command: Option<String>) -> Self {
        Self {
            static_token,
            command,
            cached: Mutex::new(None),
        }
    }

    fn cache(&self, token: &AccessToken) {
        if let Ok(mut slot) = self.cached.lock() {
            *slot = Some(token.clone());
        }
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    async fn acquire_silent(&self) -> Result<AccessToken, TokenError> {
        let now = Utc::now();
        let cached = self.cached.lock().ok().and_then(|slot| slot.clone());
        if let Some(token) = cached.filter(|t| t.is_fresh_at(now)) {
            return Ok(token);
        }
        if let Some(raw) = &self.static_token {
            let token = AccessToken::from_raw(raw.clone());
            if token.is_fresh_at(now) {
                self.cache(&token);
                return Ok(token);
            }
            warn!("FORMULARY_ACCESS_TOKEN 已过期");
        }
        Err(TokenError::InteractionRequired)
    }

    async fn acquire_interactive(&self) -> Result<AccessToken, TokenError> {
        let Some(cmd) = &self.command else {
            return Err(TokenError::Failed(
                "FORMULARY_TOKEN_COMMAND is not configured".to_string(),
            ));
        };
        info!("执行登录命令: {}", cmd);
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            // 终端归界面所有，登录命令不能读写它
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| TokenError::Failed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("登录命令失败 {}: {}", output.status, stderr.trim());
            return Err(TokenError::Failed(format!(
                "sign-in command exited with {}",
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .ok_or_else(|| TokenError::Failed("sign-in command printed no token".to_string()))?;
        let token = AccessToken::from_raw(raw);
        self.cache(&token);
        Ok(token)
    }

    fn forget(&self) {
        if let Ok(mut slot) = self.cached.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// 脚本化的令牌来源，记录调用次数
    #[derive(Default)]
    pub struct ScriptedTokens {
        pub silent: Mutex<VecDeque<Result<AccessToken, TokenError>>>,
        pub interactive: Mutex<VecDeque<Result<AccessToken, TokenError>>>,
        pub silent_calls: Mutex<u32>,
        pub interactive_calls: Mutex<u32>,
    }

    impl ScriptedTokens {
        pub fn silent(self, r: Result<&str, TokenError>) -> Self {
            self.silent
                .lock()
                .unwrap()
                .push_back(r.map(AccessToken::from_raw));
            self
        }

        pub fn interactive(self, r: Result<&str, TokenError>) -> Self {
            self.interactive
                .lock()
                .unwrap()
                .push_back(r.map(AccessToken::from_raw));
            self
        }

        pub fn silent_calls(&self) -> u32 {
            *self.silent_calls.lock().unwrap()
        }

        pub fn interactive_calls(&self) -> u32 {
            *self.interactive_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TokenSource for ScriptedTokens {
        async fn acquire_silent(&self) -> Result<AccessToken, TokenError> {
            *self.silent_calls.lock().unwrap() += 1;
            self.silent
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TokenError::InteractionRequired))
        }

        async fn acquire_interactive(&self) -> Result<AccessToken, TokenError> {
            *self.interactive_calls.lock().unwrap() += 1;
            self.interactive
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TokenError::Failed("no script".into())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            enc.encode(br#"{"alg":"none"}"#),
            enc.encode(format!(r#"{{"exp":{}}}"#, exp))
        )
    }

    #[test]
    fn reads_expiry_from_jwt() {
        let token = AccessToken::from_raw(jwt_with_exp(1_700_000_000));
        assert_eq!(token.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn opaque_tokens_never_expire() {
        let token = AccessToken::from_raw("opaque-token");
        assert!(token.expires_at.is_none());
        assert!(token.is_fresh_at(Utc::now()));
    }

    #[test]
    fn tokens_inside_margin_are_stale() {
        let now = Utc::now();
        let soon = AccessToken::from_raw(jwt_with_exp((now + Duration::seconds(60)).timestamp()));
        let later = AccessToken::from_raw(jwt_with_exp((now + Duration::hours(1)).timestamp()));
        assert!(!soon.is_fresh_at(now));
        assert!(later.is_fresh_at(now));
    }

    #[tokio::test]
    async fn command_source_silent_uses_static_token() {
        let src = CommandTokenSource::new(Some("abc".into()), None);
        assert_eq!(src.acquire_silent().await.unwrap().raw, "abc");

        let empty = CommandTokenSource::new(None, None);
        assert_eq!(
            empty.acquire_silent().await,
            Err(TokenError::InteractionRequired)
        );
        assert!(matches!(
            empty.acquire_interactive().await,
            Err(TokenError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_source_interactive_runs_command() {
        let src = CommandTokenSource::new(None, Some("echo noise; echo tok-123".into()));
        let token = src.acquire_interactive().await.unwrap();
        assert_eq!(token.raw, "tok-123");
        // 之后静默获取命中缓存
        assert_eq!(src.acquire_silent().await.unwrap().raw, "tok-123");
        src.forget();
        assert_eq!(
            src.acquire_silent().await,
            Err(TokenError::InteractionRequired)
        );
    }
}
