use super::token::{TokenError, TokenSource};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 静默恢复登录的最大尝试次数，防止无限弹窗
pub const MAX_AUTO_AUTH_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// 持久化的登录标记
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthMarker {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub auto_auth_attempts: u32,
}

/// 标记文件，读写失败都只记日志
#[derive(Debug, Clone)]
pub struct AuthMarkerStore {
    path: PathBuf,
}

impl AuthMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> AuthMarker {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("登录标记文件损坏 {}: {}", self.path.display(), e);
                AuthMarker::default()
            }),
            Err(_) => AuthMarker::default(),
        }
    }

    pub fn save(&self, marker: &AuthMarker) {
        let result = serde_json::to_vec_pretty(marker)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&self.path, bytes).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("无法写入登录标记 {}: {}", self.path.display(), e);
        }
    }

    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// 登录闸门
///
/// 状态机：Anonymous -> Authenticating -> Authenticated。
/// 所有请求通过 [`AuthGate::bearer_token`] 取令牌；令牌获取串行进行。
pub struct AuthGate {
    tokens: Arc<dyn TokenSource>,
    store: AuthMarkerStore,
    state: Mutex<AuthState>,
}

impl AuthGate {
    pub fn new(tokens: Arc<dyn TokenSource>, store: AuthMarkerStore) -> Self {
        Self {
            tokens,
            store,
            state: Mutex::new(AuthState::Anonymous),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.state.lock().await.clone()
    }

    /// 匿名且存在“曾登录”标记时尝试静默恢复，最多 [`MAX_AUTO_AUTH_ATTEMPTS`] 次
    pub async fn restore_session(&self) -> bool {
        let mut state = self.state.lock().await;
        if *state == AuthState::Authenticated {
            return true;
        }
        let mut marker = self.store.load();
        if !marker.is_authenticated {
            if marker.auto_auth_attempts != 0 {
                self.store.clear();
            }
            return false;
        }
        if marker.auto_auth_attempts >= MAX_AUTO_AUTH_ATTEMPTS {
            return false;
        }
        marker.auto_auth_attempts += 1;
        self.store.save(&marker);

        *state = AuthState::Authenticating;
        match self.tokens.acquire_silent().await {
            Ok(_) => {
                *state = AuthState::Authenticated;
                self.mark_signed_in();
                info!("{} 静默恢复登录成功", self);
                true
            }
            Err(e) => {
                *state = AuthState::Anonymous;
                warn!(
                    "{} 静默恢复登录失败 (第 {} 次): {}",
                    self, marker.auto_auth_attempts, e
                );
                false
            }
        }
    }

    /// 交互式登录
    pub async fn sign_in(&self) -> Result<(), TokenError> {
        let mut state = self.state.lock().await;
        *state = AuthState::Authenticating;
        let result = match self.tokens.acquire_silent().await {
            Ok(_) => Ok(()),
            Err(_) => self.tokens.acquire_interactive().await.map(|_| ()),
        };
        match &result {
            Ok(()) => {
                *state = AuthState::Authenticated;
                self.mark_signed_in();
                info!("{} 登录成功", self);
            }
            Err(e) => {
                *state = AuthState::Anonymous;
                warn!("{} 登录失败: {}", self, e);
            }
        }
        result
    }

    pub async fn sign_out(&self) {
        let mut state = self.state.lock().await;
        *state = AuthState::Anonymous;
        self.tokens.forget();
        self.store.clear();
        info!("{} 已退出登录", self);
    }

    /// 为一次请求获取令牌
    ///
    /// 已登录：先静默，需要交互时再交互；都失败返回 None，请求照常发出。
    /// 匿名：先尝试恢复会话，仍匿名则不带令牌。
    pub async fn bearer_token(&self) -> Option<String> {
        if self.state().await == AuthState::Anonymous && !self.restore_session().await {
            return None;
        }

        let state = self.state.lock().await;
        if *state != AuthState::Authenticated {
            return None;
        }
        match self.tokens.acquire_silent().await {
            Ok(token) => Some(token.raw),
            Err(TokenError::InteractionRequired) => {
                match self.tokens.acquire_interactive().await {
                    Ok(token) => Some(token.raw),
                    Err(e) => {
                        warn!("{} 交互式获取令牌失败: {}", self, e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("{} 获取令牌失败: {}", self, e);
                None
            }
        }
    }

    fn mark_signed_in(&self) {
        self.store.save(&AuthMarker {
            is_authenticated: true,
            auto_auth_attempts: 0,
        });
    }
}

impl std::fmt::Display for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<AuthGate [{}]>", self.store.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::token::testing::ScriptedTokens;

    fn store_in(dir: &tempfile::TempDir) -> AuthMarkerStore {
        AuthMarkerStore::new(dir.path().join("auth.json"))
    }

    #[tokio::test]
    async fn anonymous_without_marker_sends_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(ScriptedTokens::default());
        let gate = AuthGate::new(tokens.clone(), store_in(&dir));

        assert_eq!(gate.bearer_token().await, None);
        assert_eq!(tokens.silent_calls(), 0);
        assert_eq!(gate.state().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn marker_triggers_silent_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&AuthMarker {
            is_authenticated: true,
            auto_auth_attempts: 0,
        });
        let tokens = Arc::new(
            ScriptedTokens::default()
                .silent(Ok("restored"))
                .silent(Ok("per-request")),
        );
        let gate = AuthGate::new(tokens.clone(), store.clone());

        assert_eq!(gate.bearer_token().await.as_deref(), Some("per-request"));
        assert_eq!(gate.state().await, AuthState::Authenticated);
        assert_eq!(store.load().auto_auth_attempts, 0);
    }

    #[tokio::test]
    async fn restore_attempts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&AuthMarker {
            is_authenticated: true,
            auto_auth_attempts: 0,
        });
        let tokens = Arc::new(ScriptedTokens::default());
        let gate = AuthGate::new(tokens.clone(), store.clone());

        for _ in 0..5 {
            assert!(!gate.restore_session().await);
        }
        assert_eq!(tokens.silent_calls(), MAX_AUTO_AUTH_ATTEMPTS);
        assert_eq!(store.load().auto_auth_attempts, MAX_AUTO_AUTH_ATTEMPTS);
    }

    #[tokio::test]
    async fn silent_failure_falls_back_to_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(
            ScriptedTokens::default()
                .silent(Err(TokenError::InteractionRequired))
                .interactive(Ok("signed-in"))
                .silent(Err(TokenError::InteractionRequired))
                .interactive(Ok("fresh")),
        );
        let gate = AuthGate::new(tokens.clone(), store_in(&dir));

        gate.sign_in().await.unwrap();
        assert_eq!(gate.state().await, AuthState::Authenticated);
        assert_eq!(gate.bearer_token().await.as_deref(), Some("fresh"));
        assert_eq!(tokens.interactive_calls(), 2);
    }

    #[tokio::test]
    async fn sign_out_clears_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let tokens = Arc::new(ScriptedTokens::default().silent(Ok("t")));
        let gate = AuthGate::new(tokens, store.clone());

        gate.sign_in().await.unwrap();
        assert!(store.load().is_authenticated);
        gate.sign_out().await;
        assert_eq!(gate.state().await, AuthState::Anonymous);
        assert_eq!(store.load(), AuthMarker::default());
    }
}
