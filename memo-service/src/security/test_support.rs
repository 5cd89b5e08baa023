//! 测试用的内存替身：用户存储与固定TOTP实现

use crate::security::totp_service::TotpAuthService;
use async_trait::async_trait;
use memo_api::security::{AuthError, Result};
use memo_domain::security::{User, UserStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// 固定TOTP实现接受的"正确"代码
pub const VALID_CODE: &str = "123456";

/// 内存用户存储
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
    lookups: AtomicUsize,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }

    pub fn get_sync(&self, id: &str) -> User {
        self.users.lock().unwrap().get(id).cloned().expect("user exists")
    }

    /// 存储被查询的次数，用于断言限流路径不触达凭证存储
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(
        &self,
        id: &str,
    ) -> std::result::Result<Option<User>, Box<dyn std::error::Error + Send + Sync>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn get_by_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<User>, Box<dyn std::error::Error + Send + Sync>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.spec.username == username)
            .cloned())
    }

    async fn update(
        &self,
        user: &User,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// 固定TOTP实现：只认`VALID_CODE`，加密为可逆前缀，
/// 让状态机测试与时钟无关
pub struct StubTotpService;

impl StubTotpService {
    pub fn new() -> Self {
        Self
    }
}

impl TotpAuthService for StubTotpService {
    fn validate_totp(&self, _raw_secret: &str, code: &str) -> bool {
        code.trim() == VALID_CODE
    }

    fn validate_totp_at(&self, _raw_secret: &str, code: &str, _timestamp: u64) -> bool {
        code.trim() == VALID_CODE
    }

    fn generate_totp_secret(&self) -> String {
        "STUBSECRETSTUBSECRETSTUBSECRETSTUBSECRETSTUBSECRETAB".to_string()
    }

    fn provisioning_uri(&self, raw_secret: &str, account: &str) -> String {
        format!("otpauth://totp/Memo:{}?secret={}", account, raw_secret)
    }

    fn provisioning_qr_svg(&self, _uri: &str) -> Result<String> {
        Ok("<svg></svg>".to_string())
    }

    fn encrypt_secret(&self, raw_secret: &str) -> Result<String> {
        Ok(format!("enc:{}", raw_secret))
    }

    fn decrypt_secret(&self, encrypted_secret: &str) -> Result<String> {
        encrypted_secret
            .strip_prefix("enc:")
            .map(|s| s.to_string())
            .ok_or_else(|| AuthError::Internal("not an encrypted secret".to_string()))
    }
}
