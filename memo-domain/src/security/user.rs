use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User实体
///
/// 凭证记录归外部用户存储所有，这里只定义其结构。
/// `id`是稳定标识，用户名、邮箱等属性都可以变更。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub spec: UserSpec,
}

/// UserSpec包含用户的凭证与安全属性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: Option<String>, // 加密后的密码
    pub two_factor_auth_enabled: Option<bool>,
    pub totp_encrypted_secret: Option<String>,
    pub recovery_codes: Option<Vec<String>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub email_changed_at: Option<DateTime<Utc>>,
    pub username_changed_at: Option<DateTime<Utc>>,
    pub disabled: Option<bool>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl Default for UserSpec {
    fn default() -> Self {
        Self {
            username: String::new(),
            display_name: String::new(),
            email: String::new(),
            password: None,
            two_factor_auth_enabled: Some(false),
            totp_encrypted_secret: None,
            recovery_codes: None,
            password_changed_at: None,
            email_changed_at: None,
            username_changed_at: None,
            disabled: Some(false),
            registered_at: Some(Utc::now()),
        }
    }
}

impl User {
    /// 两步验证是否已启用
    ///
    /// 密钥存在但标志为false表示设置已开始、尚未完成验证，
    /// 此时账户还不受两步验证保护
    pub fn two_factor_enabled(&self) -> bool {
        self.spec.two_factor_auth_enabled.unwrap_or(false)
            && self.spec.totp_encrypted_secret.is_some()
    }

    /// 是否还有未使用的恢复码
    pub fn recovery_available(&self) -> bool {
        self.spec
            .recovery_codes
            .as_ref()
            .map(|codes| !codes.is_empty())
            .unwrap_or(false)
    }

    pub fn disabled(&self) -> bool {
        self.spec.disabled.unwrap_or(false)
    }
}
