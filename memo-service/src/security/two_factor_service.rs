use crate::security::password_service::PasswordService;
use crate::security::totp_service::TotpAuthService;
use memo_api::security::{AuthError, Result};
use memo_domain::security::{User, UserStore};
use memo_infra::security::{TokenPair, TokenService};
use serde::Serialize;
use std::sync::Arc;

/// 每次验证成功生成的恢复码数量
pub const RECOVERY_CODE_COUNT: usize = 10;
/// 恢复码长度
pub const RECOVERY_CODE_LEN: usize = 10;
/// 恢复码字符集：大写且去掉易混淆字符，生成时即为规范形式
const RECOVERY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 两步验证注册产物
///
/// 密钥与恢复码只在这里返回一次，之后不可再取回
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorSetup {
    /// Base32密钥（用户手动输入用）
    pub secret: String,
    /// 配对URI
    pub uri: String,
    /// 配对二维码（SVG）
    pub qr_svg: String,
}

/// 密码校验通过后的签发结果
#[derive(Debug, Clone)]
pub enum LoginTokens {
    /// 未启用两步验证：直接发放会话令牌对
    Session(TokenPair),
    /// 已启用两步验证：发放临时令牌，等待第二因子
    PendingTwoFactor {
        temp_token: String,
        recovery_available: bool,
    },
}

/// 两步验证服务
///
/// 管理注册、验证、停用与恢复码消费，并负责密码校验之后
/// "发会话还是发临时令牌"的决策。
pub struct TwoFactorService {
    user_store: Arc<dyn UserStore>,
    token_service: Arc<TokenService>,
    totp: Arc<dyn TotpAuthService>,
    password_service: Arc<dyn PasswordService>,
    temp_token_ttl: u64,
}

impl TwoFactorService {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        token_service: Arc<TokenService>,
        totp: Arc<dyn TotpAuthService>,
        password_service: Arc<dyn PasswordService>,
        temp_token_ttl: u64,
    ) -> Self {
        Self {
            user_store,
            token_service,
            totp,
            password_service,
            temp_token_ttl,
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<User> {
        self.user_store
            .get(user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// 开始两步验证设置
    ///
    /// 生成新密钥并落库（enabled保持false）。密钥立即可用于
    /// 验证尝试，但账户在验证成功前不受两步验证保护。
    /// 重复调用会覆盖未完成设置的旧密钥。
    pub async fn enable(&self, user_id: &str) -> Result<TwoFactorSetup> {
        let mut user = self.load_user(user_id).await?;

        if user.two_factor_enabled() {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let raw_secret = self.totp.generate_totp_secret();
        let encrypted = self.totp.encrypt_secret(&raw_secret)?;
        let uri = self.totp.provisioning_uri(&raw_secret, &user.spec.username);
        let qr_svg = self.totp.provisioning_qr_svg(&uri)?;

        user.spec.totp_encrypted_secret = Some(encrypted);
        user.spec.two_factor_auth_enabled = Some(false);
        self.user_store.update(&user).await?;

        Ok(TwoFactorSetup {
            secret: raw_secret,
            uri,
            qr_svg,
        })
    }

    /// 完成两步验证设置
    ///
    /// 验证成功后生成十个新恢复码（覆盖旧集合）并启用保护。
    /// 恢复码只在返回值中出现一次。失败时不做任何变更。
    pub async fn verify(&self, user_id: &str, code: &str) -> Result<Vec<String>> {
        let mut user = self.load_user(user_id).await?;

        let encrypted = user
            .spec
            .totp_encrypted_secret
            .clone()
            .ok_or(AuthError::TwoFactorSetupNotStarted)?;
        let raw_secret = self.totp.decrypt_secret(&encrypted)?;

        if !self.totp.validate_totp(&raw_secret, code) {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        let codes = Self::generate_recovery_codes();
        user.spec.two_factor_auth_enabled = Some(true);
        user.spec.recovery_codes = Some(codes.clone());
        self.user_store.update(&user).await?;

        Ok(codes)
    }

    /// 停用两步验证
    ///
    /// 需要正确的密码和当前TOTP代码（恢复码不行）。
    /// 成功后清除密钥、标志与剩余恢复码。
    pub async fn disable(&self, user_id: &str, code: &str, password: &str) -> Result<()> {
        let mut user = self.load_user(user_id).await?;

        if !user.two_factor_enabled() {
            return Err(AuthError::TwoFactorSetupNotStarted);
        }

        let hash = user
            .spec
            .password
            .clone()
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.password_service.verify(password, &hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let encrypted = user
            .spec
            .totp_encrypted_secret
            .clone()
            .ok_or(AuthError::TwoFactorSetupNotStarted)?;
        let raw_secret = self.totp.decrypt_secret(&encrypted)?;
        if !self.totp.validate_totp(&raw_secret, code) {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        user.spec.totp_encrypted_secret = None;
        user.spec.two_factor_auth_enabled = Some(false);
        user.spec.recovery_codes = None;
        self.user_store.update(&user).await?;

        Ok(())
    }

    /// 消费一个恢复码
    ///
    /// 匹配成功时恰好移除一个码并返回true；不匹配返回false且
    /// 不做变更。恢复码输错是高频的预期情况，不算异常。
    /// 存储侧的码在生成时已规范化，这里只修剪输入端的空白，
    /// 比较区分大小写。
    pub async fn use_recovery_code(&self, user_id: &str, code: &str) -> Result<bool> {
        let mut user = self.load_user(user_id).await?;

        let codes = match user.spec.recovery_codes.as_mut() {
            Some(codes) if !codes.is_empty() => codes,
            _ => return Err(AuthError::RecoveryCodesUnavailable),
        };

        let supplied = code.trim();
        match codes.iter().position(|c| c == supplied) {
            Some(index) => {
                codes.remove(index);
                self.user_store.update(&user).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 密码校验通过后决定签发何种令牌
    pub async fn issue_login_tokens(&self, user: &User) -> Result<LoginTokens> {
        if user.two_factor_enabled() {
            let temp_token = self.token_service.issue_temp_token(
                &user.id,
                self.temp_token_ttl,
                user.recovery_available(),
            )?;
            Ok(LoginTokens::PendingTwoFactor {
                temp_token,
                recovery_available: user.recovery_available(),
            })
        } else {
            Ok(LoginTokens::Session(
                self.token_service.issue_session_tokens(user)?,
            ))
        }
    }

    /// 用TOTP代码完成登录的第二步
    pub async fn complete(&self, temp_token: &str, code: &str) -> Result<TokenPair> {
        let (_, user) = self.verify_pending(temp_token).await?;

        let encrypted = user
            .spec
            .totp_encrypted_secret
            .clone()
            .ok_or(AuthError::TwoFactorSetupNotStarted)?;
        let raw_secret = self.totp.decrypt_secret(&encrypted)?;
        if !self.totp.validate_totp(&raw_secret, code) {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.finish_pending(temp_token, &user).await
    }

    /// 用恢复码完成登录的第二步
    pub async fn complete_with_recovery(&self, temp_token: &str, code: &str) -> Result<TokenPair> {
        let (claims, user) = self.verify_pending(temp_token).await?;

        if !self.use_recovery_code(&claims.sub, code).await? {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.finish_pending(temp_token, &user).await
    }

    async fn verify_pending(
        &self,
        temp_token: &str,
    ) -> Result<(memo_infra::security::Claims, User)> {
        let claims = self.token_service.verify_temp_token(temp_token).await?;
        let user = self.load_user(&claims.sub).await?;

        // 临时令牌签发后密码又被修改过：按吊销处理，
        // 不允许用旧凭证链完成登录
        if let Some(changed_at) = user.spec.password_changed_at {
            if changed_at.timestamp() > claims.iat as i64 {
                return Err(AuthError::InvalidToken);
            }
        }

        Ok((claims, user))
    }

    async fn finish_pending(&self, temp_token: &str, user: &User) -> Result<TokenPair> {
        let pair = self.token_service.issue_session_tokens(user)?;

        // 已消费的临时令牌立刻吊销，不能二次使用
        self.token_service
            .revoke(&[temp_token.to_string()])
            .await?;

        Ok(pair)
    }

    fn generate_recovery_codes() -> Vec<String> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..RECOVERY_CODE_COUNT)
            .map(|_| {
                (0..RECOVERY_CODE_LEN)
                    .map(|_| {
                        let index = rng.gen_range(0..RECOVERY_CODE_ALPHABET.len());
                        RECOVERY_CODE_ALPHABET[index] as char
                    })
                    .collect()
            })
            .collect()
    }
}
