use crate::security::password_service::PasswordService;
use crate::security::two_factor_service::{LoginTokens, TwoFactorService};
use memo_api::security::{AuthError, AuthenticatedUser, Result};
use memo_domain::security::UserStore;
use memo_infra::security::{RateLimiter, TokenPair, TokenService};
use std::sync::Arc;

/// 认证服务
///
/// 登录状态机的入口：密码校验 → （可选的）第二因子 → 会话。
/// 每个凭证校验入口都先过速率限制，再触达凭证存储。
pub struct AuthService {
    user_store: Arc<dyn UserStore>,
    password_service: Arc<dyn PasswordService>,
    two_factor: Arc<TwoFactorService>,
    token_service: Arc<TokenService>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthService {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        password_service: Arc<dyn PasswordService>,
        two_factor: Arc<TwoFactorService>,
        token_service: Arc<TokenService>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            user_store,
            password_service,
            two_factor,
            token_service,
            rate_limiter,
        }
    }

    /// 密码登录
    ///
    /// 被限流的调用方直接拒绝，完全不查询凭证存储。
    /// 用户不存在与密码错误对调用方不做区分，但都会计入
    /// 限流记录；被禁用的账户同样只返回`InvalidCredentials`。
    pub async fn login(
        &self,
        origin: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginTokens> {
        if self
            .rate_limiter
            .is_rate_limited(origin, username)
            .await
            .map_err(AuthError::from)?
        {
            return Err(AuthError::RateLimited);
        }

        let user = match self
            .user_store
            .get_by_username(username)
            .await
            .map_err(AuthError::from)?
        {
            Some(user) => user,
            None => {
                self.track(origin, username).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let hash = match user.spec.password.as_deref() {
            Some(hash) => hash.to_string(),
            None => {
                self.track(origin, username).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.password_service.verify(password, &hash).await? {
            self.track(origin, username).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if user.disabled() {
            return Err(AuthError::InvalidCredentials);
        }

        self.rate_limiter
            .reset_attempts(origin, username)
            .await
            .map_err(AuthError::from)?;

        self.two_factor.issue_login_tokens(&user).await
    }

    /// 用TOTP代码完成登录的第二步
    pub async fn complete_two_factor(
        &self,
        origin: &str,
        temp_token: &str,
        code: &str,
    ) -> Result<TokenPair> {
        let claims = self.token_service.verify_temp_token(temp_token).await?;
        self.guarded_completion(origin, &claims.sub, self.two_factor.complete(temp_token, code))
            .await
    }

    /// 用恢复码完成登录的第二步
    pub async fn complete_with_recovery(
        &self,
        origin: &str,
        temp_token: &str,
        code: &str,
    ) -> Result<TokenPair> {
        let claims = self.token_service.verify_temp_token(temp_token).await?;
        self.guarded_completion(
            origin,
            &claims.sub,
            self.two_factor.complete_with_recovery(temp_token, code),
        )
        .await
    }

    async fn guarded_completion(
        &self,
        origin: &str,
        identity: &str,
        completion: impl std::future::Future<Output = Result<TokenPair>>,
    ) -> Result<TokenPair> {
        if self
            .rate_limiter
            .is_rate_limited(origin, identity)
            .await
            .map_err(AuthError::from)?
        {
            return Err(AuthError::RateLimited);
        }

        match completion.await {
            Ok(pair) => {
                self.rate_limiter
                    .reset_attempts(origin, identity)
                    .await
                    .map_err(AuthError::from)?;
                Ok(pair)
            }
            Err(AuthError::InvalidTwoFactorCode) => {
                self.track(origin, identity).await?;
                Err(AuthError::InvalidTwoFactorCode)
            }
            Err(e) => Err(e),
        }
    }

    /// 按访问令牌还原请求主体
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser> {
        let claims = self.token_service.verify(token).await?;
        Ok(AuthenticatedUser::new(
            claims.sub,
            claims.name.unwrap_or_default(),
        ))
    }

    /// 用刷新令牌换取新的访问令牌
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        self.token_service.refresh(refresh_token).await
    }

    /// 登出：吊销会话令牌对
    ///
    /// 账户删除走同一条路径：先吊销再把账户视为已删除，
    /// 不依赖令牌状态竞争的结果
    pub async fn logout(&self, tokens: &[String]) -> Result<()> {
        self.token_service.revoke(tokens).await
    }

    async fn track(&self, origin: &str, identity: &str) -> Result<()> {
        tracing::info!(origin = origin, identity = identity, "failed attempt tracked");
        self.rate_limiter
            .track_attempt(origin, identity)
            .await
            .map_err(AuthError::from)
    }
}
