use crate::config::Config;
use crate::error::{MemoError, Result};
use memo_domain::security::UserStore;
use memo_infra::cache::{Cache, MemoryCache, RedisCache};
use memo_infra::security::{CacheRateLimiter, RateLimiter, RevocationStore, TokenService};
use memo_service::security::{
    AccountService, AuthService, DefaultPasswordService, DefaultTotpAuthService, PasswordAlgorithm,
    PasswordService, TotpAuthService, TwoFactorService,
};
use std::sync::Arc;
use tracing::info;

/// 安全上下文
///
/// 进程启动时构建一次，之后在整个进程生命周期内复用。
/// 所有外部资源的客户端句柄（缓存、用户存储）都在这里显式
/// 构造并注入各组件，测试可以替换为内存实现。
pub struct SecurityContext {
    pub config: Config,
    pub cache: Arc<dyn Cache>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub token_service: Arc<TokenService>,
    pub password_service: Arc<dyn PasswordService>,
    pub totp_service: Arc<dyn TotpAuthService>,
    pub two_factor_service: Arc<TwoFactorService>,
    pub auth_service: Arc<AuthService>,
    pub account_service: Arc<AccountService>,
}

impl SecurityContext {
    pub fn initialize(config: Config, user_store: Arc<dyn UserStore>) -> Result<Self> {
        // 初始化缓存
        let cache: Arc<dyn Cache> = match config.security.cache.cache_type.as_str() {
            "memory" => Arc::new(MemoryCache::new()),
            _ => {
                let client = redis::Client::open(config.redis.url.as_str())
                    .map_err(|e| MemoError::Cache(format!("Invalid Redis URL: {}", e)))?;
                Arc::new(RedisCache::new(Arc::new(client)))
            }
        };

        // 初始化吊销名单与令牌服务
        let revocation = Arc::new(RevocationStore::new(cache.clone()));
        let token_service = Arc::new(TokenService::new(
            &config.security.jwt_secret,
            config.security.issuer.clone(),
            config.security.audience.clone(),
            config.security.access_token_expiration,
            config.security.refresh_token_expiration,
            revocation,
        )?);

        // 初始化速率限制器
        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(CacheRateLimiter::new(
            cache.clone(),
            config.security.rate_limit.max_attempts,
            config.security.rate_limit.window_seconds,
        ));

        // 初始化密码服务
        let algorithm = match config.security.password_algorithm.as_str() {
            "argon2" => PasswordAlgorithm::Argon2,
            _ => PasswordAlgorithm::Bcrypt,
        };
        let password_service: Arc<dyn PasswordService> = Arc::new(
            DefaultPasswordService::new(algorithm).with_bcrypt_cost(config.security.bcrypt_cost),
        );

        // 初始化TOTP服务
        let totp_service: Arc<dyn TotpAuthService> = Arc::new(DefaultTotpAuthService::new(
            &config.security.totp_encryption_key,
            config.security.totp_issuer.clone(),
        ));

        // 初始化两步验证与认证服务
        let two_factor_service = Arc::new(TwoFactorService::new(
            user_store.clone(),
            token_service.clone(),
            totp_service.clone(),
            password_service.clone(),
            config.security.temp_token_expiration,
        ));

        let auth_service = Arc::new(AuthService::new(
            user_store.clone(),
            password_service.clone(),
            two_factor_service.clone(),
            token_service.clone(),
            rate_limiter.clone(),
        ));

        let account_service = Arc::new(AccountService::new(
            user_store,
            password_service.clone(),
            rate_limiter.clone(),
            config.security.field_change_cooldown_days,
        ));

        info!("Security context initialized");

        Ok(Self {
            config,
            cache,
            rate_limiter,
            token_service,
            password_service,
            totp_service,
            two_factor_service,
            auth_service,
            account_service,
        })
    }
}
