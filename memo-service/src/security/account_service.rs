use crate::security::password_service::{validate_password_policy, PasswordService};
use chrono::{DateTime, Duration, Utc};
use memo_api::security::{AuthError, Result};
use memo_domain::security::{User, UserStore};
use memo_infra::security::RateLimiter;
use std::sync::Arc;
use validator::ValidateEmail;

/// 每个字段的修改冷却期（天）
pub const DEFAULT_FIELD_CHANGE_COOLDOWN_DAYS: i64 = 14;

/// 计算字段修改的剩余冷却时间
///
/// 纯函数，时间由调用方注入，测试无需模拟时钟。
/// 返回None表示冷却期已过（或从未修改过）。
pub fn remaining_cooldown(
    last_changed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<Duration> {
    let last = last_changed?;
    let elapsed = now - last;
    if elapsed < cooldown {
        Some(cooldown - elapsed)
    } else {
        None
    }
}

/// 账户服务
///
/// 密码/邮箱/用户名的修改入口。每个字段有独立的十四天冷却期，
/// 记在用户记录自身的时间戳上。这是策略性冷却而非滥用防御，
/// 即使限流器被停用也必须保留。
pub struct AccountService {
    user_store: Arc<dyn UserStore>,
    password_service: Arc<dyn PasswordService>,
    rate_limiter: Arc<dyn RateLimiter>,
    cooldown: Duration,
}

impl AccountService {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        password_service: Arc<dyn PasswordService>,
        rate_limiter: Arc<dyn RateLimiter>,
        cooldown_days: i64,
    ) -> Self {
        Self {
            user_store,
            password_service,
            rate_limiter,
            cooldown: Duration::days(cooldown_days),
        }
    }

    async fn guard(&self, origin: &str, user_id: &str) -> Result<()> {
        if self
            .rate_limiter
            .is_rate_limited(origin, user_id)
            .await
            .map_err(AuthError::from)?
        {
            return Err(AuthError::RateLimited);
        }
        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<User> {
        self.user_store
            .get(user_id)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// 校验当前密码；失败计入限流记录
    async fn require_password(
        &self,
        origin: &str,
        user: &User,
        password: &str,
    ) -> Result<()> {
        let hash = user
            .spec
            .password
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.password_service.verify(password, hash).await? {
            self.rate_limiter
                .track_attempt(origin, &user.id)
                .await
                .map_err(AuthError::from)?;
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }

    fn check_cooldown(last_changed: Option<DateTime<Utc>>, cooldown: Duration, field: &str) -> Result<()> {
        if remaining_cooldown(last_changed, Utc::now(), cooldown).is_some() {
            return Err(AuthError::PolicyViolation(format!(
                "{} was changed recently, try again later",
                field
            )));
        }
        Ok(())
    }

    /// 修改密码
    ///
    /// 修改时间戳同时使所有未完成的待两步验证临时令牌失效
    pub async fn change_password(
        &self,
        origin: &str,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.guard(origin, user_id).await?;
        let mut user = self.load_user(user_id).await?;
        self.require_password(origin, &user, current_password).await?;

        Self::check_cooldown(user.spec.password_changed_at, self.cooldown, "password")?;
        validate_password_policy(new_password)?;

        user.spec.password = Some(self.password_service.hash(new_password).await?);
        user.spec.password_changed_at = Some(Utc::now());
        self.user_store.update(&user).await?;

        self.rate_limiter
            .reset_attempts(origin, user_id)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    /// 修改邮箱
    pub async fn change_email(
        &self,
        origin: &str,
        user_id: &str,
        password: &str,
        new_email: &str,
    ) -> Result<()> {
        self.guard(origin, user_id).await?;
        let mut user = self.load_user(user_id).await?;
        self.require_password(origin, &user, password).await?;

        Self::check_cooldown(user.spec.email_changed_at, self.cooldown, "email")?;
        if !new_email.validate_email() {
            return Err(AuthError::PolicyViolation("invalid email format".to_string()));
        }

        user.spec.email = new_email.to_string();
        user.spec.email_changed_at = Some(Utc::now());
        self.user_store.update(&user).await?;

        self.rate_limiter
            .reset_attempts(origin, user_id)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }

    /// 修改用户名
    pub async fn change_username(
        &self,
        origin: &str,
        user_id: &str,
        password: &str,
        new_username: &str,
    ) -> Result<()> {
        self.guard(origin, user_id).await?;
        let mut user = self.load_user(user_id).await?;
        self.require_password(origin, &user, password).await?;

        Self::check_cooldown(user.spec.username_changed_at, self.cooldown, "username")?;
        validate_username(new_username)?;

        user.spec.username = new_username.to_string();
        user.spec.username_changed_at = Some(Utc::now());
        self.user_store.update(&user).await?;

        self.rate_limiter
            .reset_attempts(origin, user_id)
            .await
            .map_err(AuthError::from)?;
        Ok(())
    }
}

/// 用户名格式：3-32个字符，小写字母、数字和连字符
fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(AuthError::PolicyViolation(
            "username must be 3-32 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AuthError::PolicyViolation(
            "username may only contain lowercase letters, digits and dashes".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password_service::{DefaultPasswordService, PasswordAlgorithm};
    use crate::security::test_support::InMemoryUserStore;
    use memo_domain::security::UserSpec;
    use memo_infra::cache::MemoryCache;
    use memo_infra::security::CacheRateLimiter;

    #[test]
    fn test_remaining_cooldown() {
        let now = Utc::now();
        let cooldown = Duration::days(14);

        // 从未修改过：无冷却
        assert!(remaining_cooldown(None, now, cooldown).is_none());

        // 刚修改：剩余约14天
        let remaining = remaining_cooldown(Some(now), now, cooldown).unwrap();
        assert_eq!(remaining, cooldown);

        // 修改了一周：剩余约一周
        let last = now - Duration::days(7);
        let remaining = remaining_cooldown(Some(last), now, cooldown).unwrap();
        assert_eq!(remaining, Duration::days(7));

        // 冷却期已过
        let last = now - Duration::days(15);
        assert!(remaining_cooldown(Some(last), now, cooldown).is_none());

        // 恰好到期
        let last = now - Duration::days(14);
        assert!(remaining_cooldown(Some(last), now, cooldown).is_none());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("alice-2").is_ok());

        assert!(validate_username("al").is_err());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username("alice!").is_err());
    }

    struct Fixture {
        store: Arc<InMemoryUserStore>,
        service: AccountService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryUserStore::new());
        let cache = Arc::new(MemoryCache::new());
        let rate_limiter = Arc::new(CacheRateLimiter::new(cache, 5, 300));
        let password_service =
            Arc::new(DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4));

        let service = AccountService::new(
            store.clone(),
            password_service.clone(),
            rate_limiter,
            DEFAULT_FIELD_CHANGE_COOLDOWN_DAYS,
        );

        let user = User {
            id: "u-1".to_string(),
            spec: UserSpec {
                username: "alice".to_string(),
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password: Some(password_service.hash("test12!@pass").await.unwrap()),
                ..Default::default()
            },
        };
        store.insert(user);

        Fixture { store, service }
    }

    #[tokio::test]
    async fn test_change_password_updates_hash_and_timestamp() {
        let fixture = fixture().await;

        fixture
            .service
            .change_password("10.0.0.1", "u-1", "test12!@pass", "next34#$pass")
            .await
            .unwrap();

        let user = fixture.store.get_sync("u-1");
        assert!(user.spec.password_changed_at.is_some());

        let password_service =
            DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4);
        assert!(password_service
            .verify("next34#$pass", user.spec.password.as_deref().unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let fixture = fixture().await;

        let result = fixture
            .service
            .change_password("10.0.0.1", "u-1", "wrong12!@pass", "next34#$pass")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_enforces_policy() {
        let fixture = fixture().await;

        let result = fixture
            .service
            .change_password("10.0.0.1", "u-1", "test12!@pass", "weak")
            .await;
        assert!(matches!(result, Err(AuthError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn test_change_password_cooldown() {
        let fixture = fixture().await;

        fixture
            .service
            .change_password("10.0.0.1", "u-1", "test12!@pass", "next34#$pass")
            .await
            .unwrap();

        // 冷却期内的第二次修改被拒绝
        let result = fixture
            .service
            .change_password("10.0.0.1", "u-1", "next34#$pass", "more56%^pass")
            .await;
        assert!(matches!(result, Err(AuthError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn test_cooldowns_are_per_field() {
        let fixture = fixture().await;

        fixture
            .service
            .change_password("10.0.0.1", "u-1", "test12!@pass", "next34#$pass")
            .await
            .unwrap();

        // 密码冷却中不影响邮箱修改
        fixture
            .service
            .change_email("10.0.0.1", "u-1", "next34#$pass", "new@example.com")
            .await
            .unwrap();

        let user = fixture.store.get_sync("u-1");
        assert_eq!(user.spec.email, "new@example.com");
        assert!(user.spec.email_changed_at.is_some());
    }

    #[tokio::test]
    async fn test_change_email_validates_format() {
        let fixture = fixture().await;

        let result = fixture
            .service
            .change_email("10.0.0.1", "u-1", "test12!@pass", "not-an-email")
            .await;
        assert!(matches!(result, Err(AuthError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn test_change_username() {
        let fixture = fixture().await;

        fixture
            .service
            .change_username("10.0.0.1", "u-1", "test12!@pass", "alice-renamed")
            .await
            .unwrap();

        let user = fixture.store.get_sync("u-1");
        assert_eq!(user.spec.username, "alice-renamed");
        assert!(user.spec.username_changed_at.is_some());

        let result = fixture
            .service
            .change_username("10.0.0.1", "u-1", "test12!@pass", "UPPER")
            .await;
        assert!(matches!(result, Err(AuthError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn test_repeated_password_failures_rate_limited() {
        let fixture = fixture().await;

        for _ in 0..5 {
            let result = fixture
                .service
                .change_password("10.0.0.1", "u-1", "wrong12!@pass", "next34#$pass")
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }

        let result = fixture
            .service
            .change_password("10.0.0.1", "u-1", "test12!@pass", "next34#$pass")
            .await;
        assert!(matches!(result, Err(AuthError::RateLimited)));
    }
}
