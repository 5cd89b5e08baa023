use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub redis: RedisConfig,
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    /// 访问令牌有效期（秒）
    pub access_token_expiration: u64,
    /// 刷新令牌有效期（秒）
    pub refresh_token_expiration: u64,
    /// 临时（待两步验证）令牌有效期（秒）
    pub temp_token_expiration: u64,
    /// 密码算法："bcrypt" 或 "argon2"
    pub password_algorithm: String,
    pub bcrypt_cost: u32,
    /// 认证器应用中展示的签发方名称
    pub totp_issuer: String,
    /// TOTP密钥静态加密用的口令
    pub totp_encryption_key: String,
    pub rate_limit: RateLimitConfig,
    /// 密码/邮箱/用户名修改的冷却期（天）
    pub field_change_cooldown_days: i64,
    pub cache: CacheConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            issuer: "memo".to_string(),
            audience: "memo-app".to_string(),
            access_token_expiration: 900,
            refresh_token_expiration: 604_800,
            temp_token_expiration: 300,
            password_algorithm: "bcrypt".to_string(),
            bcrypt_cost: 12,
            totp_issuer: "Memo".to_string(),
            totp_encryption_key: "change-me-in-production".to_string(),
            rate_limit: RateLimitConfig::default(),
            field_change_cooldown_days: 14,
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_attempts: u64,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub cache_type: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: "redis".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".memo").join("memo.toml");

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("memo.toml").required(false))
            .add_source(config::File::from(config_path.as_path()).required(false))
            .add_source(config::Environment::with_prefix("MEMO").separator("__"));

        // 如果存在.env文件，加载它
        if dotenv::dotenv().is_ok() {
            builder = builder.add_source(config::Environment::with_prefix("MEMO").separator("__"));
        }

        let config = builder.build()?;
        config.try_deserialize()
    }
}
