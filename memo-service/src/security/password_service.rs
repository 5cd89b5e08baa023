use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use memo_api::security::{AuthError, Result};

/// 密码加密算法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordAlgorithm {
    Bcrypt,
    Argon2,
}

/// 密码策略校验
///
/// 至少8个字符、至少2个数字、至少2个非字母数字字符。
/// 不满足时报告`PolicyViolation`，绝不静默放行。
pub fn validate_password_policy(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(AuthError::PolicyViolation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let digits = password.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 2 {
        return Err(AuthError::PolicyViolation(
            "password must contain at least 2 digits".to_string(),
        ));
    }

    let symbols = password.chars().filter(|c| !c.is_alphanumeric()).count();
    if symbols < 2 {
        return Err(AuthError::PolicyViolation(
            "password must contain at least 2 special characters".to_string(),
        ));
    }

    Ok(())
}

/// 密码服务trait
#[async_trait]
pub trait PasswordService: Send + Sync {
    /// 校验策略并加密密码
    async fn hash(&self, password: &str) -> Result<String>;

    /// 验证密码
    ///
    /// 比较由底层原语以恒定时间完成；不匹配返回false而不是错误
    async fn verify(&self, password: &str, hash: &str) -> Result<bool>;

    /// 获取使用的加密算法
    fn algorithm(&self) -> PasswordAlgorithm;
}

/// 默认密码服务实现
pub struct DefaultPasswordService {
    algorithm: PasswordAlgorithm,
    bcrypt_cost: u32,
}

impl DefaultPasswordService {
    pub fn new(algorithm: PasswordAlgorithm) -> Self {
        Self {
            algorithm,
            bcrypt_cost: DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }
}

#[async_trait]
impl PasswordService for DefaultPasswordService {
    async fn hash(&self, password: &str) -> Result<String> {
        validate_password_policy(password)?;

        match self.algorithm {
            PasswordAlgorithm::Bcrypt => hash(password, self.bcrypt_cost)
                .map_err(|e| AuthError::Internal(format!("Bcrypt hash error: {}", e))),
            PasswordAlgorithm::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                let argon2 = Argon2::default();
                let password_hash = argon2
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| AuthError::Internal(format!("Argon2 hash error: {}", e)))?;
                Ok(password_hash.to_string())
            }
        }
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        match self.algorithm {
            PasswordAlgorithm::Bcrypt => verify(password, hash)
                .map_err(|e| AuthError::Internal(format!("Bcrypt verify error: {}", e))),
            PasswordAlgorithm::Argon2 => {
                let parsed_hash = PasswordHash::new(hash)
                    .map_err(|e| AuthError::Internal(format!("Argon2 parse hash error: {}", e)))?;
                let argon2 = Argon2::default();
                match argon2.verify_password(password.as_bytes(), &parsed_hash) {
                    Ok(()) => Ok(true),
                    Err(argon2::password_hash::Error::Password) => Ok(false),
                    Err(e) => Err(AuthError::Internal(format!("Argon2 verify error: {}", e))),
                }
            }
        }
    }

    fn algorithm(&self) -> PasswordAlgorithm {
        self.algorithm
    }
}
