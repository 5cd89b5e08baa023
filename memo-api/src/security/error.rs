use thiserror::Error;

/// 认证子系统的错误分类
///
/// 预期内的业务失败（密码错误、令牌无效、限流等）使用具体的变体；
/// 基础设施故障（缓存/存储不可达、签名失败）统一归入`Internal`，
/// 边界层必须将其与面向用户的变体区分开，不得静默吞掉。
#[derive(Error, Debug)]
pub enum AuthError {
    /// 凭证无效（密码错误或用户不存在，对调用方不做区分）
    #[error("invalid credentials")]
    InvalidCredentials,

    /// 令牌无效（签名、签发者、受众不匹配或已被吊销）
    #[error("invalid token")]
    InvalidToken,

    /// 令牌类型不匹配（如用临时令牌访问会话端点）
    #[error("invalid token type")]
    InvalidTokenType,

    /// 令牌已过期
    #[error("token expired")]
    TokenExpired,

    /// 请求被限流，仅告知"稍后再试"
    #[error("too many attempts, try again later")]
    RateLimited,

    /// 两步验证尚未开始设置
    #[error("two-factor setup not started")]
    TwoFactorSetupNotStarted,

    /// 两步验证已启用
    #[error("two-factor already enabled")]
    TwoFactorAlreadyEnabled,

    /// 两步验证码无效
    #[error("invalid two-factor code")]
    InvalidTwoFactorCode,

    /// 没有可用的恢复码
    #[error("recovery codes unavailable")]
    RecoveryCodesUnavailable,

    /// 违反策略（密码/邮箱/用户名格式或修改冷却期）
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// 内部错误（基础设施故障），与所有面向用户的变体区分
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// 边界层将这些变体统一映射为"未授权"响应，
    /// 避免向外部泄露失败的具体原因
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::InvalidTokenType
                | AuthError::TokenExpired
        )
    }

    /// 是否为基础设施故障
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Internal(_))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for AuthError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<String> for AuthError {
    fn from(err: String) -> Self {
        AuthError::Internal(err)
    }
}

impl From<&str> for AuthError {
    fn from(err: &str) -> Self {
        AuthError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
