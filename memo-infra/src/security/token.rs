use crate::security::revocation::RevocationStore;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use memo_api::security::{AuthError, Result};
use memo_domain::security::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// 访问令牌有效期（秒），约15分钟
pub const DEFAULT_ACCESS_TOKEN_TTL: u64 = 900;
/// 刷新令牌有效期（秒），7天
pub const DEFAULT_REFRESH_TOKEN_TTL: u64 = 604_800;
/// 临时令牌有效期（秒），5分钟
pub const DEFAULT_TEMP_TOKEN_TTL: u64 = 300;

/// HTTP层设置Cookie时使用的名称（HTTP-only、SameSite=Lax，
/// 登出时以空值加负max-age清除）
pub const ACCESS_TOKEN_COOKIE: &str = "memo_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "memo_refresh_token";

/// JWT Claims结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>, // display name
    pub iss: String, // issuer
    pub aud: String, // audience
    pub iat: usize,  // issued at
    pub exp: usize,  // expiration time
    /// 令牌类型标记："refresh"或"temp"，会话访问令牌不携带
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// 仅临时令牌携带：是否还有可用的恢复码
    #[serde(rename = "recoveryAvailable", skip_serializing_if = "Option::is_none")]
    pub recovery_available: Option<bool>,
}

/// 令牌对：短期访问令牌 + 长期刷新令牌
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// 令牌服务
///
/// 签发、验证、刷新会话令牌与临时（待两步验证）令牌，
/// 并通过吊销名单拒绝已登出的令牌。
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_token_ttl: u64,
    refresh_token_ttl: u64,
    revocation: Arc<RevocationStore>,
}

impl TokenService {
    pub fn new(
        secret: &str,
        issuer: String,
        audience: String,
        access_token_ttl: u64,
        refresh_token_ttl: u64,
        revocation: Arc<RevocationStore>,
    ) -> Result<Self> {
        if secret.is_empty() {
            // 签名密钥配置错误属于启动期致命问题
            return Err(AuthError::Internal("jwt secret must not be empty".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            issuer,
            audience,
            access_token_ttl,
            refresh_token_ttl,
            revocation,
        })
    }

    fn now() -> usize {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0) as usize
    }

    fn base_claims(&self, sub: &str, name: Option<String>, ttl: u64) -> Claims {
        let now = Self::now();
        Claims {
            sub: sub.to_string(),
            name,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + ttl as usize,
            token_type: None,
            recovery_available: None,
        }
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("JWT encode error: {}", e)))
    }

    /// 签发会话令牌对
    pub fn issue_session_tokens(&self, user: &User) -> Result<TokenPair> {
        let access = self.base_claims(
            &user.id,
            Some(user.spec.display_name.clone()),
            self.access_token_ttl,
        );

        let mut refresh = self.base_claims(
            &user.id,
            Some(user.spec.display_name.clone()),
            self.refresh_token_ttl,
        );
        refresh.token_type = Some("refresh".to_string());

        Ok(TokenPair {
            access_token: self.encode_claims(&access)?,
            refresh_token: self.encode_claims(&refresh)?,
        })
    }

    /// 签发临时（待两步验证）令牌
    pub fn issue_temp_token(
        &self,
        user_id: &str,
        ttl: u64,
        recovery_available: bool,
    ) -> Result<String> {
        let mut claims = self.base_claims(user_id, None, ttl);
        claims.token_type = Some("temp".to_string());
        claims.recovery_available = Some(recovery_available);
        self.encode_claims(&claims)
    }

    /// 验证并解码令牌，要求类型标记与期望一致
    ///
    /// 吊销名单先于签名/过期校验检查：被拉黑的令牌即使本身
    /// 仍然有效也会被拒绝
    async fn verify_typed(&self, token: &str, expected_type: Option<&str>) -> Result<Claims> {
        if self.revocation.contains(token).await? {
            return Err(AuthError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        if token_data.claims.token_type.as_deref() != expected_type {
            return Err(AuthError::InvalidTokenType);
        }

        Ok(token_data.claims)
    }

    /// 验证会话访问令牌
    ///
    /// 临时令牌与刷新令牌不会被接受：持有刷新令牌只能换取
    /// 新的访问令牌，不能直接访问资源
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_typed(token, None).await
    }

    /// 验证临时（待两步验证）令牌
    pub async fn verify_temp_token(&self, token: &str) -> Result<Claims> {
        self.verify_typed(token, Some("temp")).await
    }

    /// 用刷新令牌换取新的访问令牌
    ///
    /// 不轮换刷新令牌本身
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.verify_typed(refresh_token, Some("refresh")).await?;

        // 去掉类型标记，按短有效期重新签发
        let access = self.base_claims(&claims.sub, claims.name, self.access_token_ttl);
        self.encode_claims(&access)
    }

    /// 批量吊销令牌
    ///
    /// 只解码exp声明（不重新校验签名）：已过期或即将过期的令牌
    /// 也要按剩余有效期记录。剩余有效期不为正的令牌直接跳过，
    /// 不写入任何条目。单个令牌解码失败只记录日志，不影响批次
    /// 中的其他令牌。
    pub async fn revoke(&self, tokens: &[String]) -> Result<()> {
        let now = Self::now();

        for token in tokens {
            let exp = match self.decode_expiry(token) {
                Ok(exp) => exp,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed token during revocation");
                    continue;
                }
            };

            if exp <= now {
                continue;
            }

            let remaining = (exp - now) as u64;
            self.revocation.insert(token, remaining).await?;
        }

        Ok(())
    }

    /// 令牌是否已被吊销
    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.revocation.contains(token).await
    }

    fn decode_expiry(&self, token: &str) -> Result<usize> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::Internal(format!("JWT decode error: {}", e)))?;

        Ok(token_data.claims.exp)
    }
}
