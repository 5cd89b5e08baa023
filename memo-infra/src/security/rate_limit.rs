use crate::cache::Cache;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 限流记录
///
/// 以JSON存入共享缓存，TTL等于配置的窗口长度。
/// 每次记录尝试都从"现在"起重新计TTL（滑动窗口），
/// 无活动满一个窗口后记录自动消失。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempts: u64,
    pub first_attempt_at: i64,
    pub last_attempt_at: i64,
    pub blocked: bool,
}

/// 速率限制器trait
///
/// 包裹所有凭证校验和敏感变更入口。限流是威慑而非硬上限：
/// 并发请求可能在彼此写入前读取同一记录，允许少量漏计。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// 检查(来源, 目标身份)是否已被限流
    async fn is_rate_limited(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// 记录一次尝试
    async fn track_attempt(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// 清除尝试记录，在敏感操作真正成功后调用，
    /// 避免之后的一次失误继承接近阈值的计数
    async fn reset_attempts(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// 基于共享缓存的速率限制器实现
///
/// 键由(来源, 目标身份)组合而成：单一被共享的网络地址不会
/// 封禁所有用户，按身份枚举也无法仅靠轮换IP绕过。
pub struct CacheRateLimiter {
    cache: Arc<dyn Cache>,
    prefix: String,
    max_attempts: u64,
    window_seconds: u64,
}

impl CacheRateLimiter {
    pub fn new(cache: Arc<dyn Cache>, max_attempts: u64, window_seconds: u64) -> Self {
        Self {
            cache,
            prefix: "rate_limit:".to_string(),
            max_attempts,
            window_seconds,
        }
    }

    /// 组合键
    ///
    /// 来源带长度前缀，保证来源与身份的边界无歧义（IPv6地址
    /// 本身含冒号，直接拼接会产生碰撞）
    fn record_key(&self, origin: &str, identity: &str) -> String {
        format!("{}{}:{}:{}", self.prefix, origin.len(), origin, identity)
    }

    async fn load(
        &self,
        key: &str,
    ) -> Result<Option<AttemptRecord>, Box<dyn std::error::Error + Send + Sync>> {
        match self.cache.get(key).await? {
            Some(json) => {
                let record: AttemptRecord = serde_json::from_str(&json)
                    .map_err(|e| format!("Deserialize attempt record error: {}", e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn persist(
        &self,
        key: &str,
        record: &AttemptRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let json = serde_json::to_string(record)
            .map_err(|e| format!("Serialize attempt record error: {}", e))?;
        self.cache.set(key, &json, Some(self.window_seconds)).await
    }
}

#[async_trait]
impl RateLimiter for CacheRateLimiter {
    async fn is_rate_limited(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let key = self.record_key(origin, identity);

        let mut record = match self.load(&key).await? {
            Some(record) => record,
            None => return Ok(false),
        };

        if record.blocked {
            return Ok(true);
        }

        if record.attempts >= self.max_attempts {
            // 记录存在即表示最后一次尝试仍在窗口内，转入封禁态，
            // 维持到记录随缓存自然过期
            record.blocked = true;
            self.persist(&key, &record).await?;
            tracing::warn!(origin = origin, identity = identity, "rate limit exceeded");
            return Ok(true);
        }

        Ok(false)
    }

    async fn track_attempt(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = self.record_key(origin, identity);
        let now = Utc::now().timestamp();

        let mut record = self.load(&key).await?.unwrap_or(AttemptRecord {
            attempts: 0,
            first_attempt_at: now,
            last_attempt_at: now,
            blocked: false,
        });

        record.attempts += 1;
        record.last_attempt_at = now;
        if record.attempts >= self.max_attempts {
            record.blocked = true;
        }

        self.persist(&key, &record).await
    }

    async fn reset_attempts(
        &self,
        origin: &str,
        identity: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = self.record_key(origin, identity);
        self.cache.delete(&key).await
    }
}
