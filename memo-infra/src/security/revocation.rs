use crate::cache::Cache;
use memo_api::security::{AuthError, Result};
use std::sync::Arc;

/// 吊销名单（黑名单）
///
/// 对共享缓存的薄封装：带TTL写入、存在性检查、删除。
/// 键为令牌原文，值为哨兵。重复吊销同一令牌时写入照常进行
/// （幂等，后写覆盖先写），这样重复登出调用是安全的。
pub struct RevocationStore {
    cache: Arc<dyn Cache>,
    prefix: String,
}

impl RevocationStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            prefix: "blacklist:".to_string(),
        }
    }

    fn entry_key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }

    /// 写入吊销条目，TTL等于令牌的剩余有效期
    ///
    /// 调用方负责保证ttl为正：条目绝不能比它所吊销的令牌活得更久
    pub async fn insert(&self, token: &str, ttl_seconds: u64) -> Result<()> {
        self.cache
            .set(&self.entry_key(token), "1", Some(ttl_seconds))
            .await
            .map_err(AuthError::from)
    }

    /// 令牌是否在吊销名单中
    pub async fn contains(&self, token: &str) -> Result<bool> {
        self.cache
            .exists(&self.entry_key(token))
            .await
            .map_err(AuthError::from)
    }

    /// 删除吊销条目
    pub async fn remove(&self, token: &str) -> Result<()> {
        self.cache
            .delete(&self.entry_key(token))
            .await
            .map_err(AuthError::from)
    }
}
