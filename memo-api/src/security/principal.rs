use serde::{Deserialize, Serialize};

/// 认证后的用户信息
///
/// 由已验证的访问令牌还原，供上层请求处理使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// 用户的稳定标识
    pub id: String,
    /// 展示名称
    pub display_name: String,
}

impl AuthenticatedUser {
    pub fn new(id: String, display_name: String) -> Self {
        Self { id, display_name }
    }
}
