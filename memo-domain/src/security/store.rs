use crate::security::User;
use async_trait::async_trait;

/// 外部用户存储的接口边界
///
/// 用户档案的CRUD由外部文档存储负责，认证子系统只读写
/// 凭证相关字段。测试中用内存实现替代。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按稳定标识获取用户
    async fn get(&self, id: &str)
        -> Result<Option<User>, Box<dyn std::error::Error + Send + Sync>>;

    /// 按用户名查找用户
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Box<dyn std::error::Error + Send + Sync>>;

    /// 更新用户记录
    async fn update(&self, user: &User) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
