pub mod cache;
pub mod security;

pub use cache::{Cache, MemoryCache, RedisCache};
pub use security::{
    AttemptRecord, CacheRateLimiter, Claims, RateLimiter, RevocationStore, TokenPair, TokenService,
};
