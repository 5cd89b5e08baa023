pub mod rate_limit;
pub mod revocation;
pub mod token;

pub use rate_limit::{AttemptRecord, CacheRateLimiter, RateLimiter};
pub use revocation::RevocationStore;
pub use token::{Claims, TokenPair, TokenService};
