pub mod account_service;
pub mod auth_service;
pub mod password_service;
pub mod totp_service;
pub mod two_factor_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use account_service::{remaining_cooldown, AccountService};
pub use auth_service::AuthService;
pub use password_service::{DefaultPasswordService, PasswordAlgorithm, PasswordService};
pub use totp_service::{DefaultTotpAuthService, TotpAuthService};
pub use two_factor_service::{LoginTokens, TwoFactorService, TwoFactorSetup};
