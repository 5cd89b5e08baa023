pub mod security;

pub use security::{
    AccountService, AuthService, DefaultPasswordService, DefaultTotpAuthService, LoginTokens,
    PasswordAlgorithm, PasswordService, TotpAuthService, TwoFactorService, TwoFactorSetup,
};
