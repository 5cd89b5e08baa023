pub mod error;
pub mod principal;

pub use error::{AuthError, Result};
pub use principal::AuthenticatedUser;
