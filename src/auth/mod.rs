//! Authentication: password hashing, one-time codes, sessions and flows.

pub mod flow;
pub mod password;
pub mod session;
pub mod two_factor;

pub use flow::{AuthGrant, AuthService};
pub use session::{Session, SessionClaims, SessionManager};
pub use two_factor::{CodePurpose, TwoFactorEngine};
