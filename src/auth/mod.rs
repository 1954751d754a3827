//! Password hashing, bearer tokens and the request guard built on them

mod middleware;
mod password;
mod token;

pub use middleware::{require_auth, AuthUser};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenService};
