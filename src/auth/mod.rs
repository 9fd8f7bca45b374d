//! Bearer-token auth: JWT issuing/verification, password hashing, and the
//! request extractors that gate protected routes.

pub mod extract;
pub mod jwt;
pub mod password;

pub use extract::{AdminUser, CurrentUser, MaybeUser};
