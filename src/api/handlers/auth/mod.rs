//! Email code login, bearer sessions, and supporting modules.
//!
//! ## Login Flow
//!
//! 1. `POST /v1/auth/send-code` caches a one-time 6-digit code for the
//!    address and emails it. A cooldown refuses a second send for the same
//!    address until it lapses.
//! 2. `POST /v1/auth/verify-code` consumes the code atomically. First-time
//!    addresses get a profile provisioned on the spot. The response carries a
//!    JWT bearer token.
//! 3. `GET /v1/auth/profile` and `POST /v1/auth/refresh` accept the bearer
//!    token while the profile stays `active`.
//!
//! Codes and cooldowns live in a process-local [`CodeStore`]; restarting the
//! server invalidates outstanding codes, which is acceptable for their 5
//! minute lifetime.

pub(crate) mod codes;
pub(crate) mod principal;
pub(crate) mod send_code;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verify_code;

pub use codes::CodeStore;
pub use state::{AuthConfig, AuthState};
