//! Session management.
//!
//! [`SessionManager`] owns the credentials and serializes token refreshes;
//! [`AuthStatus`] is what it publishes to observers.

mod refresh;
mod session;
mod status;

pub use session::{RefreshOutcome, SessionManager};
pub use status::AuthStatus;
