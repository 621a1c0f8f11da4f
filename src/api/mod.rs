//! Typed services over the campus REST API.
//!
//! Each service borrows the [`crate::CampusClient`] and sends through its
//! pipeline, so every call takes part in the refresh protocol.

mod assignments;
mod auth;
mod courses;
mod forums;

pub use assignments::AssignmentsApi;
pub use auth::AuthApi;
pub use courses::CoursesApi;
pub use forums::ForumsApi;
