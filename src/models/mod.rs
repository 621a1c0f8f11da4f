pub mod assignment;
pub mod auth;
pub mod course;
pub mod forum;
