//! API route handlers

pub mod error;
pub mod inventory;
pub mod system;

pub use error::{ApiError, AppError};
