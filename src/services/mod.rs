//! Business logic services

pub mod auth_service;
pub mod contest_service;
pub mod staging_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use contest_service::ContestService;
pub use staging_service::{StageOutcome, StagingService};
pub use user_service::{AccountChanges, CreatedUser, UserService};
