#![forbid(unsafe_code)]

pub mod access_service;
pub mod account_service;
pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod gate;
pub mod password;
pub mod progress_service;

pub use lessons_core::Clock;

pub use access_service::{AccessService, GrantListing};
pub use account_service::{AccountService, LoginSession};
pub use app_services::AppServices;
pub use catalog_service::CatalogService;
pub use error::{
    AccessServiceError, AccountServiceError, AppServicesError, CatalogServiceError,
    ProgressServiceError,
};
pub use gate::{NotStaff, Staff};
pub use progress_service::{LessonView, ProgressService};
