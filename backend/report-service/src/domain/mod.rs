pub mod filters;
pub mod models;

pub use filters::{ListingQuery, ReportFilter, StatusFilter, TypeFilter};
pub use models::*;
