pub mod error_pages;
pub mod logging;
