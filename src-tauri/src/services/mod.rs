pub mod classifier;
pub mod preview_service;
pub mod report_service;
