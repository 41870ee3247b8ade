pub mod config;
pub mod job;
pub mod logging;
pub mod version;
