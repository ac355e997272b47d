pub mod application;
pub mod config;
pub mod domain;
pub mod harvest_runner;
pub mod infrastructure;
