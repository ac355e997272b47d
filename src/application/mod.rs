pub mod catalog;
pub mod harvest_service;
