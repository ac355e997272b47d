pub mod date_window;
pub mod error;
pub mod models;
pub mod ports;
pub mod transforms;
