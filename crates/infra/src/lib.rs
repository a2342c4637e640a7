pub mod config;
pub mod fcm;
pub mod logging;
pub mod stores;
