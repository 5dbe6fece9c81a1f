mod error;
pub use error::*;

pub mod app;
pub mod config;
pub mod database;
pub mod models;
pub mod schema;
pub(crate) mod time_utils;
pub mod ui;
pub mod view;
