pub mod api;
pub mod config;
pub mod model;

pub use api::route::{create_router, AppState};
