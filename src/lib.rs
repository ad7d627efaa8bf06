mod routes;

pub mod app;
pub mod config;
pub mod evaluation;
pub mod gradcam;
pub mod model_loader;
pub mod model_service;
pub mod ort_service;
pub mod prediction;
pub mod preprocessing;
pub mod server;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use app::{load_model, start_app};
