// src/config/mod.rs
pub mod annotator;
pub mod app;

pub use annotator::AnnotatorConfig;
pub use app::AppConfig;
