pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod stations;
pub mod template;
pub mod verify;
