pub mod artifacts;
pub mod balancer;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod registry;
pub mod search;
pub mod selector;
pub mod serving;

pub use config::Config;
pub use data_loader::{DataLoader, Dataset};
pub use error::{PipelineError, Result};
pub use pipeline::{RunReport, TrainingPipeline};
pub use serving::{Potability, Predictor};
