pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{PipelineError, RecordStage};
pub use models::{SizeSpec, StorageLocator};
pub use services::processor::{BatchReport, RecordOutcome, RecordProcessor, RecordStatus};
pub use services::storage::StorageService;
