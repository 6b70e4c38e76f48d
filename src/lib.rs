pub mod batch;
pub mod config;
pub mod detector;
pub mod drawing;
pub mod error;
pub mod models;

pub use batch::{BatchEvent, BatchRunner, BatchSummary, FailurePolicy, ProgressReporter, run_batch};
pub use config::{Config, InferenceSettings, load_config};
pub use detector::{BoxColumns, Detector, DetectorOutput, YoloDetector};
pub use drawing::{DrawStyle, annotate, resolve_style};
pub use error::BatchError;
pub use models::{Detection, PERSON_CLASS_ID};
