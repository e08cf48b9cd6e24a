//! Produce quality grading on top of a binary fresh/rotten image classifier.
//!
//! A [`ModelResolver`] turns the model artifact into a [`ModelState`] once at
//! startup. A [`GradingService`] then grades staged uploads against it,
//! mapping the classifier output onto grades A/B/C and attaching sampled
//! presentation metrics.

pub mod classifier;
pub mod crop_net;
pub mod error;
pub mod grade;
pub mod metrics;
pub mod resolver;
#[cfg(feature = "tensorflow")]
pub mod saved_model;
pub mod service;
pub mod timer;
pub mod upload;

pub use classifier::Classifier;
pub use error::{Error, Result};
pub use grade::{map_grade, ClassificationResult, Grade, GradeDecision, RawLabel};
pub use metrics::MetricsBundle;
pub use resolver::{ModelLoader, ModelResolver, ModelState, WeightsLoader};
pub use service::{GradeReport, GradeSource, GradingService};
pub use timer::Timer;
pub use upload::TempUpload;
