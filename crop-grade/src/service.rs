use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, ImageReader};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;

use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::grade::{map_grade, sample_mock, ClassificationResult, Grade, GradeDecision, RawLabel};
use crate::metrics::{sample_metrics, MetricsBundle};
use crate::resolver::ModelState;
use crate::timer::Timer;

/// Answer used when the model fails on a request
pub const FALLBACK_GRADE: Grade = Grade::B;
pub const FALLBACK_CONFIDENCE: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeSource {
    /// Graded from a live classification
    Model,
    /// No model available, grade synthesized
    Mock,
    /// The model failed on this image
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub grade: Grade,

    /// Display form, e.g. "Grade A"
    pub quality: String,

    pub status: String,

    /// Percentage in [0, 100]
    pub confidence: f32,

    /// Confidence formatted with two decimals, e.g. "95.00%"
    pub confidence_label: String,

    /// Raw classifier label, only present for live classifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<RawLabel>,

    pub source: GradeSource,

    pub metrics: MetricsBundle,

    /// Time spent decoding and classifying the image
    pub processing_time_ms: i64,
}

impl GradeReport {
    fn new<R: Rng + ?Sized>(
        decision: GradeDecision,
        confidence: f32,
        label: Option<RawLabel>,
        source: GradeSource,
        rng: &mut R,
    ) -> Self {
        GradeReport {
            grade: decision.grade,
            quality: decision.grade.to_string(),
            status: decision.status.to_owned(),
            confidence,
            confidence_label: format!("{:.2}%", confidence),
            label,
            source,
            metrics: sample_metrics(decision.grade, rng),
            processing_time_ms: 0,
        }
    }
}

/// Grades staged images against the model resolved at startup.
pub struct GradingService {
    model: ModelState,
}

impl GradingService {
    pub fn new(model: ModelState) -> Self {
        GradingService { model }
    }

    pub fn model(&self) -> &ModelState {
        &self.model
    }

    pub fn grade_file(&self, path: &Path) -> GradeReport {
        self.grade_file_with(path, &mut rand::thread_rng())
    }

    /// Grade the image at `path`. Never fails: model errors turn into the
    /// fallback grade.
    pub fn grade_file_with<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> GradeReport {
        let mut t = Timer::started("Grading image");

        let mut report = match &self.model {
            ModelState::Mock => {
                let (decision, confidence) = sample_mock(rng);
                debug!("Mock prediction {} ({:.2}%)", decision.grade, confidence);
                GradeReport::new(decision, confidence, None, GradeSource::Mock, rng)
            }
            ModelState::Loaded { classifier, .. } => match classify_guarded(classifier.as_ref(), path) {
                Ok(result) => {
                    let decision = map_grade(&result);
                    info!(
                        "Classified {} as {} ({:.2}%): {}",
                        path.display(),
                        result.label,
                        result.confidence,
                        decision.grade
                    );
                    GradeReport::new(
                        decision,
                        result.confidence,
                        Some(result.label),
                        GradeSource::Model,
                        rng,
                    )
                }
                Err(err) => {
                    warn!("Grading {} failed, using fallback: {}", path.display(), err);
                    let decision = GradeDecision {
                        grade: FALLBACK_GRADE,
                        status: FALLBACK_GRADE.default_status(),
                    };
                    GradeReport::new(decision, FALLBACK_CONFIDENCE, None, GradeSource::Fallback, rng)
                }
            },
        };

        report.processing_time_ms = t.stop();
        report
    }
}

fn load_image(path: &Path) -> Result<DynamicImage> {
    let mut t = Timer::started("Loading image");
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    t.stop();

    Ok(image)
}

/// Decode and classify, turning panics inside the model into errors.
fn classify_guarded(classifier: &dyn Classifier, path: &Path) -> Result<ClassificationResult> {
    let image = load_image(path)?;

    panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(&image))).unwrap_or_else(|cause| {
        let msg = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "classifier panicked".to_owned());
        Err(Error::Inference(msg))
    })
}
