//! Grade mapping policy.
//!
//! The classifier only knows "fresh" and "rotten". Buyers and sellers work
//! with three grades, so the classifier confidence is used as a severity
//! proxy: a very confident "fresh" is premium, a very confident "rotten" is
//! rejected, and everything in between lands in the middle tier.

use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

/// Confidence a FRESH result must exceed to earn grade A
pub const FRESH_GRADE_A_THRESHOLD: f32 = 92.0;

/// Confidence a ROTTEN result must exceed to be rejected
pub const ROTTEN_GRADE_C_THRESHOLD: f32 = 80.0;

/// Mock mode grade weights, in `Grade::ALL` order
pub const MOCK_GRADE_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];

/// Mock mode confidence range, inclusive
pub const MOCK_CONFIDENCE_RANGE: (f32, f32) = (85.0, 99.0);

/// Output of the binary classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLabel {
    Fresh,
    Rotten,
}

impl RawLabel {
    /// Labels in model output order
    pub const ALL: [RawLabel; 2] = [RawLabel::Fresh, RawLabel::Rotten];
}

impl fmt::Display for RawLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawLabel::Fresh => write!(f, "fresh"),
            RawLabel::Rotten => write!(f, "rotten"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: RawLabel,

    /// Percentage in [0, 100]
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::A, Grade::B, Grade::C];

    /// Status phrase used when no classification backs the grade
    pub fn default_status(self) -> &'static str {
        match self {
            Grade::A => "Excellent, ready to sell",
            Grade::B => "Good, minor issues",
            Grade::C => "Rejected",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::A => write!(f, "Grade A"),
            Grade::B => write!(f, "Grade B"),
            Grade::C => write!(f, "Grade C"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeDecision {
    pub grade: Grade,
    pub status: &'static str,
}

/// Map a live classification onto a grade.
pub fn map_grade(result: &ClassificationResult) -> GradeDecision {
    let (grade, status) = match result.label {
        RawLabel::Fresh if result.confidence > FRESH_GRADE_A_THRESHOLD => {
            (Grade::A, "Excellent, ready to sell")
        }
        RawLabel::Fresh => (Grade::B, "Good, minor issues"),
        RawLabel::Rotten if result.confidence > ROTTEN_GRADE_C_THRESHOLD => {
            (Grade::C, "Rejected")
        }
        RawLabel::Rotten => (Grade::B, "Minor damage but acceptable"),
    };

    GradeDecision { grade, status }
}

/// Synthesize a grade and confidence when no model is available.
pub fn sample_mock<R: Rng + ?Sized>(rng: &mut R) -> (GradeDecision, f32) {
    // weights are non-empty, finite and positive
    let dist = WeightedIndex::new(MOCK_GRADE_WEIGHTS).expect("valid mock grade weights");
    let grade = Grade::ALL[dist.sample(rng)];
    let (lo, hi) = MOCK_CONFIDENCE_RANGE;
    let confidence = rng.gen_range(lo..=hi);

    let decision = GradeDecision {
        grade,
        status: grade.default_status(),
    };

    (decision, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn grade_of(label: RawLabel, confidence: f32) -> Grade {
        map_grade(&ClassificationResult { label, confidence }).grade
    }

    #[test]
    fn fresh_is_grade_a_only_above_threshold() {
        assert_eq!(grade_of(RawLabel::Fresh, 95.0), Grade::A);
        assert_eq!(grade_of(RawLabel::Fresh, 92.01), Grade::A);
        assert_eq!(grade_of(RawLabel::Fresh, 92.0), Grade::B);
        assert_eq!(grade_of(RawLabel::Fresh, 50.0), Grade::B);
        assert_eq!(grade_of(RawLabel::Fresh, 0.0), Grade::B);
    }

    #[test]
    fn rotten_is_rejected_only_above_threshold() {
        assert_eq!(grade_of(RawLabel::Rotten, 85.0), Grade::C);
        assert_eq!(grade_of(RawLabel::Rotten, 80.01), Grade::C);
        assert_eq!(grade_of(RawLabel::Rotten, 80.0), Grade::B);
        assert_eq!(grade_of(RawLabel::Rotten, 10.0), Grade::B);
    }

    #[test]
    fn mapping_is_total_over_confidence_sweep() {
        for step in 0..=1000 {
            let c = step as f32 / 10.0;

            let fresh = grade_of(RawLabel::Fresh, c);
            assert_eq!(fresh == Grade::A, c > FRESH_GRADE_A_THRESHOLD, "fresh at {}", c);
            assert_ne!(fresh, Grade::C);

            let rotten = grade_of(RawLabel::Rotten, c);
            assert_eq!(rotten == Grade::C, c > ROTTEN_GRADE_C_THRESHOLD, "rotten at {}", c);
            assert_ne!(rotten, Grade::A);
        }
    }

    #[test]
    fn status_distinguishes_the_two_grade_b_paths() {
        let fresh = map_grade(&ClassificationResult {
            label: RawLabel::Fresh,
            confidence: 70.0,
        });
        let rotten = map_grade(&ClassificationResult {
            label: RawLabel::Rotten,
            confidence: 70.0,
        });

        assert_eq!(fresh.status, "Good, minor issues");
        assert_eq!(rotten.status, "Minor damage but acceptable");
    }

    #[test]
    fn mock_distribution_matches_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let runs = 20_000;
        let mut counts: HashMap<Grade, usize> = HashMap::new();

        for _ in 0..runs {
            let (decision, confidence) = sample_mock(&mut rng);
            assert!((85.0..=99.0).contains(&confidence));
            assert_eq!(decision.status, decision.grade.default_status());
            *counts.entry(decision.grade).or_default() += 1;
        }

        for (grade, weight) in Grade::ALL.iter().zip(MOCK_GRADE_WEIGHTS) {
            let share = counts[grade] as f64 / runs as f64;
            assert!(
                (share - weight).abs() < 0.02,
                "{} share {} too far from {}",
                grade,
                share,
                weight
            );
        }
    }

    #[test]
    fn grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::A).unwrap(), "\"A\"");
        assert_eq!(serde_json::to_string(&RawLabel::Rotten).unwrap(), "\"rotten\"");
        assert_eq!(Grade::C.to_string(), "Grade C");
    }
}
