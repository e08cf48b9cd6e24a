//! Presentational quality metrics.
//!
//! These numbers are sampled, not measured. They only depend on the grade.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::Serialize;

use crate::grade::Grade;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsBundle {
    pub freshness: u8,
    pub ripeness: u8,
    pub texture: u8,
    pub color: u8,
    pub shelf_life: String,
    pub recommendation: String,
}

/// Sampling table for one grade
pub struct MetricRanges {
    pub freshness: RangeInclusive<u8>,
    pub ripeness: RangeInclusive<u8>,
    pub texture: RangeInclusive<u8>,
    pub color: RangeInclusive<u8>,
    pub shelf_life: &'static str,
    pub recommendation: &'static str,
}

impl MetricRanges {
    pub fn for_grade(grade: Grade) -> Self {
        match grade {
            Grade::A => MetricRanges {
                freshness: 90..=99,
                ripeness: 85..=98,
                texture: 88..=99,
                color: 90..=99,
                shelf_life: "7-10 days",
                recommendation: "Premium quality. List at top market price.",
            },
            Grade::B => MetricRanges {
                freshness: 70..=89,
                ripeness: 65..=84,
                texture: 70..=87,
                color: 70..=89,
                shelf_life: "4-6 days",
                recommendation: "Good quality. Sell within the week.",
            },
            Grade::C => MetricRanges {
                freshness: 20..=59,
                ripeness: 15..=49,
                texture: 20..=55,
                color: 25..=59,
                shelf_life: "1-2 days",
                recommendation: "Not fit for retail. Divert to processing or compost.",
            },
        }
    }

    pub fn contains(&self, metrics: &MetricsBundle) -> bool {
        self.freshness.contains(&metrics.freshness)
            && self.ripeness.contains(&metrics.ripeness)
            && self.texture.contains(&metrics.texture)
            && self.color.contains(&metrics.color)
            && metrics.shelf_life == self.shelf_life
            && metrics.recommendation == self.recommendation
    }
}

pub fn sample_metrics<R: Rng + ?Sized>(grade: Grade, rng: &mut R) -> MetricsBundle {
    let ranges = MetricRanges::for_grade(grade);

    MetricsBundle {
        freshness: rng.gen_range(ranges.freshness.clone()),
        ripeness: rng.gen_range(ranges.ripeness.clone()),
        texture: rng.gen_range(ranges.texture.clone()),
        color: rng.gen_range(ranges.color.clone()),
        shelf_life: ranges.shelf_life.to_owned(),
        recommendation: ranges.recommendation.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_within_grade_bounds() {
        let mut rng = StdRng::seed_from_u64(42);

        for grade in Grade::ALL {
            let ranges = MetricRanges::for_grade(grade);
            for _ in 0..2_000 {
                let metrics = sample_metrics(grade, &mut rng);
                assert!(ranges.contains(&metrics), "{:?} out of range for {}", metrics, grade);
            }
        }
    }

    #[test]
    fn grade_ranges_do_not_overlap_on_freshness() {
        let a = MetricRanges::for_grade(Grade::A);
        let b = MetricRanges::for_grade(Grade::B);
        let c = MetricRanges::for_grade(Grade::C);

        assert!(b.freshness.end() < a.freshness.start());
        assert!(c.freshness.end() < b.freshness.start());
    }

    #[test]
    fn bundle_serializes_with_snake_case_keys() {
        let mut rng = StdRng::seed_from_u64(1);
        let value = serde_json::to_value(sample_metrics(Grade::C, &mut rng)).unwrap();

        assert_eq!(value["shelf_life"], "1-2 days");
        assert!(value["freshness"].as_u64().unwrap() <= 59);
    }
}
