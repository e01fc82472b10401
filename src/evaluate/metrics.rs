//! Class-based metrics at a fixed cutoff

use serde::Serialize;

use crate::error::{DataError, Result};

/// Counts of a binary classifier against the truth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    /// Classify `scores >= cutoff` as the event. A NaN score is never
    /// above the cutoff, so it counts as a non-event call.
    pub fn from_scores(truth: &[bool], scores: &[f64], cutoff: f64) -> Result<Self> {
        let predicted: Vec<bool> = scores.iter().map(|&s| s >= cutoff).collect();
        Self::from_classes(truth, &predicted)
    }

    pub fn from_classes(truth: &[bool], predicted: &[bool]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(DataError::LengthMismatch {
                truth: truth.len(),
                predicted: predicted.len(),
            }
            .into());
        }
        let mut m = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (true, true) => m.true_positive += 1,
                (false, true) => m.false_positive += 1,
                (false, false) => m.true_negative += 1,
                (true, false) => m.false_negative += 1,
            }
        }
        Ok(m)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    // The rates below are NaN when their denominator is empty: no rows at
    // all for accuracy, no events or no non-events for the other two.

    pub fn accuracy(&self) -> f64 {
        (self.true_positive + self.true_negative) as f64 / self.total() as f64
    }

    pub fn sensitivity(&self) -> f64 {
        self.true_positive as f64 / (self.true_positive + self.false_negative) as f64
    }

    pub fn specificity(&self) -> f64 {
        self.true_negative as f64 / (self.true_negative + self.false_positive) as f64
    }
}

/// Share of rows where the predicted class equals the truth
pub fn accuracy(truth: &[bool], predicted: &[bool]) -> Result<f64> {
    Ok(ConfusionMatrix::from_classes(truth, predicted)?.accuracy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitflowError;

    #[test]
    fn test_confusion_counts() {
        let truth = [true, true, false, false, true];
        let scores = [0.9, 0.2, 0.6, 0.1, 0.5];
        let m = ConfusionMatrix::from_scores(&truth, &scores, 0.5).unwrap();
        assert_eq!(m.true_positive, 2);
        assert_eq!(m.false_negative, 1);
        assert_eq!(m.false_positive, 1);
        assert_eq!(m.true_negative, 1);
        assert!((m.accuracy() - 0.6).abs() < 1e-12);
        assert!((m.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[true, false], &[true, true]).unwrap(), 0.5);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = ConfusionMatrix::from_classes(&[true, false, true], &[true]).unwrap_err();
        assert!(matches!(
            err,
            FitflowError::Data(DataError::LengthMismatch { truth: 3, predicted: 1 })
        ));
        assert!(accuracy(&[true], &[true, false]).is_err());
    }

    #[test]
    fn test_empty_denominators_are_nan() {
        let m = ConfusionMatrix::from_classes(&[], &[]).unwrap();
        assert!(m.accuracy().is_nan());

        let events_only = ConfusionMatrix::from_scores(&[true, true], &[0.9, 0.1], 0.5).unwrap();
        assert_eq!(events_only.sensitivity(), 0.5);
        assert!(events_only.specificity().is_nan());
    }
}
