//! ROC curve and area under it

use serde::Serialize;

use crate::error::{DataError, Result};

/// One operating point of a ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    /// Rows with `score >= threshold` are called positive
    pub threshold: f64,
    pub specificity: f64,
    pub sensitivity: f64,
}

impl RocPoint {
    /// False positive rate, the x axis of the usual plot
    pub fn fpr(&self) -> f64 {
        1.0 - self.specificity
    }
}

/// ROC curve over every distinct score.
///
/// Points run from threshold `-inf` (sensitivity 1, specificity 0) through
/// each distinct score in ascending order to `+inf` (sensitivity 0,
/// specificity 1). `truth` marks the event rows. With no events or no
/// non-events the corresponding rate is NaN.
pub fn roc_curve(truth: &[bool], scores: &[f64]) -> Result<Vec<RocPoint>> {
    let order = ranked(truth, scores)?;
    let positives = truth.iter().filter(|&&t| t).count() as f64;
    let negatives = truth.len() as f64 - positives;

    let mut points = Vec::with_capacity(scores.len() + 2);
    points.push(RocPoint {
        threshold: f64::NEG_INFINITY,
        specificity: 0.0,
        sensitivity: 1.0,
    });

    // Rows below the current threshold, by class
    let mut below_pos = 0.0;
    let mut below_neg = 0.0;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        points.push(RocPoint {
            threshold,
            specificity: below_neg / negatives,
            sensitivity: (positives - below_pos) / positives,
        });
        while i < order.len() && scores[order[i]].total_cmp(&threshold).is_eq() {
            if truth[order[i]] {
                below_pos += 1.0;
            } else {
                below_neg += 1.0;
            }
            i += 1;
        }
    }

    points.push(RocPoint {
        threshold: f64::INFINITY,
        specificity: 1.0,
        sensitivity: 0.0,
    });
    Ok(points)
}

/// AUC as the Mann-Whitney statistic: the probability that a random event
/// outscores a random non-event, ties counting one half.
///
/// NaN when `truth` holds a single class.
pub fn roc_auc(truth: &[bool], scores: &[f64]) -> Result<f64> {
    let order = ranked(truth, scores)?;

    let mut negatives_below = 0.0;
    let mut wins = 0.0;
    let mut positives = 0.0;
    let mut negatives = 0.0;
    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        let (mut tied_pos, mut tied_neg) = (0.0, 0.0);
        while i < order.len() && scores[order[i]].total_cmp(&score).is_eq() {
            if truth[order[i]] {
                tied_pos += 1.0;
            } else {
                tied_neg += 1.0;
            }
            i += 1;
        }
        wins += tied_pos * (negatives_below + 0.5 * tied_neg);
        negatives_below += tied_neg;
        positives += tied_pos;
        negatives += tied_neg;
    }

    Ok(wins / (positives * negatives))
}

/// Row indices in ascending score order, after checking the inputs line up
fn ranked(truth: &[bool], scores: &[f64]) -> Result<Vec<usize>> {
    if truth.len() != scores.len() {
        return Err(DataError::LengthMismatch {
            truth: truth.len(),
            predicted: scores.len(),
        }
        .into());
    }
    if let Some((row, &value)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(DataError::NonFiniteScore { row, value }.into());
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    Ok(order)
}

/// Trapezoidal area under a curve from [`roc_curve`]
pub fn auc_trapezoid(curve: &[RocPoint]) -> f64 {
    curve
        .windows(2)
        .map(|w| {
            let width = (w[0].fpr() - w[1].fpr()).abs();
            width * (w[0].sensitivity + w[1].sensitivity) / 2.0
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitflowError;

    #[test]
    fn test_perfect_separation() {
        let truth = [false, false, true, true];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&truth, &scores).unwrap(), 1.0);
        assert_eq!(auc_trapezoid(&roc_curve(&truth, &scores).unwrap()), 1.0);
    }

    #[test]
    fn test_all_tied_is_half() {
        let truth = [true, false, true, false];
        let scores = [0.5; 4];
        assert_eq!(roc_auc(&truth, &scores).unwrap(), 0.5);
        let curve = roc_curve(&truth, &scores).unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(auc_trapezoid(&curve), 0.5);
    }

    #[test]
    fn test_curve_endpoints() {
        let curve = roc_curve(&[true, false, true], &[0.3, 0.6, 0.9]).unwrap();
        let first = curve.first().unwrap();
        let last = curve.last().unwrap();
        assert_eq!((first.sensitivity, first.specificity), (1.0, 0.0));
        assert_eq!((last.sensitivity, last.specificity), (0.0, 1.0));
        assert_eq!(curve.len(), 5);
    }

    #[test]
    fn test_known_auc() {
        // 3 positives x 2 negatives: pairs won = 2 + 1 + 1 = 4 of 6
        let truth = [true, false, true, false, true];
        let scores = [0.9, 0.4, 0.7, 0.8, 0.6];
        assert!((roc_auc(&truth, &scores).unwrap() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_score_rejected() {
        let err = roc_auc(&[true, false, true], &[0.9, f64::NAN, 0.2]).unwrap_err();
        assert!(matches!(
            err,
            FitflowError::Data(DataError::NonFiniteScore { row: 1, .. })
        ));
        let err = roc_curve(&[true, false], &[f64::NAN, 0.3]).unwrap_err();
        assert!(matches!(
            err,
            FitflowError::Data(DataError::NonFiniteScore { row: 0, .. })
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = roc_curve(&[true], &[0.2, 0.4]).unwrap_err();
        assert!(matches!(
            err,
            FitflowError::Data(DataError::LengthMismatch { truth: 1, predicted: 2 })
        ));
        assert!(roc_auc(&[true, false, true], &[0.5]).is_err());
    }

    #[test]
    fn test_single_class_truth() {
        let truth = [true, true, true];
        let scores = [0.2, 0.5, 0.7];
        assert!(roc_auc(&truth, &scores).unwrap().is_nan());
        let curve = roc_curve(&truth, &scores).unwrap();
        assert_eq!(curve.len(), 5);
        assert!(curve[1..4].iter().all(|p| p.specificity.is_nan()));
        assert_eq!(curve[1].sensitivity, 1.0);
    }
}
