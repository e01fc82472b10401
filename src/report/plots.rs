//! Terminal charts drawn with textplots

use textplots::{Chart, Plot, Shape};

use crate::evaluate::RocPoint;

const WIDTH: u32 = 120;
const HEIGHT: u32 = 60;

/// Samples per drawn segment when a line is rendered as points
const SEGMENT_SAMPLES: usize = 40;

/// Observations and a fitted line for one group
pub struct GroupSeries {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    /// Fitted line as `(intercept, slope)`
    pub line: (f64, f64),
}

/// Point estimate with interval, drawn as an error bar
pub struct ErrorBar {
    pub label: String,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

fn to_f32(points: &[(f64, f64)]) -> Vec<(f32, f32)> {
    points.iter().map(|&(x, y)| (x as f32, y as f32)).collect()
}

/// ROC curve with the chance diagonal
pub fn roc_plot(curve: &[RocPoint]) {
    let line: Vec<(f32, f32)> = curve
        .iter()
        .filter(|p| p.sensitivity.is_finite() && p.specificity.is_finite())
        .map(|p| (p.fpr() as f32, p.sensitivity as f32))
        .collect();
    let diagonal = [(0.0f32, 0.0f32), (1.0, 1.0)];

    println!("    sensitivity vs 1 - specificity");
    Chart::new_with_y_range(WIDTH, HEIGHT, 0.0, 1.0, 0.0, 1.0)
        .lineplot(&Shape::Lines(&line))
        .lineplot(&Shape::Lines(&diagonal))
        .display();
}

/// Scatter of each group with its fitted straight line
pub fn scatter_with_fits(groups: &[GroupSeries], x_label: &str, y_label: &str) {
    let xs = groups.iter().flat_map(|g| g.points.iter().map(|p| p.0));
    let (x_min, x_max) = bounds(xs);
    if !x_min.is_finite() || x_max <= x_min {
        return;
    }

    let scatter: Vec<(f32, f32)> = groups.iter().flat_map(|g| to_f32(&g.points)).collect();
    let fits: Vec<(f32, f32)> = groups
        .iter()
        .flat_map(|g| {
            let (a, b) = g.line;
            segment((x_min, a + b * x_min), (x_max, a + b * x_max))
        })
        .collect();

    println!("    {} vs {}", y_label, x_label);
    Chart::new(WIDTH, HEIGHT, x_min as f32, x_max as f32)
        .lineplot(&Shape::Points(&scatter))
        .lineplot(&Shape::Points(&fits))
        .display();

    let legend: Vec<String> = groups
        .iter()
        .map(|g| format!("{}: slope {:.5}", g.label, g.line.1))
        .collect();
    println!("    {}", legend.join("   "));
}

/// Error bars at x = 1, 2, ... in the order given
pub fn error_bar_plot(bars: &[ErrorBar], y_label: &str) {
    if bars.is_empty() {
        return;
    }
    let segments = error_bar_points(bars);

    println!("    {} (point estimate and interval)", y_label);
    Chart::new(WIDTH, HEIGHT, 0.5, bars.len() as f32 + 0.5)
        .lineplot(&Shape::Points(&segments))
        .display();

    let legend: Vec<String> = bars
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{} = {}", i + 1, b.label))
        .collect();
    println!("    {}", legend.join("   "));
}

/// Densely sampled points for every bar: the vertical interval, both caps
/// and a short horizontal tick at the estimate
pub fn error_bar_points(bars: &[ErrorBar]) -> Vec<(f32, f32)> {
    let mut points = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        let x = (i + 1) as f64;
        points.extend(segment((x, bar.lower), (x, bar.upper)));
        for y in [bar.lower, bar.upper] {
            points.extend(segment((x - 0.08, y), (x + 0.08, y)));
        }
        points.extend(segment((x - 0.15, bar.estimate), (x + 0.15, bar.estimate)));
    }
    points
}

fn segment(from: (f64, f64), to: (f64, f64)) -> impl Iterator<Item = (f32, f32)> {
    (0..=SEGMENT_SAMPLES).map(move |k| {
        let t = k as f64 / SEGMENT_SAMPLES as f64;
        (
            (from.0 + t * (to.0 - from.0)) as f32,
            (from.1 + t * (to.1 - from.1)) as f32,
        )
    })
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_bar_points_cover_interval() {
        let bars = vec![
            ErrorBar {
                label: "Initial".into(),
                estimate: 0.1,
                lower: 0.05,
                upper: 0.15,
            },
            ErrorBar {
                label: "Low".into(),
                estimate: 0.2,
                lower: 0.18,
                upper: 0.22,
            },
        ];
        let points = error_bar_points(&bars);
        assert_eq!(points.len(), 2 * 4 * (SEGMENT_SAMPLES + 1));

        let first_bar: Vec<f32> = points
            .iter()
            .filter(|p| (p.0 - 1.0).abs() < 1e-6)
            .map(|p| p.1)
            .collect();
        let lo = first_bar.iter().cloned().fold(f32::INFINITY, f32::min);
        let hi = first_bar.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!((lo - 0.05).abs() < 1e-6);
        assert!((hi - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds([3.0, -1.0, 2.0].into_iter()), (-1.0, 3.0));
    }
}
