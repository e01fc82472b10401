//! Console tables for fitted models and evaluation results

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;
use polars::prelude::*;

use crate::error::Result;
use crate::evaluate::ConfusionMatrix;
use crate::model::{Coefficient, ParameterSummary, PRED, PRED_LOWER, PRED_UPPER};
use crate::pipeline::columns::{f64_values, string_values};
use crate::pipeline::JoinReport;

/// R̂ above which a parameter is flagged as not mixed
pub const RHAT_WARNING: f64 = 1.05;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn number(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{:.*}", decimals, value)).set_alignment(CellAlignment::Right)
}

/// Print a table indented to line up with the step output
pub fn print_table(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

/// Print a section title in the summary style
pub fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn format_p_value(p: f64) -> String {
    if p.is_nan() {
        "NaN".to_string()
    } else if p < 1e-4 {
        format!("{:.2e}", p)
    } else {
        format!("{:.4}", p)
    }
}

/// Coefficient estimates with standard errors and tests
pub fn coefficient_table(coefficients: &[Coefficient], statistic: &str) -> Table {
    let mut table = new_table(&["term", "estimate", "std.error", statistic, "p.value"]);
    for c in coefficients {
        let p_cell = Cell::new(format_p_value(c.p_value)).set_alignment(CellAlignment::Right);
        let p_cell = if c.p_value < 0.05 {
            p_cell.fg(Color::Green)
        } else {
            p_cell
        };
        table.add_row(vec![
            Cell::new(&c.term),
            number(c.estimate, 5),
            number(c.std_error, 5),
            number(c.statistic, 3),
            p_cell,
        ]);
    }
    table
}

/// Posterior medians, MAD-SD and split R̂
pub fn posterior_table(summary: &[ParameterSummary]) -> Table {
    let mut table = new_table(&["term", "median", "mad_sd", "rhat"]);
    for row in summary {
        let rhat = number(row.rhat, 3);
        let rhat = if row.rhat > RHAT_WARNING || row.rhat.is_nan() {
            rhat.fg(Color::Red)
        } else {
            rhat
        };
        table.add_row(vec![
            Cell::new(&row.term),
            number(row.median, 5),
            number(row.mad_sd, 5),
            rhat,
        ]);
    }
    table
}

/// Predictions with interval bounds, one row per entry of `label_column`
pub fn prediction_table(predictions: &DataFrame, label_column: &str) -> Result<Table> {
    let labels = string_values(predictions, label_column)?;
    let pred = f64_values(predictions, PRED)?;
    let lower = f64_values(predictions, PRED_LOWER)?;
    let upper = f64_values(predictions, PRED_UPPER)?;

    let mut table = new_table(&[label_column, PRED, PRED_LOWER, PRED_UPPER]);
    for i in 0..pred.len() {
        table.add_row(vec![
            Cell::new(labels[i].as_deref().unwrap_or("")),
            number(pred[i], 5),
            number(lower[i], 5),
            number(upper[i], 5),
        ]);
    }
    Ok(table)
}

/// Any frame rendered cell by cell, floats rounded
pub fn frame_table(df: &DataFrame) -> Table {
    let headers: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
    let mut table = new_table(&headers);
    for i in 0..df.height() {
        let row: Vec<Cell> = df
            .get_columns()
            .iter()
            .map(|column| match column.get(i) {
                Ok(AnyValue::Float64(v)) => number(v, 4),
                Ok(AnyValue::Float32(v)) => number(v as f64, 4),
                Ok(AnyValue::String(s)) => Cell::new(s),
                Ok(value) => Cell::new(value.to_string()),
                Err(_) => Cell::new(""),
            })
            .collect();
        table.add_row(row);
    }
    table
}

/// Row accounting for the flights/weather join
pub fn join_table(report: &JoinReport) -> Table {
    let mut table = new_table(&["Metric", "Rows"]);
    table.add_row(vec![Cell::new("Flights (left)"), Cell::new(report.left_rows)]);
    table.add_row(vec![Cell::new("Weather (right)"), Cell::new(report.right_rows)]);
    table.add_row(vec![
        Cell::new("Duplicate weather keys removed"),
        Cell::new(report.right_duplicates_removed).fg(if report.right_duplicates_removed > 0 {
            Color::Yellow
        } else {
            Color::White
        }),
    ]);
    table.add_row(vec![
        Cell::new("Matched"),
        Cell::new(report.matched_rows)
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Unmatched (dropped)"),
        Cell::new(report.unmatched_rows).fg(if report.unmatched_rows > 0 {
            Color::Red
        } else {
            Color::White
        }),
    ]);
    table
}

/// ROC AUC plus the class metrics at the 0.5 cutoff
pub fn metrics_table(auc: f64, confusion: &ConfusionMatrix) -> Table {
    let mut table = new_table(&[".metric", ".estimate"]);
    table.add_row(vec![
        Cell::new("roc_auc"),
        number(auc, 4).fg(Color::Green).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("accuracy"), number(confusion.accuracy(), 4)]);
    table.add_row(vec![Cell::new("sensitivity"), number(confusion.sensitivity(), 4)]);
    table.add_row(vec![Cell::new("specificity"), number(confusion.specificity(), 4)]);
    table
}

/// 2x2 confusion matrix with truth in columns
pub fn confusion_table(confusion: &ConfusionMatrix, event: &str, other: &str) -> Table {
    let mut table = new_table(&["Prediction \\ Truth", event, other]);
    table.add_row(vec![
        Cell::new(event),
        Cell::new(confusion.true_positive),
        Cell::new(confusion.false_positive),
    ]);
    table.add_row(vec![
        Cell::new(other),
        Cell::new(confusion.false_negative),
        Cell::new(confusion.true_negative),
    ]);
    table
}
