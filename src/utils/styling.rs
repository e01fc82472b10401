//! Terminal styling utilities for step-by-step console output

use console::{style, Emoji};

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SEED: Emoji<'_, '_> = Emoji("🎲 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");

const CARD_WIDTH: usize = 56;

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
     __ _ _    __ _
    / _(_) |_ / _| |_____ __ __
   |  _| |  _|  _| / _ \ V  V /
   |_| |_|\__|_| |_\___/\_/\_/
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("~").magenta().bold(),
        style("Fit once, apply many").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print a configuration card: a title and `(icon, label, value)` rows
pub fn print_config(title: &str, rows: &[(&Emoji<'_, '_>, &str, String)]) {
    let line = "─".repeat(CARD_WIDTH - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style(format!("⚙️  {}", title)).cyan().bold(),
        " ".repeat(CARD_WIDTH.saturating_sub(title.chars().count() + 6))
    );
    println!("    ├{}┤", line);
    for (icon, label, value) in rows {
        let text = format!("{:<14}{}", format!("{}:", label), truncate_string(value, 34));
        println!("    │  {} {:<48}│", icon, text);
    }
    println!("    └{}┘", line);
    println!();
}

/// Numbered section heading, e.g. `[2] Least Squares Fit`
pub fn print_step_header(step_num: u8, title: &str) {
    let heading = format!("[{}] {}", step_num, title);
    println!();
    println!("    {}", style(&heading).cyan().bold());
    println!("    {}", style("─".repeat(heading.chars().count().max(50))).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print the final completion message
pub fn print_completion(pipeline: &str) {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style(format!("{} pipeline complete!", pipeline)).green().bold()
    );
    println!();
}

/// Highlighted count followed by what was counted
pub fn print_count(description: &str, count: usize) {
    println!("      {} {}", style(count).yellow().bold(), description);
}

/// Print elapsed time for a step
pub fn print_step_time(elapsed: std::time::Duration) {
    println!(
        "      {}",
        style(format!("⏱  {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - max_len + 3).collect();
        format!("...{}", tail)
    }
}
