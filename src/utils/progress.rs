//! Spinners and the sampler progress bar

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const SPINNER_TEMPLATE: &str = "    {spinner:.magenta} {msg} {elapsed:.dim}";
const SAMPLING_TEMPLATE: &str =
    "    {prefix:.bold} {wide_bar:.magenta/black} {human_pos}/{human_len} sweeps  {per_sec:.dim}  eta {eta}";
const SPINNER_TICKS: &str = "◐◓◑◒ ";

fn style_or_default(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

/// Spinner shown while a step of unknown length runs
pub fn create_spinner(message: &str) -> ProgressBar {
    let style = style_or_default(SPINNER_TEMPLATE, ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICKS);
    let spinner = ProgressBar::new_spinner()
        .with_style(style)
        .with_message(message.to_owned());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Bar advanced once per Gibbs sweep, summed over all chains.
///
/// `total` is chains times iterations per chain, warmup included.
pub fn create_sampling_bar(total: u64, chains: usize) -> ProgressBar {
    let label = match chains {
        1 => "1 chain ".to_owned(),
        n => format!("{} chains", n),
    };
    ProgressBar::new(total)
        .with_style(
            style_or_default(SAMPLING_TEMPLATE, ProgressStyle::default_bar())
                .progress_chars("=> "),
        )
        .with_prefix(label)
}

/// Stop a bar or spinner and leave a success line behind
pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    settle(pb, "✓", message);
}

/// Stop a bar or spinner and leave a warning line behind
pub fn finish_with_warning(pb: &ProgressBar, message: &str) {
    settle(pb, "!", message);
}

fn settle(pb: &ProgressBar, mark: &str, message: &str) {
    pb.set_style(style_or_default("    {msg}", ProgressStyle::default_spinner()));
    pb.finish_with_message(format!("{} {}", mark, message));
}
