//! Terminal output for the talia CLI.
//!
//! Progress lines, the run header and the final summary. Uses only the
//! `console` crate; colours are dropped automatically when stdout is not a
//! terminal.

use console::style;
use std::sync::Arc;
use std::time::Duration;
use talia_lib::{Availability, ProgressCallback, ProgressEvent, StatsSnapshot};

const SYMBOL_AVAILABLE: &str = "✓";
const SYMBOL_TAKEN: &str = "✗";
const SYMBOL_ERROR: &str = "⚠";

/// Format one progress line, e.g. `[3/10] example.com ✓ available`.
pub fn format_progress_line(event: &ProgressEvent<'_>) -> String {
    let status = match event.availability {
        Availability::NoMatch => style(format!("{} available", SYMBOL_AVAILABLE)).green(),
        Availability::Taken => style(format!("{} taken", SYMBOL_TAKEN)).red(),
        Availability::Error => style(format!("{} error", SYMBOL_ERROR)).yellow(),
    };
    format!(
        "{} {} {}",
        style(format!("[{}/{}]", event.current, event.total)).dim(),
        event.domain,
        status
    )
}

/// Progress callback that prints one line per completed domain.
///
/// The library serializes callback invocations, so lines never interleave.
pub fn progress_printer() -> ProgressCallback {
    Arc::new(|event: &ProgressEvent<'_>| {
        println!("{}", format_progress_line(event));
    })
}

/// Print a short header before the batch starts.
pub fn print_header(domain_count: usize, server: &str, mode: &str) {
    println!(
        "{} {} {}",
        style("talia").bold(),
        style(format!("v{}", talia_lib::VERSION)).dim(),
        style(format!(
            "- checking {} domain{} on {} ({})",
            domain_count,
            if domain_count == 1 { "" } else { "s" },
            server,
            mode
        ))
        .dim(),
    );
}

/// Print elapsed time and the per-class counts. Zero counts are skipped.
pub fn print_summary(stats: &StatsSnapshot, elapsed: Duration) {
    println!();
    println!("Done in {:.1}s", elapsed.as_secs_f64());
    if stats.available > 0 {
        println!(
            "  {}",
            style(format!("{} {} available", SYMBOL_AVAILABLE, stats.available)).green()
        );
    }
    if stats.taken > 0 {
        println!(
            "  {}",
            style(format!("{} {} taken", SYMBOL_TAKEN, stats.taken)).red()
        );
    }
    if stats.errors > 0 {
        println!(
            "  {}",
            style(format!("{} {} errors", SYMBOL_ERROR, stats.errors)).yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line_contents() {
        console::set_colors_enabled(false);
        let event = ProgressEvent {
            current: 3,
            total: 10,
            domain: "example.com",
            availability: Availability::NoMatch,
        };
        assert_eq!(format_progress_line(&event), "[3/10] example.com ✓ available");

        let event = ProgressEvent {
            availability: Availability::Error,
            ..event
        };
        assert_eq!(format_progress_line(&event), "[3/10] example.com ⚠ error");
    }
}
