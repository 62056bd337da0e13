//! CLI output formatting.
//!
//! Each report has a `format_*` function returning lines, for testability,
//! and a `print_*` wrapper that writes them to stdout. Format functions are
//! pure: no I/O, no side effects.
//!
//! ```text
//! Generated 12 pages, 1 text file
//! Copied 30 assets (24 hashed), rewrote 41 links
//! Built gen in 9.9ms
//! ```

use crate::pipeline::BuildStats;
use std::time::Duration;

/// Human-friendly duration with about three significant digits.
///
/// `900ns`, `1.1μs`, `105μs`, `9.9ms`, `900ms`, `59.1s`, `1m1s`, `1h1m1.1s`.
pub fn format_duration(d: Duration) -> String {
    const MICRO: Duration = Duration::from_micros(1);
    const MILLI: Duration = Duration::from_millis(1);
    const SECOND: Duration = Duration::from_secs(1);
    const MINUTE: Duration = Duration::from_secs(60);
    const HOUR: Duration = Duration::from_secs(3600);

    let nanos = d.as_nanos() as f64;
    if d < MICRO {
        format!("{}ns", d.as_nanos())
    } else if d < 100 * MICRO {
        format!("{:.1}μs", nanos / 1e3)
    } else if d < MILLI {
        format!("{:.0}μs", nanos / 1e3)
    } else if d < 100 * MILLI {
        format!("{:.1}ms", nanos / 1e6)
    } else if d < SECOND {
        format!("{:.0}ms", nanos / 1e6)
    } else if d < MINUTE {
        format!("{:.1}s", d.as_secs_f64())
    } else if d < HOUR {
        let mins = d.as_secs() / 60;
        let rest = d - Duration::from_secs(mins * 60);
        format!("{mins}m{:.0}s", rest.as_secs_f64())
    } else {
        let hours = d.as_secs() / 3600;
        let mins = (d.as_secs() % 3600) / 60;
        let rest = d - Duration::from_secs(hours * 3600 + mins * 60);
        format!("{hours}h{mins}m{}s", rest.as_secs_f64())
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Summary of a successful build.
pub fn format_build_output(stats: &BuildStats) -> Vec<String> {
    let r = &stats.render;
    let mut lines = vec![format!(
        "Generated {}, {}",
        plural(r.pages, "page"),
        plural(r.text_files, "text file")
    )];
    if r.assets > 0 {
        lines.push(format!(
            "Copied {} ({} hashed), rewrote {}",
            plural(r.assets, "asset"),
            r.hashed,
            plural(r.rewritten_links, "link")
        ));
    }
    lines.push(format!(
        "Built {} in {}",
        stats.output_dir.display(),
        format_duration(stats.elapsed)
    ));
    lines
}

/// Print build summary to stdout.
pub fn print_build_output(stats: &BuildStats) {
    for line in format_build_output(stats) {
        println!("{}", line);
    }
}
