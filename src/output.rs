//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Presets
//!
//! ```text
//! platformA    Marketplace listing photo  fit within 2000x2000  1.0 MB
//! platformB    Storefront product photo   fit within 1600x1600  500 KB
//! fixedBanner  Profile banner             exactly 1584x396      3.0 MB
//! custom       Custom dimensions          user bounds           no budget
//! ```
//!
//! ## Result
//!
//! ```text
//! platformA 2000x1500 q70 → 948 KB (budget 1.0 MB)
//!     Original: 4.2 MB, saved 77%
//!     Attempts: q80 1.3 MB, q75 1.1 MB, q70 948 KB
//! ```
//!
//! A result that missed its budget at the quality floor is marked
//! `(over budget)` instead of showing the budget.
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::error::CompressError;
use crate::orchestrator::OrchestratorEvent;
use crate::preset::{Preset, ResizePolicy};
use crate::types::CompressedResult;

// ============================================================================
// Shared helpers
// ============================================================================

/// Decimal byte size, matching how budgets are defined.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = 1000 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn format_budget(budget: Option<u64>) -> String {
    budget.map_or_else(|| "no budget".to_string(), format_bytes)
}

fn format_target(preset: &Preset) -> String {
    match (preset.bounds, preset.policy) {
        (None, _) => "user bounds".to_string(),
        (Some(b), ResizePolicy::FitWithinBounds) => {
            format!("fit within {}x{}", b.width, b.height)
        }
        (Some(b), ResizePolicy::ExactResize) => format!("exactly {}x{}", b.width, b.height),
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Format the preset catalogue as aligned columns.
pub fn format_presets(presets: &[Preset]) -> Vec<String> {
    let rows: Vec<[String; 4]> = presets
        .iter()
        .map(|p| {
            [
                p.name.to_string(),
                p.label.to_string(),
                format_target(p),
                format_budget(p.byte_budget),
            ]
        })
        .collect();

    let mut widths = [0usize; 3];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|[name, label, target, budget]| {
            format!(
                "{:<nw$}  {:<lw$}  {:<tw$}  {}",
                name,
                label,
                target,
                budget,
                nw = widths[0],
                lw = widths[1],
                tw = widths[2]
            )
        })
        .collect()
}

pub fn print_presets(presets: &[Preset]) {
    for line in format_presets(presets) {
        println!("{}", line);
    }
}

// ============================================================================
// Results
// ============================================================================

/// Format a compression result: headline plus original-size and attempt lines.
pub fn format_result(preset: &Preset, result: &CompressedResult) -> Vec<String> {
    let budget = if result.met_budget {
        match preset.byte_budget {
            Some(b) => format!("(budget {})", format_bytes(b)),
            None => "(no budget)".to_string(),
        }
    } else {
        "(over budget)".to_string()
    };

    let mut lines = vec![format!(
        "{} {}x{} q{} \u{2192} {} {}",
        preset.name,
        result.width,
        result.height,
        result.quality_used,
        format_bytes(result.byte_size),
        budget
    )];

    if result.original_byte_size > 0 {
        let saved = (result.savings_ratio() * 100.0).round() as i64;
        lines.push(format!(
            "    Original: {}, saved {}%",
            format_bytes(result.original_byte_size),
            saved
        ));
    }

    if result.attempts.len() > 1 {
        let attempts: Vec<String> = result
            .attempts
            .iter()
            .map(|a| format!("q{} {}", a.quality, format_bytes(a.byte_size)))
            .collect();
        lines.push(format!("    Attempts: {}", attempts.join(", ")));
    }

    lines
}

pub fn print_result(preset: &Preset, result: &CompressedResult) {
    for line in format_result(preset, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Orchestrator events
// ============================================================================

pub fn format_error(error: &CompressError) -> String {
    format!("error: {}", error)
}

/// Format an orchestrator event as display lines, prefixed with its sequence number.
///
/// Results are labelled with the preset their request was issued under.
pub fn format_event(event: &OrchestratorEvent) -> Vec<String> {
    match event {
        OrchestratorEvent::Published {
            seq,
            preset,
            result,
        } => {
            let mut lines = format_result(preset, result);
            if let Some(first) = lines.first_mut() {
                *first = format!("#{} {}", seq, first);
            }
            lines
        }
        OrchestratorEvent::Failed { seq, error } => {
            vec![format!("#{} {}", seq, format_error(error))]
        }
    }
}

pub fn print_event(event: &OrchestratorEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
