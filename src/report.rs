use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{QueuedSubmission, Severity, Signal};

pub fn signal_line(signal: &Signal) -> String {
    let mut line = format!(
        "[{}] {}: {} ({})",
        signal.severity, signal.title, signal.count, signal.description
    );
    if signal.fetch_failed {
        line.push_str(" - unavailable");
    }
    line
}

pub fn severity_counts(signals: &[Signal]) -> (usize, usize, usize) {
    signals
        .iter()
        .filter(|s| s.count > 0)
        .fold((0, 0, 0), |(c, w, i), s| match s.severity {
            Severity::Critical => (c + 1, w, i),
            Severity::Warning => (c, w + 1, i),
            Severity::Info => (c, w, i + 1),
        })
}

/// Expects `signals` already ranked.
pub fn build_report(generated_on: NaiveDate, signals: &[Signal]) -> String {
    let mut output = String::new();
    let (critical, warning, info) = severity_counts(signals);

    let _ = writeln!(output, "# Action Center Report");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{critical} critical, {warning} warning, {info} informational signals."
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");

    let active: Vec<&Signal> = signals.iter().filter(|s| s.count > 0).collect();
    if active.is_empty() {
        let _ = writeln!(output, "Nothing needs attention right now.");
    } else {
        for signal in active {
            let _ = writeln!(
                output,
                "- **{}** ({}): {} {} - {} [`{}`]",
                signal.title,
                signal.severity,
                signal.count,
                entity_label(signal),
                signal.description,
                signal.filter_param
            );
        }
    }

    let clear: Vec<&Signal> = signals
        .iter()
        .filter(|s| s.count == 0 && !s.fetch_failed)
        .collect();
    if !clear.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## All Clear");
        for signal in clear {
            let _ = writeln!(output, "- {}", signal.title);
        }
    }

    let failed: Vec<&Signal> = signals.iter().filter(|s| s.fetch_failed).collect();
    if !failed.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unavailable");
        for signal in failed {
            let _ = writeln!(output, "- {} could not be loaded", signal.title);
        }
    }

    output
}

pub fn queue_line(record: &QueuedSubmission) -> String {
    format!(
        "{} meeting {} {} (queued {})",
        record.id,
        record.subject_id,
        record.status,
        record.enqueued_at.format("%Y-%m-%d %H:%M:%S")
    )
}

fn entity_label(signal: &Signal) -> &'static str {
    match (signal.entity_type, signal.count) {
        (crate::models::EntityType::Hcp, 1) => "HCP",
        (crate::models::EntityType::Hcp, _) => "HCPs",
        (crate::models::EntityType::Hco, 1) => "HCO",
        (crate::models::EntityType::Hco, _) => "HCOs",
    }
}
