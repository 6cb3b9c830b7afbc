use colored::Colorize;

use codebench_core::dataset::WorkKind;

use crate::summary::ExtractionSummary;

/// Format a run summary for terminal output.
pub fn format_summary(summary: &ExtractionSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "Codebench - Extraction Summary".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    out.push_str(&format!(
        "{}: {}\n",
        "Dataset".bold(),
        summary.dataset.display()
    ));
    out.push_str(&format!(
        "{}: {} ({:.2}s)\n",
        "Started".bold(),
        summary.started_at.to_rfc3339(),
        summary.elapsed_secs
    ));

    out.push_str(&format!("\n{}\n{}\n", "Files".bold(), "-".repeat(40)));
    for kind in WorkKind::ALL {
        let count = summary.files.get(&kind).copied().unwrap_or(0);
        out.push_str(&format!("  {kind}: {count}\n"));
    }

    let r = &summary.records;
    out.push_str(&format!("\n{}\n{}\n", "Records".bold(), "-".repeat(40)));
    out.push_str(&format!("  semesters: {}\n", r.semesters));
    out.push_str(&format!("  courses: {}\n", r.courses));
    out.push_str(&format!("  assignments: {}\n", r.assignments));
    out.push_str(&format!("  users: {}\n", r.users));
    out.push_str(&format!("  attempts: {}\n", r.attempts));
    out.push_str(&format!("  solutions: {}\n", r.solutions));
    out.push_str(&format!("  logins: {}\n", r.logins));
    out.push_str(&format!("  grades: {}\n", r.grades));
    out.push_str(&format!("  codemirror: {}\n", r.codemirror));

    if !summary.outputs.is_empty() {
        out.push_str(&format!("\n{}\n", "Written".bold()));
        for path in &summary.outputs {
            out.push_str(&format!("  {}\n", path.display()));
        }
    }

    if summary.diagnostics > 0 {
        out.push_str(&format!(
            "\n{} {} recoverable problem(s), see log output\n",
            "WARN".yellow().bold(),
            summary.diagnostics
        ));
    }

    if !summary.failures.is_empty() {
        out.push_str(&format!(
            "\n{} ({} skipped)\n{}\n",
            "Failures".red().bold(),
            summary.failures.len(),
            "-".repeat(40),
        ));
        for failure in &summary.failures {
            out.push_str(&format!(
                "  {} {}\n    {}\n",
                "ERROR".red().bold(),
                failure.path.display(),
                failure.reason
            ));
        }
    }

    if summary.interrupted {
        out.push_str(&format!(
            "\n{}\n",
            "Interrupted: output holds only the files finished before cancellation."
                .yellow()
                .bold()
        ));
    } else if summary.failures.is_empty() {
        out.push_str(&format!("\n{}\n", "Extraction complete!".green().bold()));
    }

    out.push('\n');
    out
}
