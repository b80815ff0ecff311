//! Console and static HTML rendering of epoch verification reports.

use epoch_verifier::verify::{ElementFailure, FailureDetail, RuleOutcome, VerificationResult};
use epoch_verifier::{ReportData, VerificationReport};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// One line per rule, failures indented beneath their rule, summary last.
pub fn render_text(report: &VerificationReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        match &outcome.result {
            VerificationResult::Passed => {
                let _ = writeln!(out, "PASS  {}", outcome.rule);
            }
            VerificationResult::Failed {
                description,
                failures,
            } => {
                let _ = writeln!(out, "FAIL  {}: {}", outcome.rule, description);
                for failure in failures {
                    let _ = writeln!(out, "        {}", describe_failure(failure));
                }
            }
        }
    }
    let _ = writeln!(out, "{}", report.summary());
    out
}

/// `element: detail` for one failing element.
pub fn describe_failure(failure: &ElementFailure) -> String {
    let detail = describe_detail(&failure.detail);
    if failure.element.is_empty() {
        detail
    } else {
        format!("{}: {}", failure.element, detail)
    }
}

fn describe_detail(detail: &FailureDetail) -> String {
    match detail {
        FailureDetail::Predicate { message } => message.clone(),
        FailureDetail::Mismatch {
            actual,
            expected,
            difference,
            tolerance,
            rounded_down,
        } => {
            let mode = if *rounded_down { ", rounded down" } else { "" };
            format!(
                "actual {actual}, expected {expected}, difference {difference} \
                 (tolerance {tolerance}{mode})"
            )
        }
        FailureDetail::MissingReference { reference } => format!("missing {reference}"),
        FailureDetail::UnexpectedReference { reference } => format!("unexpected {reference}"),
    }
}

/// Render a static HTML report to `out_path`. Embeds the full report JSON.
pub fn render_report(data: &ReportData, out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let html = build_html(data)?;
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ReportError::Io)?;
    f.write_all(html.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

fn rule_row(outcome: &RuleOutcome) -> String {
    let (class, status) = if outcome.result.is_passed() {
        ("pass", "PASS")
    } else {
        ("fail", "FAIL")
    };
    let details: String = outcome
        .result
        .failures()
        .iter()
        .map(|f| format!("<li class=\"mono\">{}</li>", escape_html(&describe_failure(f))))
        .collect();
    let details = if details.is_empty() {
        String::new()
    } else {
        format!("<ul>{details}</ul>")
    };
    format!(
        "<tr><td class=\"{class}\">{status}</td><td class=\"mono\">{rule}</td><td>{details}</td></tr>\n",
        rule = escape_html(&outcome.rule),
    )
}

/// Build the HTML string in memory.
pub fn build_html(data: &ReportData) -> Result<String, ReportError> {
    let json_embed = escape_html(&serde_json::to_string(&data).map_err(ReportError::Json)?);
    let report = &data.report;
    let rows: String = report.outcomes.iter().map(rule_row).collect();
    let verdict_class = if report.passed() { "pass" } else { "fail" };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Epoch {epoch} verification</title>
<style>
:root {{ font-family: system-ui, sans-serif; background: #0f1419; color: #e6edf3; }}
body {{ max-width: 860px; margin: 0 auto; padding: 1.5rem; }}
h1 {{ font-size: 1.4rem; margin-bottom: 0.5rem; }}
h2 {{ font-size: 1.1rem; margin-top: 1.5rem; color: #8b949e; }}
.mono {{ font-family: ui-monospace, monospace; font-size: 0.9em; word-break: break-all; }}
.card {{ background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }}
table {{ width: 100%; border-collapse: collapse; }}
td {{ border-top: 1px solid #30363d; padding: 0.4rem; vertical-align: top; }}
ul {{ margin: 0; padding-left: 1rem; }}
.pass {{ color: #3fb950; font-weight: bold; }}
.fail {{ color: #f85149; font-weight: bold; }}
.footer {{ margin-top: 2rem; font-size: 0.85rem; color: #8b949e; }}
</style>
</head>
<body>
<h1>Epoch {epoch} verification</h1>
<p class="{verdict_class}">{summary}</p>
<p>Generated: {created}</p>

<h2>Rules</h2>
<div class="card">
<table>
{rows}</table>
</div>

<h2>Reproducibility</h2>
<div class="card">
  <div class="mono">SHA-256: {digest}</div>
  <p class="footer">Re-run <code>epoch-verifier check-digest --report &lt;file&gt;</code> against the saved report JSON to confirm the digest.</p>
</div>

<h2>Report (embedded)</h2>
<div class="card">
  <script type="application/json" id="verification-report">{json_embed}</script>
</div>
</body>
</html>"#,
        epoch = report.epoch,
        summary = escape_html(&report.summary()),
        created = escape_html(&data.generated_utc_rfc3339),
        digest = escape_html(&data.digest_sha256),
    );
    Ok(html)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}
