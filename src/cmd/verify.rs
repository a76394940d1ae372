//! Verification ensemble from the command line: `triage verify`.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use triage::common::{VerificationReport, VerificationRequest};
use triage::config::TriageToml;
use triage::verify::VerificationEnsemble;

pub async fn cmd_verify(
    config: &TriageToml,
    input: &Path,
    json: bool,
    offline: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read verification request: {}", input.display()))?;
    let request: VerificationRequest = serde_json::from_str(&content)
        .with_context(|| format!("Invalid verification request JSON in {}", input.display()))?;

    let ensemble = VerificationEnsemble::new(super::verification_backends(config, offline));
    let report = ensemble.verify(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    println!();
    println!("{}", style("Verification Report").bold());
    println!("===================");
    println!();

    for outcome in &report.outcomes {
        let label = format!("{} ({}/{})", outcome.backend_id, outcome.provider, outcome.model);
        match (outcome.confidence, &outcome.error) {
            (Some(confidence), _) => {
                let score = format!("{}/10", confidence);
                let score = if confidence >= 7 {
                    style(score).green()
                } else if confidence >= 4 {
                    style(score).yellow()
                } else {
                    style(score).red()
                };
                println!("  {} {}  {}", style("✓").green(), label, score);
                if outcome.emergency {
                    println!("    {}", style("EMERGENCY ACTION flagged").red().bold());
                }
                if let Some(justification) = &outcome.justification {
                    println!("    {}", justification);
                }
            }
            (None, Some(error)) => {
                println!("  {} {}  {}", style("✗").red(), label, style("error").red());
                println!("    {}", style(error).dim());
            }
            (None, None) => println!("  ? {}", label),
        }
        println!();
    }

    let summary = format!(
        "{} succeeded, {} failed in {}ms",
        report.succeeded, report.failed, report.duration_ms
    );
    if report.failed > 0 {
        println!("{}", style(summary).yellow());
    } else {
        println!("{}", style(summary).green());
    }
}
