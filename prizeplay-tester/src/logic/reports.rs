use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use prizeplay_game::numbers::usize_to_f64;
use std::io::Write;
use std::time::Duration;

use super::AuditResult;

fn pass_rate(results: &[AuditResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    usize_to_f64(passed) / usize_to_f64(results.len()) * 100.0
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[AuditResult],
    total_duration: Duration,
) -> Result<()> {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    writeln!(out)?;
    writeln!(out, "{}", "📊 Fairness Audit Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=========================".cyan())?;
    writeln!(out, "Total audits: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (total - passed).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", pass_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{status} {} (seed {})",
            result.game.id().bold(),
            result.seed_label
        )?;
        let relation = if result.fairness.chi_squared < result.fairness.critical_value {
            "<"
        } else {
            ">="
        };
        writeln!(
            out,
            "   chi2 {:.3} {relation} {:.3} ({} dof, {} draws)",
            result.fairness.chi_squared,
            result.fairness.critical_value,
            result.fairness.degrees_of_freedom,
            result.fairness.draws
        )?;
        for tally in &result.fairness.outcomes {
            writeln!(
                out,
                "     {:<16} p={:.4} expected {:>9.1} observed {:>7}",
                tally.label, tally.probability, tally.expected, tally.observed
            )?;
        }
        let ledger = &result.ledger;
        writeln!(
            out,
            "   ledger: {} settled / {} attempted, {} refused, {} wins, best streak {}, {} coins",
            ledger.plays_settled,
            ledger.plays_attempted,
            ledger.refused,
            ledger.wins,
            ledger.best_streak,
            ledger.coins
        )?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(out: &mut W, results: &[AuditResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[AuditResult],
) -> Result<()> {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    writeln!(out, "# PrizePlay Fairness Audit\n")?;
    writeln!(out, "_Generated {}_\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total audits**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}", total - passed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", pass_rate(results))?;
    writeln!(out, "## Detailed Results\n")?;

    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(out, "### {status} {} (seed {})\n", result.game, result.seed_label)?;
        writeln!(
            out,
            "- **Chi-squared**: {:.3} (critical {:.3}, {} dof)",
            result.fairness.chi_squared,
            result.fairness.critical_value,
            result.fairness.degrees_of_freedom
        )?;
        writeln!(
            out,
            "- **Ledger**: {} settled, {} refused, {} coins\n",
            result.ledger.plays_settled, result.ledger.refused, result.ledger.coins
        )?;
        writeln!(out, "| outcome | p | expected | observed |")?;
        writeln!(out, "|---|---|---|---|")?;
        for tally in &result.fairness.outcomes {
            writeln!(
                out,
                "| {} | {:.4} | {:.1} | {} |",
                tally.label, tally.probability, tally.expected, tally.observed
            )?;
        }
        if !result.failures.is_empty() {
            writeln!(out, "\n- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// One row per outcome; contains no timings so identical runs produce identical files.
pub fn generate_csv_report<W: Write + ?Sized>(out: &mut W, results: &[AuditResult]) -> Result<()> {
    writeln!(out, "game,seed,outcome,probability,expected,observed,chi_squared,passed")?;
    for result in results {
        for tally in &result.fairness.outcomes {
            writeln!(
                out,
                "{},{},{},{:.6},{:.3},{},{:.6},{}",
                result.game,
                result.seed,
                tally.label,
                tally.probability,
                tally.expected,
                tally.observed,
                result.fairness.chi_squared,
                result.passed
            )?;
        }
    }
    Ok(())
}
