//! Terminal output formatting.

use colored::Colorize;
use sp_audit_core::comparison::PairTotals;
use sp_audit_core::{
    AuditConfig, AuditResult, CaptureReport, PairwiseComparison, RangeAuditResult, TweakRecord, TweakSet,
};

/// Records listed per side in detailed mode.
const DETAIL_LIMIT: usize = 5;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", "→".cyan(), msg);
}

/// Print a warning message.
pub fn warn(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print a header.
pub fn header(msg: &str) {
    println!("\n{}", msg.white().bold());
    println!("{}", "─".repeat(msg.chars().count()).dimmed());
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).dimmed(), value);
}

/// Print a helpful hint.
pub fn hint(msg: &str) {
    eprintln!("{} {}", "hint:".dimmed(), msg.dimmed());
}

pub fn validation_issues(issues: &[String]) {
    error("Configuration validation failed:");
    for issue in issues {
        eprintln!("  - {}", issue);
    }
}

fn percentage(pct: f64) -> String {
    let text = format!("{:.1}%", pct);
    if pct >= 100.0 {
        text.green().to_string()
    } else if pct >= 90.0 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

fn record_line(record: &TweakRecord) -> String {
    match record.txid() {
        Some(txid) => format!("{} (txid {})", record.tweak_value(), txid),
        None => record.tweak_value().to_string(),
    }
}

fn first_records(set: &TweakSet, indent: &str) {
    for record in set.iter().take(DETAIL_LIMIT) {
        println!("{}{}", indent, record_line(record).dimmed());
    }
    if set.len() > DETAIL_LIMIT {
        println!("{}... and {} more", indent, set.len() - DETAIL_LIMIT);
    }
}

fn comparison(cmp: &PairwiseComparison, detailed: bool) {
    println!(
        "\n  {} ({} vs {})",
        cmp.pair_name.bold(),
        cmp.backend1,
        cmp.backend2
    );
    kv(&cmp.backend1, &format!("{} tweaks", cmp.count1));
    kv(&cmp.backend2, &format!("{} tweaks", cmp.count2));
    kv("Matching", &cmp.matching_count.to_string());
    kv(&format!("{} unique", cmp.backend1), &cmp.unique1.to_string());
    kv(&format!("{} unique", cmp.backend2), &cmp.unique2.to_string());
    kv("Match", &percentage(cmp.match_percentage));
    if let Some(warning) = &cmp.filter_mismatch_warning {
        println!("  {} {}", "!".yellow(), warning.yellow());
    }

    if detailed {
        if let Some(details) = &cmp.details {
            if !details.unique1.is_empty() {
                println!("    {} unique tweaks (first {}):", cmp.backend1, DETAIL_LIMIT);
                first_records(&details.unique1, "      ");
            }
            if !details.unique2.is_empty() {
                println!("    {} unique tweaks (first {}):", cmp.backend2, DETAIL_LIMIT);
                first_records(&details.unique2, "      ");
            }
        }
    }
}

/// Print the report for one audited block.
pub fn audit_result(result: &AuditResult, detailed: bool) {
    let total = result.tweak_counts.len() + result.failures.len();
    header(&format!("Audit Results for Block {}", result.block_height));
    kv("Backends", &format!("{}/{} successful", result.tweak_counts.len(), total));

    println!("\n{}", "Tweak counts by backend:".bold());
    for (name, count) in &result.tweak_counts {
        kv(name, &format!("{} tweaks", count));
    }

    println!("\nMatching tweaks across all backends: {}", result.matching_count);

    if !result.non_matching_counts.is_empty() {
        println!("\n{}", "Unique tweaks by backend:".bold());
        for (name, count) in &result.non_matching_counts {
            kv(name, &format!("{} unique", count));
            if detailed {
                if let Some(set) = result.details.as_ref().and_then(|d| d.non_matching.get(name)) {
                    first_records(set, "    ");
                }
            }
        }
    }

    println!("\n{}", "Request time by backend:".bold());
    for (name, ms) in &result.request_times_ms {
        kv(name, &format!("{:.3}s", *ms as f64 / 1000.0));
    }

    if !result.failures.is_empty() {
        println!("\n{}", "Failed backends:".red().bold());
        for (name, failure) in &result.failures {
            println!("  {} {}: {}", "✗".red(), name, failure);
        }
    }

    if !result.pairwise_comparisons.is_empty() {
        header("Pairwise Comparisons");
        for cmp in &result.pairwise_comparisons {
            comparison(cmp, detailed);
        }
    }

    for warning in &result.warnings {
        warn(warning);
    }
}

fn pair_summary(totals: &PairTotals) {
    println!(
        "\n  {} ({} vs {})",
        totals.pair_name.bold(),
        totals.backend1,
        totals.backend2
    );
    kv("Blocks compared", &totals.blocks_compared.to_string());
    kv("Total matching", &totals.matching_count.to_string());
    kv(&format!("Total {} unique", totals.backend1), &totals.unique1.to_string());
    kv(&format!("Total {} unique", totals.backend2), &totals.unique2.to_string());
    if totals.union_count() > 0 {
        kv("Overall match", &percentage(totals.match_percentage));
    }
}

/// Print the report for an audited range.
pub fn range_result(range: &RangeAuditResult, detailed: bool) {
    header(&format!(
        "Range Audit Results (Blocks {}-{})",
        range.start_block, range.end_block
    ));
    kv("Blocks audited", &range.blocks_audited.to_string());
    if range.stopped_early {
        warn(&format!(
            "Stopped early: {} of {} blocks audited",
            range.blocks_audited,
            range.requested_blocks()
        ));
    }

    println!("\n{}", "Summary by backend:".bold());
    for (name, totals) in &range.backend_summaries {
        println!("  {}", name.bold());
        kv("  Total tweaks", &totals.total_tweaks.to_string());
        kv("  Blocks processed", &totals.blocks_processed.to_string());
        kv("  Failures", &totals.failures.to_string());
        kv(
            "  Request time",
            &format!("{:.3}s", totals.total_request_time_ms as f64 / 1000.0),
        );
    }

    if !range.pair_summaries.is_empty() {
        header("Pairwise Comparison Summary");
        for totals in &range.pair_summaries {
            pair_summary(totals);
        }
    }

    if detailed {
        println!("\n{}", "Detailed results by block:".bold());
        for block in &range.block_results {
            println!("\n  Block {}:", block.block_height);
            for (name, count) in &block.tweak_counts {
                println!("    {}: {} tweaks", name, count);
            }
            for (name, failure) in &block.failures {
                println!("    {}: {}", name, failure.to_string().red());
            }
            for cmp in &block.pairwise_comparisons {
                println!(
                    "    {}: {} matching, {} + {} unique",
                    cmp.pair_name, cmp.matching_count, cmp.unique1, cmp.unique2
                );
            }
            for warning in &block.warnings {
                println!("    {} {}", "warning:".yellow(), warning);
            }
        }
    }

    let warnings: usize = range.block_results.iter().map(|b| b.warnings.len()).sum();
    if warnings > 0 && !detailed {
        warn(&format!("{} warnings across the range (use -d to list them)", warnings));
    }
}

pub fn capture_report(report: &CaptureReport) {
    header(&format!(
        "Reference Capture from '{}' (Blocks {}-{})",
        report.backend, report.start_block, report.end_block
    ));
    kv("Network", &report.network.to_string());
    kv("Stored", &report.stored.len().to_string());
    if report.failed.is_empty() {
        success("All blocks captured");
    } else {
        println!("\n{}", "Failed blocks:".red().bold());
        for (height, failure) in &report.failed {
            println!("  {} {}: {}", "✗".red(), height, failure);
        }
    }
}

/// `config --list`.
pub fn config_listing(config: &AuditConfig) {
    header("Configured backends");
    for backend in &config.backends {
        let status = if backend.active { String::new() } else { " - inactive".dimmed().to_string() };
        let target = match (&backend.host, backend.port) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            _ => backend.endpoint.clone(),
        };
        println!("  {} ({}): {}{}", backend.name.bold(), backend.protocol, target, status);
    }

    if !config.pairs.is_empty() {
        header("Configured pairs");
        for pair in &config.pairs {
            let status = if pair.active { String::new() } else { " - inactive".dimmed().to_string() };
            println!("  {}: {} vs {}{}", pair.name.bold(), pair.backend1, pair.backend2, status);
        }
    }
}
