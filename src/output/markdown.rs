//! Markdown summary generation
//!
//! Renders run information, statistics, frontier and filter counters, and
//! the failed URLs of a crawl as a human-readable report.

use crate::crawler::{CrawlResult, CrawlSummary};
use crate::output::stats::CrawlStats;
use crate::output::traits::{OutputResult, RunStatus};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed URLs listed before the rest are elided
const MAX_FAILURES_LISTED: usize = 50;

/// Writes the markdown summary for a crawl to `output_path`
pub fn generate_markdown_summary(
    results: &[CrawlResult],
    summary: Option<&CrawlSummary>,
    status: RunStatus,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(results, summary, status);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl as markdown
pub fn format_markdown_summary(
    results: &[CrawlResult],
    summary: Option<&CrawlSummary>,
    status: RunStatus,
) -> String {
    let stats = CrawlStats::from_results(results);
    let mut md = String::new();

    md.push_str("# Ripple-Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Status**: {}\n", status.to_db_string()));
    if let Some(summary) = summary {
        md.push_str(&format!("- **Strategy**: {}\n", summary.strategy));
        md.push_str(&format!(
            "- **Started**: {}\n",
            summary.state.started_at.to_rfc3339()
        ));
        if let Some(finished) = summary.state.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
        }
        if let Some(duration) = summary.state.duration_seconds() {
            md.push_str(&format!("- **Duration**: {:.1} seconds\n", duration));
        }
        md.push_str(&format!(
            "- **Peak Concurrency**: {}\n",
            summary.peak_running
        ));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Results**: {}\n", stats.total_results));
    md.push_str(&format!("- **Succeeded**: {}\n", stats.succeeded));
    md.push_str(&format!("- **Failed**: {}\n", stats.failed));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n", stats.success_rate()));
    md.push_str(&format!("- **Unique Domains**: {}\n", stats.unique_domains));
    md.push_str(&format!("- **Links Found**: {}\n\n", stats.total_links));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if let Some(summary) = summary {
        let frontier = &summary.frontier;
        md.push_str("## Frontier\n\n");
        md.push_str("| Outcome | Count |\n");
        md.push_str("|---------|-------|\n");
        md.push_str(&format!("| Enqueued | {} |\n", frontier.enqueued));
        md.push_str(&format!("| Duplicate | {} |\n", frontier.duplicates));
        md.push_str(&format!("| Filtered | {} |\n", frontier.filtered));
        md.push_str(&format!("| Beyond Max Depth | {} |\n", frontier.depth_dropped));
        md.push_str(&format!(
            "| Below Score Threshold | {} |\n",
            frontier.threshold_dropped
        ));
        md.push_str(&format!("| External | {} |\n", frontier.external_dropped));
        md.push_str(&format!("| Invalid URL | {} |\n\n", frontier.invalid));

        if !summary.filters.is_empty() {
            md.push_str("## Filters\n\n");
            md.push_str("| Filter | Evaluated | Passed | Rejected |\n");
            md.push_str("|--------|-----------|--------|----------|\n");
            for (name, filter) in &summary.filters {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    name, filter.total, filter.passed, filter.rejected
                ));
            }
            md.push('\n');
        }
    }

    if !stats.error_summary.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");
        for (kind, count) in &stats.error_summary {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if !stats.rate_limited_domains.is_empty() {
        md.push_str("## Rate-Limited Domains\n\n");
        md.push_str(&format!("Total backoffs: {}\n\n", stats.total_backoffs));
        for domain in &stats.rate_limited_domains {
            md.push_str(&format!("- {}\n", domain));
        }
        md.push('\n');
    }

    let failures: Vec<&CrawlResult> = results.iter().filter(|r| !r.success).collect();
    if !failures.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Depth | Error |\n");
        md.push_str("|-----|-------|-------|\n");
        for result in failures.iter().take(MAX_FAILURES_LISTED) {
            let error = result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                result.url,
                result.depth,
                error.replace('|', "\\|")
            ));
        }
        if failures.len() > MAX_FAILURES_LISTED {
            md.push_str(&format!(
                "\n... and {} more\n",
                failures.len() - MAX_FAILURES_LISTED
            ));
        }
        md.push('\n');
    }

    md
}
