//! Report writers. Everything here is layout; the numbers come from
//! `SalesReport` and are never recomputed.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use possim_core::{
    aggregator::WindowedStats, collector::CustomerSummaryCollector, report::SalesReport,
    types::round_cents,
};

const RULE: &str = "-----------------------------------------------------";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryFile<'a> {
    run_id:          &'a str,
    seed:            u64,
    total_customers: u64,
    total_items:     u64,
    total_sales:     f64,
}

/// Write summary.json, top10.json, top10_daily.json and comparison.csv
/// into `dir`, creating it if needed. Returns the written paths.
pub fn write_reports(dir: &Path, run_id: &str, seed: u64, report: &SalesReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let summary = SummaryFile {
        run_id,
        seed,
        total_customers: report.summary.total_customers,
        total_items:     report.summary.total_items,
        total_sales:     report.summary.total_sales,
    };

    let mut written = Vec::with_capacity(4);
    written.push(write_json(&dir.join("summary.json"), &summary)?);
    written.push(write_json(&dir.join("top10.json"), &report.top_items)?);
    written.push(write_json(&dir.join("top10_daily.json"), &report.daily_top)?);
    written.push(write_text(&dir.join("comparison.csv"), &comparison_csv(report))?);
    Ok(written)
}

pub fn write_customer_summary(dir: &Path, collector: &CustomerSummaryCollector) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_text(&dir.join("customer_summary.csv"), &collector.to_csv())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    write_text(path, &body)
}

fn write_text(path: &Path, body: &str) -> Result<PathBuf> {
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    log::debug!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// The actual-vs-expected comparison as a sectioned CSV: probabilities,
/// window averages, then one table per side.
pub fn comparison_csv(report: &SalesReport) -> String {
    let c = &report.comparison;
    let mut out = String::new();

    out.push_str("Probabilities of Each Item Type\n");
    let _ = writeln!(out, "{RULE}");
    out.push_str("Type,Probability\n");
    for p in &c.probabilities {
        let _ = writeln!(out, "{},{:.1}%", p.category, p.probability * 100.0);
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Actual Avg Customers per day,{}", round_cents(c.avg_customers_per_day));
    let _ = writeln!(out, "Actual Avg Sales per day,{}", round_cents(c.avg_items_per_day));
    let _ = writeln!(
        out,
        "Minimum # products sold, non-special sku, {} days,{}",
        c.window_days, c.non_special_min
    );
    let _ = writeln!(
        out,
        "Maximum # products sold, non-special sku, {} days,{}",
        c.window_days, c.non_special_max
    );
    out.push('\n');

    stats_table(&mut out, "Average Sales Per Day (Actual)", &c.actual);
    out.push('\n');
    stats_table(&mut out, "Average Predicted Sales Per Day", &c.expected);

    let _ = writeln!(out, "\nTotal sales,{}", c.total_units_in_window);
    out
}

fn stats_table(out: &mut String, title: &str, stats: &WindowedStats) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{RULE}");
    out.push_str("Type,Total Sales,Avg Sales Per Day,% Total,# Items in Type,Sales Per Item\n");
    for row in &stats.rows {
        let _ = writeln!(
            out,
            "{},{},{},{:.2}%,{},{}",
            row.category,
            row.total_units,
            round_cents(row.avg_per_day),
            row.pct_of_total,
            row.item_count,
            round_cents(row.per_item),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use possim_core::engine::SimEngine;

    fn report() -> SalesReport {
        let engine = SimEngine::build_test(11).unwrap();
        let mut agg = engine.new_aggregator();
        engine.run(&mut [&mut agg]).unwrap();
        SalesReport::project(&agg, 10, engine.config().window_days)
    }

    #[test]
    fn comparison_csv_has_every_section() {
        let csv = comparison_csv(&report());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Probabilities of Each Item Type");
        assert_eq!(lines[2], "Type,Probability");
        assert!(lines.contains(&"Average Sales Per Day (Actual)"));
        assert!(lines.contains(&"Average Predicted Sales Per Day"));
        assert!(lines.iter().any(|l| l.starts_with("Minimum # products sold, non-special sku, 14 days,")));
        assert!(lines.iter().any(|l| l.starts_with("Other,")));
        assert!(lines.last().unwrap().starts_with("Total sales,"));
    }

    #[test]
    fn probabilities_print_as_percentages() {
        let csv = comparison_csv(&report());
        assert!(csv.contains("\nMilk,70.0%\n"));
        assert!(csv.contains("\nCereal,36.5%\n"));
    }

    #[test]
    fn writes_all_report_files() {
        let dir = std::env::temp_dir().join(format!("sim-runner-{}", uuid::Uuid::new_v4()));
        let report = report();
        let written = write_reports(&dir, "run-x", 11, &report).unwrap();
        assert_eq!(written.len(), 4);

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["runId"], "run-x");
        assert_eq!(summary["totalItems"], report.summary.total_items);

        let top: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("top10.json")).unwrap()).unwrap();
        assert_eq!(top.as_array().unwrap().len(), 10);
        assert_eq!(top[0]["rank"], 1);

        let daily: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("top10_daily.json")).unwrap()).unwrap();
        assert_eq!(daily.as_array().unwrap().len(), report.daily_top.len());

        fs::remove_dir_all(&dir).unwrap();
    }
}
