use chrono::NaiveDate;
use rusqlite::params;

use super::SimStore;
use crate::{aggregator::Aggregator, error::SimResult, types::Sku};

#[derive(Debug, Clone, PartialEq)]
pub struct DailySalesRow {
    pub date:      NaiveDate,
    pub customers: u64,
    pub items:     u64,
    pub sales:     f64,
}

impl SimStore {
    // ── Sales ──────────────────────────────────────────────────

    /// Write every date's totals and SKU counts in one transaction.
    pub fn save_aggregate(&self, run_id: &str, aggregator: &Aggregator) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut day_stmt = tx.prepare(
                "INSERT INTO daily_sales (run_id, date, customers, items, sales)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut sku_stmt = tx.prepare(
                "INSERT INTO daily_sku_count (run_id, date, sku, count)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (date, day) in aggregator.days() {
                day_stmt.execute(params![
                    run_id,
                    date,
                    day.customers as i64,
                    day.items as i64,
                    day.sales,
                ])?;
                for (sku, count) in &day.sku_counts {
                    sku_stmt.execute(params![run_id, date, sku, *count as i64])?;
                }
            }
        }
        tx.commit()?;
        log::debug!("Saved aggregate for run {run_id}");
        Ok(())
    }

    pub fn daily_totals(&self, run_id: &str) -> SimResult<Vec<DailySalesRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, customers, items, sales FROM daily_sales
             WHERE run_id = ?1 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(DailySalesRow {
                date:      row.get(0)?,
                customers: row.get::<_, i64>(1)? as u64,
                items:     row.get::<_, i64>(2)? as u64,
                sales:     row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn sku_total(&self, run_id: &str, sku: Sku) -> SimResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(count), 0) FROM daily_sku_count
             WHERE run_id = ?1 AND sku = ?2",
            params![run_id, sku],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    pub fn total_items(&self, run_id: &str) -> SimResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(items), 0) FROM daily_sales WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }
}
