//! Transaction aggregator — running totals plus per-date SKU counts.
//!
//! INVARIANTS (checked by `is_consistent`):
//!   - a SKU's global count equals the sum of its per-date counts
//!   - total items equals the sum of all SKU counts
//!   - total sales equals the sum of recorded prices (each already in cents,
//!     never re-rounded here)
//!
//! Windowed statistics look at the first N dates, ascending, that recorded
//! at least one transaction. Dates with customers but no sales are not part
//! of any window.

use chrono::NaiveDate;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::{
    catalog::{is_special, CategoryGrouping, ProductCatalog},
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    observer::SimObserver,
    rules::marginal_probabilities,
    types::{CustomerId, Sku, StoreId},
};

/// The theoretical model behind the expected statistics: the same rule
/// probabilities the engine draws with, and the mean of the item range.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationModel {
    pub category_probabilities: BTreeMap<String, f64>,
    pub avg_items_per_customer: f64,
}

impl ExpectationModel {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            category_probabilities: marginal_probabilities(&config.rules),
            avg_items_per_customer: config.avg_items_per_customer(),
        }
    }
}

/// Everything recorded for one calendar date, across all stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayLedger {
    pub customers:  u64,
    pub items:      u64,
    pub sales:      f64,
    pub sku_counts: HashMap<Sku, u64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SkuCount {
    pub sku:   Sku,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkuTally {
    count:      u64,
    /// Order in which this SKU was first recorded; breaks ranking ties.
    first_seen: u64,
}

/// One report group's line in a windowed comparison.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryStat {
    pub category:     String,
    /// Units over the whole window. Expected rows round `avg_per_day * days`.
    pub total_units:  u64,
    pub avg_per_day:  f64,
    /// Share of the grand per-day total, in percent.
    pub pct_of_total: f64,
    /// Catalog SKUs in the group.
    pub item_count:   usize,
    pub per_item:     f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowedStats {
    /// Dates actually in the window (may be fewer than requested).
    pub window_len:  usize,
    pub rows:        Vec<CategoryStat>,
    /// Sum of `avg_per_day` over all rows.
    pub grand_total: f64,
}

impl WindowedStats {
    pub fn row(&self, category: &str) -> Option<&CategoryStat> {
        self.rows.iter().find(|r| r.category == category)
    }
}

pub struct Aggregator {
    catalog:         Arc<ProductCatalog>,
    model:           ExpectationModel,
    total_customers: u64,
    total_items:     u64,
    total_sales:     f64,
    sku_counts:      HashMap<Sku, SkuTally>,
    next_seen:       u64,
    days:            BTreeMap<NaiveDate, DayLedger>,
}

impl Aggregator {
    pub fn new(catalog: Arc<ProductCatalog>, model: ExpectationModel) -> Self {
        let capacity = catalog.len();
        Self {
            catalog,
            model,
            total_customers: 0,
            total_items: 0,
            total_sales: 0.0,
            sku_counts: HashMap::with_capacity(capacity),
            next_seen: 0,
            days: BTreeMap::new(),
        }
    }

    // ── Recording ──────────────────────────────────────────────

    pub fn record_customers(&mut self, date: NaiveDate, count: u32) {
        self.total_customers += u64::from(count);
        self.days.entry(date).or_default().customers += u64::from(count);
    }

    pub fn record_transaction(
        &mut self,
        date: NaiveDate,
        _store_id: StoreId,
        _customer_id: CustomerId,
        sku: Sku,
        price: f64,
    ) {
        self.add_sku(sku, 1);
        self.total_items += 1;
        self.total_sales += price;

        let day = self.days.entry(date).or_default();
        day.items += 1;
        day.sales += price;
        *day.sku_counts.entry(sku).or_default() += 1;
    }

    /// Fold another aggregator (e.g. one store's shard) into this one.
    /// Counts and sums commute, so merge order never changes the totals.
    /// SKUs first seen in `other` rank after this aggregator's on ties.
    pub fn merge(&mut self, other: Aggregator) {
        self.total_customers += other.total_customers;
        self.total_items += other.total_items;
        self.total_sales += other.total_sales;

        let mut incoming: Vec<(Sku, SkuTally)> = other.sku_counts.into_iter().collect();
        incoming.sort_by_key(|(_, t)| t.first_seen);
        for (sku, tally) in incoming {
            self.add_sku(sku, tally.count);
        }

        for (date, ledger) in other.days {
            let day = self.days.entry(date).or_default();
            day.customers += ledger.customers;
            day.items += ledger.items;
            day.sales += ledger.sales;
            for (sku, count) in ledger.sku_counts {
                *day.sku_counts.entry(sku).or_default() += count;
            }
        }
    }

    fn add_sku(&mut self, sku: Sku, count: u64) {
        let next_seen = &mut self.next_seen;
        let tally = self.sku_counts.entry(sku).or_insert_with(|| {
            let t = SkuTally { count: 0, first_seen: *next_seen };
            *next_seen += 1;
            t
        });
        tally.count += count;
    }

    // ── Totals ─────────────────────────────────────────────────

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn model(&self) -> &ExpectationModel {
        &self.model
    }

    pub fn total_customers(&self) -> u64 {
        self.total_customers
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_sales(&self) -> f64 {
        self.total_sales
    }

    pub fn sku_count(&self, sku: Sku) -> u64 {
        self.sku_counts.get(&sku).map_or(0, |t| t.count)
    }

    pub fn distinct_skus(&self) -> usize {
        self.sku_counts.len()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayLedger> {
        self.days.get(&date)
    }

    /// Every date with recorded customers or sales, ascending.
    pub fn days(&self) -> impl Iterator<Item = (&NaiveDate, &DayLedger)> {
        self.days.iter()
    }

    /// Dates with at least one transaction, ascending.
    pub fn active_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days
            .iter()
            .filter(|(_, d)| d.items > 0)
            .map(|(date, _)| *date)
    }

    /// True when all three aggregator invariants hold.
    pub fn is_consistent(&self) -> bool {
        let mut per_date: HashMap<Sku, u64> = HashMap::new();
        let mut day_items = 0u64;
        for day in self.days.values() {
            let sum: u64 = day.sku_counts.values().sum();
            if sum != day.items {
                return false;
            }
            day_items += day.items;
            for (sku, count) in &day.sku_counts {
                *per_date.entry(*sku).or_default() += count;
            }
        }
        let global_sum: u64 = self.sku_counts.values().map(|t| t.count).sum();
        let global_matches = per_date.len() == self.sku_counts.len()
            && per_date.iter().all(|(sku, c)| self.sku_count(*sku) == *c);
        global_matches && global_sum == self.total_items && day_items == self.total_items
    }

    // ── Rankings ───────────────────────────────────────────────

    /// SKUs by descending global count; ties go to the SKU recorded first.
    /// Exactly `min(n, distinct SKUs)` entries.
    pub fn top_n(&self, n: usize) -> Vec<SkuCount> {
        let mut ranked: Vec<(Sku, SkuTally)> =
            self.sku_counts.iter().map(|(s, t)| (*s, *t)).collect();
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.1.first_seen.cmp(&b.1.first_seen)));
        ranked
            .into_iter()
            .take(n)
            .map(|(sku, t)| SkuCount { sku, count: t.count })
            .collect()
    }

    /// Per-date ranking; ties go to the lower SKU.
    pub fn top_n_for_date(&self, date: NaiveDate, n: usize) -> Vec<SkuCount> {
        let Some(day) = self.days.get(&date) else {
            return Vec::new();
        };
        let mut ranked: Vec<SkuCount> = day
            .sku_counts
            .iter()
            .map(|(sku, count)| SkuCount { sku: *sku, count: *count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.sku.cmp(&b.sku)));
        ranked.truncate(n);
        ranked
    }

    // ── Window ─────────────────────────────────────────────────

    /// First `window_days` active dates, ascending.
    pub fn window_dates(&self, window_days: usize) -> Vec<NaiveDate> {
        self.active_dates().take(window_days).collect()
    }

    pub fn avg_customers_per_day(&self, window_days: usize) -> f64 {
        let dates = self.window_dates(window_days);
        let sum: u64 = dates.iter().map(|d| self.days[d].customers).sum();
        mean(sum as f64, dates.len())
    }

    /// Mean units sold per window day.
    pub fn avg_items_per_day(&self, window_days: usize) -> f64 {
        let dates = self.window_dates(window_days);
        mean(self.items_in(&dates) as f64, dates.len())
    }

    pub fn total_items_in_window(&self, window_days: usize) -> u64 {
        self.items_in(&self.window_dates(window_days))
    }

    fn items_in(&self, dates: &[NaiveDate]) -> u64 {
        dates.iter().map(|d| self.days[d].items).sum()
    }

    /// Summed per-SKU counts over the window.
    pub fn sku_counts_in_window(&self, window_days: usize) -> HashMap<Sku, u64> {
        let mut total: HashMap<Sku, u64> = HashMap::new();
        for date in self.window_dates(window_days) {
            for (sku, count) in &self.days[&date].sku_counts {
                *total.entry(*sku).or_default() += count;
            }
        }
        total
    }

    /// Observed mean units per day for every SKU sold in the window.
    pub fn actual_average_per_sku(&self, window_days: usize) -> HashMap<Sku, f64> {
        let n = self.window_dates(window_days).len();
        self.sku_counts_in_window(window_days)
            .into_iter()
            .map(|(sku, count)| (sku, mean(count as f64, n)))
            .collect()
    }

    /// Model-implied mean units per day for every catalog SKU.
    ///
    /// Each rule category's expected daily volume (`avg customers * p`) is
    /// split evenly over its SKUs. Whatever remains of
    /// `avg customers * avg items per customer` is split evenly over every
    /// SKU in the catalog, special ones included. Sums run in category then
    /// catalog order, so identical runs give bit-identical values.
    pub fn expected_average_per_sku(&self, window_days: usize) -> BTreeMap<Sku, f64> {
        let mut result: BTreeMap<Sku, f64> = BTreeMap::new();
        let avg_customers = self.avg_customers_per_day(window_days);

        let mut special_total = 0.0;
        for (category, p) in &self.model.category_probabilities {
            let skus = self.catalog.skus_by_category(category);
            if skus.is_empty() {
                continue;
            }
            let expected_total = avg_customers * p;
            special_total += expected_total;
            let per_sku = expected_total / skus.len() as f64;
            for sku in skus {
                *result.entry(*sku).or_default() += per_sku;
            }
        }

        let all = self.catalog.all_skus();
        if !all.is_empty() {
            let expected_items = avg_customers * self.model.avg_items_per_customer;
            let other_total = (expected_items - special_total).max(0.0);
            let per_sku = other_total / all.len() as f64;
            for sku in all {
                *result.entry(*sku).or_default() += per_sku;
            }
        }
        result
    }

    pub fn category_probabilities(&self) -> &BTreeMap<String, f64> {
        &self.model.category_probabilities
    }

    /// Observed per-group statistics over the window.
    pub fn windowed_actual_average(
        &self,
        window_days: usize,
        grouping: &CategoryGrouping,
    ) -> WindowedStats {
        let n = self.window_dates(window_days).len();
        let mut units: HashMap<&str, u64> = HashMap::new();
        for (sku, count) in self.sku_counts_in_window(window_days) {
            if let Some(p) = self.catalog.product_by_sku(sku) {
                *units.entry(grouping.group_of(&p.category)).or_default() += count;
            }
        }
        let rows = grouping
            .groups()
            .map(|g| {
                let total = units.get(g).copied().unwrap_or(0);
                (g, total, mean(total as f64, n))
            })
            .collect::<Vec<_>>();
        self.build_stats(n, grouping, rows)
    }

    /// Model-implied per-group statistics over the window.
    pub fn windowed_expected_average(
        &self,
        window_days: usize,
        grouping: &CategoryGrouping,
    ) -> WindowedStats {
        let n = self.window_dates(window_days).len();
        let per_sku = self.expected_average_per_sku(window_days);
        let mut avg: HashMap<&str, f64> = HashMap::new();
        for sku in self.catalog.all_skus() {
            if let (Some(p), Some(value)) = (self.catalog.product_by_sku(*sku), per_sku.get(sku)) {
                *avg.entry(grouping.group_of(&p.category)).or_default() += value;
            }
        }
        let rows = grouping
            .groups()
            .map(|g| {
                let a = avg.get(g).copied().unwrap_or(0.0);
                (g, (a * n as f64).round() as u64, a)
            })
            .collect::<Vec<_>>();
        self.build_stats(n, grouping, rows)
    }

    fn build_stats(
        &self,
        window_len: usize,
        grouping: &CategoryGrouping,
        rows: Vec<(&str, u64, f64)>,
    ) -> WindowedStats {
        let grand_total: f64 = rows.iter().map(|(_, _, a)| a).sum();
        let rows = rows
            .into_iter()
            .map(|(group, total_units, avg_per_day)| {
                let item_count = grouping.item_count(&self.catalog, group);
                CategoryStat {
                    category: group.to_string(),
                    total_units,
                    avg_per_day,
                    pct_of_total: if grand_total == 0.0 {
                        0.0
                    } else {
                        avg_per_day / grand_total * 100.0
                    },
                    item_count,
                    per_item: mean(avg_per_day, item_count),
                }
            })
            .collect();
        WindowedStats { window_len, rows, grand_total }
    }

    /// Smallest and largest window total among non-special SKUs that sold
    /// in the window. `(0, 0)` when none did.
    pub fn min_max_non_special_in_window(&self, window_days: usize) -> (u64, u64) {
        let counts: Vec<u64> = self
            .sku_counts_in_window(window_days)
            .into_iter()
            .filter(|(sku, _)| {
                self.catalog
                    .product_by_sku(*sku)
                    .is_some_and(|p| !is_special(&p.category))
            })
            .map(|(_, c)| c)
            .collect();
        match (counts.iter().min(), counts.iter().max()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => (0, 0),
        }
    }
}

impl SimObserver for Aggregator {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn observe(&mut self, event: &SimEvent) -> SimResult<()> {
        match event {
            SimEvent::DayOpened { date, customers, .. } => {
                self.record_customers(*date, *customers);
            }
            SimEvent::ItemSold { transaction: t } => {
                self.record_transaction(t.date, t.store_id, t.customer_id, t.sku, t.sale_price);
            }
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn mean(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
