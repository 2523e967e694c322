//! Report projection — read-only, serialisable views of a finished run.
//!
//! Nothing here touches files. Writers in the runner decide the layout.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    aggregator::{Aggregator, SkuCount, WindowedStats},
    catalog::{CategoryGrouping, ProductCatalog},
    types::{round_cents, Sku},
};

pub const UNKNOWN_PRODUCT: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunSummary {
    pub total_customers: u64,
    pub total_items:     u64,
    pub total_sales:     f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedItem {
    pub rank:  usize,
    pub sku:   Sku,
    pub count: u64,
    pub name:  String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyTop {
    pub date:  NaiveDate,
    pub items: Vec<RankedItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryProbability {
    pub category:    String,
    pub probability: f64,
}

/// Actual vs expected over the first `window_days` active dates.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowComparison {
    pub window_days:           usize,
    pub window_len:            usize,
    pub probabilities:         Vec<CategoryProbability>,
    pub avg_customers_per_day: f64,
    pub avg_items_per_day:     f64,
    pub non_special_min:       u64,
    pub non_special_max:       u64,
    pub actual:                WindowedStats,
    pub expected:              WindowedStats,
    pub total_units_in_window: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesReport {
    pub summary:    RunSummary,
    pub top_items:  Vec<RankedItem>,
    pub daily_top:  Vec<DailyTop>,
    pub comparison: WindowComparison,
}

impl SalesReport {
    pub fn project(aggregator: &Aggregator, top_n: usize, window_days: usize) -> Self {
        Self::project_grouped(aggregator, top_n, window_days, &CategoryGrouping::special())
    }

    pub fn project_grouped(
        aggregator: &Aggregator,
        top_n: usize,
        window_days: usize,
        grouping: &CategoryGrouping,
    ) -> Self {
        let catalog = aggregator.catalog();
        let daily_top = aggregator
            .active_dates()
            .map(|date| DailyTop {
                date,
                items: rank(catalog, aggregator.top_n_for_date(date, top_n)),
            })
            .collect();

        Self {
            summary: RunSummary {
                total_customers: aggregator.total_customers(),
                total_items:     aggregator.total_items(),
                total_sales:     round_cents(aggregator.total_sales()),
            },
            top_items: rank(catalog, aggregator.top_n(top_n)),
            daily_top,
            comparison: compare(aggregator, window_days, grouping),
        }
    }
}

fn rank(catalog: &ProductCatalog, counts: Vec<SkuCount>) -> Vec<RankedItem> {
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| RankedItem {
            rank:  i + 1,
            sku:   c.sku,
            count: c.count,
            name:  catalog
                .product_by_sku(c.sku)
                .map_or_else(|| UNKNOWN_PRODUCT.to_string(), |p| p.name.clone()),
        })
        .collect()
}

fn compare(aggregator: &Aggregator, window_days: usize, grouping: &CategoryGrouping) -> WindowComparison {
    let probs = aggregator.category_probabilities();
    let probabilities = grouping
        .groups()
        .filter_map(|g| {
            probs.get(g).map(|p| CategoryProbability { category: g.to_string(), probability: *p })
        })
        .collect();
    let (non_special_min, non_special_max) = aggregator.min_max_non_special_in_window(window_days);
    let actual = aggregator.windowed_actual_average(window_days, grouping);

    WindowComparison {
        window_days,
        window_len: actual.window_len,
        probabilities,
        avg_customers_per_day: aggregator.avg_customers_per_day(window_days),
        avg_items_per_day: aggregator.avg_items_per_day(window_days),
        non_special_min,
        non_special_max,
        expected: aggregator.windowed_expected_average(window_days, grouping),
        actual,
        total_units_in_window: aggregator.total_items_in_window(window_days),
    }
}
