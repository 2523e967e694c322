//! Report projection and the customer-summary cross-check.

use chrono::NaiveDate;
use possim_core::{
    aggregator::{Aggregator, ExpectationModel},
    catalog::{category, Product, ProductCatalog, SPECIAL_CATEGORIES},
    collector::CustomerSummaryCollector,
    engine::SimEngine,
    report::{SalesReport, UNKNOWN_PRODUCT},
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn tiny_aggregator() -> Aggregator {
    let catalog = ProductCatalog::from_products(vec![
        Product { sku: 1, name: "Whole Milk".into(), category: category::MILK.into(), base_price: 3.0 },
        Product { sku: 2, name: "Pretzels".into(), category: "Snacks".into(), base_price: 1.0 },
    ])
    .unwrap();
    let mut probs = BTreeMap::new();
    probs.insert(category::MILK.to_string(), 0.7);
    probs.insert(category::BREAD.to_string(), 0.5);
    Aggregator::new(
        Arc::new(catalog),
        ExpectationModel { category_probabilities: probs, avg_items_per_customer: 2.0 },
    )
}

#[test]
fn summary_rounds_sales_to_cents() {
    let mut agg = tiny_aggregator();
    agg.record_customers(day(1), 3);
    for _ in 0..3 {
        agg.record_transaction(day(1), 1, 1, 1, 0.1);
    }
    let report = SalesReport::project(&agg, 10, 14);
    assert_eq!(report.summary.total_customers, 3);
    assert_eq!(report.summary.total_items, 3);
    assert_eq!(report.summary.total_sales, 0.3);
}

#[test]
fn ranked_items_carry_names_and_unknowns() {
    let mut agg = tiny_aggregator();
    agg.record_transaction(day(1), 1, 1, 2, 1.0);
    agg.record_transaction(day(1), 1, 1, 2, 1.0);
    agg.record_transaction(day(1), 1, 2, 99, 1.0);
    agg.record_transaction(day(2), 1, 1, 1, 3.0);

    let report = SalesReport::project(&agg, 10, 14);
    let top: Vec<(usize, u32, &str)> =
        report.top_items.iter().map(|r| (r.rank, r.sku, r.name.as_str())).collect();
    assert_eq!(top, vec![(1, 2, "Pretzels"), (2, 99, UNKNOWN_PRODUCT), (3, 1, "Whole Milk")]);

    let dates: Vec<NaiveDate> = report.daily_top.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![day(1), day(2)]);
    assert_eq!(report.daily_top[0].items.len(), 2);
    assert_eq!(report.daily_top[1].items[0].name, "Whole Milk");
}

#[test]
fn top_n_limits_both_rankings() {
    let mut agg = tiny_aggregator();
    agg.record_transaction(day(1), 1, 1, 1, 1.0);
    agg.record_transaction(day(1), 1, 1, 2, 1.0);
    let report = SalesReport::project(&agg, 1, 14);
    assert_eq!(report.top_items.len(), 1);
    assert!(report.daily_top.iter().all(|d| d.items.len() == 1));
}

#[test]
fn comparison_lists_probabilities_in_report_order() {
    let agg = tiny_aggregator();
    let report = SalesReport::project(&agg, 10, 14);
    let cats: Vec<&str> =
        report.comparison.probabilities.iter().map(|p| p.category.as_str()).collect();
    assert_eq!(cats, vec![category::MILK, category::BREAD]);
    // Nothing sold: the window is empty and every statistic is zero.
    assert_eq!(report.comparison.window_len, 0);
    assert_eq!(report.comparison.avg_items_per_day, 0.0);
    assert_eq!(report.comparison.actual.grand_total, 0.0);
    assert_eq!(report.comparison.expected.grand_total, 0.0);
}

#[test]
fn comparison_rows_cover_special_categories_then_other() {
    let engine = SimEngine::build_test(21).unwrap();
    let mut agg = engine.new_aggregator();
    engine.run(&mut [&mut agg]).unwrap();

    let report = SalesReport::project(&agg, 10, engine.config().window_days);
    let c = &report.comparison;
    let rows: Vec<&str> = c.actual.rows.iter().map(|r| r.category.as_str()).collect();
    let mut expected_rows = SPECIAL_CATEGORIES.to_vec();
    expected_rows.push(category::OTHER);
    assert_eq!(rows, expected_rows);
    assert_eq!(c.expected.rows.len(), rows.len());
    assert_eq!(c.window_len, engine.config().window_days);
    assert_eq!(c.probabilities.len(), SPECIAL_CATEGORIES.len());
    assert!(c.non_special_min <= c.non_special_max);
    let units: u64 = c.actual.rows.iter().map(|r| r.total_units).sum();
    assert_eq!(units, c.total_units_in_window);
}

#[test]
fn report_serialises_to_json() {
    let engine = SimEngine::build_test(3).unwrap();
    let mut agg = engine.new_aggregator();
    engine.run(&mut [&mut agg]).unwrap();
    let report = SalesReport::project(&agg, 10, 7);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["total_items"], agg.total_items());
    assert_eq!(json["top_items"].as_array().unwrap().len(), 10);
    assert_eq!(json["comparison"]["window_days"], 7);
}

#[test]
fn cross_check_is_clean_on_a_normal_run() {
    let engine = SimEngine::build_test(8).unwrap();
    let mut agg = engine.new_aggregator();
    let mut collector = CustomerSummaryCollector::new();
    engine.run(&mut [&mut agg, &mut collector]).unwrap();

    assert_eq!(collector.len() as u64, agg.total_customers());
    assert!(collector.cross_check(&agg).is_empty());

    let first = &collector.summaries()[0];
    let again = collector.get(first.date, first.store_id, first.customer_id).unwrap();
    assert_eq!(again, first);
}

#[test]
fn collector_csv_has_one_row_per_customer() {
    let engine = SimEngine::build_test(9).unwrap();
    let mut collector = CustomerSummaryCollector::new();
    engine.run(&mut [&mut collector]).unwrap();

    let csv = collector.to_csv();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "date,store_id,customer_id,Milk,Cereal,Baby Food,Diapers,Peanut Butter,Bread,Jelly/Jam"
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), collector.len());
    assert!(rows.iter().all(|r| r.split(',').count() == 10));
}
