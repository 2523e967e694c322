//! sim-runner: headless runner for the point-of-sale transaction simulator.
//!
//! Usage:
//!   sim-runner --seed 12345 --out ./out
//!   sim-runner --config data/config.json --products data/products.json --db run.db
//!   sim-runner --sanity-check --audit 1:2024-03-02:17

mod export;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::env;
use std::path::Path;
use std::sync::Arc;

use possim_core::{
    catalog::ProductCatalog,
    collector::CustomerSummaryCollector,
    config::SimConfig,
    engine::SimEngine,
    observer::SimObserver,
    report::SalesReport,
    store::SimStore,
    types::{CustomerId, StoreId},
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let out_dir = arg_value(&args, "--out").unwrap_or("./out");
    let sanity_check = args.iter().any(|a| a == "--sanity-check");

    let mut config = match arg_value(&args, "--config") {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading config {path}"))?,
        None => SimConfig::default(),
    };
    config.seed = parse_arg(&args, "--seed", config.seed);

    let catalog = match arg_value(&args, "--products") {
        Some(path) => ProductCatalog::load(path).with_context(|| format!("loading products {path}"))?,
        None => {
            log::info!("No --products given; using the built-in demo catalog");
            ProductCatalog::demo()
        }
    };
    let audit = arg_value(&args, "--audit").map(parse_audit).transpose()?;

    let run_id = format!("run-{}", uuid::Uuid::new_v4());
    let seed = config.seed;
    let (window_days, top_n) = (config.window_days, config.top_n);

    println!("Point-of-sale simulator: sim-runner");
    println!("  run_id:    {run_id}");
    println!("  seed:      {seed}");
    println!("  stores:    {}", config.store_count);
    println!("  dates:     {}..={}", config.start_date, config.end_date_inclusive);
    println!("  products:  {}", catalog.len());
    println!("  out:       {out_dir}");
    println!();

    let engine = SimEngine::new(config, Arc::new(catalog))?;
    let mut aggregator = engine.new_aggregator();
    let mut collector = CustomerSummaryCollector::new();
    {
        let mut observers: Vec<&mut dyn SimObserver> = vec![&mut aggregator];
        if sanity_check {
            observers.push(&mut collector);
        }
        engine.run(&mut observers)?;
    }

    let report = SalesReport::project(&aggregator, top_n, window_days);
    print_summary(&report);

    let out = Path::new(out_dir);
    for path in export::write_reports(out, &run_id, seed, &report)? {
        log::info!("Wrote {}", path.display());
    }

    if sanity_check {
        let path = export::write_customer_summary(out, &collector)?;
        log::info!("Wrote {}", path.display());
        let issues = collector.cross_check(&aggregator);
        if issues.is_empty() {
            println!("Sanity check: OK ({} customers)", collector.len());
        } else {
            for issue in &issues {
                println!(
                    "Sanity check: {} chosen by {} customers but only {} sold",
                    issue.category, issue.chosen, issue.sold
                );
            }
        }
    }

    if let Some(db) = arg_value(&args, "--db") {
        let store = SimStore::open(db)?;
        store.migrate()?;
        store.insert_run(&run_id, seed, env!("CARGO_PKG_VERSION"))?;
        store.save_aggregate(&run_id, &aggregator)?;
        println!("Saved run {run_id} to {db}");
    }

    if let Some((store_id, date, customer_id)) = audit {
        print_audit(&engine, store_id, date, customer_id);
    }

    Ok(())
}

fn print_summary(report: &SalesReport) {
    println!("=== RUN SUMMARY ===");
    println!("  customers:  {}", report.summary.total_customers);
    println!("  items:      {}", report.summary.total_items);
    println!("  sales:      ${:.2}", report.summary.total_sales);
    println!();
    println!("=== TOP {} ITEMS ===", report.top_items.len());
    for item in &report.top_items {
        println!("  {:>2}. SKU={}  Count={}  Name={}", item.rank, item.sku, item.count, item.name);
    }
    println!();
}

fn print_audit(engine: &SimEngine, store_id: StoreId, date: NaiveDate, customer_id: CustomerId) {
    let Some(basket) = engine.replay_customer(store_id, date, customer_id) else {
        println!("Audit: store {store_id} had no customer {customer_id} on {date}");
        return;
    };
    println!("=== AUDIT store={store_id} date={date} customer={customer_id} ===");
    println!("  target items: {}", basket.target_items);
    println!("  rule choices: {}", basket.chosen.join(", "));
    for t in &basket.transactions {
        let name = engine
            .catalog()
            .product_by_sku(t.sku)
            .map_or("?", |p| p.name.as_str());
        println!("  SKU={}  ${:.2}  {}", t.sku, t.sale_price, name);
    }
}

/// `STORE:YYYY-MM-DD:CUSTOMER`
fn parse_audit(arg: &str) -> Result<(StoreId, NaiveDate, CustomerId)> {
    let parts: Vec<&str> = arg.split(':').collect();
    let [store, date, customer] = parts.as_slice() else {
        bail!("--audit expects STORE:YYYY-MM-DD:CUSTOMER, got '{arg}'");
    };
    Ok((
        store.parse().with_context(|| format!("bad store id '{store}'"))?,
        NaiveDate::parse_from_str(date, "%Y-%m-%d").with_context(|| format!("bad date '{date}'"))?,
        customer.parse().with_context(|| format!("bad customer id '{customer}'"))?,
    ))
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    arg_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
