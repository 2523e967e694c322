//! The simulation engine: generates every store's transactions.
//!
//! EXECUTION ORDER (fixed):
//!   for each store 1..=store_count
//!     for each date in the calendar
//!       1. draw the day's customer count (+ weekend uplift)
//!       2. for each customer 1..=count
//!          a. draw the item target
//!          b. walk the purchase rules in order, stopping once the target is met
//!          c. fill any remaining slots with uniformly random SKUs
//!
//! RULES:
//!   - Every random decision is keyed; see rng.rs. Order of processing
//!     never changes a result.
//!   - A rule that skips (quota met) consumes no draws.
//!   - Catalog gaps (empty category, unknown SKU) add nothing and never fail.
//!   - Observers see everything through SimEvent; see observer.rs.
//!   - A customer's events are delivered together once the basket is
//!     complete: CustomerStarted, CategoryChosen*, ItemSold*, CustomerFinished.
//!     Nothing is emitted mid-basket.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::{
    aggregator::{Aggregator, ExpectationModel},
    calendar::SimCalendar,
    catalog::ProductCatalog,
    config::SimConfig,
    error::SimResult,
    event::{SimEvent, Transaction},
    observer::{notify, SimObserver},
    rng::{DecisionKey, KeyedRng, RuleId},
    rules::PurchaseRule,
    types::{round_cents, CustomerId, DayIndex, Sku, StoreId},
};

/// Upper bound on a basket's up-front allocation; larger targets grow on demand.
const PREALLOCATED_ITEMS: u32 = 64;

/// Everything one customer did on one visit.
#[derive(Debug, Clone, PartialEq)]
pub struct Basket {
    pub store_id:     StoreId,
    pub date:         NaiveDate,
    pub customer_id:  CustomerId,
    pub target_items: u32,
    /// Categories a rule decided on, in decision order.
    pub chosen:       Vec<String>,
    pub transactions: Vec<Transaction>,
}

impl Basket {
    pub fn items(&self) -> u32 {
        self.transactions.len() as u32
    }

    pub fn skus(&self) -> Vec<Sku> {
        self.transactions.iter().map(|t| t.sku).collect()
    }
}

/// Totals produced by a run (or a single store of one).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTotals {
    pub customers: u64,
    pub items:     u64,
    pub sales:     f64,
}

impl RunTotals {
    fn add(&mut self, other: RunTotals) {
        self.customers += other.customers;
        self.items += other.items;
        self.sales += other.sales;
    }
}

pub struct SimEngine {
    config:   SimConfig,
    catalog:  Arc<ProductCatalog>,
    rng:      KeyedRng,
    calendar: SimCalendar,
}

impl SimEngine {
    /// Validates `config`; an invalid configuration never starts a run.
    pub fn new(config: SimConfig, catalog: Arc<ProductCatalog>) -> SimResult<Self> {
        config.validate()?;
        for rule in &config.rules {
            let mut categories = vec![rule.category.as_str()];
            if let Some(c) = &rule.companion {
                categories.push(c.category.as_str());
            }
            for category in categories {
                if catalog.skus_by_category(category).is_empty() {
                    log::warn!(
                        "rule '{}': category '{category}' has no SKUs; its picks will add nothing",
                        rule.name
                    );
                }
            }
        }
        if catalog.is_empty() {
            log::warn!("catalog is empty; no transactions will be generated");
        }
        Ok(Self {
            rng: KeyedRng::new(config.seed),
            calendar: config.calendar(),
            config,
            catalog,
        })
    }

    /// Fully wired test engine: `SimConfig::default_test()` with `seed`,
    /// over the demo catalog.
    pub fn build_test(seed: u64) -> SimResult<Self> {
        let config = SimConfig { seed, ..SimConfig::default_test() };
        Self::new(config, Arc::new(ProductCatalog::demo()))
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ProductCatalog> {
        &self.catalog
    }

    pub fn rng(&self) -> KeyedRng {
        self.rng
    }

    pub fn calendar(&self) -> SimCalendar {
        self.calendar
    }

    /// An empty aggregator wired to this engine's catalog and probabilities.
    pub fn new_aggregator(&self) -> Aggregator {
        Aggregator::new(
            Arc::clone(&self.catalog),
            ExpectationModel::from_config(&self.config),
        )
    }

    /// Run every store over the whole calendar.
    pub fn run(&self, observers: &mut [&mut dyn SimObserver]) -> SimResult<RunTotals> {
        log::info!(
            "Run started: seed={} stores={} days={} ({}..={})",
            self.config.seed,
            self.config.store_count,
            self.calendar.len(),
            self.calendar.start,
            self.calendar.end_inclusive
        );
        notify(
            observers,
            &SimEvent::RunStarted {
                seed:               self.config.seed,
                store_count:        self.config.store_count,
                start_date:         self.calendar.start,
                end_date_inclusive: self.calendar.end_inclusive,
            },
        )?;

        let mut totals = RunTotals::default();
        for store_id in 1..=self.config.store_count {
            totals.add(self.run_store(store_id, observers)?);
        }

        notify(
            observers,
            &SimEvent::RunCompleted { customers: totals.customers, items: totals.items },
        )?;
        log::info!(
            "Run completed: customers={} items={} sales={:.2}",
            totals.customers,
            totals.items,
            totals.sales
        );
        Ok(totals)
    }

    /// Run one store over the whole calendar. Stores are independent, so
    /// separate stores may feed separate aggregators that are merged later.
    pub fn run_store(
        &self,
        store_id: StoreId,
        observers: &mut [&mut dyn SimObserver],
    ) -> SimResult<RunTotals> {
        let mut totals = RunTotals::default();
        for (day_index, date) in self.calendar.days() {
            let customers = self.customers_for_day(store_id, date, day_index);
            notify(observers, &SimEvent::DayOpened { store_id, date, day_index, customers })?;
            totals.customers += u64::from(customers);

            let mut day_items = 0u64;
            for customer_id in 1..=customers {
                let basket = self.shop(store_id, date, day_index, customer_id);
                day_items += u64::from(basket.items());
                totals.sales += basket.transactions.iter().map(|t| t.sale_price).sum::<f64>();
                emit_basket(observers, basket)?;
            }
            totals.items += day_items;

            log::debug!("store={store_id} date={date} customers={customers} items={day_items}");
        }
        Ok(totals)
    }

    /// Customer count for one (store, date): a keyed draw from the configured
    /// range, plus the uplift on Saturdays and Sundays.
    pub fn customers_for_day(&self, store_id: StoreId, date: NaiveDate, day_index: DayIndex) -> u32 {
        let range = self.config.customers_per_day;
        let key = DecisionKey::new(store_id, day_index, 0, RuleId::CustomersForDay, 0);
        let base = self
            .rng
            .uniform_int_inclusive(i64::from(range.low), i64::from(range.high), &key)
            as u32;
        if SimCalendar::is_weekend(date) {
            // Validation guarantees high + uplift fits.
            base.saturating_add(self.config.weekend_customer_uplift)
        } else {
            base
        }
    }

    /// Recompute one customer's basket from its keys alone.
    ///
    /// Returns `None` if the store, date or customer did not exist in this run.
    pub fn replay_customer(
        &self,
        store_id: StoreId,
        date: NaiveDate,
        customer_id: CustomerId,
    ) -> Option<Basket> {
        if store_id == 0 || store_id > self.config.store_count || customer_id == 0 {
            return None;
        }
        let day_index = self.calendar.day_index_of(date)?;
        if customer_id > self.customers_for_day(store_id, date, day_index) {
            return None;
        }
        Some(self.shop(store_id, date, day_index, customer_id))
    }

    /// Sale price of a product: base price times the multiplier, in cents.
    pub fn sale_price(&self, base_price: f64) -> f64 {
        round_cents(base_price * self.config.price_multiplier)
    }

    fn shop(
        &self,
        store_id: StoreId,
        date: NaiveDate,
        day_index: DayIndex,
        customer_id: CustomerId,
    ) -> Basket {
        let range = self.config.items_per_customer;
        let target = self.rng.uniform_int_inclusive(
            i64::from(range.low),
            i64::from(range.high),
            &DecisionKey::new(store_id, day_index, customer_id, RuleId::ItemCount, 0),
        ) as u32;

        let mut shopper = Shopper {
            engine: self,
            day_index,
            basket: Basket {
                store_id,
                date,
                customer_id,
                target_items: target,
                chosen: Vec::new(),
                transactions: Vec::with_capacity(target.min(PREALLOCATED_ITEMS) as usize),
            },
        };

        for rule in &self.config.rules {
            if shopper.quota_met() {
                break;
            }
            shopper.apply(rule);
        }
        if !shopper.quota_met() {
            shopper.fill_random();
        }
        shopper.basket
    }
}

fn emit_basket(observers: &mut [&mut dyn SimObserver], basket: Basket) -> SimResult<()> {
    let Basket { store_id, date, customer_id, target_items, chosen, transactions } = basket;
    notify(observers, &SimEvent::CustomerStarted { store_id, date, customer_id, target_items })?;
    for category in chosen {
        notify(observers, &SimEvent::CategoryChosen { store_id, date, customer_id, category })?;
    }
    let items = transactions.len() as u32;
    for transaction in transactions {
        notify(observers, &SimEvent::ItemSold { transaction })?;
    }
    notify(observers, &SimEvent::CustomerFinished { store_id, date, customer_id, items })
}

/// Per-customer decision state: only the basket built so far.
struct Shopper<'a> {
    engine:    &'a SimEngine,
    day_index: DayIndex,
    basket:    Basket,
}

impl Shopper<'_> {
    fn key(&self, rule: RuleId, sub_index: u32) -> DecisionKey {
        DecisionKey::new(
            self.basket.store_id,
            self.day_index,
            self.basket.customer_id,
            rule,
            sub_index,
        )
    }

    fn items(&self) -> u32 {
        self.basket.items()
    }

    fn quota_met(&self) -> bool {
        self.items() >= self.basket.target_items
    }

    fn chance(&self, p: f64, rule: RuleId) -> bool {
        self.engine.rng.bernoulli(p, &self.key(rule, 0))
    }

    fn apply(&mut self, rule: &PurchaseRule) {
        if self.chance(rule.probability, rule.decision) {
            self.buy_one(&rule.category, rule.pick);
            if self.quota_met() {
                return;
            }
            if let Some(c) = &rule.companion {
                if self.chance(c.given, c.given_decision) {
                    self.buy_one(&c.category, c.pick);
                }
            }
        } else if let Some(c) = &rule.companion {
            if self.chance(c.without, c.without_decision) {
                self.buy_one(&c.category, c.pick);
            }
        }
    }

    /// Pick one SKU of `category`. The pick is keyed by how many items the
    /// customer already has. An empty category adds nothing.
    fn buy_one(&mut self, category: &str, pick: RuleId) {
        self.basket.chosen.push(category.to_string());
        let skus = self.engine.catalog.skus_by_category(category);
        let key = self.key(pick, self.items());
        if let Some(idx) = self.engine.rng.pick_index(skus.len(), &key) {
            self.sell(skus[idx]);
        }
    }

    /// One uniform pick over the whole catalog per open slot. The only
    /// step that may repeat a SKU for the same customer.
    fn fill_random(&mut self) {
        let all = self.engine.catalog.all_skus();
        for slot in self.items()..self.basket.target_items {
            let key = self.key(RuleId::RandomPick, slot);
            if let Some(idx) = self.engine.rng.pick_index(all.len(), &key) {
                self.sell(all[idx]);
            }
        }
    }

    fn sell(&mut self, sku: Sku) {
        let Some(product) = self.engine.catalog.product_by_sku(sku) else {
            log::warn!("SKU {sku} is listed but has no product; skipped");
            return;
        };
        self.basket.transactions.push(Transaction {
            date:        self.basket.date,
            store_id:    self.basket.store_id,
            customer_id: self.basket.customer_id,
            sku,
            sale_price:  self.engine.sale_price(product.base_price),
        });
    }
}
