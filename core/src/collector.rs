//! Customer summary collector — an independent record of which special
//! categories each customer's rules chose, used to cross-check the
//! aggregator after a run.

use chrono::NaiveDate;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::{
    aggregator::Aggregator,
    catalog::{is_special, SPECIAL_CATEGORIES},
    error::SimResult,
    event::SimEvent,
    observer::SimObserver,
    types::{CustomerId, StoreId},
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CustomerSummary {
    pub date:        NaiveDate,
    pub store_id:    StoreId,
    pub customer_id: CustomerId,
    pub categories:  BTreeSet<String>,
}

/// A category the rules chose more often than the aggregator sold it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CrossCheckIssue {
    pub category: String,
    pub chosen:   u64,
    pub sold:     u64,
}

#[derive(Debug, Default)]
pub struct CustomerSummaryCollector {
    summaries: Vec<CustomerSummary>,
    index:     HashMap<(NaiveDate, StoreId, CustomerId), usize>,
}

impl CustomerSummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn summaries(&self) -> &[CustomerSummary] {
        &self.summaries
    }

    pub fn get(&self, date: NaiveDate, store_id: StoreId, customer_id: CustomerId) -> Option<&CustomerSummary> {
        self.index
            .get(&(date, store_id, customer_id))
            .map(|i| &self.summaries[*i])
    }

    fn mark(&mut self, date: NaiveDate, store_id: StoreId, customer_id: CustomerId) {
        let next = self.summaries.len();
        self.index.entry((date, store_id, customer_id)).or_insert_with(|| {
            self.summaries.push(CustomerSummary {
                date,
                store_id,
                customer_id,
                categories: BTreeSet::new(),
            });
            next
        });
    }

    fn choose(&mut self, date: NaiveDate, store_id: StoreId, customer_id: CustomerId, category: &str) {
        if !is_special(category) {
            return;
        }
        self.mark(date, store_id, customer_id);
        if let Some(i) = self.index.get(&(date, store_id, customer_id)) {
            self.summaries[*i].categories.insert(category.to_string());
        }
    }

    /// Customers whose rules chose each special category.
    pub fn chosen_counts(&self) -> HashMap<String, u64> {
        let mut out: HashMap<String, u64> = HashMap::new();
        for s in &self.summaries {
            for c in &s.categories {
                *out.entry(c.clone()).or_default() += 1;
            }
        }
        out
    }

    /// Every rule choice sells exactly one unit unless the category is
    /// empty, and random fill only adds units, so units sold per category
    /// can never be below the chosen count.
    pub fn cross_check(&self, aggregator: &Aggregator) -> Vec<CrossCheckIssue> {
        let chosen = self.chosen_counts();
        let catalog = aggregator.catalog();
        SPECIAL_CATEGORIES
            .iter()
            .filter_map(|category| {
                let chosen = chosen.get(*category).copied().unwrap_or(0);
                let sold: u64 = catalog
                    .skus_by_category(category)
                    .iter()
                    .map(|sku| aggregator.sku_count(*sku))
                    .sum();
                (chosen > sold).then(|| CrossCheckIssue {
                    category: category.to_string(),
                    chosen,
                    sold,
                })
            })
            .collect()
    }

    /// `date,store_id,customer_id,<0/1 per special category>`, one row per customer.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("date,store_id,customer_id");
        for c in SPECIAL_CATEGORIES {
            out.push(',');
            out.push_str(c);
        }
        out.push('\n');
        for s in &self.summaries {
            let _ = write!(out, "{},{},{}", s.date, s.store_id, s.customer_id);
            for c in SPECIAL_CATEGORIES {
                out.push_str(if s.categories.contains(c) { ",1" } else { ",0" });
            }
            out.push('\n');
        }
        out
    }
}

impl SimObserver for CustomerSummaryCollector {
    fn name(&self) -> &'static str {
        "customer_summary"
    }

    fn observe(&mut self, event: &SimEvent) -> SimResult<()> {
        match event {
            SimEvent::CustomerStarted { store_id, date, customer_id, .. } => {
                self.mark(*date, *store_id, *customer_id);
            }
            SimEvent::CategoryChosen { store_id, date, customer_id, category } => {
                self.choose(*date, *store_id, *customer_id, category);
            }
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
