//! Events emitted by the engine while a run is generated.
//!
//! RULE: Consumers (aggregator, collectors, recorders) learn about the run
//! ONLY through these events. The engine never calls into a consumer's
//! state directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, DayIndex, Sku, StoreId};

/// One item sold to one customer. Never persisted as an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub date:        NaiveDate,
    pub store_id:    StoreId,
    pub customer_id: CustomerId,
    pub sku:         Sku,
    pub sale_price:  f64,
}

/// Variants are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    RunStarted {
        seed:               u64,
        store_count:        u32,
        start_date:         NaiveDate,
        end_date_inclusive: NaiveDate,
    },
    DayOpened {
        store_id:  StoreId,
        date:      NaiveDate,
        day_index: DayIndex,
        customers: u32,
    },
    CustomerStarted {
        store_id:     StoreId,
        date:         NaiveDate,
        customer_id:  CustomerId,
        target_items: u32,
    },
    /// A rule decided this customer buys from `category`. Emitted even when
    /// the category turns out to have no SKUs.
    CategoryChosen {
        store_id:    StoreId,
        date:        NaiveDate,
        customer_id: CustomerId,
        category:    String,
    },
    ItemSold {
        transaction: Transaction,
    },
    CustomerFinished {
        store_id:    StoreId,
        date:        NaiveDate,
        customer_id: CustomerId,
        items:       u32,
    },
    RunCompleted {
        customers: u64,
        items:     u64,
    },
}

impl SimEvent {
    /// Stable name of the variant, matching its serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. }       => "run_started",
            Self::DayOpened { .. }        => "day_opened",
            Self::CustomerStarted { .. }  => "customer_started",
            Self::CategoryChosen { .. }   => "category_chosen",
            Self::ItemSold { .. }         => "item_sold",
            Self::CustomerFinished { .. } => "customer_finished",
            Self::RunCompleted { .. }     => "run_completed",
        }
    }
}
