//! Shared primitive types used across the entire simulation.

/// A store number. Stores are numbered from 1.
pub type StoreId = u32;

/// Zero-based offset of a calendar date from the simulation start date.
pub type DayIndex = u32;

/// A customer number within one (store, date). Numbered from 1.
pub type CustomerId = u32;

/// A product stock-keeping unit.
pub type Sku = u32;

/// Round to cents, halves rounding up (2.345 -> 2.35).
pub fn round_cents(v: f64) -> f64 {
    (v * 100.0 + 0.5).floor() / 100.0
}
