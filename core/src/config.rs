use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    calendar::SimCalendar,
    error::{SimError, SimResult},
    rules::{default_rules, validate_rules, PurchaseRule},
};

/// Inclusive integer range `[low, high]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntRange {
    pub low:  u32,
    pub high: u32,
}

impl IntRange {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub const fn exactly(v: u32) -> Self {
        Self { low: v, high: v }
    }

    pub fn mean(&self) -> f64 {
        (f64::from(self.low) + f64::from(self.high)) / 2.0
    }

    fn check(&self, field: &'static str) -> SimResult<()> {
        if self.low > self.high {
            return Err(SimError::config(
                field,
                format!("low ({}) > high ({})", self.low, self.high),
            ));
        }
        Ok(())
    }
}

/// Everything that parameterises one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Namespaces every decision key; distinct seeds give independent runs.
    pub seed:                    u64,
    pub store_count:             u32,
    pub start_date:              NaiveDate,
    pub end_date_inclusive:      NaiveDate,
    pub customers_per_day:       IntRange,
    pub items_per_customer:      IntRange,
    pub weekend_customer_uplift: u32,
    pub price_multiplier:        f64,
    pub window_days:             usize,
    pub top_n:                   usize,
    pub rules:                   Vec<PurchaseRule>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                    20_240_101,
            store_count:             1,
            start_date:              ymd(2024, 1, 1),
            end_date_inclusive:      ymd(2024, 12, 31),
            customers_per_day:       IntRange::new(1020, 1060),
            items_per_customer:      IntRange::new(1, 50),
            weekend_customer_uplift: 50,
            price_multiplier:        1.03,
            window_days:             14,
            top_n:                   10,
            rules:                   default_rules(),
        }
    }
}

impl SimConfig {
    /// Load from a JSON file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Small, fast configuration for tests: two stores, three weeks.
    pub fn default_test() -> Self {
        Self {
            seed:                    42,
            store_count:             2,
            start_date:              ymd(2024, 1, 1),
            end_date_inclusive:      ymd(2024, 1, 21),
            customers_per_day:       IntRange::new(40, 60),
            items_per_customer:      IntRange::new(1, 12),
            weekend_customer_uplift: 10,
            ..Self::default()
        }
    }

    pub fn calendar(&self) -> SimCalendar {
        SimCalendar::new(self.start_date, self.end_date_inclusive)
    }

    pub fn avg_items_per_customer(&self) -> f64 {
        self.items_per_customer.mean()
    }

    /// Reject any configuration a run must not start with.
    pub fn validate(&self) -> SimResult<()> {
        if self.store_count == 0 {
            return Err(SimError::config("store_count", "must be at least 1"));
        }
        if self.start_date > self.end_date_inclusive {
            return Err(SimError::config(
                "end_date_inclusive",
                format!("{} is before start_date {}", self.end_date_inclusive, self.start_date),
            ));
        }
        self.customers_per_day.check("customers_per_day")?;
        self.items_per_customer.check("items_per_customer")?;
        if self.customers_per_day.high.checked_add(self.weekend_customer_uplift).is_none() {
            return Err(SimError::config(
                "weekend_customer_uplift",
                format!(
                    "{} on top of customers_per_day.high {} overflows u32",
                    self.weekend_customer_uplift, self.customers_per_day.high
                ),
            ));
        }
        if !self.price_multiplier.is_finite() || self.price_multiplier < 0.0 {
            return Err(SimError::config(
                "price_multiplier",
                format!("{} is not a finite non-negative number", self.price_multiplier),
            ));
        }
        validate_rules(&self.rules)
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    // Literal dates above are all valid.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SimConfig::default().validate().unwrap();
        SimConfig::default_test().validate().unwrap();
        assert_eq!(SimConfig::default().window_days, 14);
    }

    #[test]
    fn inverted_ranges_are_fatal() {
        let mut c = SimConfig::default_test();
        c.items_per_customer = IntRange::new(5, 4);
        let err = c.validate().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { field: "items_per_customer", .. }));

        let mut c = SimConfig::default_test();
        c.customers_per_day = IntRange::new(10, 1);
        assert!(c.validate().is_err());

        let mut c = SimConfig::default_test();
        c.end_date_inclusive = ymd(2023, 12, 31);
        assert!(c.validate().is_err());
    }

    #[test]
    fn weekend_uplift_must_fit_in_u32() {
        let mut c = SimConfig::default_test();
        c.customers_per_day = IntRange::exactly(u32::MAX);
        c.weekend_customer_uplift = 1;
        let err = c.validate().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { field: "weekend_customer_uplift", .. }));

        c.customers_per_day = IntRange::new(1, u32::MAX - 5);
        c.weekend_customer_uplift = 5;
        c.validate().unwrap();
    }

    #[test]
    fn zero_stores_and_bad_multiplier_are_fatal() {
        let mut c = SimConfig::default_test();
        c.store_count = 0;
        assert!(c.validate().is_err());

        let mut c = SimConfig::default_test();
        c.price_multiplier = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let c: SimConfig = serde_json::from_str(r#"{"seed": 7, "store_count": 3}"#).unwrap();
        assert_eq!(c.seed, 7);
        assert_eq!(c.store_count, 3);
        assert_eq!(c.rules, default_rules());
        assert_eq!(c.start_date, ymd(2024, 1, 1));
    }

    #[test]
    fn negative_counts_do_not_parse() {
        let r: Result<SimConfig, _> =
            serde_json::from_str(r#"{"customers_per_day": {"low": -1, "high": 5}}"#);
        assert!(r.is_err());
    }

    #[test]
    fn range_mean() {
        assert_eq!(IntRange::new(1, 50).mean(), 25.5);
        assert_eq!(IntRange::exactly(3).mean(), 3.0);
    }
}
