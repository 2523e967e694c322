//! Keyed deterministic random decisions.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! Every random decision is a pure function of the run seed and a
//! `DecisionKey`. There is no stream and no mutable generator state:
//!   - The same key yields the same decision forever, in any call order.
//!   - Stores, days and customers can be processed in any order (or in
//!     parallel) without changing a single basket.
//!   - Any one decision can be replayed in isolation for auditing.
//!
//! The key fields are folded through a splitmix64 finalizer and the result
//! seeds a one-shot PCG generator, whose first output is the decision value.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, DayIndex, StoreId};

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Stable rule identifiers. One per kind of random decision.
/// NEVER renumber or reuse an entry. Append only.
/// Renumbering changes the outcome of every decision using that rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u64)]
pub enum RuleId {
    CustomersForDay = 1,
    ItemCount = 2,

    Milk = 10,
    MilkPick = 11,
    CerealGivenMilk = 12,
    CerealWithoutMilk = 13,
    CerealPick = 14,

    BabyFood = 20,
    BabyFoodPick = 21,
    DiapersGivenBabyFood = 22,
    DiapersWithoutBabyFood = 23,
    DiapersPick = 24,

    Bread = 30,
    BreadPick = 31,

    PeanutButter = 40,
    PeanutButterPick = 41,
    JamGivenPeanutButter = 42,
    JamWithoutPeanutButter = 43,
    JamPick = 44,

    RandomPick = 90,
    // Add new rules here.
}

impl RuleId {
    pub const ALL: [RuleId; 20] = [
        Self::CustomersForDay,
        Self::ItemCount,
        Self::Milk,
        Self::MilkPick,
        Self::CerealGivenMilk,
        Self::CerealWithoutMilk,
        Self::CerealPick,
        Self::BabyFood,
        Self::BabyFoodPick,
        Self::DiapersGivenBabyFood,
        Self::DiapersWithoutBabyFood,
        Self::DiapersPick,
        Self::Bread,
        Self::BreadPick,
        Self::PeanutButter,
        Self::PeanutButterPick,
        Self::JamGivenPeanutButter,
        Self::JamWithoutPeanutButter,
        Self::JamPick,
        Self::RandomPick,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }
}

/// Coordinates of exactly one random decision.
///
/// `sub_index` separates repeated decisions of the same rule for the same
/// customer (e.g. the n-th random fill slot).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub store_id:    StoreId,
    pub day_index:   DayIndex,
    pub customer_id: CustomerId,
    pub rule:        RuleId,
    pub sub_index:   u32,
}

impl DecisionKey {
    pub fn new(
        store_id: StoreId,
        day_index: DayIndex,
        customer_id: CustomerId,
        rule: RuleId,
        sub_index: u32,
    ) -> Self {
        Self { store_id, day_index, customer_id, rule, sub_index }
    }

    /// Fold all key fields and the seed into one well-mixed word.
    fn fold(&self, seed: u64) -> u64 {
        let fields = [
            u64::from(self.store_id),
            u64::from(self.day_index),
            u64::from(self.customer_id),
            self.rule.code(),
            u64::from(self.sub_index),
        ];
        let mut h = splitmix64(seed ^ GOLDEN_GAMMA);
        for (slot, field) in fields.iter().enumerate() {
            let lane = (slot as u64 + 1).wrapping_mul(GOLDEN_GAMMA);
            h = splitmix64(h ^ splitmix64(field.wrapping_add(lane)));
        }
        h
    }
}

/// Stateless decision source for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyedRng {
    seed: u64,
}

impl KeyedRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Raw 64-bit decision value for `key`.
    pub fn draw_u64(&self, key: &DecisionKey) -> u64 {
        Pcg64Mcg::seed_from_u64(key.fold(self.seed)).next_u64()
    }

    /// Decision value in [0.0, 1.0) with 53 bits of precision.
    pub fn unit_f64(&self, key: &DecisionKey) -> f64 {
        (self.draw_u64(key) >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Integer in [low, high].
    ///
    /// Uses a 64x64->128 multiply-shift onto the span; bias is below
    /// span / 2^64, which is negligible for every range the simulation uses.
    ///
    /// Panics if `low > high`.
    pub fn uniform_int_inclusive(&self, low: i64, high: i64, key: &DecisionKey) -> i64 {
        assert!(low <= high, "uniform_int_inclusive: low ({low}) > high ({high})");
        let span = (high.wrapping_sub(low) as u64).wrapping_add(1);
        let bits = self.draw_u64(key);
        if span == 0 {
            // Full 64-bit range.
            return bits as i64;
        }
        let offset = ((u128::from(bits) * u128::from(span)) >> 64) as u64;
        low.wrapping_add(offset as i64)
    }

    /// True with probability `p`. `p <= 0` is always false, `p >= 1` always true.
    pub fn bernoulli(&self, p: f64, key: &DecisionKey) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.unit_f64(key) < p
    }

    /// Uniform index into a list of `len` entries. `None` for an empty list.
    pub fn pick_index(&self, len: usize, key: &DecisionKey) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.uniform_int_inclusive(0, len as i64 - 1, key) as usize)
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
