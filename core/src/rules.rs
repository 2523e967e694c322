//! Purchase rules as data.
//!
//! Each rule is one block of the per-customer decision tree: a primary
//! category bought with some probability, optionally followed by a
//! companion category whose probability depends on whether the primary
//! was bought. Adding or removing a rule is a data change only; the engine
//! walks whatever list the configuration carries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::{
    catalog::category,
    error::{SimError, SimResult},
    rng::RuleId,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRule {
    pub name:        String,
    pub category:    String,
    pub probability: f64,
    /// Key rule for the buy / don't-buy draw.
    pub decision:    RuleId,
    /// Key rule for choosing the concrete SKU.
    pub pick:        RuleId,
    #[serde(default)]
    pub companion:   Option<CompanionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanionRule {
    pub category:         String,
    /// Probability when the primary category was bought.
    pub given:            f64,
    /// Probability when it was not.
    pub without:          f64,
    pub given_decision:   RuleId,
    pub without_decision: RuleId,
    pub pick:             RuleId,
}

impl PurchaseRule {
    fn single(name: &str, category: &str, probability: f64, decision: RuleId, pick: RuleId) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            probability,
            decision,
            pick,
            companion: None,
        }
    }

    fn with_companion(mut self, companion: CompanionRule) -> Self {
        self.companion = Some(companion);
        self
    }

    /// Every rule id this block may consume.
    pub fn rule_ids(&self) -> Vec<RuleId> {
        let mut ids = vec![self.decision, self.pick];
        if let Some(c) = &self.companion {
            ids.extend([c.given_decision, c.without_decision, c.pick]);
        }
        ids
    }
}

/// The production decision tree, in evaluation order.
pub fn default_rules() -> Vec<PurchaseRule> {
    vec![
        PurchaseRule::single("milk_cereal", category::MILK, 0.70, RuleId::Milk, RuleId::MilkPick)
            .with_companion(CompanionRule {
                category:         category::CEREAL.into(),
                given:            0.50,
                without:          0.05,
                given_decision:   RuleId::CerealGivenMilk,
                without_decision: RuleId::CerealWithoutMilk,
                pick:             RuleId::CerealPick,
            }),
        PurchaseRule::single(
            "baby_food_diapers",
            category::BABY_FOOD,
            0.20,
            RuleId::BabyFood,
            RuleId::BabyFoodPick,
        )
        .with_companion(CompanionRule {
            category:         category::DIAPERS.into(),
            given:            0.80,
            without:          0.01,
            given_decision:   RuleId::DiapersGivenBabyFood,
            without_decision: RuleId::DiapersWithoutBabyFood,
            pick:             RuleId::DiapersPick,
        }),
        PurchaseRule::single("bread", category::BREAD, 0.50, RuleId::Bread, RuleId::BreadPick),
        PurchaseRule::single(
            "peanut_butter_jam",
            category::PEANUT_BUTTER,
            0.10,
            RuleId::PeanutButter,
            RuleId::PeanutButterPick,
        )
        .with_companion(CompanionRule {
            category:         category::JELLY_JAM.into(),
            given:            0.90,
            without:          0.05,
            given_decision:   RuleId::JamGivenPeanutButter,
            without_decision: RuleId::JamWithoutPeanutButter,
            pick:             RuleId::JamPick,
        }),
    ]
}

/// Probability that one customer buys from each rule category, ignoring
/// the item quota. Companion categories get `p*given + (1-p)*without`.
/// A category named by several rules accumulates. Ordered by category so
/// every sum over the map runs in the same order.
pub fn marginal_probabilities(rules: &[PurchaseRule]) -> BTreeMap<String, f64> {
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for rule in rules {
        let p = rule.probability;
        *out.entry(rule.category.clone()).or_default() += p;
        if let Some(c) = &rule.companion {
            *out.entry(c.category.clone()).or_default() += p * c.given + (1.0 - p) * c.without;
        }
    }
    out
}

/// Probabilities in [0, 1]; no rule id reused across or within blocks;
/// the reserved non-rule ids never used.
pub fn validate_rules(rules: &[PurchaseRule]) -> SimResult<()> {
    let mut seen = HashSet::new();
    for rule in rules {
        check_probability(&rule.name, "probability", rule.probability)?;
        if let Some(c) = &rule.companion {
            check_probability(&rule.name, "companion.given", c.given)?;
            check_probability(&rule.name, "companion.without", c.without)?;
        }
        for id in rule.rule_ids() {
            if matches!(id, RuleId::CustomersForDay | RuleId::ItemCount | RuleId::RandomPick) {
                return Err(SimError::config(
                    "rules",
                    format!("rule '{}' uses reserved rule id {id:?}", rule.name),
                ));
            }
            if !seen.insert(id) {
                return Err(SimError::config(
                    "rules",
                    format!("rule id {id:?} used more than once (rule '{}')", rule.name),
                ));
            }
        }
    }
    Ok(())
}

fn check_probability(rule: &str, field: &str, p: f64) -> SimResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(SimError::config(
            "rules",
            format!("rule '{rule}' {field} = {p} is outside [0, 1]"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_marginals() {
        let m = marginal_probabilities(&default_rules());
        let close = |c: &str, v: f64| (m[c] - v).abs() < 1e-12;
        assert!(close(category::MILK, 0.70));
        assert!(close(category::CEREAL, 0.70 * 0.50 + 0.30 * 0.05));
        assert!(close(category::BABY_FOOD, 0.20));
        assert!(close(category::DIAPERS, 0.20 * 0.80 + 0.80 * 0.01));
        assert!(close(category::BREAD, 0.50));
        assert!(close(category::PEANUT_BUTTER, 0.10));
        assert!(close(category::JELLY_JAM, 0.10 * 0.90 + 0.90 * 0.05));
        assert_eq!(m.len(), 7);
    }

    #[test]
    fn default_rules_validate() {
        validate_rules(&default_rules()).unwrap();
    }

    #[test]
    fn reused_rule_id_is_rejected() {
        let mut rules = default_rules();
        rules[2].pick = RuleId::MilkPick;
        assert!(matches!(validate_rules(&rules), Err(SimError::InvalidConfig { .. })));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let mut rules = default_rules();
        rules[0].companion.as_mut().unwrap().without = 1.5;
        assert!(validate_rules(&rules).is_err());
    }
}
