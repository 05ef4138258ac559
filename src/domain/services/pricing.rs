//! Time-dependent price evaluation.
//!
//! A single rule applies: the highest priority among the matching active
//! rules, ties broken by the most recently created, then by the larger id.
//! Modifiers never stack.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::domain::models::pricing::{mask_contains, AppliedRule, ModifierType, PriceQuote, PricingRule};

pub fn rule_matches(rule: &PricingRule, date: NaiveDate, time: NaiveTime) -> bool {
    if !rule.is_active {
        return false;
    }
    if let Some(mask) = rule.days_mask
        && !mask_contains(mask, date.weekday()) {
        return false;
    }
    if rule.start_date.is_some_and(|d| date < d) || rule.end_date.is_some_and(|d| date > d) {
        return false;
    }
    match (rule.start_time, rule.end_time) {
        (Some(start), Some(end)) if start < end => start <= time && time < end,
        // Window wraps past midnight
        (Some(start), Some(end)) => time >= start || time < end,
        (Some(start), None) => time >= start,
        (None, Some(end)) => time < end,
        (None, None) => true,
    }
}

/// Picks the winning rule among those matching `date` and `time`.
pub fn select_rule<'a>(rules: &'a [PricingRule], date: NaiveDate, time: NaiveTime) -> Option<&'a PricingRule> {
    rules.iter()
        .filter(|r| rule_matches(r, date, time))
        .max_by(|a, b| {
            a.priority.cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        })
}

pub fn apply_modifier(base_price_cents: i64, modifier_type: ModifierType, modifier_value: i64) -> i64 {
    let price = match modifier_type {
        ModifierType::Percentage => {
            let scaled = base_price_cents as i128 * (100 + modifier_value as i128);
            let rounded = if scaled >= 0 { (scaled + 50) / 100 } else { -((-scaled + 50) / 100) };
            rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
        }
        ModifierType::Fixed => base_price_cents.saturating_add(modifier_value),
    };
    price.max(0)
}

/// Evaluates the price of a service starting at local `date` + `time`.
pub fn evaluate_price(base_price_cents: i64, rules: &[PricingRule], date: NaiveDate, time: NaiveTime) -> PriceQuote {
    match select_rule(rules, date, time) {
        Some(rule) => PriceQuote {
            base_price_cents,
            effective_price_cents: apply_modifier(base_price_cents, rule.modifier_type, rule.modifier_value),
            applied_rule: Some(AppliedRule {
                id: rule.id.clone(),
                name: rule.name.clone(),
                modifier_type: rule.modifier_type,
                modifier_value: rule.modifier_value,
                priority: rule.priority,
            }),
        },
        None => PriceQuote {
            base_price_cents,
            effective_price_cents: base_price_cents,
            applied_rule: None,
        },
    }
}
