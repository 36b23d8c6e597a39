//! The Effect Evaluator: converts resolved effects into dollars per
//! statistical life saved, combines simultaneous effects, and aggregates
//! across a recipient's category weights and the donation ledger.
//!
//! Degenerate outcomes (disabled effects, fully truncated windows, zero
//! denominators) resolve to `f64::INFINITY`, a valid "no deliverable
//! benefit" value that callers sort and display, never an error.

use std::collections::BTreeMap;

use super::combined::CombinedAssumptions;
use super::error::EvaluationError;
use super::types::{
    Donation, DonorStats, Effect, EffectKind, GlobalParameters, RecipientCategory,
    RecipientEffectOverride,
};

const MICROPROBABILITY: f64 = 1e-6;
const WEIGHT_TOLERANCE: f64 = 1e-9;

fn discount_base(rate: f64) -> f64 {
    (1.0 + rate).max(1e-9)
}

/// Sum of discounted year-slices over `[start, end)`. Each unit slice
/// `[k, k+1)` is weighted by its overlap with the window and discounted at
/// the whole-year factor for `k`.
fn discounted_window_years(start: f64, end: f64, discount_rate: f64) -> f64 {
    let start = start.max(0.0);
    if end <= start {
        return 0.0;
    }
    let base = discount_base(discount_rate);
    let mut total = 0.0;
    let mut k = start.floor();
    while k < end {
        let overlap = end.min(k + 1.0) - start.max(k);
        if overlap > 0.0 {
            total += overlap * base.powf(-k);
        }
        k += 1.0;
    }
    total
}

/// As `discounted_window_years`, with each slice additionally weighted by
/// the population multiple at that year: `(1 + growth)^k`, capped at
/// `populationLimit`.
fn discounted_population_years(start: f64, end: f64, params: &GlobalParameters) -> f64 {
    let start = start.max(0.0);
    if end <= start {
        return 0.0;
    }
    let discount = discount_base(params.discount_rate);
    let growth = discount_base(params.population_growth_rate);
    let mut total = 0.0;
    let mut k = start.floor();
    while k < end {
        let overlap = end.min(k + 1.0) - start.max(k);
        if overlap > 0.0 {
            let population_multiple = growth.powf(k).min(params.population_limit);
            total += overlap * population_multiple * discount.powf(-k);
        }
        k += 1.0;
    }
    total
}

/// Dollars per statistical life saved for one resolved effect at `year`.
pub fn effect_to_cost_per_life(effect: &Effect, params: &GlobalParameters, year: i32) -> f64 {
    if effect.disabled {
        return f64::INFINITY;
    }
    if let Some(interval) = &effect.valid_time_interval {
        if !interval.contains(year) {
            return f64::INFINITY;
        }
    }
    if effect.window_length <= 0.0 {
        return f64::INFINITY;
    }

    let truncated_end = effect.window_end().min(params.time_limit);

    match &effect.kind {
        EffectKind::LifeYears { cost_per_qaly } => {
            if *cost_per_qaly == 0.0 {
                return f64::INFINITY;
            }
            let discounted_years =
                discounted_window_years(effect.start_time, truncated_end, params.discount_rate);
            if discounted_years <= 0.0 {
                return f64::INFINITY;
            }
            cost_per_qaly * params.years_per_life * effect.window_length / discounted_years
        }
        EffectKind::CatastrophicEvent {
            cost_per_microprobability,
            population_fraction_affected,
            qaly_improvement_per_year,
        } => {
            if *cost_per_microprobability == 0.0 {
                return f64::INFINITY;
            }
            let population_years =
                discounted_population_years(effect.start_time, truncated_end, params);
            if population_years <= 0.0 {
                return f64::INFINITY;
            }
            let qalys_per_dollar = MICROPROBABILITY / cost_per_microprobability
                * population_fraction_affected
                * params.current_population
                * population_years
                * qaly_improvement_per_year;
            let lives_per_dollar = qalys_per_dollar / params.years_per_life;
            if lives_per_dollar == 0.0 {
                return f64::INFINITY;
            }
            1.0 / lives_per_dollar
        }
    }
}

/// Combines simultaneous effects: lives-per-dollar rates add, so the
/// combined cost is the reciprocal of the summed reciprocals. `INFINITY`
/// entries contribute zero rate; an all-`INFINITY` (or exactly cancelling)
/// input combines to `INFINITY`.
pub fn calculate_combined_cost_per_life(costs: &[f64]) -> f64 {
    let mut rate = 0.0;
    for &cost in costs {
        if cost.is_finite() {
            rate += 1.0 / cost;
        }
    }
    if rate == 0.0 {
        f64::INFINITY
    } else {
        1.0 / rate
    }
}

/// Applies one recipient-level override entry to a category effect:
/// override fields replace, then multipliers scale, then the disable flag
/// lands. Returns `None` when the entry's `windowLength = 0` sentinel
/// removes the effect for this recipient.
pub fn resolve_recipient_effect(
    effect: &Effect,
    entry: Option<&RecipientEffectOverride>,
) -> Option<Effect> {
    let Some(entry) = entry else {
        return Some(effect.clone());
    };
    if entry.removes_effect() {
        return None;
    }
    let mut resolved = effect.clone();
    for (field, value) in &entry.overrides {
        resolved.set_field(*field, *value);
    }
    for (field, value) in &entry.multipliers {
        if let Some(current) = resolved.field(*field) {
            resolved.set_field(*field, current * value);
        }
    }
    if let Some(disabled) = entry.disabled {
        resolved.disabled = disabled;
    }
    Some(resolved)
}

/// Combined cost per life for one category of the combined view.
pub fn get_cost_per_life_from_combined(
    combined: &CombinedAssumptions,
    category_id: &str,
    year: i32,
) -> Result<f64, EvaluationError> {
    let category = combined.get_category_by_id(category_id)?;
    let costs: Vec<f64> = category
        .effects
        .iter()
        .map(|effect| effect_to_cost_per_life(effect, &combined.global_parameters, year))
        .collect();
    Ok(calculate_combined_cost_per_life(&costs))
}

fn recipient_category_cost(
    combined: &CombinedAssumptions,
    category_id: &str,
    recipient_category: &RecipientCategory,
    year: i32,
) -> Result<f64, EvaluationError> {
    let category = combined.get_category_by_id(category_id)?;
    let costs: Vec<f64> = category
        .effects
        .iter()
        .filter_map(|effect| {
            resolve_recipient_effect(effect, recipient_category.effect_override(&effect.id))
        })
        .map(|effect| effect_to_cost_per_life(&effect, &combined.global_parameters, year))
        .collect();
    Ok(calculate_combined_cost_per_life(&costs))
}

/// Combined cost per life for a recipient: each category's rate is weighted
/// by its fraction and the weighted rates are summed and inverted. Fails
/// loudly on bad weights or a recipient with no deliverable benefit: a
/// silently wrong number here would corrupt every ranking built on it.
pub fn get_cost_per_life_for_recipient_from_combined(
    combined: &CombinedAssumptions,
    recipient_id: &str,
    year: i32,
) -> Result<f64, EvaluationError> {
    let recipient = combined.get_recipient_by_id(recipient_id)?;

    let total: f64 = recipient.categories.values().map(|c| c.fraction).sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(EvaluationError::CategoryWeights {
            recipient: recipient.name.clone(),
            total,
        });
    }

    let mut rate = 0.0;
    for (category_id, recipient_category) in &recipient.categories {
        let cost = recipient_category_cost(combined, category_id, recipient_category, year)?;
        if cost.is_finite() {
            rate += recipient_category.fraction / cost;
        }
    }
    if rate == 0.0 {
        return Err(EvaluationError::NoDeliverableBenefit {
            recipient: recipient.name.clone(),
            year,
        });
    }
    Ok(1.0 / rate)
}

pub fn calculate_lives_saved_for_donation_from_combined(
    combined: &CombinedAssumptions,
    donation: &Donation,
) -> Result<f64, EvaluationError> {
    let cost =
        get_cost_per_life_for_recipient_from_combined(combined, &donation.recipient_id, donation.year)?;
    Ok(donation.amount / cost)
}

pub fn calculate_lives_saved_for_category_from_combined(
    combined: &CombinedAssumptions,
    category_id: &str,
    amount: f64,
    year: i32,
) -> Result<f64, EvaluationError> {
    let cost = get_cost_per_life_from_combined(combined, category_id, year)?;
    Ok(amount / cost)
}

/// Aggregates the donation ledger into per-donor totals, lives saved under
/// current assumptions, and the implied cost per life, sorted by lives
/// saved descending.
pub fn calculate_donor_stats_from_combined(
    combined: &CombinedAssumptions,
    donations: &[Donation],
) -> Result<Vec<DonorStats>, EvaluationError> {
    let mut cost_cache: BTreeMap<(String, i32), f64> = BTreeMap::new();
    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for donation in donations {
        let key = (donation.recipient_id.clone(), donation.year);
        let cost = match cost_cache.get(&key) {
            Some(cost) => *cost,
            None => {
                let cost = get_cost_per_life_for_recipient_from_combined(
                    combined,
                    &donation.recipient_id,
                    donation.year,
                )?;
                cost_cache.insert(key, cost);
                cost
            }
        };
        let entry = totals.entry(donation.donor.clone()).or_insert((0.0, 0.0));
        entry.0 += donation.amount;
        entry.1 += donation.amount / cost;
    }

    let mut stats: Vec<DonorStats> = totals
        .into_iter()
        .map(|(donor, (total_donated, lives_saved))| DonorStats {
            donor,
            total_donated,
            lives_saved,
            cost_per_life: if lives_saved != 0.0 {
                total_donated / lives_saved
            } else {
                f64::INFINITY
            },
        })
        .collect();
    stats.sort_by(|a, b| {
        b.lives_saved
            .partial_cmp(&a.lives_saved)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.donor.cmp(&b.donor))
    });
    Ok(stats)
}
