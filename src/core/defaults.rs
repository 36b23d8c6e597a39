//! Built-in baseline dataset: global parameters, categories with their
//! default effects, recipients with category weights and default per-effect
//! overrides, and a flat donation ledger. Constructed once at startup and
//! passed by reference everywhere; the engine never mutates it.

use std::collections::BTreeMap;

use super::types::{
    Category, Defaults, Donation, Effect, EffectField, EffectKind, GlobalParameters, Recipient,
    RecipientCategory, RecipientEffectOverride, ValidTimeInterval,
};

pub fn builtin_defaults() -> Defaults {
    Defaults {
        global_parameters: GlobalParameters {
            discount_rate: 0.02,
            population_growth_rate: 0.008,
            time_limit: 100.0,
            population_limit: 10.0,
            current_population: 8.1e9,
            years_per_life: 50.0,
        },
        categories: categories(),
        recipients: recipients(),
        donations: donations(),
    }
}

fn life_year_effect(id: &str, name: &str, cost_per_qaly: f64, window_length: f64) -> Effect {
    Effect {
        id: id.to_string(),
        name: name.to_string(),
        start_time: 0.0,
        window_length,
        valid_time_interval: None,
        disabled: false,
        kind: EffectKind::LifeYears { cost_per_qaly },
    }
}

fn event_effect(
    id: &str,
    name: &str,
    cost_per_microprobability: f64,
    population_fraction_affected: f64,
    qaly_improvement_per_year: f64,
    window_length: f64,
) -> Effect {
    Effect {
        id: id.to_string(),
        name: name.to_string(),
        start_time: 0.0,
        window_length,
        valid_time_interval: None,
        disabled: false,
        kind: EffectKind::CatastrophicEvent {
            cost_per_microprobability,
            population_fraction_affected,
            qaly_improvement_per_year,
        },
    }
}

fn categories() -> BTreeMap<String, Category> {
    let mut effects_ai = event_effect("ai-takeover", "Existential AI risk reduced", 250_000.0, 1.0, 1.0, 80.0);
    effects_ai.valid_time_interval = Some(ValidTimeInterval(Some(2024), None));

    let list = [
        Category {
            id: "global-health".to_string(),
            name: "Global health".to_string(),
            effects: vec![
                life_year_effect("malaria-nets", "Insecticide-treated nets", 95.0, 15.0),
                life_year_effect("vitamin-a", "Vitamin A supplementation", 140.0, 15.0),
            ],
        },
        Category {
            id: "cash-transfers".to_string(),
            name: "Direct cash transfers".to_string(),
            effects: vec![life_year_effect(
                "unconditional-cash",
                "Unconditional cash grants",
                900.0,
                25.0,
            )],
        },
        Category {
            id: "ai-safety".to_string(),
            name: "AI safety".to_string(),
            effects: vec![effects_ai],
        },
        Category {
            id: "nuclear-security".to_string(),
            name: "Nuclear security".to_string(),
            effects: vec![event_effect(
                "nuclear-exchange",
                "Nuclear exchange averted",
                120_000.0,
                0.35,
                0.9,
                60.0,
            )],
        },
        Category {
            id: "pandemic-preparedness".to_string(),
            name: "Pandemic preparedness".to_string(),
            effects: vec![event_effect(
                "engineered-pandemic",
                "Engineered pandemic prevented",
                60_000.0,
                0.7,
                0.8,
                50.0,
            )],
        },
    ];
    list.into_iter().map(|c| (c.id.clone(), c)).collect()
}

fn recipients() -> BTreeMap<String, Recipient> {
    let mut list = Vec::new();

    // Strong bednet operator: beats the category baseline on delivery cost.
    let mut amf_ovr = RecipientEffectOverride::new("malaria-nets");
    amf_ovr.multipliers.insert(EffectField::CostPerQaly, 0.85);
    list.push(Recipient {
        id: "against-malaria-fund".to_string(),
        name: "Against Malaria Fund".to_string(),
        categories: BTreeMap::from([(
            "global-health".to_string(),
            RecipientCategory {
                fraction: 1.0,
                effects: vec![amf_ovr],
            },
        )]),
    });

    list.push(Recipient {
        id: "direct-relief-transfers".to_string(),
        name: "Direct Relief Transfers".to_string(),
        categories: BTreeMap::from([(
            "cash-transfers".to_string(),
            RecipientCategory {
                fraction: 1.0,
                effects: Vec::new(),
            },
        )]),
    });

    // Research lab focused on alignment; its marginal dollar moves less
    // probability than the category's.
    let mut fsi_ovr = RecipientEffectOverride::new("ai-takeover");
    fsi_ovr
        .multipliers
        .insert(EffectField::CostPerMicroprobability, 1.4);
    list.push(Recipient {
        id: "frontier-safety-institute".to_string(),
        name: "Frontier Safety Institute".to_string(),
        categories: BTreeMap::from([(
            "ai-safety".to_string(),
            RecipientCategory {
                fraction: 1.0,
                effects: vec![fsi_ovr],
            },
        )]),
    });

    list.push(Recipient {
        id: "threat-reduction-initiative".to_string(),
        name: "Threat Reduction Initiative".to_string(),
        categories: BTreeMap::from([(
            "nuclear-security".to_string(),
            RecipientCategory {
                fraction: 1.0,
                effects: Vec::new(),
            },
        )]),
    });

    list.push(Recipient {
        id: "biosecurity-coalition".to_string(),
        name: "Biosecurity Coalition".to_string(),
        categories: BTreeMap::from([(
            "pandemic-preparedness".to_string(),
            RecipientCategory {
                fraction: 1.0,
                effects: Vec::new(),
            },
        )]),
    });

    list.push(Recipient {
        id: "horizon-fund".to_string(),
        name: "Horizon Giving Fund".to_string(),
        categories: BTreeMap::from([
            (
                "global-health".to_string(),
                RecipientCategory {
                    fraction: 0.5,
                    effects: Vec::new(),
                },
            ),
            (
                "cash-transfers".to_string(),
                RecipientCategory {
                    fraction: 0.2,
                    effects: Vec::new(),
                },
            ),
            (
                "pandemic-preparedness".to_string(),
                RecipientCategory {
                    fraction: 0.3,
                    effects: Vec::new(),
                },
            ),
        ]),
    });

    list.into_iter().map(|r| (r.id.clone(), r)).collect()
}

fn donations() -> Vec<Donation> {
    let rows: [(&str, &str, f64, i32); 12] = [
        ("Meridian Trust", "against-malaria-fund", 2_500_000.0, 2021),
        ("Meridian Trust", "biosecurity-coalition", 1_000_000.0, 2022),
        ("Meridian Trust", "horizon-fund", 750_000.0, 2024),
        ("A. Whitfield", "direct-relief-transfers", 40_000.0, 2020),
        ("A. Whitfield", "against-malaria-fund", 25_000.0, 2023),
        ("Calder Foundation", "frontier-safety-institute", 5_000_000.0, 2024),
        ("Calder Foundation", "threat-reduction-initiative", 3_200_000.0, 2022),
        ("R. Okafor", "horizon-fund", 120_000.0, 2023),
        ("R. Okafor", "biosecurity-coalition", 60_000.0, 2025),
        ("Lindqvist Family", "against-malaria-fund", 300_000.0, 2019),
        ("Lindqvist Family", "direct-relief-transfers", 150_000.0, 2021),
        ("Lindqvist Family", "frontier-safety-institute", 500_000.0, 2025),
    ];
    rows.into_iter()
        .map(|(donor, recipient_id, amount, year)| Donation {
            donor: donor.to_string(),
            recipient_id: recipient_id.to_string(),
            amount,
            year,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_recipient_fractions_sum_to_one() {
        let defaults = builtin_defaults();
        for recipient in defaults.recipients.values() {
            let total: f64 = recipient.categories.values().map(|c| c.fraction).sum();
            assert!(
                (total - 1.0).abs() <= 1e-9,
                "recipient {} has fraction total {total}",
                recipient.id
            );
        }
    }

    #[test]
    fn builtin_references_are_consistent() {
        let defaults = builtin_defaults();
        for recipient in defaults.recipients.values() {
            for (category_id, rc) in &recipient.categories {
                let category = defaults
                    .category(category_id)
                    .unwrap_or_else(|| panic!("missing category {category_id}"));
                for ovr in &rc.effects {
                    assert!(
                        category.effect(&ovr.effect_id).is_some(),
                        "recipient {} overrides unknown effect {}",
                        recipient.id,
                        ovr.effect_id
                    );
                }
            }
        }
        for donation in &defaults.donations {
            assert!(
                defaults.recipient(&donation.recipient_id).is_some(),
                "donation to unknown recipient {}",
                donation.recipient_id
            );
        }
    }

    #[test]
    fn builtin_defaults_survive_json_round_trip() {
        let defaults = builtin_defaults();
        let json = serde_json::to_string(&defaults).expect("must encode");
        let back: Defaults = serde_json::from_str(&json).expect("must decode");
        assert_eq!(defaults, back);
    }
}
