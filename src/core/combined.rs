//! The Combined View Builder: merges the immutable defaults with a sparse
//! user-assumptions tree into one fully resolved, read-only structure.
//! Rebuilt in full whenever the user tree changes; callers memoize against
//! referential identity.

use std::collections::BTreeMap;

use super::error::EvaluationError;
use super::types::{
    Category, CategoryEffectPatch, Defaults, Effect, EffectField, GlobalParameters, Recipient,
    RecipientCategory, RecipientEffectOverride, UserAssumptions,
};

/// The fully resolved assumptions every calculation and UI surface reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAssumptions {
    pub global_parameters: GlobalParameters,
    pub categories: BTreeMap<String, Category>,
    pub recipients: BTreeMap<String, Recipient>,
}

impl CombinedAssumptions {
    pub fn get_category_by_id(&self, id: &str) -> Result<&Category, EvaluationError> {
        self.categories
            .get(id)
            .ok_or_else(|| EvaluationError::CategoryNotFound { id: id.to_string() })
    }

    pub fn get_recipient_by_id(&self, id: &str) -> Result<&Recipient, EvaluationError> {
        self.recipients
            .get(id)
            .ok_or_else(|| EvaluationError::RecipientNotFound { id: id.to_string() })
    }

    pub fn find_recipient_id(&self, name: &str) -> Option<&str> {
        self.recipients
            .values()
            .find(|r| r.name == name)
            .map(|r| r.id.as_str())
    }
}

pub fn create_combined_assumptions(
    defaults: &Defaults,
    user: Option<&UserAssumptions>,
) -> CombinedAssumptions {
    let global_parameters = user
        .and_then(|u| u.global_parameters.as_ref())
        .map(|gp| gp.resolve(&defaults.global_parameters))
        .unwrap_or(defaults.global_parameters);

    let categories = defaults
        .categories
        .iter()
        .map(|(id, category)| {
            let patches = user
                .and_then(|u| u.categories.get(id))
                .map(|c| c.effects.as_slice())
                .unwrap_or(&[]);
            (
                id.clone(),
                Category {
                    id: category.id.clone(),
                    name: category.name.clone(),
                    effects: merge_effects(&category.effects, patches),
                },
            )
        })
        .collect();

    let recipients = defaults
        .recipients
        .iter()
        .map(|(id, recipient)| {
            let user_categories = user.and_then(|u| u.recipients.get(id));
            let categories = recipient
                .categories
                .iter()
                .map(|(category_id, rc)| {
                    let user_entries = user_categories
                        .and_then(|r| r.categories.get(category_id))
                        .map(|c| c.effects.as_slice())
                        .unwrap_or(&[]);
                    (
                        category_id.clone(),
                        RecipientCategory {
                            fraction: rc.fraction,
                            effects: merge_recipient_effects(&rc.effects, user_entries),
                        },
                    )
                })
                .collect();
            (
                id.clone(),
                Recipient {
                    id: recipient.id.clone(),
                    name: recipient.name.clone(),
                    categories,
                },
            )
        })
        .collect();

    CombinedAssumptions {
        global_parameters,
        categories,
        recipients,
    }
}

/// Lays category-level user patches over the default effects. Patch fields
/// win field-by-field; a patch whose `windowLength` is 0 drops the effect
/// entirely. Patches referencing unknown effect ids cannot survive
/// normalization and are ignored.
pub fn merge_effects(defaults: &[Effect], patches: &[CategoryEffectPatch]) -> Vec<Effect> {
    let mut merged = Vec::with_capacity(defaults.len());
    for effect in defaults {
        let patch = patches.iter().find(|p| p.effect_id == effect.id);
        let Some(patch) = patch else {
            merged.push(effect.clone());
            continue;
        };
        if patch.fields.get(&EffectField::WindowLength) == Some(&0.0) {
            continue;
        }
        let mut resolved = effect.clone();
        for (field, value) in &patch.fields {
            resolved.set_field(*field, *value);
        }
        if let Some(disabled) = patch.disabled {
            resolved.disabled = disabled;
        }
        merged.push(resolved);
    }
    merged
}

/// Merges recipient-level override entries. The user entry's `overrides`
/// replace the default's field-by-field (default-only fields survive); a
/// field written by a user override evicts any default multiplier on the
/// same field, and symmetrically for user multipliers. User entries with no
/// default counterpart are appended.
pub fn merge_recipient_effects(
    defaults: &[RecipientEffectOverride],
    user: &[RecipientEffectOverride],
) -> Vec<RecipientEffectOverride> {
    let mut merged: Vec<RecipientEffectOverride> = Vec::with_capacity(defaults.len());
    for entry in defaults {
        let user_entry = user.iter().find(|u| u.effect_id == entry.effect_id);
        let Some(user_entry) = user_entry else {
            merged.push(entry.clone());
            continue;
        };
        let mut resolved = entry.clone();
        for (field, value) in &user_entry.overrides {
            resolved.overrides.insert(*field, *value);
            resolved.multipliers.remove(field);
        }
        for (field, value) in &user_entry.multipliers {
            resolved.multipliers.insert(*field, *value);
            resolved.overrides.remove(field);
        }
        if user_entry.disabled.is_some() {
            resolved.disabled = user_entry.disabled;
        }
        merged.push(resolved);
    }
    for user_entry in user {
        if !defaults.iter().any(|d| d.effect_id == user_entry.effect_id) {
            merged.push(user_entry.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::defaults::builtin_defaults;
    use crate::core::overrides::{
        set_category_field_value, set_global_parameter, set_recipient_field_override,
    };
    use crate::core::types::GlobalParam;

    #[test]
    fn defaults_pass_through_untouched() {
        let defaults = builtin_defaults();
        let combined = create_combined_assumptions(&defaults, None);
        assert_eq!(combined.global_parameters, defaults.global_parameters);
        assert_eq!(combined.categories, defaults.categories);
        assert_eq!(combined.recipients, defaults.recipients);
    }

    #[test]
    fn global_parameters_merge_shallowly() {
        let defaults = builtin_defaults();
        let user = set_global_parameter(None, &defaults, GlobalParam::DiscountRate, 0.07)
            .expect("valid edit");
        let combined = create_combined_assumptions(&defaults, user.as_ref());
        assert_eq!(combined.global_parameters.discount_rate, 0.07);
        assert_eq!(
            combined.global_parameters.time_limit,
            defaults.global_parameters.time_limit
        );
    }

    #[test]
    fn category_patch_wins_field_by_field() {
        let defaults = builtin_defaults();
        let user = set_category_field_value(
            None,
            &defaults,
            "global-health",
            "malaria-nets",
            EffectField::CostPerQaly,
            60.0,
        )
        .expect("valid edit");
        let combined = create_combined_assumptions(&defaults, user.as_ref());
        let effect = combined.categories["global-health"]
            .effect("malaria-nets")
            .expect("effect");
        assert_eq!(effect.field(EffectField::CostPerQaly), Some(60.0));
        // Unpatched fields keep their defaults.
        assert_eq!(effect.start_time, 0.0);
        assert_eq!(effect.window_length, 15.0);
    }

    #[test]
    fn category_window_length_zero_drops_the_effect() {
        let defaults = builtin_defaults();
        let user = set_category_field_value(
            None,
            &defaults,
            "global-health",
            "malaria-nets",
            EffectField::WindowLength,
            0.0,
        )
        .expect("valid edit");
        let combined = create_combined_assumptions(&defaults, user.as_ref());
        let category = &combined.categories["global-health"];
        assert!(category.effect("malaria-nets").is_none());
        assert!(category.effect("vitamin-a").is_some());
    }

    #[test]
    fn user_override_evicts_default_multiplier_on_same_field() {
        let defaults = builtin_defaults();
        // Builtin recipient carries a costPerQALY multiplier by default.
        let user = set_recipient_field_override(
            None,
            &defaults,
            "against-malaria-fund",
            "global-health",
            "malaria-nets",
            EffectField::CostPerQaly,
            50.0,
        )
        .expect("valid edit");
        let combined = create_combined_assumptions(&defaults, user.as_ref());
        let entry = combined.recipients["against-malaria-fund"].categories["global-health"]
            .effect_override("malaria-nets")
            .expect("entry");
        assert_eq!(entry.overrides.get(&EffectField::CostPerQaly), Some(&50.0));
        assert!(!entry.multipliers.contains_key(&EffectField::CostPerQaly));
    }

    #[test]
    fn default_only_override_fields_survive_the_user_entry() {
        let mut default_entry = RecipientEffectOverride::new("e");
        default_entry.overrides.insert(EffectField::StartTime, 5.0);
        default_entry
            .overrides
            .insert(EffectField::CostPerQaly, 40.0);

        let mut user_entry = RecipientEffectOverride::new("e");
        user_entry.overrides.insert(EffectField::CostPerQaly, 80.0);

        let merged = merge_recipient_effects(&[default_entry], &[user_entry]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].overrides.get(&EffectField::StartTime), Some(&5.0));
        assert_eq!(
            merged[0].overrides.get(&EffectField::CostPerQaly),
            Some(&80.0)
        );
    }

    #[test]
    fn user_multiplier_evicts_default_override_on_same_field() {
        let mut default_entry = RecipientEffectOverride::new("e");
        default_entry
            .overrides
            .insert(EffectField::CostPerQaly, 40.0);

        let mut user_entry = RecipientEffectOverride::new("e");
        user_entry.multipliers.insert(EffectField::CostPerQaly, 2.0);

        let merged = merge_recipient_effects(&[default_entry], &[user_entry]);
        assert!(!merged[0].overrides.contains_key(&EffectField::CostPerQaly));
        assert_eq!(
            merged[0].multipliers.get(&EffectField::CostPerQaly),
            Some(&2.0)
        );
    }

    #[test]
    fn user_entries_without_default_counterpart_are_appended() {
        let mut user_entry = RecipientEffectOverride::new("fresh");
        user_entry.overrides.insert(EffectField::StartTime, 1.0);
        let merged = merge_recipient_effects(&[], &[user_entry.clone()]);
        assert_eq!(merged, vec![user_entry]);
    }

    #[test]
    fn lookup_helpers() {
        let defaults = builtin_defaults();
        let combined = create_combined_assumptions(&defaults, None);
        assert!(combined.get_category_by_id("global-health").is_ok());
        assert!(matches!(
            combined.get_category_by_id("nope"),
            Err(EvaluationError::CategoryNotFound { .. })
        ));
        assert_eq!(
            combined.find_recipient_id("Against Malaria Fund"),
            Some("against-malaria-fund")
        );
        assert_eq!(combined.find_recipient_id("Unknown Org"), None);
    }
}
