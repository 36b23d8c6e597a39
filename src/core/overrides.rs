//! The Override Store: pure mutators over the sparse user-assumptions tree.
//!
//! Every mutator takes the current tree (or `None`), the immutable defaults,
//! and one edit; it returns a brand-new tree, or `None` when the result has
//! no content. The caller's tree is never touched. Every written value is
//! compared against its default: equal values are deleted, and branches that
//! become empty are deleted with them, so the stored tree is always the
//! minimal diff against the defaults.

use std::collections::BTreeMap;

use super::error::AssumptionsError;
use super::types::{
    Category, CategoryAssumptions, CategoryEffectPatch, Defaults, Effect, EffectField,
    GlobalParam, GlobalParameterOverrides, Recipient, RecipientAssumptions,
    RecipientCategoryAssumptions, RecipientEffectOverride, UserAssumptions,
};

pub type StoreResult = Result<Option<UserAssumptions>, AssumptionsError>;

fn working_copy(user: Option<&UserAssumptions>) -> UserAssumptions {
    user.cloned().unwrap_or_default()
}

/// Drops empty patches, entries, and branches, returning `None` when the
/// whole tree is gone.
fn finish(mut tree: UserAssumptions) -> Option<UserAssumptions> {
    if tree
        .global_parameters
        .is_some_and(|gp| gp.is_empty())
    {
        tree.global_parameters = None;
    }
    tree.categories.retain(|_, cat| {
        cat.effects.retain(|patch| !patch.is_empty());
        !cat.effects.is_empty()
    });
    tree.recipients.retain(|_, rec| {
        rec.categories.retain(|_, rc| {
            rc.effects.retain(|ovr| !ovr.is_empty());
            !rc.effects.is_empty()
        });
        !rec.categories.is_empty()
    });
    if tree.is_empty() { None } else { Some(tree) }
}

fn default_category<'a>(
    defaults: &'a Defaults,
    category_id: &str,
) -> Result<&'a Category, AssumptionsError> {
    defaults
        .category(category_id)
        .ok_or_else(|| AssumptionsError::CategoryNotFound {
            id: category_id.to_string(),
        })
}

fn default_effect<'a>(
    category: &'a Category,
    effect_id: &str,
) -> Result<&'a Effect, AssumptionsError> {
    category
        .effect(effect_id)
        .ok_or_else(|| AssumptionsError::EffectNotFound {
            category_id: category.id.clone(),
            effect_id: effect_id.to_string(),
        })
}

fn default_recipient<'a>(
    defaults: &'a Defaults,
    recipient_id: &str,
) -> Result<&'a Recipient, AssumptionsError> {
    defaults
        .recipient(recipient_id)
        .ok_or_else(|| AssumptionsError::RecipientNotFound {
            id: recipient_id.to_string(),
        })
}

fn default_field_value(effect: &Effect, field: EffectField) -> Result<f64, AssumptionsError> {
    effect
        .field(field)
        .ok_or_else(|| AssumptionsError::FieldNotApplicable {
            effect_id: effect.id.clone(),
            field,
        })
}

fn require_finite(
    effect_id: &str,
    field: EffectField,
    value: f64,
) -> Result<(), AssumptionsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AssumptionsError::NonFiniteValue {
            effect_id: effect_id.to_string(),
            field,
        })
    }
}

fn patch_entry<'a>(
    patches: &'a mut Vec<CategoryEffectPatch>,
    effect_id: &str,
) -> &'a mut CategoryEffectPatch {
    if let Some(idx) = patches.iter().position(|p| p.effect_id == effect_id) {
        &mut patches[idx]
    } else {
        patches.push(CategoryEffectPatch::new(effect_id));
        patches.last_mut().expect("just pushed")
    }
}

fn override_entry<'a>(
    entries: &'a mut Vec<RecipientEffectOverride>,
    effect_id: &str,
) -> &'a mut RecipientEffectOverride {
    if let Some(idx) = entries.iter().position(|o| o.effect_id == effect_id) {
        &mut entries[idx]
    } else {
        entries.push(RecipientEffectOverride::new(effect_id));
        entries.last_mut().expect("just pushed")
    }
}

/// Sets one absolute field value on a category effect. Writing the default
/// value removes the stored field instead.
pub fn set_category_field_value(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    category_id: &str,
    effect_id: &str,
    field: EffectField,
    value: f64,
) -> StoreResult {
    require_finite(effect_id, field, value)?;
    let category = default_category(defaults, category_id)?;
    let effect = default_effect(category, effect_id)?;
    let default_value = default_field_value(effect, field)?;

    let mut tree = working_copy(user);
    let patches = &mut tree
        .categories
        .entry(category_id.to_string())
        .or_default()
        .effects;
    let patch = patch_entry(patches, effect_id);
    if value == default_value {
        patch.fields.remove(&field);
    } else {
        patch.fields.insert(field, value);
    }
    Ok(finish(tree))
}

/// Replaces every field of one category effect at once: the stored patch
/// becomes exactly the diff between `edited` and the default effect.
pub fn set_category_effect(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    category_id: &str,
    edited: &Effect,
) -> StoreResult {
    let category = default_category(defaults, category_id)?;
    let effect = default_effect(category, &edited.id)?;
    if !effect.same_kind(edited) {
        return Err(AssumptionsError::EffectKindMismatch {
            effect_id: edited.id.clone(),
        });
    }

    let mut fields = BTreeMap::new();
    for field in effect.applicable_fields() {
        let edited_value = edited.field(*field).expect("same kind");
        require_finite(&edited.id, *field, edited_value)?;
        if edited_value != effect.field(*field).expect("own field") {
            fields.insert(*field, edited_value);
        }
    }
    let disabled = (edited.disabled != effect.disabled).then_some(edited.disabled);

    let mut tree = working_copy(user);
    let patches = &mut tree
        .categories
        .entry(category_id.to_string())
        .or_default()
        .effects;
    let patch = patch_entry(patches, &edited.id);
    patch.fields = fields;
    patch.disabled = disabled;
    Ok(finish(tree))
}

fn recipient_edit_context<'a>(
    defaults: &'a Defaults,
    recipient_id: &str,
    category_id: &str,
    effect_id: &str,
) -> Result<(&'a Effect, Option<&'a RecipientEffectOverride>), AssumptionsError> {
    let recipient = default_recipient(defaults, recipient_id)?;
    let recipient_category = recipient.categories.get(category_id).ok_or_else(|| {
        AssumptionsError::RecipientCategoryNotFound {
            recipient_id: recipient_id.to_string(),
            category_id: category_id.to_string(),
        }
    })?;
    let category = default_category(defaults, category_id)?;
    let effect = default_effect(category, effect_id)?;
    Ok((effect, recipient_category.effect_override(effect_id)))
}

fn recipient_entry<'a>(
    tree: &'a mut UserAssumptions,
    recipient_id: &str,
    category_id: &str,
    effect_id: &str,
) -> &'a mut RecipientEffectOverride {
    let entries = &mut tree
        .recipients
        .entry(recipient_id.to_string())
        .or_default()
        .categories
        .entry(category_id.to_string())
        .or_default()
        .effects;
    override_entry(entries, effect_id)
}

/// Sets an absolute override on one field of one effect, for one recipient.
/// Clears any multiplier on the same field (mutual exclusion, last writer
/// wins). Writing the recipient's default override value removes the field.
pub fn set_recipient_field_override(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    recipient_id: &str,
    category_id: &str,
    effect_id: &str,
    field: EffectField,
    value: f64,
) -> StoreResult {
    require_finite(effect_id, field, value)?;
    let (effect, default_entry) =
        recipient_edit_context(defaults, recipient_id, category_id, effect_id)?;
    default_field_value(effect, field)?;
    let default_value = default_entry.and_then(|e| e.overrides.get(&field).copied());

    let mut tree = working_copy(user);
    let entry = recipient_entry(&mut tree, recipient_id, category_id, effect_id);
    entry.multipliers.remove(&field);
    if Some(value) == default_value {
        entry.overrides.remove(&field);
    } else {
        entry.overrides.insert(field, value);
    }
    Ok(finish(tree))
}

/// Sets a multiplier on one field of one effect, for one recipient. Clears
/// any override on the same field.
pub fn set_recipient_field_multiplier(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    recipient_id: &str,
    category_id: &str,
    effect_id: &str,
    field: EffectField,
    value: f64,
) -> StoreResult {
    require_finite(effect_id, field, value)?;
    let (effect, default_entry) =
        recipient_edit_context(defaults, recipient_id, category_id, effect_id)?;
    default_field_value(effect, field)?;
    let default_value = default_entry.and_then(|e| e.multipliers.get(&field).copied());

    let mut tree = working_copy(user);
    let entry = recipient_entry(&mut tree, recipient_id, category_id, effect_id);
    entry.overrides.remove(&field);
    if Some(value) == default_value {
        entry.multipliers.remove(&field);
    } else {
        entry.multipliers.insert(field, value);
    }
    Ok(finish(tree))
}

/// Sets the per-recipient disable flag for one effect. Stored only when it
/// differs from what the defaults already resolve to.
pub fn set_recipient_effect_disabled(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    recipient_id: &str,
    category_id: &str,
    effect_id: &str,
    disabled: bool,
) -> StoreResult {
    let (effect, default_entry) =
        recipient_edit_context(defaults, recipient_id, category_id, effect_id)?;
    let default_disabled = default_entry
        .and_then(|e| e.disabled)
        .unwrap_or(effect.disabled);

    let mut tree = working_copy(user);
    let entry = recipient_entry(&mut tree, recipient_id, category_id, effect_id);
    entry.disabled = (disabled != default_disabled).then_some(disabled);
    Ok(finish(tree))
}

pub fn clear_category_custom_values(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    category_id: &str,
) -> StoreResult {
    default_category(defaults, category_id)?;
    let mut tree = working_copy(user);
    tree.categories.remove(category_id);
    Ok(finish(tree))
}

pub fn clear_recipient_overrides(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    recipient_id: &str,
) -> StoreResult {
    default_recipient(defaults, recipient_id)?;
    let mut tree = working_copy(user);
    tree.recipients.remove(recipient_id);
    Ok(finish(tree))
}

pub fn clear_recipient_category_overrides(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    recipient_id: &str,
    category_id: &str,
) -> StoreResult {
    let recipient = default_recipient(defaults, recipient_id)?;
    if !recipient.categories.contains_key(category_id) {
        return Err(AssumptionsError::RecipientCategoryNotFound {
            recipient_id: recipient_id.to_string(),
            category_id: category_id.to_string(),
        });
    }
    let mut tree = working_copy(user);
    if let Some(rec) = tree.recipients.get_mut(recipient_id) {
        rec.categories.remove(category_id);
    }
    Ok(finish(tree))
}

pub fn set_global_parameter(
    user: Option<&UserAssumptions>,
    defaults: &Defaults,
    param: GlobalParam,
    value: f64,
) -> StoreResult {
    if !value.is_finite() {
        return Err(AssumptionsError::NonFiniteGlobalParameter { param });
    }
    let mut tree = working_copy(user);
    let mut overrides = tree.global_parameters.unwrap_or_default();
    if value == defaults.global_parameters.get(param) {
        overrides.set(param, None);
    } else {
        overrides.set(param, Some(value));
    }
    tree.global_parameters = Some(overrides);
    Ok(finish(tree))
}

pub fn clear_global_parameter(user: Option<&UserAssumptions>, param: GlobalParam) -> StoreResult {
    let mut tree = working_copy(user);
    if let Some(overrides) = tree.global_parameters.as_mut() {
        overrides.set(param, None);
    }
    Ok(finish(tree))
}

pub fn clear_all_global_parameters(user: Option<&UserAssumptions>) -> StoreResult {
    let mut tree = working_copy(user);
    tree.global_parameters = None;
    Ok(finish(tree))
}

/// Validates an externally supplied document against the defaults and
/// strips every value equal to its default, returning the minimal tree.
/// Every raw document must pass through here before it reaches the
/// Combined View pipeline.
pub fn normalize_user_assumptions(
    raw: &UserAssumptions,
    defaults: &Defaults,
) -> StoreResult {
    let mut tree = UserAssumptions::default();

    if let Some(raw_gp) = &raw.global_parameters {
        let mut overrides = GlobalParameterOverrides::default();
        for param in GlobalParam::ALL {
            if let Some(value) = raw_gp.get(param) {
                if !value.is_finite() {
                    return Err(AssumptionsError::NonFiniteGlobalParameter { param });
                }
                if value != defaults.global_parameters.get(param) {
                    overrides.set(param, Some(value));
                }
            }
        }
        tree.global_parameters = Some(overrides);
    }

    for (category_id, raw_cat) in &raw.categories {
        let category = default_category(defaults, category_id)?;
        let mut patches: Vec<CategoryEffectPatch> = Vec::new();
        for raw_patch in &raw_cat.effects {
            let effect = default_effect(category, &raw_patch.effect_id)?;
            let patch = patch_entry(&mut patches, &raw_patch.effect_id);
            for (field, value) in &raw_patch.fields {
                require_finite(&effect.id, *field, *value)?;
                let default_value = default_field_value(effect, *field)?;
                if *value != default_value {
                    patch.fields.insert(*field, *value);
                } else {
                    patch.fields.remove(field);
                }
            }
            if let Some(disabled) = raw_patch.disabled {
                patch.disabled = (disabled != effect.disabled).then_some(disabled);
            }
        }
        tree.categories
            .insert(category_id.clone(), CategoryAssumptions { effects: patches });
    }

    for (recipient_id, raw_rec) in &raw.recipients {
        let recipient = default_recipient(defaults, recipient_id)?;
        let mut rec = RecipientAssumptions::default();
        for (category_id, raw_rc) in &raw_rec.categories {
            if !recipient.categories.contains_key(category_id) {
                return Err(AssumptionsError::RecipientCategoryNotFound {
                    recipient_id: recipient_id.clone(),
                    category_id: category_id.clone(),
                });
            }
            let mut entries: Vec<RecipientEffectOverride> = Vec::new();
            for raw_entry in &raw_rc.effects {
                let (effect, default_entry) = recipient_edit_context(
                    defaults,
                    recipient_id,
                    category_id,
                    &raw_entry.effect_id,
                )?;
                let entry = override_entry(&mut entries, &raw_entry.effect_id);
                for (field, value) in &raw_entry.overrides {
                    require_finite(&effect.id, *field, *value)?;
                    default_field_value(effect, *field)?;
                    let default_value =
                        default_entry.and_then(|e| e.overrides.get(field).copied());
                    if Some(*value) != default_value {
                        entry.overrides.insert(*field, *value);
                    } else {
                        entry.overrides.remove(field);
                    }
                    entry.multipliers.remove(field);
                }
                for (field, value) in &raw_entry.multipliers {
                    // An override on the same field shadows the multiplier.
                    if entry.overrides.contains_key(field)
                        || raw_entry.overrides.contains_key(field)
                    {
                        continue;
                    }
                    require_finite(&effect.id, *field, *value)?;
                    default_field_value(effect, *field)?;
                    let default_value =
                        default_entry.and_then(|e| e.multipliers.get(field).copied());
                    if Some(*value) != default_value {
                        entry.multipliers.insert(*field, *value);
                    } else {
                        entry.multipliers.remove(field);
                    }
                }
                if let Some(disabled) = raw_entry.disabled {
                    let default_disabled = default_entry
                        .and_then(|e| e.disabled)
                        .unwrap_or(effect.disabled);
                    entry.disabled = (disabled != default_disabled).then_some(disabled);
                }
            }
            rec.categories.insert(
                category_id.clone(),
                RecipientCategoryAssumptions { effects: entries },
            );
        }
        tree.recipients.insert(recipient_id.clone(), rec);
    }

    Ok(finish(tree))
}
