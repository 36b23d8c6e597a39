//! Editing-session helpers: bookkeeping for an in-progress effect edit
//! before it is committed to the Override Store. Raw string inputs are
//! parsed here, failures are collected as field-keyed messages (an edit
//! form needs every message at once, not the first), and a draft only
//! converts into a store-ready override entry when every field parses.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{EffectField, GlobalParameters, RecipientEffectOverride};

/// Whether a pending field edit is an absolute override or a multiplier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldMode {
    Override,
    Multiplier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInput {
    pub mode: FieldMode,
    pub raw: String,
}

/// One effect's in-progress edit: raw text per field plus a pending
/// disable toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDraft {
    pub effect_id: String,
    pub disabled: Option<bool>,
    pub inputs: BTreeMap<EffectField, FieldInput>,
}

impl EffectDraft {
    pub fn new(effect_id: impl Into<String>) -> Self {
        EffectDraft {
            effect_id: effect_id.into(),
            disabled: None,
            inputs: BTreeMap::new(),
        }
    }

    /// Prefills a draft from a committed override entry.
    pub fn from_override(entry: &RecipientEffectOverride) -> Self {
        let mut draft = EffectDraft::new(entry.effect_id.clone());
        draft.disabled = entry.disabled;
        for (field, value) in &entry.overrides {
            draft.inputs.insert(
                *field,
                FieldInput {
                    mode: FieldMode::Override,
                    raw: value.to_string(),
                },
            );
        }
        for (field, value) in &entry.multipliers {
            draft.inputs.insert(
                *field,
                FieldInput {
                    mode: FieldMode::Multiplier,
                    raw: value.to_string(),
                },
            );
        }
        draft
    }

    pub fn set_input(&mut self, field: EffectField, raw: impl Into<String>) {
        let raw = raw.into();
        match self.inputs.get_mut(&field) {
            Some(input) => input.raw = raw,
            None => {
                self.inputs.insert(
                    field,
                    FieldInput {
                        mode: FieldMode::Override,
                        raw,
                    },
                );
            }
        }
    }

    /// Switches a field between override and multiplier mode. Changing the
    /// mode discards the pending text: the two modes are mutually
    /// exclusive all the way down to the store.
    pub fn set_mode(&mut self, field: EffectField, mode: FieldMode) {
        match self.inputs.get_mut(&field) {
            Some(input) if input.mode != mode => {
                input.mode = mode;
                input.raw.clear();
            }
            Some(_) => {}
            None => {
                self.inputs.insert(
                    field,
                    FieldInput {
                        mode,
                        raw: String::new(),
                    },
                );
            }
        }
    }
}

fn normalize_raw(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .trim()
        .to_string()
}

/// Parses one raw field input. Accepts plain numbers with optional `$`
/// prefix and thousands separators.
pub fn parse_field(raw: &str) -> Result<f64, String> {
    let cleaned = normalize_raw(raw);
    if cleaned.is_empty() {
        return Err("enter a number".to_string());
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw.trim()))?;
    if !value.is_finite() {
        return Err("value must be finite".to_string());
    }
    Ok(value)
}

fn validate_field(field: EffectField, mode: FieldMode, value: f64) -> Result<(), String> {
    match mode {
        FieldMode::Multiplier => {
            if value <= 0.0 {
                return Err("multiplier must be positive".to_string());
            }
        }
        FieldMode::Override => match field {
            EffectField::WindowLength => {
                if value < 0.0 {
                    return Err("windowLength cannot be negative".to_string());
                }
            }
            EffectField::PopulationFractionAffected => {
                if !(value > 0.0 && value <= 1.0) {
                    return Err("populationFractionAffected must be in (0, 1]".to_string());
                }
            }
            _ => {}
        },
    }
    Ok(())
}

/// Parses every non-empty field of a draft. On failure, returns a message
/// per offending field; the presence of any message blocks commit.
pub fn parse_draft(
    draft: &EffectDraft,
) -> Result<BTreeMap<EffectField, (FieldMode, f64)>, BTreeMap<EffectField, String>> {
    let mut parsed = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for (field, input) in &draft.inputs {
        if normalize_raw(&input.raw).is_empty() {
            continue;
        }
        match parse_field(&input.raw).and_then(|value| {
            validate_field(*field, input.mode, value).map(|()| value)
        }) {
            Ok(value) => {
                parsed.insert(*field, (input.mode, value));
            }
            Err(message) => {
                errors.insert(*field, message);
            }
        }
    }
    if errors.is_empty() { Ok(parsed) } else { Err(errors) }
}

/// Converts a fully parsed draft into a store-ready override entry.
pub fn draft_to_override(
    draft: &EffectDraft,
) -> Result<RecipientEffectOverride, BTreeMap<EffectField, String>> {
    let parsed = parse_draft(draft)?;
    let mut entry = RecipientEffectOverride::new(draft.effect_id.clone());
    entry.disabled = draft.disabled;
    for (field, (mode, value)) in parsed {
        match mode {
            FieldMode::Override => {
                entry.overrides.insert(field, value);
            }
            FieldMode::Multiplier => {
                entry.multipliers.insert(field, value);
            }
        }
    }
    Ok(entry)
}

/// Which fields of the draft differ from the committed entry. A field that
/// fails to parse is dirty by definition; an emptied field is dirty when
/// the committed entry still holds a value for it.
pub fn dirty_fields(
    draft: &EffectDraft,
    committed: Option<&RecipientEffectOverride>,
) -> BTreeSet<EffectField> {
    let mut dirty = BTreeSet::new();
    for (field, input) in &draft.inputs {
        let committed_value = committed
            .and_then(|entry| match input.mode {
                FieldMode::Override => entry.overrides.get(field),
                FieldMode::Multiplier => entry.multipliers.get(field),
            })
            .copied();
        let cleaned = normalize_raw(&input.raw);
        if cleaned.is_empty() {
            if committed_value.is_some() {
                dirty.insert(*field);
            }
            continue;
        }
        match parse_field(&input.raw) {
            Ok(value) if Some(value) == committed_value => {}
            _ => {
                dirty.insert(*field);
            }
        }
    }
    dirty
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeLimitWarning {
    /// The window starts at or beyond the global time limit: no benefit
    /// will count at all.
    FullyTruncated,
    /// The window crosses the limit; only `usable_years` of it count.
    Truncated { usable_years: f64 },
}

pub fn time_limit_warning(
    start_time: f64,
    window_length: f64,
    params: &GlobalParameters,
) -> Option<TimeLimitWarning> {
    if window_length <= 0.0 {
        return None;
    }
    if start_time >= params.time_limit {
        return Some(TimeLimitWarning::FullyTruncated);
    }
    if start_time + window_length > params.time_limit {
        return Some(TimeLimitWarning::Truncated {
            usable_years: params.time_limit - start_time,
        });
    }
    None
}
