//! Error types for the estimation core.
//!
//! Structural problems (unknown ids, inapplicable fields, bad category
//! weights) fail fast with a typed error. Numeric degeneracy (disabled
//! effects, fully truncated windows, zero denominators) is not an error:
//! it resolves to the `f64::INFINITY` sentinel and flows through as data.

use thiserror::Error;

use super::types::{EffectField, GlobalParam};

/// Violations detected while decoding raw effect documents.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("effect '{id}' carries both costPerQALY and costPerMicroprobability")]
    AmbiguousEffectKind { id: String },

    #[error("effect '{id}' carries neither costPerQALY nor costPerMicroprobability")]
    MissingEffectKind { id: String },

    #[error("effect '{id}' is a life-year effect but carries event fields")]
    MixedEffectFields { id: String },

    #[error("effect '{id}' is an event effect but is missing '{field}'")]
    MissingEventField { id: String, field: EffectField },

    #[error("effect '{id}' has populationFractionAffected {value}, expected (0, 1]")]
    PopulationFractionOutOfRange { id: String, value: f64 },
}

/// Structural errors raised by the Override Store and by normalization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssumptionsError {
    #[error("category '{id}' not found in defaults")]
    CategoryNotFound { id: String },

    #[error("recipient '{id}' not found in defaults")]
    RecipientNotFound { id: String },

    #[error("recipient '{recipient_id}' has no category '{category_id}'")]
    RecipientCategoryNotFound {
        recipient_id: String,
        category_id: String,
    },

    #[error("effect '{effect_id}' not found in category '{category_id}'")]
    EffectNotFound {
        category_id: String,
        effect_id: String,
    },

    #[error("field '{field}' does not apply to effect '{effect_id}'")]
    FieldNotApplicable {
        effect_id: String,
        field: EffectField,
    },

    #[error("edited effect '{effect_id}' does not match the default effect kind")]
    EffectKindMismatch { effect_id: String },

    #[error("global parameter '{param}' override is not a finite number")]
    NonFiniteGlobalParameter { param: GlobalParam },

    #[error("value for '{field}' on effect '{effect_id}' is not a finite number")]
    NonFiniteValue {
        effect_id: String,
        field: EffectField,
    },
}

/// Structural errors raised while evaluating the combined view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("category '{id}' not found in combined assumptions")]
    CategoryNotFound { id: String },

    #[error("recipient '{id}' not found in combined assumptions")]
    RecipientNotFound { id: String },

    #[error("category fractions for recipient '{recipient}' sum to {total}, expected 1")]
    CategoryWeights { recipient: String, total: f64 },

    #[error("recipient '{recipient}' has no deliverable effect at year {year}")]
    NoDeliverableBenefit { recipient: String, year: i32 },
}
