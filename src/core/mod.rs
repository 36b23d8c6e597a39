mod combined;
mod defaults;
mod editor;
mod engine;
mod error;
mod overrides;
mod types;

pub use combined::{
    CombinedAssumptions, create_combined_assumptions, merge_effects, merge_recipient_effects,
};
pub use defaults::builtin_defaults;
pub use editor::{
    EffectDraft, FieldInput, FieldMode, TimeLimitWarning, dirty_fields, draft_to_override,
    parse_draft, parse_field, time_limit_warning,
};
pub use engine::{
    calculate_combined_cost_per_life, calculate_donor_stats_from_combined,
    calculate_lives_saved_for_category_from_combined,
    calculate_lives_saved_for_donation_from_combined, effect_to_cost_per_life,
    get_cost_per_life_for_recipient_from_combined, get_cost_per_life_from_combined,
    resolve_recipient_effect,
};
pub use error::{AssumptionsError, DataError, EvaluationError};
pub use overrides::{
    StoreResult, clear_all_global_parameters, clear_category_custom_values,
    clear_global_parameter, clear_recipient_category_overrides, clear_recipient_overrides,
    normalize_user_assumptions, set_category_effect, set_category_field_value,
    set_global_parameter, set_recipient_effect_disabled, set_recipient_field_multiplier,
    set_recipient_field_override,
};
pub use types::{
    Category, CategoryAssumptions, CategoryEffectPatch, Defaults, Donation, DonorStats, Effect,
    EffectField, EffectKind, GlobalParam, GlobalParameterOverrides, GlobalParameters, RawEffect,
    Recipient, RecipientAssumptions, RecipientCategory, RecipientCategoryAssumptions,
    RecipientEffectOverride, UserAssumptions, ValidTimeInterval,
};
