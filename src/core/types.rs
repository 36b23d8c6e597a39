use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DataError;

/// Parameters every effect is evaluated against. All independently
/// overridable through the Override Store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalParameters {
    pub discount_rate: f64,
    pub population_growth_rate: f64,
    pub time_limit: f64,
    pub population_limit: f64,
    pub current_population: f64,
    pub years_per_life: f64,
}

impl GlobalParameters {
    pub fn get(&self, param: GlobalParam) -> f64 {
        match param {
            GlobalParam::DiscountRate => self.discount_rate,
            GlobalParam::PopulationGrowthRate => self.population_growth_rate,
            GlobalParam::TimeLimit => self.time_limit,
            GlobalParam::PopulationLimit => self.population_limit,
            GlobalParam::CurrentPopulation => self.current_population,
            GlobalParam::YearsPerLife => self.years_per_life,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlobalParam {
    DiscountRate,
    PopulationGrowthRate,
    TimeLimit,
    PopulationLimit,
    CurrentPopulation,
    YearsPerLife,
}

impl GlobalParam {
    pub const ALL: [GlobalParam; 6] = [
        GlobalParam::DiscountRate,
        GlobalParam::PopulationGrowthRate,
        GlobalParam::TimeLimit,
        GlobalParam::PopulationLimit,
        GlobalParam::CurrentPopulation,
        GlobalParam::YearsPerLife,
    ];

    pub fn key(self) -> &'static str {
        match self {
            GlobalParam::DiscountRate => "discountRate",
            GlobalParam::PopulationGrowthRate => "populationGrowthRate",
            GlobalParam::TimeLimit => "timeLimit",
            GlobalParam::PopulationLimit => "populationLimit",
            GlobalParam::CurrentPopulation => "currentPopulation",
            GlobalParam::YearsPerLife => "yearsPerLife",
        }
    }
}

impl fmt::Display for GlobalParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Sparse per-field overrides of [`GlobalParameters`]. Absent fields fall
/// through to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalParameterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_growth_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_population: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_per_life: Option<f64>,
}

impl GlobalParameterOverrides {
    pub fn get(&self, param: GlobalParam) -> Option<f64> {
        match param {
            GlobalParam::DiscountRate => self.discount_rate,
            GlobalParam::PopulationGrowthRate => self.population_growth_rate,
            GlobalParam::TimeLimit => self.time_limit,
            GlobalParam::PopulationLimit => self.population_limit,
            GlobalParam::CurrentPopulation => self.current_population,
            GlobalParam::YearsPerLife => self.years_per_life,
        }
    }

    pub fn set(&mut self, param: GlobalParam, value: Option<f64>) {
        let slot = match param {
            GlobalParam::DiscountRate => &mut self.discount_rate,
            GlobalParam::PopulationGrowthRate => &mut self.population_growth_rate,
            GlobalParam::TimeLimit => &mut self.time_limit,
            GlobalParam::PopulationLimit => &mut self.population_limit,
            GlobalParam::CurrentPopulation => &mut self.current_population,
            GlobalParam::YearsPerLife => &mut self.years_per_life,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        GlobalParam::ALL.iter().all(|p| self.get(*p).is_none())
    }

    pub fn resolve(&self, base: &GlobalParameters) -> GlobalParameters {
        GlobalParameters {
            discount_rate: self.discount_rate.unwrap_or(base.discount_rate),
            population_growth_rate: self
                .population_growth_rate
                .unwrap_or(base.population_growth_rate),
            time_limit: self.time_limit.unwrap_or(base.time_limit),
            population_limit: self.population_limit.unwrap_or(base.population_limit),
            current_population: self.current_population.unwrap_or(base.current_population),
            years_per_life: self.years_per_life.unwrap_or(base.years_per_life),
        }
    }
}

/// Addresses one numeric field of an effect. Which fields apply depends on
/// the effect's variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum EffectField {
    #[serde(rename = "startTime")]
    StartTime,
    #[serde(rename = "windowLength")]
    WindowLength,
    #[serde(rename = "costPerQALY")]
    CostPerQaly,
    #[serde(rename = "costPerMicroprobability")]
    CostPerMicroprobability,
    #[serde(rename = "populationFractionAffected")]
    PopulationFractionAffected,
    #[serde(rename = "qalyImprovementPerYear")]
    QalyImprovementPerYear,
}

impl EffectField {
    pub fn key(self) -> &'static str {
        match self {
            EffectField::StartTime => "startTime",
            EffectField::WindowLength => "windowLength",
            EffectField::CostPerQaly => "costPerQALY",
            EffectField::CostPerMicroprobability => "costPerMicroprobability",
            EffectField::PopulationFractionAffected => "populationFractionAffected",
            EffectField::QalyImprovementPerYear => "qalyImprovementPerYear",
        }
    }
}

impl fmt::Display for EffectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Absolute calendar bound on when an effect is live. Either end may be
/// unbounded. Serialized as `[startYearOrNull, endYearOrNull]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTimeInterval(pub Option<i32>, pub Option<i32>);

impl ValidTimeInterval {
    pub fn contains(&self, year: i32) -> bool {
        self.0.is_none_or(|start| year >= start) && self.1.is_none_or(|end| year <= end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    LifeYears {
        cost_per_qaly: f64,
    },
    CatastrophicEvent {
        cost_per_microprobability: f64,
        population_fraction_affected: f64,
        qaly_improvement_per_year: f64,
    },
}

/// One causal mechanism by which spending produces benefit. The variant is
/// decided once, when the raw document is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEffect", into = "RawEffect")]
pub struct Effect {
    pub id: String,
    pub name: String,
    pub start_time: f64,
    pub window_length: f64,
    pub valid_time_interval: Option<ValidTimeInterval>,
    pub disabled: bool,
    pub kind: EffectKind,
}

impl Effect {
    pub fn window_end(&self) -> f64 {
        self.start_time + self.window_length
    }

    /// The value of one addressable field, or `None` when the field does
    /// not exist on this effect's variant.
    pub fn field(&self, field: EffectField) -> Option<f64> {
        match (field, &self.kind) {
            (EffectField::StartTime, _) => Some(self.start_time),
            (EffectField::WindowLength, _) => Some(self.window_length),
            (EffectField::CostPerQaly, EffectKind::LifeYears { cost_per_qaly }) => {
                Some(*cost_per_qaly)
            }
            (
                EffectField::CostPerMicroprobability,
                EffectKind::CatastrophicEvent {
                    cost_per_microprobability,
                    ..
                },
            ) => Some(*cost_per_microprobability),
            (
                EffectField::PopulationFractionAffected,
                EffectKind::CatastrophicEvent {
                    population_fraction_affected,
                    ..
                },
            ) => Some(*population_fraction_affected),
            (
                EffectField::QalyImprovementPerYear,
                EffectKind::CatastrophicEvent {
                    qaly_improvement_per_year,
                    ..
                },
            ) => Some(*qaly_improvement_per_year),
            _ => None,
        }
    }

    /// Writes one addressable field. Returns `false` when the field does
    /// not exist on this effect's variant.
    pub fn set_field(&mut self, field: EffectField, value: f64) -> bool {
        match (field, &mut self.kind) {
            (EffectField::StartTime, _) => self.start_time = value,
            (EffectField::WindowLength, _) => self.window_length = value,
            (EffectField::CostPerQaly, EffectKind::LifeYears { cost_per_qaly }) => {
                *cost_per_qaly = value;
            }
            (
                EffectField::CostPerMicroprobability,
                EffectKind::CatastrophicEvent {
                    cost_per_microprobability,
                    ..
                },
            ) => *cost_per_microprobability = value,
            (
                EffectField::PopulationFractionAffected,
                EffectKind::CatastrophicEvent {
                    population_fraction_affected,
                    ..
                },
            ) => *population_fraction_affected = value,
            (
                EffectField::QalyImprovementPerYear,
                EffectKind::CatastrophicEvent {
                    qaly_improvement_per_year,
                    ..
                },
            ) => *qaly_improvement_per_year = value,
            _ => return false,
        }
        true
    }

    pub fn same_kind(&self, other: &Effect) -> bool {
        matches!(
            (&self.kind, &other.kind),
            (EffectKind::LifeYears { .. }, EffectKind::LifeYears { .. })
                | (
                    EffectKind::CatastrophicEvent { .. },
                    EffectKind::CatastrophicEvent { .. }
                )
        )
    }

    pub fn applicable_fields(&self) -> &'static [EffectField] {
        match self.kind {
            EffectKind::LifeYears { .. } => &[
                EffectField::StartTime,
                EffectField::WindowLength,
                EffectField::CostPerQaly,
            ],
            EffectKind::CatastrophicEvent { .. } => &[
                EffectField::StartTime,
                EffectField::WindowLength,
                EffectField::CostPerMicroprobability,
                EffectField::PopulationFractionAffected,
                EffectField::QalyImprovementPerYear,
            ],
        }
    }
}

/// Wire form of an effect: the variant is implied by which cost field is
/// present. Decoded into [`Effect`] exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEffect {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_time: f64,
    pub window_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_time_interval: Option<ValidTimeInterval>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(
        rename = "costPerQALY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_per_qaly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_microprobability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_fraction_affected: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qaly_improvement_per_year: Option<f64>,
}

impl TryFrom<RawEffect> for Effect {
    type Error = DataError;

    fn try_from(raw: RawEffect) -> Result<Self, DataError> {
        let kind = match (raw.cost_per_qaly, raw.cost_per_microprobability) {
            (Some(_), Some(_)) => {
                return Err(DataError::AmbiguousEffectKind { id: raw.id });
            }
            (None, None) => {
                return Err(DataError::MissingEffectKind { id: raw.id });
            }
            (Some(cost_per_qaly), None) => {
                if raw.population_fraction_affected.is_some()
                    || raw.qaly_improvement_per_year.is_some()
                {
                    return Err(DataError::MixedEffectFields { id: raw.id });
                }
                EffectKind::LifeYears { cost_per_qaly }
            }
            (None, Some(cost_per_microprobability)) => {
                let Some(population_fraction_affected) = raw.population_fraction_affected else {
                    return Err(DataError::MissingEventField {
                        id: raw.id,
                        field: EffectField::PopulationFractionAffected,
                    });
                };
                let Some(qaly_improvement_per_year) = raw.qaly_improvement_per_year else {
                    return Err(DataError::MissingEventField {
                        id: raw.id,
                        field: EffectField::QalyImprovementPerYear,
                    });
                };
                if !(population_fraction_affected > 0.0 && population_fraction_affected <= 1.0) {
                    return Err(DataError::PopulationFractionOutOfRange {
                        id: raw.id,
                        value: population_fraction_affected,
                    });
                }
                EffectKind::CatastrophicEvent {
                    cost_per_microprobability,
                    population_fraction_affected,
                    qaly_improvement_per_year,
                }
            }
        };

        Ok(Effect {
            id: raw.id,
            name: raw.name,
            start_time: raw.start_time,
            window_length: raw.window_length,
            valid_time_interval: raw.valid_time_interval,
            disabled: raw.disabled,
            kind,
        })
    }
}

impl From<Effect> for RawEffect {
    fn from(effect: Effect) -> RawEffect {
        let mut raw = RawEffect {
            id: effect.id,
            name: effect.name,
            start_time: effect.start_time,
            window_length: effect.window_length,
            valid_time_interval: effect.valid_time_interval,
            disabled: effect.disabled,
            cost_per_qaly: None,
            cost_per_microprobability: None,
            population_fraction_affected: None,
            qaly_improvement_per_year: None,
        };
        match effect.kind {
            EffectKind::LifeYears { cost_per_qaly } => {
                raw.cost_per_qaly = Some(cost_per_qaly);
            }
            EffectKind::CatastrophicEvent {
                cost_per_microprobability,
                population_fraction_affected,
                qaly_improvement_per_year,
            } => {
                raw.cost_per_microprobability = Some(cost_per_microprobability);
                raw.population_fraction_affected = Some(population_fraction_affected);
                raw.qaly_improvement_per_year = Some(qaly_improvement_per_year);
            }
        }
        raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub effects: Vec<Effect>,
}

impl Category {
    pub fn effect(&self, effect_id: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == effect_id)
    }
}

/// One recipient-level customization of a single effect. `overrides` hold
/// absolute replacement values; `multipliers` scale whatever the override
/// chain resolved. A field never appears in both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientEffectOverride {
    pub effect_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<EffectField, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub multipliers: BTreeMap<EffectField, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl RecipientEffectOverride {
    pub fn new(effect_id: impl Into<String>) -> Self {
        RecipientEffectOverride {
            effect_id: effect_id.into(),
            ..RecipientEffectOverride::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.multipliers.is_empty() && self.disabled.is_none()
    }

    /// `windowLength = 0` as a recipient-level override means "this effect
    /// does not apply to this recipient".
    pub fn removes_effect(&self) -> bool {
        self.overrides.get(&EffectField::WindowLength) == Some(&0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientCategory {
    pub fraction: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<RecipientEffectOverride>,
}

impl RecipientCategory {
    pub fn effect_override(&self, effect_id: &str) -> Option<&RecipientEffectOverride> {
        self.effects.iter().find(|o| o.effect_id == effect_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub categories: BTreeMap<String, RecipientCategory>,
}

/// Category-level edit of one effect: absolute field values layered over
/// the default effect, flattened on the wire (`{"effectId": ..,
/// "costPerQALY": 90}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEffectPatch {
    pub effect_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(flatten)]
    pub fields: BTreeMap<EffectField, f64>,
}

impl CategoryEffectPatch {
    pub fn new(effect_id: impl Into<String>) -> Self {
        CategoryEffectPatch {
            effect_id: effect_id.into(),
            ..CategoryEffectPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.disabled.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssumptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<CategoryEffectPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientCategoryAssumptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<RecipientEffectOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientAssumptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, RecipientCategoryAssumptions>,
}

/// The sparse, persisted user-assumptions document. Always minimal: no
/// stored value equals its default, no branch is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserAssumptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_parameters: Option<GlobalParameterOverrides>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, CategoryAssumptions>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub recipients: BTreeMap<String, RecipientAssumptions>,
}

impl UserAssumptions {
    pub fn is_empty(&self) -> bool {
        self.global_parameters.is_none()
            && self.categories.is_empty()
            && self.recipients.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub donor: String,
    pub recipient_id: String,
    pub amount: f64,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorStats {
    pub donor: String,
    pub total_donated: f64,
    pub lives_saved: f64,
    pub cost_per_life: f64,
}

/// The immutable baseline dataset: built once at startup, passed by
/// reference, never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub global_parameters: GlobalParameters,
    pub categories: BTreeMap<String, Category>,
    pub recipients: BTreeMap<String, Recipient>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub donations: Vec<Donation>,
}

impl Defaults {
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn recipient(&self, id: &str) -> Option<&Recipient> {
        self.recipients.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qaly_effect_json() -> &'static str {
        r#"{
          "id": "bednets",
          "name": "Insecticide-treated nets",
          "startTime": 0,
          "windowLength": 10,
          "costPerQALY": 100
        }"#
    }

    #[test]
    fn raw_effect_decodes_life_year_variant() {
        let effect: Effect = serde_json::from_str(qaly_effect_json()).expect("must decode");
        assert_eq!(effect.id, "bednets");
        assert!(!effect.disabled);
        assert_eq!(
            effect.kind,
            EffectKind::LifeYears {
                cost_per_qaly: 100.0
            }
        );
    }

    #[test]
    fn raw_effect_decodes_event_variant_with_interval() {
        let json = r#"{
          "id": "pandemic",
          "name": "Pandemic prevention",
          "startTime": 0,
          "windowLength": 50,
          "validTimeInterval": [2025, null],
          "costPerMicroprobability": 40000,
          "populationFractionAffected": 0.6,
          "qalyImprovementPerYear": 1.0
        }"#;
        let effect: Effect = serde_json::from_str(json).expect("must decode");
        assert_eq!(
            effect.valid_time_interval,
            Some(ValidTimeInterval(Some(2025), None))
        );
        assert!(matches!(effect.kind, EffectKind::CatastrophicEvent { .. }));
    }

    #[test]
    fn raw_effect_rejects_both_cost_fields() {
        let json = r#"{
          "id": "x", "startTime": 0, "windowLength": 1,
          "costPerQALY": 1, "costPerMicroprobability": 1,
          "populationFractionAffected": 0.5, "qalyImprovementPerYear": 1
        }"#;
        let err = serde_json::from_str::<Effect>(json).expect_err("must reject");
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn raw_effect_rejects_missing_kind_and_bad_fraction() {
        let missing = r#"{"id": "x", "startTime": 0, "windowLength": 1}"#;
        assert!(serde_json::from_str::<Effect>(missing).is_err());

        let bad_fraction = r#"{
          "id": "x", "startTime": 0, "windowLength": 1,
          "costPerMicroprobability": 100,
          "populationFractionAffected": 1.5,
          "qalyImprovementPerYear": 1
        }"#;
        let err = serde_json::from_str::<Effect>(bad_fraction).expect_err("must reject");
        assert!(err.to_string().contains("populationFractionAffected"));
    }

    #[test]
    fn effect_serializes_back_to_flat_wire_form() {
        let effect: Effect = serde_json::from_str(qaly_effect_json()).expect("must decode");
        let json = serde_json::to_string(&effect).expect("must encode");
        assert!(json.contains("\"costPerQALY\":100.0"));
        assert!(!json.contains("kind"));
        assert!(!json.contains("disabled"));
    }

    #[test]
    fn field_access_respects_variant() {
        let mut effect: Effect = serde_json::from_str(qaly_effect_json()).expect("must decode");
        assert_eq!(effect.field(EffectField::CostPerQaly), Some(100.0));
        assert_eq!(effect.field(EffectField::CostPerMicroprobability), None);
        assert!(effect.set_field(EffectField::StartTime, 2.0));
        assert!(!effect.set_field(EffectField::QalyImprovementPerYear, 1.0));
        assert_eq!(effect.start_time, 2.0);
    }

    #[test]
    fn valid_time_interval_bounds() {
        let open_end = ValidTimeInterval(Some(2025), None);
        assert!(!open_end.contains(2020));
        assert!(open_end.contains(2025));
        assert!(open_end.contains(3000));

        let open_start = ValidTimeInterval(None, Some(2030));
        assert!(open_start.contains(1990));
        assert!(!open_start.contains(2031));
    }

    #[test]
    fn category_patch_round_trips_flattened_fields() {
        let json = r#"{"effectId": "bednets", "costPerQALY": 80.0, "startTime": 1.0}"#;
        let patch: CategoryEffectPatch = serde_json::from_str(json).expect("must decode");
        assert_eq!(patch.fields.get(&EffectField::CostPerQaly), Some(&80.0));
        assert_eq!(patch.fields.get(&EffectField::StartTime), Some(&1.0));

        let back = serde_json::to_string(&patch).expect("must encode");
        assert!(back.contains("\"costPerQALY\":80.0"));
        assert!(back.contains("\"effectId\":\"bednets\""));
    }

    #[test]
    fn user_assumptions_skip_empty_branches_when_serialized() {
        let user = UserAssumptions::default();
        assert_eq!(serde_json::to_string(&user).expect("must encode"), "{}");

        let mut user = UserAssumptions::default();
        let mut overrides = GlobalParameterOverrides::default();
        overrides.set(GlobalParam::DiscountRate, Some(0.05));
        user.global_parameters = Some(overrides);
        let json = serde_json::to_string(&user).expect("must encode");
        assert_eq!(json, r#"{"globalParameters":{"discountRate":0.05}}"#);
    }

    #[test]
    fn recipient_override_sentinel_detection() {
        let mut ovr = RecipientEffectOverride::new("bednets");
        assert!(ovr.is_empty());
        assert!(!ovr.removes_effect());
        ovr.overrides.insert(EffectField::WindowLength, 0.0);
        assert!(ovr.removes_effect());
    }
}
