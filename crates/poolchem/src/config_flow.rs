//! Setup, reconfigure and options wizards
//!
//! Setup walks pool → required sensors → optional sensors → targets →
//! chemicals → dosing sensors. Reconfigure runs the same sequence seeded
//! from the existing entry. The options flow covers only the last three
//! steps and never touches setup data.

use async_trait::async_trait;
use poolchem_config_entries::{
    FlowContext, FlowError, FlowHandler, FlowSource, FormField, NumberMode, Schema, SelectOption,
    Selector, StepResult, UserInput,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::consts::*;
use crate::number::{number_description, target_fields};
use crate::types::{
    AcidType, Choice, ChlorineType, DoseKind, Measurement, PhUpType, PoolType, SurfaceType,
};

const STEP_USER: &str = "user";
const STEP_RECONFIGURE: &str = "reconfigure";
const STEP_REQUIRED_ENTITIES: &str = "required_entities";
const STEP_OPTIONAL_ENTITIES: &str = "optional_entities";
const STEP_TARGETS: &str = "targets";
const STEP_CHEMICALS: &str = "chemicals";
const STEP_DOSING_SENSORS: &str = "dosing_sensors";
const STEP_INIT: &str = "init";

fn sensor_selector() -> Selector {
    Selector::Entity {
        domain: Some("sensor".to_string()),
    }
}

fn volume_selector() -> Selector {
    Selector::Number {
        min: 100.0,
        max: 1_000_000.0,
        step: 100.0,
        unit_of_measurement: Some("gallons".to_string()),
        mode: NumberMode::Box,
    }
}

fn choice_selector<C: Choice>() -> Selector {
    Selector::Select {
        options: C::ALL
            .iter()
            .map(|c| SelectOption::new(c.value(), c.label()))
            .collect(),
    }
}

/// Required select field defaulting to the stored choice
fn choice_field<C: Choice + Default>(key: &str, current: &UserInput) -> FormField {
    let default = current
        .get(key)
        .cloned()
        .unwrap_or_else(|| json!(C::default().value()));
    FormField::required(key, choice_selector::<C>()).default(default)
}

fn pool_type_of(data: &UserInput) -> PoolType {
    data.get(CONF_POOL_TYPE)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn pool_schema(data: &UserInput) -> Schema {
    let name = data
        .get(CONF_POOL_NAME)
        .cloned()
        .unwrap_or_else(|| json!(DEFAULT_POOL_NAME));
    let mut volume = FormField::required(CONF_VOLUME_GALLONS, volume_selector());
    if let Some(current) = data.get(CONF_VOLUME_GALLONS) {
        volume = volume.default(current.clone());
    }

    Schema::new()
        .field(FormField::required(CONF_POOL_NAME, Selector::Text).default(name))
        .field(volume)
        .field(choice_field::<PoolType>(CONF_POOL_TYPE, data))
        .field(choice_field::<SurfaceType>(CONF_SURFACE_TYPE, data))
}

fn required_entities_schema(data: &UserInput) -> Schema {
    Measurement::ALL
        .into_iter()
        .filter(Measurement::is_required)
        .fold(Schema::new(), |schema, m| {
            let mut field = FormField::required(m.conf_key(), sensor_selector());
            if let Some(current) = data.get(m.conf_key()) {
                field = field.default(current.clone());
            }
            schema.field(field)
        })
}

/// Optional sensors are suggested, never defaulted, so they can be cleared
fn optional_entities_schema(data: &UserInput) -> Schema {
    Measurement::ALL
        .into_iter()
        .filter(|m| !m.is_required())
        .fold(Schema::new(), |schema, m| {
            schema.field(
                FormField::optional(m.conf_key(), sensor_selector())
                    .suggested(data.get(m.conf_key()).cloned()),
            )
        })
}

fn targets_schema(options: &UserInput, pool_type: PoolType) -> Schema {
    target_fields(pool_type)
        .into_iter()
        .fold(Schema::new(), |schema, field| {
            let d = number_description(field);
            let default = options
                .get(field.key())
                .cloned()
                .unwrap_or_else(|| json!(field.default_value()));
            schema.field(
                FormField::required(
                    field.key(),
                    Selector::Number {
                        min: d.min,
                        max: d.max,
                        step: d.step,
                        unit_of_measurement: d.unit.map(str::to_string),
                        mode: d.mode,
                    },
                )
                .default(default),
            )
        })
}

fn chemicals_schema(options: &UserInput) -> Schema {
    Schema::new()
        .field(choice_field::<AcidType>(CONF_ACID_TYPE, options))
        .field(choice_field::<ChlorineType>(CONF_CHLORINE_TYPE, options))
        .field(choice_field::<PhUpType>(CONF_PH_UP_TYPE, options))
}

fn dosing_schema(options: &UserInput, pool_type: PoolType) -> Schema {
    DoseKind::ALL
        .into_iter()
        .filter(|kind| kind.applies_to(pool_type))
        .fold(Schema::new(), |schema, kind| {
            let default = options
                .get(kind.enable_key())
                .cloned()
                .unwrap_or_else(|| Value::Bool(kind.enabled_by_default()));
            schema.field(FormField::required(kind.enable_key(), Selector::Boolean).default(default))
        })
}

fn unknown_step(ctx: &FlowContext, step_id: &str) -> FlowError {
    FlowError::UnknownStep {
        handler: ctx.handler.clone(),
        step: step_id.to_string(),
    }
}

/// Setup and reconfigure wizard
#[derive(Debug, Default)]
pub struct PoolChemConfigFlow {
    data: UserInput,
    options: UserInput,
}

impl PoolChemConfigFlow {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool_name(&self) -> String {
        self.data
            .get(CONF_POOL_NAME)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_POOL_NAME)
            .to_string()
    }

    fn finish(&self, ctx: &FlowContext) -> StepResult {
        if ctx.source == FlowSource::Reconfigure {
            StepResult::UpdateReloadAbort {
                title: Some(self.pool_name()),
                data: self.data.clone(),
                options: Some(self.options.clone()),
            }
        } else {
            StepResult::CreateEntry {
                title: self.pool_name(),
                data: self.data.clone(),
                options: self.options.clone(),
            }
        }
    }
}

#[async_trait]
impl FlowHandler for PoolChemConfigFlow {
    async fn step(
        &mut self,
        ctx: &FlowContext,
        step_id: &str,
        user_input: Option<UserInput>,
    ) -> Result<StepResult, FlowError> {
        match (step_id, user_input) {
            (STEP_RECONFIGURE, _) if ctx.entry.is_none() => {
                Ok(StepResult::abort(REASON_RECONFIGURE_FAILED))
            }
            (STEP_RECONFIGURE, None) => {
                if let Some(entry) = &ctx.entry {
                    debug!(entry_id = %entry.entry_id, "Reconfiguring pool");
                    self.data = entry.data.clone();
                    self.options = entry.options.clone();
                }
                Ok(StepResult::form(STEP_RECONFIGURE, pool_schema(&self.data)))
            }
            (STEP_USER, None) => Ok(StepResult::form(STEP_USER, pool_schema(&self.data))),
            (STEP_USER | STEP_RECONFIGURE, Some(input)) => {
                self.data.extend(input);
                Ok(StepResult::form(
                    STEP_REQUIRED_ENTITIES,
                    required_entities_schema(&self.data),
                ))
            }
            (STEP_REQUIRED_ENTITIES, Some(input)) => {
                self.data.extend(input);
                Ok(StepResult::form(
                    STEP_OPTIONAL_ENTITIES,
                    optional_entities_schema(&self.data),
                ))
            }
            (STEP_OPTIONAL_ENTITIES, Some(input)) => {
                for key in OPTIONAL_ENTITIES {
                    if !input.contains_key(key) {
                        self.data.remove(key);
                    }
                }
                self.data.extend(input);
                Ok(StepResult::form(
                    STEP_TARGETS,
                    targets_schema(&self.options, pool_type_of(&self.data)),
                ))
            }
            (STEP_TARGETS, Some(input)) => {
                self.options.extend(input);
                Ok(StepResult::form(STEP_CHEMICALS, chemicals_schema(&self.options)))
            }
            (STEP_CHEMICALS, Some(input)) => {
                self.options.extend(input);
                Ok(StepResult::form(
                    STEP_DOSING_SENSORS,
                    dosing_schema(&self.options, pool_type_of(&self.data)),
                )
                .last_step())
            }
            (STEP_DOSING_SENSORS, Some(input)) => {
                self.options.extend(input);
                Ok(self.finish(ctx))
            }
            (step, _) => Err(unknown_step(ctx, step)),
        }
    }
}

/// Options-only wizard: targets, chemicals, dosing sensors
#[derive(Debug, Default)]
pub struct PoolChemOptionsFlow {
    options: UserInput,
    pool_type: PoolType,
}

impl PoolChemOptionsFlow {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowHandler for PoolChemOptionsFlow {
    async fn step(
        &mut self,
        ctx: &FlowContext,
        step_id: &str,
        user_input: Option<UserInput>,
    ) -> Result<StepResult, FlowError> {
        match (step_id, user_input) {
            (STEP_INIT, None) => {
                if let Some(entry) = &ctx.entry {
                    self.options = entry.options.clone();
                    self.pool_type = pool_type_of(&entry.data);
                }
                Ok(StepResult::form(
                    STEP_INIT,
                    targets_schema(&self.options, self.pool_type),
                ))
            }
            (STEP_INIT, Some(input)) => {
                self.options.extend(input);
                Ok(StepResult::form(STEP_CHEMICALS, chemicals_schema(&self.options)))
            }
            (STEP_CHEMICALS, Some(input)) => {
                self.options.extend(input);
                Ok(
                    StepResult::form(STEP_DOSING_SENSORS, dosing_schema(&self.options, self.pool_type))
                        .last_step(),
                )
            }
            (STEP_DOSING_SENSORS, Some(input)) => {
                self.options.extend(input);
                Ok(StepResult::CreateEntry {
                    title: String::new(),
                    data: self.options.clone(),
                    options: UserInput::new(),
                })
            }
            (step, _) => Err(unknown_step(ctx, step)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, Value)]) -> UserInput {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_pool_schema_defaults() {
        let schema = pool_schema(&UserInput::new());
        assert_eq!(schema.get(CONF_POOL_NAME).unwrap().default, Some(json!("Pool")));
        assert_eq!(schema.get(CONF_VOLUME_GALLONS).unwrap().default, None);
        assert_eq!(
            schema.get(CONF_POOL_TYPE).unwrap().default,
            Some(json!("chlorine"))
        );
        match &schema.get(CONF_VOLUME_GALLONS).unwrap().selector {
            Selector::Number {
                min, max, mode, ..
            } => {
                assert_eq!((*min, *max), (100.0, 1_000_000.0));
                assert_eq!(*mode, NumberMode::Box);
            }
            other => panic!("unexpected selector {other:?}"),
        }
    }

    #[test]
    fn test_entity_schemas() {
        let required = required_entities_schema(&UserInput::new());
        assert_eq!(required.fields.len(), 5);
        assert!(required.fields.iter().all(|f| f.required));

        let data = input(&[(CONF_CYA_ENTITY, json!("sensor.cya"))]);
        let optional = optional_entities_schema(&data);
        assert_eq!(optional.fields.len(), 4);
        let cya = optional.get(CONF_CYA_ENTITY).unwrap();
        assert!(!cya.required);
        assert_eq!(cya.default, None);
        assert_eq!(cya.suggested_value, Some(json!("sensor.cya")));
    }

    #[test]
    fn test_salt_fields_only_for_saltwater() {
        let options = UserInput::new();
        assert!(targets_schema(&options, PoolType::Chlorine)
            .get(CONF_TARGET_SALT)
            .is_none());
        assert!(targets_schema(&options, PoolType::Saltwater)
            .get(CONF_TARGET_SALT)
            .is_some());
        assert!(dosing_schema(&options, PoolType::Chlorine)
            .get(CONF_ENABLE_DOSE_SALT)
            .is_none());

        let dosing = dosing_schema(&options, PoolType::Saltwater);
        assert_eq!(dosing.get(CONF_ENABLE_DOSE_SALT).unwrap().default, Some(json!(false)));
        assert_eq!(dosing.get(CONF_ENABLE_DOSE_ACID).unwrap().default, Some(json!(true)));
    }

    #[test]
    fn test_targets_default_to_stored_options() {
        let options = input(&[(CONF_TARGET_PH, json!(7.4))]);
        let schema = targets_schema(&options, PoolType::Chlorine);
        assert_eq!(schema.get(CONF_TARGET_PH).unwrap().default, Some(json!(7.4)));
        assert_eq!(schema.get(CONF_TARGET_CH).unwrap().default, Some(json!(350.0)));
    }

    #[test]
    fn test_chemicals_schema_choices() {
        let schema = chemicals_schema(&UserInput::new());
        assert_eq!(
            schema.get(CONF_ACID_TYPE).unwrap().default,
            Some(json!("muriatic_31_45"))
        );
        assert_eq!(
            schema.get(CONF_CHLORINE_TYPE).unwrap().default,
            Some(json!("bleach_12_5"))
        );
        match &schema.get(CONF_ACID_TYPE).unwrap().selector {
            Selector::Select { options } => assert_eq!(options.len(), 5),
            other => panic!("unexpected selector {other:?}"),
        }
    }
}
