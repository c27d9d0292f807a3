//! Data entry flow primitives
//!
//! A flow is a sequence of form steps run by a [`FlowHandler`]. Each step
//! either shows a form described by a [`Schema`], finishes the flow by
//! creating or updating an entry, or aborts with a reason. The
//! [`FlowManager`](crate::FlowManager) validates submissions against the
//! schema of the form that was shown before handing them to the handler.

use std::collections::HashMap;

use async_trait::async_trait;
use poolchem_core::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::ConfigEntry;
use crate::manager::ConfigEntriesError;

/// Submitted (or stored) form values keyed by field name
pub type UserInput = HashMap<String, serde_json::Value>;

/// Per-field error codes keyed by field name
pub type FieldErrors = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("no flow handler registered for {0}")]
    UnknownHandler(String),

    #[error("flow not found: {0}")]
    UnknownFlow(String),

    #[error("unknown step {step} for {handler}")]
    UnknownStep { handler: String, step: String },

    #[error("{handler} has no options flow")]
    NoOptionsFlow { handler: String },

    #[error("{result} is not a valid result for a {flow_source:?} flow")]
    InvalidResult {
        result: &'static str,
        flow_source: FlowSource,
    },

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

/// What a flow was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSource {
    /// Creating a new entry
    User,
    /// Editing the setup data of an existing entry
    Reconfigure,
    /// Editing the options of an existing entry
    Options,
}

impl FlowSource {
    pub fn initial_step(&self) -> &'static str {
        match self {
            FlowSource::User => "user",
            FlowSource::Reconfigure => "reconfigure",
            FlowSource::Options => "init",
        }
    }
}

/// Immutable facts about a running flow, handed to every step
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub flow_id: String,
    pub handler: String,
    pub source: FlowSource,
    /// Entry being edited; `None` for new entries or when it has vanished
    pub entry: Option<ConfigEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberMode {
    #[default]
    Box,
    Slider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Input widget for a form field, with its validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    Text,
    Number {
        min: f64,
        max: f64,
        step: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit_of_measurement: Option<String>,
        mode: NumberMode,
    },
    Select {
        options: Vec<SelectOption>,
    },
    Entity {
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
    },
    Boolean,
}

impl Selector {
    /// Validate and normalize one submitted value
    fn coerce(&self, value: &serde_json::Value) -> Result<serde_json::Value, &'static str> {
        use serde_json::Value;

        match self {
            Selector::Text => value
                .as_str()
                .map(|s| Value::String(s.trim().to_string()))
                .ok_or("invalid_string"),
            Selector::Number { min, max, .. } => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }
                .filter(|n| n.is_finite())
                .ok_or("invalid_number")?;
                if number < *min || number > *max {
                    return Err("out_of_range");
                }
                Ok(serde_json::json!(number))
            }
            Selector::Select { options } => {
                let choice = value.as_str().ok_or("invalid_option")?;
                if options.iter().any(|o| o.value == choice) {
                    Ok(Value::String(choice.to_string()))
                } else {
                    Err("invalid_option")
                }
            }
            Selector::Entity { domain } => {
                let entity_id: EntityId = value
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or("invalid_entity_id")?;
                match domain {
                    Some(domain) if entity_id.domain() != domain => Err("invalid_entity_domain"),
                    _ => Ok(Value::String(entity_id.to_string())),
                }
            }
            Selector::Boolean => value.as_bool().map(Value::Bool).ok_or("invalid_boolean"),
        }
    }
}

/// A single field of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub selector: Selector,
    pub required: bool,
    /// Filled in when the field is left empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Pre-populated in the form but not filled in when left empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<serde_json::Value>,
}

impl FormField {
    pub fn required(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            selector,
            required: true,
            default: None,
            suggested_value: None,
        }
    }

    pub fn optional(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            required: false,
            ..Self::required(name, selector)
        }
    }

    pub fn default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn suggested(mut self, value: Option<serde_json::Value>) -> Self {
        self.suggested_value = value;
        self
    }
}

/// Ordered list of fields making up a form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub fields: Vec<FormField>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a submission against the schema
    ///
    /// Empty strings and nulls count as "not provided". Missing fields take
    /// their default when they have one; optional fields without a default
    /// are omitted from the result. Keys not in the schema are dropped.
    pub fn validate(&self, input: &UserInput) -> Result<UserInput, FieldErrors> {
        let mut valid = UserInput::new();
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            let provided = input.get(&field.name).filter(|v| match v {
                serde_json::Value::Null => false,
                serde_json::Value::String(s) => !s.trim().is_empty(),
                _ => true,
            });

            match (provided, &field.default) {
                (Some(value), _) => match field.selector.coerce(value) {
                    Ok(value) => {
                        valid.insert(field.name.clone(), value);
                    }
                    Err(code) => {
                        errors.insert(field.name.clone(), code.to_string());
                    }
                },
                (None, Some(default)) => {
                    valid.insert(field.name.clone(), default.clone());
                }
                (None, None) if field.required => {
                    errors.insert(field.name.clone(), "required".to_string());
                }
                (None, None) => {}
            }
        }

        if errors.is_empty() {
            Ok(valid)
        } else {
            Err(errors)
        }
    }
}

/// Outcome of a single flow step
#[derive(Debug, Clone)]
pub enum StepResult {
    /// Show (or re-show) a form
    Form {
        step_id: String,
        schema: Schema,
        errors: FieldErrors,
        description_placeholders: HashMap<String, String>,
        last_step: bool,
    },
    /// Finish by creating an entry, or by replacing options in an options flow
    CreateEntry {
        title: String,
        data: UserInput,
        options: UserInput,
    },
    /// Overwrite the edited entry in place, reload it and abort
    UpdateReloadAbort {
        title: Option<String>,
        data: UserInput,
        /// Replaces the options too when set
        options: Option<UserInput>,
    },
    Abort {
        reason: String,
    },
}

impl StepResult {
    pub fn form(step_id: impl Into<String>, schema: Schema) -> Self {
        StepResult::Form {
            step_id: step_id.into(),
            schema,
            errors: FieldErrors::new(),
            description_placeholders: HashMap::new(),
            last_step: false,
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        StepResult::Abort {
            reason: reason.into(),
        }
    }

    /// Mark a form as the final step of its flow
    pub fn last_step(mut self) -> Self {
        if let StepResult::Form { last_step, .. } = &mut self {
            *last_step = true;
        }
        self
    }

    pub fn placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let StepResult::Form {
            description_placeholders,
            ..
        } = &mut self
        {
            description_placeholders.insert(key.into(), value.into());
        }
        self
    }
}

/// A running flow's step logic
#[async_trait]
pub trait FlowHandler: Send {
    /// Run `step_id` with validated input, or `None` when first entering it
    async fn step(
        &mut self,
        ctx: &FlowContext,
        step_id: &str,
        user_input: Option<UserInput>,
    ) -> Result<StepResult, FlowError>;
}

/// Creates flow handlers for an integration
pub trait FlowHandlerFactory: Send + Sync {
    /// Handler for new entries and reconfiguration
    fn config_flow(&self) -> Box<dyn FlowHandler>;

    /// Handler for the options of an existing entry
    fn options_flow(&self) -> Option<Box<dyn FlowHandler>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Externally visible state of a flow after a step
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty unless this is a form
    pub data_schema: Vec<FormField>,
    pub errors: Option<FieldErrors>,
    pub description_placeholders: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Entry id for a created entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub last_step: Option<bool>,
}

impl FlowResult {
    pub(crate) fn empty(ctx: &FlowContext, result_type: FlowResultType) -> Self {
        Self {
            flow_id: ctx.flow_id.clone(),
            handler: ctx.handler.clone(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            description_placeholders: None,
            title: None,
            reason: None,
            result: None,
            last_step: None,
        }
    }

    pub fn is_form(&self, step_id: &str) -> bool {
        self.result_type == FlowResultType::Form && self.step_id.as_deref() == Some(step_id)
    }
}
