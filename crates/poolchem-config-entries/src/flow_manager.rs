//! Flow manager
//!
//! Tracks in-progress flows, validates each submission against the form
//! that was shown, and applies finished flows to the config entries.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryUpdate};
use crate::flow::{
    FlowContext, FlowError, FlowHandler, FlowHandlerFactory, FlowResult, FlowResultType,
    FlowSource, Schema, StepResult, UserInput,
};
use crate::manager::ConfigEntries;

/// Abort reason reported after a successful reconfiguration
pub const REASON_RECONFIGURE_SUCCESSFUL: &str = "reconfigure_successful";

struct ActiveFlow {
    ctx: FlowContext,
    handler: Box<dyn FlowHandler>,
    step_id: String,
    schema: Schema,
}

pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    factories: DashMap<String, Arc<dyn FlowHandlerFactory>>,
    flows: Mutex<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            factories: DashMap::new(),
            flows: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, domain: &str, factory: Arc<dyn FlowHandlerFactory>) {
        self.factories.insert(domain.to_string(), factory);
        debug!("Registered flow handler for domain: {}", domain);
    }

    fn factory(&self, domain: &str) -> Result<Arc<dyn FlowHandlerFactory>, FlowError> {
        self.factories
            .get(domain)
            .map(|f| f.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(domain.to_string()))
    }

    /// Start the setup wizard for a new entry
    pub async fn start_config_flow(&self, domain: &str) -> Result<FlowResult, FlowError> {
        let handler = self.factory(domain)?.config_flow();
        self.start(domain, FlowSource::User, None, handler).await
    }

    /// Start reconfiguring an entry's setup data
    ///
    /// A vanished entry is still handed to the handler (as `None`) so it
    /// can abort with its own reason.
    pub async fn start_reconfigure_flow(
        &self,
        domain: &str,
        entry_id: &str,
    ) -> Result<FlowResult, FlowError> {
        let handler = self.factory(domain)?.config_flow();
        let entry = self.entries.get(entry_id);
        self.start(domain, FlowSource::Reconfigure, entry, handler)
            .await
    }

    /// Start editing the options of an existing entry
    pub async fn start_options_flow(&self, entry_id: &str) -> Result<FlowResult, FlowError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| crate::ConfigEntriesError::NotFound(entry_id.to_string()))?;
        let handler = self
            .factory(&entry.domain)?
            .options_flow()
            .ok_or_else(|| FlowError::NoOptionsFlow {
                handler: entry.domain.clone(),
            })?;
        let domain = entry.domain.clone();
        self.start(&domain, FlowSource::Options, Some(entry), handler)
            .await
    }

    async fn start(
        &self,
        domain: &str,
        source: FlowSource,
        entry: Option<ConfigEntry>,
        mut handler: Box<dyn FlowHandler>,
    ) -> Result<FlowResult, FlowError> {
        let ctx = FlowContext {
            flow_id: ulid::Ulid::new().to_string(),
            handler: domain.to_string(),
            source,
            entry,
        };
        debug!(flow_id = %ctx.flow_id, ?source, "Starting flow for {}", domain);

        let step = handler.step(&ctx, source.initial_step(), None).await?;
        self.finish_step(ctx, handler, step).await
    }

    /// Submit input for the current step of a flow
    pub async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: UserInput,
    ) -> Result<FlowResult, FlowError> {
        let mut flow = self
            .flows
            .lock()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let valid = match flow.schema.validate(&user_input) {
            Ok(valid) => valid,
            Err(errors) => {
                debug!(flow_id, step = %flow.step_id, ?errors, "Submission rejected");
                let mut result = form_result(&flow.ctx, &flow.step_id, &flow.schema, false);
                result.errors = Some(errors);
                self.flows.lock().await.insert(flow_id.to_string(), flow);
                return Ok(result);
            }
        };

        let step_id = flow.step_id.clone();
        let step = flow.handler.step(&flow.ctx, &step_id, Some(valid)).await?;
        self.finish_step(flow.ctx, flow.handler, step).await
    }

    /// Drop an in-progress flow
    pub async fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        self.flows
            .lock()
            .await
            .remove(flow_id)
            .map(|_| ())
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))
    }

    /// Ids of flows waiting for input
    pub async fn in_progress(&self) -> Vec<String> {
        self.flows.lock().await.keys().cloned().collect()
    }

    async fn finish_step(
        &self,
        ctx: FlowContext,
        handler: Box<dyn FlowHandler>,
        step: StepResult,
    ) -> Result<FlowResult, FlowError> {
        match step {
            StepResult::Form {
                step_id,
                schema,
                errors,
                description_placeholders,
                last_step,
            } => {
                let mut result = form_result(&ctx, &step_id, &schema, last_step);
                if !errors.is_empty() {
                    result.errors = Some(errors);
                }
                if !description_placeholders.is_empty() {
                    result.description_placeholders = Some(description_placeholders);
                }
                let flow_id = ctx.flow_id.clone();
                self.flows.lock().await.insert(
                    flow_id,
                    ActiveFlow {
                        ctx,
                        handler,
                        step_id,
                        schema,
                    },
                );
                Ok(result)
            }
            StepResult::CreateEntry {
                title,
                data,
                options,
            } => self.create_entry(&ctx, title, data, options).await,
            StepResult::UpdateReloadAbort {
                title,
                data,
                options,
            } => {
                let entry = match (&ctx.source, &ctx.entry) {
                    (FlowSource::Reconfigure, Some(entry)) => entry,
                    _ => {
                        return Err(FlowError::InvalidResult {
                            result: "update_reload_and_abort",
                            flow_source: ctx.source,
                        })
                    }
                };
                let mut update = ConfigEntryUpdate::new().data(data);
                update.title = title;
                update.options = options;
                self.entries.update(&entry.entry_id, update).await?;
                if let Err(err) = self.entries.reload(&entry.entry_id).await {
                    warn!("Reload after reconfigure failed for {}: {}", entry.entry_id, err);
                }
                info!("Reconfigured entry {} ({})", entry.title, entry.entry_id);
                Ok(abort_result(&ctx, REASON_RECONFIGURE_SUCCESSFUL))
            }
            StepResult::Abort { reason } => {
                debug!(flow_id = %ctx.flow_id, %reason, "Flow aborted");
                Ok(abort_result(&ctx, &reason))
            }
        }
    }

    async fn create_entry(
        &self,
        ctx: &FlowContext,
        title: String,
        data: UserInput,
        options: UserInput,
    ) -> Result<FlowResult, FlowError> {
        let entry_id = match (&ctx.source, &ctx.entry) {
            (FlowSource::User, _) => {
                let entry = self
                    .entries
                    .add(
                        ConfigEntry::new(&ctx.handler, &title)
                            .with_data(data)
                            .with_options(options),
                    )
                    .await?;
                if let Err(err) = self.entries.setup(&entry.entry_id).await {
                    warn!("Setup of new entry {} failed: {}", entry.entry_id, err);
                }
                entry.entry_id
            }
            // An options flow finishes with the new options as its data
            (FlowSource::Options, Some(entry)) => {
                self.entries
                    .update(&entry.entry_id, ConfigEntryUpdate::new().options(data))
                    .await?;
                self.entries.notify_options_updated(&entry.entry_id).await?;
                entry.entry_id.clone()
            }
            _ => {
                return Err(FlowError::InvalidResult {
                    result: "create_entry",
                    flow_source: ctx.source,
                })
            }
        };

        let mut result = FlowResult::empty(ctx, FlowResultType::CreateEntry);
        result.title = Some(title);
        result.result = Some(entry_id);
        Ok(result)
    }
}

fn form_result(ctx: &FlowContext, step_id: &str, schema: &Schema, last_step: bool) -> FlowResult {
    let mut result = FlowResult::empty(ctx, FlowResultType::Form);
    result.step_id = Some(step_id.to_string());
    result.data_schema = schema.fields.clone();
    result.last_step = Some(last_step);
    result
}

fn abort_result(ctx: &FlowContext, reason: &str) -> FlowResult {
    let mut result = FlowResult::empty(ctx, FlowResultType::Abort);
    result.reason = Some(reason.to_string());
    result
}
