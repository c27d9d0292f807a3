//! Reactive recalculation coordinator
//!
//! One coordinator per pool. It follows the pool's source sensors, and on
//! every change (or explicit request) re-reads them, recomputes balance
//! indices, the FC/CYA ratio and the enabled dosing recommendations, and
//! publishes a fresh [`ChemistrySnapshot`] through a watch channel.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use poolchem_chemistry::units::celsius_to_fahrenheit;
use poolchem_chemistry::{DosingResult, PhDose, WaterChemistry};
use poolchem_core::units::CELSIUS;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::coalesce::RefreshCoalescer;
use crate::consts::*;
use crate::engine::{ChemistryEngine, DoseRequest, Step};
use crate::host::{
    ChangeCallback, ConfigStore, EventSubscriber, SensorReader, SourceChange, Subscription,
};
use crate::types::{DoseKind, Measurement, PoolConfig, PoolOptions, WaterBalanceState};

/// Result of one recalculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChemistrySnapshot {
    /// Current water, present iff the indices could be attempted
    pub water: Option<WaterChemistry>,
    pub csi: Option<f64>,
    pub lsi: Option<f64>,
    pub balance_state: Option<WaterBalanceState>,
    pub target_csi: Option<f64>,
    pub target_lsi: Option<f64>,
    pub target_balance_state: Option<WaterBalanceState>,
    /// FC and CYA the ratio was judged on, present whenever FC was read
    pub free_chlorine: Option<f64>,
    pub cyanuric_acid: Option<f64>,
    pub fc_cya_ratio: Option<f64>,
    pub fc_is_adequate: Option<bool>,
    pub doses: BTreeMap<DoseKind, DosingResult>,
    pub last_updated: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl ChemistrySnapshot {
    fn empty() -> Self {
        Self {
            water: None,
            csi: None,
            lsi: None,
            balance_state: None,
            target_csi: None,
            target_lsi: None,
            target_balance_state: None,
            free_chlorine: None,
            cyanuric_acid: None,
            fc_cya_ratio: None,
            fc_is_adequate: None,
            doses: BTreeMap::new(),
            last_updated: Utc::now(),
            errors: Vec::new(),
        }
    }

    pub fn dose(&self, kind: DoseKind) -> Option<&DosingResult> {
        self.doses.get(&kind)
    }
}

/// Readings of one refresh, after unit conversion and defaults
#[derive(Debug, Clone, Copy)]
struct Readings {
    temperature_f: Option<f64>,
    ph: Option<f64>,
    fc: Option<f64>,
    ta: Option<f64>,
    ch: Option<f64>,
    cya: f64,
    salt: f64,
    tds: f64,
    borates: f64,
}

impl Readings {
    /// Names of the balance inputs that could not be read
    fn missing_balance_inputs(&self) -> Vec<&'static str> {
        [
            (Measurement::Temperature, self.temperature_f),
            (Measurement::Ph, self.ph),
            (Measurement::TotalAlkalinity, self.ta),
            (Measurement::CalciumHardness, self.ch),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(measurement, _)| measurement.label())
        .collect()
    }
}

pub struct PoolChemCoordinator {
    entry_id: String,
    config: PoolConfig,
    store: Arc<dyn ConfigStore>,
    reader: Arc<dyn SensorReader>,
    engine: Arc<dyn ChemistryEngine>,
    coalescer: RefreshCoalescer,
    snapshot: watch::Sender<Option<Arc<ChemistrySnapshot>>>,
    options: watch::Sender<PoolOptions>,
    subscription: Mutex<Option<Subscription>>,
}

impl PoolChemCoordinator {
    pub fn new(
        entry_id: impl Into<String>,
        config: PoolConfig,
        options: PoolOptions,
        store: Arc<dyn ConfigStore>,
        reader: Arc<dyn SensorReader>,
        engine: Arc<dyn ChemistryEngine>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            config,
            store,
            reader,
            engine,
            coalescer: RefreshCoalescer::new(),
            snapshot: watch::channel(None).0,
            options: watch::channel(options).0,
            subscription: Mutex::new(None),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Options as of the last refresh
    pub fn options(&self) -> PoolOptions {
        self.options.borrow().clone()
    }

    /// Latest snapshot, `None` until the first refresh finished
    pub fn data(&self) -> Option<Arc<ChemistrySnapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Follow snapshot publications
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ChemistrySnapshot>>> {
        self.snapshot.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribe to the source sensors and run the first refresh
    ///
    /// Without any configured source sensor this only warns: nothing is
    /// subscribed and no snapshot is ever produced.
    pub async fn start(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        let sources = self.config.source_entities();
        if sources.is_empty() {
            warn!(entry_id = %self.entry_id, "No source entities configured");
            return;
        }

        let coordinator = Arc::downgrade(self);
        let callback: ChangeCallback = Arc::new(move |change| {
            match &change {
                SourceChange::Changed {
                    entity_id,
                    new_state,
                } => debug!(
                    %entity_id,
                    new_state = new_state.as_deref().unwrap_or("None"),
                    "Source entity changed"
                ),
                SourceChange::Missed(missed) => {
                    debug!(missed, "Source changes missed, refreshing anyway")
                }
            }
            if let Some(coordinator) = coordinator.upgrade() {
                tokio::spawn(async move { coordinator.request_refresh().await });
            }
        });

        let subscription = subscriber.subscribe(sources, callback);
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        info!(entry_id = %self.entry_id, pool = %self.config.pool_name, "Pool coordinator started");
        self.request_refresh().await;
    }

    /// Drop the source subscription
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.cancel();
            debug!(entry_id = %self.entry_id, "Pool coordinator stopped");
        }
    }

    /// Recalculate now, or once after the refresh already running
    ///
    /// When a refresh is in flight this returns immediately; however many
    /// requests arrive meanwhile, exactly one more refresh follows it.
    pub async fn request_refresh(self: &Arc<Self>) {
        if !self.coalescer.request() {
            debug!(entry_id = %self.entry_id, "Refresh in flight, queued one more");
            return;
        }

        // Run detached so a dropped caller cannot leave the guard held
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut guard = coordinator.coalescer.guard();
            loop {
                coordinator.refresh().await;
                if !guard.finish() {
                    break;
                }
            }
        });
        if let Err(err) = task.await {
            error!(entry_id = %self.entry_id, "Refresh task failed: {}", err);
        }
    }

    async fn load_options(&self) -> PoolOptions {
        let Some(record) = self.store.read(&self.entry_id).await else {
            warn!(entry_id = %self.entry_id, "Config entry missing, using default targets");
            return PoolOptions::default();
        };
        match PoolOptions::from_options(&record.options) {
            Ok(options) => options,
            Err(err) => {
                warn!(entry_id = %self.entry_id, "Ignoring invalid options: {}", err);
                PoolOptions::default()
            }
        }
    }

    fn reading(&self, measurement: Measurement) -> Option<f64> {
        let entity_id = self.config.source(measurement)?;
        let reading = self.reader.read(entity_id)?;
        if measurement == Measurement::Temperature && reading.unit.as_deref() == Some(CELSIUS) {
            return Some(celsius_to_fahrenheit(reading.value));
        }
        Some(reading.value)
    }

    fn read_sensors(&self) -> Readings {
        Readings {
            temperature_f: self.reading(Measurement::Temperature),
            ph: self.reading(Measurement::Ph),
            fc: self.reading(Measurement::FreeChlorine),
            ta: self.reading(Measurement::TotalAlkalinity),
            ch: self.reading(Measurement::CalciumHardness),
            cya: self.reading(Measurement::CyanuricAcid).unwrap_or(DEFAULT_CYA),
            salt: self.reading(Measurement::Salt).unwrap_or(DEFAULT_SALT),
            tds: self.reading(Measurement::Tds).unwrap_or(DEFAULT_TDS),
            borates: self.reading(Measurement::Borates).unwrap_or(DEFAULT_BORATES),
        }
    }

    #[instrument(skip(self), fields(entry_id = %self.entry_id))]
    async fn refresh(&self) {
        let options = self.load_options().await;
        self.options.send_replace(options.clone());

        let readings = self.read_sensors();
        let mut snapshot = ChemistrySnapshot::empty();

        self.calculate_balance(&readings, &options, &mut snapshot);
        self.calculate_fc_ratio(&readings, &mut snapshot);
        self.calculate_doses(&readings, &options, &mut snapshot);

        debug!(
            csi = ?snapshot.csi,
            balance = ?snapshot.balance_state,
            doses = snapshot.doses.len(),
            errors = snapshot.errors.len(),
            "Pool chemistry recalculated"
        );
        snapshot.last_updated = Utc::now();
        self.snapshot.send_replace(Some(Arc::new(snapshot)));
    }

    fn calculate_balance(
        &self,
        readings: &Readings,
        options: &PoolOptions,
        snapshot: &mut ChemistrySnapshot,
    ) {
        let (Some(temperature_f), Some(ph), Some(ta), Some(ch)) =
            (readings.temperature_f, readings.ph, readings.ta, readings.ch)
        else {
            snapshot.errors.push(format!(
                "Missing required sensors: {}",
                readings.missing_balance_inputs().join(", ")
            ));
            return;
        };

        let water = WaterChemistry::new(ph, temperature_f, ta, ch)
            .with_free_chlorine(readings.fc.unwrap_or(0.0))
            .with_cyanuric_acid(readings.cya)
            .with_salt(readings.salt)
            .with_tds(readings.tds)
            .with_borates(readings.borates);
        snapshot.water = Some(water);

        match self
            .engine
            .csi(&water)
            .and_then(|csi| Ok((csi, self.engine.lsi(&water)?)))
        {
            Ok((csi, lsi)) => {
                snapshot.csi = Some(csi);
                snapshot.lsi = Some(lsi);
                snapshot.balance_state = Some(WaterBalanceState::from_csi(csi));
            }
            Err(err) => {
                error!("Failed to calculate water balance: {}", err);
                snapshot
                    .errors
                    .push(format!("Water balance calculation failed: {err}"));
                return;
            }
        }

        let target_salt = if self.config.is_saltwater() {
            options.target_salt
        } else {
            readings.salt
        };
        let target = WaterChemistry::new(
            options.target_ph,
            temperature_f,
            options.target_ta,
            options.target_ch,
        )
            .with_free_chlorine(options.target_fc)
            .with_cyanuric_acid(options.target_cya)
            .with_salt(target_salt)
            .with_tds(readings.tds)
            .with_borates(options.target_borates);

        match self
            .engine
            .csi(&target)
            .and_then(|csi| Ok((csi, self.engine.lsi(&target)?)))
        {
            Ok((csi, lsi)) => {
                snapshot.target_csi = Some(csi);
                snapshot.target_lsi = Some(lsi);
                snapshot.target_balance_state = Some(WaterBalanceState::from_csi(csi));
            }
            Err(err) => {
                error!("Failed to calculate target water balance: {}", err);
                snapshot
                    .errors
                    .push(format!("Target water balance calculation failed: {err}"));
            }
        }
    }

    fn calculate_fc_ratio(&self, readings: &Readings, snapshot: &mut ChemistrySnapshot) {
        let Some(fc) = readings.fc else {
            return;
        };
        snapshot.free_chlorine = Some(fc);
        snapshot.cyanuric_acid = Some(readings.cya);
        if readings.cya > 0.0 {
            let ratio = fc / readings.cya * 100.0;
            let minimum = if self.config.is_saltwater() {
                MIN_FC_CYA_RATIO_SALTWATER
            } else {
                MIN_FC_CYA_RATIO
            };
            snapshot.fc_cya_ratio = Some(ratio);
            snapshot.fc_is_adequate = Some(ratio >= minimum);
        } else {
            snapshot.fc_is_adequate = Some(fc > 0.0);
        }
    }

    /// Request for one dosing category, `None` when its inputs are missing
    fn dose_request(
        &self,
        kind: DoseKind,
        readings: &Readings,
        options: &PoolOptions,
    ) -> Option<DoseRequest> {
        let pool_gallons = self.config.volume_gallons;
        let step = |current: f64, target: f64| Step {
            current,
            target,
            pool_gallons,
        };
        let request = match kind {
            DoseKind::Acid => DoseRequest::Ph(PhDose {
                current_ph: readings.ph?,
                target_ph: options.target_ph,
                pool_gallons,
                total_alkalinity: readings.ta?,
                temperature_f: readings.temperature_f.unwrap_or(DEFAULT_DOSE_TEMPERATURE_F),
                cyanuric_acid: readings.cya,
                borates: readings.borates,
                acid: options.acid_type.chemical(),
                base: options.ph_up_type.chemical(),
            }),
            DoseKind::Chlorine => DoseRequest::Chlorine {
                step: step(readings.fc?, options.target_fc),
                chemical: options.chlorine_type.chemical(),
            },
            DoseKind::Alkalinity => DoseRequest::Alkalinity(step(readings.ta?, options.target_ta)),
            DoseKind::Calcium => DoseRequest::Calcium(step(readings.ch?, options.target_ch)),
            DoseKind::Cya => DoseRequest::Cya(step(readings.cya, options.target_cya)),
            DoseKind::Salt => DoseRequest::Salt(step(readings.salt, options.target_salt)),
            DoseKind::Borates => DoseRequest::Borates(step(readings.borates, options.target_borates)),
        };
        Some(request)
    }

    fn calculate_doses(
        &self,
        readings: &Readings,
        options: &PoolOptions,
        snapshot: &mut ChemistrySnapshot,
    ) {
        for kind in DoseKind::ALL {
            if !options.dose_enabled(kind) || !kind.applies_to(self.config.pool_type) {
                continue;
            }
            let Some(request) = self.dose_request(kind, readings, options) else {
                continue;
            };
            match self.engine.dose(&request) {
                Ok(result) => {
                    snapshot.doses.insert(kind, result);
                }
                Err(err) => error!(dose = kind.key(), "Dose calculation failed: {}", err),
            }
        }
    }
}

impl std::fmt::Debug for PoolChemCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolChemCoordinator")
            .field("entry_id", &self.entry_id)
            .field("pool_name", &self.config.pool_name)
            .field("listening", &self.is_listening())
            .finish()
    }
}
