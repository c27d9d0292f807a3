//! Coordinator behaviour against a live state machine and event bus

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use poolchem::{
    ChemistryEngine, ConfigRecord, ConfigStore, DoseKind, DoseRequest, LibraryEngine,
    PoolChemCoordinator, PoolConfig, PoolOptions, WaterBalanceState,
};
use poolchem_chemistry::{ChemicalType, ChemistryError, DosingResult, Purpose, WaterChemistry};
use serde_json::{json, Value};
use tokio::sync::Notify;

#[tokio::test]
async fn test_balanced_pool_publishes_sensors() {
    let host = TestHost::new();
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;

    host.wait_for_state("sensor.backyard_water_balance", "balanced")
        .await;
    host.wait_for_state("sensor.backyard_fc_cya_ratio", "12.5").await;

    let coordinator = host.integration.coordinator(&entry_id).unwrap();
    assert!(coordinator.is_listening());
    let data = coordinator.data().unwrap();
    assert!(data.errors.is_empty(), "{:?}", data.errors);
    assert!((data.csi.unwrap() - -0.04).abs() < 0.05);
    assert_eq!(data.balance_state, Some(WaterBalanceState::Balanced));
    assert_eq!(data.fc_is_adequate, Some(true));

    let ratio = host.state("sensor.backyard_fc_cya_ratio").unwrap();
    assert_eq!(ratio.attributes["is_adequate"], json!(true));
    assert_eq!(ratio.attributes["cyanuric_acid"], json!(40.0));

    // FC 5 against target 5 is a zero dose, not an unavailable sensor
    host.wait_for_state("sensor.backyard_dose_chlorine", "0").await;
}

#[tokio::test]
async fn test_celsius_temperature_is_converted() {
    let host = TestHost::new();
    host.set_standard_readings();
    host.set_sensor("sensor.water_temp", "28.89", Some("°C"));
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;

    let coordinator = host.integration.coordinator(&entry_id).unwrap();
    let water = coordinator.data().unwrap().water.unwrap();
    assert!((water.temperature_f - 84.0).abs() < 0.1);
}

#[tokio::test]
async fn test_source_change_triggers_refresh() {
    let host = TestHost::new();
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;
    let coordinator = host.integration.coordinator(&entry_id).unwrap();
    let first = coordinator.data().unwrap().last_updated;

    host.set_sensor("sensor.pool_ph", "7.8", None);

    wait_until(|| {
        coordinator
            .data()
            .and_then(|d| d.water)
            .is_some_and(|w| w.ph == 7.8)
    })
    .await;
    assert!(coordinator.data().unwrap().last_updated >= first);
}

#[tokio::test]
async fn test_missing_ph_reports_and_keeps_going() {
    let host = TestHost::new();
    host.set_standard_readings();
    host.set_sensor("sensor.pool_ph", "unavailable", None);
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;

    let data = host.integration.coordinator(&entry_id).unwrap().data().unwrap();
    assert_eq!(data.errors, vec!["Missing required sensors: pH".to_string()]);
    assert!(data.csi.is_none());
    assert!(data.target_csi.is_none());
    assert!(data.dose(DoseKind::Acid).is_none());
    assert!(data.dose(DoseKind::Alkalinity).is_some());
    assert!((data.fc_cya_ratio.unwrap() - 12.5).abs() < 0.01);

    host.wait_for_state("sensor.backyard_csi", "unavailable").await;
    host.wait_for_state("sensor.backyard_water_balance", "unavailable")
        .await;
}

#[tokio::test]
async fn test_fc_adequacy_without_cya() {
    let host = TestHost::new();
    host.set_standard_readings();
    host.set_sensor("sensor.pool_cya", "0", Some("ppm"));
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;
    let coordinator = host.integration.coordinator(&entry_id).unwrap();

    let data = coordinator.data().unwrap();
    assert_eq!(data.fc_cya_ratio, None);
    assert_eq!(data.fc_is_adequate, Some(true));

    host.set_sensor("sensor.pool_fc", "0", Some("ppm"));
    wait_until(|| coordinator.data().unwrap().fc_is_adequate == Some(false)).await;
    host.wait_for_state("sensor.backyard_fc_cya_ratio", "unavailable")
        .await;
}

#[tokio::test]
async fn test_pool_without_sources_stays_idle() {
    let host = TestHost::new();
    let data = input(&[
        ("pool_name", json!("Backyard")),
        ("volume_gallons", json!(15000)),
    ]);
    let entry_id = host.add_pool(data, UserInput::new()).await;

    let coordinator = host.integration.coordinator(&entry_id).unwrap();
    assert!(!coordinator.is_listening());
    assert!(coordinator.data().is_none());
    assert_eq!(
        host.state_value("sensor.backyard_csi").as_deref(),
        Some("unavailable")
    );
}

/// Store whose first read blocks until released
struct GatedStore {
    reads: AtomicUsize,
    gate: Notify,
}

#[async_trait]
impl ConfigStore for GatedStore {
    async fn read(&self, _entry_id: &str) -> Option<ConfigRecord> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        Some(ConfigRecord::default())
    }

    async fn write_options(
        &self,
        _entry_id: &str,
        _options: HashMap<String, Value>,
    ) -> poolchem::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_requests_during_refresh_coalesce_into_one() {
    let host = TestHost::new();
    host.set_standard_readings();
    let store = Arc::new(GatedStore {
        reads: AtomicUsize::new(0),
        gate: Notify::new(),
    });
    let coordinator = Arc::new(PoolChemCoordinator::new(
        "entry",
        PoolConfig::from_data(&chlorine_pool()).unwrap(),
        PoolOptions::default(),
        store.clone(),
        host.states.clone(),
        Arc::new(LibraryEngine),
    ));

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_refresh().await }
    });
    wait_until(|| store.reads.load(Ordering::SeqCst) == 1).await;

    coordinator.request_refresh().await;
    coordinator.request_refresh().await;
    coordinator.request_refresh().await;
    assert!(coordinator.data().is_none());

    store.gate.notify_one();
    tokio_test::assert_ok!(first.await);

    assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    assert!(coordinator.data().is_some());
}

#[tokio::test]
async fn test_source_changes_during_refresh_coalesce_into_one() {
    let host = TestHost::new();
    host.set_standard_readings();
    let store = Arc::new(GatedStore {
        reads: AtomicUsize::new(0),
        gate: Notify::new(),
    });
    let coordinator = Arc::new(PoolChemCoordinator::new(
        "entry",
        PoolConfig::from_data(&chlorine_pool()).unwrap(),
        PoolOptions::default(),
        store.clone(),
        host.states.clone(),
        Arc::new(LibraryEngine),
    ));

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        let bus = host.bus.clone();
        async move { coordinator.start(bus.as_ref()).await }
    });
    wait_until(|| store.reads.load(Ordering::SeqCst) == 1 && coordinator.is_listening()).await;

    host.set_sensor("sensor.pool_ph", "7.6", None);
    host.set_sensor("sensor.pool_fc", "4.0", Some("ppm"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);

    store.gate.notify_one();
    tokio_test::assert_ok!(first.await);
    wait_until(|| store.reads.load(Ordering::SeqCst) == 2).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);

    let data = coordinator.data().unwrap();
    assert_eq!(data.water.unwrap().ph, 7.6);
    assert_eq!(data.water.unwrap().free_chlorine, 4.0);
    coordinator.shutdown();
}

/// Engine that panics on its first CSI calculation only
struct PanicOnceEngine {
    calls: AtomicUsize,
}

impl ChemistryEngine for PanicOnceEngine {
    fn csi(&self, water: &WaterChemistry) -> poolchem_chemistry::Result<f64> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("csi exploded");
        }
        LibraryEngine.csi(water)
    }

    fn lsi(&self, water: &WaterChemistry) -> poolchem_chemistry::Result<f64> {
        LibraryEngine.lsi(water)
    }

    fn dose(&self, request: &DoseRequest) -> poolchem_chemistry::Result<DosingResult> {
        LibraryEngine.dose(request)
    }
}

#[tokio::test]
async fn test_refresh_recovers_after_panic() {
    let host = TestHost::with_engine(Arc::new(PanicOnceEngine {
        calls: AtomicUsize::new(0),
    }));
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;
    let coordinator = host.integration.coordinator(&entry_id).unwrap();
    assert!(coordinator.data().is_none());

    host.set_sensor("sensor.pool_ph", "7.6", None);
    wait_until(|| coordinator.data().is_some_and(|d| d.csi.is_some())).await;
    assert_eq!(coordinator.data().unwrap().water.unwrap().ph, 7.6);
}

/// Library engine with one category or the indices broken
struct BrokenEngine {
    dose: Option<DoseKind>,
    indices: bool,
}

impl ChemistryEngine for BrokenEngine {
    fn csi(&self, water: &WaterChemistry) -> poolchem_chemistry::Result<f64> {
        if self.indices {
            return Err(ChemistryError::NoCarbonateAlkalinity(-5.0));
        }
        LibraryEngine.csi(water)
    }

    fn lsi(&self, water: &WaterChemistry) -> poolchem_chemistry::Result<f64> {
        LibraryEngine.lsi(water)
    }

    fn dose(&self, request: &DoseRequest) -> poolchem_chemistry::Result<DosingResult> {
        if Some(request.kind()) == self.dose {
            return Err(ChemistryError::WrongChemical {
                chemical: ChemicalType::BakingSoda,
                purpose: Purpose::RaiseChlorine,
            });
        }
        LibraryEngine.dose(request)
    }
}

#[tokio::test]
async fn test_failed_dose_does_not_affect_others() {
    let host = TestHost::with_engine(Arc::new(BrokenEngine {
        dose: Some(DoseKind::Chlorine),
        indices: false,
    }));
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;

    let data = host.integration.coordinator(&entry_id).unwrap().data().unwrap();
    assert!(data.errors.is_empty());
    assert!(data.csi.is_some());
    assert!(data.dose(DoseKind::Chlorine).is_none());
    for kind in [
        DoseKind::Acid,
        DoseKind::Alkalinity,
        DoseKind::Calcium,
        DoseKind::Cya,
    ] {
        assert!(data.dose(kind).is_some(), "{kind:?} missing");
    }
    host.wait_for_state("sensor.backyard_dose_chlorine", "unavailable")
        .await;
}

#[tokio::test]
async fn test_failed_balance_is_recorded() {
    let host = TestHost::with_engine(Arc::new(BrokenEngine {
        dose: None,
        indices: true,
    }));
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;

    let data = host.integration.coordinator(&entry_id).unwrap().data().unwrap();
    assert!(data.csi.is_none());
    assert!(data.lsi.is_none());
    assert!(data.balance_state.is_none());
    assert!(data.target_csi.is_none());
    assert_eq!(data.errors.len(), 1);
    assert!(data.errors[0].starts_with("Water balance calculation failed: "));
    // Ratio and doses are independent of the indices
    assert!(data.fc_cya_ratio.is_some());
    assert!(data.dose(DoseKind::Acid).is_some());
}

#[tokio::test]
async fn test_csi_bands_end_to_end() {
    let host = TestHost::new();
    host.set_standard_readings();
    let entry_id = host.add_pool(chlorine_pool(), UserInput::new()).await;
    let coordinator = host.integration.coordinator(&entry_id).unwrap();

    host.set_sensor("sensor.pool_ph", "7.0", None);
    host.wait_for_state("sensor.backyard_water_balance", "slightly_corrosive")
        .await;
    let data = coordinator.data().unwrap();
    assert_eq!(data.balance_state, Some(WaterBalanceState::SlightlyCorrosive));
    // Targets do not follow the readings
    assert_eq!(data.target_balance_state, Some(WaterBalanceState::Balanced));

    host.set_sensor("sensor.pool_ph", "8.4", None);
    host.wait_for_state("sensor.backyard_water_balance", "severely_scaling")
        .await;
}
