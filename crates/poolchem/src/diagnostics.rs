//! Diagnostics dump for a pool entry

use poolchem_config_entries::ConfigEntry;
use serde_json::{json, Map, Value};

use crate::coordinator::PoolChemCoordinator;
use crate::entity::DeviceInfo;
use crate::types::{Choice, TargetField};

const REDACTED: &str = "**REDACTED**";
const TO_REDACT: [&str; 2] = ["entry_id", "unique_id"];

/// Replace every value under a redacted key, at any depth
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if TO_REDACT.contains(&key.as_str()) {
                        (key, json!(REDACTED))
                    } else {
                        (key, redact(value))
                    }
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

pub fn config_entry_diagnostics(entry: &ConfigEntry, coordinator: &PoolChemCoordinator) -> Value {
    let config = coordinator.config();
    let options = coordinator.options();
    let device = DeviceInfo::for_pool(&entry.entry_id, config);
    let targets: Map<String, Value> = TargetField::ALL
        .into_iter()
        .map(|field| {
            let name = field.key().trim_start_matches("target_").to_string();
            (name, json!(options.target(field)))
        })
        .collect();

    let data = coordinator.data().map(|data| {
        let doses: Map<String, Value> = data
            .doses
            .iter()
            .map(|(kind, dose)| (kind.key().to_string(), json!(dose)))
            .collect();
        json!({
            "last_updated": data.last_updated.to_rfc3339(),
            "errors": data.errors,
            "csi": data.csi,
            "lsi": data.lsi,
            "balance_state": data.balance_state.map(|s| s.as_str()),
            "target_csi": data.target_csi,
            "target_lsi": data.target_lsi,
            "target_balance_state": data.target_balance_state.map(|s| s.as_str()),
            "fc_cya_ratio": data.fc_cya_ratio,
            "fc_is_adequate": data.fc_is_adequate,
            "water": data.water,
            "doses": doses,
        })
    });

    redact(json!({
        "config_entry": {
            "entry_id": entry.entry_id,
            "version": entry.version,
            "minor_version": entry.minor_version,
            "domain": entry.domain,
            "title": entry.title,
            "unique_id": entry.unique_id,
            "data": entry.data,
            "options": entry.options,
        },
        "coordinator": {
            "pool_name": config.pool_name,
            "pool_volume": config.volume_gallons,
            "pool_type": config.pool_type.value(),
            "is_saltwater": config.is_saltwater(),
            "listening": coordinator.is_listening(),
            "targets": targets,
        },
        "device": {
            "name": device.name,
            "manufacturer": device.manufacturer,
            "model": device.model,
            "sw_version": device.sw_version,
        },
        "data": data,
    }))
}
