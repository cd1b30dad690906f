use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};

use crate::cleaner::normalize_id;
use crate::config::ScenarioConfig;
use crate::datastructures::*;
use crate::error::{DataValidationError, Table, ValidationIssue};

pub fn validate(scenario: &ScenarioConfig) -> Result<(), DataValidationError> {
    let mut issues = Vec::new();
    let mut check_mult = |name: String, value: f64| {
        if !value.is_finite() || value < 0.0 {
            issues.push(ValidationIssue {
                table: Table::Scenario,
                row: None,
                column: Some(name),
                message: format!(
                    "multiplier must be finite and non-negative, got {value}"
                ),
            });
        }
    };
    check_mult("demand_scale".into(), scenario.demand_scale);
    for (region, mult) in &scenario.region_demand_mult {
        check_mult(format!("region_demand_mult.{region}"), *mult);
    }
    for (dc, mult) in &scenario.dc_capacity_mult {
        check_mult(format!("dc_capacity_mult.{dc}"), *mult);
    }
    for (dc, delta) in &scenario.dc_capacity_delta {
        if !delta.is_finite() {
            issues.push(ValidationIssue {
                table: Table::Scenario,
                row: None,
                column: Some(format!("dc_capacity_delta.{dc}")),
                message: format!("delta must be finite, got {delta}"),
            });
        }
    }
    for (lever, keys) in [
        ("region_demand_mult", &scenario.region_demand_mult),
        ("dc_capacity_mult", &scenario.dc_capacity_mult),
        ("dc_capacity_delta", &scenario.dc_capacity_delta),
    ] {
        issues.extend(key_collisions(lever, keys));
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(DataValidationError::new(issues))
    }
}

/// Keys of one lever that normalize to an id an earlier key already took.
fn key_collisions(lever: &str, keys: &BTreeMap<String, f64>) -> Vec<ValidationIssue> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut issues = Vec::new();
    for key in keys.keys() {
        let id = normalize_id(key);
        match seen.get(&id) {
            Some(first) => issues.push(ValidationIssue {
                table: Table::Scenario,
                row: None,
                column: Some(format!("{lever}.{key}")),
                message: format!("key collides with {first:?}, both name {id}"),
            }),
            None => {
                seen.insert(id, key);
            }
        }
    }
    issues
}

/// Apply the scenario levers to a copy of the cleaned tables.
///
/// Demand becomes `demand * demand_scale * region multiplier`, capacity
/// becomes `capacity * dc multiplier + dc delta` floored at zero. Lever keys
/// are matched after the same id normalization the cleaner applies.
pub fn apply(
    data: &CleanedData,
    scenario: &ScenarioConfig,
) -> Result<CleanedData, DataValidationError> {
    validate(scenario)?;
    if scenario.is_baseline() {
        return Ok(data.clone());
    }
    let region_mult = scenario
        .region_demand_mult
        .iter()
        .map(|(k, v)| (normalize_id(k), *v))
        .collect::<Vec<_>>();
    let dc_mult = scenario
        .dc_capacity_mult
        .iter()
        .map(|(k, v)| (normalize_id(k), *v))
        .collect::<Vec<_>>();
    let dc_delta = scenario
        .dc_capacity_delta
        .iter()
        .map(|(k, v)| (normalize_id(k), *v))
        .collect::<Vec<_>>();

    warn_unknown(
        "region_demand_mult",
        region_mult.iter().map(|(k, _)| k.as_str()),
        data.demand.iter().map(|d| d.region_id.as_str()).collect(),
    );
    let dc_ids: BTreeSet<&str> =
        data.capacity.iter().map(|c| c.dc_id.as_str()).collect();
    warn_unknown(
        "dc_capacity_mult",
        dc_mult.iter().map(|(k, _)| k.as_str()),
        dc_ids.clone(),
    );
    warn_unknown(
        "dc_capacity_delta",
        dc_delta.iter().map(|(k, _)| k.as_str()),
        dc_ids,
    );

    let lookup = |levers: &[(String, f64)], id: &str| {
        levers.iter().find(|(k, _)| k == id).map(|(_, v)| *v)
    };
    let demand = data
        .demand
        .iter()
        .map(|d| {
            let mult = lookup(&region_mult, &d.region_id).unwrap_or(1.0);
            DemandRecord::new(
                d.region_id.clone(),
                d.demand * scenario.demand_scale * mult,
            )
        })
        .collect();
    let capacity = data
        .capacity
        .iter()
        .map(|c| {
            let mult = lookup(&dc_mult, &c.dc_id).unwrap_or(1.0);
            let delta = lookup(&dc_delta, &c.dc_id).unwrap_or(0.0);
            CapacityRecord::new(
                c.dc_id.clone(),
                (c.capacity * mult + delta).max(0.0),
            )
        })
        .collect();
    let adjusted = CleanedData {
        demand,
        capacity,
        lanes: data.lanes.clone(),
    };
    info!(
        "Scenario applied: demand {} -> {}, capacity {} -> {}",
        data.total_demand(),
        adjusted.total_demand(),
        data.total_capacity(),
        adjusted.total_capacity()
    );
    Ok(adjusted)
}

fn warn_unknown<'a>(
    lever: &str,
    keys: impl Iterator<Item = &'a str>,
    known: BTreeSet<&str>,
) {
    for key in keys.filter(|k| !known.contains(k)) {
        warn!("Scenario lever {lever} names unknown id {key}, ignoring it");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn data() -> CleanedData {
        CleanedData {
            demand: vec![
                DemandRecord::new("SOUTHEAST", 100.0),
                DemandRecord::new("WEST", 50.0),
            ],
            capacity: vec![
                CapacityRecord::new("DC1", 200.0),
                CapacityRecord::new("DC2", 80.0),
            ],
            lanes: vec![LaneCost::new("DC1", "WEST", 2.0, 1.0)],
        }
    }

    #[test]
    fn test_baseline_is_identity() {
        let data = data();
        assert_eq!(apply(&data, &ScenarioConfig::default()).unwrap(), data);
    }

    #[test]
    fn test_levers() {
        let scenario = ScenarioConfig {
            demand_scale: 2.0,
            region_demand_mult: BTreeMap::from([("southeast".into(), 1.1)]),
            dc_capacity_mult: BTreeMap::from([("DC1".into(), 0.5)]),
            dc_capacity_delta: BTreeMap::from([
                ("DC1".into(), 10.0),
                ("dc2".into(), -100.0),
            ]),
        };
        let adjusted = apply(&data(), &scenario).unwrap();
        assert!((adjusted.demand[0].demand - 220.0).abs() < 1e-9);
        assert!((adjusted.demand[1].demand - 100.0).abs() < 1e-9);
        assert_eq!(adjusted.capacity[0].capacity, 110.0);
        assert_eq!(adjusted.capacity[1].capacity, 0.0);
        assert_eq!(adjusted.lanes, data().lanes);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let scenario = ScenarioConfig {
            dc_capacity_mult: BTreeMap::from([("DC9".into(), 0.0)]),
            ..ScenarioConfig::default()
        };
        assert_eq!(apply(&data(), &scenario).unwrap(), data());
    }

    #[test]
    fn test_negative_multiplier_is_rejected() {
        let scenario = ScenarioConfig {
            region_demand_mult: BTreeMap::from([("WEST".into(), -1.0)]),
            demand_scale: f64::NAN,
            ..ScenarioConfig::default()
        };
        let err = apply(&data(), &scenario).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.issues.iter().all(|i| i.table == Table::Scenario));
    }

    #[test]
    fn test_keys_differing_by_case_are_rejected() {
        let scenario = ScenarioConfig {
            dc_capacity_mult: BTreeMap::from([
                ("DC1".into(), 0.5),
                ("dc1".into(), 2.0),
            ]),
            region_demand_mult: BTreeMap::from([
                (" west".into(), 1.5),
                ("West".into(), 1.5),
                ("SOUTHEAST".into(), 1.1),
            ]),
            ..ScenarioConfig::default()
        };
        let err = apply(&data(), &scenario).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.issues.iter().all(|i| i.table == Table::Scenario));
        assert_eq!(
            err.issues[1].column.as_deref(),
            Some("dc_capacity_mult.dc1")
        );
        assert!(err.issues[1].message.contains("\"DC1\""));
    }
}
