use crate::datastructures::*;

/// Demand A:100, B:50 served by a single DC with lanes costing 5 and 8.
pub fn two_region_data(capacity: f64) -> CleanedData {
    CleanedData {
        demand: vec![DemandRecord::new("A", 100.0), DemandRecord::new("B", 50.0)],
        capacity: vec![CapacityRecord::new("DC1", capacity)],
        lanes: vec![
            LaneCost::new("DC1", "A", 5.0, 1.0),
            LaneCost::new("DC1", "B", 8.0, 3.0),
        ],
    }
}

/// Same network as `data/test/multi`.
pub fn multi_dc_data() -> CleanedData {
    CleanedData {
        demand: vec![
            DemandRecord::new("NORTH", 400.0),
            DemandRecord::new("SOUTH", 300.0),
            DemandRecord::new("EAST", 250.0),
            DemandRecord::new("WEST", 150.0),
        ],
        capacity: vec![
            CapacityRecord::new("DC_A", 500.0),
            CapacityRecord::new("DC_B", 400.0),
            CapacityRecord::new("DC_IDLE", 0.0),
        ],
        lanes: vec![
            LaneCost::new("DC_A", "NORTH", 2.0, 1.0),
            LaneCost::new("DC_A", "SOUTH", 4.0, 2.5),
            LaneCost::new("DC_A", "EAST", 3.0, 1.5),
            LaneCost::new("DC_B", "SOUTH", 1.5, 1.0),
            LaneCost::new("DC_B", "EAST", 2.5, 2.0),
            LaneCost::new("DC_B", "WEST", 3.5, 3.0),
            LaneCost::new("DC_IDLE", "NORTH", 0.5, 1.0),
            LaneCost::new("DC_IDLE", "WEST", 0.5, 1.0),
        ],
    }
}

pub fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual}"
    );
}

pub fn flow_between(solution: &FlowSolution, dc: &str, region: &str) -> f64 {
    solution
        .flows
        .iter()
        .filter(|f| f.dc_id == dc && f.region_id == region)
        .map(|f| f.flow)
        .sum()
}

pub fn unmet_of(solution: &FlowSolution, region: &str) -> f64 {
    solution
        .unmet
        .iter()
        .filter(|(r, _)| r == region)
        .map(|(_, u)| *u)
        .sum()
}

pub fn total_unmet(solution: &FlowSolution) -> f64 {
    solution.unmet.iter().map(|(_, u)| u).sum()
}
