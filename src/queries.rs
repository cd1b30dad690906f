use std::path::Path;

use itertools::Itertools;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SLOW_LANE_DAYS;
use crate::error::PersistenceError;
use crate::writer::{
    COST_BY_DC, COST_BY_REGION, DC_UTILIZATION, FLOWS_VIEW, FLOW_ASSIGNMENTS,
    KPI_SUMMARY, UNMET_DEMAND,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Order::Asc => "Lowest",
            Order::Desc => "Highest",
        }
    }
}

/// The canonical questions the warehouse can answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Question {
    TotalCost,
    TransportCost,
    UnmetUnits,
    HighestUtilization,
    LowestUtilization,
    DcUtilization { dc_id: String },
    CostByRegion { order: Order, top: usize },
    CostByDc { order: Order, top: usize },
    RegionsServedBy { dc_id: String },
    RegionsForDc { dc_id: String, top: usize },
    SlowLanes { top: usize, min_days: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Tables the answer was read from.
    pub source: String,
}

impl Answer {
    fn new(text: impl Into<String>, source: &str) -> Self {
        Self {
            text: text.into(),
            source: source.to_string(),
        }
    }
}

pub fn open_warehouse(path: &Path) -> Result<Connection, PersistenceError> {
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?)
}

#[derive(Debug, Clone, Copy)]
enum Intent {
    TopSlowLanes,
    SlowLanes,
    TransportCost,
    UnmetUnits,
    HighestUtilization,
    LowestUtilization,
    RegionsServedBy,
    RegionsForDc,
    DcUtilization,
    CostByRegion,
    WhichRegion,
    CostByDc,
    TotalCost,
}

/// First match wins, so more specific phrases come first.
static ROUTES: Lazy<Vec<(Regex, Intent)>> = Lazy::new(|| {
    [
        (r"(?i)\btop\s*(?P<n>\d+)\s*slow lanes?\b", Intent::TopSlowLanes),
        (r"(?i)\bslow lanes?\b", Intent::SlowLanes),
        (r"(?i)\btransport(ation)? cost\b", Intent::TransportCost),
        (r"(?i)\bunmet\b", Intent::UnmetUnits),
        (r"(?i)\b(highest|most)\b.*\butili[sz](ation|ed)\b", Intent::HighestUtilization),
        (r"(?i)\b(lowest|least)\b.*\butili[sz](ation|ed)\b", Intent::LowestUtilization),
        (
            r"(?i)\b(regions|stores) served by\s+(?P<dc>[A-Z0-9_]+)",
            Intent::RegionsServedBy,
        ),
        (
            r"(?i)\blist (regions|stores)\b.*\b(?P<dc>[A-Z0-9_]+)\W*$",
            Intent::RegionsForDc,
        ),
        (
            r"(?i)\butili[sz]ation\b.*\b(?P<dc>[A-Z0-9_]+)\W*$",
            Intent::DcUtilization,
        ),
        (r"(?i)\bcost by region\b", Intent::CostByRegion),
        (r"(?i)\bwhich region\b.*\bcost", Intent::WhichRegion),
        (r"(?i)\bcost by dc\b", Intent::CostByDc),
        (r"(?i)\bcost\b", Intent::TotalCost),
    ]
    .into_iter()
    .map(|(pattern, intent)| {
        (Regex::new(pattern).expect("router pattern is valid"), intent)
    })
    .collect()
});

static TOP_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btop\s*(\d+)").expect("top-n pattern is valid"));

static ASCENDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(low|lowest|least|bottom|cheapest)\b")
        .expect("order pattern is valid")
});

/// Map a free-text question onto a canonical [`Question`].
pub fn route(question: &str) -> Option<Question> {
    let question = question.trim();
    ROUTES.iter().find_map(|(pattern, intent)| {
        let captures = pattern.captures(question)?;
        let routed = build(*intent, question, &captures);
        debug!("Routed '{question}' to {routed:?}");
        Some(routed)
    })
}

fn build(intent: Intent, question: &str, captures: &Captures) -> Question {
    let top = |default: usize| {
        TOP_N
            .captures(question)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(default)
    };
    let order = || {
        if ASCENDING.is_match(question) {
            Order::Asc
        } else {
            Order::Desc
        }
    };
    let dc_id = || {
        captures
            .name("dc")
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_default()
    };
    match intent {
        Intent::TopSlowLanes => Question::SlowLanes {
            top: captures["n"].parse().unwrap_or(5),
            min_days: DEFAULT_SLOW_LANE_DAYS,
        },
        Intent::SlowLanes => Question::SlowLanes {
            top: top(5),
            min_days: DEFAULT_SLOW_LANE_DAYS,
        },
        Intent::TransportCost => Question::TransportCost,
        Intent::UnmetUnits => Question::UnmetUnits,
        Intent::HighestUtilization => Question::HighestUtilization,
        Intent::LowestUtilization => Question::LowestUtilization,
        Intent::RegionsServedBy => Question::RegionsServedBy { dc_id: dc_id() },
        Intent::RegionsForDc => Question::RegionsForDc {
            dc_id: dc_id(),
            top: top(20),
        },
        Intent::DcUtilization => Question::DcUtilization { dc_id: dc_id() },
        Intent::CostByRegion => Question::CostByRegion {
            order: order(),
            top: top(3),
        },
        Intent::WhichRegion => Question::CostByRegion {
            order: order(),
            top: 1,
        },
        Intent::CostByDc => Question::CostByDc {
            order: order(),
            top: top(5),
        },
        Intent::TotalCost => Question::TotalCost,
    }
}

/// Answer `question` from the tables of the last committed run.
pub fn answer(conn: &Connection, question: &Question) -> Result<Answer, PersistenceError> {
    let answer = match question {
        Question::TotalCost => {
            let total = metric(conn, "total_cost")?.unwrap_or(0.0);
            let objective = metric(conn, "objective_value")?.unwrap_or(total);
            Answer::new(
                format!(
                    "Total cost: ${} (objective incl. unmet penalty ${}).",
                    thousands(total),
                    thousands(objective)
                ),
                KPI_SUMMARY,
            )
        }
        Question::TransportCost => {
            let transport = metric(conn, "transport_cost")?.unwrap_or(0.0);
            Answer::new(
                format!("Transport cost: ${}.", thousands(transport)),
                KPI_SUMMARY,
            )
        }
        Question::UnmetUnits => {
            let units: f64 = conn.query_row(
                &format!("SELECT COALESCE(SUM(unmet_units), 0.0) FROM {UNMET_DEMAND}"),
                [],
                |row| row.get(0),
            )?;
            let penalty = metric(conn, "penalty_cost")?.unwrap_or(0.0);
            Answer::new(
                format!(
                    "Unmet demand: {} units (penalty ${}).",
                    thousands(units),
                    thousands(penalty)
                ),
                &format!("{UNMET_DEMAND}, {KPI_SUMMARY}"),
            )
        }
        Question::HighestUtilization | Question::LowestUtilization => {
            let order = if question == &Question::HighestUtilization {
                Order::Desc
            } else {
                Order::Asc
            };
            let row = conn
                .query_row(
                    &format!(
                        "SELECT dc_id, utilization, outbound, capacity FROM {DC_UTILIZATION} \
                         ORDER BY utilization {}, dc_id ASC LIMIT 1",
                        order.sql()
                    ),
                    [],
                    utilization_row,
                )
                .optional()?;
            match row {
                Some(row) => Answer::new(
                    format!("{} utilization: {}.", order.label(), row.describe()),
                    DC_UTILIZATION,
                ),
                None => Answer::new("No utilization data.", DC_UTILIZATION),
            }
        }
        Question::DcUtilization { dc_id } => {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT dc_id, utilization, outbound, capacity FROM {DC_UTILIZATION} \
                         WHERE dc_id = ?1 LIMIT 1"
                    ),
                    params![dc_id],
                    utilization_row,
                )
                .optional()?;
            match row {
                Some(row) => Answer::new(
                    format!("Utilization of {}.", row.describe()),
                    DC_UTILIZATION,
                ),
                None => Answer::new(format!("Unknown DC '{dc_id}'."), DC_UTILIZATION),
            }
        }
        Question::CostByRegion { order, top } => {
            ranked_costs(conn, COST_BY_REGION, "region_id", *order, *top)?
        }
        Question::CostByDc { order, top } => {
            ranked_costs(conn, COST_BY_DC, "dc_id", *order, *top)?
        }
        Question::RegionsServedBy { dc_id } => {
            let served: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(DISTINCT region_id) FROM {FLOW_ASSIGNMENTS} \
                     WHERE dc_id = ?1 AND flow > 0"
                ),
                params![dc_id],
                |row| row.get(0),
            )?;
            Answer::new(
                format!("{dc_id} serves {served} region(s)."),
                FLOW_ASSIGNMENTS,
            )
        }
        Question::RegionsForDc { dc_id, top } => {
            let mut stmt = conn.prepare(&format!(
                "SELECT region_id, flow FROM {FLOW_ASSIGNMENTS} \
                 WHERE dc_id = ?1 AND flow > 0 ORDER BY flow DESC, region_id ASC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![dc_id, *top as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            if rows.is_empty() {
                Answer::new(format!("No regions found for {dc_id}."), FLOW_ASSIGNMENTS)
            } else {
                let parts = rows
                    .iter()
                    .map(|(region, flow)| format!("{region} ({}u)", thousands(*flow)))
                    .join("; ");
                Answer::new(
                    format!("Regions served by {dc_id}: {parts}."),
                    FLOW_ASSIGNMENTS,
                )
            }
        }
        Question::SlowLanes { top, min_days } => {
            let mut stmt = conn.prepare(&format!(
                "SELECT dc_id, region_id, service_time, flow FROM {FLOWS_VIEW} \
                 WHERE service_time > ?1 AND flow > 0 \
                 ORDER BY flow DESC, dc_id ASC, region_id ASC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![min_days, *top as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            if rows.is_empty() {
                Answer::new(
                    format!("No slow lanes (> {min_days} days) in the current solution."),
                    FLOWS_VIEW,
                )
            } else {
                let parts = rows
                    .iter()
                    .map(|(dc, region, days, flow)| {
                        format!("{dc}->{region} ({days:.1}d, {}u)", thousands(*flow))
                    })
                    .join("; ");
                Answer::new(format!("Top slow lanes: {parts}."), FLOWS_VIEW)
            }
        }
    };
    Ok(answer)
}

struct UtilizationRow {
    dc_id: String,
    utilization: f64,
    outbound: f64,
    capacity: f64,
}

impl UtilizationRow {
    fn describe(&self) -> String {
        format!(
            "{} at {:.1}% (assigned {} / capacity {})",
            self.dc_id,
            self.utilization * 100.0,
            thousands(self.outbound),
            thousands(self.capacity)
        )
    }
}

fn utilization_row(row: &rusqlite::Row) -> rusqlite::Result<UtilizationRow> {
    Ok(UtilizationRow {
        dc_id: row.get(0)?,
        utilization: row.get(1)?,
        outbound: row.get(2)?,
        capacity: row.get(3)?,
    })
}

fn metric(conn: &Connection, name: &str) -> rusqlite::Result<Option<f64>> {
    conn.query_row(
        &format!("SELECT value FROM {KPI_SUMMARY} WHERE metric = ?1 LIMIT 1"),
        params![name],
        |row| row.get(0),
    )
    .optional()
}

fn ranked_costs(
    conn: &Connection,
    table: &str,
    key: &str,
    order: Order,
    top: usize,
) -> Result<Answer, PersistenceError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {key}, flow_cost FROM {table} ORDER BY flow_cost {}, {key} ASC LIMIT ?1",
        order.sql()
    ))?;
    let rows = stmt
        .query_map(params![top as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Ok(Answer::new("No cost data.", table));
    }
    let parts = rows
        .iter()
        .map(|(id, cost)| format!("{id}: ${}", thousands(*cost)))
        .join("; ");
    let subject = if table == COST_BY_DC { "DC" } else { "regional" };
    Ok(Answer::new(
        format!("{} {subject} transport cost: {parts}.", order.label()),
        table,
    ))
}

/// Round to whole units and group digits in threes.
pub fn thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let digits = rounded.chars().collect_vec();
    let grouped = digits
        .rchunks(3)
        .rev()
        .map(|chunk| chunk.iter().collect::<String>())
        .join(",");
    if value < 0.0 && grouped != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}
