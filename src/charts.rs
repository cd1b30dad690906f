use std::path::Path;

use itertools::Itertools;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use polars::prelude::{DataFrame, PolarsResult};

use crate::csv_parser::{f64_column, string_column};
use crate::error::PersistenceError;

pub const DC_UTILIZATION_CHART: &str = "dc_utilization.svg";
pub const COST_PER_DC_CHART: &str = "cost_per_dc.svg";
pub const COST_BY_REGION_CHART: &str = "cost_by_region.svg";
pub const DEMAND_HISTOGRAM: &str = "demand_hist.svg";

const SIZE: (u32, u32) = (960, 540);
const DEMAND_BINS: usize = 20;
const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);

/// A bar chart with one labelled bar per category.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub file_name: &'static str,
    pub caption: String,
    pub x_desc: String,
    pub y_desc: String,
    pub bars: Vec<(String, f64)>,
}

impl Chart {
    pub fn bars(
        file_name: &'static str,
        caption: &str,
        x_desc: &str,
        y_desc: &str,
        bars: Vec<(String, f64)>,
    ) -> Self {
        Self {
            file_name,
            caption: caption.to_string(),
            x_desc: x_desc.to_string(),
            y_desc: y_desc.to_string(),
            bars,
        }
    }

    /// Render as SVG to `path`.
    pub fn render(&self, path: &Path) -> Result<(), PersistenceError> {
        self.draw(path)
            .map_err(|e| PersistenceError::Chart(format!("{}: {e}", self.file_name)))
    }

    fn draw(&self, path: &Path) -> Result<(), DrawingAreaErrorKind<std::io::Error>> {
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let top = self.bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
        let y_max = if top > 0.0 { top * 1.1 } else { 1.0 };
        let slots = self.bars.len().max(1);

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.caption, ("sans-serif", 22).into_font())
            .margin(12)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d((0..slots).into_segmented(), 0.0..y_max)?;
        let label = |x: &SegmentValue<usize>| match x {
            SegmentValue::CenterOf(i) => self
                .bars
                .get(*i)
                .map(|(name, _)| name.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(slots)
            .x_label_formatter(&label)
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .draw()?;
        chart.draw_series(self.bars.iter().enumerate().map(|(i, (_, value))| {
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), *value),
                ],
                BAR_COLOR.filled(),
            );
            bar.set_margin(0, 0, 4, 4);
            bar
        }))?;
        root.present()?;
        Ok(())
    }
}

/// The four charts written with every run, from the persisted frames.
pub fn output_charts(
    utilization: &DataFrame,
    cost_by_dc: &DataFrame,
    cost_by_region: &DataFrame,
    demand: &DataFrame,
) -> PolarsResult<Vec<Chart>> {
    let mut utilization_pct = labelled(utilization, "dc_id", "utilization")?;
    for (_, value) in &mut utilization_pct {
        *value *= 100.0;
    }
    Ok(vec![
        Chart::bars(
            DC_UTILIZATION_CHART,
            "DC utilization",
            "DC",
            "Utilization %",
            utilization_pct,
        ),
        Chart::bars(
            COST_PER_DC_CHART,
            "Transport cost per DC",
            "DC",
            "Cost",
            labelled(cost_by_dc, "dc_id", "flow_cost")?,
        ),
        Chart::bars(
            COST_BY_REGION_CHART,
            "Transport cost by region",
            "Region",
            "Cost",
            labelled(cost_by_region, "region_id", "flow_cost")?,
        ),
        Chart::bars(
            DEMAND_HISTOGRAM,
            "Distribution of regional demand",
            "Units (bin start)",
            "Regions",
            histogram(&f64_column(demand, "demand")?, DEMAND_BINS),
        ),
    ])
}

fn labelled(
    frame: &DataFrame,
    label_column: &str,
    value_column: &str,
) -> PolarsResult<Vec<(String, f64)>> {
    let labels = string_column(frame, label_column)?;
    let values = f64_column(frame, value_column)?;
    Ok(labels
        .into_iter()
        .map(Option::unwrap_or_default)
        .zip(values)
        .collect_vec())
}

/// Equal-width bins over `[min, max]`, labelled by their lower edge.
fn histogram(values: &[f64], bins: usize) -> Vec<(String, f64)> {
    if values.is_empty() || bins == 0 {
        return vec![];
    }
    let (low, high) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let width = if high > low {
        (high - low) / bins as f64
    } else {
        1.0
    };
    let mut counts = vec![0_usize; bins];
    for &value in values {
        let bin = (((value - low) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (format!("{:.0}", low + width * i as f64), count as f64))
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use polars::df;
    use polars::prelude::NamedFrom;

    use super::*;

    #[test]
    fn test_histogram_bins() {
        let bins = histogram(&[0.0, 10.0, 10.0, 95.0, 100.0], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0], ("0".to_string(), 1.0));
        assert_eq!(bins[1], ("10".to_string(), 2.0));
        // the maximum falls into the last bin
        assert_eq!(bins[9], ("90".to_string(), 2.0));
        assert_eq!(bins.iter().map(|(_, n)| n).sum::<f64>(), 5.0);
    }

    #[test]
    fn test_histogram_of_equal_values() {
        let bins = histogram(&[40.0, 40.0], 4);
        assert_eq!(bins[0].1, 2.0);
        assert!(histogram(&[], 4).is_empty());
    }

    #[test]
    fn test_output_charts() {
        let utilization = df! {
            "dc_id" => ["DC1", "DC2"],
            "capacity" => [100.0, 50.0],
            "outbound" => [80.0, 0.0],
            "utilization" => [0.8, 0.0],
        }
        .unwrap();
        let cost_by_dc = df! {
            "dc_id" => ["DC1"],
            "flow_cost" => [400.0],
        }
        .unwrap();
        let cost_by_region = df! {
            "region_id" => ["A", "B"],
            "flow_cost" => [300.0, 100.0],
        }
        .unwrap();
        let demand = df! {
            "region_id" => ["A", "B"],
            "demand" => [60.0, 20.0],
        }
        .unwrap();
        let charts =
            output_charts(&utilization, &cost_by_dc, &cost_by_region, &demand)
                .unwrap();
        let names = charts.iter().map(|c| c.file_name).collect_vec();
        assert_eq!(
            names,
            vec![
                "dc_utilization.svg",
                "cost_per_dc.svg",
                "cost_by_region.svg",
                "demand_hist.svg"
            ]
        );
        assert_eq!(charts[0].bars[0], ("DC1".to_string(), 80.0));
        assert_eq!(charts[2].bars.len(), 2);
        assert_eq!(charts[3].bars.len(), DEMAND_BINS);
    }

    #[test]
    fn test_render_writes_labelled_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost_per_dc.svg");
        let chart = Chart::bars(
            COST_PER_DC_CHART,
            "Transport cost per DC",
            "DC",
            "Cost",
            vec![("DC_PERRIS".into(), 7_200.0), ("DC_TROY".into(), 6_000.0)],
        );
        chart.render(&path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Transport cost per DC"));
        assert!(svg.contains("DC_PERRIS"));
    }

    #[test]
    fn test_render_empty_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost_by_region.svg");
        Chart::bars(COST_BY_REGION_CHART, "Empty", "Region", "Cost", vec![])
            .render(&path)
            .unwrap();
        assert!(path.exists());
    }
}
