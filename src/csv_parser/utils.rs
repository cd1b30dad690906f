use std::{fs, path::Path};

use itertools::Itertools;
use polars::prelude::*;

pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    let present = df.get_column_names();
    required
        .iter()
        .filter(|column| !present.contains(*column))
        .map(|column| column.to_string())
        .collect_vec()
}

/// Column values as owned strings, whatever dtype the reader produced.
pub fn string_column(
    df: &DataFrame,
    column_name: &str,
) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(column_name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect_vec();
    Ok(values)
}

pub fn string_columns(
    df: &DataFrame,
    column_names: &[&str],
) -> PolarsResult<Vec<Vec<Option<String>>>> {
    column_names
        .iter()
        .map(|name| string_column(df, name))
        .collect()
}

pub fn f64_column(df: &DataFrame, column_name: &str) -> PolarsResult<Vec<f64>> {
    let series = df.column(column_name)?.cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(0.0))
        .collect_vec();
    Ok(values)
}

pub fn df_to_csv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(df)?;
    Ok(())
}
