//! Conversions between polars frames and ndarray matrices

use crate::error::{MedflowError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Whether a column holds plain numbers
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| MedflowError::FeatureNotFound(name.to_string()))
}

/// Numeric values of a column; nulls and NaN are both `None`
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?;
    if !is_numeric(series.dtype()) {
        return Err(MedflowError::NonNumeric(format!(
            "column '{}' is {}",
            name,
            series.dtype()
        )));
    }
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// String view of a column, whatever its type
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?;
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Dense vector of a fully populated numeric column
pub fn to_vector(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let values = numeric_values(df, name)?;
    values
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                MedflowError::DataError(format!("column '{}' still has missing values", name))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// Row-major matrix of the given columns, in order
pub fn to_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n = df.height();
    let mut x = Array2::zeros((n, columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let col = to_vector(df, name)?;
        x.column_mut(j).assign(&col);
    }
    Ok(x)
}

/// Build a frame of `Float64` columns from named vectors
pub fn frame_from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<DataFrame> {
    let cols = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    Ok(DataFrame::new(cols)?)
}

/// Names of all columns in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_treat_nan_as_missing() {
        let df = df!("x" => &[Some(1.0), None, Some(f64::NAN)]).unwrap();
        assert_eq!(numeric_values(&df, "x").unwrap(), vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_numeric_values_reject_strings() {
        let df = df!("s" => &["a", "b"]).unwrap();
        let err = numeric_values(&df, "s").unwrap_err();
        assert!(matches!(err, MedflowError::NonNumeric(_)));
        assert!(err.to_string().starts_with("Non-numeric data: column 's' is "));
        assert!(matches!(
            numeric_values(&df, "missing"),
            Err(MedflowError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_to_matrix_order_and_ints() {
        let df = df!(
            "a" => &[1.0, 2.0],
            "b" => &[3i32, 4]
        )
        .unwrap();
        let x = to_matrix(&df, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(x.shape(), &[2, 2]);
        assert_eq!(x[[0, 0]], 3.0);
        assert_eq!(x[[1, 1]], 2.0);
    }

    #[test]
    fn test_string_values_from_ints() {
        let df = df!("d" => &[Some(3i64), None]).unwrap();
        assert_eq!(
            string_values(&df, "d").unwrap(),
            vec![Some("3".to_string()), None]
        );
    }
}
