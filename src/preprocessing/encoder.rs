//! Feature encoding: booleans, dates and categorical columns to numbers

use super::profile::DtypeClass;
use crate::error::{Result, SwiftPredictError};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const TRUE_TOKENS: [&str; 2] = ["true", "yes"];
const FALSE_TOKENS: [&str; 2] = ["false", "no"];

/// Whether a text value reads as a boolean
pub fn is_boolean_text(value: &str) -> bool {
    boolean_text_value(value).is_some()
}

/// 1.0 / 0.0 for boolean-like text, case-insensitive and trimmed
pub fn boolean_text_value(value: &str) -> Option<f64> {
    let token = value.trim().to_lowercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Some(1.0)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Some(0.0)
    } else {
        None
    }
}

/// Resolution of a date-like column's integer representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    Days,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl DateUnit {
    pub fn of(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Date => Some(DateUnit::Days),
            DataType::Datetime(TimeUnit::Milliseconds, _) => Some(DateUnit::Milliseconds),
            DataType::Datetime(TimeUnit::Microseconds, _) => Some(DateUnit::Microseconds),
            DataType::Datetime(TimeUnit::Nanoseconds, _) => Some(DateUnit::Nanoseconds),
            _ => None,
        }
    }

    /// Parse an ISO date or datetime into this unit since the Unix epoch
    pub fn parse_text(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        let datetime = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        let utc = datetime.and_utc();
        match self {
            DateUnit::Days => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
                Some((datetime.date() - epoch).num_days())
            }
            DateUnit::Milliseconds => Some(utc.timestamp_millis()),
            DateUnit::Microseconds => Some(utc.timestamp_micros()),
            DateUnit::Nanoseconds => utc.timestamp_nanos_opt(),
        }
    }
}

/// One recorded encoding transform.
///
/// `position` is the column's index in the working schema at the moment the
/// step ran; replay checks it before applying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingStep {
    /// Boolean column cast to 1 / 0
    BooleanCast { column: String, position: usize },
    /// Date column replaced by its integer epoch value
    DateOrdinal {
        column: String,
        position: usize,
        unit: DateUnit,
    },
    /// Text column holding true/false/yes/no mapped to 1 / 0
    BooleanText { column: String, position: usize },
    /// Low-cardinality column expanded to indicators; the first sorted level is dropped
    OneHot {
        column: String,
        position: usize,
        levels: Vec<String>,
    },
    /// High-cardinality column replaced by training frequency counts
    Frequency {
        column: String,
        position: usize,
        counts: BTreeMap<String, f64>,
    },
}

impl EncodingStep {
    pub fn column(&self) -> &str {
        match self {
            EncodingStep::BooleanCast { column, .. }
            | EncodingStep::DateOrdinal { column, .. }
            | EncodingStep::BooleanText { column, .. }
            | EncodingStep::OneHot { column, .. }
            | EncodingStep::Frequency { column, .. } => column,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            EncodingStep::BooleanCast { position, .. }
            | EncodingStep::DateOrdinal { position, .. }
            | EncodingStep::BooleanText { position, .. }
            | EncodingStep::OneHot { position, .. }
            | EncodingStep::Frequency { position, .. } => *position,
        }
    }

    /// Names of the columns this step writes in place of its input column
    pub fn output_columns(&self) -> Vec<String> {
        match self {
            EncodingStep::OneHot { column, levels, .. } => levels
                .iter()
                .map(|level| one_hot_name(column, level))
                .collect(),
            other => vec![other.column().to_string()],
        }
    }

    /// Encode a single categorical cell into this step's output values
    pub fn encode_text(&self, value: Option<&str>) -> Vec<f64> {
        match self {
            EncodingStep::OneHot { levels, .. } => levels
                .iter()
                .map(|level| if value == Some(level.as_str()) { 1.0 } else { 0.0 })
                .collect(),
            EncodingStep::Frequency { counts, .. } => {
                vec![value.and_then(|v| counts.get(v).copied()).unwrap_or(0.0)]
            }
            EncodingStep::BooleanText { .. } => {
                vec![value.and_then(boolean_text_value).unwrap_or(0.0)]
            }
            _ => vec![0.0],
        }
    }

    fn apply(&self, series: &Series) -> Result<Vec<Column>> {
        match self {
            EncodingStep::BooleanCast { column, .. } => {
                let values: Vec<Option<f64>> = series
                    .bool()?
                    .into_iter()
                    .map(|v| v.map(|b| if b { 1.0 } else { 0.0 }))
                    .collect();
                Ok(vec![Series::new(column.as_str().into(), values).into()])
            }
            EncodingStep::DateOrdinal { column, .. } => {
                let physical = series.to_physical_repr().cast(&DataType::Int64)?;
                let values: Vec<Option<f64>> =
                    physical.i64()?.into_iter().map(|v| v.map(|x| x as f64)).collect();
                Ok(vec![Series::new(column.as_str().into(), values).into()])
            }
            EncodingStep::BooleanText { .. }
            | EncodingStep::OneHot { .. }
            | EncodingStep::Frequency { .. } => {
                let text = series.cast(&DataType::String)?;
                let encoded: Vec<Vec<f64>> = text.str()?.into_iter().map(|v| self.encode_text(v)).collect();
                let columns = self
                    .output_columns()
                    .into_iter()
                    .enumerate()
                    .map(|(j, name)| {
                        let values: Vec<f64> = encoded.iter().map(|row| row[j]).collect();
                        Series::new(name.into(), values).into()
                    })
                    .collect();
                Ok(columns)
            }
        }
    }
}

fn one_hot_name(column: &str, level: &str) -> String {
    format!("{}_{}", column, level)
}

/// Recorded encoding of a feature frame, replayable on new data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingState {
    /// Feature columns, in order, the encoder was fitted on
    pub input_columns: Vec<String>,
    /// Steps in the order they ran
    pub steps: Vec<EncodingStep>,
    /// Columns of the encoded frame
    pub output_columns: Vec<String>,
}

impl EncodingState {
    /// Replay the recorded steps on a frame with the fitted schema
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        if names != self.input_columns {
            return Err(SwiftPredictError::SchemaMismatch {
                expected: self.input_columns.join(", "),
                actual: names.join(", "),
            });
        }

        let mut steps = self.steps.iter().peekable();
        let mut out: Vec<Column> = Vec::with_capacity(self.output_columns.len());
        for column in df.get_columns() {
            match steps.peek() {
                Some(step) if step.column() == column.name().as_str() => {
                    if step.position() != out.len() {
                        return Err(SwiftPredictError::SchemaMismatch {
                            expected: format!("'{}' at position {}", step.column(), step.position()),
                            actual: format!("position {}", out.len()),
                        });
                    }
                    out.extend(step.apply(column.as_materialized_series())?);
                    steps.next();
                }
                _ => out.push(column.clone()),
            }
        }

        Ok(DataFrame::new(out)?)
    }
}

/// Fits an [`EncodingState`] on a feature frame
#[derive(Debug, Clone)]
pub struct Encoder {
    max_onehot_levels: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self { max_onehot_levels: 5 }
    }
}

impl Encoder {
    pub fn new(max_onehot_levels: usize) -> Self {
        Self { max_onehot_levels }
    }

    /// Decide a step per non-numeric column and encode the frame.
    ///
    /// The frame must not contain the target column.
    pub fn fit_transform(&self, df: &DataFrame) -> Result<(DataFrame, EncodingState)> {
        let mut state = EncodingState {
            input_columns: df.get_column_names().iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        let mut position = 0usize;
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            let step = match DtypeClass::of(series.dtype()) {
                DtypeClass::Numeric => None,
                DtypeClass::Boolean => Some(EncodingStep::BooleanCast { column: name, position }),
                DtypeClass::Date => {
                    let unit = DateUnit::of(series.dtype()).ok_or_else(|| {
                        SwiftPredictError::column_quality(name.as_str(), "unsupported date type")
                    })?;
                    Some(EncodingStep::DateOrdinal { column: name, position, unit })
                }
                DtypeClass::Categorical => Some(self.categorical_step(series, name, position)?),
            };

            match step {
                Some(step) => {
                    position += step.output_columns().len();
                    debug!(step = ?step, "Recorded encoding step");
                    state.steps.push(step);
                }
                None => position += 1,
            }
        }

        let encoded = state.transform(df)?;
        state.output_columns = encoded.get_column_names().iter().map(|s| s.to_string()).collect();
        Ok((encoded, state))
    }

    fn categorical_step(&self, series: &Series, column: String, position: usize) -> Result<EncodingStep> {
        let text = series.cast(&DataType::String)?;
        let values: Vec<&str> = text.str()?.into_iter().flatten().collect();

        if !values.is_empty() && values.iter().all(|v| is_boolean_text(v)) {
            return Ok(EncodingStep::BooleanText { column, position });
        }

        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for v in &values {
            *counts.entry(v.to_string()).or_insert(0.0) += 1.0;
        }

        if counts.len() <= self.max_onehot_levels {
            let levels = counts.into_keys().skip(1).collect();
            Ok(EncodingStep::OneHot { column, position, levels })
        } else {
            Ok(EncodingStep::Frequency { column, position, counts })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_f64(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_boolean_text_is_normalized() {
        let df = df!("member" => &["Yes", "no", " YES ", "No"]).unwrap();
        let (encoded, state) = Encoder::default().fit_transform(&df).unwrap();
        assert_eq!(state.steps.len(), 1);
        assert!(matches!(state.steps[0], EncodingStep::BooleanText { .. }));
        assert_eq!(column_f64(&encoded, "member"), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_drops_first_level_in_place() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "color" => &["red", "blue", "green", "blue"],
            "y" => &[5i64, 6, 7, 8]
        )
        .unwrap();

        let (encoded, state) = Encoder::default().fit_transform(&df).unwrap();
        assert_eq!(
            state.output_columns,
            vec!["x", "color_green", "color_red", "y"]
        );
        assert_eq!(column_f64(&encoded, "color_green"), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(column_f64(&encoded, "color_red"), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(state.steps[0].position(), 1);
    }

    #[test]
    fn test_five_levels_stay_one_hot() {
        let df = df!("grade" => &["a", "b", "c", "d", "e", "a", "c"]).unwrap();
        let (encoded, state) = Encoder::default().fit_transform(&df).unwrap();

        match &state.steps[0] {
            EncodingStep::OneHot { levels, .. } => assert_eq!(levels, &vec!["b", "c", "d", "e"]),
            other => panic!("expected one-hot, got {:?}", other),
        }
        assert_eq!(
            state.output_columns,
            vec!["grade_b", "grade_c", "grade_d", "grade_e"]
        );
        assert_eq!(encoded.width(), 4);
        assert_eq!(column_f64(&encoded, "grade_c"), vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_frequency_for_many_levels() {
        let df = df!("city" => &["a", "b", "c", "d", "e", "f", "a", "a"]).unwrap();
        let (encoded, state) = Encoder::default().fit_transform(&df).unwrap();
        assert!(matches!(state.steps[0], EncodingStep::Frequency { .. }));
        assert_eq!(
            column_f64(&encoded, "city"),
            vec![3.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 3.0]
        );
        assert_eq!(state.steps[0].encode_text(Some("unseen")), vec![0.0]);
    }

    #[test]
    fn test_bool_and_date_columns() {
        let when = Series::new("when".into(), &[0i32, 31, 365])
            .cast(&DataType::Date)
            .unwrap();
        let flag = Series::new("flag".into(), &[true, false, true]);
        let df = DataFrame::new(vec![flag.into(), when.into()]).unwrap();

        let (encoded, state) = Encoder::default().fit_transform(&df).unwrap();
        assert_eq!(column_f64(&encoded, "flag"), vec![1.0, 0.0, 1.0]);
        assert_eq!(column_f64(&encoded, "when"), vec![0.0, 31.0, 365.0]);
        assert!(matches!(
            state.steps[1],
            EncodingStep::DateOrdinal { unit: DateUnit::Days, position: 1, .. }
        ));
    }

    #[test]
    fn test_replay_on_new_frame() {
        let train = df!("color" => &["red", "blue", "green"]).unwrap();
        let (_, state) = Encoder::default().fit_transform(&train).unwrap();

        let new = df!("color" => &["green", "purple"]).unwrap();
        let encoded = state.transform(&new).unwrap();
        assert_eq!(column_f64(&encoded, "color_green"), vec![1.0, 0.0]);
        assert_eq!(column_f64(&encoded, "color_red"), vec![0.0, 0.0]);
    }

    #[test]
    fn test_replay_rejects_reordered_schema() {
        let train = df!("a" => &["x", "y"], "b" => &[1.0, 2.0]).unwrap();
        let (_, state) = Encoder::default().fit_transform(&train).unwrap();

        let reordered = df!("b" => &[1.0], "a" => &["x"]).unwrap();
        let err = state.transform(&reordered).unwrap_err();
        assert!(matches!(err, SwiftPredictError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_parse_date_text() {
        assert_eq!(DateUnit::Days.parse_text("1970-01-11"), Some(10));
        assert_eq!(DateUnit::Milliseconds.parse_text("1970-01-01 00:00:01"), Some(1000));
        assert_eq!(DateUnit::Days.parse_text("not a date"), None);
    }
}
