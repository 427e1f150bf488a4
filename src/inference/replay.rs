//! Per-cell replay of recorded encoding steps

use super::FeatureValue;
use crate::error::{Result, SwiftPredictError};
use crate::preprocessing::{boolean_text_value, EncodingStep};

fn mismatch(column: &str, expected: &str, value: &FeatureValue) -> SwiftPredictError {
    SwiftPredictError::SchemaMismatch {
        expected: format!("{} for column '{}'", expected, column),
        actual: format!("{:?}", value),
    }
}

fn missing(column: &str) -> SwiftPredictError {
    SwiftPredictError::column_quality(column, "missing value in inference row")
}

/// Pass a column no step touched straight through as a number
pub(crate) fn numeric_cell(column: &str, value: &FeatureValue) -> Result<f64> {
    match value {
        FeatureValue::Int(v) => Ok(*v as f64),
        FeatureValue::Float(v) if v.is_nan() => Err(missing(column)),
        FeatureValue::Float(v) => Ok(*v),
        FeatureValue::Null => Err(missing(column)),
        other => Err(mismatch(column, "numeric value", other)),
    }
}

/// Output values of one step applied to one raw cell
pub(crate) fn encode_cell(step: &EncodingStep, value: &FeatureValue) -> Result<Vec<f64>> {
    let column = step.column();
    match step {
        EncodingStep::BooleanCast { .. } => match value {
            FeatureValue::Bool(b) => Ok(vec![if *b { 1.0 } else { 0.0 }]),
            FeatureValue::Text(t) => boolean_text_value(t)
                .map(|v| vec![v])
                .ok_or_else(|| mismatch(column, "boolean value", value)),
            FeatureValue::Null => Err(missing(column)),
            other => Err(mismatch(column, "boolean value", other)),
        },
        EncodingStep::DateOrdinal { unit, .. } => match value {
            FeatureValue::Text(t) => unit
                .parse_text(t)
                .map(|v| vec![v as f64])
                .ok_or_else(|| mismatch(column, "ISO date", value)),
            FeatureValue::Int(v) => Ok(vec![*v as f64]),
            FeatureValue::Null => Err(missing(column)),
            other => Err(mismatch(column, "ISO date", other)),
        },
        EncodingStep::BooleanText { .. } | EncodingStep::OneHot { .. } | EncodingStep::Frequency { .. } => {
            let text = value.as_text();
            Ok(step.encode_text(text.as_deref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::DateUnit;

    #[test]
    fn test_date_cells_accept_text_and_ordinals() {
        let step = EncodingStep::DateOrdinal {
            column: "when".to_string(),
            position: 0,
            unit: DateUnit::Days,
        };
        assert_eq!(encode_cell(&step, &FeatureValue::Text("1970-01-03".into())).unwrap(), vec![2.0]);
        assert_eq!(encode_cell(&step, &FeatureValue::Int(7)).unwrap(), vec![7.0]);
        assert!(matches!(
            encode_cell(&step, &FeatureValue::Bool(true)),
            Err(SwiftPredictError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_numeric_cells() {
        assert_eq!(numeric_cell("x", &FeatureValue::Int(3)).unwrap(), 3.0);
        assert!(matches!(
            numeric_cell("x", &FeatureValue::Null),
            Err(SwiftPredictError::DataQuality { .. })
        ));
        assert!(numeric_cell("x", &FeatureValue::Text("3".into())).is_err());
    }
}
