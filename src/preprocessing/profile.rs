//! Column dtype profiling

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Dtype class a column belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtypeClass {
    Categorical,
    Numeric,
    Date,
    Boolean,
}

impl DtypeClass {
    /// Classify a declared polars dtype. Values are never sampled.
    pub fn of(dtype: &DataType) -> Self {
        if is_numeric_dtype(dtype) {
            DtypeClass::Numeric
        } else if is_date_dtype(dtype) {
            DtypeClass::Date
        } else if matches!(dtype, DataType::Boolean) {
            DtypeClass::Boolean
        } else {
            DtypeClass::Categorical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DtypeClass::Categorical => "categorical",
            DtypeClass::Numeric => "numeric",
            DtypeClass::Date => "date",
            DtypeClass::Boolean => "boolean",
        }
    }
}

/// Integer or floating point dtype
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || is_float_dtype(dtype)
}

pub(crate) fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

pub(crate) fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

pub(crate) fn is_date_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Date | DataType::Datetime(_, _))
}

/// Column names grouped by dtype class, in frame order.
///
/// Must be recomputed whenever columns are added or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub categorical: Vec<String>,
    pub numeric: Vec<String>,
    pub date: Vec<String>,
    pub boolean: Vec<String>,
}

impl ColumnProfile {
    /// Profile every column of a frame
    pub fn from_frame(df: &DataFrame) -> Self {
        let mut profile = Self::default();
        for column in df.get_columns() {
            let name = column.name().to_string();
            match DtypeClass::of(column.dtype()) {
                DtypeClass::Categorical => profile.categorical.push(name),
                DtypeClass::Numeric => profile.numeric.push(name),
                DtypeClass::Date => profile.date.push(name),
                DtypeClass::Boolean => profile.boolean.push(name),
            }
        }
        profile
    }

    /// Columns of one class
    pub fn columns(&self, class: DtypeClass) -> &[String] {
        match class {
            DtypeClass::Categorical => &self.categorical,
            DtypeClass::Numeric => &self.numeric,
            DtypeClass::Date => &self.date,
            DtypeClass::Boolean => &self.boolean,
        }
    }

    /// Class of a named column, if profiled
    pub fn class_of(&self, name: &str) -> Option<DtypeClass> {
        [
            DtypeClass::Categorical,
            DtypeClass::Numeric,
            DtypeClass::Date,
            DtypeClass::Boolean,
        ]
        .into_iter()
        .find(|&class| self.columns(class).iter().any(|c| c == name))
    }

    /// Total number of profiled columns
    pub fn len(&self) -> usize {
        self.categorical.len() + self.numeric.len() + self.date.len() + self.boolean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
