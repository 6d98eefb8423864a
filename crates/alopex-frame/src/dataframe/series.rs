use arrow::array::{new_empty_array, Array, ArrayRef};
use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::construction::extract::{value_at, values_of_chunks};
use crate::construction::{cast_array, ColumnBuilder, HostValue};
use crate::datatypes::DataType;
use crate::format::SerializationFormat;
use crate::{DataFrame, DataFrameError, Result};

/// A named column represented as one or more Arrow `ArrayRef` chunks.
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    chunks: Vec<ArrayRef>,
}

impl Series {
    /// Build a column from host values, inferring its type.
    pub fn new(name: &str, values: impl Into<HostValue>) -> Result<Self> {
        ColumnBuilder::new(name).build(&values.into())
    }

    /// Build a column from host values with an optional declared type.
    pub fn from_values(
        name: &str,
        values: &[HostValue],
        dtype: Option<DataType>,
        strict: bool,
    ) -> Result<Self> {
        let mut builder = ColumnBuilder::new(name).with_strict(strict);
        if let Some(dtype) = dtype {
            builder = builder.with_dtype(dtype);
        }
        builder.build_values(values)
    }

    /// Construct a `Series` from Arrow chunks, validating that all chunks share the same dtype.
    pub fn from_arrow(name: &str, chunks: Vec<ArrayRef>) -> Result<Self> {
        if chunks.is_empty() {
            return Ok(Self {
                name: name.to_string(),
                chunks,
            });
        }

        let expected = chunks[0].data_type().clone();
        for chunk in &chunks[1..] {
            let actual = chunk.data_type();
            if actual != &expected {
                return Err(DataFrameError::type_mismatch(
                    Some(name.to_string()),
                    expected.to_string(),
                    actual.to_string(),
                ));
            }
        }

        Ok(Self {
            name: name.to_string(),
            chunks,
        })
    }

    /// Wrap a single Arrow array.
    pub fn from_array(name: &str, array: ArrayRef) -> Self {
        Self {
            name: name.to_string(),
            chunks: vec![array],
        }
    }

    /// Convert this series into Arrow chunks.
    pub fn to_arrow(&self) -> Vec<ArrayRef> {
        self.chunks.clone()
    }

    /// Concatenate all chunks into one Arrow array.
    pub fn to_array(&self) -> Result<ArrayRef> {
        match self.chunks.as_slice() {
            [] => Ok(new_empty_array(&self.arrow_dtype())),
            [single] => Ok(single.clone()),
            chunks => {
                let arrays = chunks.iter().map(|a| a.as_ref()).collect::<Vec<_>>();
                Ok(arrow::compute::concat(&arrays)?)
            }
        }
    }

    /// Return the series name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the logical length of the series.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    /// Returns `true` if this series is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.chunks.iter().map(|c| c.null_count()).sum()
    }

    /// Column type of the series.
    pub fn dtype(&self) -> DataType {
        DataType::from_arrow(&self.arrow_dtype())
    }

    /// Return the Arrow dtype of the series.
    pub fn arrow_dtype(&self) -> ArrowDataType {
        self.chunks
            .first()
            .map(|c| c.data_type().clone())
            .unwrap_or(ArrowDataType::Null)
    }

    /// Value at `index` as a host value.
    pub fn get(&self, index: usize) -> Result<HostValue> {
        let mut offset = index;
        for chunk in &self.chunks {
            if offset < chunk.len() {
                return value_at(chunk.as_ref(), offset);
            }
            offset -= chunk.len();
        }
        Err(DataFrameError::invalid_argument(format!(
            "index {index} is out of bounds for series '{}' of length {}",
            self.name,
            self.len()
        )))
    }

    /// All values as host values.
    pub fn to_values(&self) -> Result<Vec<HostValue>> {
        values_of_chunks(&self.chunks)
    }

    /// Cast to `dtype`; under `strict` a value that does not survive fails.
    pub fn cast(&self, dtype: &DataType, strict: bool) -> Result<Series> {
        let array = self.to_array()?;
        let out = cast_array(&array, dtype, strict, None)?;
        Ok(Series::from_array(&self.name, out))
    }

    /// Return a copy carrying another name.
    pub fn rename(&self, name: &str) -> Series {
        Series {
            name: name.to_string(),
            chunks: self.chunks.clone(),
        }
    }

    /// Wrap this column into a single-column frame.
    pub fn to_frame(&self) -> Result<DataFrame> {
        DataFrame::new(vec![self.clone()])
    }

    /// First `n` values.
    pub fn head(&self, n: usize) -> Result<Series> {
        self.slice(0, n)
    }

    /// Last `n` values.
    pub fn tail(&self, n: usize) -> Result<Series> {
        let n = n.min(self.len());
        self.slice(-(n as i64), n)
    }

    /// Slice of `length` values starting at `offset`; a negative offset
    /// counts from the end.
    pub fn slice(&self, offset: i64, length: usize) -> Result<Series> {
        let array = self.to_array()?;
        let (start, len) = resolve_slice(offset, length, array.len());
        Ok(Series::from_array(&self.name, array.slice(start, len)))
    }

    /// Serialize name, type and values using `format`.
    pub fn serialize_to(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        format.encode(&SeriesRepr::try_from(self)?)
    }

    /// Rebuild a series produced by [`Series::serialize_to`].
    pub fn deserialize_from(format: SerializationFormat, bytes: &[u8]) -> Result<Self> {
        Series::try_from(format.decode::<SeriesRepr>(bytes)?)
    }

    pub(crate) fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }

    pub(crate) fn from_arrow_unchecked(name: &str, chunks: Vec<ArrayRef>) -> Self {
        Self {
            name: name.to_string(),
            chunks,
        }
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.arrow_dtype() != other.arrow_dtype() {
            return false;
        }
        match (self.to_array(), other.to_array()) {
            (Ok(a), Ok(b)) => a.to_data() == b.to_data(),
            _ => false,
        }
    }
}

/// Clamp a possibly negative `offset` and `length` to `len`.
pub(crate) fn resolve_slice(offset: i64, length: usize, len: usize) -> (usize, usize) {
    let start = if offset < 0 {
        len.saturating_sub(offset.unsigned_abs() as usize)
    } else {
        (offset as usize).min(len)
    };
    (start, length.min(len - start))
}

#[derive(Serialize, Deserialize)]
struct SeriesRepr {
    name: String,
    dtype: DataType,
    values: Vec<HostValue>,
}

impl TryFrom<&Series> for SeriesRepr {
    type Error = DataFrameError;

    fn try_from(s: &Series) -> Result<Self> {
        Ok(SeriesRepr {
            name: s.name.clone(),
            dtype: s.dtype(),
            values: s.to_values()?.into_iter().map(portable).collect(),
        })
    }
}

/// Non-finite floats travel as text, which every format can carry and the
/// float builder parses back.
fn portable(value: HostValue) -> HostValue {
    match value {
        HostValue::Number(n) if !n.is_finite() => HostValue::Str(n.to_string()),
        HostValue::Array(items) => HostValue::Array(items.into_iter().map(portable).collect()),
        HostValue::Record(pairs) => {
            HostValue::Record(pairs.into_iter().map(|(k, v)| (k, portable(v))).collect())
        }
        other => other,
    }
}

impl TryFrom<SeriesRepr> for Series {
    type Error = DataFrameError;

    fn try_from(repr: SeriesRepr) -> Result<Self> {
        Series::from_values(&repr.name, &repr.values, Some(repr.dtype), true)
    }
}

impl Serialize for Series {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SeriesRepr::try_from(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = SeriesRepr::deserialize(deserializer)?;
        Series::try_from(repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
    use serde_json::json;

    use super::Series;
    use crate::construction::HostValue;
    use crate::datatypes::DataType;
    use crate::format::SerializationFormat;
    use crate::DataFrameError;

    #[test]
    fn from_arrow_accepts_empty_chunks() {
        let s = Series::from_arrow("a", vec![]).unwrap();
        assert_eq!(s.name(), "a");
        assert_eq!(s.len(), 0);
        assert!(s.is_empty());
    }

    #[test]
    fn from_arrow_rejects_mixed_dtypes() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["x", "y"]));

        let err = Series::from_arrow("col", vec![a, b]).unwrap_err();
        match err {
            DataFrameError::TypeMismatch { column, .. } => {
                assert_eq!(column.as_deref(), Some("col"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn get_walks_chunks() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let b: ArrayRef = Arc::new(Int32Array::from(vec![3]));
        let s = Series::from_arrow("a", vec![a, b]).unwrap();
        assert_eq!(s.get(2).unwrap(), HostValue::Number(3.0));
        assert!(matches!(
            s.get(3).unwrap_err(),
            DataFrameError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn slicing_clamps_to_bounds() {
        let s = Series::new("a", json!([1, 2, 3, 4])).unwrap();
        assert_eq!(s.head(10).unwrap().len(), 4);
        assert_eq!(
            s.tail(2).unwrap().to_values().unwrap(),
            vec![HostValue::Number(3.0), HostValue::Number(4.0)]
        );
        assert_eq!(s.slice(-3, 1).unwrap().get(0).unwrap(), HostValue::Number(2.0));
    }

    #[test]
    fn cast_respects_strictness() {
        let s = Series::new("a", json!(["1", "x"])).unwrap();
        assert!(s.cast(&DataType::Int64, true).is_err());
        let lenient = s.cast(&DataType::Int64, false).unwrap();
        assert_eq!(lenient.null_count(), 1);
    }

    #[test]
    fn serialization_keeps_wide_integers_and_non_finite_floats() {
        let wide = Series::from_arrow(
            "i",
            vec![Arc::new(Int64Array::from(vec![Some(1), None, Some(i64::MAX), Some((1 << 53) + 1)])) as ArrayRef],
        )
        .unwrap();
        let odd = Series::from_arrow(
            "f",
            vec![Arc::new(Float64Array::from(vec![
                Some(f64::NAN),
                Some(f64::INFINITY),
                None,
                Some(f64::NEG_INFINITY),
                Some(0.5),
            ])) as ArrayRef],
        )
        .unwrap();
        for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
            for s in [&wide, &odd] {
                let bytes = s.serialize_to(format).unwrap();
                assert_eq!(&Series::deserialize_from(format, &bytes).unwrap(), s);
            }
        }
        assert_eq!(wide.get(2).unwrap(), HostValue::BigInt(i64::MAX as i128));
    }

    #[test]
    fn serialization_rebuilds_the_column() {
        let s = Series::new("a", json!([[1, 2], null])).unwrap();
        for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
            let bytes = s.serialize_to(format).unwrap();
            let back = Series::deserialize_from(format, &bytes).unwrap();
            assert_eq!(back, s);
        }
    }
}
