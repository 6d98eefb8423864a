use std::collections::HashSet;

use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema};
use serde::{Deserialize, Serialize};

use crate::datatypes::DataType;
use crate::{DataFrameError, Result};

/// A `(name, dtype)` pair used for struct members and frame schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    name: String,
    dtype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    /// Return a copy of this field carrying another name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: self.dtype.clone(),
        }
    }

    /// Nullable Arrow field with the same name.
    pub fn to_arrow(&self) -> Result<ArrowField> {
        Ok(ArrowField::new(&self.name, self.dtype.to_arrow()?, true))
    }

    pub fn from_arrow(field: &ArrowField) -> Self {
        Self::new(field.name().clone(), DataType::from_arrow(field.data_type()))
    }
}

/// Ordered mapping from column name to `DataType`; names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting duplicate names.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for f in &fields {
            if !seen.insert(f.name()) {
                return Err(DataFrameError::schema_mismatch(format!(
                    "duplicate column name '{}'",
                    f.name()
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a column type by name.
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .map(Field::dtype)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn to_arrow(&self) -> Result<ArrowSchema> {
        Ok(ArrowSchema::new(
            self.fields
                .iter()
                .map(Field::to_arrow)
                .collect::<Result<Vec<_>>>()?,
        ))
    }

    pub fn from_arrow(schema: &ArrowSchema) -> Self {
        Self {
            fields: schema
                .fields()
                .iter()
                .map(|f| Field::from_arrow(f.as_ref()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Schema};
    use crate::datatypes::DataType;
    use crate::DataFrameError;

    #[test]
    fn schema_rejects_duplicate_names() {
        let err = Schema::new(vec![
            Field::new("a", DataType::Int64),
            Field::new("a", DataType::Utf8),
        ])
        .unwrap_err();
        assert!(matches!(err, DataFrameError::SchemaMismatch { .. }));
    }

    #[test]
    fn schema_preserves_order_and_lookup() {
        let schema = Schema::new(vec![
            Field::new("b", DataType::Utf8),
            Field::new("a", DataType::Int64),
        ])
        .unwrap();
        assert_eq!(schema.names(), vec!["b", "a"]);
        assert_eq!(schema.get("a"), Some(&DataType::Int64));
        assert_eq!(schema.index_of("b"), Some(0));
        assert!(schema.get("c").is_none());
    }
}
