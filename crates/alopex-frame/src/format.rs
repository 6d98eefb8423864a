use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{DataFrameError, Result};

/// Wire format used by `DataType`, `Expr` and `Series` serialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Canonical JSON (`serde_json`).
    #[default]
    Json,
    /// Compact binary (`bincode`).
    Bincode,
}

impl SerializationFormat {
    /// Serialize `value` into bytes of this format.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Json => serde_json::to_vec(value)
                .map_err(|e| DataFrameError::serialization(self.to_string(), e.to_string())),
            SerializationFormat::Bincode => bincode::serialize(value)
                .map_err(|e| DataFrameError::serialization(self.to_string(), e.to_string())),
        }
    }

    /// Deserialize a value previously produced by [`SerializationFormat::encode`].
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| DataFrameError::serialization(self.to_string(), e.to_string())),
            SerializationFormat::Bincode => bincode::deserialize(bytes)
                .map_err(|e| DataFrameError::serialization(self.to_string(), e.to_string())),
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFormat::Json => f.write_str("json"),
            SerializationFormat::Bincode => f.write_str("bincode"),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = DataFrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(SerializationFormat::Json),
            "bincode" => Ok(SerializationFormat::Bincode),
            other => Err(DataFrameError::configuration(
                "format",
                format!("expected 'json' or 'bincode', got '{other}'"),
            )),
        }
    }
}
