//! # Serialization Formats
//!
//! Export formats for captured query records handed to comparison consumers.
//! Bincode is the compact default; JSON is for inspection and interop with
//! report tooling.
//!
//! ## Usage
//! ```rust
//! use wire_playback::core::serialization::{MultiFormat, SerializationFormat};
//! use wire_playback::protocol::query::QueryResult;
//!
//! let result = QueryResult { rows_sent: 3, ..QueryResult::default() };
//! let bytes = result.serialize_with_header(SerializationFormat::Json).unwrap();
//! let (back, format) = QueryResult::deserialize_with_header(&bytes).unwrap();
//! assert_eq!(back, result);
//! assert_eq!(format, SerializationFormat::Json);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
}

impl SerializationFormat {
    /// Get the format identifier byte
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
        }
    }
}

/// Trait for records that can be exported in either format
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => Ok(bincode::serialize(self)?),
            SerializationFormat::Json => {
                serde_json::to_vec(self).map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
        }
    }

    /// Serialize to bytes with a leading format byte
    fn serialize_with_header(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        let mut data = vec![format.format_byte()];
        let mut payload = self.serialize_format(format)?;
        data.append(&mut payload);
        Ok(data)
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Bincode => Ok(bincode::deserialize(data)?),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
        }
    }

    /// Deserialize from bytes carrying a leading format byte
    fn deserialize_with_header(data: &[u8]) -> Result<(Self, SerializationFormat)> {
        let Some((&first, rest)) = data.split_first() else {
            return Err(ProtocolError::DeserializeError("Empty data".to_string()));
        };

        let format = SerializationFormat::from_byte(first).ok_or_else(|| {
            ProtocolError::DeserializeError(format!("Unknown format byte: {first}"))
        })?;

        let value = Self::deserialize_format(rest, format)?;
        Ok((value, format))
    }
}
