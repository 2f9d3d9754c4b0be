// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value codec: wire values to display strings and back.
//!
//! Only the sixteen scalar builtin types (ids 1..=16) can be produced from a
//! string. Everything else is display-only.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::client::Variant;
use crate::error::{ConversionError, OpcUaError, OpcUaResult};
use crate::types::{NodeId, OpcUaDataType, StatusCode};

// =============================================================================
// Access level bits
// =============================================================================

/// `AccessLevel` bit: current value readable.
pub const ACCESS_CURRENT_READ: u8 = 0x01;
/// `AccessLevel` bit: current value writable.
pub const ACCESS_CURRENT_WRITE: u8 = 0x02;
/// `AccessLevel` bit: history readable.
pub const ACCESS_HISTORY_READ: u8 = 0x04;
/// `AccessLevel` bit: history writable.
pub const ACCESS_HISTORY_WRITE: u8 = 0x08;
/// `AccessLevel` bit: semantic change notifications.
pub const ACCESS_SEMANTIC_CHANGE: u8 = 0x10;

const ACCESS_NAMES: [(u8, &str); 5] = [
    (ACCESS_CURRENT_READ, "CurrentRead"),
    (ACCESS_CURRENT_WRITE, "CurrentWrite"),
    (ACCESS_HISTORY_READ, "HistoryRead"),
    (ACCESS_HISTORY_WRITE, "HistoryWrite"),
    (ACCESS_SEMANTIC_CHANGE, "SemanticChange"),
];

// =============================================================================
// Display
// =============================================================================

/// Renders a value for display.
pub fn variant_to_display(value: &Variant) -> String {
    match value {
        Variant::String(s) | Variant::XmlElement(s) => s.clone(),
        Variant::LocalizedText(t) => t.text.clone(),
        Variant::DateTime(dt) => dt.to_rfc3339(),
        Variant::ByteString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Variant::ExtensionObject { type_id } => format!("ExtensionObject({})", type_id),
        Variant::Array(items) => {
            let parts: Vec<String> = items.iter().map(variant_to_display).collect();
            format!("[{}]", parts.join(", "))
        }
        other => other.to_string(),
    }
}

/// Returns the builtin name for a namespace-0 data type id.
pub fn data_type_name(type_id: u32) -> Option<&'static str> {
    OpcUaDataType::from_type_id(type_id).map(|t| t.name())
}

/// Returns the builtin name for a data type node id.
pub fn data_type_name_of(node_id: &NodeId) -> Option<&'static str> {
    OpcUaDataType::from_node_id(node_id).map(|t| t.name())
}

/// Returns `true` if values of this data type can be parsed from a string.
pub fn is_writable_type(node_id: &NodeId) -> bool {
    OpcUaDataType::from_node_id(node_id).is_some()
}

/// Maps a status code to `good`, `uncertain` or `bad`.
pub fn status_quality(status: StatusCode) -> &'static str {
    if status.is_good() {
        "good"
    } else if status.is_uncertain() {
        "uncertain"
    } else {
        "bad"
    }
}

/// Renders `AccessLevel` bits as a comma-separated list of flag names.
pub fn access_level_display(bits: u8) -> String {
    ACCESS_NAMES
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses `text` into a value of the given builtin type.
///
/// Unknown type ids produce a `String` variant.
///
/// # Errors
///
/// `ConversionError::InvalidValue` when `text` does not parse as the type.
pub fn parse_for_data_type(type_id: u32, text: &str) -> OpcUaResult<Variant> {
    let Some(data_type) = OpcUaDataType::from_type_id(type_id) else {
        return Ok(Variant::String(text.to_string()));
    };

    let trimmed = text.trim();
    let invalid = |message: String| {
        OpcUaError::conversion(ConversionError::invalid_value(data_type.name(), message))
    };

    macro_rules! number {
        ($variant:ident, $ty:ty) => {
            trimmed
                .parse::<$ty>()
                .map(Variant::$variant)
                .map_err(|e| invalid(format!("'{}': {}", trimmed, e)))
        };
    }

    match data_type {
        OpcUaDataType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Variant::Boolean(true)),
            "false" | "0" => Ok(Variant::Boolean(false)),
            _ => Err(invalid(format!("'{}' is not true, false, 1 or 0", trimmed))),
        },
        OpcUaDataType::SByte => number!(SByte, i8),
        OpcUaDataType::Byte => number!(Byte, u8),
        OpcUaDataType::Int16 => number!(Int16, i16),
        OpcUaDataType::UInt16 => number!(UInt16, u16),
        OpcUaDataType::Int32 => number!(Int32, i32),
        OpcUaDataType::UInt32 => number!(UInt32, u32),
        OpcUaDataType::Int64 => number!(Int64, i64),
        OpcUaDataType::UInt64 => number!(UInt64, u64),
        OpcUaDataType::Float => number!(Float, f32),
        OpcUaDataType::Double => number!(Double, f64),
        OpcUaDataType::String => Ok(Variant::String(text.to_string())),
        OpcUaDataType::DateTime => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Variant::DateTime(dt.with_timezone(&Utc)))
            .map_err(|e| invalid(e.to_string())),
        OpcUaDataType::Guid => Uuid::parse_str(trimmed)
            .map(Variant::Guid)
            .map_err(|e| invalid(e.to_string())),
        OpcUaDataType::ByteString => Ok(Variant::ByteString(text.as_bytes().to_vec())),
        OpcUaDataType::XmlElement => Ok(Variant::XmlElement(text.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocalizedText;

    #[test]
    fn test_display_strings_and_arrays() {
        assert_eq!(variant_to_display(&Variant::String("abc".into())), "abc");
        assert_eq!(
            variant_to_display(&Variant::Array(vec![
                Variant::String("a".into()),
                Variant::String("b".into())
            ])),
            "[a, b]"
        );
        assert_eq!(
            variant_to_display(&Variant::LocalizedText(LocalizedText::new("Motor"))),
            "Motor"
        );
        assert_eq!(variant_to_display(&Variant::ByteString(b"hi".to_vec())), "hi");
        assert_eq!(variant_to_display(&Variant::Double(2.5)), "2.5");
        assert_eq!(variant_to_display(&Variant::Empty), "null");
    }

    #[test]
    fn test_display_date_time() {
        let dt = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            variant_to_display(&Variant::DateTime(dt)),
            "2024-05-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(data_type_name(1), Some("Boolean"));
        assert_eq!(data_type_name(11), Some("Double"));
        assert_eq!(data_type_name(16), Some("XmlElement"));
        assert_eq!(data_type_name(0), None);
        assert_eq!(data_type_name(17), None);
        assert_eq!(data_type_name_of(&NodeId::numeric(0, 12)), Some("String"));
        assert_eq!(data_type_name_of(&NodeId::numeric(3, 12)), None);
        assert!(is_writable_type(&NodeId::numeric(0, 6)));
        assert!(!is_writable_type(&NodeId::numeric(0, 21)));
    }

    #[test]
    fn test_parse_boolean_strict() {
        assert_eq!(parse_for_data_type(1, "TRUE").unwrap(), Variant::Boolean(true));
        assert_eq!(parse_for_data_type(1, "0").unwrap(), Variant::Boolean(false));
        assert!(parse_for_data_type(1, "yes").is_err());
        assert!(parse_for_data_type(1, "2").is_err());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_for_data_type(6, " -42 ").unwrap(), Variant::Int32(-42));
        assert_eq!(parse_for_data_type(3, "255").unwrap(), Variant::Byte(255));
        assert!(parse_for_data_type(3, "256").is_err());
        assert_eq!(parse_for_data_type(11, "1.25").unwrap(), Variant::Double(1.25));
        assert!(parse_for_data_type(10, "abc").is_err());
    }

    #[test]
    fn test_parse_other_types() {
        let guid = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(
            parse_for_data_type(14, guid).unwrap(),
            Variant::Guid(Uuid::parse_str(guid).unwrap())
        );
        assert!(matches!(
            parse_for_data_type(13, "2024-01-02T03:04:05Z").unwrap(),
            Variant::DateTime(_)
        ));
        assert!(parse_for_data_type(13, "yesterday").is_err());
        assert_eq!(
            parse_for_data_type(15, "ab").unwrap(),
            Variant::ByteString(vec![b'a', b'b'])
        );
        assert_eq!(
            parse_for_data_type(999, "raw").unwrap(),
            Variant::String("raw".into())
        );
    }

    #[test]
    fn test_status_quality() {
        assert_eq!(status_quality(StatusCode::GOOD), "good");
        assert_eq!(status_quality(StatusCode::UNCERTAIN), "uncertain");
        assert_eq!(status_quality(StatusCode::BAD_TIMEOUT), "bad");
    }

    #[test]
    fn test_access_level_display() {
        assert_eq!(access_level_display(0), "");
        assert_eq!(access_level_display(0x03), "CurrentRead, CurrentWrite");
        assert_eq!(
            access_level_display(0x1F),
            "CurrentRead, CurrentWrite, HistoryRead, HistoryWrite, SemanticChange"
        );
    }
}
