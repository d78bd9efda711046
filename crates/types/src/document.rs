//! Query documents: the structured output of one query

use crate::field::Field;
use crate::result::FieldOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-device fragment: field results keyed by field
pub type DeviceReport = BTreeMap<Field, FieldOutput>;

/// Full output of one query invocation.
///
/// `count` appears only when it was requested. `gpus` appears only when a
/// per-device field was requested and devices exist. `error` is reserved for
/// failures that abort the whole query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpus: Option<BTreeMap<u32, DeviceReport>>,
}

impl QueryDocument {
    /// Document holding only a query-level error
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Report for one device, if it was queried
    pub fn device(&self, index: u32) -> Option<&DeviceReport> {
        self.gpus.as_ref().and_then(|gpus| gpus.get(&index))
    }

    /// Locate a device by UUID.
    ///
    /// Matches case-insensitively, also accepting the UUID without its
    /// `GPU-` prefix.
    pub fn find_by_uuid(&self, uuid: &str) -> Option<(u32, &DeviceReport)> {
        let target = uuid.trim().to_lowercase();
        let prefixed = format!("gpu-{}", target);

        self.gpus.as_ref()?.iter().find_map(|(index, report)| {
            let value = report.get(&Field::Uuid)?.reading()?.value.as_str()?;
            let value = value.to_lowercase();
            (value == target || value == prefixed).then_some((*index, report))
        })
    }

    /// Serialize with 4-space indentation
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FieldResult;
    use serde_json::json;

    fn report_with_uuid(uuid: &str) -> DeviceReport {
        let mut report = DeviceReport::new();
        report.insert(Field::Uuid, FieldResult::ok(uuid.to_string()).into());
        report
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let doc = QueryDocument {
            count: Some(2),
            ..QueryDocument::default()
        };
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"count": 2}));

        let doc = QueryDocument::failure("Invalid GPU index: 4");
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"error": "Invalid GPU index: 4"})
        );
    }

    #[test]
    fn test_device_keys_are_strings_in_numeric_order() {
        let mut gpus = BTreeMap::new();
        for index in [10u32, 2, 0] {
            gpus.insert(index, DeviceReport::new());
        }
        let doc = QueryDocument {
            gpus: Some(gpus),
            ..QueryDocument::default()
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"gpus":{"0":{},"2":{},"10":{}}}"#);

        let parsed: QueryDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_find_by_uuid() {
        let mut gpus = BTreeMap::new();
        gpus.insert(0, report_with_uuid("GPU-0a1b2c3d-4e5f"));
        gpus.insert(1, report_with_uuid("GPU-1B2C3D4E-5F6A"));
        let doc = QueryDocument {
            gpus: Some(gpus),
            ..QueryDocument::default()
        };

        assert_eq!(doc.find_by_uuid("gpu-0A1B2C3D-4E5F").map(|(i, _)| i), Some(0));
        assert_eq!(doc.find_by_uuid("1b2c3d4e-5f6a").map(|(i, _)| i), Some(1));
        assert!(doc.find_by_uuid("deadbeef").is_none());
        assert!(QueryDocument::default().find_by_uuid("x").is_none());
    }

    #[test]
    fn test_pretty_output_uses_four_spaces() {
        let doc = QueryDocument {
            count: Some(1),
            ..QueryDocument::default()
        };
        assert_eq!(doc.to_json_pretty().unwrap(), "{\n    \"count\": 1\n}");
    }
}
