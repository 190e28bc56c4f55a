//! JSON parser for carpark availability payloads.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::dataset::RawCarpark;

/// Either the OData envelope the live API returns or a bare array, as found
/// in saved fixture files. Records stay untyped until each is decoded alone.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Envelope { value: Vec<Value> },
    Records(Vec<Value>),
}

/// Decodes carpark records from raw JSON bytes.
///
/// Missing or oddly-typed fields inside a record are tolerated here and
/// normalized when the dataset is built. An entry that is not a record at all
/// is skipped with a warning; the rest of the payload is kept.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON, or are JSON of neither shape.
pub fn parse_carparks(bytes: &[u8]) -> Result<Vec<RawCarpark>> {
    let payload: Payload =
        serde_json::from_slice(bytes).context("payload is not a carpark array or OData envelope")?;

    let entries = match payload {
        Payload::Envelope { value } => value,
        Payload::Records(records) => records,
    };

    let total = entries.len();
    let records: Vec<RawCarpark> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "Skipping undecodable carpark record");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(kept = records.len(), total, "Dropped malformed carpark records");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_odata_envelope() {
        let bytes = br#"{
            "odata.metadata": "http://datamall2.mytransport.sg/ltaodataservice/$metadata#CarParkAvailability",
            "value": [
                {"CarParkID": "1", "Area": "Marina", "Development": "Suntec City",
                 "Location": "1.29375 103.85718", "AvailableLots": 442, "LotType": "C", "Agency": "LTA"}
            ]
        }"#;

        let records = parse_carparks(bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].development.as_deref(), Some("Suntec City"));
        assert_eq!(records[0].available_lots, serde_json::json!(442));
    }

    #[test]
    fn test_parse_bare_array_with_missing_fields() {
        let bytes = br#"[{"CarParkID": 7, "Development": "Blk 1"}, {}]"#;

        let records = parse_carparks(bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].carpark_id, serde_json::json!(7));
        assert!(records[1].agency.is_none());
    }

    #[test]
    fn test_parse_mistyped_text_fields_keep_the_payload() {
        let bytes = br#"{"value": [
            {"CarParkID": "1", "Area": "Marina", "Development": "Suntec City",
             "Location": "1.29375 103.85718", "AvailableLots": 442, "LotType": "C", "Agency": "LTA"},
            {"CarParkID": "2", "Area": 7, "Development": ["Blk", 2],
             "Location": {"lat": 1.3}, "AvailableLots": "12", "LotType": false, "Agency": 3}
        ]}"#;

        let records = parse_carparks(bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].development.as_deref(), Some("Suntec City"));
        assert_eq!(records[1].area.as_deref(), Some("7"));
        assert_eq!(records[1].development, None);
        assert_eq!(records[1].location, None);
        assert_eq!(records[1].lot_type, None);
        assert_eq!(records[1].agency.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_skips_entries_that_are_not_records() {
        let bytes = br#"[{"CarParkID": "1", "Development": "Blk 1"}, 42, "oops", null]"#;

        let records = parse_carparks(bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].development.as_deref(), Some("Blk 1"));
    }

    #[test]
    fn test_parse_empty_envelope() {
        let records = parse_carparks(br#"{"value": []}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_carparks(&[0xFF, 0xFE, 0x00, 0x01]).is_err());
        assert!(parse_carparks(br#"{"status": "down"}"#).is_err());
    }
}
