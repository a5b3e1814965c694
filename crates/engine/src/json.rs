//! Per-kind JSON shapes. Field names come from each kind's columns, so one
//! codec serves every table.

use crosswalk_core::{CoreError, KeyValue, MappingRow, MappingType};
use crosswalk_storage::{Column, ColumnKind, MappingKind};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// `{<legacy fields>, <new fields>, <parent>?, <owner>?, label?, mappingType,
/// whenCreated?}`
pub fn row_to_json(kind: &MappingKind, row: &MappingRow) -> Result<Value, EngineError> {
    let mut out = Map::new();
    write_key(&mut out, kind.legacy, &row.legacy_id)?;
    write_key(&mut out, kind.new, &row.new_id)?;
    if let (Some(field), Some(parent)) = (kind.parent, &row.parent_id) {
        out.insert(field.to_string(), Value::String(parent.clone()));
    }
    if let (Some(field), Some(owner)) = (kind.owner, &row.owner_id) {
        out.insert(field.to_string(), Value::String(owner.clone()));
    }
    if let Some(label) = &row.label {
        out.insert("label".into(), Value::String(label.clone()));
    }
    out.insert("mappingType".into(), Value::String(row.mapping_type.as_string()));
    if row.provisional {
        out.insert("provisional".into(), Value::Bool(true));
    }
    if let Some(stamp) = row.when_created {
        out.insert("whenCreated".into(), Value::String(stamp.to_rfc3339()?));
    }
    Ok(Value::Object(out))
}

/// Parses one row body. `whenCreated` is server-assigned and ignored; a
/// missing `mappingType` falls back to `default_type` when one is given.
pub fn row_from_json(
    kind: &MappingKind,
    value: &Value,
    default_type: Option<&MappingType>,
) -> Result<MappingRow, EngineError> {
    let obj = as_object(value)?;
    let mapping_type = match obj.get("mappingType") {
        Some(Value::String(s)) => MappingType::parse(s)?,
        Some(other) => return Err(mistyped("mappingType", "a string", other).into()),
        None => default_type
            .cloned()
            .ok_or_else(|| CoreError::validation("mappingType", "missing"))?,
    };

    Ok(MappingRow {
        legacy_id: key_from_json(kind.legacy, value)?,
        new_id: key_from_json(kind.new, value)?,
        parent_id: kind.parent.map(|f| optional_text(obj, f)).transpose()?.flatten(),
        owner_id: kind.owner.map(|f| optional_text(obj, f)).transpose()?.flatten(),
        label: optional_text(obj, "label")?,
        mapping_type,
        provisional: match obj.get("provisional") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => return Err(mistyped("provisional", "a boolean", other).into()),
        },
        when_created: None,
    })
}

/// Reads the values of `columns` out of a JSON object, in column order.
pub fn key_from_json(columns: &[Column], value: &Value) -> Result<Vec<KeyValue>, EngineError> {
    let obj = as_object(value)?;
    let mut key = Vec::with_capacity(columns.len());
    for column in columns {
        let field = obj
            .get(column.json)
            .ok_or_else(|| CoreError::validation(column.json, "missing"))?;
        let part = match (column.kind, field) {
            (ColumnKind::Integer, Value::Number(n)) => n
                .as_i64()
                .map(KeyValue::Integer)
                .ok_or_else(|| mistyped(column.json, "an integer", field))?,
            (ColumnKind::Text, Value::String(s)) => KeyValue::Text(s.clone()),
            (ColumnKind::Integer, other) => return Err(mistyped(column.json, "an integer", other).into()),
            (ColumnKind::Text, other) => return Err(mistyped(column.json, "a string", other).into()),
        };
        key.push(part);
    }
    Ok(key)
}

fn write_key(out: &mut Map<String, Value>, columns: &[Column], key: &[KeyValue]) -> Result<(), EngineError> {
    if columns.len() != key.len() {
        return Err(EngineError::Unexpected(format!(
            "key has {} part(s), layout has {}",
            key.len(),
            columns.len()
        )));
    }
    for (column, part) in columns.iter().zip(key) {
        let value = match part {
            KeyValue::Integer(n) => Value::from(*n),
            KeyValue::Text(s) => Value::String(s.clone()),
        };
        out.insert(column.json.to_string(), value);
    }
    Ok(())
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, EngineError> {
    value
        .as_object()
        .ok_or_else(|| EngineError::Validation("request body must be a JSON object".into()))
}

fn optional_text(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, EngineError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(mistyped(field, "a string", other).into()),
    }
}

fn mistyped(field: &str, expected: &str, got: &Value) -> CoreError {
    let got = match got {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    CoreError::validation(field, format!("expected {expected}, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SENTENCES: MappingKind = MappingKind {
        table: "sentence_mapping",
        legacy: &[
            Column::integer("nomis_booking_id", "nomisBookingId"),
            Column::integer("nomis_sentence_sequence", "nomisSentenceSequence"),
        ],
        new: &[Column::text("dps_sentence_id", "dpsSentenceId")],
        parent: Some("dpsCourtCaseId"),
        owner: Some("offenderNo"),
        retention: None,
    };

    #[test]
    fn composite_keys_flatten_to_named_fields() {
        let body = json!({
            "nomisBookingId": 12,
            "nomisSentenceSequence": 3,
            "dpsSentenceId": "s-1",
            "dpsCourtCaseId": "c-1",
            "label": "2024-05-01",
            "mappingType": "MIGRATED",
        });
        let row = row_from_json(&SENTENCES, &body, None).unwrap();
        assert_eq!(row.legacy_id, vec![KeyValue::Integer(12), KeyValue::Integer(3)]);
        assert_eq!(row.parent_id.as_deref(), Some("c-1"));
        assert_eq!(row.owner_id, None);

        let rendered = row_to_json(&SENTENCES, &row).unwrap();
        assert_eq!(rendered["nomisSentenceSequence"], json!(3));
        assert_eq!(rendered["dpsSentenceId"], json!("s-1"));
        assert!(rendered.get("whenCreated").is_none());
    }

    #[test]
    fn wrong_field_types_are_validation_failures() {
        let body = json!({
            "nomisBookingId": "12",
            "nomisSentenceSequence": 3,
            "dpsSentenceId": "s-1",
            "mappingType": "MIGRATED",
        });
        let err = row_from_json(&SENTENCES, &body, None).unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::Validation);
    }

    #[test]
    fn mapping_type_defaults_only_when_given() {
        let body = json!({"nomisBookingId": 1, "nomisSentenceSequence": 1, "dpsSentenceId": "s"});
        assert!(row_from_json(&SENTENCES, &body, None).is_err());
        let row = row_from_json(&SENTENCES, &body, Some(&MappingType::created("DPS"))).unwrap();
        assert_eq!(row.mapping_type.as_string(), "DPS_CREATED");
    }
}
