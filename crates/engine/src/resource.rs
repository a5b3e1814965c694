//! Status-code facade over the per-kind operations. Each call returns the
//! status and JSON body a transport layer would send unchanged.

use crosswalk_core::{Mapping, MappingKey, MappingRow, MappingType, PageRequest};
use crosswalk_storage::{MappingKind, MappingStore, MappingTable, SqliteStore};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::batch::{AggregateOutcome, BatchComposer, RowConflict, UnitOfWork};
use crate::error::{EngineError, ErrorClass};
use crate::json::{key_from_json, row_from_json, row_to_json};
use crate::register::{DuplicateMapping, RegisterOutcome};
use crate::service::MappingService;

/// Application error code carried by every duplicate-mapping response.
pub const DUPLICATE_MAPPING_ERROR_CODE: u32 = 1409;

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const NO_CONTENT: u16 = 204;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const INTERNAL_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn serialize(status: u16, body: &impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self::json(status, value),
            Err(e) => error_response(&EngineError::from(e)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status: u16,
    pub user_message: String,
    pub developer_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateBody {
    pub duplicate: Value,
    pub existing: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEnvelope {
    pub more_info: DuplicateBody,
    pub status: u16,
    pub error_code: u32,
    pub user_message: String,
    pub developer_message: String,
}

/// Maps an engine error to its envelope. Unexpected errors are logged here
/// and reach the caller without detail.
pub fn error_response(err: &EngineError) -> ApiResponse {
    let (status, user_message, developer_message) = match err.class() {
        ErrorClass::NotFound => (NOT_FOUND, format!("Not Found: {err}"), err.to_string()),
        ErrorClass::Validation => (
            BAD_REQUEST,
            format!("Validation failure: {err}"),
            err.to_string(),
        ),
        ErrorClass::Unexpected => {
            error!(error = %err, "unexpected error");
            (
                INTERNAL_SERVER_ERROR,
                "Unexpected error".to_string(),
                "Unexpected error".to_string(),
            )
        }
    };
    let envelope = ErrorEnvelope {
        status,
        user_message,
        developer_message,
    };
    match serde_json::to_value(&envelope) {
        Ok(body) => ApiResponse::json(status, body),
        Err(_) => ApiResponse::empty(status),
    }
}

fn conflict_response(kind: &MappingKind, rows: &DuplicateMapping<MappingRow>) -> ApiResponse {
    let more_info = match (row_to_json(kind, &rows.duplicate), row_to_json(kind, &rows.existing)) {
        (Ok(duplicate), Ok(existing)) => DuplicateBody {
            duplicate,
            existing,
        },
        (Err(e), _) | (_, Err(e)) => return error_response(&e),
    };
    let message = format!("Conflict: {} mapping already exists", kind.table);
    ApiResponse::serialize(
        CONFLICT,
        &ConflictEnvelope {
            more_info,
            status: CONFLICT,
            error_code: DUPLICATE_MAPPING_ERROR_CODE,
            user_message: message.clone(),
            developer_message: message,
        },
    )
}

/// One entity kind's endpoints.
pub struct MappingResource<L, N = String, S = MappingTable<L, N>> {
    service: MappingService<L, N, S>,
}

impl<L, N, S> MappingResource<L, N, S>
where
    L: MappingKey,
    N: MappingKey,
    S: MappingStore<L, N>,
{
    pub fn new(service: MappingService<L, N, S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &MappingService<L, N, S> {
        &self.service
    }

    /// 201 when the pair is stored or already present, 409 on a collision.
    pub fn create(&self, mapping: Mapping<L, N>) -> ApiResponse {
        match self.service.register_mapping(mapping) {
            Ok(RegisterOutcome::Inserted(_) | RegisterOutcome::Unchanged(_)) => {
                ApiResponse::empty(CREATED)
            }
            Ok(RegisterOutcome::Conflict(rows)) => conflict_response(
                self.service.kind(),
                &DuplicateMapping {
                    duplicate: rows.duplicate.to_row(),
                    existing: rows.existing.to_row(),
                },
            ),
            Err(e) => error_response(&e),
        }
    }

    pub fn create_json(&self, body: &Value) -> ApiResponse {
        let parsed = row_from_json(self.service.kind(), body, None)
            .and_then(|row| Ok(Mapping::from_row(row)?));
        match parsed {
            Ok(mapping) => self.create(mapping),
            Err(e) => error_response(&e),
        }
    }

    pub fn get_by_legacy_id(&self, legacy_id: &L) -> ApiResponse {
        self.respond_with(self.service.find_by_legacy_id(legacy_id))
    }

    pub fn get_by_new_id(&self, new_id: &N) -> ApiResponse {
        self.respond_with(self.service.find_by_new_id(new_id))
    }

    pub fn delete_by_new_id(&self, new_id: &N) -> ApiResponse {
        match self.service.delete_by_new_id(new_id) {
            Ok(_) => ApiResponse::empty(NO_CONTENT),
            Err(e) => error_response(&e),
        }
    }

    /// `page` defaults to 0 and `size` to the configured default.
    pub fn get_by_label(&self, label: &str, page: Option<u32>, size: Option<u32>) -> ApiResponse {
        let request = PageRequest::new(
            page.unwrap_or(0),
            size.unwrap_or(self.service.limits().default_size),
        );
        let kind = self.service.kind();
        let rendered = self
            .service
            .find_all_by_label(label, Some(request))
            .and_then(|page| page.try_map(|m| row_to_json(kind, &m.to_row())));
        match rendered {
            Ok(page) => ApiResponse::serialize(OK, &page),
            Err(e) => error_response(&e),
        }
    }

    pub fn get_latest_migrated(&self) -> ApiResponse {
        self.respond_with(self.service.find_latest_migrated())
    }

    fn respond_with(&self, found: Result<Mapping<L, N>, EngineError>) -> ApiResponse {
        match found.and_then(|m| row_to_json(self.service.kind(), &m.to_row())) {
            Ok(body) => ApiResponse::json(OK, body),
            Err(e) => error_response(&e),
        }
    }
}

/// Aggregate registration endpoints.
///
/// Body: `{label?, mappingType?, creates: {<table>: [row, ...]}, updates:
/// {<table>: [{<new id fields>, <legacy id fields>}]}}`. Row bodies use the
/// table's own field names; a top-level `mappingType` fills rows that omit it.
#[derive(Clone)]
pub struct BatchResource {
    store: SqliteStore,
    composer: BatchComposer,
}

impl BatchResource {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            composer: BatchComposer::new(store.clone()),
            store,
        }
    }

    /// 201 when the whole aggregate commits, 409 when any row collides.
    pub fn register(&self, body: &Value) -> ApiResponse {
        match self.parse_unit(body).and_then(|unit| self.composer.register(&unit)) {
            Ok(AggregateOutcome::Committed(_)) => ApiResponse::empty(CREATED),
            Ok(AggregateOutcome::Conflict(RowConflict { kind, rows })) => {
                conflict_response(kind, &rows)
            }
            Err(e) => error_response(&e),
        }
    }

    /// Best-effort over a list of aggregate bodies: 200 with one
    /// `{index, status, body?}` entry per aggregate, in submission order.
    pub fn register_many(&self, body: &Value) -> ApiResponse {
        let Some(items) = body.as_array() else {
            return error_response(&EngineError::Validation(
                "request body must be a JSON array".into(),
            ));
        };

        let results = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let response = self.register(item);
                let mut entry = serde_json::json!({ "index": index, "status": response.status });
                if let Some(body) = response.body {
                    entry["body"] = body;
                }
                entry
            })
            .collect::<Vec<_>>();
        ApiResponse::json(OK, Value::Array(results))
    }

    fn parse_unit(&self, body: &Value) -> Result<UnitOfWork, EngineError> {
        let obj = body
            .as_object()
            .ok_or_else(|| EngineError::Validation("request body must be a JSON object".into()))?;

        let mut unit = match obj.get("label") {
            None | Some(Value::Null) => UnitOfWork::new(),
            Some(Value::String(label)) => UnitOfWork::labelled(label.clone()),
            Some(_) => return Err(EngineError::Validation("label must be a string".into())),
        };
        let default_type = match obj.get("mappingType") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(MappingType::parse(s)?),
            Some(_) => return Err(EngineError::Validation("mappingType must be a string".into())),
        };

        for (kind, rows) in self.tables(obj.get("creates"))? {
            for row in rows {
                unit.create_row(kind, row_from_json(kind, row, default_type.as_ref())?)?;
            }
        }
        for (kind, rows) in self.tables(obj.get("updates"))? {
            for row in rows {
                unit.relabel_row(kind, key_from_json(kind.new, row)?, key_from_json(kind.legacy, row)?)?;
            }
        }
        Ok(unit)
    }

    fn tables<'a>(
        &self,
        section: Option<&'a Value>,
    ) -> Result<Vec<(&'static MappingKind, &'a Vec<Value>)>, EngineError> {
        let Some(section) = section.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let tables = section
            .as_object()
            .ok_or_else(|| EngineError::Validation("row sections must be objects keyed by table".into()))?;
        tables
            .iter()
            .map(|(table, rows)| {
                let kind = self
                    .store
                    .kind(table)
                    .ok_or_else(|| EngineError::Validation(format!("unknown table {table}")))?;
                let rows = rows
                    .as_array()
                    .ok_or_else(|| EngineError::Validation(format!("{table} rows must be an array")))?;
                Ok((kind, rows))
            })
            .collect()
    }
}
