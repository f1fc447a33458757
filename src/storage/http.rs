//! Client for the hosted record store.
//!
//! Every call answers with the same envelope: `success`, an optional
//! `message`, `data` for reads and per-record `results` for writes.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    models::RecordId,
    storage::{Record, RecordOutcome, RecordQuery, RecordStore, StorageError},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub public_key: String,
}

pub struct HttpRecordStore {
    base_url: String,
    project_id: String,
    public_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize, Default)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    results: Option<Vec<OutcomeBody>>,
}

#[derive(Debug, Deserialize)]
struct OutcomeBody {
    success: bool,
    #[serde(default)]
    data: Option<Record>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpRecordStore {
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id,
            public_key: config.public_key,
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/api/tables/{}/records", self.base_url, table)
    }

    fn send(&self, method: &str, url: &str, body: Value) -> Result<Envelope, StorageError> {
        tracing::debug!(method, url, "record store request");

        let response = self
            .agent
            .request(method, url)
            .set("X-Project-Id", &self.project_id)
            .set("Authorization", &format!("Bearer {}", self.public_key))
            .send_json(body);

        let response = match response {
            Ok(response) => response,
            // The backend still answers with an envelope on error statuses
            Err(ureq::Error::Status(code, response)) => {
                tracing::warn!(status = code, url, "record store returned an error status");
                response
            }
            Err(e) => {
                return Err(StorageError::RequestFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let text = response
            .into_string()
            .map_err(|e| StorageError::InvalidResponse {
                url: url.to_string(),
                source: e,
            })?;
        parse_envelope(url, &text)
    }
}

fn parse_envelope(url: &str, text: &str) -> Result<Envelope, StorageError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| StorageError::InvalidResponse {
            url: url.to_string(),
            source: e.into(),
        })?;
    if !envelope.success {
        return Err(StorageError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "no message given".to_string()),
        ));
    }
    Ok(envelope)
}

fn into_outcomes(envelope: Envelope) -> Vec<RecordOutcome> {
    envelope
        .results
        .unwrap_or_default()
        .into_iter()
        .map(|result| RecordOutcome {
            success: result.success,
            data: result.data,
            message: result.message,
        })
        .collect()
}

fn field_list(fields: &[String]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|name| json!({ "field": { "Name": name } }))
            .collect(),
    )
}

/// Request body for `fetchRecords`.
fn fetch_body(query: &RecordQuery) -> Value {
    let mut body = json!({
        "fields": field_list(&query.fields),
        "where": query.conditions.iter().map(|condition| json!({
            "FieldName": condition.field,
            "Operator": "EqualTo",
            "Values": condition.values,
        })).collect::<Vec<_>>(),
    });
    if let Some(order) = &query.order_by {
        body["orderBy"] = json!([{
            "fieldName": order.field,
            "sorttype": if order.descending { "DESC" } else { "ASC" },
        }]);
    }
    if let Some(limit) = query.limit {
        body["pagingInfo"] = json!({ "limit": limit, "offset": query.offset });
    }
    body
}

impl RecordStore for HttpRecordStore {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        let url = format!("{}/fetch", self.records_url(table));
        let envelope = self.send("POST", &url, fetch_body(query))?;

        Ok(match envelope.data {
            Value::Array(rows) => rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        })
    }

    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError> {
        let url = format!("{}/{}/fetch", self.records_url(table), id);
        let envelope = self.send("POST", &url, json!({ "fields": field_list(fields) }))?;

        Ok(match envelope.data {
            Value::Object(record) => Some(record),
            _ => None,
        })
    }

    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        let url = self.records_url(table);
        let envelope = self.send("POST", &url, json!({ "records": records }))?;
        Ok(into_outcomes(envelope))
    }

    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        let url = self.records_url(table);
        let envelope = self.send("PUT", &url, json!({ "records": records }))?;
        Ok(into_outcomes(envelope))
    }

    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        let url = self.records_url(table);
        let envelope = self.send("DELETE", &url, json!({ "RecordIds": ids }))?;
        Ok(into_outcomes(envelope))
    }
}
