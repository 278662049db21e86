use serde::Serialize;
use serde_json::Value;

use crate::error::SagepipeError;
use crate::warehouse::{Row, RowError, TableRef, Warehouse};

/// One Sage contact, shaped for the contacts table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRow {
    pub id: Value,
    pub name: Value,
    pub contact_type: Value,
    pub email: Option<String>,
}

impl ContactRow {
    pub fn from_item(item: &Value) -> Self {
        let field = |name: &str| item.get(name).cloned().unwrap_or(Value::Null);
        let email = match item.get("email") {
            Some(Value::Object(email)) => email
                .get("address")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        };
        Self {
            id: field("id"),
            name: field("name"),
            contact_type: field("contact_type"),
            email,
        }
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), self.id.clone());
        row.insert("name".into(), self.name.clone());
        row.insert("contact_type".into(), self.contact_type.clone());
        row.insert("email".into(), self.email.clone().into());
        row
    }
}

/// Outcome of a load: how many rows were sent and which ones were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub errors: Vec<RowError>,
}

impl LoadReport {
    pub fn inserted(&self) -> usize {
        if self.errors.is_empty() {
            self.attempted
        } else {
            0
        }
    }
}

/// Items of a Sage list response: `$items`, falling back to `items`.
pub fn extract_items(response: &Value) -> Vec<Value> {
    let list = |key: &str| {
        response
            .get(key)
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .cloned()
    };
    list("$items").or_else(|| list("items")).unwrap_or_default()
}

pub fn transform(items: &[Value]) -> Vec<ContactRow> {
    items.iter().map(ContactRow::from_item).collect()
}

/// Append `rows` to `table` in a single batch. Rejected rows are logged and
/// returned in the report rather than raised.
pub async fn load(
    warehouse: &dyn Warehouse,
    rows: &[ContactRow],
    table: &TableRef,
) -> Result<LoadReport, SagepipeError> {
    if rows.is_empty() {
        tracing::info!("No contacts to load.");
        return Ok(LoadReport::default());
    }

    let batch: Vec<Row> = rows.iter().map(ContactRow::to_row).collect();
    let errors = warehouse.insert_rows(table, &batch).await?;
    if errors.is_empty() {
        tracing::info!("Inserted {} rows into {table}", rows.len());
    } else {
        for err in &errors {
            tracing::warn!("Error while inserting into {table}: {err}");
        }
    }

    Ok(LoadReport {
        attempted: rows.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Records every insert and answers with canned row errors.
    #[derive(Default)]
    struct RecordingWarehouse {
        inserts: Mutex<Vec<Vec<Row>>>,
        reject: Vec<RowError>,
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn latest_row(
            &self,
            _table: &TableRef,
            _key_column: &str,
            _key: &str,
            _order_column: &str,
        ) -> Result<Option<Row>, SagepipeError> {
            Ok(None)
        }

        async fn insert_rows(
            &self,
            _table: &TableRef,
            rows: &[Row],
        ) -> Result<Vec<RowError>, SagepipeError> {
            self.inserts.lock().unwrap().push(rows.to_vec());
            Ok(self.reject.clone())
        }
    }

    fn table() -> TableRef {
        TableRef::new("acme", "etl_sage", "sage_contacts")
    }

    #[test]
    fn transform_extracts_nested_email() {
        let items = vec![
            json!({ "id": 1, "name": "A", "email": { "address": "a@x.com" } }),
            json!({ "id": 2, "name": "B" }),
        ];
        let rows: Vec<Value> = transform(&items)
            .iter()
            .map(|r| Value::Object(r.to_row()))
            .collect();
        assert_eq!(
            rows,
            vec![
                json!({ "id": 1, "name": "A", "contact_type": null, "email": "a@x.com" }),
                json!({ "id": 2, "name": "B", "contact_type": null, "email": null }),
            ]
        );
    }

    #[test]
    fn transform_ignores_non_object_email() {
        let rows = transform(&[json!({ "id": "c1", "email": "plain@x.com" })]);
        assert_eq!(rows[0].email, None);
        assert_eq!(rows[0].name, Value::Null);
    }

    #[test]
    fn transform_copies_contact_type_as_is() {
        let contact_type = json!({ "id": "CUSTOMER", "displayed_as": "Customer" });
        let rows = transform(&[json!({ "id": "c1", "contact_type": contact_type.clone() })]);
        assert_eq!(rows[0].contact_type, contact_type);
    }

    #[test]
    fn extract_items_prefers_dollar_items() {
        let resp = json!({ "$items": [{ "id": 1 }], "items": [{ "id": 2 }] });
        assert_eq!(extract_items(&resp), vec![json!({ "id": 1 })]);
    }

    #[test]
    fn extract_items_falls_back_to_items() {
        assert_eq!(
            extract_items(&json!({ "$items": [], "items": [{ "id": 2 }] })),
            vec![json!({ "id": 2 })]
        );
        assert_eq!(
            extract_items(&json!({ "items": [{ "id": 3 }] })),
            vec![json!({ "id": 3 })]
        );
        assert!(extract_items(&json!({ "$total": 0 })).is_empty());
        assert!(extract_items(&json!([1, 2])).is_empty());
    }

    #[tokio::test]
    async fn load_empty_makes_no_write() {
        let wh = RecordingWarehouse::default();
        let report = load(&wh, &[], &table()).await.unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(wh.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_writes_one_batch() {
        let wh = RecordingWarehouse::default();
        let rows = transform(&[json!({ "id": 1 }), json!({ "id": 2 }), json!({ "id": 3 })]);
        let report = load(&wh, &rows, &table()).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.inserted(), 3);

        let inserts = wh.inserts.lock().unwrap();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].len(), 3);
        assert_eq!(inserts[0][2]["id"], 3);
    }

    #[tokio::test]
    async fn load_reports_row_errors_without_failing() {
        let wh = RecordingWarehouse {
            reject: vec![RowError {
                index: 0,
                reason: "invalid".into(),
                message: "bad email".into(),
            }],
            ..Default::default()
        };
        let rows = transform(&[json!({ "id": 1 })]);
        let report = load(&wh, &rows, &table()).await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.inserted(), 0);
    }
}
