use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{CouchDaoError, CouchResult};
use crate::dao::remote_store::{RemoteCollection, RemoteRecord};

/// Field tagging every document with the collection it belongs to.
pub const COLLECTION_FIELD: &str = "collection";
/// Upper bound on documents returned by one `_find` call.
pub const FIND_LIMIT: u32 = 10_000;

#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Serialize)]
pub struct FindRequest {
    pub selector: Value,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<Value>,
}

/// Turn `record` into a document body tagged with `collection`.
pub fn tagged_document(
    collection: RemoteCollection,
    record: Value,
) -> CouchResult<Map<String, Value>> {
    let Value::Object(mut body) = record else {
        return Err(CouchDaoError::NotAnObject);
    };
    body.insert(COLLECTION_FIELD.into(), Value::from(collection.name()));
    Ok(body)
}

/// Split a stored document into its identifier and caller-visible body.
pub fn into_record(document: Value) -> Option<RemoteRecord> {
    let Value::Object(mut body) = document else {
        return None;
    };
    let id = match body.remove("_id") {
        Some(Value::String(id)) => id,
        _ => return None,
    };
    body.remove("_rev");
    body.remove(COLLECTION_FIELD);
    Some(RemoteRecord {
        id,
        body: Value::Object(body),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stored_bookkeeping_fields_are_stripped() {
        let record = into_record(json!({
            "_id": "abc",
            "_rev": "1-x",
            "collection": "shots",
            "game_id": "g1",
        }))
        .unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.body, json!({"game_id": "g1"}));
    }

    #[test]
    fn only_objects_can_be_tagged() {
        assert!(tagged_document(RemoteCollection::Shots, json!([1, 2])).is_err());
        let body = tagged_document(RemoteCollection::GameEvents, json!({"a": 1})).unwrap();
        assert_eq!(body[COLLECTION_FIELD], "game_events");
    }
}
