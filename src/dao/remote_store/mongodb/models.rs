//! Conversions between the JSON records the tracker writes and BSON documents.

use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

use super::error::{MongoDaoError, MongoResult};
use crate::dao::remote_store::RemoteRecord;

pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => Bson::Int64(int),
            None => Bson::Double(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => Bson::String(text),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(object_to_document(map)),
    }
}

fn object_to_document(map: Map<String, Value>) -> Document {
    map.into_iter()
        .map(|(key, value)| (key, json_to_bson(value)))
        .collect()
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(int) => Value::from(int),
        Bson::Int64(int) => Value::from(int),
        Bson::Double(float) => Value::from(float),
        Bson::String(text) => Value::String(text),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(document) => Value::Object(document_to_object(document)),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(at) => Value::from(at.timestamp_millis()),
        other => Value::String(other.to_string()),
    }
}

fn document_to_object(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}

/// Convert a record into the document to insert or `$set`.
pub fn record_document(record: Value) -> MongoResult<Document> {
    match record {
        Value::Object(map) => Ok(object_to_document(map)),
        _ => Err(MongoDaoError::NotAnObject),
    }
}

/// Split a stored document into its hex identifier and body.
pub fn into_record(mut document: Document) -> Option<RemoteRecord> {
    let id = match document.remove("_id")? {
        Bson::ObjectId(id) => id.to_hex(),
        Bson::String(id) => id,
        _ => return None,
    };
    Some(RemoteRecord {
        id,
        body: Value::Object(document_to_object(document)),
    })
}
