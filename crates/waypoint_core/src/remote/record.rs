//! Entity <-> remote record mapping.
//!
//! The record name is the entity id; the field dictionary is the entity's
//! serde representation without `id`.

use crate::model::entity::Entity;
use crate::remote::client::RemoteRecord;
use crate::repo::RepoError;
use serde_json::Value;

const ID_FIELD: &str = "id";

/// Maps an entity to its backend record shape.
pub fn encode<E: Entity>(entity: &E) -> Result<RemoteRecord, RepoError> {
    let value = serde_json::to_value(entity)
        .map_err(|err| RepoError::ConversionFailed(format!("encode {}: {err}", E::KIND)))?;
    let Value::Object(mut fields) = value else {
        return Err(RepoError::ConversionFailed(format!(
            "encode {}: entity did not serialize to an object",
            E::KIND
        )));
    };
    fields.remove(ID_FIELD);

    Ok(RemoteRecord {
        record_type: E::KIND.record_type().to_string(),
        record_name: entity.id().to_string(),
        fields,
    })
}

/// Parses a backend record back into an entity.
///
/// Fails with `ConversionFailed` on a type mismatch, an invalid record name,
/// or missing/malformed fields.
pub fn decode<E: Entity>(record: &RemoteRecord) -> Result<E, RepoError> {
    if record.record_type != E::KIND.record_type() {
        return Err(RepoError::ConversionFailed(format!(
            "expected record type `{}`, got `{}`",
            E::KIND.record_type(),
            record.record_type
        )));
    }

    let mut fields = record.fields.clone();
    fields.insert(
        ID_FIELD.to_string(),
        Value::String(record.record_name.clone()),
    );
    let entity: E = serde_json::from_value(Value::Object(fields)).map_err(|err| {
        RepoError::ConversionFailed(format!(
            "decode {} `{}`: {err}",
            E::KIND,
            record.record_name
        ))
    })?;
    Ok(entity)
}
