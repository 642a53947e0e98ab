//! Decode store API response bodies into fetch outcomes.

use serde::Deserialize;
use serde_json::Value;

use crate::retry::{FetchOutcome, TransportError};
use crate::types::AppId;

/// One row of the catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub appid: AppId,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct AppListEnvelope {
    applist: AppList,
}

#[derive(Deserialize)]
struct AppList {
    #[serde(default)]
    apps: Vec<CatalogEntry>,
}

/// Per-id entry of the details envelope: `{"<id>": {"success": bool, "data": {...}}}`.
#[derive(Deserialize)]
struct DetailsEntry {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
}

/// Parse `{"applist": {"apps": [{"appid": 10, "name": "..."}]}}`.
pub fn parse_app_list(body: &[u8]) -> Result<Vec<CatalogEntry>, TransportError> {
    let envelope: AppListEnvelope = serde_json::from_slice(body)?;
    Ok(envelope.applist.apps)
}

fn details_entry(id: AppId, body: &[u8]) -> Result<DetailsEntry, TransportError> {
    let mut doc: serde_json::Map<String, Value> = serde_json::from_slice(body)?;
    let entry = doc
        .remove(&id.to_string())
        .ok_or_else(|| TransportError::Malformed(format!("no entry for id {id}")))?;
    Ok(serde_json::from_value(entry)?)
}

/// Parse a details response. `success: false`, or success with no data, is
/// "does not exist"; success with a non-empty object is the payload.
pub fn parse_details(id: AppId, body: &[u8]) -> Result<FetchOutcome, TransportError> {
    let entry = details_entry(id, body)?;
    if !entry.success {
        return Ok(FetchOutcome::NotFound);
    }
    match entry.data {
        Some(Value::Object(map)) if !map.is_empty() => Ok(FetchOutcome::Success(Value::Object(map))),
        Some(Value::Object(_)) | Some(Value::Null) | None => Ok(FetchOutcome::NotFound),
        Some(other) => Err(TransportError::Malformed(format!(
            "data for id {id} is not an object: {other}"
        ))),
    }
}

/// Parse a details response as an existence check only.
pub fn parse_existence(id: AppId, body: &[u8]) -> Result<FetchOutcome, TransportError> {
    let entry = details_entry(id, body)?;
    if entry.success {
        Ok(FetchOutcome::Success(Value::Bool(true)))
    } else {
        Ok(FetchOutcome::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_list_rows() {
        let body = br#"{"applist":{"apps":[{"appid":10,"name":"Counter-Strike"},{"appid":20}]}}"#;
        let apps = parse_app_list(body).unwrap();
        assert_eq!(
            apps,
            vec![
                CatalogEntry {
                    appid: 10,
                    name: "Counter-Strike".to_string()
                },
                CatalogEntry {
                    appid: 20,
                    name: String::new()
                },
            ]
        );
    }

    #[test]
    fn app_list_missing_envelope_is_decode_error() {
        assert!(matches!(
            parse_app_list(br#"{"apps":[]}"#),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn details_success_carries_data() {
        let body = br#"{"570":{"success":true,"data":{"name":"Dota 2","steam_appid":570}}}"#;
        match parse_details(570, body).unwrap() {
            FetchOutcome::Success(data) => {
                assert_eq!(data, json!({"name": "Dota 2", "steam_appid": 570}))
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn details_success_false_is_not_found() {
        let body = br#"{"99":{"success":false}}"#;
        assert!(matches!(
            parse_details(99, body).unwrap(),
            FetchOutcome::NotFound
        ));
    }

    #[test]
    fn details_success_without_data_is_not_found() {
        let body = br#"{"5":{"success":true,"data":{}}}"#;
        assert!(matches!(parse_details(5, body).unwrap(), FetchOutcome::NotFound));
        let body = br#"{"5":{"success":true}}"#;
        assert!(matches!(parse_details(5, body).unwrap(), FetchOutcome::NotFound));
    }

    #[test]
    fn details_wrong_id_is_malformed() {
        let body = br#"{"6":{"success":true,"data":{"a":1}}}"#;
        assert!(matches!(
            parse_details(5, body),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn details_non_json_is_decode_error() {
        assert!(matches!(
            parse_details(5, b"<html>busy</html>"),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(
            parse_details(5, b"null"),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn existence_ignores_payload() {
        let body = br#"{"7":{"success":true,"data":{"a":1}}}"#;
        assert!(matches!(
            parse_existence(7, body).unwrap(),
            FetchOutcome::Success(Value::Bool(true))
        ));
        let body = br#"{"7":{"success":false}}"#;
        assert!(matches!(parse_existence(7, body).unwrap(), FetchOutcome::NotFound));
    }
}
