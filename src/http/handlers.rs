use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{RouterError, RouterResult};
use crate::http::server::AppState;
use crate::pool::{endpoint_name, PoolRecord};
use crate::routing::CounterSource;
use crate::scaling::{CapacityPatch, ScalingState, ScalingStatus, StatusEvent};

/// Header that must be present on every invocation.
pub const INPUT_LOCATION: &str = "InputLocation";

/// Invocation headers passed through to the chosen endpoint.
pub const ALLOWED_HEADERS: [&str; 7] = [
    "Accept",
    "ContentType",
    "CustomAttributes",
    "InferenceId",
    INPUT_LOCATION,
    "InvocationTimeoutSeconds",
    "RequestTTLSeconds",
];

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub server: String,
    pub request_id: Uuid,
    pub request_count: u64,
    pub counter_source: CounterSource,
    pub endpoint_name: String,
    pub input_headers: BTreeMap<String, String>,
}

/// Keep the allow-listed headers under their canonical names.
///
/// Fails when `InputLocation` is missing.
pub fn invocation_headers(headers: &HeaderMap) -> RouterResult<BTreeMap<String, String>> {
    let mut selected = BTreeMap::new();
    for name in ALLOWED_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            selected.insert(name.to_string(), value.to_string());
        }
    }

    if !selected.contains_key(INPUT_LOCATION) {
        return Err(RouterError::InvalidRequest(format!(
            "Missing required header: {}",
            INPUT_LOCATION
        )));
    }
    Ok(selected)
}

pub async fn invoke(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
) -> RouterResult<Json<InvocationResponse>> {
    let input_headers = invocation_headers(&headers)?;
    let decision = state.router.next_server().await?;

    tracing::info!(
        endpoint = %endpoint,
        server = %decision.server,
        request_id = %decision.request_id,
        counter_source = %decision.counter_source,
        "Invocation routed"
    );

    Ok(Json(InvocationResponse {
        endpoint_name: endpoint_name(&endpoint, &decision.server),
        server: decision.server,
        request_id: decision.request_id,
        request_count: decision.request_count,
        counter_source: decision.counter_source,
        input_headers,
    }))
}

pub async fn get_pool(State(state): State<AppState>) -> RouterResult<Json<PoolRecord>> {
    let pool = state.router.pool().await?;
    Ok(Json(PoolRecord::from(&pool)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolUpdate {
    pub servers: Vec<String>,
    pub weights: Vec<i64>,
}

pub async fn put_pool(State(state): State<AppState>, body: Bytes) -> RouterResult<Json<PoolRecord>> {
    let update: PoolUpdate = parse_json(&body)?;
    let pool = state.router.update_pool(update.servers, update.weights).await?;
    Ok(Json(PoolRecord::from(&pool)))
}

/// Public view of a dimension record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionView {
    pub actual_capacity: u64,
    pub desired_capacity: u64,
    pub dimension_name: String,
    pub resource_name: String,
    pub scalable_target_dimension_id: String,
    pub scaling_status: ScalingStatus,
    pub version: u64,
    pub failure_reason: String,
}

impl From<ScalingState> for DimensionView {
    fn from(state: ScalingState) -> Self {
        Self {
            actual_capacity: state.actual_capacity,
            desired_capacity: state.desired_capacity,
            dimension_name: state.dimension_name,
            resource_name: state.resource_name,
            scalable_target_dimension_id: state.dimension_id,
            scaling_status: state.scaling_status,
            version: state.version,
            failure_reason: state.failure_reason,
        }
    }
}

pub async fn get_dimension(
    State(state): State<AppState>,
    Path(dimension_id): Path<String>,
) -> RouterResult<Json<DimensionView>> {
    let record = state.scaling.get(&dimension_id).await?;
    Ok(Json(record.into()))
}

pub async fn patch_dimension(
    State(state): State<AppState>,
    Path(dimension_id): Path<String>,
    body: Bytes,
) -> RouterResult<Json<DimensionView>> {
    let patch: CapacityPatch = if body.is_empty() {
        CapacityPatch::default()
    } else {
        parse_json(&body)?
    };
    tracing::info!(dimension_id = %dimension_id, patch = ?patch, "Capacity update received");

    let applied = state.scaling.patch(&dimension_id, &patch).await?;
    Ok(Json(applied.state.into()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventAccepted {
    pub applied: Vec<String>,
}

pub async fn post_status_event(
    State(state): State<AppState>,
    body: Bytes,
) -> RouterResult<(StatusCode, Json<EventAccepted>)> {
    let event: StatusEvent = parse_json(&body)?;
    tracing::info!(
        resource = ?event.resource_name,
        backend = ?event.backend_id,
        endpoint = ?event.endpoint_name,
        status = %event.status,
        count = ?event.reported_instance_count,
        "Endpoint status event received"
    );

    let applied = state.scaling.handle_event(&event).await?;
    Ok((StatusCode::ACCEPTED, Json(EventAccepted { applied })))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> RouterResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        RouterError::InvalidRequest("Invalid JSON in request body".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_invocation_headers_filters_and_requires_input_location() {
        let mut headers = HeaderMap::new();
        // Header names are case-insensitive on the wire.
        headers.insert("inputlocation", HeaderValue::from_static("s3://bucket/input.json"));
        headers.insert("inferenceid", HeaderValue::from_static("abc"));
        headers.insert("authorization", HeaderValue::from_static("secret"));

        let selected = invocation_headers(&headers).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected["InputLocation"], "s3://bucket/input.json");
        assert_eq!(selected["InferenceId"], "abc");

        headers.remove("inputlocation");
        let err = invocation_headers(&headers).unwrap_err();
        assert_eq!(err.to_string(), "Missing required header: InputLocation");
    }

    #[test]
    fn test_dimension_view_field_names() {
        let state = ScalingState::initial("dim-1", &Default::default(), 0);
        let json = serde_json::to_value(DimensionView::from(state)).unwrap();
        for field in [
            "actualCapacity",
            "desiredCapacity",
            "dimensionName",
            "resourceName",
            "scalableTargetDimensionId",
            "scalingStatus",
            "version",
            "failureReason",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert!(json.get("lastModified").is_none());
    }

    #[test]
    fn test_parse_json_rejects_malformed_body() {
        let err = parse_json::<CapacityPatch>(b"{not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON in request body");
    }
}
