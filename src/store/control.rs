//! Scaling control plane clients.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{RouterError, RouterResult};
use crate::scaling::redistribute::ScaleRequest;
use crate::store::ScalingControl;

/// Control plane stand-in that logs and keeps every request.
///
/// Used when no control plane URL is configured, and by tests.
#[derive(Debug, Default)]
pub struct RecordingControl {
    requests: Mutex<Vec<ScaleRequest>>,
    unavailable: AtomicBool,
}

impl RecordingControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ScaleRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    /// Make subsequent calls fail, to exercise error paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

#[async_trait]
impl ScalingControl for RecordingControl {
    async fn scale(&self, request: &ScaleRequest) -> RouterResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RouterError::control(format!(
                "cannot update {}: control plane unavailable",
                request.endpoint_name
            )));
        }

        tracing::info!(
            endpoint = %request.endpoint_name,
            variant = %request.variant_name,
            desired_instance_count = request.desired_instance_count,
            "Scale request recorded"
        );
        self.requests
            .lock()
            .map_err(|_| RouterError::control("request log poisoned"))?
            .push(request.clone());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DesiredWeightAndCapacity<'a> {
    variant_name: &'a str,
    desired_instance_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateCapacityBody<'a> {
    endpoint_name: &'a str,
    desired_weights_and_capacities: [DesiredWeightAndCapacity<'a>; 1],
}

/// Control plane reached over HTTP.
///
/// Each request is a `POST {base}/endpoints/{endpoint}/capacity` carrying a
/// single desired weight-and-capacity entry.
#[derive(Debug, Clone)]
pub struct HttpScalingControl {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScalingControl {
    pub fn new(base_url: &str, timeout: Duration) -> RouterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::control(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ScalingControl for HttpScalingControl {
    async fn scale(&self, request: &ScaleRequest) -> RouterResult<()> {
        let url = format!("{}/endpoints/{}/capacity", self.base_url, request.endpoint_name);
        let body = UpdateCapacityBody {
            endpoint_name: &request.endpoint_name,
            desired_weights_and_capacities: [DesiredWeightAndCapacity {
                variant_name: &request.variant_name,
                desired_instance_count: request.desired_instance_count,
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RouterError::control(format!("{}: {}", request.endpoint_name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RouterError::control(format!(
                "{} returned {}: {}",
                request.endpoint_name, status, text
            )));
        }

        tracing::info!(
            endpoint = %request.endpoint_name,
            desired_instance_count = request.desired_instance_count,
            "Scale request accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: u64) -> ScaleRequest {
        ScaleRequest {
            backend_id: "server1".into(),
            endpoint_name: "llm-server1".into(),
            variant_name: "AllTraffic".into(),
            desired_instance_count: count,
        }
    }

    #[tokio::test]
    async fn test_recording_control_keeps_order() {
        let control = RecordingControl::new();
        control.scale(&request(2)).await.unwrap();
        control.scale(&request(0)).await.unwrap();
        let counts: Vec<u64> = control.requests().iter().map(|r| r.desired_instance_count).collect();
        assert_eq!(counts, vec![2, 0]);

        control.clear();
        assert!(control.requests().is_empty());
    }

    #[tokio::test]
    async fn test_recording_control_unavailable() {
        let control = RecordingControl::new();
        control.set_unavailable(true);
        let err = control.scale(&request(1)).await.unwrap_err();
        assert!(matches!(err, RouterError::CollaboratorUnavailable { .. }));
        assert!(control.requests().is_empty());
    }

    #[test]
    fn test_capacity_body_shape() {
        let body = UpdateCapacityBody {
            endpoint_name: "llm-server1",
            desired_weights_and_capacities: [DesiredWeightAndCapacity {
                variant_name: "AllTraffic",
                desired_instance_count: 3,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["EndpointName"], "llm-server1");
        assert_eq!(json["DesiredWeightsAndCapacities"][0]["VariantName"], "AllTraffic");
        assert_eq!(json["DesiredWeightsAndCapacities"][0]["DesiredInstanceCount"], 3);
    }
}
