//! WireMock-based AirGradient API mocking
//!
//! Serves the cloud `locations/<id>/measures/current` endpoint and the
//! local `/measures/current` endpoint of a monitor.

#![allow(dead_code)]

use serde_json::{json, Value};
use url::Url;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Typical local response of an ONE / Open Air monitor
pub fn current_measures() -> Value {
    json!({
        "wifi": -51,
        "serialno": "84fce612f5b8",
        "rco2": 612,
        "pm01": 3,
        "pm02": 8,
        "pm10": 20,
        "pm003Count": 540,
        "tvocIndex": 50,
        "noxIndex": 5,
        "atmp": 22.4,
        "rhum": 41,
        "firmwareVersion": "3.1.3",
        "locationName": "Office"
    })
}

/// Mock AirGradient endpoints
pub struct MockAirGradient {
    pub server: MockServer,
}

impl MockAirGradient {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as the cloud API root
    pub fn cloud_base_url(&self) -> Url {
        format!("{}/public/api/v1", self.server.uri())
            .parse()
            .expect("mock server uri")
    }

    /// `host:port` to configure as a local device hostname
    pub fn local_hostname(&self) -> String {
        self.server.address().to_string()
    }

    fn cloud_path(location_id: &str) -> String {
        format!("/public/api/v1/locations/{location_id}/measures/current")
    }

    /// Answer the cloud endpoint with `body` while the token matches
    pub async fn mock_cloud(&self, location_id: &str, token: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(Self::cloud_path(location_id)))
            .and(query_param("token", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer the local endpoint with `response`, at most `times` times if given
    pub async fn mock_local(&self, response: ResponseTemplate, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/measures/current"))
            .respond_with(response);
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    pub async fn mock_local_json(&self, body: Value) {
        self.mock_local(ResponseTemplate::new(200).set_body_json(body), None)
            .await;
    }

    /// Number of requests the server has received
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}
