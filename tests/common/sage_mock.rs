use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount a token endpoint that answers refresh grants and must be hit
/// exactly `expected_calls` times.
#[allow(dead_code)]
pub async fn mount_refresh(server: &MockServer, response: serde_json::Value, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a token endpoint that must never be called.
#[allow(dead_code)]
pub async fn forbid_token_calls(server: &MockServer) {
    Mock::given(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

/// Mount `GET /v3.1/contacts` returning `body`.
#[allow(dead_code)]
pub async fn mount_contacts(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v3.1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
