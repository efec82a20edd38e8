// crates/zonal-providers/tests/narrative_http.rs
// ============================================================================
// Module: Narrative Client Tests
// Description: HTTP narrative generator tests against a local server.
// Purpose: Verify payload handling, error mapping, and size limits.
// Dependencies: zonal-providers, zonal-core, tiny_http, serde_json
// ============================================================================

//! ## Overview
//! Spins a local `tiny_http` server per test and drives the blocking
//! narrative client against it.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::thread;

use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::NarrativeContext;
use zonal_core::NarrativeError;
use zonal_core::NarrativeGenerator;
use zonal_providers::HttpNarrativeConfig;
use zonal_providers::HttpNarrativeGenerator;

fn context() -> NarrativeContext {
    NarrativeContext {
        city: City::from("Pune"),
        parameters: CaseParameters::from_json(&json!({
            "plot_area": 1000.0,
            "location": "urban",
            "road_width": 10.0,
        }))
        .unwrap(),
        matched: Vec::new(),
        rules_found: false,
        summary: "No regulatory rules were found for Pune.".to_string(),
    }
}

fn serve_once(response_body: String, status: u16) -> (String, thread::JoinHandle<Vec<u8>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/narrative", server.server_addr());
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let mut body = Vec::new();
        std::io::Read::read_to_end(&mut request.as_reader(), &mut body).unwrap();
        let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
        let response =
            Response::from_string(response_body).with_header(header).with_status_code(status);
        request.respond(response).unwrap();
        body
    });
    (endpoint, handle)
}

#[test]
fn sends_context_and_returns_narrative_text() {
    let (endpoint, handle) =
        serve_once(json!({"narrative": "All clear for this plot."}).to_string(), 200);
    let client = HttpNarrativeGenerator::new(HttpNarrativeConfig::new(endpoint)).unwrap();

    let text = client.generate(&context()).unwrap();
    assert_eq!(text, "All clear for this plot.");

    let request_body: serde_json::Value = serde_json::from_slice(&handle.join().unwrap()).unwrap();
    assert_eq!(request_body["city"], "Pune");
    assert_eq!(request_body["rules_found"], false);
    assert_eq!(request_body["summary"], "No regulatory rules were found for Pune.");
}

#[test]
fn server_error_maps_to_upstream_failure() {
    let (endpoint, handle) = serve_once("boom".to_string(), 500);
    let client = HttpNarrativeGenerator::new(HttpNarrativeConfig::new(endpoint)).unwrap();

    let error = client.generate(&context()).unwrap_err();
    assert!(matches!(error, NarrativeError::Upstream(_)));
    handle.join().unwrap();
}

#[test]
fn malformed_payload_maps_to_upstream_failure() {
    let (endpoint, handle) = serve_once("not json".to_string(), 200);
    let client = HttpNarrativeGenerator::new(HttpNarrativeConfig::new(endpoint)).unwrap();

    let error = client.generate(&context()).unwrap_err();
    assert!(matches!(error, NarrativeError::Upstream(_)));
    handle.join().unwrap();
}

#[test]
fn oversized_response_is_rejected() {
    let big = json!({"narrative": "x".repeat(4096)}).to_string();
    let (endpoint, handle) = serve_once(big, 200);
    let mut config = HttpNarrativeConfig::new(endpoint);
    config.max_response_bytes = 128;
    let client = HttpNarrativeGenerator::new(config).unwrap();

    let error = client.generate(&context()).unwrap_err();
    assert!(matches!(error, NarrativeError::Upstream(_)));
    handle.join().unwrap();
}

#[test]
fn unreachable_endpoint_fails_without_panicking() {
    let client = HttpNarrativeGenerator::new(HttpNarrativeConfig::new(
        "http://127.0.0.1:1/narrative",
    ))
    .unwrap();
    assert!(client.generate(&context()).is_err());
}
