use registry_contract_api::{
    ContractValidators, Method, RequestParts, ResponseError, endpoints, match_request,
};
use registry_contract_core::Registry;
use registry_contract_document::SchemaDocument;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bundled() -> SchemaDocument {
    SchemaDocument::bundled().unwrap()
}

fn bundled_validators() -> ContractValidators {
    let registry: Registry = bundled().registry().unwrap();
    ContractValidators::bind(&registry).unwrap()
}

// ---------------------------------------------------------------------------
// Table against the bundled document
// ---------------------------------------------------------------------------

#[test]
fn test_every_endpoint_is_documented() {
    let document = bundled();
    let paths = &document.value()["paths"];
    assert_eq!(document.paths().count(), endpoints().len());

    for endpoint in endpoints() {
        let path = endpoint.openapi_path();
        let operations = paths
            .get(&path)
            .unwrap_or_else(|| panic!("{path} missing from document"));
        let method = endpoint.method.as_str().to_ascii_lowercase();
        let operation = &operations[method.as_str()];
        assert_eq!(operation["operationId"], json!(endpoint.alias), "{path}");

        for error in &endpoint.errors {
            let status = error.status.to_string();
            assert!(
                operation["responses"].get(&status).is_some(),
                "{path} does not document {status}"
            );
        }
    }
}

#[test]
fn test_bind_against_bundled_registry() {
    let validators = bundled_validators();
    assert_eq!(validators.iter().count(), endpoints().len());
}

// ---------------------------------------------------------------------------
// Request and response validation
// ---------------------------------------------------------------------------

#[test]
fn test_publish_request_and_response() {
    let validators = bundled_validators();
    let publish = validators.get("postV0publish").unwrap();

    let body = json!({
        "name": "io.example/weather",
        "description": "Forecasts",
        "version": "1.0.0",
        "remotes": [{"type": "sse", "url": "https://example.com/sse"}]
    });
    let result = publish.validate_request(&RequestParts::new().with_body(body.clone()));
    assert!(result.is_valid(), "{:?}", result.errors());

    let result = publish.validate_request(
        &RequestParts::new().with_body(json!({"name": "s", "version": "1"})),
    );
    assert_eq!(result.errors()[0].path.to_string(), "body.description");

    let response = publish
        .validate_response(200, &json!({"server": body}))
        .unwrap();
    assert!(response.is_valid(), "{:?}", response.errors());

    let unauthorized = publish
        .validate_response(401, &json!({"error": "Invalid or missing authentication token"}))
        .unwrap();
    assert!(unauthorized.is_valid());
    assert_eq!(
        publish.validate_response(404, &json!({})).err(),
        Some(ResponseError::UnexpectedStatus(404))
    );
}

#[test]
fn test_matched_request_validates() {
    let validators = bundled_validators();
    let matched = match_request(Method::Get, "/v0/servers/weather/versions/1.2.0").unwrap();
    let bound = validators.get(matched.endpoint.alias).unwrap();

    let mut request = RequestParts::new();
    for (name, value) in &matched.params {
        request = request.with_path(*name, value.clone());
    }
    let result = bound.validate_request(&request);
    assert_eq!(
        result.document().unwrap(),
        &json!({"serverName": "weather", "version": "1.2.0"})
    );
}

#[test]
fn test_list_response() {
    let validators = bundled_validators();
    let list = validators.get("getV0servers").unwrap();

    let response = list
        .validate_response(
            200,
            &json!({
                "servers": [{"server": {"name": "s", "description": "d", "version": "1"}}],
                "metadata": {"nextCursor": "abc", "count": 1}
            }),
        )
        .unwrap();
    assert!(response.is_valid(), "{:?}", response.errors());

    let response = list
        .validate_response(200, &json!({"servers": [{"server": {}}]}))
        .unwrap();
    assert_eq!(response.errors().len(), 3);
}
