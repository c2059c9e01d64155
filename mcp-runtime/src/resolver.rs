//! Galuchat provider client.
//!
//! One batch per call: coordinates are quantized onto the provider grid,
//! posted to the granularity's route, and the positional code array is joined
//! back against the sparse address dictionary. Any failure fails the batch.

use galuchat_core::error::ErrorCode;
use galuchat_core::points::{GeocodeResult, Granularity};
use reqwest::StatusCode;
use serde_json::{Map, Value, json};

use crate::config::ResolverConfig;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("provider request failed: {0}")]
    Api(String),
    #[error("provider rate limit exceeded")]
    RateLimit,
    #[error("provider response does not cover the batch: {0}")]
    OutOfCoverage(String),
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::Api(_) => ErrorCode::ApiError,
            ResolveError::RateLimit => ErrorCode::RateLimit,
            ResolveError::OutOfCoverage(_) => ErrorCode::OutOfCoverage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GaluchatClient {
    http: reqwest::Client,
    config: ResolverConfig,
}

impl GaluchatClient {
    pub fn new(config: ResolverConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Resolve `(lat, lon)` pairs. On success the output is index-aligned
    /// with `coords`.
    pub async fn resolve(
        &self,
        granularity: Granularity,
        coords: &[(f64, f64)],
    ) -> Result<Vec<GeocodeResult>, ResolveError> {
        if coords.is_empty() {
            return Ok(Vec::new());
        }

        let unit = self.config.unit;
        let points: Vec<[i64; 2]> = coords
            .iter()
            .map(|&(lat, lon)| [quantize(lon, unit), quantize(lat, unit)])
            .collect();
        let url = format!("{}{}", self.config.api_url, granularity.provider_path());
        let mapset = self.config.mapsets.for_granularity(granularity);

        tracing::debug!(
            event = "provider_request",
            granularity = granularity.as_str(),
            mapset,
            points = points.len(),
            "Resolving batch"
        );

        let response = self
            .http
            .post(&url)
            .query(&[("mapset", mapset)])
            .json(&json!({ "unit": unit, "points": points }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ResolveError::Api("provider timed out".to_string())
                } else {
                    ResolveError::Api(err.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(event = "provider_rate_limited", "Provider answered 429");
            return Err(ResolveError::RateLimit);
        }
        if status.is_client_error() || status.is_server_error() {
            tracing::warn!(
                event = "provider_error_status",
                status = status.as_u16(),
                "Provider answered with an error status"
            );
            return Err(ResolveError::Api(format!("provider answered {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| ResolveError::Api(err.to_string()))?;
        let body: Value = serde_json::from_slice(&body)
            .map_err(|_| ResolveError::Api("provider answered with a non-JSON body".to_string()))?;

        decode_response(granularity, &body, coords.len())
    }
}

/// Snap a coordinate onto the provider grid, rounding half away from zero.
pub fn quantize(coord: f64, unit: f64) -> i64 {
    (coord / unit).round() as i64
}

/// Join the positional code array with the address dictionary.
pub fn decode_response(
    granularity: Granularity,
    body: &Value,
    expected: usize,
) -> Result<Vec<GeocodeResult>, ResolveError> {
    let key = granularity.codes_key();
    let codes = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ResolveError::OutOfCoverage(format!("response has no `{key}` array")))?;
    if codes.len() != expected {
        return Err(ResolveError::OutOfCoverage(format!(
            "expected {expected} codes, got {}",
            codes.len()
        )));
    }

    // An empty dictionary may arrive as `[]`.
    let empty = Map::new();
    let addresses = body
        .get("addresses")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    codes
        .iter()
        .map(|code| decode_entry(code, addresses))
        .collect()
}

fn decode_entry(code: &Value, addresses: &Map<String, Value>) -> Result<GeocodeResult, ResolveError> {
    let key = match code {
        Value::Null => return Ok(GeocodeResult::uncovered()),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(ResolveError::OutOfCoverage(format!(
                "unexpected code value {other}"
            )));
        }
    };

    match addresses.get(&key) {
        Some(Value::Object(entry)) => {
            let display = entry.get("code").and_then(scalar_text).unwrap_or(key);
            let address: String = entry
                .iter()
                .filter(|(field, _)| field.as_str() != "code")
                .filter_map(|(_, value)| scalar_text(value))
                .collect();
            Ok(GeocodeResult {
                code: Some(display),
                address: (!address.is_empty()).then_some(address),
            })
        }
        Some(Value::String(address)) => Ok(GeocodeResult {
            code: Some(key),
            address: (!address.is_empty()).then(|| address.clone()),
        }),
        _ => Err(ResolveError::OutOfCoverage(format!(
            "code {key} has no address entry"
        ))),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GaluchatClient {
        let mut config = ResolverConfig::new(server.uri());
        config.unit = 1.0;
        GaluchatClient::new(config).unwrap()
    }

    #[test]
    fn quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize(35.6812, 0.001), 35681);
        assert_eq!(quantize(139.7671, 0.001), 139767);
        assert_eq!(quantize(2.5, 1.0), 3);
        assert_eq!(quantize(-2.5, 1.0), -3);
        assert_eq!(quantize(0.0, 0.001), 0);
    }

    #[test]
    fn decode_joins_codes_with_addresses() {
        let body = json!({
            "addresses": {
                "1": {"prefecture": "A", "city": "B"},
                "2": {"prefecture": "C", "city": "D"}
            },
            "aacodes": [1, null, 2]
        });
        let results = decode_response(Granularity::Admin, &body, 3).unwrap();
        assert_eq!(results[0].code.as_deref(), Some("1"));
        assert_eq!(results[0].address.as_deref(), Some("AB"));
        assert_eq!(results[1], GeocodeResult::uncovered());
        assert_eq!(results[2].address.as_deref(), Some("CD"));
    }

    #[test]
    fn address_code_field_overrides_key() {
        let body = json!({
            "addresses": {"10": {"code": "J1", "prefecture": "X", "city": "Y"}},
            "aacodes": [10]
        });
        let results = decode_response(Granularity::Jarl, &body, 1).unwrap();
        assert_eq!(results[0].code.as_deref(), Some("J1"));
        assert_eq!(results[0].address.as_deref(), Some("XY"));
    }

    #[test]
    fn address_fields_keep_declared_order() {
        let body = json!({
            "addresses": {"7": {"ward": "Z", "city": "Y", "prefecture": "X"}},
            "aacodes": [7]
        });
        let results = decode_response(Granularity::Admin, &body, 1).unwrap();
        assert_eq!(results[0].address.as_deref(), Some("ZYX"));
    }

    #[test]
    fn estat_reads_scodes() {
        let body = json!({"addresses": {"131": {"area": "S"}}, "scodes": ["131"]});
        let results = decode_response(Granularity::Estat, &body, 1).unwrap();
        assert_eq!(results[0].code.as_deref(), Some("131"));

        let err = decode_response(Granularity::Admin, &body, 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfCoverage);
    }

    #[test]
    fn missing_dictionary_entry_is_out_of_coverage() {
        let body = json!({"addresses": [], "aacodes": [1]});
        let err = decode_response(Granularity::Admin, &body, 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfCoverage);
    }

    #[test]
    fn length_mismatch_is_out_of_coverage() {
        let body = json!({"addresses": {"1": {"p": "A"}}, "aacodes": [1, 1]});
        let err = decode_response(Granularity::Admin, &body, 3).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfCoverage);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let results = client_for(&server).resolve(Granularity::Admin, &[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn posts_quantized_lon_lat_pairs_with_mapset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rjccs"))
            .and(query_param("mapset", "ma10000"))
            .and(body_json(json!({"unit": 1.0, "points": [[140, 36]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "addresses": {"5": {"area": "Kanto"}},
                "aacodes": [5]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server)
            .resolve(Granularity::Jarl, &[(35.6, 139.7)])
            .await
            .unwrap();
        assert_eq!(results[0].code.as_deref(), Some("5"));
        assert_eq!(results[0].address.as_deref(), Some("Kanto"));
    }

    #[tokio::test]
    async fn repeated_batch_resolves_identically() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raacs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "addresses": {
                    "13101": {"prefecture": "Tokyo", "city": "Chiyoda"},
                    "27128": {"prefecture": "Osaka", "city": "Chuo"}
                },
                "aacodes": [13101, null, 27128]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = GaluchatClient::new(ResolverConfig::new(server.uri())).unwrap();
        let coords = [(35.68123, 139.76712), (0.0, -160.0), (34.68149, 135.50995)];
        let first = client.resolve(Granularity::Admin, &coords).await.unwrap();
        let second = client.resolve(Granularity::Admin, &coords).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[1], GeocodeResult::uncovered());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
        assert_eq!(requests[0].url, requests[1].url);
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["points"][0], json!([139767, 35681]));
    }

    #[tokio::test]
    async fn http_429_maps_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raacs"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve(Granularity::Admin, &[(35.0, 135.0)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimit);
    }

    #[tokio::test]
    async fn server_errors_and_garbage_map_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raacs"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/resareas"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .resolve(Granularity::Admin, &[(35.0, 135.0)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiError);

        let err = client
            .resolve(Granularity::Estat, &[(35.0, 135.0)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiError);
    }

    #[tokio::test]
    async fn timeout_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"aacodes": [null]}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = ResolverConfig::new(server.uri());
        config.timeout = Duration::from_millis(50);
        let err = GaluchatClient::new(config)
            .unwrap()
            .resolve(Granularity::Admin, &[(35.0, 135.0)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ApiError);
    }

    #[tokio::test]
    async fn short_code_array_fails_the_whole_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "addresses": {"1": {"p": "A"}},
                "aacodes": [1, 1]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve(Granularity::Admin, &[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfCoverage);
    }
}
