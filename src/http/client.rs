use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::auth::BasicCredentials;
use crate::config::RunnerConfig;
use crate::error::{ConfigError, TransportError};

use super::request::RequestInput;
use super::response::HttpResponse;

/// Builds the client shared by every case of a run.
pub fn build_client(config: &RunnerConfig) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(config.timeout())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

pub async fn send_request(
    client: &Client,
    request: RequestInput,
    timeout: Duration,
) -> Result<HttpResponse, TransportError> {
    let headers = build_headers(&request.headers)?;
    let mut req_builder = client
        .request(request.method.into(), request.url)
        .headers(headers);
    req_builder = apply_auth(req_builder, request.basic_auth.as_ref());

    if let Some(body) = request.body {
        req_builder = req_builder.body(body);
    }

    let started = Instant::now();
    let response = req_builder
        .send()
        .await
        .map_err(|e| TransportError::from_reqwest(&e, timeout))?;

    let status = response.status().as_u16();
    let version = format!("{:?}", response.version());
    let headers = format_headers(response.headers());
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::from_reqwest(&e, timeout))?;
    let elapsed = started.elapsed().as_millis();
    let size_bytes = bytes.len();
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(HttpResponse {
        status,
        version,
        duration_ms: elapsed,
        size_bytes,
        headers,
        body,
    })
}

/// Attaches Basic credentials so they go out with the first request.
fn apply_auth(req_builder: RequestBuilder, credentials: Option<&BasicCredentials>) -> RequestBuilder {
    match credentials {
        Some(creds) => req_builder.basic_auth(&creds.username, Some(&creds.password)),
        None => req_builder,
    }
}

/// Checks that a header pair is representable on the wire.
pub(crate) fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| TransportError::Request(format!("invalid header name `{key}`: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::Request(format!("invalid value for header `{key}`: {e}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn format_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}
