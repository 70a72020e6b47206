//! Remote processing API client
//!
//! Two blocking calls per fetch: an OAuth2 client-credentials exchange for a
//! bearer token, then one processing request whose response body is the
//! rendered raster. Both calls carry their own time limit.

use std::env;
use std::io::Write;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ImageryConfig;
use crate::error::{Error, RemoteProcessingError, Result};

use super::{ImageryClient, ImageryRequest};

/// Collection identifier requested from the processing API
pub const DATA_TYPE: &str = "sentinel-2-l2a";

/// True-colour rendering program evaluated server-side
pub const TRUE_COLOR_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["B04", "B03", "B02"],
    output: { bands: 3 }
  };
}

function evaluatePixel(s) {
  return [s.B04, s.B03, s.B02];
}
"#;

/// OAuth2 client credentials
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }

    /// Reads both values from the environment; unset or blank counts as absent.
    pub fn from_env(id_var: &str, secret_var: &str) -> Option<Self> {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Some(Self::new(read(id_var)?, read(secret_var)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Server-side compositing order across the time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MosaickingOrder {
    #[serde(rename = "leastCC")]
    LeastCloudCover,
    #[serde(rename = "mostRecent")]
    MostRecent,
    #[serde(rename = "leastRecent")]
    LeastRecent,
}

/// Blocking client for the processing API
#[derive(Debug)]
pub struct ProcessApiClient {
    http: Client,
    token_url: String,
    process_url: String,
    credentials: Option<Credentials>,
    mosaicking_order: Option<MosaickingOrder>,
    auth_timeout: Duration,
    fetch_timeout: Duration,
}

impl ProcessApiClient {
    /// Builds a client from configuration, taking credentials from the
    /// configured environment variables.
    ///
    /// Missing credentials are not an error here; they surface as
    /// [`Error::Authentication`] on the first fetch.
    pub fn from_config(config: &ImageryConfig) -> Result<Self> {
        let credentials = Credentials::from_env(&config.client_id_env, &config.client_secret_env);
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(config: &ImageryConfig, credentials: Option<Credentials>) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            process_url: config.process_url.clone(),
            credentials,
            mosaicking_order: config.mosaicking_order,
            auth_timeout: Duration::from_secs(config.auth_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    /// Exchanges the client credentials for a bearer token
    pub fn fetch_token(&self) -> Result<String> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::Authentication("client id and secret are not set".to_string())
        })?;

        debug!(url = %self.token_url, "requesting access token");
        let response = self
            .http
            .post(&self.token_url)
            .timeout(self.auth_timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .map_err(|e| Error::from_http(e, "token exchange", self.auth_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Authentication(format!(
                "token endpoint answered {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| Error::Authentication(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    fn remote_error(response: Response, request: &ImageryRequest) -> RemoteProcessingError {
        let status = response.status();
        let text = response.text().unwrap_or_default();
        let body = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .filter(|v| v.is_object());
        let raw_body = match body {
            None if !text.is_empty() => Some(excerpt(&text)),
            _ => None,
        };

        RemoteProcessingError {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
            raw_body,
            bbox: request.bbox,
            width: request.size.width,
            height: request.size.height,
        }
    }
}

impl ImageryClient for ProcessApiClient {
    fn name(&self) -> &str {
        "process-api"
    }

    fn fetch_rgb(&self, request: &ImageryRequest, sink: &mut dyn Write) -> Result<u64> {
        let token = self.fetch_token()?;
        let payload = ProcessRequest::new(request, self.mosaicking_order);

        info!(
            bbox = ?[request.bbox.min_x, request.bbox.min_y, request.bbox.max_x, request.bbox.max_y],
            width = request.size.width,
            height = request.size.height,
            "requesting imagery"
        );
        let mut response = self
            .http
            .post(&self.process_url)
            .timeout(self.fetch_timeout)
            .bearer_auth(&token)
            .header(ACCEPT, "image/tiff")
            .json(&payload)
            .send()
            .map_err(|e| Error::from_http(e, "imagery fetch", self.fetch_timeout))?;

        if !response.status().is_success() {
            return Err(Self::remote_error(response, request).into());
        }

        let written = response
            .copy_to(sink)
            .map_err(|e| Error::from_http(e, "imagery fetch", self.fetch_timeout))?;
        info!(bytes = written, "imagery received");
        Ok(written)
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(RemoteProcessingError::RAW_BODY_LIMIT).collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct ProcessRequest {
    input: Input,
    output: Output,
    evalscript: &'static str,
}

#[derive(Debug, Serialize)]
struct Input {
    bounds: Bounds,
    data: Vec<DataSource>,
}

#[derive(Debug, Serialize)]
struct Bounds {
    bbox: [f64; 4],
    properties: BoundsProperties,
}

#[derive(Debug, Serialize)]
struct BoundsProperties {
    crs: String,
}

#[derive(Debug, Serialize)]
struct DataSource {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "dataFilter")]
    data_filter: DataFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing: Option<Processing>,
}

#[derive(Debug, Serialize)]
struct DataFilter {
    #[serde(rename = "timeRange")]
    time_range: TimeWindow,
    #[serde(rename = "maxCloudCoverage")]
    max_cloud_coverage: f64,
}

#[derive(Debug, Serialize)]
struct TimeWindow {
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct Processing {
    #[serde(rename = "mosaickingOrder")]
    mosaicking_order: MosaickingOrder,
}

#[derive(Debug, Serialize)]
struct Output {
    width: u32,
    height: u32,
    responses: Vec<OutputResponse>,
}

#[derive(Debug, Serialize)]
struct OutputResponse {
    identifier: &'static str,
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct OutputFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ProcessRequest {
    fn new(request: &ImageryRequest, mosaicking_order: Option<MosaickingOrder>) -> Self {
        let b = request.bbox;
        Self {
            input: Input {
                bounds: Bounds {
                    bbox: [b.min_x, b.min_y, b.max_x, b.max_y],
                    properties: BoundsProperties { crs: request.crs.ogc_url() },
                },
                data: vec![DataSource {
                    kind: DATA_TYPE,
                    data_filter: DataFilter {
                        time_range: TimeWindow {
                            from: request.time_range.start_timestamp(),
                            to: request.time_range.end_timestamp(),
                        },
                        max_cloud_coverage: request.max_cloud,
                    },
                    processing: mosaicking_order.map(|order| Processing { mosaicking_order: order }),
                }],
            },
            output: Output {
                width: request.size.width,
                height: request.size.height,
                responses: vec![OutputResponse {
                    identifier: "default",
                    format: OutputFormat { kind: "image/tiff" },
                }],
            },
            evalscript: TRUE_COLOR_EVALSCRIPT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::TimeRange;
    use crate::projection::Crs;
    use crate::types::{BoundingBox, Dimensions};
    use chrono::NaiveDate;

    fn request() -> ImageryRequest {
        ImageryRequest {
            bbox: BoundingBox::new(126.0, 33.0, 130.0, 38.5),
            crs: Crs::WGS84,
            size: Dimensions::new(2500, 1582),
            time_range: TimeRange::new(
                NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 9, 15).unwrap(),
            )
            .unwrap(),
            max_cloud: 5.0,
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = ProcessRequest::new(&request(), Some(MosaickingOrder::LeastCloudCover));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["input"]["bounds"]["bbox"], serde_json::json!([126.0, 33.0, 130.0, 38.5]));
        assert_eq!(
            json["input"]["bounds"]["properties"]["crs"],
            "http://www.opengis.net/def/crs/EPSG/0/4326"
        );
        let data = &json["input"]["data"][0];
        assert_eq!(data["type"], "sentinel-2-l2a");
        assert_eq!(data["dataFilter"]["timeRange"]["from"], "2023-07-01T00:00:00Z");
        assert_eq!(data["dataFilter"]["timeRange"]["to"], "2023-09-15T23:59:59Z");
        assert_eq!(data["dataFilter"]["maxCloudCoverage"], 5.0);
        assert_eq!(data["processing"]["mosaickingOrder"], "leastCC");
        assert_eq!(json["output"]["width"], 2500);
        assert_eq!(json["output"]["height"], 1582);
        assert_eq!(json["output"]["responses"][0]["format"]["type"], "image/tiff");
        assert!(json["evalscript"].as_str().unwrap().contains("B04"));
    }

    #[test]
    fn test_payload_without_mosaicking_order() {
        let payload = ProcessRequest::new(&request(), None);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["input"]["data"][0].get("processing").is_none());
    }

    #[test]
    fn test_missing_credentials_fail_before_network() {
        let config = ImageryConfig {
            token_url: "http://127.0.0.1:9/token".to_string(),
            process_url: "http://127.0.0.1:9/process".to_string(),
            ..ImageryConfig::default()
        };
        let client = ProcessApiClient::with_credentials(&config, None).unwrap();
        let mut sink = Vec::new();
        let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("id", "very-secret");
        assert!(!format!("{:?}", creds).contains("very-secret"));
    }
}
