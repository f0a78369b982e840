//! AWS Rekognition `DetectLabels` client.
//!
//! Speaks the JSON 1.1 protocol directly over blocking HTTPS (ureq) with
//! SigV4 signing, so the call stays a plain synchronous function call inside
//! the frame loop.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use super::client::{LabelClient, ServiceError, ServiceErrorKind};
use super::result::{BoundingBox, Label, LabelResult};
use super::sigv4::{amz_date, CanonicalRequest, Signer};
use crate::config::{Config, ConfigError, Credentials, ENV_ENDPOINT};
use crate::frame::Frame;

const SERVICE: &str = "rekognition";
const TARGET: &str = "RekognitionService.DetectLabels";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Largest image Rekognition accepts as inline bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Error codes that signal a temporary condition on the service side.
const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "InternalServerError",
    "ServiceUnavailableException",
    "LimitExceededException",
    "RequestTimeoutException",
];

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsRequest<'a> {
    image: ImagePayload<'a>,
    max_labels: u32,
    min_confidence: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImagePayload<'a> {
    bytes: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsResponse {
    #[serde(default)]
    labels: Vec<WireLabel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLabel {
    name: String,
    confidence: f32,
    #[serde(default)]
    instances: Vec<WireInstance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireInstance {
    bounding_box: Option<WireBoundingBox>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBoundingBox {
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    left: f32,
    #[serde(default)]
    top: f32,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

pub struct RekognitionClient {
    agent: ureq::Agent,
    endpoint: Url,
    region: String,
    credentials: Credentials,
}

impl RekognitionClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let endpoint = match config.endpoint() {
            Some(url) => url.clone(),
            None => regional_endpoint(config.region())?,
        };
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        log::info!(
            "Successfully initialized Rekognition client in region '{}' ({})",
            config.region(),
            endpoint
        );
        Ok(Self {
            agent: builder.build(),
            endpoint,
            region: config.region().to_string(),
            credentials: config.credentials().clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn send(&self, body: &[u8]) -> Result<String, ServiceError> {
        let now = Utc::now();
        let host = host_header(&self.endpoint);
        let date = amz_date(now);

        let mut headers = vec![
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            ("Host".to_string(), host),
            ("X-Amz-Date".to_string(), date),
            ("X-Amz-Target".to_string(), TARGET.to_string()),
        ];
        if let Some(token) = self.credentials.session_token() {
            headers.push(("X-Amz-Security-Token".to_string(), token.to_string()));
        }

        let canonical = CanonicalRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers,
            payload: body,
        };
        let signer = Signer {
            credentials: &self.credentials,
            region: &self.region,
            service: SERVICE,
        };
        let authorization = signer.authorization(&canonical, now);

        let mut request = self.agent.post(self.endpoint.as_str());
        for (name, value) in &canonical.headers {
            // ureq derives Host from the URL.
            if name != "Host" {
                request = request.set(name, value);
            }
        }
        request = request.set("Authorization", &authorization);

        match request.send_bytes(body) {
            Ok(response) => response.into_string().map_err(|e| {
                ServiceError::transient(format!("failed to read Rekognition response: {e}"))
            }),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(error_from_status(status, &body))
            }
            Err(ureq::Error::Transport(transport)) => Err(ServiceError::transient(format!(
                "Rekognition request failed: {transport}"
            ))),
        }
    }
}

impl LabelClient for RekognitionClient {
    fn name(&self) -> &'static str {
        "rekognition"
    }

    fn detect(&mut self, frame: &Frame, config: &Config) -> Result<LabelResult, ServiceError> {
        log::debug!("Encoding frame {} to JPEG...", frame.sequence());
        let jpeg = frame
            .encode_jpeg(config.jpeg_quality())
            .map_err(|e| ServiceError::transient(format!("failed to encode frame: {e}")))?;
        if jpeg.len() > MAX_IMAGE_BYTES {
            return Err(ServiceError::permanent(format!(
                "encoded frame is {} bytes, above the {} byte limit",
                jpeg.len(),
                MAX_IMAGE_BYTES
            ))
            .with_code("ImageTooLargeException"));
        }

        let body = encode_request(&jpeg, config)?;
        log::info!("Calling Rekognition detect_labels API...");
        let raw = self.send(&body)?;
        let labels = parse_response(&raw)?.constrain(config);
        log::info!("Rekognition detected {} labels.", labels.len());
        log::debug!("Rekognition response: {raw}");
        Ok(labels)
    }
}

fn regional_endpoint(region: &str) -> Result<Url, ConfigError> {
    let raw = format!("https://{SERVICE}.{region}.amazonaws.com/");
    Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        key: ENV_ENDPOINT,
        value: raw,
        reason: e.to_string(),
    })
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn encode_request(jpeg: &[u8], config: &Config) -> Result<Vec<u8>, ServiceError> {
    let encoded = BASE64.encode(jpeg);
    let request = DetectLabelsRequest {
        image: ImagePayload { bytes: &encoded },
        max_labels: config.max_labels(),
        min_confidence: config.min_confidence(),
    };
    serde_json::to_vec(&request)
        .map_err(|e| ServiceError::permanent(format!("failed to serialize request: {e}")))
}

fn parse_response(raw: &str) -> Result<LabelResult, ServiceError> {
    let response: DetectLabelsResponse = serde_json::from_str(raw).map_err(|e| {
        ServiceError::permanent(format!("malformed DetectLabels response: {e}"))
    })?;
    let labels = response
        .labels
        .into_iter()
        .map(|wire| Label {
            name: wire.name,
            confidence: wire.confidence,
            instances: wire
                .instances
                .into_iter()
                .filter_map(|instance| instance.bounding_box)
                .map(|b| BoundingBox {
                    left: b.left,
                    top: b.top,
                    width: b.width,
                    height: b.height,
                })
                .collect(),
        })
        .collect();
    Ok(LabelResult::new(labels))
}

fn error_from_status(status: u16, body: &str) -> ServiceError {
    let wire: WireError = serde_json::from_str(body).unwrap_or_default();
    // `__type` may be namespaced, e.g. "com.amazonaws.rekognition#ThrottlingException".
    let code = wire
        .error_type
        .as_deref()
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string());
    let message = wire
        .message
        .unwrap_or_else(|| format!("HTTP {status} from Rekognition"));
    let error = match classify(status, code.as_deref()) {
        ServiceErrorKind::Transient => ServiceError::transient(message),
        ServiceErrorKind::Permanent => ServiceError::permanent(message),
    };
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

/// Decide whether a failed call is worth skipping over or must stop the loop.
pub fn classify(status: u16, code: Option<&str>) -> ServiceErrorKind {
    if code.is_some_and(|c| TRANSIENT_CODES.contains(&c)) {
        return ServiceErrorKind::Transient;
    }
    match status {
        429 | 500..=599 => ServiceErrorKind::Transient,
        _ => ServiceErrorKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn config() -> Config {
        Config::from_environment(&Environment::from_pairs([
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_REGION", "us-west-2"),
            ("LIVE_LABELS_MAX_LABELS", "3"),
            ("LIVE_LABELS_MIN_CONFIDENCE", "60"),
        ]))
        .expect("config")
    }

    #[test]
    fn default_endpoint_is_regional() -> Result<(), ConfigError> {
        let client = RekognitionClient::new(&config())?;
        assert_eq!(
            client.endpoint().as_str(),
            "https://rekognition.us-west-2.amazonaws.com/"
        );
        Ok(())
    }

    #[test]
    fn request_body_carries_image_and_options() -> Result<(), ServiceError> {
        let body = encode_request(&[0xFF, 0xD8, 0xFF, 0xD9], &config())?;
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(value["Image"]["Bytes"], "/9j/2Q==");
        assert_eq!(value["MaxLabels"], 3);
        assert_eq!(value["MinConfidence"], 60.0);
        Ok(())
    }

    #[test]
    fn parses_labels_with_instances() -> Result<(), ServiceError> {
        let raw = r#"{
            "Labels": [
                {"Name": "Person", "Confidence": 98.2, "Instances": [
                    {"BoundingBox": {"Width": 0.5, "Height": 0.8, "Left": 0.1, "Top": 0.1}, "Confidence": 97.0}
                ], "Parents": []},
                {"Name": "Chair", "Confidence": 76.5}
            ],
            "LabelModelVersion": "3.0"
        }"#;
        let result = parse_response(raw)?;
        assert_eq!(result.len(), 2);
        assert_eq!(result.labels()[0].name, "Person");
        assert_eq!(result.labels()[0].instances.len(), 1);
        assert_eq!(result.labels()[0].instances[0].width, 0.5);
        assert!(result.labels()[1].instances.is_empty());
        Ok(())
    }

    #[test]
    fn malformed_response_is_permanent() {
        let err = parse_response("<html>").unwrap_err();
        assert_eq!(err.kind(), ServiceErrorKind::Permanent);
    }

    #[test]
    fn classifies_service_errors() {
        assert_eq!(
            classify(400, Some("ThrottlingException")),
            ServiceErrorKind::Transient
        );
        assert_eq!(classify(503, None), ServiceErrorKind::Transient);
        assert_eq!(classify(429, None), ServiceErrorKind::Transient);
        assert_eq!(
            classify(400, Some("AccessDeniedException")),
            ServiceErrorKind::Permanent
        );
        assert_eq!(
            classify(400, Some("InvalidImageFormatException")),
            ServiceErrorKind::Permanent
        );
        assert_eq!(classify(403, None), ServiceErrorKind::Permanent);
    }

    #[test]
    fn status_errors_keep_unqualified_code() {
        let err = error_from_status(
            400,
            r#"{"__type":"com.amazonaws.rekognition#ProvisionedThroughputExceededException","message":"slow down"}"#,
        );
        assert!(err.is_transient());
        assert_eq!(err.code(), Some("ProvisionedThroughputExceededException"));
        assert_eq!(err.message(), "slow down");

        let err = error_from_status(400, r#"{"__type":"UnrecognizedClientException","Message":"bad token"}"#);
        assert!(!err.is_transient());
        assert_eq!(err.message(), "bad token");

        let err = error_from_status(502, "gateway down");
        assert!(err.is_transient());
        assert_eq!(err.code(), None);
    }
}
