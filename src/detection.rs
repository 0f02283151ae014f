use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::DetectionConfig;
use crate::model::{BoundingBox, Detection};

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detection request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("detection service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed detection response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DetectionClient: Send + Sync {
    /// Runs object detection on an encoded JPEG/PNG image.
    async fn detect(&self, image_data: &[u8]) -> Result<Vec<Detection>, DetectionError>;
}

#[derive(Deserialize)]
struct RoboflowResponse {
    predictions: Vec<RoboflowPrediction>,
}

#[derive(Deserialize)]
struct RoboflowPrediction {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
    class_id: u32,
}

/// Client for the hosted Roboflow detect endpoint.
pub struct RoboflowClient {
    http_client: Client,
    endpoint: String,
    api_key: String,
}

impl RoboflowClient {
    pub fn new(config: &DetectionConfig) -> Self {
        RoboflowClient {
            http_client: Client::new(),
            endpoint: format!(
                "{}/{}",
                config.api_url.trim_end_matches('/'),
                config.model_id.trim_matches('/')
            ),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl DetectionClient for RoboflowClient {
    async fn detect(&self, image_data: &[u8]) -> Result<Vec<Detection>, DetectionError> {
        let encoded = general_purpose::STANDARD.encode(image_data);

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("api_key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encoded)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DetectionError::Status { status, body });
        }

        parse_detections(&body)
    }
}

pub(crate) fn parse_detections(body: &str) -> Result<Vec<Detection>, DetectionError> {
    let parsed: RoboflowResponse =
        serde_json::from_str(body).map_err(|e| DetectionError::Malformed(e.to_string()))?;

    parsed
        .predictions
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let finite = [p.x, p.y, p.width, p.height, p.confidence]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err(DetectionError::Malformed(format!(
                    "prediction {} has non-finite values",
                    i
                )));
            }
            if !(0.0..=1.0).contains(&p.confidence) {
                return Err(DetectionError::Malformed(format!(
                    "prediction {} has confidence {} outside [0, 1]",
                    i, p.confidence
                )));
            }
            if p.width < 0.0 || p.height < 0.0 {
                return Err(DetectionError::Malformed(format!(
                    "prediction {} has negative size",
                    i
                )));
            }

            Ok(Detection {
                class_id: p.class_id,
                confidence: p.confidence,
                bbox: BoundingBox::from_center(p.x, p.y, p.width, p.height),
            })
        })
        .collect()
}
