//! In-process stand-ins for the hosted services, shared by unit tests.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::StatusCode;

use crate::detection::{DetectionClient, DetectionError};
use crate::llm::{LanguageModel, LlmError};
use crate::maintenance::{LookupError, MaintenanceLookup, MaintenanceRecord};
use crate::model::Detection;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 110, 130])));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub struct StaticDetector {
    detections: Vec<Detection>,
    calls: AtomicUsize,
}

impl StaticDetector {
    pub fn new(detections: Vec<Detection>) -> Arc<Self> {
        Arc::new(StaticDetector {
            detections,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionClient for StaticDetector {
    async fn detect(&self, _image_data: &[u8]) -> Result<Vec<Detection>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

pub struct FailingDetector;

#[async_trait]
impl DetectionClient for FailingDetector {
    async fn detect(&self, _image_data: &[u8]) -> Result<Vec<Detection>, DetectionError> {
        Err(DetectionError::Malformed("predictions missing".into()))
    }
}

pub struct RecordingLlm {
    reply: String,
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(RecordingLlm {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn last(&self) -> Option<(String, String)> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for RecordingLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct FailingLlm {
    calls: AtomicUsize,
}

impl FailingLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FailingLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Api {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "upstream overloaded".into(),
        })
    }
}

/// Matches like the SQL `ILIKE '%keyword%'` query.
pub struct StaticLookup {
    records: Vec<(String, MaintenanceRecord)>,
    keywords: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn new(records: Vec<(&str, MaintenanceRecord)>) -> Arc<Self> {
        Arc::new(StaticLookup {
            records: records
                .into_iter()
                .map(|(issue, record)| (issue.to_string(), record))
                .collect(),
            keywords: Mutex::new(Vec::new()),
        })
    }

    pub fn keywords(&self) -> Vec<String> {
        self.keywords.lock().unwrap().clone()
    }
}

#[async_trait]
impl MaintenanceLookup for StaticLookup {
    async fn find(&self, keyword: &str) -> Result<Option<MaintenanceRecord>, LookupError> {
        self.keywords.lock().unwrap().push(keyword.to_string());
        let needle = keyword.to_lowercase();
        Ok(self
            .records
            .iter()
            .find(|(issue, _)| issue.to_lowercase().contains(&needle))
            .map(|(_, record)| record.clone()))
    }
}

pub struct FailingLookup;

#[async_trait]
impl MaintenanceLookup for FailingLookup {
    async fn find(&self, _keyword: &str) -> Result<Option<MaintenanceRecord>, LookupError> {
        Err(LookupError::Database(sqlx::Error::PoolTimedOut))
    }
}
