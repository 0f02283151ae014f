use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_CLASS: &str = "Unknown";

const DEFAULT_CLASSES: [&str; 3] = ["Crack", "Dent", "Other"];

/// Axis aligned box in source image pixels, `(x1, y1)` top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox {
            x1: x - width / 2.0,
            y1: y - height / 2.0,
            x2: x + width / 2.0,
            y2: y + height / 2.0,
        }
    }
}

/// One region reported by the detection service.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDetection {
    pub detection: Detection,
    pub label: String,
    pub confidence: String,
}

impl LabeledDetection {
    pub fn prediction(&self) -> Prediction {
        Prediction {
            label: self.label.clone(),
            confidence: self.confidence.clone(),
        }
    }
}

/// Display data handed back to the client and carried into the next chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: String,
}

#[derive(Debug, Clone)]
pub struct ClassNames {
    labels: Vec<String>,
}

impl Default for ClassNames {
    fn default() -> Self {
        ClassNames {
            labels: DEFAULT_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassNames {
    /// Loads a class list where line N names class N.
    pub fn from_file(path: &std::path::Path) -> std::io::Result<Self> {
        let labels = std::fs::read_to_string(path)?
            .lines()
            .map(|line| line.trim().to_string())
            .collect();
        Ok(ClassNames { labels })
    }

    pub fn name(&self, class_id: u32) -> &str {
        self.labels
            .get(class_id as usize)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_CLASS)
    }

    /// Labels every detection as `{name} #{n}`, where `n` counts earlier
    /// detections of the same class in input order, starting at 1.
    pub fn resolve(&self, detections: &[Detection]) -> Vec<LabeledDetection> {
        let mut seen: HashMap<&str, usize> = HashMap::new();

        detections
            .iter()
            .map(|detection| {
                let name = self.name(detection.class_id);
                let occurrence = seen.entry(name).or_insert(0);
                *occurrence += 1;

                LabeledDetection {
                    detection: detection.clone(),
                    label: format!("{} #{}", name, occurrence),
                    confidence: format_confidence(detection.confidence),
                }
            })
            .collect()
    }
}

pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}
