use std::sync::Arc;

use image::ImageFormat;

use crate::annotate::{encode_jpeg, Annotator};
use crate::detection::DetectionClient;
use crate::error::AppError;
use crate::model::{ClassNames, Prediction};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub predictions: Vec<Prediction>,
    /// Name of the annotated image inside the results directory.
    pub annotated_image: String,
}

/// Upload -> detect -> label -> annotate -> store, for one image.
pub struct UploadPipeline {
    detector: Arc<dyn DetectionClient>,
    classes: ClassNames,
    annotator: Annotator,
    storage: Storage,
}

impl UploadPipeline {
    pub fn new(
        detector: Arc<dyn DetectionClient>,
        classes: ClassNames,
        annotator: Annotator,
        storage: Storage,
    ) -> Self {
        UploadPipeline {
            detector,
            classes,
            annotator,
            storage,
        }
    }

    pub async fn process_upload(
        &self,
        file_name: &str,
        image_data: &[u8],
    ) -> Result<UploadOutcome, AppError> {
        if image_data.is_empty() {
            return Err(AppError::invalid("No file uploaded"));
        }

        let format = image::guess_format(image_data)
            .ok()
            .filter(|f| matches!(f, ImageFormat::Jpeg | ImageFormat::Png))
            .ok_or_else(|| AppError::invalid("Unsupported image format, expected JPEG or PNG"))?;
        let image = image::load_from_memory_with_format(image_data, format)
            .map_err(|e| AppError::invalid(format!("Could not decode image: {}", e)))?;

        let upload_path = self.storage.save_upload(file_name, image_data).await?;
        tracing::debug!("Saved upload to {}", upload_path.display());

        let detections = self.detector.detect(image_data).await?;
        let labeled = self.classes.resolve(&detections);

        // Nothing to draw, so the stored result is the upload itself.
        let annotated_image = if labeled.is_empty() {
            let extension = format.extensions_str().first().copied().unwrap_or("jpg");
            self.storage.save_result(extension, image_data).await?
        } else {
            let canvas = self.annotator.annotate(&image, &labeled);
            let encoded = encode_jpeg(&canvas)?;
            self.storage.save_result("jpg", &encoded).await?
        };

        tracing::info!(
            "Analysed {} ({} detections) -> {}",
            file_name,
            labeled.len(),
            annotated_image
        );

        Ok(UploadOutcome {
            predictions: labeled.iter().map(|l| l.prediction()).collect(),
            annotated_image,
        })
    }
}
