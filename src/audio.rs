use crate::error::AppError;
use crate::storage::Storage;

/// Stores engine sound uploads and answers with a fixed diagnosis.
///
/// No audio analysis happens here; the bytes are kept for traceability.
pub struct AudioStub {
    storage: Storage,
    message: String,
}

impl AudioStub {
    pub fn new(storage: Storage, message: String) -> Self {
        AudioStub { storage, message }
    }

    pub async fn process_audio(
        &self,
        file_name: &str,
        audio_data: &[u8],
    ) -> Result<String, AppError> {
        if audio_data.is_empty() {
            return Err(AppError::invalid("No file uploaded"));
        }
        let path = self.storage.save_upload(file_name, audio_data).await?;
        tracing::info!("Stored audio upload {} ({} bytes)", path.display(), audio_data.len());
        Ok(self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AUDIO_MESSAGE;

    #[tokio::test]
    async fn stores_bytes_and_returns_canned_message() {
        let root = tempfile::tempdir().unwrap();
        let uploads = root.path().join("uploads");
        let storage = Storage::open(&uploads, &root.path().join("results")).await.unwrap();
        let stub = AudioStub::new(storage, DEFAULT_AUDIO_MESSAGE.to_string());

        let message = stub.process_audio("engine.wav", b"RIFF....").await.unwrap();

        assert_eq!(message, DEFAULT_AUDIO_MESSAGE);
        let stored: Vec<_> = std::fs::read_dir(&uploads).unwrap().collect();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::open(&root.path().join("u"), &root.path().join("r")).await.unwrap();
        let stub = AudioStub::new(storage, "x".into());

        assert!(matches!(
            stub.process_audio("engine.wav", b"").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
