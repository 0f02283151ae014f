use std::str::FromStr;
use std::sync::Arc;

use crate::error::AppError;
use crate::llm::LanguageModel;
use crate::maintenance::{issue_keyword, MaintenanceLookup, MaintenanceRecord};
use crate::model::Prediction;

pub const SYSTEM_INSTRUCTION: &str = "Focus on predictive maintenance of aircrafts. \
Do not answer unrelated questions. \
If the query is irrelevant, ask the user to focus on aircraft maintenance.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Audio,
}

impl FromStr for FileKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FileKind::Image),
            "audio" => Ok(FileKind::Audio),
            _ => Err(AppError::invalid("Invalid file type")),
        }
    }
}

/// Opening sentence naming every prediction with its confidence.
pub fn context_sentence(kind: FileKind, predictions: &[Prediction]) -> String {
    let faults = if predictions.is_empty() {
        "no faults".to_string()
    } else {
        predictions
            .iter()
            .map(|p| format!("{} ({})", p.label, p.confidence))
            .collect::<Vec<_>>()
            .join(", ")
    };

    match kind {
        FileKind::Image => format!(
            "The image uploaded shows {} based on the AI prediction.",
            faults
        ),
        FileKind::Audio => format!(
            "The uploaded aircraft sound has been analyzed, and the AI detected {}.",
            faults
        ),
    }
}

/// Composes the prompt for a chat turn and relays it to the language model.
pub struct ChatRelay {
    llm: Arc<dyn LanguageModel>,
    lookup: Option<Arc<dyn MaintenanceLookup>>,
}

impl ChatRelay {
    pub fn new(llm: Arc<dyn LanguageModel>, lookup: Option<Arc<dyn MaintenanceLookup>>) -> Self {
        ChatRelay { llm, lookup }
    }

    pub async fn compose(
        &self,
        prompt: &str,
        predictions: &[Prediction],
        kind: FileKind,
    ) -> String {
        let context = context_sentence(kind, predictions);

        let Some(lookup) = &self.lookup else {
            return format!("{} {}", context, prompt);
        };

        let mut solutions = Vec::with_capacity(predictions.len());
        let mut contacts = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            let record = fetch_or_placeholder(&**lookup, &prediction.label).await;
            solutions.push(format!("{} - {}", prediction.label, record.solution));
            contacts.push(format!(
                "{}: {} ({})",
                prediction.label, record.contact_name, record.contact_number
            ));
        }

        format!(
            "{}\nHere are maintenance solutions:\n{}\nRelevant contacts:\n{}\nUser Question: {}",
            context,
            solutions.join(", "),
            contacts.join(", "),
            prompt
        )
    }

    /// One attempt only; an upstream failure ends the turn.
    pub async fn build_and_relay(
        &self,
        prompt: &str,
        predictions: &[Prediction],
        kind: FileKind,
    ) -> Result<String, AppError> {
        let query = self.compose(prompt, predictions, kind).await;
        tracing::debug!("Chat query: {}", query);

        let reply = self.llm.complete(SYSTEM_INSTRUCTION, &query).await?;
        tracing::info!("Chat reply received ({} chars)", reply.len());
        Ok(reply)
    }
}

async fn fetch_or_placeholder(lookup: &dyn MaintenanceLookup, label: &str) -> MaintenanceRecord {
    // An empty keyword would match every row.
    let keyword = issue_keyword(label);
    if keyword.is_empty() {
        return MaintenanceRecord::placeholder();
    }
    match lookup.find(keyword).await {
        Ok(Some(record)) => record,
        Ok(None) => MaintenanceRecord::placeholder(),
        Err(e) => {
            tracing::warn!("Maintenance lookup for {:?} failed: {}", label, e);
            MaintenanceRecord::placeholder()
        }
    }
}
