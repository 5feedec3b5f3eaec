use serde::Deserialize;
use thiserror::Error;

/// One backend record, resolved to the shape it was sent in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// Reasoning and answer arrive in separate fields.
    Structured { thinking: String, content: String },
    /// A single content delta that may embed `<think>` / `</think>`.
    Tagged { content: String },
    /// The backend reported an error in-band.
    Failed { error: String },
}

/// A relayed line that is not a JSON object of the expected form
#[derive(Debug, Error)]
#[error("Malformed stream record: {0}")]
pub struct MalformedRecord(#[from] serde_json::Error);

#[derive(Debug, Default, Deserialize)]
struct Fragments {
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Ollama nests the deltas under `message`; other producers put them at the
/// top level.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    message: Option<Fragments>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    top: Fragments,
}

impl StreamRecord {
    /// `Ok(None)` for well-formed records that carry nothing to render,
    /// such as Ollama's final `done` record.
    pub fn parse(line: &str) -> Result<Option<Self>, MalformedRecord> {
        let raw: RawRecord = serde_json::from_str(line)?;
        Ok(raw.resolve())
    }
}

impl RawRecord {
    fn resolve(self) -> Option<StreamRecord> {
        if let Some(error) = self.error {
            return Some(StreamRecord::Failed { error });
        }

        match self.message.unwrap_or(self.top) {
            Fragments {
                thinking: Some(thinking),
                content,
            } => Some(StreamRecord::Structured {
                thinking,
                content: content.unwrap_or_default(),
            }),
            Fragments {
                thinking: None,
                content: Some(content),
            } => Some(StreamRecord::Tagged { content }),
            Fragments {
                thinking: None,
                content: None,
            } => None,
        }
    }
}
