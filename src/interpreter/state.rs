use super::record::StreamRecord;
use super::render::compose;
use super::tags::TagScanner;
use super::ClientError;

/// Buffers of the reply currently streaming.
///
/// Both buffers only ever grow. A turn starts with a fresh state.
#[derive(Debug, Default)]
pub struct RenderState {
    thinking: String,
    answer: String,
    tags: TagScanner,
    /// Set by the first structured record; content-only records are then
    /// plain answer text rather than tag-scanned.
    structured: bool,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn is_thinking_open(&self) -> bool {
        !self.structured && self.tags.is_thinking_open()
    }

    pub fn apply(&mut self, record: StreamRecord) -> Result<(), ClientError> {
        match record {
            StreamRecord::Structured { thinking, content } => {
                self.structured = true;
                self.thinking.push_str(&thinking);
                self.answer.push_str(&content);
            }
            StreamRecord::Tagged { content } if self.structured => {
                self.answer.push_str(&content);
            }
            StreamRecord::Tagged { content } => {
                self.tags.feed(&content, &mut self.thinking, &mut self.answer);
            }
            StreamRecord::Failed { error } => {
                return Err(ClientError::BackendUnavailable(error));
            }
        }
        Ok(())
    }

    /// Flush text held back by the tag scanner. Returns whether the buffers changed.
    pub fn finish(&mut self) -> bool {
        self.tags.finish(&mut self.thinking, &mut self.answer)
    }

    pub fn compose(&self) -> String {
        compose(&self.thinking, &self.answer)
    }

    pub fn into_answer(self) -> String {
        self.answer
    }
}
