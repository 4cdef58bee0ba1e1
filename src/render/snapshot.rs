//! Annotated snapshot surface
//!
//! Writes an annotated PNG each time the feedback turns into a success or a
//! failure, so recognition results can be reviewed after a headless run.

use std::path::PathBuf;
use tracing::{debug, warn};

use super::{annotate, RenderSurface, RenderView};
use crate::pipeline::feedback::FeedbackState;

/// Saves annotated frames on feedback changes
#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    last_feedback: FeedbackState,
    written: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_feedback: FeedbackState::Neutral,
            written: 0,
        }
    }

    /// Number of snapshots written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn file_name(&self, feedback: &FeedbackState) -> String {
        let tag = match feedback {
            FeedbackState::Success(text) => sanitize(text),
            _ => "failed".to_string(),
        };
        format!("snapshot-{:04}-{}.png", self.written + 1, tag)
    }
}

/// Keep only characters safe in a file name
fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(32)
        .collect();
    if cleaned.is_empty() {
        "plate".to_string()
    } else {
        cleaned
    }
}

impl RenderSurface for SnapshotWriter {
    fn present(&mut self, view: &RenderView<'_>) {
        if view.feedback == &self.last_feedback {
            return;
        }
        self.last_feedback = view.feedback.clone();

        if matches!(view.feedback, FeedbackState::Neutral) {
            return;
        }
        let Some(frame) = view.frame else {
            return;
        };

        let path = self.dir.join(self.file_name(view.feedback));
        match annotate(frame, view).save(&path) {
            Ok(()) => {
                self.written += 1;
                debug!("Saved snapshot {:?}", path);
            }
            Err(e) => warn!("Failed to save snapshot {:?}: {}", path, e),
        }
    }
}
