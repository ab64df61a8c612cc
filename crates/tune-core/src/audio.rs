//! Note playback collaborator.

use std::sync::Arc;

use parking_lot::Mutex;

/// Fire-and-forget playback of decoded note buffers.
pub trait AudioSink: Send + Sync {
    /// Plays the note sample named like `C4` or `Bb3`.
    fn play_note(&mut self, name: &str);
}

/// Sink that only logs, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudio;

impl AudioSink for TracingAudio {
    fn play_note(&mut self, name: &str) {
        tracing::info!("[audio] ♪ {}", name);
    }
}

/// Sink that records every played note. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct NoteLog {
    notes: Arc<Mutex<Vec<String>>>,
}

impl NoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes played so far, oldest first.
    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().is_empty()
    }
}

impl AudioSink for NoteLog {
    fn play_note(&mut self, name: &str) {
        self.notes.lock().push(name.to_string());
    }
}
