//! Conversion job state.
//!
//! ```text
//! Idle ─▶ Opening ─▶ ProcessingPage(0) ─▶ … ─▶ ProcessingPage(N-1) ─▶ Finalizing ─▶ Done
//!            │               │                                            │
//!            └───────────────┴──────▶ Errored | Cancelled ◀───────────────┘
//! ```
//!
//! With zero pages, `Opening` goes straight to `Finalizing`. Pages are
//! entered strictly in order. `Done`, `Errored` and `Cancelled` are
//! terminal.

use crate::config::{OutputMode, QualityFactor};
use crate::error::{PageError, RecodeError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Opening,
    /// 0-based page index.
    ProcessingPage(usize),
    Finalizing,
    Done,
    Errored,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Errored | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::ProcessingPage(i) => write!(f, "ProcessingPage({})", i),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One run of the pipeline over one document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub mode: OutputMode,
    pub quality: QualityFactor,
    pub scale: f32,
    state: JobState,
    page_count: usize,
    pages_done: usize,
    progress: f32,
    skipped: Vec<PageError>,
}

impl ConversionJob {
    pub fn new(mode: OutputMode, quality: QualityFactor, scale: f32) -> Self {
        Self {
            mode,
            quality,
            scale,
            state: JobState::Idle,
            page_count: 0,
            pages_done: 0,
            progress: 0.0,
            skipped: Vec::new(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Pages finished so far, successful or skipped.
    pub fn pages_done(&self) -> usize {
        self.pages_done
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn skipped(&self) -> &[PageError] {
        &self.skipped
    }

    pub(crate) fn take_skipped(&mut self) -> Vec<PageError> {
        std::mem::take(&mut self.skipped)
    }

    fn transition(&mut self, next: JobState) -> Result<(), RecodeError> {
        use JobState::*;
        let allowed = match (self.state, next) {
            (Idle, Opening) => true,
            (Opening, ProcessingPage(0)) => self.page_count > 0,
            (Opening, Finalizing) => self.page_count == 0,
            (ProcessingPage(i), ProcessingPage(j)) => j == i + 1 && j < self.page_count,
            (ProcessingPage(i), Finalizing) => i + 1 == self.page_count,
            (Finalizing, Done) => true,
            (from, Errored | Cancelled) => from != Idle && !from.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(RecodeError::Internal(format!(
                "illegal job transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<(), RecodeError> {
        self.transition(JobState::Opening)
    }

    /// Document opened with `page_count` pages.
    pub(crate) fn opened(&mut self, page_count: usize) {
        self.page_count = page_count;
    }

    pub(crate) fn begin_page(&mut self, index: usize) -> Result<(), RecodeError> {
        self.transition(JobState::ProcessingPage(index))
    }

    /// Page finished; returns the new progress fraction `(i+1)/N`.
    pub(crate) fn finish_page(&mut self, skipped: Option<PageError>) -> f32 {
        self.pages_done += 1;
        if let Some(err) = skipped {
            self.skipped.push(err);
        }
        self.progress = self.pages_done as f32 / self.page_count.max(1) as f32;
        self.progress
    }

    pub(crate) fn finalize(&mut self) -> Result<(), RecodeError> {
        self.transition(JobState::Finalizing)
    }

    pub(crate) fn done(&mut self) -> Result<(), RecodeError> {
        self.transition(JobState::Done)?;
        self.progress = 1.0;
        Ok(())
    }

    pub(crate) fn fail(&mut self) {
        if self.transition(JobState::Errored).is_err() {
            self.state = JobState::Errored;
        }
    }

    pub(crate) fn cancel(&mut self) -> Result<(), RecodeError> {
        self.transition(JobState::Cancelled)
    }
}
