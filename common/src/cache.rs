use thiserror::Error;

use crate::{
    presets::SegmentsSnapshot,
    types::{SegmentState, SegmentUpdate, SetCommand, DEFAULT_SEGMENT, SEGMENTS},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("Unknown segment '{0}'")]
    UnknownSegment(String),
}

/// Last-sent parameters for every declared segment.
///
/// Only ever a read-back aid: the physical strips may be off or unreachable
/// and nothing here is reconciled against them.
#[derive(Debug, Clone)]
pub struct StateCache {
    entries: Vec<SegmentState>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new(&SEGMENTS)
    }
}

impl StateCache {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            entries: segments
                .iter()
                .map(|segment| SegmentState::initial(segment))
                .collect(),
        }
    }

    pub fn get(&self, segment: &str) -> Option<&SegmentState> {
        self.entries.iter().find(|entry| entry.segment == segment)
    }

    pub fn entries(&self) -> &[SegmentState] {
        &self.entries
    }

    /// Merges a single-segment update and returns the command to publish.
    pub fn apply_update(&mut self, update: &SegmentUpdate) -> Result<SetCommand, UpdateError> {
        let segment = update.segment.as_deref().unwrap_or(DEFAULT_SEGMENT);
        let entry = self
            .entry_mut(segment)
            .ok_or_else(|| UpdateError::UnknownSegment(segment.to_string()))?;
        entry.merge(update);
        Ok(entry.command())
    }

    /// Merges the same update into every segment. Any `segment` field on the
    /// update is ignored.
    pub fn apply_to_all(&mut self, update: &SegmentUpdate) -> Vec<SetCommand> {
        self.entries
            .iter_mut()
            .map(|entry| {
                entry.merge(update);
                entry.command()
            })
            .collect()
    }

    /// Merges every known segment of a preset snapshot. Segments this cache
    /// does not declare are skipped and reported back by name.
    pub fn apply_snapshot(&mut self, snapshot: &SegmentsSnapshot) -> (Vec<SetCommand>, Vec<String>) {
        let mut commands = Vec::new();
        let mut skipped = Vec::new();

        for (segment, update) in &snapshot.segments {
            match self.entry_mut(segment) {
                Some(entry) => {
                    entry.merge(update);
                    commands.push(entry.command());
                }
                None => skipped.push(segment.clone()),
            }
        }

        (commands, skipped)
    }

    /// Captures the whole cache as a preset snapshot.
    pub fn snapshot(&self) -> SegmentsSnapshot {
        SegmentsSnapshot {
            segments: self
                .entries
                .iter()
                .map(|entry| (entry.segment.clone(), entry.to_update()))
                .collect(),
        }
    }

    fn entry_mut(&mut self, segment: &str) -> Option<&mut SegmentState> {
        self.entries.iter_mut().find(|entry| entry.segment == segment)
    }
}
