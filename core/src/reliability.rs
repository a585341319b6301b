//! Majority vote over independent decodes of the same message.

use crate::error::{ModemError, Result};

/// Occurrence count of every non-empty candidate, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    candidates: Vec<(String, usize)>,
    attempts: usize,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt. Empty candidates are attempts without a vote.
    pub fn record(&mut self, candidate: &str) {
        self.attempts += 1;
        if candidate.is_empty() {
            return;
        }
        match self.candidates.iter_mut().find(|(text, _)| text == candidate) {
            Some((_, count)) => *count += 1,
            None => self.candidates.push((candidate.to_string(), 1)),
        }
    }

    /// Count an attempt that produced nothing at all.
    pub fn record_failure(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn votes(&self) -> usize {
        self.candidates.iter().map(|(_, count)| count).sum()
    }

    pub fn count(&self, candidate: &str) -> usize {
        self.candidates
            .iter()
            .find(|(text, _)| text == candidate)
            .map_or(0, |(_, count)| *count)
    }

    /// Candidates with their counts, in first-seen order.
    pub fn candidates(&self) -> &[(String, usize)] {
        &self.candidates
    }

    /// Plurality candidate and its count. The earliest candidate wins a tie.
    pub fn leader(&self) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for (text, count) in &self.candidates {
            if best.map_or(true, |(_, top)| *count > top) {
                best = Some((text.as_str(), *count));
            }
        }
        best
    }

    /// Plurality winner, or [`ModemError::NoUsableDecode`] if no attempt
    /// produced a candidate.
    pub fn winner(&self) -> Result<String> {
        self.leader()
            .map(|(text, _)| text.to_string())
            .ok_or(ModemError::NoUsableDecode {
                attempts: self.attempts,
            })
    }
}

impl<S: AsRef<str>> FromIterator<S> for VoteTally {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tally = VoteTally::new();
        for candidate in iter {
            tally.record(candidate.as_ref());
        }
        tally
    }
}
