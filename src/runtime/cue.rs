//! Cues: the ordered event log a request produces.
//!
//! Execution never writes to a terminal. It appends [`Cue`]s to a
//! [`Response`] and a front end reads them back with a [`CueReader`],
//! stopping at pauses and resuming once the player acknowledges.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CueKind {
    /// Plain text.
    Text,
    /// Text carrying inline markup for the presentation layer.
    TextF,
    /// Wait for an acknowledgment before reading on.
    Pause,
    /// Advisory delay in milliseconds.
    Wait,
    Tip,
    Info,
    /// Recoverable script error; reading continues.
    Error,
    /// Unrecoverable fault; reading must stop.
    Fatal,
    /// Graceful end of the game.
    Quit,
    /// Diagnostic output.
    Trace,
}

impl CueKind {
    pub fn name(self) -> &'static str {
        match self {
            CueKind::Text => "TEXT",
            CueKind::TextF => "TEXTF",
            CueKind::Pause => "PAUSE",
            CueKind::Wait => "WAIT",
            CueKind::Tip => "TIP",
            CueKind::Info => "INFO",
            CueKind::Error => "ERROR",
            CueKind::Fatal => "FATAL",
            CueKind::Quit => "QUIT",
            CueKind::Trace => "TRACE",
        }
    }

    /// Cues a reader stops after.
    pub fn is_stop(self) -> bool {
        matches!(self, CueKind::Pause | CueKind::Quit | CueKind::Fatal)
    }

    pub fn is_text(self) -> bool {
        matches!(self, CueKind::Text | CueKind::TextF)
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    kind: CueKind,
    content: String,
}

impl Cue {
    pub fn new(kind: CueKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn kind(&self) -> CueKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.content)
    }
}

/// Result of one request: cues in emission order plus execution metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    cues: Vec<Cue>,
    operations_executed: u64,
    elapsed: Duration,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cue(&mut self, kind: CueKind, content: impl Into<String>) {
        self.cues.push(Cue::new(kind, content));
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn into_cues(self) -> Vec<Cue> {
        self.cues
    }

    pub fn reader(&self) -> CueReader<'_> {
        CueReader::new(&self.cues)
    }

    pub fn operations_executed(&self) -> u64 {
        self.operations_executed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn set_metrics(&mut self, operations: u64, elapsed: Duration) {
        self.operations_executed = operations;
        self.elapsed = elapsed;
    }

    pub fn count(&self, kind: CueKind) -> usize {
        self.cues.iter().filter(|c| c.kind == kind).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.count(CueKind::Fatal) > 0
    }

    pub fn has_quit(&self) -> bool {
        self.count(CueKind::Quit) > 0
    }

    /// Concatenated TEXT and TEXTF content.
    pub fn text(&self) -> String {
        self.cues
            .iter()
            .filter(|c| c.kind.is_text())
            .map(|c| c.content.as_str())
            .collect()
    }
}

/// Pull reader over a cue list that can stop early and resume.
#[derive(Debug, Clone)]
pub struct CueReader<'a> {
    cues: &'a [Cue],
    position: usize,
}

impl<'a> CueReader<'a> {
    pub fn new(cues: &'a [Cue]) -> Self {
        Self { cues, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.cues.len()
    }

    pub fn remaining(&self) -> &'a [Cue] {
        &self.cues[self.position.min(self.cues.len())..]
    }

    /// Read up to and including the next PAUSE, QUIT or FATAL cue.
    pub fn read_until_stop(&mut self) -> &'a [Cue] {
        let start = self.position;
        while let Some(cue) = self.cues.get(self.position) {
            self.position += 1;
            if cue.kind.is_stop() {
                break;
            }
        }
        &self.cues[start..self.position]
    }
}

impl<'a> Iterator for CueReader<'a> {
    type Item = &'a Cue;

    fn next(&mut self) -> Option<Self::Item> {
        let cue = self.cues.get(self.position)?;
        self.position += 1;
        Some(cue)
    }
}

/// Merge runs of same-kind text cues, as a front end does before flushing.
pub fn coalesce(cues: &[Cue]) -> Vec<Cue> {
    let mut out: Vec<Cue> = Vec::with_capacity(cues.len());
    for cue in cues {
        match out.last_mut() {
            Some(last) if cue.kind.is_text() && last.kind == cue.kind => {
                last.content.push_str(&cue.content);
            }
            _ => out.push(cue.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        let mut response = Response::new();
        response.add_cue(CueKind::Text, "a");
        response.add_cue(CueKind::Text, "b");
        response.add_cue(CueKind::Pause, "");
        response.add_cue(CueKind::Text, "c");
        response
    }

    #[test]
    fn reader_stops_at_pause_and_resumes() {
        let response = sample();
        let mut reader = response.reader();
        let first: Vec<&str> = reader.read_until_stop().iter().map(Cue::content).collect();
        assert_eq!(first, vec!["a", "b", ""]);
        assert!(!reader.is_finished());
        let rest = reader.read_until_stop();
        assert_eq!(rest, &[Cue::new(CueKind::Text, "c")]);
        assert!(reader.is_finished());
        assert!(reader.read_until_stop().is_empty());
    }

    #[test]
    fn coalesce_merges_only_adjacent_text() {
        let merged = coalesce(sample().cues());
        assert_eq!(
            merged,
            vec![
                Cue::new(CueKind::Text, "ab"),
                Cue::new(CueKind::Pause, ""),
                Cue::new(CueKind::Text, "c"),
            ]
        );
    }

    #[test]
    fn response_helpers() {
        let mut response = sample();
        response.add_cue(CueKind::Quit, "");
        assert_eq!(response.text(), "abc");
        assert!(response.has_quit());
        assert!(!response.has_fatal());
        assert_eq!(response.count(CueKind::Text), 3);
        assert_eq!(CueKind::TextF.to_string(), "TEXTF");
    }
}
