//! Archive identifiers: `YYYYMMDD-HHMMSS-NNNNNN`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A session-timestamped, per-session-counted archive identifier.
///
/// Lexicographic order on the formatted string matches creation order,
/// both within a session (the counter increases) and across sessions
/// (later sessions have a later timestamp prefix).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(String);

impl ArchiveId {
    fn new(session_prefix: &str, counter: u32) -> Self {
        ArchiveId(format!("{session_prefix}-{counter:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstruct an id from its string form, as read back from a
    /// manifest filename. Does not validate the `YYYYMMDD-HHMMSS-NNNNNN`
    /// shape; malformed ids only affect ordering, never correctness of a
    /// database merge built from them.
    pub fn from_raw(s: String) -> Self {
        ArchiveId(s)
    }

    /// The `data/<id>.tar` key for this id, relative to the remote prefix.
    pub fn tar_key(&self) -> String {
        format!("data/{}.tar", self.0)
    }

    /// The `db/<id>.json` key for this id, relative to the remote prefix.
    pub fn manifest_key(&self) -> String {
        format!("db/{}.json", self.0)
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates strictly increasing [`ArchiveId`]s for a single session.
///
/// Confined to a single instance, owned by a `Packer`, never process-wide
/// mutable state: two `Packer`s (or two calls to [`ArchiveId::generator`])
/// never share a counter.
pub struct ArchiveIdGenerator {
    session_prefix: String,
    counter: u32,
}

impl ArchiveIdGenerator {
    pub fn new(session_start: DateTime<Utc>) -> Self {
        ArchiveIdGenerator {
            session_prefix: session_start.format("%Y%m%d-%H%M%S").to_string(),
            counter: 0,
        }
    }

    pub fn next(&mut self) -> ArchiveId {
        let id = ArchiveId::new(&self.session_prefix, self.counter);
        self.counter += 1;
        id
    }
}
