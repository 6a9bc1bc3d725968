//! Core data types shared across the worker: batch descriptors, blog
//! classification outcomes, and the status tags written to the batch
//! artifact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to this worker process by the coordinator
/// (`GET /worker/getID`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a batch enumerates many blogs from the master domains file or
/// names exactly one blog directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchType {
    /// `batch_size` blog names are drawn from the master domains file
    /// starting at `file_offset`.
    List,
    /// `content` names the single blog to process.
    Domain,
}

/// Immutable batch assignment handed out by the coordinator for a single
/// `getBatch` call. Lives from `get_batch` until the matching terminal
/// `update_status` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchDescriptor {
    /// Opaque batch identifier used in every subsequent coordinator call.
    pub batch_id: i64,
    /// Authenticator paired with `batch_id`; required on every subsequent
    /// coordinator call for this batch.
    pub random_key: i64,
    /// Whether this batch is a `list` draw from the master domains file or
    /// a single named `domain`.
    pub batch_type: BatchType,
    /// The single blog name when `batch_type == Domain`; empty otherwise.
    pub content: String,
    /// Number of successive blog names to consume from the master domains
    /// file when `batch_type == List`.
    pub batch_size: u64,
    /// Absolute byte offset into the master domains file at which to begin
    /// reading (list mode only).
    pub file_offset: u64,
    /// Maximum posts per blog before it is treated as an exclusion; zero
    /// disables the limit.
    pub exclusion_limit: u64,
    /// Worker protocol version reported by the coordinator for this batch.
    pub worker_version: u32,
}

/// Outcome of fetching and classifying a single blog's post feed.
///
/// `Accessible` carries the ordered list of canonical post URLs in the
/// feed's natural order (newest first is typical but not guaranteed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlogResult {
    /// The blog is reachable and its post URLs were fully enumerated.
    Accessible(Vec<String>),
    /// The feed endpoint responded 404, or no response was obtainable at
    /// all after retries.
    NotFound,
    /// The feed endpoint responded 401.
    Private,
    /// The feed endpoint responded with a non-200, non-401, non-404 status
    /// after retries.
    OtherError,
    /// The blog exceeds `exclusion_limit`, or a feed page failed to parse
    /// as JSON (treated as a soft-block/exclusion signal).
    TooManyPosts,
    /// The first feed page has no `entry` field at all.
    NoEntries,
}

/// Status tag written to the batch artifact for a single blog record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlogStatusTag {
    /// Accessible; posts were (attempted to be) downloaded.
    Accessible,
    /// Deleted or not found.
    Deleted,
    /// Private.
    Private,
    /// Confirmed excludable (too many posts, or unparseable feed).
    Exclusion,
    /// Unresolved other-error while operating in domain mode; flagged for
    /// manual investigation rather than reported to the coordinator.
    Investigate,
}

impl fmt::Display for BlogStatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            BlogStatusTag::Accessible => "a",
            BlogStatusTag::Deleted => "d",
            BlogStatusTag::Private => "p",
            BlogStatusTag::Exclusion => "e",
            BlogStatusTag::Investigate => "__i",
        };
        write!(f, "{tag}")
    }
}

/// Terminal status reported to the coordinator for a batch as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    /// The batch was finalized and uploaded successfully.
    Complete,
    /// The batch could not be finalized or uploaded.
    Failed,
}

impl BatchStatus {
    /// The single-character wire value expected by `updateStatus`.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            BatchStatus::Complete => "c",
            BatchStatus::Failed => "f",
        }
    }
}
