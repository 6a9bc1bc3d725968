//! `BatchWriter` — append-only writer that emits a batch artifact.
//!
//! The exact byte layout is treated as a swappable concern, not baked into
//! the core: the core only promises the call sequence. A concrete
//! gzip/JSON-lines implementation is provided as one valid realization
//! behind the trait, swappable by the embedder.

use crate::error::{Error, Result};
use crate::types::BlogStatusTag;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only writer for a single batch artifact.
///
/// Invariant: exactly one `start_blog`/`end_blog` pair per blog;
/// `add_blog_post` only legal between them; `end_batch` called exactly
/// once.
pub trait BatchWriter: Send {
    /// Begin a blog record.
    fn start_blog(
        &mut self,
        worker_version: u32,
        blog_name: &str,
        canonical_domain: &str,
        status_tag: BlogStatusTag,
        is_first_blog: bool,
    ) -> Result<()>;

    /// Append one post's comment tree to the currently open blog record.
    fn add_blog_post(&mut self, url: &str, comments: &Value, is_first_post: bool) -> Result<()>;

    /// Close the currently open blog record.
    fn end_blog(&mut self) -> Result<()>;

    /// Finalize the batch artifact. Called exactly once, after every blog
    /// has been opened and closed.
    fn end_batch(&mut self) -> Result<()>;

    /// Directory the artifact is being written into.
    fn directory(&self) -> &Path;

    /// File name of the artifact (valid after `end_batch`).
    fn file_name(&self) -> &str;
}

#[derive(Debug, PartialEq, Eq)]
enum WriterState {
    BetweenBlogs,
    InBlog,
    Finalized,
}

/// Default `BatchWriter`: a gzip-compressed stream of JSON-lines records,
/// one line per blog (each with its nested posts), buffered in memory
/// until `end_batch` flushes it to disk as `{batch_id}.json.gz`.
pub struct GzipJsonLinesWriter {
    directory: PathBuf,
    file_name: String,
    state: WriterState,
    lines: Vec<String>,
    current_blog: Option<Value>,
}

impl GzipJsonLinesWriter {
    /// Open a new writer for `batch_id` into `directory`.
    pub fn new(directory: impl Into<PathBuf>, batch_id: i64) -> Self {
        Self {
            directory: directory.into(),
            file_name: format!("{batch_id}.json.gz"),
            state: WriterState::BetweenBlogs,
            lines: Vec::new(),
            current_blog: None,
        }
    }

    /// The full path the artifact will be written to.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl BatchWriter for GzipJsonLinesWriter {
    fn start_blog(
        &mut self,
        worker_version: u32,
        blog_name: &str,
        canonical_domain: &str,
        status_tag: BlogStatusTag,
        is_first_blog: bool,
    ) -> Result<()> {
        if self.state == WriterState::InBlog {
            return Err(Error::BatchWriter(
                "start_blog called while a blog record is already open".to_string(),
            ));
        }
        if self.state == WriterState::Finalized {
            return Err(Error::BatchWriter("start_blog called after end_batch".to_string()));
        }

        self.current_blog = Some(serde_json::json!({
            "worker_version": worker_version,
            "blog_name": blog_name,
            "canonical_domain": canonical_domain,
            "status": status_tag.to_string(),
            "is_first_blog": is_first_blog,
            "posts": [],
        }));
        self.state = WriterState::InBlog;
        Ok(())
    }

    fn add_blog_post(&mut self, url: &str, comments: &Value, is_first_post: bool) -> Result<()> {
        let blog = self
            .current_blog
            .as_mut()
            .ok_or_else(|| Error::BatchWriter("add_blog_post called outside a blog record".to_string()))?;

        let posts = blog
            .get_mut("posts")
            .and_then(|p| p.as_array_mut())
            .expect("posts array initialized in start_blog");

        posts.push(serde_json::json!({
            "url": url,
            "comments": comments,
            "is_first_post": is_first_post,
        }));
        Ok(())
    }

    fn end_blog(&mut self) -> Result<()> {
        let blog = self
            .current_blog
            .take()
            .ok_or_else(|| Error::BatchWriter("end_blog called with no open blog record".to_string()))?;

        self.lines.push(serde_json::to_string(&blog)?);
        self.state = WriterState::BetweenBlogs;
        Ok(())
    }

    fn end_batch(&mut self) -> Result<()> {
        if self.state == WriterState::InBlog {
            return Err(Error::BatchWriter(
                "end_batch called with a blog record still open".to_string(),
            ));
        }
        if self.state == WriterState::Finalized {
            return Err(Error::BatchWriter("end_batch called twice".to_string()));
        }

        std::fs::create_dir_all(&self.directory)?;
        let file = File::create(self.path())?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        for line in &self.lines {
            writeln!(encoder, "{line}")?;
        }
        encoder.finish()?;

        self.state = WriterState::Finalized;
        Ok(())
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }
}
