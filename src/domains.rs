//! Master domains file reader.
//!
//! Concurrent access to the master domains file is a hazard: this crate
//! runs a single `BatchRunner` per process, so `MasterDomainsFile` simply
//! owns one `std::fs::File` and seeks absolutely before every read —
//! there is no concurrent access to serialize.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

/// A single owned handle onto the text file of blog names (one per line),
/// read by absolute byte offset per batch.
pub struct MasterDomainsFile {
    reader: BufReader<File>,
}

impl MasterDomainsFile {
    /// Open the domains file at `path`.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { reader: BufReader::new(file) })
    }

    /// Seek to `offset` and read `count` blog names, skipping blank lines
    /// (the end-of-list sentinel). Stops early if EOF is reached before
    /// `count` names are read.
    pub fn read_names(&mut self, offset: u64, count: u64) -> Result<Vec<String>> {
        self.reader.seek(SeekFrom::Start(offset))?;

        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            let name = line.trim_end_matches(['\n', '\r']).to_string();
            if name.is_empty() {
                continue;
            }
            names.push(name);
        }
        Ok(names)
    }
}
