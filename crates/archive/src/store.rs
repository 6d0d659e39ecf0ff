// SPDX-License-Identifier: MIT

//! The archive store: append-only record log plus a rewritten index.
//!
//! Records land one JSON object per line in `full_outputs.jsonl`. The index
//! (`output_index.json`) maps refId to searchable metadata and the record's
//! line number, and is rewritten in full on every insert. Index size scales
//! with the count of stored outputs, not their content, so the rewrite stays
//! cheap. Single-writer per process; concurrent writers need external
//! locking.

use crate::ArchiveError;
use chrono::Utc;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const RECORD_FILE: &str = "full_outputs.jsonl";
const INDEX_FILE: &str = "output_index.json";
const PREVIEW_CHARS: usize = 100;
const CONTEXT_CHARS: usize = 100;

/// One full record line in the append-only log.
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveRecord {
    ref_id: String,
    task_id: String,
    tool: String,
    timestamp: String,
    output_length: usize,
    output: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Index entry: everything search needs without touching the record log.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    task_id: String,
    tool: String,
    timestamp: String,
    output_length: usize,
    /// 1-based line in the record file.
    line_number: usize,
    first_100_chars: String,
    last_100_chars: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// How a search hit previews its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Pattern search: number of matches plus context around the first one.
    Match { count: usize, snippet: String },
    /// Metadata-only search: head and tail of the stored output.
    HeadTail { first: String, last: String },
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub ref_id: String,
    pub task_id: String,
    pub tool: String,
    pub timestamp: String,
    pub output_length: usize,
    pub preview: Preview,
}

/// On-disk archive of full command outputs.
pub struct OutputArchive {
    record_path: PathBuf,
    index_path: PathBuf,
    index: BTreeMap<String, IndexEntry>,
    /// Lines currently in the record file.
    lines: usize,
}

impl OutputArchive {
    /// Open (or create) the archive in a state directory. An existing index
    /// is reloaded; a missing or unparseable one starts empty.
    pub fn open(state_dir: &Path) -> Result<Self, ArchiveError> {
        std::fs::create_dir_all(state_dir).map_err(|source| ArchiveError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;
        let record_path = state_dir.join(RECORD_FILE);
        let index_path = state_dir.join(INDEX_FILE);

        let index: BTreeMap<String, IndexEntry> = match std::fs::read_to_string(&index_path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %index_path.display(), error = %err, "unreadable archive index, starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        let lines = match std::fs::File::open(&record_path) {
            Ok(f) => BufReader::new(f).lines().count(),
            Err(_) => 0,
        };

        Ok(Self { record_path, index_path, index, lines })
    }

    /// Store a full output; returns the refId that retrieves it later.
    ///
    /// The refId folds only the first 100 chars of the output into the hash;
    /// the timestamp component keeps repeat invocations distinct.
    pub fn store(
        &mut self,
        task_id: &str,
        tool: &str,
        output: &str,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<String, ArchiveError> {
        let timestamp = Utc::now().to_rfc3339();
        let prefix: String = output.chars().take(PREVIEW_CHARS).collect();

        let seed = format!("{task_id}_{tool}_{timestamp}_{prefix}");
        let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
        let ref_id = format!("output_{}", &digest[..12]);

        let record = ArchiveRecord {
            ref_id: ref_id.clone(),
            task_id: task_id.to_string(),
            tool: tool.to_string(),
            timestamp: timestamp.clone(),
            output_length: output.chars().count(),
            output: output.to_string(),
            metadata: metadata.clone(),
        };

        let line = serde_json::to_string(&record).map_err(|source| ArchiveError::Corrupt {
            line: self.lines + 1,
            source,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.record_path)
            .map_err(|source| ArchiveError::Io { path: self.record_path.clone(), source })?;
        writeln!(file, "{line}")
            .map_err(|source| ArchiveError::Io { path: self.record_path.clone(), source })?;
        self.lines += 1;

        let chars: Vec<char> = output.chars().collect();
        let last_start = chars.len().saturating_sub(PREVIEW_CHARS);
        self.index.insert(
            ref_id.clone(),
            IndexEntry {
                task_id: task_id.to_string(),
                tool: tool.to_string(),
                timestamp,
                output_length: chars.len(),
                line_number: self.lines,
                first_100_chars: chars.iter().take(PREVIEW_CHARS).collect(),
                last_100_chars: chars[last_start..].iter().collect(),
                metadata,
            },
        );
        self.save_index()?;

        debug!(ref_id = %ref_id, task = %task_id, tool = %tool, chars = chars.len(), "archived output");
        Ok(ref_id)
    }

    fn save_index(&self) -> Result<(), ArchiveError> {
        let text = serde_json::to_string_pretty(&self.index)
            .map_err(|source| ArchiveError::Corrupt { line: 0, source })?;
        std::fs::write(&self.index_path, text)
            .map_err(|source| ArchiveError::Io { path: self.index_path.clone(), source })
    }

    /// Retrieve a stored output. An unknown refId is an empty result, never
    /// an error; retrieval is byte-identical across calls.
    pub fn retrieve(&self, ref_id: &str) -> Result<Option<String>, ArchiveError> {
        let Some(entry) = self.index.get(ref_id) else {
            warn!(ref_id = %ref_id, "refId not found in archive index");
            return Ok(None);
        };
        self.read_line(entry.line_number)
    }

    fn read_line(&self, line_number: usize) -> Result<Option<String>, ArchiveError> {
        let file = std::fs::File::open(&self.record_path)
            .map_err(|source| ArchiveError::Io { path: self.record_path.clone(), source })?;
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|source| ArchiveError::Io { path: self.record_path.clone(), source })?;
            if i + 1 == line_number {
                let record: ArchiveRecord = serde_json::from_str(&line)
                    .map_err(|source| ArchiveError::Corrupt { line: line_number, source })?;
                return Ok(Some(record.output));
            }
        }
        warn!(line = line_number, "indexed line missing from record file");
        Ok(None)
    }

    /// Search stored outputs.
    ///
    /// The pattern is compiled before any file access, so a malformed query
    /// is rejected up front. Metadata filters narrow candidates from the
    /// index alone; full text is fetched only for candidates when a pattern
    /// is present. Pattern hits report the match count and a context window
    /// around the first match.
    pub fn search(
        &self,
        pattern: Option<&str>,
        task_id: Option<&str>,
        tool: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ArchiveError> {
        let regex = pattern
            .map(|p| RegexBuilder::new(p).case_insensitive(true).multi_line(true).build())
            .transpose()?;

        let candidates = self.index.iter().filter(|(_, info)| {
            task_id.is_none_or(|t| info.task_id == t) && tool.is_none_or(|t| info.tool == t)
        });

        let mut results = Vec::new();
        match regex {
            Some(re) => {
                for (ref_id, info) in candidates {
                    if results.len() >= limit {
                        break;
                    }
                    let Some(output) = self.retrieve(ref_id)? else { continue };
                    let count = re.find_iter(&output).count();
                    if count == 0 {
                        continue;
                    }
                    let snippet = re
                        .find(&output)
                        .map(|m| context_window(&output, m.start(), m.end()))
                        .unwrap_or_default();
                    results.push(SearchHit {
                        ref_id: ref_id.clone(),
                        task_id: info.task_id.clone(),
                        tool: info.tool.clone(),
                        timestamp: info.timestamp.clone(),
                        output_length: info.output_length,
                        preview: Preview::Match { count, snippet },
                    });
                }
            }
            None => {
                for (ref_id, info) in candidates.take(limit) {
                    results.push(SearchHit {
                        ref_id: ref_id.clone(),
                        task_id: info.task_id.clone(),
                        tool: info.tool.clone(),
                        timestamp: info.timestamp.clone(),
                        output_length: info.output_length,
                        preview: Preview::HeadTail {
                            first: info.first_100_chars.clone(),
                            last: info.last_100_chars.clone(),
                        },
                    });
                }
            }
        }
        Ok(results)
    }

    /// Number of archived outputs.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// A context window of up to `CONTEXT_CHARS` bytes either side of a match,
/// widened outward to char boundaries.
fn context_window(text: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(CONTEXT_CHARS);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + CONTEXT_CHARS).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    text[lo..hi].to_string()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
