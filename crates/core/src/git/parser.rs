//! Parsers for git CLI output.
//!
//! Four independent routines, one per output shape: structured log records,
//! `--name-status` changed paths, `ls-tree -l` listings and blame
//! annotations. Malformed individual records are skipped with a warning;
//! a corrupt record must never abort the rest of the batch.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::models::{Annotation, ChangeAction, ChangedPath, EntryKind, Revision, RevisionRef};

// ---------------------------------------------------------------------------
// Log records
// ---------------------------------------------------------------------------

/// Pretty format handed to `git log`.
///
/// Control characters delimit the stream: `%x01` marks a record, `%x02`
/// separates fields and `%x03` terminates the free-form message so the
/// `--name-status` block that follows can be told apart from it.
pub const LOG_FORMAT: &str = "%x01%H%x02%P%x02%an <%ae>%x02%ct%x02%B%x03";

const RECORD_MARK: char = '\u{1}';
const FIELD_SEP: char = '\u{2}';
const MESSAGE_END: char = '\u{3}';

/// One raw commit record from the log stream.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: String,
    pub parents: Vec<String>,
    pub author: String,
    pub committed_on: DateTime<Utc>,
    pub message: String,
    pub paths: Vec<ChangedPath>,
}

impl LogEntry {
    /// Assemble the immutable [`Revision`] for this record. Pure; no I/O.
    pub fn into_revision(self) -> Revision {
        Revision {
            identifier: self.id.clone(),
            scmid: self.id,
            author: self.author,
            committed_on: self.committed_on,
            message: self.message,
            paths: self.paths,
        }
    }
}

/// Parse a `git log` stream produced with [`LOG_FORMAT`] and `--name-status`.
///
/// Records are returned in stream order (newest-first, or oldest-first under
/// `--reverse`). Records with more than one parent are skipped even though
/// the queries request merges suppressed, as are records whose hash or
/// timestamp does not parse.
pub fn parse_log(text: &str) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    for record in text.split(RECORD_MARK) {
        if record.trim().is_empty() {
            continue;
        }
        let Some((header, paths_block)) = record.split_once(MESSAGE_END) else {
            warn!("skipping log record without message terminator");
            continue;
        };
        let fields: Vec<&str> = header.splitn(5, FIELD_SEP).collect();
        if fields.len() != 5 {
            warn!(fields = fields.len(), "skipping log record with missing fields");
            continue;
        }

        let id = fields[0].trim();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            warn!(id, "skipping log record with unparseable hash");
            continue;
        }

        let parents: Vec<String> = fields[1].split_whitespace().map(String::from).collect();
        if parents.len() > 1 {
            debug!(id, "skipping merge commit");
            continue;
        }

        let committed_on = match fields[3].trim().parse::<i64>().ok().and_then(|secs| {
            DateTime::<Utc>::from_timestamp(secs, 0)
        }) {
            Some(ts) => ts,
            None => {
                warn!(id, raw = fields[3], "skipping log record with unparseable timestamp");
                continue;
            }
        };

        entries.push(LogEntry {
            id: id.to_string(),
            parents,
            author: fields[2].trim().to_string(),
            committed_on,
            message: fields[4].trim_end().to_string(),
            paths: parse_name_status(paths_block),
        });
    }
    debug!(count = entries.len(), "parsed log records");
    entries
}

/// Parse a `--name-status` block into changed paths.
///
/// Each line is `<status>\t<path>` or, for renames and copies,
/// `<status>\t<old>\t<new>`; the path is the last field so whichever side
/// is present wins. Lines without a tab are skipped.
pub fn parse_name_status(block: &str) -> Vec<ChangedPath> {
    let mut paths = Vec::new();
    for line in block.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let status = fields.next().unwrap_or_default();
        let Some(path) = fields.last() else {
            warn!(line, "skipping malformed name-status line");
            continue;
        };
        paths.push(ChangedPath {
            action: ChangeAction::from_status(status),
            path: path.to_string(),
        });
    }
    paths
}

// ---------------------------------------------------------------------------
// Tree listings
// ---------------------------------------------------------------------------

/// One immediate child from an `ls-tree -l` listing.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

/// Parse `git ls-tree -l` output: `<mode> <type> <oid> <size>\t<name>`.
///
/// Blobs carry a byte size, trees report `-`. Entry types other than blob
/// and tree (submodule commits) are skipped.
pub fn parse_ls_tree(text: &str) -> Vec<TreeEntry> {
    let mut entries = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let Some((meta, name)) = line.split_once('\t') else {
            warn!(line, "skipping malformed tree line");
            continue;
        };
        let mut fields = meta.split_whitespace();
        let (_mode, object_type, _oid, size) = match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (Some(m), Some(t), Some(o), Some(s)) => (m, t, o, s),
            _ => {
                warn!(line, "skipping malformed tree line");
                continue;
            }
        };
        let kind = match object_type {
            "blob" => EntryKind::File,
            "tree" => EntryKind::Dir,
            other => {
                debug!(object_type = other, name, "skipping unsupported tree entry");
                continue;
            }
        };
        let size = match kind {
            EntryKind::File => size.parse::<u64>().ok(),
            EntryKind::Dir => None,
        };
        entries.push(TreeEntry {
            name: name.to_string(),
            kind,
            size,
        });
    }
    entries
}

// ---------------------------------------------------------------------------
// Blame
// ---------------------------------------------------------------------------

/// Line shape of `git blame -l` output: a long hash, a parenthesized
/// author/date group, then the content. Annotation formats vary by mode,
/// so lines that do not match are skipped rather than rejected.
fn blame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9a-f]{39,40})\s\((\w*)[^)]*\) ?(.*)").expect("blame pattern is valid")
    })
}

/// True when the buffer looks like binary content.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// Parse raw `git blame -l` output into an [`Annotation`].
///
/// Returns `None` when the content is binary (git annotates binary files
/// rather than failing). Non-matching lines are skipped.
pub fn parse_blame(bytes: &[u8]) -> Option<Annotation> {
    if is_binary(bytes) {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let pattern = blame_pattern();
    let mut annotation = Annotation::default();
    for line in text.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let (Some(id), Some(author), Some(content)) = (caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        annotation.add_line(
            content.as_str().trim_end().to_string(),
            RevisionRef {
                identifier: id.as_str().to_string(),
                author: author.as_str().trim().to_string(),
            },
        );
    }
    Some(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_record(id: &str, parents: &str, author: &str, time: i64, message: &str, status: &str) -> String {
        format!(
            "\u{1}{id}\u{2}{parents}\u{2}{author}\u{2}{time}\u{2}{message}\u{3}\n{status}\n",
        )
    }

    #[test]
    fn test_parse_log_single_commit() {
        let text = log_record(
            &"a".repeat(40),
            "",
            "Alice <alice@example.com>",
            1_577_836_800,
            "initial commit\n",
            "A\tREADME.md",
        );
        let entries = parse_log(&text);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.id, "a".repeat(40));
        assert!(entry.parents.is_empty());
        assert_eq!(entry.author, "Alice <alice@example.com>");
        assert_eq!(entry.message, "initial commit");
        assert_eq!(entry.paths.len(), 1);
        assert_eq!(entry.paths[0].action, ChangeAction::Added);
        assert_eq!(entry.paths[0].path, "README.md");
    }

    #[test]
    fn test_parse_log_multiple_commits_in_stream_order() {
        let a = "a".repeat(40);
        let b = "b".repeat(40);
        let text = format!(
            "{}{}",
            log_record(&b, &a, "Bob <bob@example.com>", 200, "second", "M\tsrc/lib.rs"),
            log_record(&a, "", "Alice <alice@example.com>", 100, "first", "A\tsrc/lib.rs"),
        );
        let entries = parse_log(&text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, b);
        assert_eq!(entries[1].id, a);
        assert_eq!(entries[0].parents, vec![a.clone()]);
    }

    #[test]
    fn test_parse_log_skips_merge_commits() {
        let parents = format!("{} {}", "b".repeat(40), "c".repeat(40));
        let text = format!(
            "{}{}",
            log_record(&"d".repeat(40), &parents, "Alice <a@x>", 300, "merge", ""),
            log_record(&"b".repeat(40), "", "Alice <a@x>", 100, "base", "A\tf"),
        );
        let entries = parse_log(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b".repeat(40));
    }

    #[test]
    fn test_parse_log_skips_bad_hash_and_timestamp() {
        let text = format!(
            "{}{}{}",
            log_record("not-a-hash", "", "Alice <a@x>", 100, "bad id", "A\tf"),
            log_record(&"e".repeat(40), "", "Alice <a@x>", 100, "good", "A\tf"),
            format!(
                "\u{1}{}\u{2}\u{2}Alice <a@x>\u{2}yesterday\u{2}bad time\u{3}\nA\tf\n",
                "f".repeat(40)
            ),
        );
        let entries = parse_log(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "e".repeat(40));
    }

    #[test]
    fn test_parse_log_record_without_terminator_is_skipped() {
        let text = format!("\u{1}{}\u{2}\u{2}Alice <a@x>\u{2}100\u{2}truncated", "a".repeat(40));
        assert!(parse_log(&text).is_empty());
    }

    #[test]
    fn test_parse_log_multiline_message() {
        let text = log_record(
            &"a".repeat(40),
            "",
            "Alice <alice@example.com>",
            100,
            "subject line\n\nbody paragraph\n",
            "M\tdocs/guide.md",
        );
        let entries = parse_log(&text);
        assert_eq!(entries[0].message, "subject line\n\nbody paragraph");
    }

    #[test]
    fn test_into_revision_copies_id_to_scmid() {
        let text = log_record(&"a".repeat(40), "", "Alice <a@x>", 100, "m", "A\tf");
        let revision = parse_log(&text).remove(0).into_revision();
        assert_eq!(revision.identifier, revision.scmid);
        assert_eq!(revision.paths.len(), 1);
        assert_eq!(revision.committed_on.timestamp(), 100);
    }

    #[test]
    fn test_parse_name_status_actions() {
        let block = "A\tadded.rs\nD\tdeleted.rs\nM\tmodified.rs\nR100\told.rs\tnew.rs\n";
        let paths = parse_name_status(block);
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0].action, ChangeAction::Added);
        assert_eq!(paths[1].action, ChangeAction::Deleted);
        assert_eq!(paths[2].action, ChangeAction::Modified);
        // Rename degrades to Modified and keeps the surviving side.
        assert_eq!(paths[3].action, ChangeAction::Modified);
        assert_eq!(paths[3].path, "new.rs");
    }

    #[test]
    fn test_parse_name_status_skips_malformed_lines() {
        let block = "A\tgood.rs\njust some noise\n\nM\talso-good.rs\n";
        let paths = parse_name_status(block);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path, "good.rs");
        assert_eq!(paths[1].path, "also-good.rs");
    }

    #[test]
    fn test_parse_ls_tree() {
        let text = "\
100644 blob 8e2f4b9c2a1d0e3f4a5b6c7d8e9f0a1b2c3d4e5f      42\tREADME.md
040000 tree 1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b       -\tsrc
100644 blob 0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c    1024\tCargo.toml
";
        let entries = parse_ls_tree(text);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "README.md");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, Some(42));
        assert_eq!(entries[1].name, "src");
        assert_eq!(entries[1].kind, EntryKind::Dir);
        assert_eq!(entries[1].size, None);
        assert_eq!(entries[2].size, Some(1024));
    }

    #[test]
    fn test_parse_ls_tree_skips_submodules_and_noise() {
        let text = "\
160000 commit 8e2f4b9c2a1d0e3f4a5b6c7d8e9f0a1b2c3d4e5f       -\tvendor/dep
garbage line with no tab
100644 blob 0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c       7\tkeep.txt
";
        let entries = parse_ls_tree(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "keep.txt");
    }

    #[test]
    fn test_parse_blame_extracts_author_and_content() {
        let line = format!("{} (Alice 2020-01-01) hello", "abc".repeat(13) + "a");
        let annotation = parse_blame(line.as_bytes()).unwrap();
        assert_eq!(annotation.len(), 1);
        assert_eq!(annotation.lines[0].revision.author, "Alice");
        assert_eq!(annotation.lines[0].content, "hello");
        assert_eq!(annotation.lines[0].revision.identifier, "abc".repeat(13) + "a");
    }

    #[test]
    fn test_parse_blame_skips_short_hash_lines() {
        let good = format!("{} (Alice 2020-01-01) hello", "a".repeat(40));
        let text = format!("abc123 (Bob 2020-01-01) not enough hex\n{good}\n");
        let annotation = parse_blame(text.as_bytes()).unwrap();
        assert_eq!(annotation.len(), 1);
        assert_eq!(annotation.lines[0].revision.author, "Alice");
    }

    #[test]
    fn test_parse_blame_accepts_boundary_hash() {
        // Boundary commits are prefixed with '^', leaving 39 hex digits visible.
        let text = format!("^{} (Alice 2019-05-05 1) fn main() {{}}", "b".repeat(39));
        let annotation = parse_blame(text.as_bytes()).unwrap();
        assert_eq!(annotation.len(), 1);
        assert_eq!(annotation.lines[0].revision.identifier, "b".repeat(39));
    }

    #[test]
    fn test_parse_blame_preserves_indentation() {
        let text = format!("{} (Carol 2022-03-04 7)     indented();", "c".repeat(40));
        let annotation = parse_blame(text.as_bytes()).unwrap();
        assert_eq!(annotation.lines[0].content, "    indented();");
    }

    #[test]
    fn test_parse_blame_rejects_binary() {
        let mut bytes = format!("{} (Alice 2020-01-01) data", "a".repeat(40)).into_bytes();
        bytes.push(0);
        assert!(parse_blame(&bytes).is_none());
    }

    #[test]
    fn test_parse_blame_empty_input() {
        let annotation = parse_blame(b"").unwrap();
        assert!(annotation.is_empty());
    }
}
