//! Unified diff parsing into per-file line counts.

use crate::changes::{Changes, FileChange};
use crate::error::{PulseError, Result};

const NULL_PATH: &str = "/dev/null";

/// Line counts for a single file section of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDiff {
    /// Source path with the `a/` prefix removed.
    pub from: Option<String>,
    /// Destination path with the `b/` prefix removed.
    pub to: Option<String>,
    /// Added lines.
    pub additions: u64,
    /// Removed lines.
    pub deletions: u64,
}

impl FileDiff {
    /// Canonical path for this file: the destination, or the source when the
    /// file was deleted.
    pub fn path(&self) -> Option<&str> {
        match self.to.as_deref() {
            Some(to) if to != NULL_PATH => Some(to),
            _ => self.from.as_deref().filter(|from| *from != NULL_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Hunk {
    old_remaining: u64,
    new_remaining: u64,
}

impl Hunk {
    fn is_done(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }
}

/// Parse unified diff text into one entry per file section.
pub fn parse_unified_diff(text: &str) -> Result<Vec<FileDiff>> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut hunk: Option<Hunk> = None;
    // True between a file header and its first hunk.
    let mut in_header = false;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;

        if let Some(active) = hunk.as_mut() {
            consume_hunk_line(active, current.as_mut(), line, line_no)?;
            if active.is_done() {
                hunk = None;
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.extend(current.take());
            current = Some(git_header_paths(rest));
            in_header = true;
        } else if let Some(rest) = line.strip_prefix("--- ") {
            if !in_header || current.is_none() {
                files.extend(current.take());
                current = Some(FileDiff::default());
                in_header = true;
            }
            if let Some(file) = current.as_mut() {
                file.from = Some(parse_path(rest, "a/"));
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let file = current.as_mut().ok_or_else(|| {
                PulseError::DiffParse(format!("line {line_no}: `+++` without a file header"))
            })?;
            file.to = Some(parse_path(rest, "b/"));
        } else if let Some(rest) = line.strip_prefix("rename from ") {
            if let Some(file) = current.as_mut() {
                file.from = Some(rest.trim().to_string());
            }
        } else if let Some(rest) = line.strip_prefix("rename to ") {
            if let Some(file) = current.as_mut() {
                file.to = Some(rest.trim().to_string());
            }
        } else if line.starts_with("@@") {
            if current.is_none() {
                return Err(PulseError::DiffParse(format!(
                    "line {line_no}: hunk outside of a file section"
                )));
            }
            in_header = false;
            let parsed = parse_hunk_header(line, line_no)?;
            if !parsed.is_done() {
                hunk = Some(parsed);
            }
        }
        // Remaining header lines (index, mode, similarity, binary markers)
        // carry no line counts.
    }

    if hunk.is_some() {
        return Err(PulseError::DiffParse(
            "unexpected end of diff inside a hunk".to_string(),
        ));
    }
    files.extend(current.take());
    Ok(files)
}

/// Parse diff text and fold it into a [`Changes`] value.
pub fn changes_from_diff(text: &str) -> Result<Changes> {
    let mut changes = Changes::new();
    for file in parse_unified_diff(text)? {
        let Some(path) = file.path() else {
            return Err(PulseError::DiffParse(
                "file section without a usable path".to_string(),
            ));
        };
        changes.record(path, FileChange::new(file.additions, file.deletions));
    }
    Ok(changes)
}

fn consume_hunk_line(
    hunk: &mut Hunk,
    file: Option<&mut FileDiff>,
    line: &str,
    line_no: usize,
) -> Result<()> {
    let Some(file) = file else {
        return Err(PulseError::DiffParse(format!(
            "line {line_no}: hunk outside of a file section"
        )));
    };
    let underflow =
        || PulseError::DiffParse(format!("line {line_no}: hunk longer than its header declares"));
    match line.chars().next() {
        Some('+') => {
            hunk.new_remaining = hunk.new_remaining.checked_sub(1).ok_or_else(underflow)?;
            file.additions += 1;
        }
        Some('-') => {
            hunk.old_remaining = hunk.old_remaining.checked_sub(1).ok_or_else(underflow)?;
            file.deletions += 1;
        }
        // An empty line is a context line whose leading space was stripped.
        Some(' ') | None => {
            hunk.old_remaining = hunk.old_remaining.checked_sub(1).ok_or_else(underflow)?;
            hunk.new_remaining = hunk.new_remaining.checked_sub(1).ok_or_else(underflow)?;
        }
        Some('\\') => {}
        Some(_) => {
            return Err(PulseError::DiffParse(format!(
                "line {line_no}: unexpected line inside hunk: {line}"
            )));
        }
    }
    Ok(())
}

fn parse_hunk_header(line: &str, line_no: usize) -> Result<Hunk> {
    let malformed = || PulseError::DiffParse(format!("line {line_no}: malformed hunk header: {line}"));
    let body = line
        .strip_prefix("@@ ")
        .and_then(|rest| rest.split_once(" @@"))
        .map(|(ranges, _)| ranges)
        .ok_or_else(malformed)?;
    let (old, new) = body.split_once(' ').ok_or_else(malformed)?;
    let old = old.strip_prefix('-').ok_or_else(malformed)?;
    let new = new.strip_prefix('+').ok_or_else(malformed)?;
    Ok(Hunk {
        old_remaining: range_length(old).ok_or_else(malformed)?,
        new_remaining: range_length(new).ok_or_else(malformed)?,
    })
}

fn range_length(range: &str) -> Option<u64> {
    match range.split_once(',') {
        Some((start, length)) => {
            start.parse::<u64>().ok()?;
            length.parse().ok()
        }
        None => {
            range.parse::<u64>().ok()?;
            Some(1)
        }
    }
}

fn git_header_paths(rest: &str) -> FileDiff {
    let mut file = FileDiff::default();
    if let Some(index) = rest.rfind(" b/") {
        let from = &rest[..index];
        file.from = Some(from.strip_prefix("a/").unwrap_or(from).to_string());
        file.to = Some(rest[index + 3..].to_string());
    }
    file
}

fn parse_path(raw: &str, prefix: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    let path = path.trim_matches('"');
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}
