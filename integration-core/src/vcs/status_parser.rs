//! Parses `git status --porcelain=v2 --branch --untracked-files=all` output
//! and the handful of auxiliary queries (`branch name`, `upstream name`,
//! `ahead/behind counts`) the facade issues alongside it.

use crate::error::{Error, Result};

/// Semantic classification of a single file's change, independent of
/// whether it is staged or unstaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unmodified,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    Ignored,
    Conflict,
}

impl ChangeKind {
    fn from_char(c: char) -> Self {
        match c {
            'M' => ChangeKind::Modified,
            'A' => ChangeKind::Added,
            'D' => ChangeKind::Deleted,
            'R' => ChangeKind::Renamed,
            'C' => ChangeKind::Copied,
            'T' => ChangeKind::Modified,
            'U' => ChangeKind::Conflict,
            _ => ChangeKind::Unmodified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub previous_path: Option<String>,
    pub kind: ChangeKind,
    pub staged: bool,
}

/// A status snapshot. Equality is the watcher's change-detection
/// comparison: branch, upstream, ahead/behind, and a positional deep
/// comparison of every list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepositoryStatus {
    pub branch: String,
    pub detached: bool,
    pub short_commit: String,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub staged: Vec<FileChange>,
    pub unstaged: Vec<FileChange>,
    pub untracked: Vec<String>,
    pub conflicts: Vec<String>,
}

/// Parses the file-state portion of porcelain v2 output. Header (`#`) and
/// ignored (`!`) lines are skipped; branch metadata is not derived from
/// here (see [`parse_branch_name`] and friends).
pub fn parse_changes(porcelain_text: &str) -> (Vec<FileChange>, Vec<FileChange>, Vec<String>, Vec<String>) {
    let mut staged = Vec::new();
    let mut unstaged = Vec::new();
    let mut untracked = Vec::new();
    let mut conflicts = Vec::new();

    for line in porcelain_text.lines() {
        if line.is_empty() {
            continue;
        }
        match line.as_bytes()[0] {
            b'#' | b'!' => continue,
            b'?' => {
                if let Some(path) = line.get(2..) {
                    untracked.push(path.to_string());
                }
            }
            b'1' => {
                if let Some((path, x, y)) = parse_ordinary(line) {
                    if x != '.' {
                        staged.push(FileChange {
                            path: path.clone(),
                            previous_path: None,
                            kind: ChangeKind::from_char(x),
                            staged: true,
                        });
                    }
                    if y != '.' {
                        unstaged.push(FileChange {
                            path,
                            previous_path: None,
                            kind: ChangeKind::from_char(y),
                            staged: false,
                        });
                    }
                }
            }
            b'2' => {
                if let Some((path, previous_path, x, y)) = parse_rename_or_copy(line) {
                    if x != '.' {
                        staged.push(FileChange {
                            path: path.clone(),
                            previous_path: Some(previous_path.clone()),
                            kind: ChangeKind::from_char(x),
                            staged: true,
                        });
                    }
                    if y != '.' {
                        unstaged.push(FileChange {
                            path,
                            previous_path: Some(previous_path),
                            kind: ChangeKind::from_char(y),
                            staged: false,
                        });
                    }
                }
            }
            b'u' => {
                if let Some(path) = parse_unmerged(line) {
                    conflicts.push(path);
                }
            }
            _ => continue,
        }
    }

    (staged, unstaged, untracked, conflicts)
}

/// `1 XY sub mH mI mW hH hI path`
fn parse_ordinary(line: &str) -> Option<(String, char, char)> {
    let mut fields = line.splitn(9, ' ');
    fields.next()?; // record marker
    let xy = fields.next()?;
    for _ in 0..6 {
        fields.next()?;
    }
    let path = fields.next()?.to_string();
    let mut xy_chars = xy.chars();
    Some((path, xy_chars.next()?, xy_chars.next()?))
}

/// `2 XY sub mH mI mW hH hI Xscore path\toriginal-path`. Per canonical
/// porcelain v2 semantics, the path before the tab is the new (current)
/// path and the path after the tab is the original one.
fn parse_rename_or_copy(line: &str) -> Option<(String, String, char, char)> {
    let mut fields = line.splitn(10, ' ');
    fields.next()?; // record marker
    let xy = fields.next()?;
    for _ in 0..7 {
        fields.next()?;
    }
    let rest = fields.next()?;
    let (path, original_path) = rest.split_once('\t')?;
    let mut xy_chars = xy.chars();
    Some((
        path.to_string(),
        original_path.to_string(),
        xy_chars.next()?,
        xy_chars.next()?,
    ))
}

/// `u XY sub m1 m2 m3 mW h1 h2 h3 path`
fn parse_unmerged(line: &str) -> Option<String> {
    let mut fields = line.splitn(11, ' ');
    for _ in 0..10 {
        fields.next()?;
    }
    fields.next().map(str::to_string)
}

/// Parses the output of the branch-name query. An empty or `HEAD` result
/// means detached.
pub fn parse_branch_name(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "HEAD" {
        (String::new(), true)
    } else {
        (trimmed.to_string(), false)
    }
}

pub fn parse_short_commit(raw: &str) -> String {
    raw.trim().to_string()
}

pub fn parse_upstream(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a left-right revision count, e.g. `"3\t1"` or `"3 1"`, into
/// `(ahead, behind)`.
pub fn parse_ahead_behind(raw: &str) -> Result<(u32, u32)> {
    let mut parts = raw.split_whitespace();
    let ahead = parts
        .next()
        .ok_or_else(|| Error::external_failure("ahead/behind: missing ahead count"))?
        .parse()
        .map_err(|_| Error::external_failure("ahead/behind: ahead count not an integer"))?;
    let behind = parts
        .next()
        .ok_or_else(|| Error::external_failure("ahead/behind: missing behind count"))?
        .parse()
        .map_err(|_| Error::external_failure("ahead/behind: behind count not an integer"))?;
    Ok((ahead, behind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ordinary_record_with_both_sides_changed_yields_staged_and_unstaged() {
        let (staged, unstaged, _, _) = parse_changes("1 MM N... 100644 100644 100644 abc123 def456 src/lib.rs");
        assert_eq!(staged.len(), 1);
        assert_eq!(unstaged.len(), 1);
        assert_eq!(staged[0].path, "src/lib.rs");
        assert_eq!(staged[0].kind, ChangeKind::Modified);
        assert_eq!(unstaged[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn ordinary_record_with_unchanged_index_yields_only_unstaged() {
        let (staged, unstaged, _, _) = parse_changes("1 .M N... 100644 100644 100644 abc123 abc123 src/main.rs");
        assert!(staged.is_empty());
        assert_eq!(unstaged.len(), 1);
    }

    #[test]
    fn untracked_path_with_spaces_is_captured_whole() {
        let (_, _, untracked, _) = parse_changes("? new dir/file with spaces.txt");
        assert_eq!(untracked, vec!["new dir/file with spaces.txt"]);
    }

    #[test]
    fn rename_record_splits_new_path_before_tab_and_original_after() {
        let (staged, _, _, _) =
            parse_changes("2 R. N... 100644 100644 100644 abc123 abc123 R100 newname.txt\toldname.txt");
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].path, "newname.txt");
        assert_eq!(staged[0].previous_path.as_deref(), Some("oldname.txt"));
        assert_eq!(staged[0].kind, ChangeKind::Renamed);
    }

    #[test]
    fn unmerged_record_is_a_conflict() {
        let (_, _, _, conflicts) =
            parse_changes("u UU N... 100644 100644 100644 100644 abc123 def456 789abc merged.rs");
        assert_eq!(conflicts, vec!["merged.rs"]);
    }

    #[test]
    fn header_and_ignored_lines_contribute_nothing() {
        let (staged, unstaged, untracked, conflicts) =
            parse_changes("# branch.oid abcdef\n! build/output.o");
        assert!(staged.is_empty() && unstaged.is_empty() && untracked.is_empty() && conflicts.is_empty());
    }

    #[test]
    fn empty_branch_query_means_detached() {
        assert_eq!(parse_branch_name(""), (String::new(), true));
        assert_eq!(parse_branch_name("HEAD\n"), (String::new(), true));
        assert_eq!(parse_branch_name("main\n"), ("main".to_string(), false));
    }

    #[test]
    fn ahead_behind_parses_two_integers() {
        assert_eq!(parse_ahead_behind("3\t1\n").unwrap(), (3, 1));
        assert_eq!(parse_ahead_behind("0 0").unwrap(), (0, 0));
        assert!(parse_ahead_behind("garbage").is_err());
    }

    fn status_char() -> impl Strategy<Value = char> {
        prop_oneof![
            Just('.'),
            Just('M'),
            Just('A'),
            Just('D'),
            Just('R'),
            Just('C'),
            Just('T'),
            Just('U'),
        ]
    }

    proptest! {
        #[test]
        fn a_file_never_appears_in_more_than_one_of_staged_untracked_conflict(
            x in status_char(), y in status_char(),
        ) {
            let line = format!("1 {x}{y} N... 100644 100644 100644 abc abc path.txt");
            let (staged, _unstaged, untracked, conflicts) = parse_changes(&line);
            let memberships = [!staged.is_empty(), !untracked.is_empty(), !conflicts.is_empty()]
                .iter()
                .filter(|present| **present)
                .count();
            prop_assert!(memberships <= 1);
        }
    }
}
