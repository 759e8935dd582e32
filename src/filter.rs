//! Decides which folders and files a scan pays attention to.
//!
//! Three lists cooperate: folder filters gate traversal, file filters gate
//! individual files, and select filters (when present) demand at least one
//! match. Paths are "logical": forward slashes only, folders end in `/`, and
//! candidates are rooted with a leading `/` before testing.

use std::borrow::Cow;

use anyhow::{Result, ensure};

/// A glob with `*` (any run of characters, separators included) and `?`
/// (exactly one character).
pub fn glob_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // Feed the last star one more character and retry.
            star = Some((sp, st + 1));
            ti = st + 1;
            pi = sp + 1;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Backslashes are a spelling of the separator, not part of a name.
pub fn to_logical(path: &str) -> String {
    path.replace('\\', "/")
}

/// Filters that name neither a root nor a wildcard prefix apply anywhere in
/// the tree.
fn rooted(filter: &str) -> Cow<'_, str> {
    if filter.starts_with('/') || filter.starts_with('*') {
        Cow::Borrowed(filter)
    } else {
        Cow::Owned(format!("*/{filter}"))
    }
}

/// One include/exclude (or keep/ignore) pattern. Declaration order matters:
/// the last matching filter decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarFilter {
    pub pattern: String,
    pub is_inclusive: bool,
}

/// The filter configuration in effect for a scan, plus the error policy.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub folder_filters: Vec<PolarFilter>,
    pub file_filters: Vec<PolarFilter>,
    pub selected_file_filters: Vec<String>,
    /// Give up on the first per-file error instead of logging and moving on.
    pub abort: bool,
}

impl ScanOptions {
    /// Rebuild options from the parallel lists a snapshot stores.
    pub fn from_parts(
        folder_filters: Vec<String>,
        folder_filter_is_inclusive: Vec<bool>,
        file_filters: Vec<String>,
        file_filter_is_inclusive: Vec<bool>,
        selected_file_filters: Vec<String>,
    ) -> Result<Self> {
        ensure!(
            folder_filters.len() == folder_filter_is_inclusive.len(),
            "{} folder filters but {} polarities",
            folder_filters.len(),
            folder_filter_is_inclusive.len()
        );
        ensure!(
            file_filters.len() == file_filter_is_inclusive.len(),
            "{} file filters but {} polarities",
            file_filters.len(),
            file_filter_is_inclusive.len()
        );
        let zip = |patterns: Vec<String>, polarity: Vec<bool>| {
            patterns
                .into_iter()
                .zip(polarity)
                .map(|(pattern, is_inclusive)| PolarFilter {
                    pattern,
                    is_inclusive,
                })
                .collect()
        };
        Ok(Self {
            folder_filters: zip(folder_filters, folder_filter_is_inclusive),
            file_filters: zip(file_filters, file_filter_is_inclusive),
            selected_file_filters,
            abort: false,
        })
    }

    /// The parallel (patterns, polarities) lists for the folder filters.
    pub fn folder_parts(&self) -> (Vec<String>, Vec<bool>) {
        split_parts(&self.folder_filters)
    }

    /// The parallel (patterns, polarities) lists for the file filters.
    pub fn file_parts(&self) -> (Vec<String>, Vec<bool>) {
        split_parts(&self.file_filters)
    }

    /// Should a scan descend into (and record) this folder?
    ///
    /// `folder_path` is rooted and slash-terminated, e.g. `/A/B/`.
    /// Folders are in by default. An inclusive filter claims a folder when
    /// either is a prefix of the other, so `--include /A/B/C/` keeps the
    /// ancestors `/`, `/A/`, and `/A/B/` traversable too.
    pub fn folder_included(&self, folder_path: &str) -> bool {
        let mut included = true;
        for f in &self.folder_filters {
            if f.is_inclusive {
                if folder_path.starts_with(&f.pattern) || f.pattern.starts_with(folder_path) {
                    included = true;
                }
            } else {
                let pattern = format!("{}*", rooted(&f.pattern));
                if glob_match(folder_path, &pattern) {
                    included = false;
                }
            }
        }
        included
    }

    /// Do the keep/ignore filters leave this file in?
    pub fn file_included(&self, folder_path: &str, name: &str) -> bool {
        let mut included = true;
        for f in &self.file_filters {
            if file_filter_matches(folder_path, name, &f.pattern) {
                included = f.is_inclusive;
            }
        }
        included
    }

    /// An empty select list takes everything; otherwise at least one select
    /// filter must match.
    pub fn file_selected(&self, folder_path: &str, name: &str) -> bool {
        self.selected_file_filters.is_empty()
            || self
                .selected_file_filters
                .iter()
                .any(|f| file_filter_matches(folder_path, name, f))
    }

    pub fn file_in_scope(&self, folder_path: &str, name: &str) -> bool {
        self.file_included(folder_path, name) && self.file_selected(folder_path, name)
    }
}

fn split_parts(filters: &[PolarFilter]) -> (Vec<String>, Vec<bool>) {
    (
        filters.iter().map(|f| f.pattern.clone()).collect(),
        filters.iter().map(|f| f.is_inclusive).collect(),
    )
}

/// The three-way file filter rule: a trailing `/` makes it a folder glob, an
/// inner `/` splits it into folder and name globs, and anything else tests
/// the file name alone.
fn file_filter_matches(folder_path: &str, name: &str, filter: &str) -> bool {
    let filter = rooted(filter);
    if filter.ends_with('/') {
        glob_match(folder_path, &format!("{filter}*"))
    } else if let Some(slash) = filter.rfind('/') {
        let (folder_part, name_part) = filter.split_at(slash + 1);
        glob_match(folder_path, folder_part) && glob_match(name, name_part)
    } else {
        glob_match(name, &filter)
    }
}

/// Stitch two single-polarity CLI lists back into declaration order.
///
/// Each entry carries its argv index; the merged list is what the user
/// actually wrote, include and exclude interleaved.
pub fn merge_declaration_order(
    inclusive: Vec<(usize, String)>,
    exclusive: Vec<(usize, String)>,
) -> Vec<PolarFilter> {
    let mut merged: Vec<(usize, PolarFilter)> = inclusive
        .into_iter()
        .map(|(i, pattern)| {
            (
                i,
                PolarFilter {
                    pattern: to_logical(&pattern),
                    is_inclusive: true,
                },
            )
        })
        .chain(exclusive.into_iter().map(|(i, pattern)| {
            (
                i,
                PolarFilter {
                    pattern: to_logical(&pattern),
                    is_inclusive: false,
                },
            )
        }))
        .collect();
    merged.sort_by_key(|(i, _)| *i);
    merged.into_iter().map(|(_, f)| f).collect()
}
