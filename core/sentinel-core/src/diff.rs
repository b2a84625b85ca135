//! Minimal line-level unified diff.
//!
//! Inputs are single source files, so the full O(m·n) LCS table is fine.
//! The table is backtracked into an edit script, and the script is grouped
//! into hunks: every non-equal edit pulls in up to `context` equal lines on
//! each side, and windows that overlap or touch merge into one hunk.
//!
//! Output is a flat list of strings: `@@ -a,b +c,d @@` headers followed by
//! lines prefixed with ` `, `-` or `+`, in old-to-new order. Start numbers
//! follow the unified-diff convention: 1-based, and for an empty side the
//! line *after which* the change sits (so an insert at the top of a file is
//! `-0,0`).

pub const DEFAULT_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Equal,
    Insert,
    Delete,
}

/// One step of the edit script. Indices are 0-based into old/new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub op: EditOp,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<String>,
}

impl Hunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

fn lcs_table<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<u32> {
    let width = new.len() + 1;
    let mut table = vec![0u32; (old.len() + 1) * width];
    for i in 1..=old.len() {
        for j in 1..=new.len() {
            table[i * width + j] = if old[i - 1].as_ref() == new[j - 1].as_ref() {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }
    table
}

/// Backtracks the LCS table into an ordered edit script.
pub fn edit_script<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<Edit> {
    let table = lcs_table(old, new);
    let width = new.len() + 1;
    let at = |i: usize, j: usize| table[i * width + j];

    let mut edits = Vec::with_capacity(old.len() + new.len());
    let (mut i, mut j) = (old.len(), new.len());
    while i > 0 || j > 0 {
        if i > 0
            && j > 0
            && old[i - 1].as_ref() == new[j - 1].as_ref()
            && at(i, j) == at(i - 1, j - 1) + 1
        {
            edits.push(Edit {
                op: EditOp::Equal,
                old_index: Some(i - 1),
                new_index: Some(j - 1),
            });
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || at(i, j - 1) >= at(i - 1, j)) {
            edits.push(Edit {
                op: EditOp::Insert,
                old_index: None,
                new_index: Some(j - 1),
            });
            j -= 1;
        } else {
            edits.push(Edit {
                op: EditOp::Delete,
                old_index: Some(i - 1),
                new_index: None,
            });
            i -= 1;
        }
    }
    edits.reverse();
    edits
}

/// Inclusive edit-index ranges covered by each hunk.
fn hunk_ranges(edits: &[Edit], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (index, edit) in edits.iter().enumerate() {
        if edit.op == EditOp::Equal {
            continue;
        }
        let lo = index.saturating_sub(context);
        let hi = (index + context).min(edits.len() - 1);
        match ranges.last_mut() {
            Some(last) if lo <= last.1 + 1 => last.1 = last.1.max(hi),
            _ => ranges.push((lo, hi)),
        }
    }
    ranges
}

pub fn hunks<S: AsRef<str>>(old: &[S], new: &[S], context: usize) -> Vec<Hunk> {
    let edits = edit_script(old, new);

    // Lines of each side consumed before edit `k`.
    let mut old_before = Vec::with_capacity(edits.len());
    let mut new_before = Vec::with_capacity(edits.len());
    let (mut old_seen, mut new_seen) = (0usize, 0usize);
    for edit in &edits {
        old_before.push(old_seen);
        new_before.push(new_seen);
        if edit.old_index.is_some() {
            old_seen += 1;
        }
        if edit.new_index.is_some() {
            new_seen += 1;
        }
    }

    hunk_ranges(&edits, context)
        .into_iter()
        .map(|(start, end)| {
            let mut lines = Vec::with_capacity(end - start + 1);
            let (mut old_count, mut new_count) = (0, 0);
            for edit in &edits[start..=end] {
                match (edit.op, edit.old_index, edit.new_index) {
                    (EditOp::Equal, Some(o), _) => {
                        lines.push(format!(" {}", old[o].as_ref()));
                        old_count += 1;
                        new_count += 1;
                    }
                    (EditOp::Delete, Some(o), _) => {
                        lines.push(format!("-{}", old[o].as_ref()));
                        old_count += 1;
                    }
                    (EditOp::Insert, _, Some(n)) => {
                        lines.push(format!("+{}", new[n].as_ref()));
                        new_count += 1;
                    }
                    _ => {}
                }
            }
            let start_line = |before: usize, count: usize| {
                if count == 0 {
                    before
                } else {
                    before + 1
                }
            };
            Hunk {
                old_start: start_line(old_before[start], old_count),
                old_count,
                new_start: start_line(new_before[start], new_count),
                new_count,
                lines,
            }
        })
        .collect()
}

/// Flat unified-diff hunk stream: headers followed by prefixed lines.
pub fn unified<S: AsRef<str>>(old: &[S], new: &[S], context: usize) -> Vec<String> {
    hunks(old, new, context)
        .into_iter()
        .flat_map(|hunk| std::iter::once(hunk.header()).chain(hunk.lines))
        .collect()
}
