//! # Row
//!
//! A `Row` owns the logical bytes of one line, their rendered projection (tabs expanded), and the
//! highlight classification of that projection. `RowStore` is the ordered collection of rows and
//! the only thing allowed to mutate them, so that the `idx` back-pointer invariant (`row.idx ==
//! index_of(row)`) and the `hl_open_comment` cascade are always kept consistent together.

use crate::highlight::{self, HlType};
use crate::syntax::Conf as SyntaxConf;

/// One logical line of text, plus its derived render and highlight arrays.
#[derive(Default)]
pub struct Row {
    /// This row's position in its `RowStore`. Kept equal to its index at all times.
    pub idx: usize,
    /// The logical bytes of the row (no newline terminator).
    pub chars: Vec<u8>,
    /// The rendered projection of `chars`: tabs expanded to the next multiple of the tab stop.
    pub render: Vec<u8>,
    /// The highlight token for each byte of `render`.
    pub hl: Vec<HlType>,
    /// Whether this row ends inside an unterminated multi-line comment.
    pub hl_open_comment: bool,
}

impl Row {
    /// Create a new row at the given index, with `render`/`hl` left empty until the store renders
    /// it.
    fn new(idx: usize, chars: Vec<u8>) -> Self { Self { idx, chars, ..Self::default() } }

    /// Recompute `render` from `chars`, expanding tabs so that the next column is a multiple of
    /// `tab_stop`.
    fn rerender(&mut self, tab_stop: usize) {
        self.render = Vec::with_capacity(self.chars.len());
        for &b in &self.chars {
            if b == b'\t' {
                let pad = tab_stop - (self.render.len() % tab_stop);
                self.render.resize(self.render.len() + pad, b' ');
            } else {
                self.render.push(b);
            }
        }
    }
}

/// Map a column in `chars` space to the corresponding column in `render` space, given tab
/// expansion.
pub fn row_cx_to_rx(row: &Row, cx: usize, tab_stop: usize) -> usize {
    let mut rx = 0;
    for &b in &row.chars[..cx.min(row.chars.len())] {
        rx += if b == b'\t' { tab_stop - (rx % tab_stop) } else { 1 };
    }
    rx
}

/// Map a column in `render` space back to `chars` space: the smallest `cx` whose rendered width
/// (i.e. `row_cx_to_rx(row, cx, tab_stop)`) strictly exceeds `rx`, or `row.chars.len()` if none.
pub fn row_rx_to_cx(row: &Row, rx: usize, tab_stop: usize) -> usize {
    let mut cur_rx = 0;
    for (cx, &b) in row.chars.iter().enumerate() {
        if cur_rx > rx {
            return cx;
        }
        cur_rx += if b == b'\t' { tab_stop - (cur_rx % tab_stop) } else { 1 };
    }
    row.chars.len()
}

/// The ordered collection of rows making up the document.
#[derive(Default)]
pub struct RowStore {
    rows: Vec<Row>,
}

impl RowStore {
    /// Create an empty row store.
    pub fn new() -> Self { Self::default() }

    /// The number of rows.
    pub fn len(&self) -> usize { self.rows.len() }

    /// Whether the store has no rows.
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Borrow a row by index.
    pub fn get(&self, at: usize) -> Option<&Row> { self.rows.get(at) }

    /// Mutably borrow a row by index, for in-place edits (e.g. the search overlay) that don't
    /// change its length and so don't require re-rendering.
    pub fn get_mut(&mut self, at: usize) -> Option<&mut Row> { self.rows.get_mut(at) }

    /// Iterate over all rows in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> { self.rows.iter() }

    /// Reassign `idx` to match position for every row from `from` onward. Called after any
    /// structural change (insert/delete) so invariant 2 (`row.idx == index_of(row)`) always holds.
    fn reindex_from(&mut self, from: usize) {
        for (i, row) in self.rows.iter_mut().enumerate().skip(from) {
            row.idx = i;
        }
    }

    /// Insert a new row at `at` (clipped to `[0, len]`), containing `bytes`. Shifts later rows up,
    /// renders and highlights the new row, and cascades highlighting to following rows if needed.
    pub fn insert_row(&mut self, at: usize, bytes: Vec<u8>, syntax: &SyntaxConf, tab_stop: usize) {
        let at = at.min(self.rows.len());
        self.rows.insert(at, Row::new(at, bytes));
        self.reindex_from(at);
        self.rehighlight_from(at, syntax, tab_stop);
    }

    /// Remove the row at `at` (must be `< len`). Shifts later rows down.
    pub fn delete_row(&mut self, at: usize) {
        if at >= self.rows.len() {
            return;
        }
        self.rows.remove(at);
        self.reindex_from(at);
    }

    /// Insert `byte` at column `at` (clipped to `[0, row.chars.len()]`) of `row`, then re-render.
    pub fn row_insert_char(
        &mut self, row: usize, at: usize, byte: u8, syntax: &SyntaxConf, tab_stop: usize,
    ) {
        if let Some(r) = self.rows.get_mut(row) {
            let at = at.min(r.chars.len());
            r.chars.insert(at, byte);
            self.rehighlight_from(row, syntax, tab_stop);
        }
    }

    /// Delete the byte at column `at` of `row`, if in bounds, then re-render.
    pub fn row_delete_char(&mut self, row: usize, at: usize, syntax: &SyntaxConf, tab_stop: usize) {
        if let Some(r) = self.rows.get_mut(row) {
            if at < r.chars.len() {
                r.chars.remove(at);
                self.rehighlight_from(row, syntax, tab_stop);
            }
        }
    }

    /// Append `bytes` to the end of `row`'s chars, then re-render.
    pub fn row_append_string(
        &mut self, row: usize, bytes: &[u8], syntax: &SyntaxConf, tab_stop: usize,
    ) {
        if let Some(r) = self.rows.get_mut(row) {
            r.chars.extend_from_slice(bytes);
            self.rehighlight_from(row, syntax, tab_stop);
        }
    }

    /// Truncate `row`'s chars to `len` bytes, then re-render.
    pub fn row_truncate(&mut self, row: usize, len: usize, syntax: &SyntaxConf, tab_stop: usize) {
        if let Some(r) = self.rows.get_mut(row) {
            r.chars.truncate(len);
            self.rehighlight_from(row, syntax, tab_stop);
        }
    }

    /// Re-render `row` from its current `chars` and run the highlighter on it, taking
    /// `row - 1`'s `hl_open_comment` as the initial multi-line-comment state. If this row's own
    /// `hl_open_comment` changes as a result, cascade to the next row (and only the next row per
    /// call; that row's own cascade handles anything beyond it).
    fn rehighlight_from(&mut self, row: usize, syntax: &SyntaxConf, tab_stop: usize) {
        let Some(r) = self.rows.get_mut(row) else { return };
        r.rerender(tab_stop);
        let prev_open = if row > 0 { self.rows[row - 1].hl_open_comment } else { false };
        let r = &mut self.rows[row];
        let (hl, new_open) = highlight::scan_row(&r.render, syntax, prev_open);
        let changed = new_open != r.hl_open_comment;
        r.hl = hl;
        r.hl_open_comment = new_open;
        if changed && row + 1 < self.rows.len() {
            self.rehighlight_from(row + 1, syntax, tab_stop);
        }
    }

    /// Re-render and re-highlight every row from scratch, e.g. after the active syntax definition
    /// changes.
    pub fn rehighlight_all(&mut self, syntax: &SyntaxConf, tab_stop: usize) {
        for i in 0..self.rows.len() {
            let Some(r) = self.rows.get_mut(i) else { continue };
            r.rerender(tab_stop);
            let prev_open = if i > 0 { self.rows[i - 1].hl_open_comment } else { false };
            let r = &mut self.rows[i];
            let (hl, new_open) = highlight::scan_row(&r.render, syntax, prev_open);
            r.hl = hl;
            r.hl_open_comment = new_open;
        }
    }
}
