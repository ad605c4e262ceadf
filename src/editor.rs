//! # Editor
//!
//! Ties together the row store, highlighter, viewport, search and prompt into the key-dispatch
//! loop: `refresh -> read key -> dispatch`.

use std::fmt::Write as _;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

use crate::buffer::AppendBuffer;
use crate::highlight::HlType;
use crate::row::{Row, RowStore, row_cx_to_rx, row_rx_to_cx};
use crate::syntax::Conf as SyntaxConf;
use crate::{Config, Error, ansi_escape::*, sys, terminal};

const fn ctrl_key(key: u8) -> u8 { key & 0x1f }
const EXIT: u8 = ctrl_key(b'Q');
const CANCEL: u8 = ctrl_key(b'C');
const SAVE: u8 = ctrl_key(b'S');
const FIND: u8 = ctrl_key(b'F');
const DELETE_ROW: u8 = ctrl_key(b'K');
const REFRESH_SCREEN: u8 = ctrl_key(b'L');
const DELETE_BIS: u8 = ctrl_key(b'H');
const BACKSPACE: u8 = 127;

const HELP_MESSAGE: &str = "^S save | ^Q quit | ^F find | ^K delete row";

/// `set_status!` sets a formatted status message for the editor.
macro_rules! set_status {
    ($editor:expr, $($arg:expr),*) => ($editor.status_msg = Some(StatusMessage::new(format!($($arg),*))))
}

/// One key event, after escape-sequence decoding.
enum Key {
    Arrow(AKey),
    Page(PageKey),
    Home,
    End,
    Delete,
    Escape,
    /// A terminal resize signal; carries no data of its own, picked up via `update_window_size`.
    Resize,
    /// A literal byte, `0x00`-`0xff`.
    Char(u8),
}

/// An arrow key.
enum AKey {
    Left,
    Right,
    Up,
    Down,
}

/// A page key.
enum PageKey {
    Up,
    Down,
}

/// The cursor position, the rendered-column memory, and the scroll offsets.
#[derive(Default, Clone)]
struct CursorState {
    /// Column, indexing `row.chars` (bytes, not rendered columns).
    x: usize,
    /// Row number, 0-indexed.
    y: usize,
    /// Row offset of the viewport.
    roff: usize,
    /// Column offset of the viewport (in rendered columns).
    coff: usize,
    /// Sticky rendered-column target, restored on vertical motion.
    desired_rx: usize,
}

impl CursorState {
    fn move_to_next_line(&mut self) { (self.x, self.y) = (0, self.y + 1); }

    /// Adjust `roff`/`coff` so that `(rx, y)` is visible, moving each bound as little as possible.
    fn scroll(&mut self, rx: usize, screen_rows: usize, screen_cols: usize) {
        self.roff = self.roff.clamp(self.y.saturating_sub(screen_rows.saturating_sub(1)), self.y);
        self.coff = self.coff.clamp(rx.saturating_sub(screen_cols.saturating_sub(1)), rx);
    }
}

/// A status message, shown at the bottom of the screen for `config.message_duration`.
struct StatusMessage {
    msg: String,
    time: Instant,
}

impl StatusMessage {
    fn new(msg: String) -> Self { Self { msg, time: Instant::now() } }
}

/// Pretty-format a size in bytes.
fn format_size(n: u64) -> String {
    if n < 1024 {
        return format!("{n}B");
    }
    let i = (64 - n.leading_zeros() + 9) / 10 - 1;
    let q = 100 * n / (1024 << ((i - 1) * 10));
    format!("{}.{:02}{}B", q / 100, q % 100, b" kMGTPEZ"[i as usize] as char)
}

/// The index of `needle` as a subslice of `s`, if any.
fn slice_find<T: PartialEq>(s: &[T], needle: &[T]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    (0..(s.len() + 1).saturating_sub(needle.len())).find(|&i| s[i..].starts_with(needle))
}

/// Strip a single trailing `\r` from a line read up to (but not including) a `\n`.
fn strip_cr(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

/// The text editor: the text buffer, the viewport, and the raw-mode terminal session.
pub struct Editor {
    /// `Some` while a prompt (Save/Find) is active; `None` in ordinary editing mode.
    prompt_mode: Option<PromptMode>,
    cursor: CursorState,
    /// Rows available for text, excluding the 2-row status/message band.
    screen_rows: usize,
    screen_cols: usize,
    row_store: RowStore,
    dirty: bool,
    config: Config,
    /// Remaining Ctrl-Q presses required to quit with unsaved changes.
    quit_times: usize,
    file_name: Option<String>,
    status_msg: Option<StatusMessage>,
    syntax: SyntaxConf,
    /// Total bytes across all rows, excluding newlines.
    n_bytes: u64,
    /// The terminal mode as it was before raw mode was enabled; restored on drop.
    orig_term_mode: Option<sys::TermMode>,
}

impl Editor {
    /// Enable raw mode and initialize the editor.
    ///
    /// # Errors
    ///
    /// Will return `Err` if enabling raw mode, registering the resize signal handler, or reading
    /// the window size fails.
    pub fn new(config: Config) -> Result<Self, Error> {
        sys::register_winsize_change_signal_handler()?;
        let orig_term_mode = sys::enable_raw_mode()?;
        let quit_times = config.quit_times;
        let mut editor = Self {
            prompt_mode: None,
            cursor: CursorState::default(),
            screen_rows: 0,
            screen_cols: 0,
            row_store: RowStore::new(),
            dirty: false,
            config,
            quit_times,
            file_name: None,
            status_msg: None,
            syntax: SyntaxConf::default(),
            n_bytes: 0,
            orig_term_mode: Some(orig_term_mode),
        };
        editor.update_window_size()?;
        set_status!(editor, "{}", HELP_MESSAGE);
        Ok(editor)
    }

    fn current_row(&self) -> Option<&Row> { self.row_store.get(self.cursor.y) }

    /// The cursor position in rendered columns (0 past end-of-file).
    fn rx(&self) -> usize {
        self.current_row().map_or(0, |row| row_cx_to_rx(row, self.cursor.x, self.config.tab_stop))
    }

    /// Restore `cursor.x` from `cursor.desired_rx` against the row now under the cursor.
    fn restore_desired_column(&mut self) {
        let desired = self.cursor.desired_rx;
        self.cursor.x = match self.current_row() {
            Some(row) => row_rx_to_cx(row, desired, self.config.tab_stop),
            None => 0,
        };
    }

    /// Clamp `cursor.x` to the current row's length (or 0 past end-of-file).
    fn update_cursor_x_position(&mut self) {
        self.cursor.x = self.cursor.x.min(self.current_row().map_or(0, |row| row.chars.len()));
    }

    /// Move the cursor one step in direction `key`. Horizontal motion wraps at line boundaries and
    /// clamps `x` to the destination row's length; vertical motion only changes `y`, leaving `x`
    /// for the caller to fix up (typically via `restore_desired_column`).
    fn move_cursor(&mut self, key: &AKey) {
        let (mut cursor_x, mut cursor_y) = (self.cursor.x, self.cursor.y);
        match (key, self.current_row()) {
            (AKey::Left, Some(_)) if cursor_x > 0 => cursor_x -= 1,
            (AKey::Left, _) if cursor_y > 0 => {
                cursor_y -= 1;
                cursor_x = usize::MAX;
            }
            (AKey::Right, Some(row)) if cursor_x < row.chars.len() => cursor_x += 1,
            (AKey::Right, Some(_)) => {
                cursor_x = 0;
                cursor_y += 1;
            }
            (AKey::Up, _) if cursor_y > 0 => cursor_y -= 1,
            (AKey::Down, Some(_)) => cursor_y += 1,
            _ => (),
        }
        (self.cursor.x, self.cursor.y) = (cursor_x, cursor_y);
        if matches!(key, AKey::Left | AKey::Right) {
            self.update_cursor_x_position();
        }
    }

    /// Read and decode one key, polling the resize flag while the read times out.
    fn loop_until_keypress(&mut self) -> Result<Key, Error> {
        loop {
            if sys::has_window_size_changed() {
                self.update_window_size()?;
                return Ok(Key::Resize);
            }
            let mut bytes = sys::stdin()?.bytes();
            match bytes.next().transpose()? {
                Some(b'\x1b') => {
                    return Ok(match bytes.next().transpose()? {
                        Some(b @ (b'[' | b'O')) => match (b, bytes.next().transpose()?) {
                            (b'[', Some(b'A')) => Key::Arrow(AKey::Up),
                            (b'[', Some(b'B')) => Key::Arrow(AKey::Down),
                            (b'[', Some(b'C')) => Key::Arrow(AKey::Right),
                            (b'[', Some(b'D')) => Key::Arrow(AKey::Left),
                            (b'[' | b'O', Some(b'H')) => Key::Home,
                            (b'[' | b'O', Some(b'F')) => Key::End,
                            (b'[', Some(c @ b'0'..=b'8')) => {
                                let d = bytes.next().transpose()?;
                                match (c, d) {
                                    (b'1' | b'7', Some(b'~')) => Key::Home,
                                    (b'4' | b'8', Some(b'~')) => Key::End,
                                    (b'3', Some(b'~')) => Key::Delete,
                                    (b'5', Some(b'~')) => Key::Page(PageKey::Up),
                                    (b'6', Some(b'~')) => Key::Page(PageKey::Down),
                                    _ => Key::Escape,
                                }
                            }
                            _ => Key::Escape,
                        },
                        _ => Key::Escape,
                    });
                }
                Some(a) => return Ok(Key::Char(a)),
                None => continue,
            }
        }
    }

    /// Re-read the terminal window size, reserving 2 rows for the status/message band.
    fn update_window_size(&mut self) -> Result<(), Error> {
        let (rows, cols) = sys::get_window_size().or_else(|_| terminal::get_window_size_using_cursor())?;
        self.screen_rows = rows.saturating_sub(2);
        self.screen_cols = cols;
        Ok(())
    }

    /// Select the built-in syntax definition matching `path`'s filename, and re-highlight every
    /// row under it.
    fn select_syntax_highlight(&mut self, path: &Path) {
        let filename = path.to_string_lossy();
        self.syntax = SyntaxConf::select(&filename);
        self.row_store.rehighlight_all(&self.syntax, self.config.tab_stop);
    }

    /// Insert `c` at the cursor, appending a new row first if the cursor is past end-of-file.
    fn insert_char(&mut self, c: u8) {
        if self.cursor.y == self.row_store.len() {
            self.row_store.insert_row(self.cursor.y, Vec::new(), &self.syntax, self.config.tab_stop);
        }
        self.row_store.row_insert_char(self.cursor.y, self.cursor.x, c, &self.syntax, self.config.tab_stop);
        self.cursor.x += 1;
        self.n_bytes += 1;
        self.dirty = true;
    }

    /// Split the current row at the cursor, replicating its leading blank-byte indentation onto
    /// the new row.
    fn insert_newline(&mut self) {
        let tab_stop = self.config.tab_stop;
        let new_cx = if self.cursor.x == 0 {
            self.row_store.insert_row(self.cursor.y, Vec::new(), &self.syntax, tab_stop);
            0
        } else {
            let row = self.current_row().expect("cursor row must exist when cx > 0");
            let n_blank =
                row.chars[..self.cursor.x].iter().take_while(|&&b| b == b' ' || b == b'\t').count();
            let leading = row.chars[..n_blank].to_vec();
            let tail = row.chars[self.cursor.x..].to_vec();
            self.row_store.insert_row(self.cursor.y + 1, leading, &self.syntax, tab_stop);
            self.row_store.row_append_string(self.cursor.y + 1, &tail, &self.syntax, tab_stop);
            let trunc_len = if n_blank == self.cursor.x { 0 } else { self.cursor.x };
            self.row_store.row_truncate(self.cursor.y, trunc_len, &self.syntax, tab_stop);
            n_blank
        };
        self.cursor.y += 1;
        self.cursor.x = new_cx;
        self.dirty = true;
    }

    /// Delete the byte to the left of the cursor, or join with the previous row at column 0.
    fn delete_char(&mut self) {
        if self.cursor.y >= self.row_store.len() || (self.cursor.x == 0 && self.cursor.y == 0) {
            return;
        }
        let tab_stop = self.config.tab_stop;
        if self.cursor.x > 0 {
            self.row_store.row_delete_char(self.cursor.y, self.cursor.x - 1, &self.syntax, tab_stop);
            self.cursor.x -= 1;
            self.n_bytes -= 1;
        } else {
            let prev_len = self.row_store.get(self.cursor.y - 1).map_or(0, |r| r.chars.len());
            let tail = self.row_store.get(self.cursor.y).map_or_else(Vec::new, |r| r.chars.clone());
            self.row_store.row_append_string(self.cursor.y - 1, &tail, &self.syntax, tab_stop);
            self.row_store.delete_row(self.cursor.y);
            self.cursor.y -= 1;
            self.cursor.x = prev_len;
        }
        self.dirty = true;
    }

    /// Delete the row under the cursor outright.
    fn delete_current_row(&mut self) {
        if self.cursor.y >= self.row_store.len() {
            return;
        }
        if let Some(row) = self.row_store.get(self.cursor.y) {
            self.n_bytes -= row.chars.len() as u64;
        }
        self.row_store.delete_row(self.cursor.y);
        self.cursor.x = 0;
        self.cursor.y = self.cursor.y.min(self.row_store.len());
        self.dirty = true;
    }

    /// Load `path` into the row store. A missing file starts an empty buffer (not an error); any
    /// other I/O error is propagated.
    fn load(&mut self, path: &Path) -> Result<(), Error> {
        let tab_stop = self.config.tab_stop;
        match std::fs::File::open(path) {
            Ok(file) => {
                for line in BufReader::new(file).split(b'\n') {
                    let bytes = strip_cr(line?);
                    self.row_store.insert_row(self.row_store.len(), bytes, &self.syntax, tab_stop);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(e.into()),
        }
        if self.row_store.is_empty() {
            self.row_store.insert_row(0, Vec::new(), &self.syntax, tab_stop);
        }
        self.n_bytes = self.row_store.iter().map(|row| row.chars.len() as u64).sum();
        Ok(())
    }

    /// Write every row to `file_name`, one row per line, each followed by `\n`.
    fn save(&self, file_name: &str) -> Result<usize, io::Error> {
        let mut file = std::fs::File::create(file_name)?;
        let mut written = 0;
        for row in self.row_store.iter() {
            file.write_all(&row.chars)?;
            file.write_all(b"\n")?;
            written += row.chars.len() + 1;
        }
        file.sync_all()?;
        Ok(written)
    }

    /// Save to `file_name`, reporting success or failure via the status bar. Returns whether the
    /// save succeeded.
    fn save_and_handle_io_errors(&mut self, file_name: &str) -> bool {
        let saved = self.save(file_name);
        match saved.as_ref() {
            Ok(w) => set_status!(self, "{} written to {}", format_size(*w as u64), file_name),
            Err(err) => set_status!(self, "Can't save! I/O error: {}", err),
        }
        self.dirty &= saved.is_err();
        saved.is_ok()
    }

    /// Save to a filename obtained from the Save prompt, then adopt it as `file_name` and
    /// re-select syntax highlighting.
    fn save_as(&mut self, file_name: String) {
        if self.save_and_handle_io_errors(&file_name) {
            self.select_syntax_highlight(Path::new(&file_name));
            self.file_name = Some(file_name);
        }
    }

    /// Render rows `[roff, roff + screen_rows)`, or `~` past end-of-file, or a welcome banner when
    /// the buffer is entirely empty.
    fn draw_rows(&self, buf: &mut AppendBuffer) -> Result<(), Error> {
        for y in 0..self.screen_rows {
            let row_idx = self.cursor.roff + y;
            if row_idx >= self.row_store.len() {
                if self.row_store.is_empty() && y == self.screen_rows / 3 {
                    self.draw_welcome(buf)?;
                } else {
                    buf.append("~");
                }
            } else {
                self.draw_row(row_idx, buf)?;
            }
            buf.append(CLEAR_LINE_RIGHT_OF_CURSOR);
            buf.append("\r\n");
        }
        Ok(())
    }

    fn draw_welcome(&self, buf: &mut AppendBuffer) -> Result<(), Error> {
        let welcome = format!("kilo -- version {}", env!("KILO_VERSION"));
        let welcome = &welcome[..welcome.len().min(self.screen_cols)];
        let padding = self.screen_cols.saturating_sub(welcome.len()) / 2;
        if padding > 0 {
            buf.append("~");
        }
        write!(buf, "{:>padding$}{welcome}", "", padding = padding.saturating_sub(1))?;
        Ok(())
    }

    /// Render one row's visible slice, tracking the active color to avoid redundant SGR codes.
    fn draw_row(&self, idx: usize, buf: &mut AppendBuffer) -> Result<(), Error> {
        let row = self.row_store.get(idx).expect("row index in range");
        let start = self.cursor.coff.min(row.render.len());
        let end = (self.cursor.coff + self.screen_cols).min(row.render.len());
        let mut current_color: Option<HlType> = None;
        for j in start..end {
            let b = row.render[j];
            let hl = row.hl[j];
            if !(b == b' ' || b.is_ascii_graphic()) {
                let glyph = if b < 26 { (b'@' + b) as char } else { '?' };
                write!(buf, "{REVERSE_VIDEO}{glyph}{RESET_FMT}")?;
                if let Some(hl) = current_color {
                    write!(buf, "{hl}")?;
                }
            } else if hl == HlType::Normal {
                if current_color.take().is_some() {
                    buf.append(DEFAULT_FG);
                }
                buf.append_byte(b);
            } else {
                if current_color != Some(hl) {
                    write!(buf, "{hl}")?;
                    current_color = Some(hl);
                }
                buf.append_byte(b);
            }
        }
        Ok(())
    }

    /// Draw `" <filename|[No Name]> - N lines (modified)?"` left-aligned and
    /// `"<filetype|no ft> | cy+1/N"` right-aligned, in reverse video.
    fn draw_status_bar(&self, buf: &mut AppendBuffer) -> Result<(), Error> {
        let modified = if self.dirty { " (modified)" } else { "" };
        let name = self.file_name.as_deref().unwrap_or("[No Name]");
        let num_rows = self.row_store.len();
        let mut left = format!(" {name} - {num_rows} lines{modified}");
        left.truncate(self.screen_cols);
        let right = format!("{} | {}/{num_rows}", self.syntax.name, self.cursor.y + 1);
        let rw = self.screen_cols.saturating_sub(left.len());
        write!(buf, "{REVERSE_VIDEO}{left}{right:>rw$.rw$}{RESET_FMT}\r\n")?;
        Ok(())
    }

    /// Draw the current status message, if not yet expired.
    fn draw_message_bar(&self, buf: &mut AppendBuffer) {
        buf.append(CLEAR_LINE_RIGHT_OF_CURSOR);
        if let Some(sm) = self.status_msg.as_ref().filter(|sm| sm.time.elapsed() < self.config.message_duration)
        {
            let len = sm.msg.len().min(self.screen_cols);
            buf.append(&sm.msg[..len]);
        }
    }

    /// Compose and write one complete screen refresh.
    fn refresh_screen(&mut self) -> Result<(), Error> {
        self.cursor.scroll(self.rx(), self.screen_rows, self.screen_cols);
        let mut buf = AppendBuffer::new();
        buf.append(HIDE_CURSOR);
        buf.append(MOVE_CURSOR_TO_START);
        self.draw_rows(&mut buf)?;
        self.draw_status_bar(&mut buf)?;
        self.draw_message_bar(&mut buf);
        let (cursor_x, cursor_y) = if self.prompt_mode.is_none() {
            (self.rx() - self.cursor.coff + 1, self.cursor.y - self.cursor.roff + 1)
        } else {
            (self.status_msg.as_ref().map_or(1, |s| s.msg.len() + 1), self.screen_rows + 2)
        };
        write!(buf, "\x1b[{cursor_y};{cursor_x}H")?;
        buf.append(SHOW_CURSOR);
        io::stdout().write_all(&buf.free())?;
        io::stdout().flush().map_err(Error::from)
    }

    /// Dispatch one key in ordinary editing mode. Returns whether the program should exit, and
    /// optionally a prompt mode to switch to.
    fn process_keypress(&mut self, key: &Key) -> (bool, Option<PromptMode>) {
        let mut prompt_mode = None;
        let mut vertical = false;
        match key {
            Key::Arrow(arrow @ (AKey::Up | AKey::Down)) => {
                self.move_cursor(arrow);
                self.restore_desired_column();
                vertical = true;
            }
            Key::Arrow(arrow) => self.move_cursor(arrow),
            Key::Page(page) => {
                self.cursor.y = match page {
                    PageKey::Up => self.cursor.roff,
                    PageKey::Down =>
                        (self.cursor.roff + self.screen_rows.saturating_sub(1)).min(self.row_store.len()),
                };
                let arrow = match page {
                    PageKey::Up => AKey::Up,
                    PageKey::Down => AKey::Down,
                };
                for _ in 0..self.screen_rows {
                    self.move_cursor(&arrow);
                }
                self.restore_desired_column();
                vertical = true;
            }
            Key::Home => self.cursor.x = 0,
            Key::End => self.cursor.x = self.current_row().map_or(0, |row| row.chars.len()),
            Key::Char(b'\r' | b'\n') => self.insert_newline(),
            Key::Char(BACKSPACE | DELETE_BIS) => self.delete_char(),
            Key::Delete => {
                self.move_cursor(&AKey::Right);
                self.delete_char();
            }
            Key::Escape | Key::Char(REFRESH_SCREEN) | Key::Resize => (),
            Key::Char(EXIT) => {
                if self.dirty && self.quit_times > 0 {
                    self.quit_times -= 1;
                    let times = if self.quit_times > 1 { "times" } else { "time" };
                    set_status!(self, "Press Ctrl-Q {} more {} to quit.", self.quit_times, times);
                    return (false, None);
                }
                return (true, None);
            }
            Key::Char(SAVE) => match self.file_name.take() {
                Some(file_name) => {
                    self.save_and_handle_io_errors(&file_name);
                    self.file_name = Some(file_name);
                }
                None => prompt_mode = Some(PromptMode::Save(Vec::new())),
            },
            Key::Char(FIND) =>
                prompt_mode =
                    Some(PromptMode::Find(Vec::new(), self.cursor.clone(), SearchState::default())),
            Key::Char(DELETE_ROW) => self.delete_current_row(),
            Key::Char(c) => self.insert_char(*c),
        }
        self.quit_times = self.config.quit_times;
        if !vertical {
            self.cursor.desired_rx = self.rx();
        }
        (false, prompt_mode)
    }

    /// Load `file_name` if given, then run the key-dispatch loop until the user quits.
    ///
    /// # Errors
    ///
    /// Will return `Err` if any I/O or terminal error occurs.
    pub fn run(&mut self, file_name: Option<String>) -> Result<(), Error> {
        if let Some(name) = file_name {
            let path = sys::path(&name);
            self.select_syntax_highlight(&path);
            self.load(&path)?;
            self.file_name = Some(path.to_string_lossy().into_owned());
        }
        loop {
            if let Some(mode) = self.prompt_mode.as_ref() {
                let msg = mode.status_msg();
                set_status!(self, "{}", msg);
            }
            self.refresh_screen()?;
            let key = self.loop_until_keypress()?;
            self.prompt_mode = match self.prompt_mode.take() {
                None => match self.process_keypress(&key) {
                    (true, _) => return Ok(()),
                    (false, prompt_mode) => prompt_mode,
                },
                Some(prompt_mode) => prompt_mode.process_keypress(self, &key),
            };
        }
    }
}

impl Drop for Editor {
    /// Restore the original terminal mode and clear the screen.
    fn drop(&mut self) {
        if let Some(orig_term_mode) = self.orig_term_mode.take() {
            sys::set_term_mode(&orig_term_mode).expect("restore original terminal mode");
        }
        if !std::thread::panicking() {
            print!("{CLEAR_SCREEN}{MOVE_CURSOR_TO_START}");
            io::stdout().flush().expect("flush stdout");
        }
    }
}

/// Cross-invocation state carried by an active incremental search.
#[derive(Default)]
struct SearchState {
    start_match_rx: usize,
    start_match_row: usize,
    /// `1` to search forward, `-1` to search backward.
    direction: isize,
    /// The row and original `hl` bytes overlaid by the last match, if any.
    saved_hl: Option<(usize, Vec<HlType>)>,
}

impl SearchState {
    fn new() -> Self { Self { direction: 1, ..Self::default() } }
}

/// Undo the last match's MATCH overlay, update search direction/position from `key`, then scan for
/// the next match starting from `(start_match_row, start_match_rx)`.
fn find_callback(ed: &mut Editor, query: &[u8], key: &Key, state: &mut SearchState) {
    if matches!(key, Key::Resize) {
        return;
    }
    if let Some((row, bytes)) = state.saved_hl.take() {
        if let Some(r) = ed.row_store.get_mut(row) {
            r.hl = bytes;
        }
    }
    match key {
        Key::Arrow(AKey::Right | AKey::Down) => state.direction = 1,
        Key::Arrow(AKey::Left | AKey::Up) => state.direction = -1,
        Key::Char(c) if c.is_ascii_control() => {
            *state = SearchState::new();
            return;
        }
        Key::Home | Key::End | Key::Delete | Key::Page(_) | Key::Escape => {
            *state = SearchState::new();
            return;
        }
        Key::Char(_) => {
            state.start_match_rx = 0;
            state.start_match_row = 0;
            state.direction = 1;
        }
    }

    let num_rows = ed.row_store.len();
    if num_rows == 0 || query.is_empty() {
        return;
    }
    let mut current_row = state.start_match_row;
    let mut current_rx = state.start_match_rx;
    for _ in 0..num_rows {
        if let Some(row) = ed.row_store.get(current_row) {
            let from = current_rx.min(row.render.len());
            if let Some(offset) = slice_find(&row.render[from..], query) {
                let match_rx = from + offset;
                let cx = row_rx_to_cx(row, match_rx, ed.config.tab_stop);
                ed.cursor.y = current_row;
                ed.cursor.x = cx;
                ed.cursor.coff = 0;
                ed.cursor.roff = num_rows;
                let saved = row.hl.clone();
                let end = (match_rx + query.len()).min(row.hl.len());
                if let Some(r) = ed.row_store.get_mut(current_row) {
                    r.hl[match_rx..end].fill(HlType::Match);
                }
                state.saved_hl = Some((current_row, saved));
                state.start_match_rx = match_rx + query.len();
                state.start_match_row = current_row;
                return;
            }
        }
        current_row = if state.direction == 1 {
            (current_row + 1) % num_rows
        } else {
            (current_row + num_rows - 1) % num_rows
        };
        current_rx = 0;
    }
}

/// The active prompt: a mini line-editor for a filename (Save) or a search query (Find).
enum PromptMode {
    /// `Save(buffer)`.
    Save(Vec<u8>),
    /// `Find(buffer, cursor state to restore on cancel, cross-invocation search state)`.
    Find(Vec<u8>, CursorState, SearchState),
}

impl PromptMode {
    fn status_msg(&self) -> String {
        match self {
            Self::Save(b) => format!("Save as: {}", String::from_utf8_lossy(b)),
            Self::Find(b, ..) => format!("Search (Use ESC/Arrows/Enter): {}", String::from_utf8_lossy(b)),
        }
    }

    /// Process one keypress while this prompt is active.
    fn process_keypress(self, ed: &mut Editor, key: &Key) -> Option<Self> {
        ed.status_msg = None;
        match self {
            Self::Save(b) => match process_prompt_keypress(b, key) {
                PromptState::Active(b) => return Some(Self::Save(b)),
                PromptState::Cancelled => set_status!(ed, "Save aborted"),
                PromptState::Completed(bytes) => ed.save_as(String::from_utf8_lossy(&bytes).into_owned()),
            },
            Self::Find(b, saved_cursor, mut state) => match process_prompt_keypress(b, key) {
                PromptState::Active(q) => {
                    find_callback(ed, &q, key, &mut state);
                    return Some(Self::Find(q, saved_cursor, state));
                }
                PromptState::Completed(q) => find_callback(ed, &q, key, &mut state),
                PromptState::Cancelled => {
                    find_callback(ed, &[], key, &mut state);
                    ed.cursor = saved_cursor;
                }
            },
        }
        None
    }
}

/// The state of the prompt buffer after processing one keypress.
enum PromptState {
    Active(Vec<u8>),
    Completed(Vec<u8>),
    Cancelled,
}

/// Process one prompt keypress against `buffer`.
fn process_prompt_keypress(mut buffer: Vec<u8>, key: &Key) -> PromptState {
    match key {
        Key::Char(b'\r') if !buffer.is_empty() => return PromptState::Completed(buffer),
        Key::Char(b'\r') => (),
        Key::Escape | Key::Char(CANCEL) => return PromptState::Cancelled,
        Key::Char(BACKSPACE | DELETE_BIS) => {
            buffer.pop();
        }
        Key::Char(c) if !c.is_ascii_control() => buffer.push(*c),
        _ => (),
    }
    PromptState::Active(buffer)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn new_for_test() -> Editor {
        Editor {
            prompt_mode: None,
            cursor: CursorState::default(),
            screen_rows: 24,
            screen_cols: 80,
            row_store: RowStore::new(),
            dirty: false,
            config: Config {
                tab_stop: 8,
                quit_times: 3,
                message_duration: Duration::from_secs(5),
                conf_dirs: Vec::new(),
            },
            quit_times: 3,
            file_name: None,
            status_msg: None,
            syntax: SyntaxConf::default(),
            n_bytes: 0,
            orig_term_mode: None,
        }
    }

    #[test]
    fn format_size_output() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1023), "1023B");
        assert_eq!(format_size(1024), "1.00kB");
        assert_eq!(format_size(1536), "1.50kB");
        assert_eq!(format_size(1024 * 1024), "1.00MB");
    }

    #[test]
    fn insert_char_creates_row_past_end_of_file() {
        let mut ed = new_for_test();
        ed.insert_char(b'X');
        ed.insert_char(b'Y');
        assert_eq!(ed.row_store.len(), 1);
        assert_eq!(ed.row_store.get(0).unwrap().chars, b"XY");
        assert_eq!(ed.cursor.x, 2);
        assert_eq!(ed.n_bytes, 2);
        assert!(ed.dirty);
    }

    #[test]
    fn insert_newline_replicates_leading_indentation() {
        let mut ed = new_for_test();
        for b in b"  abc" {
            ed.insert_char(*b);
        }
        ed.cursor.x = 3; // just after the two leading spaces
        ed.insert_newline();
        assert_eq!(ed.cursor.y, 1);
        assert_eq!(ed.cursor.x, 2); // n_blank leading spaces replicated
        assert_eq!(ed.row_store.get(0).unwrap().chars, b"  ");
        assert_eq!(ed.row_store.get(1).unwrap().chars, b"  abc");
    }

    #[test]
    fn insert_newline_at_column_zero_inserts_empty_row_above() {
        let mut ed = new_for_test();
        for b in b"abc" {
            ed.insert_char(*b);
        }
        ed.cursor.x = 0;
        ed.insert_newline();
        assert_eq!(ed.row_store.len(), 2);
        assert_eq!(ed.row_store.get(0).unwrap().chars, b"");
        assert_eq!(ed.row_store.get(1).unwrap().chars, b"abc");
        assert_eq!((ed.cursor.x, ed.cursor.y), (0, 1));
    }

    #[test]
    fn delete_char_merges_rows_at_column_zero() {
        let mut ed = new_for_test();
        for b in b"Hello world!" {
            ed.insert_char(*b);
        }
        ed.insert_newline();
        ed.cursor.x = 0;
        ed.delete_char();
        assert_eq!(ed.row_store.len(), 1);
        assert_eq!(ed.row_store.get(0).unwrap().chars, b"Hello world!");
        assert_eq!((ed.cursor.x, ed.cursor.y), (12, 0));
    }

    #[test]
    fn move_cursor_left_wraps_to_previous_row() {
        let mut ed = new_for_test();
        for b in b"ab" {
            ed.insert_char(*b);
        }
        ed.insert_newline();
        for b in b"cd" {
            ed.insert_char(*b);
        }
        ed.cursor.x = 0;
        ed.move_cursor(&AKey::Left);
        assert_eq!((ed.cursor.x, ed.cursor.y), (2, 0));
    }

    #[test]
    fn desired_column_sticks_across_vertical_motion() {
        let mut ed = new_for_test();
        // Row 0: 20 chars. Row 1: 10 chars. Row 2: 30 chars.
        ed.row_store.insert_row(0, vec![b'a'; 20], &ed.syntax, ed.config.tab_stop);
        ed.row_store.insert_row(1, vec![b'b'; 10], &ed.syntax, ed.config.tab_stop);
        ed.row_store.insert_row(2, vec![b'c'; 30], &ed.syntax, ed.config.tab_stop);
        ed.cursor.x = 4;
        ed.cursor.desired_rx = 4;

        let (_, mode) = ed.process_keypress(&Key::Arrow(AKey::Down));
        assert!(mode.is_none());
        assert_eq!(ed.cursor.y, 1);
        assert_eq!(ed.cursor.x, 10); // clamped to the 10-char row
        assert_eq!(ed.cursor.desired_rx, 4); // still remembered

        ed.process_keypress(&Key::Arrow(AKey::Down));
        assert_eq!(ed.cursor.y, 2);
        assert_eq!(ed.cursor.x, 4); // restored on a long-enough row
    }

    #[test]
    fn quit_with_dirty_buffer_requires_repeated_ctrl_q() {
        let mut ed = new_for_test();
        ed.insert_char(b'x');
        assert!(ed.dirty);

        let (quit, _) = ed.process_keypress(&Key::Char(EXIT));
        assert!(!quit);
        assert_eq!(ed.quit_times, 2);

        // Any other key resets the counter.
        ed.process_keypress(&Key::Arrow(AKey::Left));
        assert_eq!(ed.quit_times, 3);

        ed.process_keypress(&Key::Char(EXIT));
        ed.process_keypress(&Key::Char(EXIT));
        let (quit, _) = ed.process_keypress(&Key::Char(EXIT));
        assert!(quit);
    }

    #[test]
    fn search_finds_match_and_overlays_then_restores_on_cancel() {
        let mut ed = new_for_test();
        ed.row_store.insert_row(0, b"hello world".to_vec(), &ed.syntax, ed.config.tab_stop);
        let original_hl = ed.row_store.get(0).unwrap().hl.clone();
        let mut state = SearchState::new();

        find_callback(&mut ed, b"world", &Key::Char(b'd'), &mut state);
        assert_eq!(ed.cursor.x, 6);
        assert_eq!(ed.row_store.get(0).unwrap().hl[6], HlType::Match);

        // Cancelling restores the original highlight bytes exactly.
        find_callback(&mut ed, b"", &Key::Escape, &mut state);
        assert_eq!(ed.row_store.get(0).unwrap().hl, original_hl);
    }

    #[test]
    fn save_writes_one_line_per_row_and_clears_dirty() {
        let mut ed = new_for_test();
        for b in b"abc" {
            ed.insert_char(*b);
        }
        ed.insert_newline();
        for b in b"de" {
            ed.insert_char(*b);
        }
        assert!(ed.dirty);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x");
        let file_name = path.to_str().unwrap().to_string();

        assert!(ed.save_and_handle_io_errors(&file_name));
        assert!(!ed.dirty);
        assert_eq!(std::fs::read(&path).unwrap(), b"abc\nde\n");
    }

    #[test]
    fn save_then_load_round_trip_is_byte_equal() {
        let mut ed = new_for_test();
        for b in b"first line" {
            ed.insert_char(*b);
        }
        ed.insert_newline();
        for b in b"  second, indented" {
            ed.insert_char(*b);
        }

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        let file_name = path.to_str().unwrap().to_string();
        assert!(ed.save_and_handle_io_errors(&file_name));

        let mut reloaded = new_for_test();
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.row_store.len(), 2);
        assert_eq!(reloaded.row_store.get(0).unwrap().chars, b"first line");
        assert_eq!(reloaded.row_store.get(1).unwrap().chars, b"  second, indented");

        // Saving the reloaded buffer reproduces exactly the same bytes on disk.
        let path2 = dir.path().join("doc2.txt");
        let file_name2 = path2.to_str().unwrap().to_string();
        assert!(reloaded.save_and_handle_io_errors(&file_name2));
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(&path2).unwrap());
    }

    #[test]
    fn loading_missing_file_starts_an_empty_buffer_not_an_error() {
        let mut ed = new_for_test();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("does-not-exist.txt");
        ed.load(&path).unwrap();
        assert_eq!(ed.row_store.len(), 1);
        assert_eq!(ed.row_store.get(0).unwrap().chars, b"");
    }
}
