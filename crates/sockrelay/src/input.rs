//! Keyboard line source for interactive clients.

use std::io::{BufRead, BufReader, Stdin};

use tracing::debug;

/// Longest request a typed line may produce, in bytes.
pub const MAX_LINE_BYTES: usize = 99;

/// Clean up one raw input line.
///
/// Returns `None` for lines that should be skipped: empty ones and ones
/// starting with a space. Tabs become spaces and the line is cut to
/// [`MAX_LINE_BYTES`] on a character boundary.
pub fn sanitize_line(raw: &str) -> Option<String> {
    let line = raw.trim_end_matches(['\n', '\r']);
    if line.is_empty() || line.starts_with(' ') {
        return None;
    }

    let mut line = line.replace('\t', " ");
    if line.len() > MAX_LINE_BYTES {
        let mut cut = MAX_LINE_BYTES;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
    }
    Some(line)
}

/// Sanitized lines from a buffered reader; ends at EOF or a read error.
pub struct InputLines<R> {
    reader: R,
    buf: String,
}

impl<R: BufRead> InputLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
        }
    }
}

impl InputLines<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead> Iterator for InputLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    if let Some(line) = sanitize_line(&self.buf) {
                        return Some(line);
                    }
                    debug!("input line omitted");
                }
                Err(err) => {
                    debug!(error = %err, "input read failed; treating as end of input");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn omits_empty_and_space_led_lines() {
        assert_eq!(sanitize_line("\n"), None);
        assert_eq!(sanitize_line(""), None);
        assert_eq!(sanitize_line(" -n 5\n"), None);
    }

    #[test]
    fn strips_newline_and_replaces_tabs() {
        assert_eq!(sanitize_line("-n\t5\r\n").as_deref(), Some("-n 5"));
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_line(&long).map(|line| line.len()), Some(MAX_LINE_BYTES));

        let wide = format!("{}é", "a".repeat(MAX_LINE_BYTES - 1));
        let line = sanitize_line(&wide).expect("line should be kept");
        assert_eq!(line.len(), MAX_LINE_BYTES - 1);
    }

    #[test]
    fn iterator_skips_omitted_lines_and_ends_at_eof() {
        let input = Cursor::new("freeram\n\n  skipped\nloads\n");
        let lines: Vec<String> = InputLines::new(input).collect();
        assert_eq!(lines, vec!["freeram", "loads"]);
    }
}
