//! Bounded log-tail truncation
//!
//! Build failures are reported with the tail of the failed container's log.
//! The tail is bounded both by a line count and by a character budget so a
//! runaway log cannot blow up the error message.

/// Return the trailing suffix of `text` containing at most `max_lines`
/// non-empty lines, scanning at most `max_chars` characters from the end.
///
/// The scan runs backward from the end of the text. Carriage returns are
/// skipped entirely, and a run of trailing empty lines does not count toward
/// `max_lines`; counting starts at the first non-empty line. When the scan
/// reaches the start of the text within budget and the first line is
/// non-empty, the whole text is returned.
pub fn truncate_tail(text: &str, max_lines: usize, max_chars: usize) -> &str {
    let mut remaining = max_chars;
    let mut line_count = 0;
    let mut last_line_empty = true;
    let mut last_line_start = text.len();
    let mut scanned_to = text.len();

    for (index, c) in text.char_indices().rev() {
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        scanned_to = index;

        if c == '\n' {
            if !last_line_empty {
                last_line_empty = true;
                last_line_start = index + 1;
                line_count += 1;
                if line_count >= max_lines {
                    break;
                }
            }
        } else if c != '\r' {
            last_line_empty = false;
        }
    }

    if scanned_to == 0 && !last_line_empty {
        return text;
    }

    &text[last_line_start..]
}
