/// Render a character as a single quoted notation literal.
pub fn escape_char(ch: char) -> String {
    match ch {
        '\\' => String::from("'\\\\'"),
        '\t' => String::from("'\\t'"),
        '\n' => String::from("'\\n'"),
        '\r' => String::from("'\\r'"),
        '\'' => String::from("'\\''"),
        ch => format!("'{}'", ch),
    }
}

pub fn escape_string(str: &str) -> String {
    let mut res = String::new();

    for ch in str.chars() {
        match ch {
            '\\' => res.push_str("\\\\"),
            '\t' => res.push_str("\\t"),
            '\n' => res.push_str("\\n"),
            '\r' => res.push_str("\\r"),
            '"' => res.push_str("\\\""),
            ch => res.push(ch),
        }
    }

    res
}

/// Escape a regular expression source so it can sit between `re#` and `#`.
pub fn escape_regex(src: &str) -> String {
    let mut res = String::new();
    let mut chars = src.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                res.push('\\');
                if let Some(next) = chars.next() {
                    res.push(next);
                }
            }
            '#' => res.push_str("\\#"),
            ch => res.push(ch),
        }
    }

    res
}

/// One-based line and column (in characters) of a byte offset.
pub fn line_column(input: &str, pos: usize) -> (usize, usize) {
    let pos = pos.min(input.len());
    let mut line_no = 1;
    let mut line_start = 0;

    for (index, ch) in input.char_indices() {
        if index >= pos {
            break;
        }

        if ch == '\n' {
            line_no += 1;
            line_start = index + 1;
        }
    }

    let col_no = input[line_start..pos].chars().count() + 1;

    (line_no, col_no)
}

/// Shorten `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }

    let mut res: String = s.chars().take(max.saturating_sub(3)).collect();
    res.push_str("...");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one() {
        let input = "ab\ncd\n\nµx";

        assert_eq!(line_column(input, 0), (1, 1));
        assert_eq!(line_column(input, 2), (1, 3));
        assert_eq!(line_column(input, 3), (2, 1));
        assert_eq!(line_column(input, 7), (4, 1));
        // µ is two bytes but one column
        assert_eq!(line_column(input, 9), (4, 2));
        assert_eq!(line_column(input, 100), (4, 3));
    }

    #[test]
    fn escapes() {
        assert_eq!(escape_char('\''), "'\\''");
        assert_eq!(escape_char('-'), "'-'");
        assert_eq!(escape_string("a\"b\n"), "a\\\"b\\n");
        assert_eq!(escape_regex(r"\d#\#"), r"\d\#\#");
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
