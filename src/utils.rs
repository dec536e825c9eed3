use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static CELL_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_x([0-9A-Fa-f]{4})_").expect("escape pattern valid"));

pub fn column_number_to_name(column: u32) -> String {
    let mut column = column;
    let mut name = String::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    name
}

pub fn cell_address(column: u32, row: u32) -> String {
    format!("{}{}", column_number_to_name(column), row)
}

/// Decode the `_xHHHH_` escapes spreadsheets use for control characters.
pub fn unescape_cell_text(raw: &str) -> Cow<'_, str> {
    CELL_ESCAPE.replace_all(raw, |caps: &Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_and_addresses() {
        assert_eq!(column_number_to_name(1), "A");
        assert_eq!(column_number_to_name(26), "Z");
        assert_eq!(column_number_to_name(27), "AA");
        assert_eq!(cell_address(28, 42), "AB42");
    }

    #[test]
    fn unescapes_control_characters() {
        assert_eq!(unescape_cell_text("line_x000D_break"), "line\rbreak");
        assert_eq!(unescape_cell_text("tab_x0009_"), "tab\t");
        assert_eq!(unescape_cell_text("plain"), "plain");
        assert!(matches!(unescape_cell_text("plain"), Cow::Borrowed(_)));
        assert_eq!(unescape_cell_text("_xD800_"), "_xD800_");
    }
}
