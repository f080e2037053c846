//! String helpers shared by the pattern compiler and the match engine.
//!
//! All positions are byte offsets into the input and always land on `char` boundaries.

/// Separator between a word stem and its singular/plural suffixes, and between a
/// parse mark and its branch.
pub const MARK_SEPARATOR: char = '¦';

/// Returns the byte index of the `close` character matching the `open` character at
/// byte `open_at`, honouring nesting of the same pair and skipping escaped characters.
pub fn find_closing(text: &str, open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = text.get(open_at..)?.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(open_at + offset);
            }
        }
    }
    None
}

/// Splits `text` on `|` characters that are neither escaped nor nested inside
/// `()`, `[]` or `<>`. Each part is returned with its byte offset in `text`.
/// Escape sequences are kept verbatim in the parts.
pub fn split_vertical_bars(text: &str) -> Vec<(usize, &str)> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth -= 1,
            '|' if depth == 0 => {
                parts.push((start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push((start, &text[start..]));
    parts
}

/// Advances `index` past any whitespace.
pub fn skip_whitespace(text: &str, index: usize) -> usize {
    match text.get(index..) {
        Some(rest) => index + (rest.len() - rest.trim_start().len()),
        None => text.len(),
    }
}

/// If `needle` occurs case-insensitively at byte `at` of `text`, returns the byte index
/// just past the occurrence.
pub fn starts_with_ignore_case(text: &str, at: usize, needle: &str) -> Option<usize> {
    let mut haystack = text.get(at..)?.char_indices();
    let mut end = at;
    for expected in needle.chars() {
        let (offset, actual) = haystack.next()?;
        if actual != expected && !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        end = at + offset + actual.len_utf8();
    }
    Some(end)
}

/// Finds the first case-insensitive occurrence of `needle` at or after byte `from`.
pub fn find_ignore_case(text: &str, from: usize, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return text.get(from..).map(|_| from);
    }
    text.get(from..)?
        .char_indices()
        .map(|(offset, _)| from + offset)
        .find(|&i| starts_with_ignore_case(text, i, needle).is_some())
}

/// Removes one pair of parentheses wrapping the whole of `text`, if the opening
/// parenthesis is matched by the last character.
pub fn strip_enclosing_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || !text.ends_with(')') {
        return None;
    }
    let close = find_closing(text, 0, '(', ')')?;
    (close == text.len() - 1).then(|| &text[1..close])
}

/// Singular and plural spelling of a type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralForms {
    pub singular: String,
    pub plural: String,
}

impl PluralForms {
    /// Parses a plural form declaration.
    ///
    /// Each whitespace-separated word is either plain (`object`, both forms equal),
    /// `stem¦suffix` (`dog¦s` gives `dog`/`dogs`), or `stem¦singular¦plural`
    /// (`part¦y¦ies` gives `party`/`parties`). Returns `None` when a word carries more
    /// than two separators.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut singular = Vec::new();
        let mut plural = Vec::new();
        for word in spec.split_whitespace() {
            let pieces: Vec<&str> = word.split(MARK_SEPARATOR).collect();
            match pieces.as_slice() {
                [plain] => {
                    singular.push(plain.to_string());
                    plural.push(plain.to_string());
                }
                [stem, suffix] => {
                    singular.push(stem.to_string());
                    plural.push(format!("{stem}{suffix}"));
                }
                [stem, one, many] => {
                    singular.push(format!("{stem}{one}"));
                    plural.push(format!("{stem}{many}"));
                }
                _ => return None,
            }
        }
        if singular.is_empty() {
            return None;
        }
        Some(Self {
            singular: singular.join(" "),
            plural: plural.join(" "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_closing_nested() {
        assert_eq!(find_closing("(a(b)c)d", 0, '(', ')'), Some(6));
        assert_eq!(find_closing("(a(b)c)d", 2, '(', ')'), Some(4));
        assert_eq!(find_closing("(a(b c", 0, '(', ')'), None);
    }

    #[test]
    fn test_find_closing_skips_escapes() {
        assert_eq!(find_closing(r"[a\]b]", 0, '[', ']'), Some(5));
    }

    #[test]
    fn test_split_vertical_bars() {
        let parts: Vec<&str> = split_vertical_bars("a|(b|c)|[d|e]|<f|g>")
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(parts, vec!["a", "(b|c)", "[d|e]", "<f|g>"]);
    }

    #[test]
    fn test_split_vertical_bars_offsets_and_escapes() {
        let parts = split_vertical_bars(r"x\|y|zz");
        assert_eq!(parts, vec![(0, r"x\|y"), (5, "zz")]);
    }

    #[test]
    fn test_case_insensitive_search() {
        assert_eq!(starts_with_ignore_case("Hello World", 6, "world"), Some(11));
        assert_eq!(starts_with_ignore_case("Hello", 0, "help"), None);
        assert_eq!(find_ignore_case("one TWO two", 0, "two"), Some(4));
        assert_eq!(find_ignore_case("one TWO two", 5, "two"), Some(8));
        assert_eq!(find_ignore_case("ÄÖ x", 0, "x"), Some(5));
    }

    #[test]
    fn test_skip_whitespace() {
        assert_eq!(skip_whitespace("a   b", 1), 4);
        assert_eq!(skip_whitespace("a", 1), 1);
    }

    #[test]
    fn test_strip_enclosing_parens() {
        assert_eq!(strip_enclosing_parens("(1 + 2)"), Some("1 + 2"));
        assert_eq!(strip_enclosing_parens("(1) + (2)"), None);
        assert_eq!(strip_enclosing_parens("1 + 2"), None);
    }

    #[test]
    fn test_plural_forms() {
        let dog = PluralForms::parse("dog¦s").unwrap();
        assert_eq!(dog.singular, "dog");
        assert_eq!(dog.plural, "dogs");

        let party = PluralForms::parse("part¦y¦ies").unwrap();
        assert_eq!(party.singular, "party");
        assert_eq!(party.plural, "parties");

        let object = PluralForms::parse("object").unwrap();
        assert_eq!(object.singular, object.plural);

        let multi = PluralForms::parse("item¦ type¦s").unwrap();
        assert_eq!(multi.singular, "item type");
        assert_eq!(multi.plural, "item types");

        assert!(PluralForms::parse("a¦b¦c¦d").is_none());
        assert!(PluralForms::parse("   ").is_none());
    }
}
