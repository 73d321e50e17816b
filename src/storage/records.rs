//! Pipe-delimited record reader shared by the registries.

/// Comment marker for whole lines.
pub const COMMENT_PREFIX: char = '#';

/// Field delimiter.
pub const DELIMITER: char = '|';

/// One non-empty, non-comment line split into trimmed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// 1-based line number in the source file.
    pub line: usize,
    pub fields: Vec<&'a str>,
}

impl<'a> Record<'a> {
    /// Field `index`, empty when the line is shorter.
    pub fn field(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or("")
    }

    /// Field `index` as `Some` only when present and non-empty.
    pub fn optional(&self, index: usize) -> Option<&'a str> {
        Some(self.field(index)).filter(|f| !f.is_empty())
    }
}

/// Iterate the records of `content`, splitting each line into at most
/// `max_fields` fields (extra delimiters stay in the last field).
pub fn records(content: &str, max_fields: usize) -> impl Iterator<Item = Record<'_>> {
    content.lines().enumerate().filter_map(move |(idx, raw)| {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            return None;
        }
        Some(Record {
            line: idx + 1,
            fields: line.splitn(max_fields, DELIMITER).map(str::trim).collect(),
        })
    })
}

/// Decode `\uXXXX` and `\UXXXXXXXX` escapes, returning the input unchanged
/// if any escape is malformed.
pub fn decode_unicode_escapes(text: &str) -> String {
    if !text.contains("\\u") && !text.contains("\\U") {
        return text.to_string();
    }

    match try_decode(text) {
        Some(decoded) => decoded,
        None => {
            tracing::warn!(text = %text, "Failed to decode unicode escapes, keeping raw text");
            text.to_string()
        }
    }
}

fn try_decode(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut pending_high: Option<u32> = None;

    while let Some(c) = chars.next() {
        if c != '\\' {
            if pending_high.is_some() {
                return None;
            }
            out.push(c);
            continue;
        }

        let width = match chars.peek() {
            Some('u') => 4,
            Some('U') => 8,
            _ => {
                if pending_high.is_some() {
                    return None;
                }
                out.push(c);
                continue;
            }
        };
        chars.next();

        let digits: String = chars.by_ref().take(width).collect();
        if digits.len() != width {
            return None;
        }
        let code = u32::from_str_radix(&digits, 16).ok()?;

        match (pending_high.take(), code) {
            (None, 0xD800..=0xDBFF) => pending_high = Some(code),
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                out.push(char::from_u32(combined)?);
            }
            (Some(_), _) => return None,
            (None, _) => out.push(char::from_u32(code)?),
        }
    }

    if pending_high.is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_skip_blank_and_comments() {
        let content = "# header\n\n  a | b |c\n   # indented comment\nd|e\n";
        let recs: Vec<_> = records(content, 5).collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].line, 3);
        assert_eq!(recs[0].fields, vec!["a", "b", "c"]);
        assert_eq!(recs[1].field(1), "e");
        assert_eq!(recs[1].field(7), "");
        assert_eq!(recs[1].optional(2), None);
    }

    #[test]
    fn test_records_max_fields_keeps_tail() {
        let recs: Vec<_> = records("a|b|c|d", 3).collect();
        assert_eq!(recs[0].fields, vec!["a", "b", "c|d"]);
    }

    #[test]
    fn test_decode_unicode_escapes() {
        assert_eq!(
            decode_unicode_escapes("\\u0420\\u0443\\u0441\\u0441\\u043a\\u0438\\u0439"),
            "Русский"
        );
        assert_eq!(decode_unicode_escapes("plain"), "plain");
        assert_eq!(decode_unicode_escapes("\\ud83c\\uddf3\\ud83c\\uddf1 NL"), "🇳🇱 NL");
        assert_eq!(decode_unicode_escapes("\\U0001F600"), "😀");
    }

    #[test]
    fn test_decode_malformed_keeps_input() {
        assert_eq!(decode_unicode_escapes("bad \\u12"), "bad \\u12");
        assert_eq!(decode_unicode_escapes("\\uZZZZ"), "\\uZZZZ");
        assert_eq!(decode_unicode_escapes("\\ud83c alone"), "\\ud83c alone");
    }
}
