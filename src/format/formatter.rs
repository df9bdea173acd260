//! Whitespace normalization for JSONC documents.
//!
//! Only whitespace between tokens is rewritten. Comments are kept verbatim;
//! a comment on the same line as the preceding token stays on that line, one
//! that followed a line break gets its own line.

use super::edit::Edit;
use super::scanner::{ScanError, Scanner, SyntaxKind};

#[derive(Debug, Clone, Default)]
pub struct FormattingOptions {
    /// Indent with this many spaces; tabs when `None`.
    pub insert_spaces: Option<usize>,
    /// Line terminator; detected from the document when `None`.
    pub eol: Option<String>,
    pub insert_final_newline: bool,
}

/// First line terminator in `text`, or the configured default.
pub fn detect_eol(text: &str, fallback: Option<&str>) -> String {
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\r' => {
                return if bytes.get(i + 1) == Some(&b'\n') {
                    "\r\n".to_string()
                } else {
                    "\r".to_string()
                };
            }
            b'\n' => return "\n".to_string(),
            _ => {}
        }
    }
    fallback.unwrap_or("\n").to_string()
}

struct Formatter<'a> {
    text: &'a str,
    scanner: Scanner<'a>,
    eol: String,
    indent_value: String,
    indent_level: usize,
    line_breaks: usize,
    has_error: bool,
    edits: Vec<Edit>,
}

impl<'a> Formatter<'a> {
    fn scan_next(&mut self) -> SyntaxKind {
        let mut token = self.scanner.scan();
        self.line_breaks = 0;
        while matches!(token, SyntaxKind::Trivia | SyntaxKind::LineBreak) {
            if token == SyntaxKind::LineBreak {
                self.line_breaks = 1;
            }
            token = self.scanner.scan();
        }
        self.has_error =
            token == SyntaxKind::Unknown || self.scanner.token_error() != ScanError::None;
        token
    }

    fn new_line_and_indent(&self) -> String {
        let mut out = self.eol.clone();
        for _ in 0..self.indent_level {
            out.push_str(&self.indent_value);
        }
        out
    }

    fn add_edit(&mut self, content: String, start: usize, end: usize) {
        if !self.has_error && self.text[start..end] != content {
            self.edits.push(Edit {
                offset: start,
                length: end - start,
                content,
            });
        }
    }
}

/// Compute the edits that normalize whitespace across the whole document.
///
/// Formatting stops producing edits past a token the scanner cannot make
/// sense of, so malformed regions are left untouched.
pub fn format(text: &str, options: &FormattingOptions) -> Vec<Edit> {
    let indent_value = match options.insert_spaces {
        Some(n) => " ".repeat(n),
        None => "\t".to_string(),
    };
    let mut f = Formatter {
        text,
        scanner: Scanner::new(text, false),
        eol: detect_eol(text, options.eol.as_deref()),
        indent_value,
        indent_level: 0,
        line_breaks: 0,
        has_error: false,
        edits: Vec::new(),
    };

    let mut first = f.scan_next();
    if first != SyntaxKind::Eof {
        let first_start = f.scanner.token_offset();
        f.add_edit(String::new(), 0, first_start);
    }

    while first != SyntaxKind::Eof {
        let mut first_end = f.scanner.token_end();
        let mut second = f.scan_next();
        let mut replace = String::new();
        let mut needs_line_break = false;

        while f.line_breaks == 0 && second.is_comment() {
            let comment_start = f.scanner.token_offset();
            f.add_edit(" ".to_string(), first_end, comment_start);
            first_end = f.scanner.token_end();
            needs_line_break = second == SyntaxKind::LineComment;
            replace = if needs_line_break {
                f.new_line_and_indent()
            } else {
                String::new()
            };
            second = f.scan_next();
        }

        if second == SyntaxKind::CloseBrace || second == SyntaxKind::CloseBracket {
            let opener = if second == SyntaxKind::CloseBrace {
                SyntaxKind::OpenBrace
            } else {
                SyntaxKind::OpenBracket
            };
            if first != opener {
                f.indent_level = f.indent_level.saturating_sub(1);
                replace = f.new_line_and_indent();
            }
        } else {
            match first {
                SyntaxKind::OpenBrace | SyntaxKind::OpenBracket => {
                    f.indent_level += 1;
                    replace = f.new_line_and_indent();
                }
                SyntaxKind::Comma | SyntaxKind::LineComment => {
                    replace = f.new_line_and_indent();
                }
                SyntaxKind::BlockComment => {
                    if f.line_breaks > 0 {
                        replace = f.new_line_and_indent();
                    } else if !needs_line_break {
                        replace = " ".to_string();
                    }
                }
                SyntaxKind::Colon => {
                    if !needs_line_break {
                        replace = " ".to_string();
                    }
                }
                SyntaxKind::String => {
                    if second == SyntaxKind::Colon && !needs_line_break {
                        replace = String::new();
                    }
                }
                SyntaxKind::Null
                | SyntaxKind::True
                | SyntaxKind::False
                | SyntaxKind::Number
                | SyntaxKind::CloseBrace
                | SyntaxKind::CloseBracket => {
                    if second.is_comment() && !needs_line_break {
                        replace = " ".to_string();
                    } else if second != SyntaxKind::Comma && second != SyntaxKind::Eof {
                        f.has_error = true;
                    }
                }
                SyntaxKind::Unknown => f.has_error = true,
                _ => {}
            }
            if f.line_breaks > 0 && second.is_comment() {
                replace = f.new_line_and_indent();
            }
        }

        if second == SyntaxKind::Eof {
            replace = if options.insert_final_newline {
                f.eol.clone()
            } else {
                String::new()
            };
        }

        let second_start = f.scanner.token_offset();
        f.add_edit(replace, first_end, second_start);
        first = second;
    }

    f.edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::edit::apply_edits;

    fn fmt(text: &str) -> String {
        apply_edits(text, &format(text, &FormattingOptions::default())).unwrap()
    }

    #[test]
    fn test_compact_object_is_expanded_with_tabs() {
        assert_eq!(
            fmt(r#"{"a":1,"b":[true,{"c":null}],"d":{}}"#),
            "{\n\t\"a\": 1,\n\t\"b\": [\n\t\ttrue,\n\t\t{\n\t\t\t\"c\": null\n\t\t}\n\t],\n\t\"d\": {}\n}"
        );
    }

    #[test]
    fn test_leading_and_trailing_whitespace_removed() {
        assert_eq!(fmt("\n\t\t{ }\n\t\t"), "{}");
    }

    #[test]
    fn test_comments_keep_their_line() {
        let text = "{\n  // one\n  \"a\": 1, // trailing\n  /* block */ \"b\": 2\n}";
        assert_eq!(
            fmt(text),
            "{\n\t// one\n\t\"a\": 1, // trailing\n\t/* block */ \"b\": 2\n}"
        );
    }

    #[test]
    fn test_comment_after_line_break_moves_to_own_line() {
        let text = "{\"a\": 1\n// after\n}";
        assert_eq!(fmt(text), "{\n\t\"a\": 1\n\t// after\n}");
    }

    #[test]
    fn test_trailing_comma_is_kept() {
        assert_eq!(fmt("{\"a\": null,}"), "{\n\t\"a\": null,\n}");
    }

    #[test]
    fn test_crlf_documents_keep_crlf() {
        assert_eq!(fmt("{\r\n\"a\":1}"), "{\r\n\t\"a\": 1\r\n}");
    }

    #[test]
    fn test_spaces_and_final_newline() {
        let options = FormattingOptions {
            insert_spaces: Some(2),
            eol: None,
            insert_final_newline: true,
        };
        let text = "[1,2]";
        let out = apply_edits(text, &format(text, &options)).unwrap();
        assert_eq!(out, "[\n  1,\n  2\n]\n");
    }

    #[test]
    fn test_detect_eol() {
        assert_eq!(detect_eol("a\r\nb", None), "\r\n");
        assert_eq!(detect_eol("a\rb", None), "\r");
        assert_eq!(detect_eol("ab", Some("\r\n")), "\r\n");
        assert_eq!(detect_eol("ab", None), "\n");
    }
}
