//! Tokenizer for JSON with comments.
//!
//! Produces every token including trivia (whitespace, line breaks and
//! comments), so callers can reason about exact byte offsets of the
//! source text. Offsets and lengths are in bytes.

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Colon,
    Null,
    True,
    False,
    String,
    Number,
    LineComment,
    BlockComment,
    LineBreak,
    Trivia,
    Unknown,
    Eof,
}

impl SyntaxKind {
    pub fn is_comment(self) -> bool {
        matches!(self, SyntaxKind::LineComment | SyntaxKind::BlockComment)
    }
}

/// Error attached to the most recently scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    None,
    UnexpectedEndOfComment,
    UnexpectedEndOfString,
    UnexpectedEndOfNumber,
    InvalidUnicode,
    InvalidEscapeCharacter,
    InvalidCharacter,
}

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    token: SyntaxKind,
    token_offset: usize,
    value: String,
    error: ScanError,
    ignore_trivia: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner. With `ignore_trivia`, whitespace and line breaks are
    /// skipped; comments are always reported.
    pub fn new(text: &'a str, ignore_trivia: bool) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            token: SyntaxKind::Unknown,
            token_offset: 0,
            value: String::new(),
            error: ScanError::None,
            ignore_trivia,
        }
    }

    pub fn token(&self) -> SyntaxKind {
        self.token
    }

    pub fn token_offset(&self) -> usize {
        self.token_offset
    }

    pub fn token_len(&self) -> usize {
        self.pos - self.token_offset
    }

    pub fn token_end(&self) -> usize {
        self.pos
    }

    /// Decoded value of the last token (unescaped for strings).
    pub fn token_value(&self) -> &str {
        &self.value
    }

    pub fn token_error(&self) -> ScanError {
        self.error
    }

    /// Scan the next token.
    pub fn scan(&mut self) -> SyntaxKind {
        loop {
            let token = self.scan_next();
            if self.ignore_trivia && matches!(token, SyntaxKind::Trivia | SyntaxKind::LineBreak) {
                continue;
            }
            return token;
        }
    }

    fn scan_next(&mut self) -> SyntaxKind {
        self.value.clear();
        self.error = ScanError::None;
        self.token_offset = self.pos;

        if self.pos >= self.bytes.len() {
            self.token = SyntaxKind::Eof;
            return self.token;
        }

        let ch = self.current_char();

        if is_white_space(ch) {
            while self.pos < self.bytes.len() && is_white_space(self.current_char()) {
                self.advance_char();
            }
            self.value.push_str(&self.text[self.token_offset..self.pos]);
            self.token = SyntaxKind::Trivia;
            return self.token;
        }

        if ch == '\r' || ch == '\n' {
            self.pos += 1;
            if ch == '\r' && self.peek_byte(0) == Some(b'\n') {
                self.pos += 1;
            }
            self.value.push_str(&self.text[self.token_offset..self.pos]);
            self.token = SyntaxKind::LineBreak;
            return self.token;
        }

        self.token = match ch {
            '{' => self.single(SyntaxKind::OpenBrace),
            '}' => self.single(SyntaxKind::CloseBrace),
            '[' => self.single(SyntaxKind::OpenBracket),
            ']' => self.single(SyntaxKind::CloseBracket),
            ':' => self.single(SyntaxKind::Colon),
            ',' => self.single(SyntaxKind::Comma),
            '"' => {
                self.pos += 1;
                self.scan_string();
                SyntaxKind::String
            }
            '/' => self.scan_slash(),
            '-' => {
                self.pos += 1;
                if self.pos == self.bytes.len() || !self.current_byte().is_ascii_digit() {
                    self.value.push('-');
                    SyntaxKind::Unknown
                } else {
                    self.value.push('-');
                    self.scan_number()
                }
            }
            '0'..='9' => self.scan_number(),
            _ => self.scan_word(),
        };
        self.token
    }

    fn single(&mut self, kind: SyntaxKind) -> SyntaxKind {
        self.pos += 1;
        self.value.push_str(&self.text[self.token_offset..self.pos]);
        kind
    }

    fn scan_slash(&mut self) -> SyntaxKind {
        let start = self.pos;
        match self.peek_byte(1) {
            Some(b'/') => {
                self.pos += 2;
                while self.pos < self.bytes.len() {
                    let b = self.current_byte();
                    if b == b'\r' || b == b'\n' {
                        break;
                    }
                    self.advance_char();
                }
                self.value.push_str(&self.text[start..self.pos]);
                SyntaxKind::LineComment
            }
            Some(b'*') => {
                self.pos += 2;
                let mut closed = false;
                while self.pos < self.bytes.len() {
                    if self.current_byte() == b'*' && self.peek_byte(1) == Some(b'/') {
                        self.pos += 2;
                        closed = true;
                        break;
                    }
                    self.advance_char();
                }
                if !closed {
                    self.error = ScanError::UnexpectedEndOfComment;
                }
                self.value.push_str(&self.text[start..self.pos]);
                SyntaxKind::BlockComment
            }
            _ => {
                self.pos += 1;
                self.value.push('/');
                SyntaxKind::Unknown
            }
        }
    }

    fn scan_number(&mut self) -> SyntaxKind {
        let start = self.pos;
        if self.current_byte() == b'0' {
            self.pos += 1;
        } else {
            self.pos += 1;
            self.skip_digits();
        }
        if self.peek_byte(0) == Some(b'.') {
            self.pos += 1;
            if self.pos < self.bytes.len() && self.current_byte().is_ascii_digit() {
                self.skip_digits();
            } else {
                self.error = ScanError::UnexpectedEndOfNumber;
                self.value.push_str(&self.text[start..self.pos]);
                return SyntaxKind::Number;
            }
        }
        if matches!(self.peek_byte(0), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek_byte(0), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.pos < self.bytes.len() && self.current_byte().is_ascii_digit() {
                self.skip_digits();
            } else {
                self.error = ScanError::UnexpectedEndOfNumber;
            }
        }
        self.value.push_str(&self.text[start..self.pos]);
        SyntaxKind::Number
    }

    fn skip_digits(&mut self) {
        while self.pos < self.bytes.len() && self.current_byte().is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn scan_string(&mut self) {
        loop {
            if self.pos >= self.bytes.len() {
                self.error = ScanError::UnexpectedEndOfString;
                return;
            }
            let ch = self.current_char();
            match ch {
                '"' => {
                    self.pos += 1;
                    return;
                }
                '\\' => {
                    self.pos += 1;
                    if self.pos >= self.bytes.len() {
                        self.error = ScanError::UnexpectedEndOfString;
                        return;
                    }
                    let escaped = self.current_char();
                    self.advance_char();
                    match escaped {
                        '"' => self.value.push('"'),
                        '\\' => self.value.push('\\'),
                        '/' => self.value.push('/'),
                        'b' => self.value.push('\u{8}'),
                        'f' => self.value.push('\u{c}'),
                        'n' => self.value.push('\n'),
                        'r' => self.value.push('\r'),
                        't' => self.value.push('\t'),
                        'u' => self.scan_unicode_escape(),
                        _ => self.error = ScanError::InvalidEscapeCharacter,
                    }
                }
                '\r' | '\n' => {
                    self.error = ScanError::UnexpectedEndOfString;
                    return;
                }
                c if (c as u32) < 0x20 => {
                    self.error = ScanError::InvalidCharacter;
                    self.advance_char();
                }
                c => {
                    self.value.push(c);
                    self.advance_char();
                }
            }
        }
    }

    fn scan_unicode_escape(&mut self) {
        let Some(high) = self.scan_hex4() else {
            self.error = ScanError::InvalidUnicode;
            return;
        };
        if (0xD800..0xDC00).contains(&high)
            && self.peek_byte(0) == Some(b'\\')
            && self.peek_byte(1) == Some(b'u')
        {
            let saved = self.pos;
            self.pos += 2;
            if let Some(low) = self.scan_hex4()
                && (0xDC00..0xE000).contains(&low)
            {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                if let Some(c) = char::from_u32(code) {
                    self.value.push(c);
                    return;
                }
            }
            self.pos = saved;
        }
        match char::from_u32(high) {
            Some(c) => self.value.push(c),
            None => self.value.push(char::REPLACEMENT_CHARACTER),
        }
    }

    fn scan_hex4(&mut self) -> Option<u32> {
        if self.pos + 4 > self.bytes.len() {
            return None;
        }
        let digits = &self.bytes[self.pos..self.pos + 4];
        if !digits.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let code = u32::from_str_radix(std::str::from_utf8(digits).ok()?, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    fn scan_word(&mut self) -> SyntaxKind {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_word_char(self.current_char()) {
            self.advance_char();
        }
        if self.pos == start {
            // a lone character that cannot start any token
            self.advance_char();
            self.value.push_str(&self.text[start..self.pos]);
            return SyntaxKind::Unknown;
        }
        let word = &self.text[start..self.pos];
        self.value.push_str(word);
        match word {
            "true" => SyntaxKind::True,
            "false" => SyntaxKind::False,
            "null" => SyntaxKind::Null,
            _ => SyntaxKind::Unknown,
        }
    }

    fn current_byte(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn current_char(&self) -> char {
        self.text
            .get(self.pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or('\0')
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn advance_char(&mut self) {
        self.pos += self.current_char().len_utf8().max(1);
    }
}

fn is_white_space(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '\t' | '\u{b}' | '\u{c}' | '\u{a0}' | '\u{1680}' | '\u{2000}'..='\u{200b}' | '\u{2028}'
            | '\u{2029}' | '\u{202f}' | '\u{205f}' | '\u{3000}' | '\u{feff}'
    )
}

fn is_word_char(ch: char) -> bool {
    !(is_white_space(ch)
        || matches!(
            ch,
            '\r' | '\n' | '{' | '}' | '[' | ']' | ':' | ',' | '"' | '/'
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str, ignore_trivia: bool) -> Vec<SyntaxKind> {
        let mut scanner = Scanner::new(text, ignore_trivia);
        let mut out = Vec::new();
        loop {
            let kind = scanner.scan();
            if kind == SyntaxKind::Eof {
                return out;
            }
            out.push(kind);
        }
    }

    #[test]
    fn test_scans_structure_and_trivia() {
        assert_eq!(
            kinds("{ \"a\": 1 }\n", false),
            vec![
                SyntaxKind::OpenBrace,
                SyntaxKind::Trivia,
                SyntaxKind::String,
                SyntaxKind::Colon,
                SyntaxKind::Trivia,
                SyntaxKind::Number,
                SyntaxKind::Trivia,
                SyntaxKind::CloseBrace,
                SyntaxKind::LineBreak,
            ]
        );
    }

    #[test]
    fn test_ignore_trivia_keeps_comments() {
        assert_eq!(
            kinds("// hi\n[ /* x */ true ]", true),
            vec![
                SyntaxKind::LineComment,
                SyntaxKind::OpenBracket,
                SyntaxKind::BlockComment,
                SyntaxKind::True,
                SyntaxKind::CloseBracket,
            ]
        );
    }

    #[test]
    fn test_crlf_is_one_line_break() {
        let mut scanner = Scanner::new("\r\n", false);
        assert_eq!(scanner.scan(), SyntaxKind::LineBreak);
        assert_eq!(scanner.token_len(), 2);
        assert_eq!(scanner.scan(), SyntaxKind::Eof);
    }

    #[test]
    fn test_string_escapes_are_decoded() {
        let mut scanner = Scanner::new(r#""a\n\"b\" é 😀""#, false);
        assert_eq!(scanner.scan(), SyntaxKind::String);
        assert_eq!(scanner.token_value(), "a\n\"b\" \u{e9} \u{1f600}");
        assert_eq!(scanner.token_error(), ScanError::None);
    }

    #[test]
    fn test_unterminated_string_and_comment() {
        let mut scanner = Scanner::new("\"abc", false);
        scanner.scan();
        assert_eq!(scanner.token_error(), ScanError::UnexpectedEndOfString);

        let mut scanner = Scanner::new("/* open", false);
        assert_eq!(scanner.scan(), SyntaxKind::BlockComment);
        assert_eq!(scanner.token_error(), ScanError::UnexpectedEndOfComment);
    }

    #[test]
    fn test_numbers() {
        for text in ["0", "-1", "12.5", "1e10", "-0.5E-3"] {
            let mut scanner = Scanner::new(text, false);
            assert_eq!(scanner.scan(), SyntaxKind::Number, "{text}");
            assert_eq!(scanner.token_value(), text);
            assert_eq!(scanner.token_error(), ScanError::None, "{text}");
        }
        let mut scanner = Scanner::new("1.", false);
        scanner.scan();
        assert_eq!(scanner.token_error(), ScanError::UnexpectedEndOfNumber);
    }

    #[test]
    fn test_invalid_escape_before_multibyte_char() {
        let mut scanner = Scanner::new("\"\\é rest\"", false);
        assert_eq!(scanner.scan(), SyntaxKind::String);
        assert_eq!(scanner.token_error(), ScanError::InvalidEscapeCharacter);
        assert_eq!(scanner.token_value(), " rest");
        assert_eq!(scanner.scan(), SyntaxKind::Eof);

        let mut scanner = Scanner::new("\"\\u00é1\"", false);
        assert_eq!(scanner.scan(), SyntaxKind::String);
        assert_eq!(scanner.token_error(), ScanError::InvalidUnicode);
    }

    /// Scans to the end and checks every token boundary is a char boundary.
    fn scan_all(text: &str) {
        let mut scanner = Scanner::new(text, false);
        let mut last_end = 0;
        loop {
            let kind = scanner.scan();
            assert!(text.is_char_boundary(scanner.token_offset()), "{text:?}");
            assert!(text.is_char_boundary(scanner.token_end()), "{text:?}");
            assert!(scanner.token_end() <= text.len(), "{text:?}");
            if kind == SyntaxKind::Eof {
                break;
            }
            assert!(scanner.token_end() > last_end, "no progress in {text:?}");
            last_end = scanner.token_end();
        }
    }

    #[test]
    fn test_malformed_and_non_ascii_input_never_panics() {
        let sample = "{\"näme\": \"wörker\\é\\u12\", /* ü */ \"x\": [1, -, 2.e, \"😀\\😀\"] // ß\r\n}";
        let specials = ["\\", "\"", "/", "/*", "-", "\\u", "é", "😀", "\r", "\u{0}"];

        let boundaries: Vec<usize> = (0..=sample.len())
            .filter(|&i| sample.is_char_boundary(i))
            .collect();
        for &i in &boundaries {
            scan_all(&sample[..i]);
            scan_all(&sample[i..]);
            for special in specials {
                let mut mutated = String::from(&sample[..i]);
                mutated.push_str(special);
                mutated.push_str(&sample[i..]);
                scan_all(&mutated);
            }
        }
    }

    #[test]
    fn test_unknown_words() {
        assert_eq!(kinds("nope", false), vec![SyntaxKind::Unknown]);
        assert_eq!(kinds("null", false), vec![SyntaxKind::Null]);
    }
}
