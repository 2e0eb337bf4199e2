//! Lexer for ECMAScript source code
//!
//! Converts source text into a stream of tokens. The lexer is driven by the
//! parser: a `/` or `}` whose meaning depends on the grammar is rescanned on
//! request (`rescan_as_regexp`, `rescan_template_continuation`).

use std::iter::Peekable;
use std::str::CharIndices;

use crate::number::str_to_number;
use crate::string::{JsString, JsStringBuilder};
use crate::string_dict::StringDict;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span from the start of `self` to the end of `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.start),
            line: self.line,
            column: self.column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// One piece of template text. `cooked` is `None` when the piece contains an
/// escape that is only legal in tagged templates.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateChunk {
    pub cooked: Option<JsString>,
    pub raw: JsString,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(JsString),
    RegExp { pattern: String, flags: String },

    // Identifiers
    Identifier(JsString),
    /// A reserved word spelt with unicode escapes (`i\u0066`)
    EscapedKeyword(JsString),
    /// `#name`
    PrivateName(JsString),

    // Reserved words
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Enum,
    Export,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    New,
    Null,
    Return,
    Super,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,

    // Operators
    Plus,             // +
    Minus,            // -
    Star,             // *
    Slash,            // /
    Percent,          // %
    StarStar,         // **
    PlusPlus,         // ++
    MinusMinus,       // --
    Eq,               // =
    EqEq,             // ==
    EqEqEq,           // ===
    BangEq,           // !=
    BangEqEq,         // !==
    Lt,               // <
    LtEq,             // <=
    Gt,               // >
    GtEq,             // >=
    LtLt,             // <<
    GtGt,             // >>
    GtGtGt,           // >>>
    Amp,              // &
    AmpAmp,           // &&
    Pipe,             // |
    PipePipe,         // ||
    Caret,            // ^
    Tilde,            // ~
    Bang,             // !
    Question,         // ?
    QuestionQuestion, // ??
    QuestionDot,      // ?.

    // Assignment Operators
    PlusEq,             // +=
    MinusEq,            // -=
    StarEq,             // *=
    SlashEq,            // /=
    PercentEq,          // %=
    StarStarEq,         // **=
    AmpEq,              // &=
    PipeEq,             // |=
    CaretEq,            // ^=
    LtLtEq,             // <<=
    GtGtEq,             // >>=
    GtGtGtEq,           // >>>=
    AmpAmpEq,           // &&=
    PipePipeEq,         // ||=
    QuestionQuestionEq, // ??=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Dot,       // .
    DotDotDot, // ...
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Arrow,     // =>

    // Template literals
    TemplateHead(TemplateChunk),   // `...${
    TemplateMiddle(TemplateChunk), // }...${
    TemplateTail(TemplateChunk),   // }...`
    TemplateNoSub(TemplateChunk),  // `...`

    // Special
    Eof,
    Invalid(char),
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("break", TokenKind::Break),
    ("case", TokenKind::Case),
    ("catch", TokenKind::Catch),
    ("class", TokenKind::Class),
    ("const", TokenKind::Const),
    ("continue", TokenKind::Continue),
    ("debugger", TokenKind::Debugger),
    ("default", TokenKind::Default),
    ("delete", TokenKind::Delete),
    ("do", TokenKind::Do),
    ("else", TokenKind::Else),
    ("enum", TokenKind::Enum),
    ("export", TokenKind::Export),
    ("extends", TokenKind::Extends),
    ("false", TokenKind::False),
    ("finally", TokenKind::Finally),
    ("for", TokenKind::For),
    ("function", TokenKind::Function),
    ("if", TokenKind::If),
    ("import", TokenKind::Import),
    ("in", TokenKind::In),
    ("instanceof", TokenKind::Instanceof),
    ("new", TokenKind::New),
    ("null", TokenKind::Null),
    ("return", TokenKind::Return),
    ("super", TokenKind::Super),
    ("switch", TokenKind::Switch),
    ("this", TokenKind::This),
    ("throw", TokenKind::Throw),
    ("true", TokenKind::True),
    ("try", TokenKind::Try),
    ("typeof", TokenKind::Typeof),
    ("var", TokenKind::Var),
    ("void", TokenKind::Void),
    ("while", TokenKind::While),
    ("with", TokenKind::With),
];

fn keyword(text: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(k, _)| *k == text)
        .map(|(_, kind)| kind.clone())
}

impl TokenKind {
    /// Source text of a reserved word token
    pub fn keyword_text(&self) -> Option<&'static str> {
        KEYWORDS.iter().find(|(_, k)| k == self).map(|(t, _)| *t)
    }

    /// The token read as an IdentifierName (property names after `.`, keys
    /// in object literals); reserved words qualify
    pub fn identifier_name(&self) -> Option<JsString> {
        match self {
            TokenKind::Identifier(name) | TokenKind::EscapedKeyword(name) => Some(name.clone()),
            other => other.keyword_text().map(JsString::from),
        }
    }

    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::StarStarEq
                | TokenKind::AmpEq
                | TokenKind::PipeEq
                | TokenKind::CaretEq
                | TokenKind::LtLtEq
                | TokenKind::GtGtEq
                | TokenKind::GtGtGtEq
                | TokenKind::AmpAmpEq
                | TokenKind::PipePipeEq
                | TokenKind::QuestionQuestionEq
        )
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
    /// Identifier written with unicode escapes
    pub escaped: bool,
    /// Legacy octal literal or octal escape, rejected in strict code
    pub legacy_octal: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            newline_before: false,
            escaped: false,
            legacy_octal: false,
        }
    }

    pub fn eof(pos: usize, line: u32, column: u32) -> Self {
        Self::new(TokenKind::Eof, Span::new(pos, pos, line, column))
    }

    /// Identifier text, if this is an unescaped identifier equal to `name`
    pub fn is_contextual(&self, name: &str) -> bool {
        !self.escaped && matches!(&self.kind, TokenKind::Identifier(s) if *s == *name)
    }
}

/// Lexer state checkpoint for backtracking
#[derive(Clone)]
pub struct LexerCheckpoint {
    current_pos: usize,
    line: u32,
    column: u32,
    errors: usize,
}

/// Lexer diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Lexer for tokenizing ECMAScript source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    saw_newline: bool,
    escaped: bool,
    legacy_octal: bool,
    errors: Vec<LexError>,
    source_mapping_url: Option<String>,
    string_dict: &'a mut StringDict,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        let mut lexer = Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
            escaped: false,
            legacy_octal: false,
            errors: Vec::new(),
            source_mapping_url: None,
            string_dict,
        };
        if source.starts_with("#!") {
            while let Some(ch) = lexer.peek() {
                if is_line_terminator(ch) {
                    break;
                }
                lexer.advance();
            }
        }
        lexer
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn string_dict(&mut self) -> &mut StringDict {
        self.string_dict
    }

    /// Take the diagnostics collected so far
    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    /// URL from the last `//# sourceMappingURL=` comment scanned
    pub fn source_mapping_url(&self) -> Option<&str> {
        self.source_mapping_url.as_deref()
    }

    /// Create a checkpoint of the current lexer state for backtracking
    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            current_pos: self.current_pos,
            line: self.line,
            column: self.column,
            errors: self.errors.len(),
        }
    }

    /// Restore the lexer state from a checkpoint
    pub fn restore(&mut self, checkpoint: LexerCheckpoint) {
        self.errors.truncate(checkpoint.errors);
        self.seek(checkpoint.current_pos, checkpoint.line, checkpoint.column);
    }

    fn seek(&mut self, pos: usize, line: u32, column: u32) {
        self.current_pos = pos;
        self.line = line;
        self.column = column;
        self.chars_base_offset = pos;
        self.chars = self
            .source
            .get(pos..)
            .unwrap_or("")
            .char_indices()
            .peekable();
    }

    /// Reset the lexer to the start of `span` and scan a regular expression
    /// literal. Used when the parser finds `/` or `/=` in operand position.
    pub fn rescan_as_regexp(&mut self, span: Span) -> Token {
        self.seek(span.start, span.line, span.column);
        self.start_pos = span.start;
        self.start_line = span.line;
        self.start_column = span.column;
        self.scan_regexp()
    }

    /// Rescan from just after a `}` token as the continuation of a template
    pub fn rescan_template_continuation(&mut self, rbrace_span: Span) -> Token {
        self.seek(rbrace_span.end, rbrace_span.line, rbrace_span.column + 1);
        self.start_pos = rbrace_span.start;
        self.start_line = rbrace_span.line;
        self.start_column = rbrace_span.column;
        let kind = self.scan_template(false);
        Token::new(kind, self.make_span())
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let newline_before = self.saw_newline;
        self.escaped = false;
        self.legacy_octal = false;

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            let mut eof = Token::eof(self.current_pos, self.line, self.column);
            eof.newline_before = newline_before;
            return eof;
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            ':' => TokenKind::Colon,

            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_star(),
            '/' => self.scan_slash(),
            '%' => self.scan_percent(),
            '=' => self.scan_equals(),
            '!' => self.scan_bang(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '&' => self.scan_ampersand(),
            '|' => self.scan_pipe(),
            '^' => self.scan_caret(),
            '?' => self.scan_question(),
            '#' => self.scan_private_name(),

            '"' | '\'' => self.scan_string(ch),
            '`' => self.scan_template(true),
            '0'..='9' => self.scan_number(ch),

            c if is_id_start(c) || c == '\\' => self.scan_identifier(c),

            c => {
                self.error(format!("Invalid or unexpected token '{c}'"));
                TokenKind::Invalid(c)
            }
        };

        Token {
            kind,
            span: self.make_span(),
            newline_before,
            escaped: self.escaped,
            legacy_octal: self.legacy_octal,
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let span = self.make_span();
        self.errors.push(LexError {
            span,
            message: message.into(),
        });
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            match ch {
                // CRLF counts once, on the LF
                '\r' if self.peek() == Some('\n') => self.column += 1,
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(c) if is_line_terminator(c) => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(c) if is_whitespace(c) => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        let comment_start = self.current_pos + 2;
                        self.advance();
                        self.advance();
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                        let text = self.source.get(comment_start..self.current_pos).unwrap_or("");
                        self.note_source_mapping_url(text);
                    }
                    Some('*') => {
                        self.start_pos = self.current_pos;
                        self.start_line = self.line;
                        self.start_column = self.column;
                        self.advance();
                        self.advance();
                        let mut closed = false;
                        while let Some((_, ch)) = self.advance() {
                            if ch == '*' && self.peek() == Some('/') {
                                self.advance();
                                closed = true;
                                break;
                            }
                            if is_line_terminator(ch) {
                                self.saw_newline = true;
                            }
                        }
                        if !closed {
                            self.error("Unterminated comment");
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    fn note_source_mapping_url(&mut self, comment: &str) {
        let rest = comment
            .strip_prefix('#')
            .or_else(|| comment.strip_prefix('@'));
        if let Some(url) = rest
            .map(str::trim_start)
            .and_then(|r| r.strip_prefix("sourceMappingURL="))
        {
            let url = url.trim();
            if !url.is_empty() {
                self.source_mapping_url = Some(url.to_string());
            }
        }
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            self.advance();
            self.advance();
            TokenKind::DotDotDot
        } else if matches!(self.peek(), Some('0'..='9')) {
            self.scan_number('.')
        } else {
            TokenKind::Dot
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.match_char('+') {
            TokenKind::PlusPlus
        } else if self.match_char('=') {
            TokenKind::PlusEq
        } else {
            TokenKind::Plus
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.match_char('-') {
            TokenKind::MinusMinus
        } else if self.match_char('=') {
            TokenKind::MinusEq
        } else {
            TokenKind::Minus
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.match_char('*') {
            if self.match_char('=') {
                TokenKind::StarStarEq
            } else {
                TokenKind::StarStar
            }
        } else if self.match_char('=') {
            TokenKind::StarEq
        } else {
            TokenKind::Star
        }
    }

    fn scan_slash(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::SlashEq
        } else {
            TokenKind::Slash
        }
    }

    /// Scan a regular expression literal; the leading `/` is the next char
    fn scan_regexp(&mut self) -> Token {
        self.advance();

        let mut pattern = String::new();
        let mut in_class = false;
        let mut terminated = false;

        while let Some(ch) = self.peek() {
            if is_line_terminator(ch) {
                break;
            }
            self.advance();
            match ch {
                '/' if !in_class => {
                    terminated = true;
                    break;
                }
                '[' => {
                    in_class = true;
                    pattern.push('[');
                }
                ']' => {
                    in_class = false;
                    pattern.push(']');
                }
                '\\' => {
                    pattern.push('\\');
                    match self.peek() {
                        Some(c) if !is_line_terminator(c) => {
                            self.advance();
                            pattern.push(c);
                        }
                        _ => break,
                    }
                }
                c => pattern.push(c),
            }
        }
        if !terminated {
            self.error("Invalid regular expression: missing /");
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::new(TokenKind::RegExp { pattern, flags }, self.make_span())
    }

    fn scan_percent(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::PercentEq
        } else {
            TokenKind::Percent
        }
    }

    fn scan_equals(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::EqEqEq
            } else {
                TokenKind::EqEq
            }
        } else if self.match_char('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Eq
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::BangEqEq
            } else {
                TokenKind::BangEq
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.match_char('<') {
            if self.match_char('=') {
                TokenKind::LtLtEq
            } else {
                TokenKind::LtLt
            }
        } else if self.match_char('=') {
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.match_char('>') {
            if self.match_char('>') {
                if self.match_char('=') {
                    TokenKind::GtGtGtEq
                } else {
                    TokenKind::GtGtGt
                }
            } else if self.match_char('=') {
                TokenKind::GtGtEq
            } else {
                TokenKind::GtGt
            }
        } else if self.match_char('=') {
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        if self.match_char('&') {
            if self.match_char('=') {
                TokenKind::AmpAmpEq
            } else {
                TokenKind::AmpAmp
            }
        } else if self.match_char('=') {
            TokenKind::AmpEq
        } else {
            TokenKind::Amp
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        if self.match_char('|') {
            if self.match_char('=') {
                TokenKind::PipePipeEq
            } else {
                TokenKind::PipePipe
            }
        } else if self.match_char('=') {
            TokenKind::PipeEq
        } else {
            TokenKind::Pipe
        }
    }

    fn scan_caret(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::CaretEq
        } else {
            TokenKind::Caret
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        if self.match_char('?') {
            if self.match_char('=') {
                TokenKind::QuestionQuestionEq
            } else {
                TokenKind::QuestionQuestion
            }
        } else if self.peek() == Some('.') && !matches!(self.peek_next(), Some('0'..='9')) {
            // `a?.5:b` is a conditional, not optional chaining
            self.advance();
            TokenKind::QuestionDot
        } else {
            TokenKind::Question
        }
    }

    fn scan_private_name(&mut self) -> TokenKind {
        match self.peek() {
            Some(c) if is_id_start(c) || c == '\\' => {
                self.advance();
                match self.scan_identifier(c) {
                    TokenKind::Identifier(name) | TokenKind::EscapedKeyword(name) => {
                        TokenKind::PrivateName(name)
                    }
                    other => other,
                }
            }
            _ => {
                self.error("Invalid or unexpected token '#'");
                TokenKind::Invalid('#')
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = JsStringBuilder::new();

        loop {
            match self.peek() {
                None => {
                    self.error("Invalid or unexpected token: unterminated string");
                    break;
                }
                Some('\n' | '\r') => {
                    self.error("Invalid or unexpected token: unterminated string");
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.scan_escape(false) {
                        Ok(Escape::Units(units)) => {
                            for u in units {
                                value.push_unit(u);
                            }
                        }
                        Ok(Escape::LineContinuation) => {}
                        Err(message) => self.error(message),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push_char(c);
                }
            }
        }

        TokenKind::String(self.string_dict.intern(value.finish()))
    }

    /// Scan one escape sequence after the backslash. In templates legacy
    /// octal escapes and `\8`/`\9` are errors.
    fn scan_escape(&mut self, template: bool) -> Result<Escape, String> {
        let Some((_, ch)) = self.advance() else {
            return Err("Invalid or unexpected token".into());
        };
        let unit = match ch {
            'n' => 0x0A,
            'r' => 0x0D,
            't' => 0x09,
            'b' => 0x08,
            'f' => 0x0C,
            'v' => 0x0B,
            '\r' => {
                self.match_char('\n');
                return Ok(Escape::LineContinuation);
            }
            '\n' | '\u{2028}' | '\u{2029}' => return Ok(Escape::LineContinuation),
            '0' if !matches!(self.peek(), Some('0'..='9')) => 0,
            '0'..='7' => {
                if template {
                    return Err("Octal escape sequences are not allowed in template strings".into());
                }
                self.legacy_octal = true;
                let mut value = ch as u32 - '0' as u32;
                let max_digits = if ch <= '3' { 3 } else { 2 };
                let mut digits = 1;
                while digits < max_digits {
                    match self.peek() {
                        Some(d @ '0'..='7') => {
                            self.advance();
                            value = value * 8 + (d as u32 - '0' as u32);
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                value as u16
            }
            '8' | '9' => {
                if template {
                    return Err("\\8 and \\9 are not allowed in template strings".into());
                }
                self.legacy_octal = true;
                ch as u16
            }
            'x' => match self.scan_hex_digits(2) {
                Some(v) => v as u16,
                None => return Err("Invalid hexadecimal escape sequence".into()),
            },
            'u' => {
                let cp = self
                    .scan_unicode_escape_body()
                    .ok_or_else(|| String::from("Invalid Unicode escape sequence"))?;
                return Ok(Escape::Units(encode_code_point(cp)));
            }
            c => {
                let mut buf = [0u16; 2];
                return Ok(Escape::Units(c.encode_utf16(&mut buf).to_vec()));
            }
        };
        Ok(Escape::Units(vec![unit]))
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let d = self.peek()?.to_digit(16)?;
            self.advance();
            value = value * 16 + d;
        }
        Some(value)
    }

    /// Body of `\u` escape: `XXXX` or `{X...}`
    fn scan_unicode_escape_body(&mut self) -> Option<u32> {
        if self.match_char('{') {
            let mut value = 0u32;
            let mut digits = 0;
            loop {
                match self.peek() {
                    Some('}') => {
                        self.advance();
                        break;
                    }
                    Some(c) => {
                        let d = c.to_digit(16)?;
                        self.advance();
                        value = value.checked_mul(16)?.checked_add(d)?;
                        if value > 0x10FFFF {
                            return None;
                        }
                        digits += 1;
                    }
                    None => return None,
                }
            }
            (digits > 0).then_some(value)
        } else {
            self.scan_hex_digits(4)
        }
    }

    /// Scan template text up to `${` or the closing backtick. `opening` is
    /// true right after the opening backtick.
    fn scan_template(&mut self, opening: bool) -> TokenKind {
        let mut cooked = Some(JsStringBuilder::new());
        let mut raw = JsStringBuilder::new();

        let end = loop {
            match self.advance() {
                None => {
                    self.error("Unterminated template literal");
                    break false;
                }
                Some((_, '`')) => break false,
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    break true;
                }
                Some((_, '\r')) => {
                    self.match_char('\n');
                    raw.push_unit(0x0A);
                    if let Some(c) = cooked.as_mut() {
                        c.push_unit(0x0A);
                    }
                }
                Some((_, '\\')) => {
                    let escape_start = self.current_pos;
                    let result = self.scan_escape(true);
                    raw.push_unit(u16::from(b'\\'));
                    let text = self.source.get(escape_start..self.current_pos).unwrap_or("");
                    push_raw_normalized(&mut raw, text);
                    match result {
                        Ok(Escape::Units(units)) => {
                            if let Some(c) = cooked.as_mut() {
                                for u in units {
                                    c.push_unit(u);
                                }
                            }
                        }
                        Ok(Escape::LineContinuation) => {}
                        // Tagged templates tolerate bad escapes; the parser
                        // reports them for untagged ones
                        Err(_) => cooked = None,
                    }
                }
                Some((_, c)) => {
                    raw.push_char(c);
                    if let Some(b) = cooked.as_mut() {
                        b.push_char(c);
                    }
                }
            }
        };

        let chunk = TemplateChunk {
            cooked: cooked.map(|b| self.string_dict.intern(b.finish())),
            raw: raw.finish(),
        };
        match (opening, end) {
            (true, true) => TokenKind::TemplateHead(chunk),
            (true, false) => TokenKind::TemplateNoSub(chunk),
            (false, true) => TokenKind::TemplateMiddle(chunk),
            (false, false) => TokenKind::TemplateTail(chunk),
        }
    }

    fn scan_digits(&mut self, radix: u32, out: &mut String) {
        let mut last_was_separator = false;
        let mut any = !out.is_empty();
        while let Some(ch) = self.peek() {
            if ch == '_' {
                if !any || last_was_separator {
                    self.error("Numeric separators are not allowed here");
                }
                if !matches!(self.peek_next(), Some(c) if c.is_digit(radix)) {
                    self.advance();
                    self.error("Numeric separators are not allowed at the end of numeric literals");
                    return;
                }
                last_was_separator = true;
                self.advance();
            } else if ch.is_digit(radix) {
                out.push(ch);
                any = true;
                last_was_separator = false;
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut num_str = String::new();

        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some((16, "0x")),
                Some('o' | 'O') => Some((8, "0o")),
                Some('b' | 'B') => Some((2, "0b")),
                _ => None,
            };
            if let Some((radix, prefix)) = radix {
                self.advance();
                let mut digits = String::from(prefix);
                let before = digits.len();
                self.scan_digits(radix, &mut digits);
                if digits.len() == before {
                    self.error("Invalid or unexpected token: missing digits");
                    return TokenKind::Number(0.0);
                }
                self.check_number_end();
                return TokenKind::Number(str_to_number(&digits));
            }
            if matches!(self.peek(), Some('0'..='9')) {
                // Legacy octal `017`, or decimal with leading zero `089`
                self.legacy_octal = true;
                let mut digits = String::new();
                while let Some(ch @ '0'..='9') = self.peek() {
                    digits.push(ch);
                    self.advance();
                }
                if digits.chars().all(|c| c.is_digit(8)) {
                    self.check_number_end();
                    let mut prefixed = String::from("0o");
                    prefixed.push_str(&digits);
                    return TokenKind::Number(str_to_number(&prefixed));
                }
                num_str.push('0');
                num_str.push_str(&digits);
                return self.finish_decimal(num_str);
            }
        }

        if first == '.' {
            num_str.push_str("0.");
            self.scan_digits(10, &mut num_str);
            self.scan_exponent(&mut num_str);
            self.check_number_end();
            return TokenKind::Number(num_str.parse::<f64>().unwrap_or(f64::NAN));
        }

        num_str.push(first);
        self.scan_digits(10, &mut num_str);
        self.finish_decimal(num_str)
    }

    fn finish_decimal(&mut self, mut num_str: String) -> TokenKind {
        if self.peek() == Some('.') {
            self.advance();
            num_str.push('.');
            if matches!(self.peek(), Some('0'..='9')) {
                self.scan_digits(10, &mut num_str);
            }
        }
        self.scan_exponent(&mut num_str);
        if self.peek() == Some('n') {
            self.advance();
            self.error("BigInt literals are not supported");
        }
        self.check_number_end();
        TokenKind::Number(num_str.parse::<f64>().unwrap_or(f64::NAN))
    }

    fn scan_exponent(&mut self, num_str: &mut String) {
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            num_str.push('e');
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.advance();
                num_str.push(sign);
            }
            let before = num_str.len();
            let mut digits = String::new();
            self.scan_digits(10, &mut digits);
            num_str.push_str(&digits);
            if num_str.len() == before {
                self.error("Invalid or unexpected token: missing exponent");
                num_str.push('0');
            }
        }
    }

    fn check_number_end(&mut self) {
        if let Some(c) = self.peek() {
            if is_id_start(c) || c.is_ascii_digit() || c == '\\' {
                self.error("Invalid or unexpected token: identifier starts immediately after numeric literal");
            }
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        let mut escaped = false;

        let mut ch = first;
        let mut is_first = true;
        loop {
            if ch == '\\' {
                escaped = true;
                let valid = self.match_char('u');
                match valid.then(|| self.scan_unicode_escape_body()).flatten() {
                    Some(cp) => match char::from_u32(cp) {
                        Some(c) if (is_first && is_id_start(c)) || (!is_first && is_id_continue(c)) => {
                            name.push(c);
                        }
                        _ => self.error("Invalid Unicode escape sequence in identifier"),
                    },
                    None => self.error("Invalid Unicode escape sequence in identifier"),
                }
            } else {
                name.push(ch);
            }
            is_first = false;
            match self.peek() {
                Some(c) if is_id_continue(c) || c == '\\' => {
                    self.advance();
                    ch = c;
                }
                _ => break,
            }
        }

        self.escaped = escaped;
        if let Some(kind) = keyword(&name) {
            if escaped {
                return TokenKind::EscapedKeyword(self.string_dict.get_or_insert(&name));
            }
            return kind;
        }
        TokenKind::Identifier(self.string_dict.get_or_insert(&name))
    }
}

enum Escape {
    Units(Vec<u16>),
    LineContinuation,
}

/// UTF-16 units for a code point; lone surrogates pass through
fn encode_code_point(cp: u32) -> Vec<u16> {
    match char::from_u32(cp) {
        Some(c) => {
            let mut buf = [0u16; 2];
            c.encode_utf16(&mut buf).to_vec()
        }
        None => vec![cp as u16],
    }
}

/// Raw template text normalizes CR and CRLF to LF
fn push_raw_normalized(raw: &mut JsStringBuilder, text: &str) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            raw.push_unit(0x0A);
        } else {
            raw.push_char(c);
        }
    }
}

pub fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\u{000B}'
            | '\u{000C}'
            | ' '
            | '\u{00A0}'
            | '\u{FEFF}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

pub fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || unicode_ident::is_xid_start(ch)
}

pub fn is_id_continue(ch: char) -> bool {
    ch == '$' || ch == '\u{200C}' || ch == '\u{200D}' || unicode_ident::is_xid_continue(ch)
}
