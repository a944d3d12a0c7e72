//! Host-language string literal extraction
//!
//! Application code embeds SQL in string literals. This module lexes source
//! files just far enough to recover those literals: quoting rules per
//! language, comments, interpolations, concatenation, and the bind arguments
//! that follow the literal in the enclosing call.
//!
//! Interpolated expressions are replaced in the literal text by a marker
//! (see [`interpolation_marker`]) so the scanner can turn them into
//! placeholders before parsing.

use std::collections::BTreeMap;
use std::path::Path;

/// Delimits interpolation markers inside extracted literal text
pub const MARKER: char = '\u{1d}';

/// Longest trailing argument list captured after a literal
const MAX_ARGS_LEN: usize = 2048;

/// Marker for the `index`-th interpolation of a literal
pub fn interpolation_marker(index: usize) -> String {
    format!("{MARKER}{index}{MARKER}")
}

/// Source language of a file, by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostLanguage {
    Python,
    JavaScript,
    Rust,
    Go,
    Ruby,
    Php,
    Java,
    /// Plain SQL file, parsed directly
    Sql,
}

impl HostLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => Some(Self::Python),
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "rb" => Some(Self::Ruby),
            "php" => Some(Self::Php),
            "java" | "kt" | "scala" | "cs" => Some(Self::Java),
            "sql" => Some(Self::Sql),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn hash_comments(&self) -> bool {
        matches!(self, Self::Python | Self::Ruby | Self::Php)
    }

    fn slash_comments(&self) -> bool {
        matches!(self, Self::JavaScript | Self::Rust | Self::Go | Self::Php | Self::Java)
    }

    /// Whether `'` opens a char/rune literal rather than a string
    fn quote_is_char(&self) -> bool {
        matches!(self, Self::Rust | Self::Go | Self::Java)
    }

    /// Whether `"a" "b"` concatenates
    fn adjacent_concatenation(&self) -> bool {
        matches!(self, Self::Python | Self::Ruby)
    }

    fn identifier_char(&self, c: char) -> bool {
        c.is_alphanumeric() || c == '_' || (c == '$' && matches!(self, Self::JavaScript | Self::Php))
    }
}

/// Bind arguments passed alongside a literal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArguments {
    /// Positional binds in order (`(a, b)`, `[a, b]`, or flat call arguments)
    pub positional: Vec<String>,

    /// Named binds (`{"k": v}`, `k=v`)
    pub named: BTreeMap<String, String>,
}

impl CallArguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Parse the text of a call's trailing arguments
    pub fn parse(text: &str) -> Self {
        let mut args = Self::default();

        for arg in split_top_level(text, ',') {
            let arg = arg.trim();
            if arg.is_empty() {
                continue;
            }

            if let Some(inner) = strip_enclosing(arg, '(', ')').or_else(|| strip_enclosing(arg, '[', ']')) {
                args.positional.extend(
                    split_top_level(inner, ',')
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                );
            } else if let Some(inner) = strip_enclosing(arg, '{', '}') {
                for entry in split_top_level(inner, ',') {
                    if let Some((key, value)) = split_mapping_entry(entry) {
                        args.named.insert(key, value);
                    }
                }
            } else if let Some((key, value)) = split_keyword_argument(arg) {
                args.named.insert(key, value);
            } else {
                args.positional.push(arg.to_string());
            }
        }

        args
    }
}

/// A string literal recovered from host source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLiteral {
    /// Literal text after escape processing and concatenation
    pub text: String,

    /// Line where the literal starts (1-indexed)
    pub line: usize,

    /// Interpolated expressions, indexed by marker number
    pub interpolations: Vec<String>,

    /// Bind arguments following the literal
    pub args: CallArguments,
}

/// Extract every string literal from a host-language source file
pub fn extract_literals(source: &str, language: HostLanguage) -> Vec<HostLiteral> {
    if language == HostLanguage::Sql {
        return Vec::new();
    }
    Lexer::new(source, language).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    None,
    /// Python f-strings: `{expr}`, `{{` escapes
    Braces,
    /// JavaScript templates: `${expr}`
    DollarBraces,
    /// Ruby: `#{expr}`
    HashBraces,
    /// PHP: `$name`, `{$expr}`
    PhpVariable,
}

#[derive(Debug, Clone, Copy)]
struct StringStyle {
    quote: char,
    triple: bool,
    raw: bool,
    /// Only `\\` and `\<quote>` are escapes (Ruby/PHP single quotes)
    minimal_escapes: bool,
    raw_hashes: usize,
    /// Backslash is an ordinary character (Rust raw strings, Go backticks)
    verbatim: bool,
    multiline: bool,
    interpolation: Interpolation,
}

#[derive(Default)]
struct LiteralBuilder {
    text: String,
    interpolations: Vec<String>,
}

impl LiteralBuilder {
    fn push_interpolation(&mut self, expr: &str) {
        self.text.push_str(&interpolation_marker(self.interpolations.len()));
        self.interpolations.push(expr.trim().to_string());
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    language: HostLanguage,
    line_starts: Vec<usize>,
}

impl Lexer {
    fn new(source: &str, language: HostLanguage) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut line_starts = vec![0];
        line_starts.extend(
            chars
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == '\n')
                .map(|(i, _)| i + 1),
        );

        Self {
            chars,
            pos: 0,
            language,
            line_starts,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn line_of(&self, index: usize) -> usize {
        match self.line_starts.binary_search(&index) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    fn run(mut self) -> Vec<HostLiteral> {
        let mut literals = Vec::new();

        while let Some(c) = self.peek(0) {
            if self.skip_comment() {
                continue;
            }

            if let Some((prefix_len, style)) = self.string_start(self.pos) {
                let start = self.pos;
                self.pos += prefix_len;
                literals.push(self.literal(start, style));
                continue;
            }

            if c == '\'' && self.language.quote_is_char() {
                self.skip_char_literal();
            } else if self.language.identifier_char(c) {
                while self.peek(0).map(|c| self.language.identifier_char(c)).unwrap_or(false) {
                    self.pos += 1;
                }
            } else {
                self.pos += 1;
            }
        }

        literals
    }

    /// Skip a comment at the cursor, returning whether one was skipped
    fn skip_comment(&mut self) -> bool {
        let c = self.peek(0);
        let next = self.peek(1);

        let line_comment = (self.language.hash_comments() && c == Some('#'))
            || (self.language.slash_comments() && c == Some('/') && next == Some('/'));

        if line_comment {
            while self.peek(0).map(|c| c != '\n').unwrap_or(false) {
                self.pos += 1;
            }
            return true;
        }

        if self.language.slash_comments() && c == Some('/') && next == Some('*') {
            self.pos += 2;
            while self.pos < self.chars.len() && !(self.peek(0) == Some('*') && self.peek(1) == Some('/')) {
                self.pos += 1;
            }
            self.pos = (self.pos + 2).min(self.chars.len());
            return true;
        }

        false
    }

    /// Rust/Go/Java char literal, or a Rust lifetime
    fn skip_char_literal(&mut self) {
        if self.peek(1) == Some('\\') {
            self.pos += 2;
            while self.peek(0).map(|c| c != '\'' && c != '\n').unwrap_or(false) {
                self.pos += 1;
            }
            self.pos += 1;
        } else if self.peek(2) == Some('\'') {
            self.pos += 3;
        } else {
            self.pos += 1;
        }
    }

    /// Detect a string literal (with any prefix) starting at `at`.
    ///
    /// Returns the prefix length and the quoting style.
    fn string_start(&self, at: usize) -> Option<(usize, StringStyle)> {
        let tagged_template = self.language == HostLanguage::JavaScript && self.chars.get(at) == Some(&'`');
        if at > 0 && self.language.identifier_char(self.chars[at - 1]) && !tagged_template {
            return None;
        }

        let mut end = at;
        while end < self.chars.len() && self.chars[end].is_ascii_alphabetic() && end - at < 3 {
            end += 1;
        }
        let prefix: String = self.chars[at..end].iter().collect::<String>().to_ascii_lowercase();

        let mut hashes = 0;
        while self.language == HostLanguage::Rust
            && matches!(prefix.as_str(), "r" | "br")
            && self.chars.get(end + hashes) == Some(&'#')
        {
            hashes += 1;
        }

        let quote_at = end + hashes;
        let quote = *self.chars.get(quote_at)?;
        if !matches!(quote, '"' | '\'' | '`') {
            return None;
        }
        let tripled = self.chars.get(quote_at + 1) == Some(&quote) && self.chars.get(quote_at + 2) == Some(&quote);

        let base = StringStyle {
            quote,
            triple: false,
            raw: false,
            minimal_escapes: false,
            raw_hashes: 0,
            verbatim: false,
            multiline: false,
            interpolation: Interpolation::None,
        };

        let style = match self.language {
            HostLanguage::Python => {
                if quote == '`' || !matches!(prefix.as_str(), "" | "r" | "u" | "b" | "f" | "rb" | "br" | "fr" | "rf") {
                    return None;
                }
                StringStyle {
                    triple: tripled,
                    multiline: tripled,
                    raw: prefix.contains('r'),
                    interpolation: if prefix.contains('f') { Interpolation::Braces } else { Interpolation::None },
                    ..base
                }
            }
            HostLanguage::JavaScript => match quote {
                // Tagged templates (sql`...`) take any identifier as prefix
                '`' => StringStyle {
                    multiline: true,
                    interpolation: Interpolation::DollarBraces,
                    ..base
                },
                _ if prefix.is_empty() => base,
                _ => return None,
            },
            HostLanguage::Rust => match (prefix.as_str(), quote) {
                ("" | "b", '"') => StringStyle { multiline: true, ..base },
                ("r" | "br", '"') => StringStyle {
                    raw: true,
                    verbatim: true,
                    raw_hashes: hashes,
                    multiline: true,
                    ..base
                },
                _ => return None,
            },
            HostLanguage::Go => match (prefix.as_str(), quote) {
                ("", '"') => base,
                ("", '`') => StringStyle { raw: true, verbatim: true, multiline: true, ..base },
                _ => return None,
            },
            HostLanguage::Ruby => match (prefix.as_str(), quote) {
                ("", '"') => StringStyle {
                    multiline: true,
                    interpolation: Interpolation::HashBraces,
                    ..base
                },
                ("", '\'') => StringStyle { multiline: true, minimal_escapes: true, ..base },
                _ => return None,
            },
            HostLanguage::Php => match (prefix.as_str(), quote) {
                ("", '"') => StringStyle {
                    multiline: true,
                    interpolation: Interpolation::PhpVariable,
                    ..base
                },
                ("", '\'') => StringStyle { multiline: true, minimal_escapes: true, ..base },
                _ => return None,
            },
            HostLanguage::Java => match (prefix.as_str(), quote) {
                ("", '"') => StringStyle { triple: tripled, multiline: tripled, ..base },
                _ => return None,
            },
            HostLanguage::Sql => return None,
        };

        Some((end - at, style))
    }

    /// Lex a literal and everything concatenated to it, then its call arguments
    fn literal(&mut self, start: usize, style: StringStyle) -> HostLiteral {
        let mut builder = LiteralBuilder::default();
        self.lex_string(style, &mut builder);
        self.concatenations(&mut builder);
        let args = self.trailing_arguments();

        HostLiteral {
            text: builder.text,
            line: self.line_of(start),
            interpolations: builder.interpolations,
            args,
        }
    }

    /// Lex one string body; the cursor sits on the hashes/opening quote
    fn lex_string(&mut self, style: StringStyle, builder: &mut LiteralBuilder) {
        self.pos += style.raw_hashes;
        self.pos += if style.triple { 3 } else { 1 };

        while let Some(c) = self.peek(0) {
            if c == style.quote && self.closes(style) {
                self.pos += (if style.triple { 3 } else { 1 }) + style.raw_hashes;
                return;
            }

            if c == '\n' && !style.multiline {
                return;
            }

            if c == '\\' && !style.verbatim {
                self.escape(style, builder);
                continue;
            }

            if self.interpolation(style.interpolation, builder) {
                continue;
            }

            builder.text.push(c);
            self.pos += 1;
        }
    }

    fn closes(&self, style: StringStyle) -> bool {
        if style.triple && !(self.peek(1) == Some(style.quote) && self.peek(2) == Some(style.quote)) {
            return false;
        }
        (1..=style.raw_hashes).all(|i| self.peek(i) == Some('#'))
    }

    fn escape(&mut self, style: StringStyle, builder: &mut LiteralBuilder) {
        let Some(next) = self.peek(1) else {
            self.pos += 1;
            return;
        };

        if style.raw {
            // Raw strings keep the backslash but it still protects the quote
            builder.text.push('\\');
            builder.text.push(next);
        } else if style.minimal_escapes {
            if next != '\\' && next != style.quote {
                builder.text.push('\\');
            }
            builder.text.push(next);
        } else {
            match next {
                'n' => builder.text.push('\n'),
                't' => builder.text.push('\t'),
                'r' => builder.text.push('\r'),
                '0' => builder.text.push('\0'),
                '\n' => {}
                '\\' | '\'' | '"' | '`' | '$' | '{' | '}' | '#' => builder.text.push(next),
                other => {
                    builder.text.push('\\');
                    builder.text.push(other);
                }
            }
        }
        self.pos += 2;
    }

    /// Consume an interpolation at the cursor, if any
    fn interpolation(&mut self, kind: Interpolation, builder: &mut LiteralBuilder) -> bool {
        let c = self.peek(0);
        let next = self.peek(1);

        match kind {
            Interpolation::None => false,
            Interpolation::Braces => match (c, next) {
                (Some(brace @ '{'), Some('{')) | (Some(brace @ '}'), Some('}')) => {
                    builder.text.push(brace);
                    self.pos += 2;
                    true
                }
                (Some('{'), _) => {
                    self.pos += 1;
                    let expr = self.read_balanced('{', '}');
                    builder.push_interpolation(strip_format_spec(&expr));
                    true
                }
                _ => false,
            },
            Interpolation::DollarBraces | Interpolation::HashBraces => {
                let sigil = if kind == Interpolation::DollarBraces { '$' } else { '#' };
                if c == Some(sigil) && next == Some('{') {
                    self.pos += 2;
                    let expr = self.read_balanced('{', '}');
                    builder.push_interpolation(&expr);
                    true
                } else {
                    false
                }
            }
            Interpolation::PhpVariable => match (c, next) {
                (Some('{'), Some('$')) => {
                    self.pos += 1;
                    let expr = self.read_balanced('{', '}');
                    builder.push_interpolation(&expr);
                    true
                }
                (Some('$'), Some(n)) if n.is_alphabetic() || n == '_' => {
                    let start = self.pos;
                    self.pos += 1;
                    loop {
                        match (self.peek(0), self.peek(1), self.peek(2)) {
                            (Some(c), _, _) if c.is_alphanumeric() || c == '_' => self.pos += 1,
                            (Some('-'), Some('>'), Some(c)) if c.is_alphabetic() || c == '_' => self.pos += 2,
                            _ => break,
                        }
                    }
                    let expr: String = self.chars[start..self.pos].iter().collect();
                    builder.push_interpolation(&expr);
                    true
                }
                _ => false,
            },
        }
    }

    /// Read up to the matching `close`; the cursor sits just past `open`
    fn read_balanced(&mut self, open: char, close: char) -> String {
        let start = self.pos;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek(0) {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) if c == '\\' => self.pos += 1,
                Some(_) => {}
                None if c == '"' || c == '\'' => quote = Some(c),
                None if c == open => depth += 1,
                None if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        let expr: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return expr;
                    }
                }
                None => {}
            }
            self.pos += 1;
        }

        self.chars[start..].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek(0) {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '\\' && self.language == HostLanguage::Python && self.peek(1) == Some('\n') {
                self.pos += 2;
            } else if !self.skip_comment() {
                break;
            }
        }
    }

    /// Join `"a" "b"`, `"a" + "b"` and `"a" + expr`
    fn concatenations(&mut self, builder: &mut LiteralBuilder) {
        loop {
            let saved = self.pos;
            self.skip_whitespace();

            let plus = self.peek(0) == Some('+') && !matches!(self.peek(1), Some('+') | Some('='));
            if plus {
                self.pos += 1;
                self.skip_whitespace();
            } else if !self.language.adjacent_concatenation() {
                self.pos = saved;
                return;
            }

            if let Some((prefix_len, style)) = self.string_start(self.pos) {
                self.pos += prefix_len;
                self.lex_string(style, builder);
                continue;
            }

            if !plus {
                self.pos = saved;
                return;
            }

            let operand = self.read_operand();
            if operand.trim().is_empty() {
                self.pos = saved;
                return;
            }
            builder.push_interpolation(&operand);
        }
    }

    /// An expression operand of `+`, up to the next top-level separator
    fn read_operand(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(c) = self.peek(0) {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                '+' | ',' | ';' | '\n' if depth == 0 => break,
                '"' | '\'' | '`' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }

        self.chars[start..self.pos].iter().collect()
    }

    /// Capture bind arguments after the literal (`, args)` or `% args`)
    fn trailing_arguments(&mut self) -> CallArguments {
        let saved = self.pos;
        self.skip_whitespace();

        // Python `"..." % (a, b)`
        if self.language == HostLanguage::Python && self.peek(0) == Some('%') && self.peek(1) != Some('=') {
            self.pos += 1;
            self.skip_whitespace();
            let operand = self.read_operand_or_group();
            self.pos = saved;
            return CallArguments::parse(&operand);
        }

        // text("...") wrappers: step over one closing paren
        if self.peek(0) == Some(')') {
            self.pos += 1;
            self.skip_whitespace();
        }

        if self.peek(0) != Some(',') {
            self.pos = saved;
            return CallArguments::default();
        }
        self.pos += 1;

        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek(0) {
            if self.pos - start > MAX_ARGS_LEN {
                break;
            }
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) if c == '\\' => self.pos += 1,
                Some(_) => {}
                None => match c {
                    '"' | '\'' | '`' => quote = Some(c),
                    '(' | '[' | '{' => depth += 1,
                    ')' | ']' | '}' if depth == 0 => break,
                    ')' | ']' | '}' => depth -= 1,
                    ';' if depth == 0 => break,
                    _ => {}
                },
            }
            self.pos += 1;
        }

        let end = self.pos.min(self.chars.len());
        let text: String = self.chars[start..end].iter().collect();
        self.pos = saved;
        CallArguments::parse(&text)
    }

    fn read_operand_or_group(&mut self) -> String {
        match self.peek(0) {
            Some(open @ ('(' | '[' | '{')) => {
                let close = match open {
                    '(' => ')',
                    '[' => ']',
                    _ => '}',
                };
                let start = self.pos;
                self.pos += 1;
                self.read_balanced(open, close);
                self.chars[start..self.pos].iter().collect()
            }
            _ => self.read_operand(),
        }
    }
}

/// Drop an f-string conversion or format spec (`{x!r}`, `{x:>10}`)
fn strip_format_spec(expr: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' if depth == 0 && !expr[i + 1..].starts_with('=') => return &expr[..i],
            ':' if depth == 0 => return &expr[..i],
            _ => {}
        }
    }
    expr.trim_end_matches('=')
}

/// Split on `sep` outside brackets and quotes
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    parts.push(&text[start..]);
    parts
}

fn strip_enclosing(text: &str, open: char, close: char) -> Option<&str> {
    let inner = text.strip_prefix(open)?.strip_suffix(close)?;
    // `(a)(b)` is not one group
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(inner)
}

/// `"key": value`, `key: value`, `:key => value`
fn split_mapping_entry(entry: &str) -> Option<(String, String)> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    let (key, value) = match split_top_level(entry, ':').as_slice() {
        [key, rest @ ..] if !rest.is_empty() && !key.trim().is_empty() && !key.contains("=>") => {
            (key.trim(), entry[key.len() + 1..].trim())
        }
        _ => match entry.split_once("=>") {
            Some((key, value)) => (key.trim(), value.trim()),
            // Shorthand properties (`{ id }`) bind the variable of the same name
            None if entry.chars().all(|c| c.is_alphanumeric() || c == '_') => (entry, entry),
            None => return None,
        },
    };

    let key = key
        .trim_start_matches(':')
        .trim_matches(|c| c == '"' || c == '\'');
    if key.is_empty() {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}

/// Python `k=v` keyword argument
fn split_keyword_argument(arg: &str) -> Option<(String, String)> {
    let (key, value) = arg.split_once('=')?;
    if value.starts_with('=') || value.starts_with('>') {
        return None;
    }
    let key = key.trim();
    let valid = !key.is_empty()
        && key.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    valid.then(|| (key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(source: &str, language: HostLanguage) -> Vec<String> {
        extract_literals(source, language).into_iter().map(|l| l.text).collect()
    }

    #[test]
    fn python_strings_and_comments() {
        let source = r#"
# "SELECT * FROM ignored"
cur.execute('SELECT id FROM users WHERE id = %s', (user_id,))
query = """
    SELECT *
    FROM orders
"""
"#;
        let literals = extract_literals(source, HostLanguage::Python);
        assert_eq!(literals.len(), 2);
        assert_eq!(literals[0].text, "SELECT id FROM users WHERE id = %s");
        assert_eq!(literals[0].line, 3);
        assert_eq!(literals[0].args.positional, vec!["user_id".to_string()]);
        assert!(literals[1].text.contains("FROM orders"));
        assert_eq!(literals[1].line, 4);
    }

    #[test]
    fn python_fstring_interpolation() {
        let source = r#"db.run(f"SELECT * FROM {table} WHERE id = {int(uid)!r} AND x = '{{lit}}'")"#;
        let literals = extract_literals(source, HostLanguage::Python);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].interpolations, vec!["table".to_string(), "int(uid)".to_string()]);
        assert_eq!(
            literals[0].text,
            format!(
                "SELECT * FROM {} WHERE id = {} AND x = '{{lit}}'",
                interpolation_marker(0),
                interpolation_marker(1)
            )
        );
    }

    #[test]
    fn python_adjacent_and_plus_concatenation() {
        let source = "q = (\"SELECT a \"\n     \"FROM t \" + 'WHERE b = 1')";
        assert_eq!(texts(source, HostLanguage::Python), vec!["SELECT a FROM t WHERE b = 1"]);
    }

    #[test]
    fn plus_with_expression_becomes_interpolation() {
        let source = r#"db.query("SELECT * FROM users WHERE id = " + userId + " LIMIT 1");"#;
        let literals = extract_literals(source, HostLanguage::JavaScript);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].interpolations, vec!["userId".to_string()]);
        assert!(literals[0].text.ends_with(" LIMIT 1"));
    }

    #[test]
    fn python_named_arguments() {
        let dict = r#"cur.execute("SELECT * FROM t WHERE a = %(a)s", {"a": int(x), 'b': flag})"#;
        let literals = extract_literals(dict, HostLanguage::Python);
        assert_eq!(literals[0].args.named.get("a").map(String::as_str), Some("int(x)"));
        assert_eq!(literals[0].args.named.get("b").map(String::as_str), Some("flag"));

        let kwargs = r#"session.execute(text("SELECT * FROM t WHERE a = :a"), a=5)"#;
        let literals = extract_literals(kwargs, HostLanguage::Python);
        assert_eq!(literals[0].args.named.get("a").map(String::as_str), Some("5"));
    }

    #[test]
    fn python_percent_operator() {
        let source = r#"sql = "SELECT * FROM t WHERE a = %s AND b = %s" % (1, name)"#;
        let literals = extract_literals(source, HostLanguage::Python);
        assert_eq!(literals[0].args.positional, vec!["1".to_string(), "name".to_string()]);
    }

    #[test]
    fn javascript_templates_and_arrays() {
        let source = "await pool.query(`SELECT * FROM ${schema}.users WHERE id = $1`, [Number(id)]);\n// 'not a literal'";
        let literals = extract_literals(source, HostLanguage::JavaScript);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].interpolations, vec!["schema".to_string()]);
        assert_eq!(literals[0].args.positional, vec!["Number(id)".to_string()]);
    }

    #[test]
    fn rust_raw_strings_and_lifetimes() {
        let source = r####"
fn load<'a>(c: &'a Client) {
    let ch = 'x';
    c.query(r#"SELECT "id" FROM users WHERE id = $1"#, &[&id]);
    let s = "esc\"aped";
}
"####;
        let texts = texts(source, HostLanguage::Rust);
        assert_eq!(texts, vec!["SELECT \"id\" FROM users WHERE id = $1", "esc\"aped"]);
    }

    #[test]
    fn go_backticks_and_flat_arguments() {
        let source = "rows, err := db.Query(`SELECT id\nFROM users WHERE org_id = ?`, orgID, 10)";
        let literals = extract_literals(source, HostLanguage::Go);
        assert_eq!(literals[0].text, "SELECT id\nFROM users WHERE org_id = ?");
        assert_eq!(literals[0].args.positional, vec!["orgID".to_string(), "10".to_string()]);
    }

    #[test]
    fn ruby_and_php_interpolation() {
        let ruby = r#"conn.exec("SELECT * FROM #{table} WHERE id = 1")"#;
        assert_eq!(extract_literals(ruby, HostLanguage::Ruby)[0].interpolations, vec!["table".to_string()]);

        let php = r#"$db->query("SELECT * FROM users WHERE id = $id AND org = {$org->id}");"#;
        let literals = extract_literals(php, HostLanguage::Php);
        assert_eq!(literals[0].interpolations, vec!["$id".to_string(), "$org->id".to_string()]);
    }

    #[test]
    fn unterminated_single_line_string_stops_at_newline() {
        let source = "x = 'broken\ny = \"SELECT 1\"";
        assert_eq!(texts(source, HostLanguage::Python), vec!["broken", "SELECT 1"]);
    }

    #[test]
    fn split_respects_nesting_and_quotes() {
        assert_eq!(split_top_level("a, f(b, c), 'x,y'", ','), vec!["a", " f(b, c)", " 'x,y'"]);
    }

    #[test]
    fn language_detection() {
        assert_eq!(HostLanguage::from_path(Path::new("app/models.py")), Some(HostLanguage::Python));
        assert_eq!(HostLanguage::from_path(Path::new("web/api.tsx")), Some(HostLanguage::JavaScript));
        assert_eq!(HostLanguage::from_path(Path::new("schema.SQL")), Some(HostLanguage::Sql));
        assert_eq!(HostLanguage::from_path(Path::new("README.md")), None);
    }
}
