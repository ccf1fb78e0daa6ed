//! Best-effort repair of near-valid JSON.
//!
//! The repair runs in two passes. A lenient lexer splits the text into
//! tokens, accepting single-quoted strings, raw control characters inside
//! strings, unterminated strings, bare words and `//` or `/* */` comments.
//! A re-emitter then walks the tokens with a container stack and writes
//! strict JSON:
//!
//! - bare object keys are quoted
//! - trailing, leading and doubled commas are dropped
//! - missing commas and colons are inserted
//! - `True`/`False`/`None` become `true`/`false`/`null`, other bare words become strings
//! - a key without a value gets `null`
//! - unclosed containers are closed in reverse order, mismatched closers are reconciled
//! - anything after the root value closes is ignored
//!
//! Well-formed input comes out with the same content (insignificant
//! whitespace is not preserved).

#[derive(Debug, Clone, PartialEq)]
enum Token {
    OpenObject,
    CloseObject,
    OpenArray,
    CloseArray,
    Colon,
    Comma,
    /// String body, already escaped for a double-quoted JSON string
    Str(String),
    Number(String),
    Word(String),
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn tokens(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '{' => {
                    self.bump();
                    tokens.push(Token::OpenObject);
                }
                '}' => {
                    self.bump();
                    tokens.push(Token::CloseObject);
                }
                '[' => {
                    self.bump();
                    tokens.push(Token::OpenArray);
                }
                ']' => {
                    self.bump();
                    tokens.push(Token::CloseArray);
                }
                ':' => {
                    self.bump();
                    tokens.push(Token::Colon);
                }
                ',' => {
                    self.bump();
                    tokens.push(Token::Comma);
                }
                '"' | '\'' => {
                    self.bump();
                    tokens.push(Token::Str(self.read_string(c)));
                }
                '/' => self.skip_comment(),
                c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                    tokens.push(Token::Number(self.read_while(is_number_char)));
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    tokens.push(Token::Word(self.read_while(is_word_char)));
                }
                _ => {
                    // whitespace, backticks and other stray characters
                    self.bump();
                }
            }
        }
        tokens
    }

    fn read_while(&mut self, accept: fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn read_string(&mut self, quote: char) -> String {
        let mut body = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some('\'') if quote == '\'' => body.push('\''),
                    Some(e @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                        body.push('\\');
                        body.push(e);
                    }
                    Some(other) => {
                        body.push_str("\\\\");
                        body.push(other);
                    }
                    None => body.push_str("\\\\"),
                },
                c if c == quote => return body,
                '"' => body.push_str("\\\""),
                '\n' => body.push_str("\\n"),
                '\r' => body.push_str("\\r"),
                '\t' => body.push_str("\\t"),
                c if (c as u32) < 0x20 => body.push_str(&format!("\\u{:04x}", c as u32)),
                c => body.push(c),
            }
        }
        // unterminated: the closing quote is implied at end of input
        body
    }

    fn skip_comment(&mut self) {
        self.bump();
        match self.peek() {
            Some('/') => {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            Some('*') => {
                self.bump();
                while let Some(c) = self.bump() {
                    if c == '*' && self.peek() == Some('/') {
                        self.bump();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug)]
struct Frame {
    kind: Kind,
    expect: Expect,
    has_items: bool,
}

impl Frame {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            expect: if kind == Kind::Object {
                Expect::Key
            } else {
                Expect::Value
            },
            has_items: false,
        }
    }
}

struct Emitter {
    out: String,
    stack: Vec<Frame>,
    root_done: bool,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: String::new(),
            stack: Vec::new(),
            root_done: false,
        }
    }

    fn feed(&mut self, token: Token) {
        if self.root_done {
            return;
        }
        match token {
            Token::Comma => self.on_comma(),
            Token::Colon => {
                if let Some(frame) = self.stack.last_mut() {
                    if frame.expect == Expect::Colon {
                        self.out.push(':');
                        frame.expect = Expect::Value;
                    }
                }
            }
            Token::CloseObject => self.close(Kind::Object),
            Token::CloseArray => self.close(Kind::Array),
            value => self.on_item(value),
        }
    }

    fn on_comma(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.expect == Expect::CommaOrEnd {
                frame.expect = match frame.kind {
                    Kind::Object => Expect::Key,
                    Kind::Array => Expect::Value,
                };
            }
        }
    }

    fn on_item(&mut self, token: Token) {
        let Some(frame) = self.stack.last_mut() else {
            self.emit_value(token);
            return;
        };

        if frame.expect == Expect::CommaOrEnd {
            // missing comma between two items
            frame.expect = match frame.kind {
                Kind::Object => Expect::Key,
                Kind::Array => Expect::Value,
            };
        }

        match frame.expect {
            Expect::Key => {
                if frame.has_items {
                    self.out.push(',');
                }
                frame.has_items = true;
                match token {
                    Token::Str(body) => {
                        frame.expect = Expect::Colon;
                        push_quoted(&mut self.out, &body);
                    }
                    Token::Word(word) | Token::Number(word) => {
                        frame.expect = Expect::Colon;
                        push_quoted(&mut self.out, &escape_plain(&word));
                    }
                    container => {
                        // a container where a key belongs: give it a placeholder key
                        frame.expect = Expect::Value;
                        self.out.push_str("\"\":");
                        self.emit_value(container);
                    }
                }
            }
            Expect::Colon => {
                self.out.push(':');
                frame.expect = Expect::Value;
                self.emit_value(token);
            }
            Expect::Value | Expect::CommaOrEnd => {
                if frame.kind == Kind::Array {
                    if frame.has_items {
                        self.out.push(',');
                    }
                    frame.has_items = true;
                }
                self.emit_value(token);
            }
        }
    }

    /// Write a value and leave the enclosing frame expecting a comma or closer.
    fn emit_value(&mut self, token: Token) {
        if let Some(frame) = self.stack.last_mut() {
            frame.expect = Expect::CommaOrEnd;
        }
        match token {
            Token::OpenObject => {
                self.out.push('{');
                self.stack.push(Frame::new(Kind::Object));
            }
            Token::OpenArray => {
                self.out.push('[');
                self.stack.push(Frame::new(Kind::Array));
            }
            Token::Str(body) => {
                push_quoted(&mut self.out, &body);
                self.finish_scalar_root();
            }
            Token::Number(raw) => {
                match normalize_number(&raw) {
                    Some(number) => self.out.push_str(&number),
                    None => push_quoted(&mut self.out, &escape_plain(&raw)),
                }
                self.finish_scalar_root();
            }
            Token::Word(word) => {
                match word.as_str() {
                    "true" | "True" => self.out.push_str("true"),
                    "false" | "False" => self.out.push_str("false"),
                    "null" | "None" | "undefined" | "NaN" => self.out.push_str("null"),
                    _ => push_quoted(&mut self.out, &escape_plain(&word)),
                }
                self.finish_scalar_root();
            }
            Token::CloseObject | Token::CloseArray | Token::Colon | Token::Comma => {}
        }
    }

    fn finish_scalar_root(&mut self) {
        if self.stack.is_empty() {
            self.root_done = true;
        }
    }

    fn close(&mut self, kind: Kind) {
        if !self.stack.iter().any(|f| f.kind == kind) {
            // stray closer
            return;
        }
        while let Some(frame) = self.stack.pop() {
            self.close_frame(&frame);
            if frame.kind == kind {
                break;
            }
        }
        if self.stack.is_empty() {
            self.root_done = true;
        }
    }

    fn close_frame(&mut self, frame: &Frame) {
        if frame.kind == Kind::Object {
            match frame.expect {
                Expect::Colon => self.out.push_str(":null"),
                Expect::Value => self.out.push_str("null"),
                _ => {}
            }
            self.out.push('}');
        } else {
            self.out.push(']');
        }
    }

    fn finish(mut self) -> String {
        while let Some(frame) = self.stack.pop() {
            self.close_frame(&frame);
        }
        self.out
    }
}

fn push_quoted(out: &mut String, body: &str) {
    out.push('"');
    out.push_str(body);
    out.push('"');
}

fn escape_plain(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn normalize_number(raw: &str) -> Option<String> {
    let mut number = raw.trim_start_matches('+').to_string();
    if number.starts_with('.') {
        number.insert(0, '0');
    } else if number.starts_with("-.") {
        number.insert(1, '0');
    }
    if number.ends_with('.') {
        number.push('0');
    }
    let valid = number.parse::<f64>().is_ok()
        && number.chars().any(|c| c.is_ascii_digit())
        && !number.contains("..");
    valid.then_some(number)
}

/// Rewrite near-valid JSON text as strict JSON text.
pub fn repair_json(text: &str) -> String {
    let mut emitter = Emitter::new();
    for token in Lexer::new(text).tokens() {
        emitter.feed(token);
    }
    emitter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn repaired(text: &str) -> Value {
        let fixed = repair_json(text);
        serde_json::from_str(&fixed).unwrap_or_else(|e| panic!("{fixed:?} did not parse: {e}"))
    }

    #[test]
    fn test_valid_json_unchanged() {
        let text = r#"{"message": "ok", "steps": [{"title": "a", "details": "b"}], "n": -1.5e3}"#;
        let expected: Value = serde_json::from_str(text).unwrap();
        assert_eq!(repaired(text), expected);
    }

    #[test]
    fn test_trailing_commas() {
        assert_eq!(repaired(r#"{"a": 1, "b": [1, 2,],}"#), json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_unquoted_keys_and_single_quotes() {
        assert_eq!(repaired("{message: 'don\\'t', ok: True}"), json!({"message": "don't", "ok": true}));
    }

    #[test]
    fn test_unterminated_string_and_containers() {
        assert_eq!(
            repaired(r#"{"message": "cut off here"#),
            json!({"message": "cut off here"})
        );
        assert_eq!(
            repaired(r#"{"steps": [{"title": "a", "details": "b"}"#),
            json!({"steps": [{"title": "a", "details": "b"}]})
        );
    }

    #[test]
    fn test_raw_newlines_in_strings() {
        assert_eq!(repaired("{\"message\": \"line1\nline2\"}"), json!({"message": "line1\nline2"}));
    }

    #[test]
    fn test_missing_commas_and_values() {
        assert_eq!(repaired(r#"{"a": 1 "b": 2}"#), json!({"a": 1, "b": 2}));
        assert_eq!(repaired(r#"{"a": }"#), json!({"a": null}));
        assert_eq!(repaired(r#"{"a" }"#), json!({"a": null}));
    }

    #[test]
    fn test_comments_removed() {
        let text = "{\n  \"arraydim\": 1, // default: 1\n  /* note */ \"value\": 0\n}";
        assert_eq!(repaired(text), json!({"arraydim": 1, "value": 0}));
    }

    #[test]
    fn test_mismatched_closer() {
        assert_eq!(repaired(r#"{"views": [{"id": "v1"]}"#), json!({"views": [{"id": "v1"}]}));
    }

    #[test]
    fn test_trailing_garbage_ignored() {
        assert_eq!(repaired(r#"{"a": 1} {"b": 2}"#), json!({"a": 1}));
    }

    #[test]
    fn test_loose_numbers_and_words() {
        assert_eq!(
            repaired("{x: .5, y: +3, z: 4., w: None, v: hello}"),
            json!({"x": 0.5, "y": 3, "z": 4.0, "w": null, "v": "hello"})
        );
    }
}
