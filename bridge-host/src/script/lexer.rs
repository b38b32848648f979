//! Script lexer (tokenizer).

use alloc::string::String;
use alloc::vec::Vec;

use super::error::{ScriptError, ScriptResult};
use super::token::{Span, Token, TokenKind};

/// Script lexer.
pub struct Lexer<'a> {
    /// Source code.
    source: &'a str,
    /// Current byte position.
    pos: usize,
    /// Current line (1-based).
    line: usize,
    /// Current column (1-based).
    column: usize,
    /// Start of current token.
    token_start: usize,
    /// Start line of current token.
    token_line: usize,
    /// Start column of current token.
    token_column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            pos: 0,
            line: 1,
            column: 1,
            token_start: 0,
            token_line: 1,
            token_column: 1,
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(&mut self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> ScriptResult<Token> {
        self.skip_whitespace_and_comments()?;

        self.token_start = self.pos;
        self.token_line = self.line;
        self.token_column = self.column;

        let ch = match self.current() {
            Some(ch) => ch,
            None => return Ok(self.make_token(TokenKind::Eof)),
        };

        if ch.is_ascii_digit() || (ch == '.' && self.peek().is_some_and(|c| c.is_ascii_digit())) {
            return self.scan_number();
        }
        if ch == '"' || ch == '\'' {
            return self.scan_string(ch);
        }
        if ch == '`' {
            return Err(self.error("template literals are not supported"));
        }
        if is_id_start(ch) {
            return Ok(self.scan_identifier());
        }
        self.scan_punctuator(ch)
    }

    fn current(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.current() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(self.token_start, self.pos, self.token_line, self.token_column),
        )
    }

    fn error(&self, msg: &str) -> ScriptError {
        ScriptError::syntax(alloc::format!(
            "{} at {}:{}",
            msg,
            self.token_line,
            self.token_column
        ))
    }

    /// Skip whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) -> ScriptResult<()> {
        loop {
            while self.current().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.current() == Some('/') && self.peek() == Some('/') {
                while self.current().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.current() == Some('/') && self.peek() == Some('*') {
                self.token_line = self.line;
                self.token_column = self.column;
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.current() == Some('/') => {
                            self.advance();
                            break;
                        }
                        Some(_) => {}
                        None => return Err(self.error("unterminated comment")),
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    /// Scan a number literal.
    fn scan_number(&mut self) -> ScriptResult<Token> {
        if self.current() == Some('0') {
            let radix = match self.peek() {
                Some('x') | Some('X') => 16,
                Some('b') | Some('B') => 2,
                Some('o') | Some('O') => 8,
                _ => 10,
            };
            if radix != 10 {
                self.advance();
                self.advance();
                let digits = self.take_while(|c| c.is_digit(radix) || c == '_');
                let digits: String = digits.chars().filter(|&c| c != '_').collect();
                let value = u64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("invalid number literal"))?;
                if self.eat('n') {
                    let value =
                        i64::try_from(value).map_err(|_| self.error("BigInt literal out of range"))?;
                    return Ok(self.make_token(TokenKind::BigInt(value)));
                }
                return Ok(self.make_token(TokenKind::Number(value as f64)));
            }
        }

        let mut text: String = self.take_while(|c| c.is_ascii_digit() || c == '_');
        let mut integral = true;
        if self.current() == Some('.') {
            integral = false;
            self.advance();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit() || c == '_'));
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            integral = false;
            self.advance();
            text.push('e');
            if let Some(sign @ ('+' | '-')) = self.current() {
                self.advance();
                text.push(sign);
            }
            let exponent = self.take_while(|c| c.is_ascii_digit());
            if exponent.is_empty() {
                return Err(self.error("missing exponent"));
            }
            text.push_str(&exponent);
        }
        let text: String = text.chars().filter(|&c| c != '_').collect();

        if integral && self.eat('n') {
            let value = text
                .parse::<i64>()
                .map_err(|_| self.error("BigInt literal out of range"))?;
            return Ok(self.make_token(TokenKind::BigInt(value)));
        }
        if self.current().is_some_and(is_id_start) {
            return Err(self.error("identifier starts immediately after number"));
        }
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error("invalid number literal"))?;
        Ok(self.make_token(TokenKind::Number(value)))
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> String {
        let start = self.pos;
        while self.current().is_some_and(&pred) {
            self.advance();
        }
        String::from(&self.source[start..self.pos])
    }

    /// Scan a string literal.
    fn scan_string(&mut self, quote: char) -> ScriptResult<Token> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = self.scan_escape()?;
                    if let Some(c) = escaped {
                        value.push(c);
                    }
                }
                Some(c) => value.push(c),
            }
        }
        Ok(self.make_token(TokenKind::String(value)))
    }

    fn scan_escape(&mut self) -> ScriptResult<Option<char>> {
        let ch = self
            .advance()
            .ok_or_else(|| self.error("unterminated string literal"))?;
        let out = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            'x' => {
                let code = self.scan_hex_digits(2)?;
                char::from_u32(code).ok_or_else(|| self.error("invalid escape"))?
            }
            'u' => {
                let code = if self.eat('{') {
                    let digits = self.take_while(|c| c.is_ascii_hexdigit());
                    if !self.eat('}') {
                        return Err(self.error("invalid unicode escape"));
                    }
                    u32::from_str_radix(&digits, 16).map_err(|_| self.error("invalid unicode escape"))?
                } else {
                    self.scan_hex_digits(4)?
                };
                char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))?
            }
            other => other,
        };
        Ok(Some(out))
    }

    fn scan_hex_digits(&mut self, count: usize) -> ScriptResult<u32> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .advance()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hexadecimal escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        let word = self.take_while(is_id_continue);
        let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier(word));
        self.make_token(kind)
    }

    /// Scan a punctuator.
    fn scan_punctuator(&mut self, ch: char) -> ScriptResult<Token> {
        self.advance();
        let kind = match ch {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '?' => {
                if self.eat('?') {
                    TokenKind::QuestionQuestion
                } else {
                    TokenKind::Question
                }
            }
            '=' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictEqual
                    } else {
                        TokenKind::Equal
                    }
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictNotEqual
                    } else {
                        TokenKind::NotEqual
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::GreaterThan
                }
            }
            '+' => {
                if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::StarStar
                } else if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => TokenKind::Percent,
            '&' if self.eat('&') => TokenKind::AmpersandAmpersand,
            '|' if self.eat('|') => TokenKind::PipePipe,
            other => {
                return Err(self.error(&alloc::format!("unexpected character '{}'", other)));
            }
        };
        Ok(self.make_token(kind))
    }
}

fn is_id_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_id_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_arrow_function_tokens() {
        assert_eq!(
            kinds("(a, b) => a + b"),
            alloc::vec![
                TokenKind::LeftParen,
                TokenKind::Identifier("a".into()),
                TokenKind::Comma,
                TokenKind::Identifier("b".into()),
                TokenKind::RightParen,
                TokenKind::Arrow,
                TokenKind::Identifier("a".into()),
                TokenKind::Plus,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("0xff")[0], TokenKind::Number(255.0));
        assert_eq!(kinds("1_000")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5e3")[0], TokenKind::Number(2500.0));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("42n")[0], TokenKind::BigInt(42));
        assert!(Lexer::new("99999999999999999999n").tokenize().is_err());
        assert!(Lexer::new("3in").tokenize().is_err());
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'a\n\x41B\u{1F600}'"#)[0],
            TokenKind::String("a\nAB\u{1F600}".into())
        );
        assert!(Lexer::new("'open").tokenize().is_err());
    }

    #[test]
    fn test_operators_and_comments() {
        assert_eq!(
            kinds("a ?? b // tail\n/* x */ !== c ** 2"),
            alloc::vec![
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("b".into()),
                TokenKind::StrictNotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::StarStar,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("a # b").tokenize().unwrap_err();
        assert!(err.is_syntax());
        assert!(err.message().contains("1:3"));
    }
}
