use crate::error::{ExprError, Result};
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

/// Splits `src` into tokens, always ending with [`TokenKind::Eof`].
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Token> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((pos, c)) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.src.len(),
            });
        };

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '!' => self.pair('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.pair('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.pair('=', TokenKind::Ge, TokenKind::Gt),
            '=' => self.required('=', TokenKind::EqEq, pos, "'=' (did you mean '=='?)")?,
            '&' => self.required('&', TokenKind::AndAnd, pos, "'&' (did you mean '&&'?)")?,
            '|' => self.required('|', TokenKind::OrOr, pos, "'|' (did you mean '||'?)")?,
            '"' => self.string(pos)?,
            '.' if self.peek_is(|c| c.is_ascii_digit()) => self.number(pos)?,
            '.' => TokenKind::Dot,
            c if c.is_ascii_digit() => self.number(pos)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.ident(pos),
            other => {
                return Err(ExprError::Syntax {
                    pos,
                    message: format!("unexpected character {other:?}"),
                })
            }
        };
        Ok(Token { kind, pos })
    }

    fn peek_is(&mut self, f: impl Fn(char) -> bool) -> bool {
        self.chars.peek().is_some_and(|&(_, c)| f(c))
    }

    fn pair(&mut self, next: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.chars.next_if(|&(_, c)| c == next).is_some() {
            matched
        } else {
            single
        }
    }

    fn required(&mut self, next: char, kind: TokenKind, pos: usize, what: &str) -> Result<TokenKind> {
        if self.chars.next_if(|&(_, c)| c == next).is_some() {
            Ok(kind)
        } else {
            Err(ExprError::Syntax {
                pos,
                message: format!("unexpected {what}"),
            })
        }
    }

    /// Byte offset of the next unread character.
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn ident(&mut self, start: usize) -> TokenKind {
        while self
            .chars
            .next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_')
            .is_some()
        {}
        match &self.src[start..self.offset()] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            name => TokenKind::Ident(name.to_string()),
        }
    }

    fn digits(&mut self) -> usize {
        let mut count = 0;
        while self.chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {
            count += 1;
        }
        count
    }

    /// `123`, `1.5`, `.5`, `2.`, `1e3`, `2.5E-2`. The first character has
    /// already been consumed.
    fn number(&mut self, start: usize) -> Result<TokenKind> {
        let leading_dot = self.src[start..].starts_with('.');
        self.digits();
        if !leading_dot && self.chars.next_if(|&(_, c)| c == '.').is_some() {
            self.digits();
        }
        if self.chars.next_if(|&(_, c)| c == 'e' || c == 'E').is_some() {
            self.chars.next_if(|&(_, c)| c == '+' || c == '-');
            if self.digits() == 0 {
                return Err(ExprError::Syntax {
                    pos: self.offset(),
                    message: "exponent has no digits".to_string(),
                });
            }
        }
        let text = &self.src[start..self.offset()];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|e| ExprError::Syntax {
                pos: start,
                message: format!("invalid number {text:?}: {e}"),
            })
    }

    fn string(&mut self, start: usize) -> Result<TokenKind> {
        let mut value = String::new();
        loop {
            let Some((pos, c)) = self.chars.next() else {
                return Err(ExprError::Syntax {
                    pos: start,
                    message: "string literal not terminated".to_string(),
                });
            };
            match c {
                '"' => return Ok(TokenKind::Str(value)),
                '\\' => {
                    let escaped = match self.chars.next() {
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, 'r')) => '\r',
                        Some((_, '"')) => '"',
                        Some((_, '\\')) => '\\',
                        _ => {
                            return Err(ExprError::Syntax {
                                pos,
                                message: "unknown escape sequence".to_string(),
                            })
                        }
                    };
                    value.push(escaped);
                }
                '\n' => {
                    return Err(ExprError::Syntax {
                        pos: start,
                        message: "newline in string".to_string(),
                    })
                }
                c => value.push(c),
            }
        }
    }
}
