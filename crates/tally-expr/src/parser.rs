//! Recursive descent over the token stream. Precedence, lowest first:
//! `||`, `&&`, comparisons, `+ -`, `* /`, unary `- !`.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::Value;

/// Deepest tree the parser builds. Evaluation recurses once per level.
pub(crate) const MAX_DEPTH: usize = 128;

pub(crate) fn parse(src: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        cursor: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ExprError::Syntax {
            pos: trailing.pos,
            message: format!("unexpected {} after expression", describe(&trailing.kind)),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    /// Upper bound on the depth of the node being built.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof and the cursor never moves past it
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn nest(&mut self, pos: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Syntax {
                pos,
                message: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn binary(
        &mut self,
        next: fn(&mut Self) -> Result<Expr>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let outer = self.depth;
        let mut lhs = next(self)?;
        // each operator in a chain adds a level on top of the previous ones
        while let Some(op) = op_for(&self.peek().kind) {
            let pos = self.advance().pos;
            self.nest(pos)?;
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr> {
        self.binary(Self::and, |k| (*k == TokenKind::OrOr).then_some(BinaryOp::Or))
    }

    fn and(&mut self) -> Result<Expr> {
        self.binary(Self::comparison, |k| {
            (*k == TokenKind::AndAnd).then_some(BinaryOp::And)
        })
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary(Self::additive, |k| match k {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary(Self::multiplicative, |k| match k {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary(Self::unary, |k| match k {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        let Some(op) = op else {
            return self.primary();
        };
        let pos = self.advance().pos;
        self.nest(pos)?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            pos,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(v) => Ok(Expr::Literal(Value::Float(v))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Ident(first) => self.selector(first, token.pos),
            TokenKind::LParen => {
                self.nest(token.pos)?;
                let inner = self.or()?;
                self.depth -= 1;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(ExprError::Syntax {
                        pos: close.pos,
                        message: format!("expected ')', found {}", describe(&close.kind)),
                    });
                }
                Ok(inner)
            }
            other => Err(ExprError::Syntax {
                pos: token.pos,
                message: format!("expected operand, found {}", describe(&other)),
            }),
        }
    }

    fn selector(&mut self, first: String, pos: usize) -> Result<Expr> {
        let mut segments = vec![first];
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            let segment = self.advance();
            match segment.kind {
                TokenKind::Ident(name) => segments.push(name),
                other => {
                    return Err(ExprError::Syntax {
                        pos: segment.pos,
                        message: format!("expected name after '.', found {}", describe(&other)),
                    })
                }
            }
        }
        let name = segments.join("_");
        let folded = (segments.len() > 1)
            .then(|| name.to_lowercase())
            .filter(|lower| *lower != name);
        Ok(Expr::Ident { name, folded, pos })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Eof => "end of expression".to_string(),
        TokenKind::Number(v) => format!("number {v}"),
        TokenKind::Str(s) => format!("string {s:?}"),
        TokenKind::Ident(name) => format!("name {name}"),
        TokenKind::True => "true".to_string(),
        TokenKind::False => "false".to_string(),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Bang => "'!'".to_string(),
        TokenKind::AndAnd => "'&&'".to_string(),
        TokenKind::OrOr => "'||'".to_string(),
        TokenKind::EqEq => "'=='".to_string(),
        TokenKind::NotEq => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
    }
}
