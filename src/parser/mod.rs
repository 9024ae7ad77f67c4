pub mod ast;
pub mod error;
pub mod operators;

use std::rc::Rc;

use lasso::Rodeo;

use crate::{
    lexer::{error::LexerError, tokens::Token, unescape, Lexer},
    source::{CodeArea, CodeSpan, ScriptSource},
};

use self::{
    ast::{
        AssignTarget, Block, ExprNode, ExprType, FunctionDecl, Param, Program, StmtNode,
        StmtType, StructDecl, TypeNode,
    },
    error::ParserError,
};

pub type ParseResult<T> = Result<T, ParserError>;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    src: Rc<ScriptSource>,
    interner: &'a mut Rodeo,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>, src: &Rc<ScriptSource>, interner: &'a mut Rodeo) -> Self {
        Self {
            lexer,
            src: src.clone(),
            interner,
        }
    }

    pub fn change_next_result(&self, v: Result<Option<Token>, LexerError>) -> ParseResult<Token> {
        v.map(|v| v.unwrap_or(Token::Eof))
            .map_err(|v| ParserError::LexingError {
                error: v,
                area: self.make_area(self.span()),
            })
    }

    pub fn next(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next();
        self.change_next_result(next)
    }
    pub fn peek(&self) -> ParseResult<Token> {
        let mut peek = self.lexer.clone();
        self.change_next_result(peek.next())
    }
    pub fn peek_span(&self) -> ParseResult<CodeSpan> {
        let mut peek = self.lexer.clone();
        self.change_next_result(peek.next())?;
        Ok(peek.span())
    }
    pub fn span(&self) -> CodeSpan {
        self.lexer.span()
    }
    pub fn slice(&self) -> &'a str {
        self.lexer.slice()
    }

    pub fn make_area(&self, span: CodeSpan) -> CodeArea {
        CodeArea {
            span,
            src: self.src.clone(),
        }
    }

    pub fn next_is(&self, tok: Token) -> ParseResult<bool> {
        Ok(self.peek()? == tok)
    }
    pub fn skip_tok(&mut self, tok: Token) -> ParseResult<bool> {
        if self.next_is(tok)? {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }
    pub fn expect_tok(&mut self, tok: Token) -> ParseResult<()> {
        let next = self.next()?;
        if next != tok {
            return Err(ParserError::UnexpectedToken {
                expected: tok.to_str(),
                found: next,
                area: self.make_area(self.span()),
            });
        }
        Ok(())
    }
    fn expect_ident(&mut self) -> ParseResult<(lasso::Spur, CodeSpan)> {
        self.expect_tok(Token::Identifier)?;
        let name = self.interner.get_or_intern(self.slice());
        Ok((name, self.span()))
    }

    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut stmts = vec![];
        while !self.next_is(Token::Eof)? {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program {
            stmts,
            span: (0..self.src.code().len()).into(),
        })
    }

    pub fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect_tok(Token::OpenBracket)?;
        let start = self.span();
        let mut stmts = vec![];
        while !self.skip_tok(Token::ClosedBracket)? {
            if self.next_is(Token::Eof)? {
                self.expect_tok(Token::ClosedBracket)?;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Block {
            stmts,
            span: start.extended(self.span()),
        })
    }

    fn parse_type(&mut self) -> ParseResult<TypeNode> {
        let (name, span) = self.expect_ident()?;
        Ok(TypeNode { name, span })
    }

    fn parse_function(&mut self, inline: bool) -> ParseResult<FunctionDecl> {
        self.expect_tok(Token::Fun)?;
        let start = self.span();
        let (name, _) = self.expect_ident()?;

        self.expect_tok(Token::OpenParen)?;
        let mut receiver = None;
        let mut params = vec![];
        while !self.skip_tok(Token::ClosedParen)? {
            let (pname, pspan) = self.expect_ident()?;
            if params.is_empty()
                && receiver.is_none()
                && self.interner.resolve(&pname) == "self"
                && !self.next_is(Token::Colon)?
            {
                receiver = Some(pspan);
            } else {
                self.expect_tok(Token::Colon)?;
                let typ = self.parse_type()?;
                let default = if self.skip_tok(Token::Assign)? {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param {
                    name: pname,
                    typ,
                    default,
                    span: pspan.extended(self.span()),
                });
            }
            if !self.skip_tok(Token::Comma)? {
                self.expect_tok(Token::ClosedParen)?;
                break;
            }
        }

        let ret = if self.skip_tok(Token::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;

        Ok(FunctionDecl {
            name,
            inline,
            receiver,
            params,
            ret,
            span: start.extended(body.span),
            body,
        })
    }

    fn parse_struct(&mut self) -> ParseResult<StructDecl> {
        self.expect_tok(Token::Struct)?;
        let (name, _) = self.expect_ident()?;
        self.expect_tok(Token::OpenBracket)?;
        let start = self.span();

        let mut fields = vec![];
        let mut methods = vec![];
        loop {
            match self.peek()? {
                Token::ClosedBracket => {
                    self.next()?;
                    break;
                }
                Token::Fun => methods.push(self.parse_function(false)?),
                Token::Inline => {
                    self.next()?;
                    methods.push(self.parse_function(true)?)
                }
                _ => {
                    let (field, _) = self.expect_ident()?;
                    self.expect_tok(Token::Colon)?;
                    fields.push((field, self.parse_type()?));
                    if !self.skip_tok(Token::Semicolon)? {
                        self.skip_tok(Token::Comma)?;
                    }
                }
            }
        }

        Ok(StructDecl {
            name,
            fields,
            methods,
            body_span: start.extended(self.span()),
        })
    }

    fn parse_if(&mut self) -> ParseResult<StmtNode> {
        self.expect_tok(Token::If)?;
        let start = self.span();
        self.expect_tok(Token::OpenParen)?;
        let cond = self.parse_expr()?;
        self.expect_tok(Token::ClosedParen)?;
        let then = self.parse_block()?;

        let otherwise = if self.skip_tok(Token::Else)? {
            if self.next_is(Token::If)? {
                let nested = self.parse_if()?;
                Some(Block {
                    span: nested.span,
                    stmts: vec![nested],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(StmtNode {
            typ: StmtType::If {
                cond,
                then,
                otherwise,
            },
            span: start.extended(self.span()),
        })
    }

    fn to_target(&self, expr: ExprNode) -> ParseResult<AssignTarget> {
        let invalid = |span| ParserError::InvalidAssignTarget {
            area: self.make_area(span),
        };
        match expr.typ {
            ExprType::Var(var) => Ok(AssignTarget::Path { var, path: vec![] }),
            ExprType::Member { base, member } => match self.to_target(*base)? {
                AssignTarget::Path { var, mut path } => {
                    path.push(member);
                    Ok(AssignTarget::Path { var, path })
                }
                AssignTarget::Index { .. } => Err(invalid(expr.span)),
            },
            ExprType::Index { base, index } => match base.typ {
                ExprType::Var(var) => Ok(AssignTarget::Index { var, index: *index }),
                _ => Err(invalid(expr.span)),
            },
            _ => Err(invalid(expr.span)),
        }
    }

    pub fn parse_stmt(&mut self) -> ParseResult<StmtNode> {
        let start = self.peek_span()?;

        let stmt = match self.peek()? {
            Token::Fun => {
                let decl = self.parse_function(false)?;
                StmtNode {
                    span: decl.span,
                    typ: StmtType::Function(decl),
                }
            }
            Token::Inline => {
                self.next()?;
                let decl = self.parse_function(true)?;
                StmtNode {
                    span: start.extended(decl.span),
                    typ: StmtType::Function(decl),
                }
            }
            Token::Struct => {
                let decl = self.parse_struct()?;
                StmtNode {
                    typ: StmtType::Struct(decl),
                    span: start.extended(self.span()),
                }
            }
            Token::If => self.parse_if()?,
            Token::While => {
                self.next()?;
                self.expect_tok(Token::OpenParen)?;
                let cond = self.parse_expr()?;
                self.expect_tok(Token::ClosedParen)?;
                let body = self.parse_block()?;
                StmtNode {
                    typ: StmtType::While { cond, body },
                    span: start.extended(self.span()),
                }
            }
            Token::For => {
                self.next()?;
                self.expect_tok(Token::OpenParen)?;
                let (var, var_span) = self.expect_ident()?;
                self.expect_tok(Token::In)?;
                let iter = self.parse_expr()?;
                self.expect_tok(Token::ClosedParen)?;
                let body = self.parse_block()?;
                StmtNode {
                    typ: StmtType::For {
                        var,
                        var_span,
                        iter,
                        body,
                    },
                    span: start.extended(self.span()),
                }
            }
            Token::Return => {
                self.next()?;
                let value = match self.peek()? {
                    Token::Semicolon | Token::ClosedBracket | Token::Eof => None,
                    _ => Some(self.parse_expr()?),
                };
                StmtNode {
                    typ: StmtType::Return(value),
                    span: start.extended(self.span()),
                }
            }
            Token::Const => {
                self.next()?;
                let (name, _) = self.expect_ident()?;
                self.expect_tok(Token::Assign)?;
                let value = self.parse_expr()?;
                StmtNode {
                    typ: StmtType::Const(name, value),
                    span: start.extended(self.span()),
                }
            }
            Token::OpenBracket => {
                let block = self.parse_block()?;
                StmtNode {
                    span: block.span,
                    typ: StmtType::Block(block),
                }
            }
            _ => self.parse_expr_stmt(start)?,
        };

        self.skip_tok(Token::Semicolon)?;
        Ok(stmt)
    }

    fn parse_expr_stmt(&mut self, start: CodeSpan) -> ParseResult<StmtNode> {
        let expr = self.parse_expr()?;

        let typ = match (self.peek()?, &expr.typ) {
            (Token::Assign, _) => {
                self.next()?;
                let target = self.to_target(expr)?;
                StmtType::Assign(target, self.parse_expr()?)
            }
            (Token::Comma, ExprType::Var(first)) => {
                let mut names = vec![(*first, expr.span)];
                while self.skip_tok(Token::Comma)? {
                    names.push(self.expect_ident()?);
                }
                self.expect_tok(Token::Assign)?;
                StmtType::MultiAssign(names, self.parse_expr()?)
            }
            (tok, _) => match tok.to_assign_op() {
                Some(op) => {
                    self.next()?;
                    let target = self.to_target(expr)?;
                    StmtType::AssignOp(target, op, self.parse_expr()?)
                }
                None => StmtType::Expr(expr),
            },
        };

        Ok(StmtNode {
            typ,
            span: start.extended(self.span()),
        })
    }

    fn parse_args(&mut self, close: Token) -> ParseResult<Vec<ExprNode>> {
        let mut args = vec![];
        while !self.skip_tok(close)? {
            args.push(self.parse_expr()?);
            if !self.skip_tok(Token::Comma)? {
                self.expect_tok(close)?;
                break;
            }
        }
        Ok(args)
    }

    pub fn parse_unit(&mut self) -> ParseResult<ExprNode> {
        let t = self.next()?;
        let start = self.span();
        Ok(ExprNode {
            typ: match t {
                Token::Int => {
                    let literal = self.slice();
                    let value = literal
                        .parse()
                        .map_err(|_| ParserError::InvalidLiteral {
                            literal: literal.into(),
                            area: self.make_area(start),
                        })?;
                    ExprType::Int(value)
                }
                Token::Decimal => {
                    let literal = self.slice();
                    let value = literal
                        .parse()
                        .map_err(|_| ParserError::InvalidLiteral {
                            literal: literal.into(),
                            area: self.make_area(start),
                        })?;
                    ExprType::Decimal(value)
                }
                Token::True => ExprType::Bool(true),
                Token::False => ExprType::Bool(false),
                Token::Null => ExprType::Null,
                Token::String => ExprType::String(unescape(self.slice())),
                Token::Identifier => ExprType::Var(self.interner.get_or_intern(self.slice())),

                Token::OpenParen => {
                    let inner = self.parse_expr()?;
                    self.expect_tok(Token::ClosedParen)?;
                    inner.typ
                }
                Token::OpenSqBracket => ExprType::Array(self.parse_args(Token::ClosedSqBracket)?),

                t => {
                    return Err(ParserError::UnexpectedToken {
                        expected: "expression",
                        found: t,
                        area: self.make_area(self.span()),
                    })
                }
            },
            span: start.extended(self.span()),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<ExprNode> {
        let mut value = self.parse_unit()?;
        loop {
            let typ = match self.peek()? {
                Token::OpenParen => {
                    self.next()?;
                    ExprType::Call {
                        args: self.parse_args(Token::ClosedParen)?,
                        base: Box::new(value),
                    }
                }
                Token::Period => {
                    self.next()?;
                    let (member, _) = self.expect_ident()?;
                    ExprType::Member {
                        base: Box::new(value),
                        member,
                    }
                }
                Token::OpenSqBracket => {
                    self.next()?;
                    let index = self.parse_expr()?;
                    self.expect_tok(Token::ClosedSqBracket)?;
                    ExprType::Index {
                        base: Box::new(value),
                        index: Box::new(index),
                    }
                }
                _ => return Ok(value),
            };
            let span = value_span(&typ).extended(self.span());
            value = ExprNode { typ, span };
        }
    }

    pub fn parse_value(&mut self) -> ParseResult<ExprNode> {
        match self.peek()?.to_unary_op() {
            Some(op) => {
                self.next()?;
                let start = self.span();
                let val = self.parse_value()?;
                Ok(ExprNode {
                    span: start.extended(val.span),
                    typ: ExprType::Unary(op, Box::new(val)),
                })
            }
            None => self.parse_postfix(),
        }
    }

    pub fn parse_expr(&mut self) -> ParseResult<ExprNode> {
        self.parse_op(0)
    }

    pub fn parse_op(&mut self, prec: usize) -> ParseResult<ExprNode> {
        let next_prec = operators::next_infix(prec);

        let mut left = match next_prec {
            Some(next_prec) => self.parse_op(next_prec)?,
            None => self.parse_value()?,
        };

        while operators::is_infix_prec(self.peek()?, prec) {
            let op = self.next()?;

            let right = match next_prec {
                Some(next_prec) => self.parse_op(next_prec)?,
                None => self.parse_value()?,
            };
            let new_span = left.span.extended(right.span);
            left = ExprNode {
                typ: ExprType::Op(
                    Box::new(left),
                    op.to_bin_op().expect("infix tokens are binary operators"),
                    Box::new(right),
                ),
                span: new_span,
            }
        }
        Ok(left)
    }
}

fn value_span(typ: &ExprType) -> CodeSpan {
    match typ {
        ExprType::Call { base, .. } | ExprType::Member { base, .. } | ExprType::Index { base, .. } => {
            base.span
        }
        _ => CodeSpan::ZEROSPAN,
    }
}

/// Parses a whole script, interning identifiers into `interner`.
pub fn parse_source(src: &Rc<ScriptSource>, interner: &mut Rodeo) -> ParseResult<Program> {
    let lexer = Lexer::new(src.code());
    Parser::new(lexer, src, interner).parse()
}

#[cfg(test)]
mod tests;
