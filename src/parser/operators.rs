use crate::lexer::tokens::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,

    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,

    And,
    Or,
}

impl BinOp {
    pub fn to_str(self) -> &'static str {
        match self {
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Mult => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Minus,
}

const INFIX: &[&[Token]] = &[
    &[Token::Or],
    &[Token::And],
    &[Token::Eq, Token::NotEq],
    &[Token::Lt, Token::Lte, Token::Gt, Token::Gte],
    &[Token::Plus, Token::Minus],
    &[Token::Mult, Token::Div, Token::Mod],
];

pub fn next_infix(prec: usize) -> Option<usize> {
    (prec + 1 < INFIX.len()).then_some(prec + 1)
}

pub fn is_infix_prec(tok: Token, prec: usize) -> bool {
    INFIX.get(prec).is_some_and(|toks| toks.contains(&tok))
}

impl Token {
    pub fn to_bin_op(self) -> Option<BinOp> {
        Some(match self {
            Token::Plus => BinOp::Plus,
            Token::Minus => BinOp::Minus,
            Token::Mult => BinOp::Mult,
            Token::Div => BinOp::Div,
            Token::Mod => BinOp::Mod,
            Token::Eq => BinOp::Eq,
            Token::NotEq => BinOp::NotEq,
            Token::Gt => BinOp::Gt,
            Token::Gte => BinOp::Gte,
            Token::Lt => BinOp::Lt,
            Token::Lte => BinOp::Lte,
            Token::And => BinOp::And,
            Token::Or => BinOp::Or,
            _ => return None,
        })
    }
    pub fn to_assign_op(self) -> Option<BinOp> {
        Some(match self {
            Token::PlusEq => BinOp::Plus,
            Token::MinusEq => BinOp::Minus,
            Token::MultEq => BinOp::Mult,
            Token::DivEq => BinOp::Div,
            Token::ModEq => BinOp::Mod,
            _ => return None,
        })
    }
    pub fn to_unary_op(self) -> Option<UnaryOp> {
        match self {
            Token::Not => Some(UnaryOp::Not),
            Token::Minus => Some(UnaryOp::Minus),
            _ => None,
        }
    }
}
