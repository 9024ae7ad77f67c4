macro_rules! tokens {
    (
        $(
            $tok:ident: $name:literal,
        )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Token {
            $($tok,)*
        }

        impl Token {
            pub fn to_str(self) -> &'static str {
                match self {
                    $(
                        Self::$tok => $name,
                    )*
                }
            }
        }
    };
}

tokens! {
    Int: "int literal",
    Decimal: "decimal literal",
    String: "string literal",

    True: "true",
    False: "false",
    Null: "null",

    Identifier: "identifier",

    Plus: "+",
    Minus: "-",
    Mult: "*",
    Div: "/",
    Mod: "%",
    PlusEq: "+=",
    MinusEq: "-=",
    MultEq: "*=",
    DivEq: "/=",
    ModEq: "%=",

    Assign: "=",

    Eq: "==",
    NotEq: "!=",
    Gt: ">",
    Gte: ">=",
    Lt: "<",
    Lte: "<=",

    Not: "!",
    And: "&&",
    Or: "||",

    OpenParen: "(",
    ClosedParen: ")",
    OpenSqBracket: "[",
    ClosedSqBracket: "]",
    OpenBracket: "{",
    ClosedBracket: "}",

    If: "if",
    Else: "else",
    While: "while",
    For: "for",
    In: "in",

    Fun: "fun",
    Inline: "inline",
    Struct: "struct",
    Const: "const",
    Return: "return",

    Arrow: "->",

    Semicolon: ";",
    Colon: ":",
    Period: ".",
    Comma: ",",

    Eof: "end of file",
}
