use lazy_static::lazy_static;
use maplit::hashmap;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub line: i32,
}

impl Token {
    /// The source text this token stands for, as used in diagnostics.
    pub fn lexeme(&self) -> String {
        self.token_type.to_string()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[allow(non_camel_case_types)]
pub enum TokenType {
    // Single-character tokens.
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,
    QUESTION,
    COLON,

    // One or two character tokens.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    // Literals.
    IDENTIFIER(String),
    STRING(String),
    NUMBER(f64),

    // Keywords.
    AND,
    BREAK,
    CLASS,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,

    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,

    EOF,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LEFT_PAREN => write!(f, "("),
            Self::RIGHT_PAREN => write!(f, ")"),
            Self::LEFT_BRACE => write!(f, "{{"),
            Self::RIGHT_BRACE => write!(f, "}}"),
            Self::COMMA => write!(f, ","),
            Self::DOT => write!(f, "."),
            Self::MINUS => write!(f, "-"),
            Self::PLUS => write!(f, "+"),
            Self::SEMICOLON => write!(f, ";"),
            Self::SLASH => write!(f, "/"),
            Self::STAR => write!(f, "*"),
            Self::QUESTION => write!(f, "?"),
            Self::COLON => write!(f, ":"),
            Self::BANG => write!(f, "!"),
            Self::BANG_EQUAL => write!(f, "!="),
            Self::EQUAL => write!(f, "="),
            Self::EQUAL_EQUAL => write!(f, "=="),
            Self::GREATER => write!(f, ">"),
            Self::GREATER_EQUAL => write!(f, ">="),
            Self::LESS => write!(f, "<"),
            Self::LESS_EQUAL => write!(f, "<="),
            Self::IDENTIFIER(name) => write!(f, "{}", name),
            Self::STRING(value) => write!(f, "\"{}\"", value),
            Self::NUMBER(value) => write!(f, "{}", value),
            Self::AND => write!(f, "and"),
            Self::BREAK => write!(f, "break"),
            Self::CLASS => write!(f, "class"),
            Self::ELSE => write!(f, "else"),
            Self::FALSE => write!(f, "false"),
            Self::FUN => write!(f, "fun"),
            Self::FOR => write!(f, "for"),
            Self::IF => write!(f, "if"),
            Self::NIL => write!(f, "nil"),
            Self::OR => write!(f, "or"),
            Self::PRINT => write!(f, "print"),
            Self::RETURN => write!(f, "return"),
            Self::SUPER => write!(f, "super"),
            Self::THIS => write!(f, "this"),
            Self::TRUE => write!(f, "true"),
            Self::VAR => write!(f, "var"),
            Self::WHILE => write!(f, "while"),
            Self::EOF => write!(f, ""),
        }
    }
}

lazy_static! {
    pub static ref KEYWORDS: HashMap<&'static str, TokenType> = hashmap! {
        "and" => TokenType::AND,
        "break" => TokenType::BREAK,
        "class" => TokenType::CLASS,
        "else" => TokenType::ELSE,
        "false" => TokenType::FALSE,
        "fun" => TokenType::FUN,
        "for" => TokenType::FOR,
        "if" => TokenType::IF,
        "nil" => TokenType::NIL,
        "or" => TokenType::OR,

        "print" => TokenType::PRINT,
        "return" => TokenType::RETURN,
        "super" => TokenType::SUPER,
        "this" => TokenType::THIS,
        "true" => TokenType::TRUE,
        "var" => TokenType::VAR,
        "while" => TokenType::WHILE,
    };
}
