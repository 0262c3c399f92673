use crate::lox_error::LoxError;
use crate::tokens::{Token, TokenType, KEYWORDS};
use itertools::peek_nth;
use take_until::TakeUntilExt;

pub fn scan_tokens(lox: &mut dyn LoxError, source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut chars = peek_nth(source.chars());

    while let Some(c) = chars.next() {
        match c {
            // Ignore white space
            ' ' | '\t' | '\r' => {}
            '\n' => line += 1,
            // Single-character tokens.
            '(' => tokens.push(Token {
                token_type: TokenType::LEFT_PAREN,
                line,
            }),
            ')' => tokens.push(Token {
                token_type: TokenType::RIGHT_PAREN,
                line,
            }),
            '{' => tokens.push(Token {
                token_type: TokenType::LEFT_BRACE,
                line,
            }),
            '}' => tokens.push(Token {
                token_type: TokenType::RIGHT_BRACE,
                line,
            }),
            ',' => tokens.push(Token {
                token_type: TokenType::COMMA,
                line,
            }),
            '.' => tokens.push(Token {
                token_type: TokenType::DOT,
                line,
            }),
            '-' => tokens.push(Token {
                token_type: TokenType::MINUS,
                line,
            }),
            '+' => tokens.push(Token {
                token_type: TokenType::PLUS,
                line,
            }),
            ';' => tokens.push(Token {
                token_type: TokenType::SEMICOLON,
                line,
            }),
            '*' => tokens.push(Token {
                token_type: TokenType::STAR,
                line,
            }),
            '?' => tokens.push(Token {
                token_type: TokenType::QUESTION,
                line,
            }),
            ':' => tokens.push(Token {
                token_type: TokenType::COLON,
                line,
            }),
            // One or two character tokens.
            '!' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };
                tokens.push(Token { token_type, line });
            }
            '=' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };
                tokens.push(Token { token_type, line });
            }
            '<' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };
                tokens.push(Token { token_type, line });
            }
            '>' => {
                let token_type = if chars.peek() == Some(&'=') {
                    chars.next();
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };
                tokens.push(Token { token_type, line });
            }
            // SLASH, line comment or nesting-counted multiline comment
            '/' => {
                if chars.peek() == Some(&'/') {
                    chars.next();
                    // Comment runs through the end of the line; count the
                    // newline only if the comment didn't hit EOF first.
                    (&mut chars)
                        .take_until(|c| *c == '\n')
                        .filter(|&c| c == '\n')
                        .for_each(|_| line += 1);
                } else if chars.peek() == Some(&'*') {
                    chars.next();
                    let mut depth = 1;
                    while depth > 0 {
                        match chars.next() {
                            None => {
                                lox.error(line, "Multiline comment not closed.");
                                break;
                            }
                            Some('\n') => line += 1,
                            Some('/') if chars.peek() == Some(&'*') => {
                                chars.next();
                                depth += 1;
                            }
                            Some('*') if chars.peek() == Some(&'/') => {
                                chars.next();
                                depth -= 1;
                            }
                            Some(_) => {}
                        }
                    }
                } else {
                    tokens.push(Token {
                        token_type: TokenType::SLASH,
                        line,
                    });
                }
            }
            // String literal; may span lines
            '"' => {
                let mut value = Vec::new();
                while chars.peek().is_some() && chars.peek() != Some(&'"') {
                    let x = chars.next();
                    value.push(x.unwrap());
                    if x == Some('\n') {
                        line += 1;
                    }
                }
                if chars.next().is_none() {
                    lox.error(line, "Unterminated string.");
                    break;
                }
                tokens.push(Token {
                    token_type: TokenType::STRING(value.into_iter().collect()),
                    line,
                });
            }
            // Number literal
            '0'..='9' => {
                let mut value = Vec::new();
                value.push(c);
                while chars.peek().is_some() && chars.peek().unwrap().is_ascii_digit() {
                    value.push(chars.next().unwrap());
                }
                if chars.peek() == Some(&'.')
                    && chars.peek_nth(1).is_some()
                    && chars.peek_nth(1).unwrap().is_ascii_digit()
                {
                    value.push(chars.next().unwrap());
                    while chars.peek().is_some() && chars.peek().unwrap().is_ascii_digit() {
                        value.push(chars.next().unwrap());
                    }
                }
                let string_value: String = value.into_iter().collect();
                match string_value.parse::<f64>() {
                    Ok(value) => tokens.push(Token {
                        token_type: TokenType::NUMBER(value),
                        line,
                    }),
                    Err(_) => lox.error(line, "Invalid number literal."),
                }
            }
            // Identifier or keyword
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut value = Vec::new();
                value.push(c);
                while chars.peek().is_some()
                    && (chars.peek().unwrap().is_ascii_alphanumeric() || chars.peek() == Some(&'_'))
                {
                    value.push(chars.next().unwrap());
                }
                let name: String = value.into_iter().collect();
                let token_type = match KEYWORDS.get(name.as_str()) {
                    Some(keyword) => keyword.clone(),
                    None => TokenType::IDENTIFIER(name),
                };
                tokens.push(Token { token_type, line });
            }
            _ => {
                lox.error(line, "Unexpected character.");
            }
        }
    }

    tokens.push(Token {
        token_type: TokenType::EOF,
        line,
    });
    tokens
}
