use crate::tokens::{Token, TokenType};

pub trait LoxError {
    fn error(&mut self, line: i32, message: &str);

    fn error_on_token(&mut self, token: &Token, message: &str) {
        if token.token_type == TokenType::EOF {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme()), message);
        }
    }

    fn report(&mut self, line: i32, wh: &str, message: &str);

    fn has_error(&self) -> bool;
}
