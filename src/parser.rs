// Lox Grammar
// program        → declaration* EOF ;
// declaration    → classDecl | funDecl | varDecl | statement ;
// classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
// funDecl        → "fun" function ;
// function       → IDENTIFIER "(" parameters? ")" block ;
// varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
// statement      → exprStmt | forStmt | ifStmt | printStmt | returnStmt
//                | whileStmt | breakStmt | block ;
//
// expression     → assignment ;
// assignment     → ( call "." )? IDENTIFIER "=" assignment | ternary ;
// ternary        → logic_or ( "?" expression ":" ternary )? ;
// logic_or       → logic_and ( "or" logic_and )* ;
// logic_and      → equality ( "and" equality )* ;
// equality       → comparison ( ( "!=" | "==" ) comparison )* ;
// comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
// term           → factor ( ( "-" | "+" ) factor )* ;
// factor         → unary ( ( "/" | "*" ) unary )* ;
// unary          → ( "!" | "-" ) unary | call ;
// call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
// primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
//                | IDENTIFIER | "(" expression ")" | "super" "." IDENTIFIER ;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::lox_error::LoxError;
use crate::tokens::{Token, TokenType};
use derive_more::Display;
use std::mem;
use std::rc::Rc;

/// Sentinel raised on malformed syntax; the recovery path catches it at
/// statement granularity and synchronizes.
#[derive(Debug, Display)]
#[display(fmt = "parse error")]
pub struct ParseError;

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    next_id: ExprId,
    lox: &'a mut dyn LoxError,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], lox: &'a mut dyn LoxError, next_id: ExprId) -> Self {
        Self {
            tokens,
            current: 0,
            next_id,
            lox,
        }
    }

    /// Where the id counter ended up; the REPL feeds this into the parser of
    /// the next line so locals-map keys stay unique.
    pub fn next_id(&self) -> ExprId {
        self.next_id
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = vec![];
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.peek().token_type == TokenType::EOF
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    // Payload-carrying variants (identifiers, literals) compare by variant,
    // not by payload.
    fn check(&self, token_type: &TokenType) -> bool {
        !self.is_at_end()
            && mem::discriminant(&self.peek().token_type) == mem::discriminant(token_type)
    }

    fn token_match(&mut self, types: &[TokenType]) -> Option<Token> {
        for token_type in types {
            if self.check(token_type) {
                return Some(self.advance().clone());
            }
        }
        None
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> PResult<Token> {
        if self.check(&token_type) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error(&token, message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> PResult<Token> {
        self.consume(TokenType::IDENTIFIER(String::new()), message)
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.lox.error_on_token(token, message);
        ParseError
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }
            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = match self.peek().token_type.clone() {
            TokenType::CLASS => self.class_declaration(),
            TokenType::FUN => {
                self.advance();
                self.function("function").map(Stmt::Function)
            }
            TokenType::VAR => self.var_declaration(),
            _ => self.statement(),
        };
        match result {
            Ok(statement) => Some(statement),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> PResult<Stmt> {
        self.advance(); // consume CLASS
        let name = self.consume_identifier("Expect class name.")?;

        let superclass = if self.token_match(&[TokenType::LESS]).is_some() {
            let superclass_name = self.consume_identifier("Expect superclass name.")?;
            Some(Expr::Variable(self.fresh_id(), superclass_name))
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;
        let mut methods = vec![];
        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class(name, superclass, methods))
    }

    fn function(&mut self, kind: &str) -> PResult<Rc<FunctionDecl>> {
        let name = self.consume_identifier(&format!("Expect {} name.", kind))?;
        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = vec![];
        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume_identifier("Expect parameter name.")?);
                if self.token_match(&[TokenType::COMMA]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        self.advance(); // consume VAR
        let name = self.consume_identifier("Expect variable name.")?;

        let initializer = if self.token_match(&[TokenType::EQUAL]).is_some() {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var(name, initializer))
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match self.peek().token_type.clone() {
            TokenType::FOR => self.for_statement(),
            TokenType::IF => self.if_statement(),
            TokenType::PRINT => self.print_statement(),
            TokenType::RETURN => self.return_statement(),
            TokenType::WHILE => self.while_statement(),
            TokenType::BREAK => self.break_statement(),
            TokenType::LEFT_BRACE => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            _ => self.expression_statement(),
        }
    }

    /// Caller has consumed the '{'.
    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements = vec![];
        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    // for loops are sugar: the initializer moves into an enclosing block,
    // the increment onto the end of the body, and what remains is a while.
    fn for_statement(&mut self) -> PResult<Stmt> {
        self.advance(); // consume FOR
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = match self.peek().token_type.clone() {
            TokenType::SEMICOLON => {
                self.advance();
                None
            }
            TokenType::VAR => Some(self.var_declaration()?),
            _ => Some(self.expression_statement()?),
        };

        let condition = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };
        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal(Token {
            token_type: TokenType::TRUE,
            line: paren.line,
        }));
        body = Stmt::While(condition, Box::new(body));

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.advance(); // consume IF
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.token_match(&[TokenType::ELSE]).is_some() {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If(condition, then_branch, else_branch))
    }

    fn print_statement(&mut self) -> PResult<Stmt> {
        self.advance(); // consume PRINT
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let keyword = self.advance().clone();
        let value = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;
        Ok(Stmt::Return(keyword, value))
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        self.advance(); // consume WHILE
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after while condition.")?;
        let body = self.statement()?;
        Ok(Stmt::While(condition, Box::new(body)))
    }

    fn break_statement(&mut self) -> PResult<Stmt> {
        let keyword = self.advance().clone();
        self.consume(TokenType::SEMICOLON, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break(keyword))
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.ternary()?;

        if let Some(equals) = self.token_match(&[TokenType::EQUAL]) {
            let value = self.assignment()?;
            return match expr {
                Expr::Variable(_, name) => {
                    Ok(Expr::Assign(self.fresh_id(), name, Box::new(value)))
                }
                Expr::Get(object, name) => Ok(Expr::Set(object, name, Box::new(value))),
                other => {
                    // Report but keep parsing; this is not a panic-mode error.
                    self.error(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> PResult<Expr> {
        let expr = self.logical_or()?;

        if self.token_match(&[TokenType::QUESTION]).is_some() {
            let then_branch = self.expression()?;
            self.consume(TokenType::COLON, "Expect ':' in ternary expression.")?;
            let else_branch = self.ternary()?;
            return Ok(Expr::Ternary(
                Box::new(expr),
                Box::new(then_branch),
                Box::new(else_branch),
            ));
        }
        Ok(expr)
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut expr = self.logical_and()?;
        while let Some(operator) = self.token_match(&[TokenType::OR]) {
            let right = self.logical_and()?;
            expr = Expr::Logical(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;
        while let Some(operator) = self.token_match(&[TokenType::AND]) {
            let right = self.equality()?;
            expr = Expr::Logical(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        while let Some(operator) =
            self.token_match(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL])
        {
            let right = self.comparison()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        while let Some(operator) = self.token_match(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let right = self.term()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        while let Some(operator) = self.token_match(&[TokenType::PLUS, TokenType::MINUS]) {
            let right = self.factor()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.unary()?;
        while let Some(operator) = self.token_match(&[TokenType::STAR, TokenType::SLASH]) {
            let right = self.unary()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if let Some(operator) = self.token_match(&[TokenType::BANG, TokenType::MINUS]) {
            let right = self.unary()?;
            Ok(Expr::Unary(operator, Box::new(right)))
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.token_match(&[TokenType::LEFT_PAREN]).is_some() {
                expr = self.finish_call(expr)?;
            } else if self.token_match(&[TokenType::DOT]).is_some() {
                let name = self.consume_identifier("Expect property name after '.'.")?;
                expr = Expr::Get(Box::new(expr), name);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut arguments = vec![];
        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if self.token_match(&[TokenType::COMMA]).is_none() {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;
        Ok(Expr::Call(Box::new(callee), paren, arguments))
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match &token.token_type {
            TokenType::FALSE
            | TokenType::TRUE
            | TokenType::NIL
            | TokenType::NUMBER(_)
            | TokenType::STRING(_) => {
                self.advance();
                Ok(Expr::Literal(token))
            }
            TokenType::SUPER => {
                self.advance();
                self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
                let method = self.consume_identifier("Expect superclass method name.")?;
                Ok(Expr::Super(self.fresh_id(), token, method))
            }
            TokenType::THIS => {
                self.advance();
                Ok(Expr::This(self.fresh_id(), token))
            }
            TokenType::IDENTIFIER(_) => {
                self.advance();
                Ok(Expr::Variable(self.fresh_id(), token))
            }
            TokenType::LEFT_PAREN => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
                Ok(Expr::Grouping(Box::new(expr)))
            }
            _ => Err(self.error(&token, "Expect expression.")),
        }
    }
}
