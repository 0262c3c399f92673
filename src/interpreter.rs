use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::environment::Environment;
use crate::object::{
    truthy, LoxBuiltinClock, LoxCallable, LoxCallableWrapper, LoxClass, LoxFunction, LoxInstance,
    Object,
};
use crate::tokens::{Token, TokenType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::Write;
use std::rc::Rc;

#[derive(Debug)]
pub struct LoxRuntimeError {
    t: Token,
    message: String,
}

impl LoxRuntimeError {
    pub fn new(t: Token, message: impl Into<String>) -> Self {
        Self {
            t,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> i32 {
        self.t.line
    }
}

impl Display for LoxRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\n [line {}]", self.message, self.t.line)
    }
}

impl std::error::Error for LoxRuntimeError {}

/// Everything that unwinds out of a statement: a `return` travelling to the
/// nearest call frame, a `break` travelling to the nearest loop, or a
/// runtime error travelling all the way to `interpret`.
#[derive(Debug)]
pub enum Interrupt {
    Return(Object),
    Break(Token),
    Error(LoxRuntimeError),
}

impl From<LoxRuntimeError> for Interrupt {
    fn from(error: LoxRuntimeError) -> Self {
        Self::Error(error)
    }
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    writer: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Interpreter whose `print` output goes to `writer` instead of stdout.
    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_owned(),
            Object::Callable(LoxCallableWrapper::new(Rc::new(LoxBuiltinClock))),
        );
        Self {
            globals: Rc::clone(&globals),
            environment: globals,
            locals: HashMap::new(),
            writer,
        }
    }

    /// Adopt the resolver's output. The REPL resolves each line separately
    /// and merges; ids never collide because the parser's counter persists.
    pub fn merge_locals(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, statements: &[Stmt], repl: bool) -> Result<(), LoxRuntimeError> {
        for statement in statements {
            let result = match statement {
                // At the prompt a bare expression prints its value.
                Stmt::Expression(e) if repl => match self.evaluate(e) {
                    Ok(value) => {
                        self.write_value(&value);
                        Ok(())
                    }
                    Err(interrupt) => Err(interrupt),
                },
                _ => self.execute(statement),
            };
            match result {
                Ok(()) => {}
                Err(Interrupt::Error(e)) => return Err(e),
                // A stray return/break already abandoned its own statement;
                // execution moves on to the next one.
                Err(Interrupt::Return(_)) | Err(Interrupt::Break(_)) => {}
            }
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Object) {
        writeln!(self.writer, "{}", value).ok();
    }

    pub fn execute(&mut self, statement: &Stmt) -> Result<(), Interrupt> {
        match statement {
            Stmt::Print(e) => {
                let value = self.evaluate(e)?;
                self.write_value(&value);
                Ok(())
            }
            Stmt::Expression(e) => {
                self.evaluate(e)?;
                Ok(())
            }
            Stmt::Var(name, initializer) => {
                let value = match initializer {
                    Some(e) => self.evaluate(e)?,
                    None => Object::Nil,
                };
                if value == Object::Nil {
                    return Err(LoxRuntimeError::new(
                        name.clone(),
                        "A variable must be initialized before it can be used.",
                    )
                    .into());
                }
                self.environment.borrow_mut().define(name.lexeme(), value);
                Ok(())
            }
            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, Rc::new(RefCell::new(environment)))
            }
            Stmt::If(condition, then_branch, else_branch) => {
                if truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While(condition, body) => {
                while truthy(&self.evaluate(condition)?) {
                    match self.execute(body) {
                        // break exits this loop and no further.
                        Err(Interrupt::Break(_)) => break,
                        other => other?,
                    }
                }
                Ok(())
            }
            Stmt::Break(keyword) => Err(Interrupt::Break(keyword.clone())),
            Stmt::Function(declaration) => {
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment.borrow_mut().define(
                    declaration.name.lexeme(),
                    Object::Callable(LoxCallableWrapper::new(Rc::new(function))),
                );
                Ok(())
            }
            Stmt::Return(_, value) => {
                let value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Object::Nil,
                };
                Err(Interrupt::Return(value))
            }
            Stmt::Class(name, superclass, methods) => {
                self.execute_class(name, superclass.as_ref(), methods)
            }
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Interrupt> {
        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Object::Class(k) => Some(k),
                _ => {
                    let token = match expr {
                        Expr::Variable(_, t) => t.clone(),
                        _ => name.clone(),
                    };
                    return Err(
                        LoxRuntimeError::new(token, "Superclass must be a class.").into()
                    );
                }
            },
            None => None,
        };

        // Two-phase definition lets methods refer to the class by name.
        self.environment
            .borrow_mut()
            .define(name.lexeme(), Object::Nil);

        let previous = Rc::clone(&self.environment);
        if let Some(sc) = &superclass {
            let mut environment = Environment::with_enclosing(Rc::clone(&self.environment));
            environment.define("super".to_owned(), Object::Class(Rc::clone(sc)));
            self.environment = Rc::new(RefCell::new(environment));
        }

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme() == "init";
            method_table.insert(
                method.name.lexeme(),
                LoxFunction::new(Rc::clone(method), Rc::clone(&self.environment), is_initializer),
            );
        }

        let class = Rc::new(LoxClass::new(name.lexeme(), superclass, method_table));

        self.environment = previous;
        self.environment
            .borrow_mut()
            .assign(name, Object::Class(class))?;
        Ok(())
    }

    /// Run `statements` in `environment`, restoring the previous frame on
    /// every exit path, interrupts included.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Interrupt> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }
        self.environment = previous;
        result
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Object, Interrupt> {
        match expr {
            Expr::Ternary(condition, then_branch, else_branch) => {
                if truthy(&self.evaluate(condition)?) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expr::Binary(left, t, right) => self.evaluate_binary(left, t, right),
            Expr::Logical(left, t, right) => {
                let left = self.evaluate(left)?;
                if t.token_type == TokenType::OR {
                    if truthy(&left) {
                        return Ok(left);
                    }
                } else if !truthy(&left) {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Unary(t, e) => self.evaluate_unary(t, e),
            Expr::Literal(t) => self.evaluate_literal(t),
            Expr::Grouping(e) => self.evaluate(e),
            Expr::Variable(id, name) => Ok(self.look_up_variable(name, *id)?),
            Expr::Assign(id, name, value) => {
                let value = self.evaluate(value)?;
                if let Some(distance) = self.locals.get(id) {
                    Environment::assign_at(&self.environment, *distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }
                Ok(value)
            }
            Expr::Call(callee, paren, arguments) => self.evaluate_call(callee, paren, arguments),
            Expr::Get(object, name) => match self.evaluate(object)? {
                Object::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),
                _ => Err(
                    LoxRuntimeError::new(name.clone(), "Only instances have properties.").into(),
                ),
            },
            Expr::Set(object, name, value) => match self.evaluate(object)? {
                Object::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                }
                _ => Err(LoxRuntimeError::new(name.clone(), "Only instances have fields.").into()),
            },
            Expr::This(id, keyword) => Ok(self.look_up_variable(keyword, *id)?),
            Expr::Super(id, keyword, method) => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Object, LoxRuntimeError> {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &name.lexeme())
                .ok_or_else(|| {
                    LoxRuntimeError::new(
                        name.clone(),
                        format!("Undefined variable '{}'.", name.lexeme()),
                    )
                }),
            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Object, Interrupt> {
        let callee = self.evaluate(callee)?;
        let mut evaluated = Vec::with_capacity(arguments.len());
        for argument in arguments {
            evaluated.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                self.check_arity(paren, function.arity(), evaluated.len())?;
                Ok(function.call(self, evaluated)?)
            }
            Object::Class(class) => {
                self.check_arity(paren, class.arity(), evaluated.len())?;
                Ok(LoxClass::instantiate(&class, self, evaluated)?)
            }
            _ => Err(LoxRuntimeError::new(
                paren.clone(),
                "Can only call functions and classes.",
            )
            .into()),
        }
    }

    fn check_arity(
        &self,
        paren: &Token,
        expected: usize,
        got: usize,
    ) -> Result<(), LoxRuntimeError> {
        if expected == got {
            Ok(())
        } else {
            Err(LoxRuntimeError::new(
                paren.clone(),
                format!("Expected {} arguments but got {}.", expected, got),
            ))
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Object, Interrupt> {
        let distance = self.locals.get(&id).copied().ok_or_else(|| {
            LoxRuntimeError::new(keyword.clone(), "Undefined variable 'super'.")
        })?;
        let superclass = match Environment::get_at(&self.environment, distance, "super") {
            Some(Object::Class(k)) => k,
            _ => {
                return Err(
                    LoxRuntimeError::new(keyword.clone(), "Undefined variable 'super'.").into(),
                )
            }
        };
        // The instance sits one frame inside the super binding.
        let object = match Environment::get_at(&self.environment, distance - 1, "this") {
            Some(Object::Instance(i)) => i,
            _ => {
                return Err(
                    LoxRuntimeError::new(keyword.clone(), "Undefined variable 'this'.").into(),
                )
            }
        };
        let found = superclass.find_method(&method.lexeme()).ok_or_else(|| {
            LoxRuntimeError::new(
                method.clone(),
                format!("Undefined property '{}'.", method.lexeme()),
            )
        })?;
        Ok(Object::Callable(LoxCallableWrapper::new(Rc::new(
            found.bind(&object),
        ))))
    }

    pub fn evaluate_unary(&mut self, t: &Token, e: &Expr) -> Result<Object, Interrupt> {
        let right = self.evaluate(e)?;
        match (&t.token_type, right) {
            (TokenType::MINUS, Object::Double(x)) => Ok(Object::Double(-x)),
            (TokenType::MINUS, _) => {
                Err(LoxRuntimeError::new(t.clone(), "Operand must be a number.").into())
            }
            (_, o) => Ok(Object::Boolean(!truthy(&o))),
        }
    }

    pub fn evaluate_binary(
        &mut self,
        left: &Expr,
        t: &Token,
        right: &Expr,
    ) -> Result<Object, Interrupt> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match &t.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Object::Double(l), Object::Double(r)) => Ok(Object::Double(l + r)),
                // If either side is a string, both are stringified.
                (Object::String(_), _) | (_, Object::String(_)) => {
                    Ok(Object::String(format!("{}{}", left, right)))
                }
                _ => Err(LoxRuntimeError::new(
                    t.clone(),
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },
            TokenType::MINUS => {
                let (l, r) = number_operands(t, &left, &right)?;
                Ok(Object::Double(l - r))
            }
            TokenType::STAR => {
                let (l, r) = number_operands(t, &left, &right)?;
                Ok(Object::Double(l * r))
            }
            TokenType::SLASH => {
                let (l, r) = number_operands(t, &left, &right)?;
                if r == 0.0 {
                    return Err(
                        LoxRuntimeError::new(t.clone(), "Cannot divide by zero.").into()
                    );
                }
                Ok(Object::Double(l / r))
            }
            // Relational operators compare string lengths when both sides
            // are strings.
            TokenType::GREATER => match (&left, &right) {
                (Object::String(l), Object::String(r)) => Ok(Object::Boolean(l.len() > r.len())),
                _ => {
                    let (l, r) = number_operands(t, &left, &right)?;
                    Ok(Object::Boolean(l > r))
                }
            },
            TokenType::GREATER_EQUAL => match (&left, &right) {
                (Object::String(l), Object::String(r)) => Ok(Object::Boolean(l.len() >= r.len())),
                _ => {
                    let (l, r) = number_operands(t, &left, &right)?;
                    Ok(Object::Boolean(l >= r))
                }
            },
            TokenType::LESS => match (&left, &right) {
                (Object::String(l), Object::String(r)) => Ok(Object::Boolean(l.len() < r.len())),
                _ => {
                    let (l, r) = number_operands(t, &left, &right)?;
                    Ok(Object::Boolean(l < r))
                }
            },
            TokenType::LESS_EQUAL => match (&left, &right) {
                (Object::String(l), Object::String(r)) => Ok(Object::Boolean(l.len() <= r.len())),
                _ => {
                    let (l, r) = number_operands(t, &left, &right)?;
                    Ok(Object::Boolean(l <= r))
                }
            },
            TokenType::EQUAL_EQUAL => Ok(Object::Boolean(left == right)),
            TokenType::BANG_EQUAL => Ok(Object::Boolean(left != right)),
            _ => Err(LoxRuntimeError::new(
                t.clone(),
                format!("Bad binary operator '{}'.", t.lexeme()),
            )
            .into()),
        }
    }

    pub fn evaluate_literal(&mut self, t: &Token) -> Result<Object, Interrupt> {
        match &t.token_type {
            TokenType::FALSE => Ok(Object::Boolean(false)),
            TokenType::TRUE => Ok(Object::Boolean(true)),
            TokenType::NUMBER(n) => Ok(Object::Double(*n)),
            TokenType::STRING(s) => Ok(Object::String(s.clone())),
            TokenType::NIL => Ok(Object::Nil),
            _ => Err(LoxRuntimeError::new(
                t.clone(),
                format!("Unexpected literal '{}'.", t.lexeme()),
            )
            .into()),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn number_operands(
    t: &Token,
    left: &Object,
    right: &Object,
) -> Result<(f64, f64), LoxRuntimeError> {
    match (left, right) {
        (Object::Double(l), Object::Double(r)) => Ok((*l, *r)),
        _ => Err(LoxRuntimeError::new(t.clone(), "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lox_error::testing::TestLox;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_mode(source: &str, repl: bool) -> (Vec<String>, Result<(), LoxRuntimeError>) {
        let mut lox = TestLox::default();
        let tokens = scanner::scan_tokens(&mut lox, source);
        assert!(!lox.has_error, "scan errors: {:?}", lox.messages);
        let mut parser = Parser::new(&tokens, &mut lox, 0);
        let statements = parser.parse();
        assert!(!lox.has_error, "parse errors: {:?}", lox.messages);
        let resolver = Resolver::new(&mut lox);
        let locals = resolver.resolve(&statements);
        assert!(!lox.has_error, "resolve errors: {:?}", lox.messages);

        let buffer = SharedBuffer::default();
        let mut interpreter = Interpreter::with_writer(Box::new(buffer.clone()));
        interpreter.merge_locals(locals);
        let result = interpreter.interpret(&statements, repl);
        let output = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        (output.lines().map(str::to_owned).collect(), result)
    }

    fn run(source: &str) -> (Vec<String>, Result<(), LoxRuntimeError>) {
        run_mode(source, false)
    }

    fn expect_output(source: &str, expected: &[&str]) {
        let (output, result) = run(source);
        assert!(result.is_ok(), "unexpected error: {:?}", result);
        assert_eq!(output, expected);
    }

    fn expect_runtime_error(source: &str, message: &str) {
        let (_, result) = run(source);
        match result {
            Err(e) => assert_eq!(e.message(), message),
            Ok(()) => panic!("expected runtime error '{}', got success", message),
        }
    }

    #[test]
    fn arithmetic_and_grouping() {
        expect_output("print (1 + 2) * 3;", &["9"]);
        expect_output("print 10 - 2 - 3;", &["5"]);
        expect_output("print -4 + 2;", &["-2"]);
        expect_output("print 7 / 2;", &["3.5"]);
    }

    #[test]
    fn string_concatenation() {
        expect_output("print \"foo\" + \"bar\";", &["foobar"]);
        expect_output("print \"n=\" + 1;", &["n=1"]);
        expect_output("print 1 + \"st\";", &["1st"]);
    }

    #[test]
    fn plus_type_error() {
        expect_runtime_error(
            "print true + 1;",
            "Operands must be two numbers or two strings.",
        );
    }

    #[test]
    fn string_length_comparison() {
        expect_output("print \"abc\" < \"abcd\";", &["true"]);
        expect_output("print \"xy\" > \"z\";", &["true"]);
        expect_output("print \"ab\" <= \"cd\";", &["true"]);
        expect_runtime_error("print \"a\" < 1;", "Operands must be numbers.");
    }

    #[test]
    fn division_by_zero() {
        let (_, result) = run("print 1 / 0;");
        let error = result.unwrap_err();
        assert_eq!(error.message(), "Cannot divide by zero.");
        assert_eq!(error.line(), 1);
    }

    #[test]
    fn unary_operand_check() {
        expect_runtime_error("print -\"abc\";", "Operand must be a number.");
        expect_output("print !nil;", &["true"]);
        expect_output("print !0;", &["false"]);
    }

    #[test]
    fn equality_semantics() {
        expect_output("print nil == nil;", &["true"]);
        expect_output("print nil == false;", &["false"]);
        expect_output("print \"1\" == 1;", &["false"]);
        expect_output("print 2 == 2;", &["true"]);
        expect_output("print 1 != 2;", &["true"]);
    }

    #[test]
    fn ternary_picks_one_branch() {
        expect_output("print 1 < 2 ? \"yes\" : \"no\";", &["yes"]);
        expect_output("print nil ? \"yes\" : \"no\";", &["no"]);
        // The untaken branch is never evaluated.
        expect_output("print true ? 1 : 1 / 0;", &["1"]);
        // Right-associative.
        expect_output("print false ? 1 : false ? 2 : 3;", &["3"]);
    }

    #[test]
    fn logical_operators_return_operands() {
        expect_output("print \"hi\" or 2;", &["hi"]);
        expect_output("print nil or \"fallback\";", &["fallback"]);
        expect_output("print nil and missing;", &["nil"]);
        expect_output("print 1 and 2;", &["2"]);
    }

    #[test]
    fn variables_and_blocks() {
        expect_output(
            "var a = 1; { var a = 2; print a; } print a;",
            &["2", "1"],
        );
    }

    #[test]
    fn uninitialized_variable_is_an_error() {
        expect_runtime_error(
            "var x; print x;",
            "A variable must be initialized before it can be used.",
        );
        expect_runtime_error(
            "var x = nil;",
            "A variable must be initialized before it can be used.",
        );
    }

    #[test]
    fn undefined_variable() {
        expect_runtime_error("print missing;", "Undefined variable 'missing'.");
        expect_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    }

    #[test]
    fn assignment_returns_value_and_takes_one_path() {
        expect_output("var a = 1; print a = 2; print a;", &["2", "2"]);
        // An assignment in an inner scope to an outer variable mutates the
        // outer binding without creating a shadow.
        expect_output(
            "var a = 1; { a = 5; } print a;",
            &["5"],
        );
    }

    #[test]
    fn while_loops_and_break() {
        expect_output(
            "var i = 1; while (i < 10) { if (i > 3) break; print i; i = i + 1; }",
            &["1", "2", "3"],
        );
        // break exits only the nearest loop.
        expect_output(
            "var i = 1; while (i < 3) { var j = 1; while (true) { break; } print i; i = i + 1; }",
            &["1", "2"],
        );
    }

    #[test]
    fn for_loop_desugars() {
        expect_output(
            "for (var i = 0; i < 3; i = i + 1) print i;",
            &["0", "1", "2"],
        );
        expect_output("for (var i = 5; i > 3;) { print i; i = i - 1; }", &["5", "4"]);
    }

    #[test]
    fn functions_and_returns() {
        expect_output(
            "fun add(a, b) { return a + b; } print add(1, 2);",
            &["3"],
        );
        expect_output("fun noop() {} print noop();", &["nil"]);
        expect_output("fun f() { return; print \"unreached\"; } print f();", &["nil"]);
    }

    #[test]
    fn closures_capture_their_environment() {
        expect_output(
            "fun make(x) { fun get() { return x; } return get; } var g = make(42); print g();",
            &["42"],
        );
    }

    #[test]
    fn closures_observe_later_updates() {
        expect_output(
            "var counter = 0; fun bump() { counter = counter + 1; return counter; } bump(); print bump();",
            &["2"],
        );
    }

    #[test]
    fn resolved_references_are_stable_across_shadowing() {
        expect_output(
            "var a = \"global\"; { fun showA() { print a; } showA(); var a = \"block\"; showA(); }",
            &["global", "global"],
        );
    }

    #[test]
    fn call_errors() {
        expect_runtime_error("\"text\"();", "Can only call functions and classes.");
        expect_runtime_error(
            "fun f(a) {} f(1, 2);",
            "Expected 1 arguments but got 2.",
        );
        expect_runtime_error("fun f(a, b) {} f(1);", "Expected 2 arguments but got 1.");
    }

    #[test]
    fn clock_is_a_native_function() {
        expect_output("print clock;", &["<native fn>"]);
        expect_output("print clock() > 0;", &["true"]);
    }

    #[test]
    fn classes_fields_and_methods() {
        expect_output(
            "class Box {} var b = Box(); b.value = 7; print b.value; print b;",
            &["7", "Box instance"],
        );
        expect_output(
            "class Greeter { hello() { return \"hi\"; } } print Greeter().hello(); print Greeter;",
            &["hi", "Greeter"],
        );
    }

    #[test]
    fn property_errors() {
        expect_runtime_error("print 1.x;", "Only instances have properties.");
        expect_runtime_error("1.x = 2;", "Only instances have fields.");
        expect_runtime_error(
            "class Box {} print Box().missing;",
            "Undefined property 'missing'.",
        );
    }

    #[test]
    fn methods_bind_this_at_retrieval() {
        expect_output(
            "class Cake { taste() { print this.flavor; } } \
             var cake = Cake(); cake.flavor = \"chocolate\"; \
             var m = cake.taste; m();",
            &["chocolate"],
        );
    }

    #[test]
    fn initializer_returns_this() {
        expect_output(
            "class P { init(x) { this.x = x; } } var p = P(3); print p.x;",
            &["3"],
        );
        // An early bare return in init still yields the instance.
        expect_output(
            "class P { init() { this.x = 1; return; } } print P().x;",
            &["1"],
        );
    }

    #[test]
    fn inheritance_and_super() {
        expect_output(
            "class A { say() { print \"A\"; } } \
             class B < A { say() { super.say(); print \"B\"; } } \
             B().say();",
            &["A", "B"],
        );
        expect_output(
            "class A { say() { print \"A\"; } } class B < A {} B().say();",
            &["A"],
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        expect_runtime_error(
            "var NotAClass = 1; class Sub < NotAClass {}",
            "Superclass must be a class.",
        );
    }

    #[test]
    fn unknown_super_method() {
        expect_runtime_error(
            "class A {} class B < A { go() { super.missing(); } } B().go();",
            "Undefined property 'missing'.",
        );
    }

    #[test]
    fn repl_prints_bare_expressions() {
        let (output, result) = run_mode("1 + 2;", true);
        assert!(result.is_ok());
        assert_eq!(output, &["3"]);
        // Statements stay silent at the prompt.
        let (output, result) = run_mode("var a = 1;", true);
        assert!(result.is_ok());
        assert!(output.is_empty());
    }

    #[test]
    fn runtime_error_leaves_globals_intact() {
        // Mirrors the REPL: the same interpreter keeps running after an error.
        let mut lox = TestLox::default();
        let tokens = scanner::scan_tokens(&mut lox, "var a = 1; print a / 0; a = 2; print a;");
        let mut parser = Parser::new(&tokens, &mut lox, 0);
        let statements = parser.parse();
        let resolver = Resolver::new(&mut lox);
        let locals = resolver.resolve(&statements);
        assert!(!lox.has_error);

        let buffer = SharedBuffer::default();
        let mut interpreter = Interpreter::with_writer(Box::new(buffer.clone()));
        interpreter.merge_locals(locals);
        let result = interpreter.interpret(&statements, false);
        assert!(result.is_err());

        // Globals survive; a fresh program against the same interpreter sees them.
        let mut lox2 = TestLox::default();
        let tokens2 = scanner::scan_tokens(&mut lox2, "print a;");
        let mut parser2 = Parser::new(&tokens2, &mut lox2, 10_000);
        let statements2 = parser2.parse();
        let resolver2 = Resolver::new(&mut lox2);
        let locals2 = resolver2.resolve(&statements2);
        interpreter.merge_locals(locals2);
        assert!(interpreter.interpret(&statements2, false).is_ok());
        let output = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        assert_eq!(output.lines().last().unwrap(), "1");
    }
}
