use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::lox_error::LoxError;
use crate::tokens::Token;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Static pass between parsing and interpretation. Walks the tree once,
/// tracking a stack of lexical scopes (name → finished-initializing), and
/// records how many scopes each variable use has to skip at runtime. Also
/// rejects the handful of constructs that are only detectable statically.
/// Reports through `LoxError` and keeps going; it never unwinds.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
    lox: &'a mut dyn LoxError,
}

impl<'a> Resolver<'a> {
    pub fn new(lox: &'a mut dyn LoxError) -> Self {
        Self {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            lox,
        }
    }

    /// Resolve a whole program and hand back the locals map for the
    /// interpreter to merge.
    pub fn resolve(mut self, statements: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Globals are not tracked; declare/define are no-ops at the top level.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme()) {
                self.lox
                    .error_on_token(name, "Already a variable with this name in this scope.");
            } else {
                scope.insert(name.lexeme(), false);
            }
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme()) {
                self.locals.insert(id, depth);
                return;
            }
        }
        // Not found locally: assumed global, left out of the map.
    }

    fn resolve_function(&mut self, function: &FunctionDecl, function_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::Var(name, initializer) => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Stmt::Function(declaration) => {
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Stmt::Expression(e) | Stmt::Print(e) => self.resolve_expression(e),
            Stmt::If(condition, then_branch, else_branch) => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While(condition, body) => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Stmt::Break(keyword) => {
                if self.scopes.is_empty() {
                    self.lox
                        .error_on_token(keyword, "Can't use 'break' at the top level.");
                }
            }
            Stmt::Return(keyword, value) => {
                if self.current_function == FunctionType::None {
                    self.lox
                        .error_on_token(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.lox
                            .error_on_token(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expression(value);
                }
            }
            Stmt::Class(name, superclass, methods) => {
                self.resolve_class(name, superclass.as_ref(), methods);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable(_, superclass_name) = superclass {
                if superclass_name.lexeme() == name.lexeme() {
                    self.lox
                        .error_on_token(superclass_name, "A class can't inherit from itself.");
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expression(superclass);

            self.begin_scope();
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert("super".to_owned(), true);
            }
        }

        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this".to_owned(), true);
        }
        for method in methods {
            let declaration = if method.name.lexeme() == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration);
        }
        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Variable(id, name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme()) == Some(&false) {
                        self.lox.error_on_token(
                            name,
                            "Can't read local variable in its own initializer.",
                        );
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign(id, name, value) => {
                self.resolve_expression(value);
                self.resolve_local(*id, name);
            }
            Expr::Ternary(condition, then_branch, else_branch) => {
                self.resolve_expression(condition);
                self.resolve_expression(then_branch);
                self.resolve_expression(else_branch);
            }
            Expr::Binary(left, _, right) | Expr::Logical(left, _, right) => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expr::Unary(_, right) => self.resolve_expression(right),
            Expr::Grouping(inner) => self.resolve_expression(inner),
            Expr::Literal(_) => {}
            Expr::Call(callee, _, arguments) => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            Expr::Get(object, _) => self.resolve_expression(object),
            Expr::Set(object, _, value) => {
                self.resolve_expression(value);
                self.resolve_expression(object);
            }
            Expr::This(id, keyword) => {
                if self.current_class == ClassType::None {
                    self.lox
                        .error_on_token(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword);
            }
            Expr::Super(id, keyword, _) => {
                match self.current_class {
                    ClassType::None => {
                        self.lox
                            .error_on_token(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.lox.error_on_token(
                            keyword,
                            "Can't use 'super' in a class with no superclass.",
                        );
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lox_error::testing::TestLox;
    use crate::parser::Parser;
    use crate::scanner;

    fn resolve(source: &str) -> (HashMap<ExprId, usize>, TestLox) {
        let mut lox = TestLox::default();
        let tokens = scanner::scan_tokens(&mut lox, source);
        assert!(!lox.has_error, "scan errors: {:?}", lox.messages);
        let mut parser = Parser::new(&tokens, &mut lox, 0);
        let statements = parser.parse();
        assert!(!lox.has_error, "parse errors: {:?}", lox.messages);
        let resolver = Resolver::new(&mut lox);
        let locals = resolver.resolve(&statements);
        (locals, lox)
    }

    fn expect_error(source: &str, fragment: &str) {
        let (_, lox) = resolve(source);
        assert!(lox.has_error, "expected a resolve error for: {}", source);
        assert!(
            lox.messages.iter().any(|m| m.contains(fragment)),
            "no message containing '{}' in {:?}",
            fragment,
            lox.messages
        );
    }

    fn expect_clean(source: &str) -> HashMap<ExprId, usize> {
        let (locals, lox) = resolve(source);
        assert!(!lox.has_error, "unexpected errors: {:?}", lox.messages);
        locals
    }

    #[test]
    fn globals_stay_out_of_the_map() {
        let locals = expect_clean("var a = 1; print a;");
        assert!(locals.is_empty());
    }

    #[test]
    fn local_distances() {
        // One use in the defining scope, one a block deeper.
        let locals = expect_clean("{ var a = 1; print a; { print a; } }");
        let mut distances: Vec<usize> = locals.values().copied().collect();
        distances.sort_unstable();
        assert_eq!(distances, vec![0, 1]);
    }

    #[test]
    fn every_resolved_distance_is_reachable() {
        let locals = expect_clean(
            "{ var a = 1; fun outer() { fun inner() { print a; } inner(); } outer(); }",
        );
        assert!(locals.values().all(|d| *d <= 3));
        assert!(!locals.is_empty());
    }

    #[test]
    fn self_reference_in_initializer() {
        expect_error(
            "{ var a = \"outer\"; { var a = a; } }",
            "Can't read local variable in its own initializer.",
        );
    }

    #[test]
    fn redeclaration_in_same_scope() {
        expect_error(
            "{ var a = 1; var a = 2; }",
            "Already a variable with this name in this scope.",
        );
        // At the global scope redeclaration is allowed.
        expect_clean("var a = 1; var a = 2;");
    }

    #[test]
    fn return_placement() {
        expect_error("return 1;", "Can't return from top-level code.");
        expect_error(
            "class P { init() { return 1; } }",
            "Can't return a value from an initializer.",
        );
        expect_clean("class P { init() { return; } }");
        expect_clean("fun f() { return 1; }");
    }

    #[test]
    fn this_and_super_placement() {
        expect_error("print this;", "Can't use 'this' outside of a class.");
        expect_error(
            "fun notAMethod() { print this; }",
            "Can't use 'this' outside of a class.",
        );
        expect_error("print super.x;", "Can't use 'super' outside of a class.");
        expect_error(
            "class A { go() { super.go(); } }",
            "Can't use 'super' in a class with no superclass.",
        );
        expect_clean("class A {} class B < A { go() { super.go(); } }");
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        expect_error("class A < A {}", "A class can't inherit from itself.");
    }

    #[test]
    fn break_at_top_level() {
        expect_error("break;", "Can't use 'break' at the top level.");
        expect_clean("while (true) { break; }");
    }

    #[test]
    fn this_resolves_to_the_method_scope() {
        let locals = expect_clean("class Cake { taste() { print this.flavor; } }");
        // `this` is one scope out from the method body (past the params frame).
        assert!(locals.values().any(|d| *d == 1));
    }
}
