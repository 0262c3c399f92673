use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Display};
use std::rc::Rc;

use itertools::Itertools;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::interpreter::{Interpreter, Interrupt, LoxRuntimeError};
use crate::tokens::Token;

#[derive(Debug, Clone)]
pub enum Object {
    Nil,
    Boolean(bool),
    Double(f64),
    String(String),
    Callable(LoxCallableWrapper),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Structural equality on primitives; nil only equals nil.
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Double(l), Self::Double(r)) => l == r,
            (Self::String(l), Self::String(r)) => l == r,
            // Reference identity for everything that lives on the heap.
            (Self::Callable(l), Self::Callable(r)) => l == r,
            (Self::Class(l), Self::Class(r)) => Rc::ptr_eq(l, r),
            (Self::Instance(l), Self::Instance(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Double(d) => {
                let text = d.to_string();
                write!(f, "{}", text.strip_suffix(".0").unwrap_or(&text))
            }
            Self::String(s) => write!(f, "{}", s),
            Self::Callable(c) => write!(f, "{}", c),
            Self::Class(k) => write!(f, "{}", k.name),
            Self::Instance(i) => write!(f, "{} instance", i.borrow().klass.name),
        }
    }
}

pub fn truthy(o: &Object) -> bool {
    match o {
        Object::Nil => false,
        Object::Boolean(x) => *x,
        _ => true,
    }
}

pub trait LoxCallable: Debug + Display {
    fn arity(&self) -> usize;

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError>;
}

// Wrapper so Object can hold any callable while keeping PartialEq: two
// callables are equal exactly when they are the same heap object.
#[derive(Debug, Clone)]
pub struct LoxCallableWrapper {
    inner: Rc<dyn LoxCallable>,
}

impl LoxCallableWrapper {
    pub fn new(inner: Rc<dyn LoxCallable>) -> Self {
        Self { inner }
    }
}

impl PartialEq for LoxCallableWrapper {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl LoxCallable for LoxCallableWrapper {
    fn arity(&self) -> usize {
        self.inner.arity()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        self.inner.call(interpreter, arguments)
    }
}

impl fmt::Display for LoxCallableWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// A bound copy whose closure opens with `this` mapped to `instance`.
    pub fn bind(&self, instance: &Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this".to_owned(), Object::Instance(Rc::clone(instance)));
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }
}

impl LoxCallable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        // The caller has already checked arity, so the lengths line up.
        for (param, argument) in self.declaration.params.iter().zip_eq(arguments) {
            environment.define(param.lexeme(), argument);
        }

        let result = interpreter.execute_block(
            &self.declaration.body,
            Rc::new(RefCell::new(environment)),
        );
        match result {
            Ok(()) => {}
            Err(Interrupt::Return(value)) => {
                if !self.is_initializer {
                    return Ok(value);
                }
            }
            // A break with no enclosing loop in this function; the call just
            // ends as if the body fell off the end.
            Err(Interrupt::Break(_)) => {}
            Err(Interrupt::Error(e)) => return Err(e),
        }

        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this").unwrap_or(Object::Nil));
        }
        Ok(Object::Nil)
    }
}

// Hand-written so a closure that captures itself doesn't recurse while
// formatting.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme())
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme())
    }
}

pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, LoxFunction>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&LoxFunction> {
        if let Some(method) = self.methods.get(name) {
            return Some(method);
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// `init`'s arity if the class declares or inherits one, otherwise 0.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, LoxFunction::arity)
    }

    /// The class's half of the callable protocol: construct an instance,
    /// then bind-and-invoke `init` when present.
    pub fn instantiate(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));
        if let Some(initializer) = class.find_method("init") {
            initializer.bind(&instance).call(interpreter, arguments)?;
        }
        Ok(Object::Instance(instance))
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub struct LoxInstance {
    pub klass: Rc<LoxClass>,
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    pub fn new(klass: Rc<LoxClass>) -> Self {
        Self {
            klass,
            fields: HashMap::new(),
        }
    }

    /// Property lookup: fields shadow methods; methods bind to the instance
    /// on retrieval.
    pub fn get(
        instance: &Rc<RefCell<LoxInstance>>,
        name: &Token,
    ) -> Result<Object, LoxRuntimeError> {
        let borrowed = instance.borrow();
        if let Some(value) = borrowed.fields.get(&name.lexeme()) {
            return Ok(value.clone());
        }
        if let Some(method) = borrowed.klass.find_method(&name.lexeme()) {
            let bound = method.bind(instance);
            return Ok(Object::Callable(LoxCallableWrapper::new(Rc::new(bound))));
        }
        Err(LoxRuntimeError::new(
            name.clone(),
            format!("Undefined property '{}'.", name.lexeme()),
        ))
    }

    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme(), value);
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.klass.name)
    }
}

#[derive(Debug)]
pub struct LoxBuiltinClock;

impl LoxCallable for LoxBuiltinClock {
    fn arity(&self) -> usize {
        0
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        _arguments: Vec<Object>,
    ) -> Result<Object, LoxRuntimeError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Ok(Object::Double(now.as_secs_f64()))
    }
}

impl fmt::Display for LoxBuiltinClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!truthy(&Object::Nil));
        assert!(!truthy(&Object::Boolean(false)));
        assert!(truthy(&Object::Boolean(true)));
        assert!(truthy(&Object::Double(0.0)));
        assert!(truthy(&Object::String(String::new())));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Object::Nil.to_string(), "nil");
        assert_eq!(Object::Boolean(true).to_string(), "true");
        assert_eq!(Object::Double(9.0).to_string(), "9");
        assert_eq!(Object::Double(2.5).to_string(), "2.5");
        assert_eq!(Object::String("hi".to_owned()).to_string(), "hi");
    }

    #[test]
    fn primitive_equality() {
        assert_eq!(Object::Nil, Object::Nil);
        assert_ne!(Object::Nil, Object::Boolean(false));
        assert_ne!(Object::Double(1.0), Object::Boolean(true));
        assert_eq!(
            Object::String("a".to_owned()),
            Object::String("a".to_owned())
        );
    }

    #[test]
    fn callable_equality_is_identity() {
        let clock: Rc<dyn LoxCallable> = Rc::new(LoxBuiltinClock);
        let a = LoxCallableWrapper::new(Rc::clone(&clock));
        let b = LoxCallableWrapper::new(clock);
        let c = LoxCallableWrapper::new(Rc::new(LoxBuiltinClock));
        assert_eq!(
            Object::Callable(a.clone()),
            Object::Callable(b)
        );
        assert_ne!(Object::Callable(a), Object::Callable(c));
    }

    #[test]
    fn class_lookup_walks_superclass() {
        let base = Rc::new(LoxClass::new("Base".to_owned(), None, HashMap::new()));
        let derived = Rc::new(LoxClass::new(
            "Derived".to_owned(),
            Some(Rc::clone(&base)),
            HashMap::new(),
        ));
        assert!(derived.find_method("missing").is_none());
        assert_eq!(derived.arity(), 0);
        assert_eq!(Object::Class(base.clone()).to_string(), "Base");

        let instance = Rc::new(RefCell::new(LoxInstance::new(derived)));
        assert_eq!(
            Object::Instance(instance).to_string(),
            "Derived instance"
        );
    }
}
