use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::interpreter::LoxRuntimeError;
use crate::object::Object;
use crate::tokens::Token;

/// One lexical frame. Frames form a chain through `enclosing`; closures keep
/// their defining frame alive by holding an `Rc` to it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            ..Default::default()
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: String, value: Object) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Object, LoxRuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme()) {
            return Ok(value.clone());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(LoxRuntimeError::new(
                name.clone(),
                format!("Undefined variable '{}'.", name.lexeme()),
            )),
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), LoxRuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme()) {
            *slot = value;
            return Ok(());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(LoxRuntimeError::new(
                name.clone(),
                format!("Undefined variable '{}'.", name.lexeme()),
            )),
        }
    }

    /// The frame `distance` hops up the enclosing chain, or `None` if the
    /// chain is shorter than the resolver promised.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut environment = Rc::clone(env);
        for _ in 0..distance {
            let enclosing = environment.borrow().enclosing.clone()?;
            environment = enclosing;
        }
        Some(environment)
    }

    /// Resolved fast path: read `name` directly out of the frame at
    /// `distance`, without searching the chain.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Option<Object> {
        let target = Self::ancestor(env, distance)?;
        let value = target.borrow().values.get(name).cloned();
        value
    }

    /// Resolved fast path for assignment.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &Token,
        value: Object,
    ) -> Result<(), LoxRuntimeError> {
        match Self::ancestor(env, distance) {
            Some(target) => {
                target.borrow_mut().values.insert(name.lexeme(), value);
                Ok(())
            }
            None => Err(LoxRuntimeError::new(
                name.clone(),
                format!("Undefined variable '{}'.", name.lexeme()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenType;

    fn ident(name: &str) -> Token {
        Token {
            token_type: TokenType::IDENTIFIER(name.to_owned()),
            line: 1,
        }
    }

    #[test]
    fn define_get_assign() {
        let mut env = Environment::new();
        env.define("x".to_owned(), Object::Double(1.0));
        assert_eq!(env.get(&ident("x")).unwrap(), Object::Double(1.0));

        env.assign(&ident("x"), Object::Double(2.0)).unwrap();
        assert_eq!(env.get(&ident("x")).unwrap(), Object::Double(2.0));

        assert!(env.get(&ident("y")).is_err());
        assert!(env.assign(&ident("y"), Object::Nil).is_err());
    }

    #[test]
    fn undefined_variable_message() {
        let env = Environment::new();
        let err = env.get(&ident("missing")).unwrap_err();
        assert_eq!(err.message(), "Undefined variable 'missing'.");
    }

    #[test]
    fn inner_frame_shadows_and_outer_mutates() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("x".to_owned(), Object::Double(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &globals,
        ))));
        inner
            .borrow_mut()
            .define("x".to_owned(), Object::Double(10.0));

        assert_eq!(
            inner.borrow().get(&ident("x")).unwrap(),
            Object::Double(10.0)
        );

        // Assignment to a name only defined in the outer frame lands there.
        inner
            .borrow_mut()
            .define("y".to_owned(), Object::Boolean(true));
        globals
            .borrow_mut()
            .define("z".to_owned(), Object::Double(0.0));
        inner
            .borrow_mut()
            .assign(&ident("z"), Object::Double(7.0))
            .unwrap();
        assert_eq!(
            globals.borrow().get(&ident("z")).unwrap(),
            Object::Double(7.0)
        );
    }

    #[test]
    fn resolved_access_walks_exact_distance() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("x".to_owned(), Object::Double(1.0));
        let middle = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &globals,
        ))));
        middle
            .borrow_mut()
            .define("x".to_owned(), Object::Double(2.0));
        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &middle,
        ))));

        assert_eq!(
            Environment::get_at(&inner, 1, "x"),
            Some(Object::Double(2.0))
        );
        assert_eq!(
            Environment::get_at(&inner, 2, "x"),
            Some(Object::Double(1.0))
        );
        assert_eq!(Environment::get_at(&inner, 0, "x"), None);

        Environment::assign_at(&inner, 2, &ident("x"), Object::Double(5.0)).unwrap();
        assert_eq!(
            globals.borrow().get(&ident("x")).unwrap(),
            Object::Double(5.0)
        );
        assert_eq!(
            middle.borrow().get(&ident("x")).unwrap(),
            Object::Double(2.0)
        );
    }
}
