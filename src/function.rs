use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::value::Value;

/// A user function or lambda: its declaration, the scope chain captured at
/// definition time, and whether it is a class initializer.
#[derive(Debug)]
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
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn declaration(&self) -> &Rc<FunctionDecl> {
        &self.declaration
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment>> {
        &self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.declaration
            .name
            .as_ref()
            .map(|token| token.lexeme.as_str())
    }

    /// Produce a copy of this function whose closure is a fresh frame with a
    /// single entry binding `this` to the given instance.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        debug!("Binding method {:?} to instance", self.name());

        let environment = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        environment.borrow_mut().define("this", instance);

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<fn>"),
        }
    }
}
