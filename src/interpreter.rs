//! Tree-walking evaluator.
//!
//! Holds the globals frame, the current frame, and the hop-count map the
//! resolver filled in (`locals`).  Every `Variable`/`Assign`/`This`/`Super`
//! with an entry in the map is read by walking exactly that many enclosing
//! frames; everything else falls through to globals.  `return` unwinds as an
//! [`Interrupt`] distinct from runtime errors and is caught only at call
//! boundaries.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::function::LoxFunction;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Control signal unwinding the evaluator: either a runtime error headed for
/// the top level, or a `return` headed for the nearest call boundary.
pub enum Interrupt {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Interrupt {
    fn from(e: LoxError) -> Self {
        Interrupt::Error(e)
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter writing `print` output to the given sink.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolver callbacks
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a variable occurrence as a local `depth` frames away.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// A variable occurrence not found in any lexical scope; it will be
    /// looked up in globals at runtime.
    pub fn note_global(&mut self, name: &Token) {
        debug!("Noting global '{}'", name.lexeme);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a resolved program.  The first runtime error unwinds to here.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Interrupt::Error(e)) => return Err(e),

                // The resolver rejects top-level `return`; this arm only
                // guards against an unresolved AST.
                Err(Interrupt::Return(_)) => {
                    return Err(LoxError::runtime(0, "Can't return from top-level code."))
                }
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Interrupt> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value).map_err(LoxError::Io)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(declaration) => {
                let function = Value::Function(Rc::new(LoxFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                )));

                if let Some(name) = &declaration.name {
                    self.environment.borrow_mut().define(&name.lexeme, function);
                }

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Interrupt::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run statements in `environment`, restoring the previous frame on
    /// every exit path including unwinds.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Interrupt> {
        let previous: Rc<RefCell<Environment>> =
            std::mem::replace(&mut self.environment, environment);

        let mut result: Result<(), Interrupt> = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Interrupt> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(Self::error(line, "Superclass must be a class."));
                }
            },

            None => None,
        };

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods close over a frame holding `super` when there is a
        // superclass; otherwise over the defining frame directly.
        let method_env: Rc<RefCell<Environment>> = match &superclass_value {
            Some(superclass) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                env.borrow_mut()
                    .define("super", Value::Class(superclass.clone()));

                env
            }

            None => self.environment.clone(),
        };

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            if let Some(method_name) = &method.name {
                let is_initializer = method_name.lexeme == "init";

                method_map.insert(
                    method_name.lexeme.clone(),
                    Rc::new(LoxFunction::new(
                        method.clone(),
                        method_env.clone(),
                        is_initializer,
                    )),
                );
            }
        }

        let class = Value::Class(Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass_value,
            method_map,
        )));

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, class, name.line)?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Interrupt> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                // Only the selected arm is evaluated.
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => {
                        let assigned = self.environment.borrow_mut().assign_at(
                            *distance,
                            &name.lexeme,
                            value.clone(),
                        );

                        if !assigned {
                            return Err(Self::error(
                                name.line,
                                format!("Undefined variable '{}'.", name.lexeme),
                            ));
                        }
                    }

                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone(), name.line)?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());

                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.call_value(callee_value, argument_values, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        if let Some(field) = instance.borrow().get_field(&name.lexeme) {
                            return Ok(field);
                        }

                        let method = instance.borrow().class().find_method(&name.lexeme);

                        match method {
                            Some(method) => Ok(Value::Function(Rc::new(
                                method.bind(Value::Instance(instance.clone())),
                            ))),

                            None => Err(Self::error(
                                name.line,
                                format!("Undefined property '{}'.", name.lexeme),
                            )),
                        }
                    }

                    _ => Err(Self::error(name.line, "Only instances have properties.")),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;

                        instance.borrow_mut().set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => Err(Self::error(name.line, "Only instances have fields.")),
                }
            }

            Expr::Super { id, keyword, method } => self.evaluate_super(*id, keyword, method),

            Expr::Lambda(declaration) => Ok(Value::Function(Rc::new(LoxFunction::new(
                declaration.clone(),
                self.environment.clone(),
                false,
            )))),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, Interrupt> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(Self::error(operator.line, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Interrupt> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                // Either operand being a string coerces the other to its
                // display form.
                (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),

                (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),

                _ => Err(Self::error(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(Self::error(operator.line, "Cannot divide by 0"))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(Self::error(operator.line, "Operand must be a number.")),
            },

            _ => Err(Self::error(operator.line, "Invalid binary operator.")),
        }
    }

    fn evaluate_logical(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Interrupt> {
        let left_value = self.evaluate(left)?;

        // Short-circuit: the operand itself is the result, not a boolean.
        match operator.token_type {
            TokenType::OR if left_value.is_truthy() => Ok(left_value),

            TokenType::AND if !left_value.is_truthy() => Ok(left_value),

            TokenType::OR | TokenType::AND => self.evaluate(right),

            _ => Err(Self::error(operator.line, "Invalid logical operator.")),
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, Interrupt> {
        let distance: usize = match self.locals.get(&id) {
            Some(distance) => *distance,

            None => {
                return Err(Self::error(
                    keyword.line,
                    "Can't use 'super' outside of a class.",
                ))
            }
        };

        // `super` lives at the resolved distance; the bound `this` one frame
        // nearer.
        let superclass = self.environment.borrow().get_at(distance, "super");
        let instance = self
            .environment
            .borrow()
            .get_at(distance.saturating_sub(1), "this");

        match (superclass, instance) {
            (Some(Value::Class(superclass)), Some(instance @ Value::Instance(_))) => {
                match superclass.find_method(&method.lexeme) {
                    Some(resolved) => Ok(Value::Function(Rc::new(resolved.bind(instance)))),

                    None => Err(Self::error(
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }

            _ => Err(Self::error(keyword.line, "Undefined variable 'super'.")),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, Interrupt> {
        match self.locals.get(&id) {
            Some(distance) => match self.environment.borrow().get_at(*distance, &name.lexeme) {
                Some(value) => Ok(value),

                None => Err(Self::error(
                    name.line,
                    format!("Undefined variable '{}'.", name.lexeme),
                )),
            },

            None => Ok(self.globals.borrow().get(&name.lexeme, name.line)?),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Interrupt> {
        match callee {
            Value::NativeFunction { arity, func, .. } => {
                Self::check_arity(arity, arguments.len(), paren)?;

                func(&arguments).map_err(|msg| Self::error(paren.line, msg))
            }

            Value::Function(function) => {
                Self::check_arity(function.arity(), arguments.len(), paren)?;

                self.call_function(&function, arguments)
            }

            Value::Class(class) => {
                Self::check_arity(class.arity(), arguments.len(), paren)?;

                self.instantiate(class, arguments)
            }

            _ => Err(Self::error(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Invoke a user function: fresh frame under the closure, parameters
    /// bound left-to-right, `return` caught here.
    pub fn call_function(
        &mut self,
        function: &LoxFunction,
        arguments: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        let environment = Rc::new(RefCell::new(Environment::with_enclosing(
            function.closure().clone(),
        )));

        for (param, argument) in function.declaration().params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        match self.execute_block(&function.declaration().body, environment) {
            Ok(()) => {
                if function.is_initializer() {
                    self.bound_this(function)
                } else {
                    Ok(Value::Nil)
                }
            }

            // An initializer always yields its instance, even on early
            // return.
            Err(Interrupt::Return(value)) => {
                if function.is_initializer() {
                    self.bound_this(function)
                } else {
                    Ok(value)
                }
            }

            Err(e) => Err(e),
        }
    }

    fn instantiate(
        &mut self,
        class: Rc<LoxClass>,
        arguments: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(Value::Instance(instance.clone()));

            self.call_function(&bound, arguments)?;
        }

        Ok(Value::Instance(instance))
    }

    fn bound_this(&self, function: &LoxFunction) -> Result<Value, Interrupt> {
        let line = function
            .declaration()
            .name
            .as_ref()
            .map_or(0, |name| name.line);

        function
            .closure()
            .borrow()
            .get_at(0, "this")
            .ok_or_else(|| Self::error(line, "Initializer lost its 'this' binding."))
    }

    fn check_arity(arity: usize, got: usize, paren: &Token) -> Result<(), Interrupt> {
        if arity != got {
            return Err(Self::error(
                paren.line,
                format!("Expected {} arguments, but got {}.", arity, got),
            ));
        }

        Ok(())
    }

    fn error<S: Into<String>>(line: usize, msg: S) -> Interrupt {
        Interrupt::Error(LoxError::runtime(line, msg))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn clock_native(_args: &[Value]) -> Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
