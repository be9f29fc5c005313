use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::{Rc, Weak};

use log::{debug, info, trace, warn};

use crate::ast::{Expr, ExprId, Stmt};
use crate::callable::{Class, NativeFunction, UserFunction};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished. `return` is ordinary control flow here, not an
/// error: it unwinds through `execute` until a function call absorbs it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Dead scope handles are swept once the registry grows past this.
const PRUNE_THRESHOLD: usize = 1024;

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    /// Every scope created after startup, so teardown can break cycles.
    environments: Vec<Weak<RefCell<Environment>>>,
    prune_at: usize,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter that prints to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// Creates an interpreter whose `print` statements write to `output`.
    pub fn with_output<W: Write + 'static>(output: W) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            environments: Vec::new(),
            prune_at: PRUNE_THRESHOLD,
            output: Box::new(output),
        }
    }

    /// Registers a host function under its own name in the global scope.
    pub fn define_native<N: NativeFunction + 'static>(&mut self, native: N) {
        debug!(
            "Defining native function '{}' with arity {}",
            native.name(),
            native.arity()
        );

        let name: String = native.name().to_string();
        self.globals.borrow_mut().define(name, Value::native(native));
    }

    /// Binds an arbitrary host value in the global scope.
    pub fn define_global<K: Into<String>>(&mut self, name: K, value: Value) {
        self.globals.borrow_mut().define(name, value);
    }

    /// Called by the resolver: the expression `id` refers to a binding
    /// `depth` scopes out from where it is evaluated.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        trace!("note_local {} -> {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program"). The first runtime error
    /// stops execution and is returned.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            trace!("Executing statement: {:?}", stmt);
            if let Err(e) = self.execute(stmt) {
                // Flush what was printed before the fault.
                if let Err(flush_error) = self.output.flush() {
                    warn!("Flushing output after a runtime error failed: {}", flush_error);
                }
                return Err(e);
            }
        }

        self.output.flush()?;
        info!("Interpretation completed successfully");
        Ok(())
    }

    /// A new scope under `enclosing`, tracked for teardown.
    pub fn new_environment(&mut self, enclosing: EnvRef) -> EnvRef {
        let env: EnvRef = Rc::new(RefCell::new(Environment::with_enclosing(enclosing)));

        self.environments.push(Rc::downgrade(&env));
        if self.environments.len() >= self.prune_at {
            self.environments.retain(|weak| weak.strong_count() > 0);
            self.prune_at = (self.environments.len() * 2).max(PRUNE_THRESHOLD);
            trace!("Pruned scope registry to {}", self.environments.len());
        }

        env
    }

    /// Runs `statements` with `env` as the current scope, restoring the
    /// previous scope afterwards whether or not they fail.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> Result<Flow> {
        let previous: EnvRef = mem::replace(&mut self.environment, env);
        let result: Result<Flow> = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env: EnvRef = self.new_environment(Rc::clone(&self.environment));
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = UserFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment
                    .borrow_mut()
                    .define(decl.name.lexeme.clone(), Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Declaring class '{}'", name.lexeme);

                let previous: Option<Value> = self
                    .environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), Value::Null);

                let superclass: Option<Rc<Class>> = match superclass {
                    Some(expr) => match self.evaluate(expr) {
                        Ok(Value::Class(class)) => Some(class),
                        failed => {
                            // Put back whatever the name was bound to before the placeholder.
                            let mut env = self.environment.borrow_mut();
                            match previous {
                                Some(value) => env.define(name.lexeme.clone(), value),
                                None => env.remove(&name.lexeme),
                            };
                            drop(env);

                            failed?;
                            let token: &Token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                let method_env: EnvRef = match &superclass {
                    Some(class) => {
                        let env: EnvRef = self.new_environment(Rc::clone(&self.environment));
                        env.borrow_mut()
                            .define("super", Value::Class(Rc::clone(class)));
                        env
                    }
                    None => Rc::clone(&self.environment),
                };

                let methods: HashMap<String, Rc<UserFunction>> = methods
                    .iter()
                    .map(|decl| {
                        let function = UserFunction::new(
                            Rc::clone(decl),
                            Rc::clone(&method_env),
                            decl.name.lexeme == "init",
                        );
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = Class::new(name.lexeme.clone(), superclass, methods);
                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;

                info!("Class '{}' defined", name.lexeme);
                Ok(Flow::Normal)
            }
        }
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;
                evaluate_unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                evaluate_binary(left, operator, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        if !Environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        ) {
                            return Err(undefined_variable(name));
                        }
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let arguments: Vec<Value> = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<_>>()?;

                self.call(callee, paren, &arguments)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name, self),
                Value::Array(array) => array.member(name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value = self.evaluate(value)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }
                Value::Array(_) => Err(LoxError::runtime(name, "Cannot add attributes to arrays.")),
                _ => Err(LoxError::runtime(name, "Only instances have fields.")),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the superclass lives `distance` scopes out and `this`
    /// one scope closer.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = self
            .locals
            .get(&id)
            .copied()
            .ok_or_else(|| LoxError::runtime(keyword, "Can't use 'super' outside of a class."))?;

        let superclass: Rc<Class> = match Environment::get_at(&self.environment, distance, "super") {
            Some(Value::Class(class)) => class,
            _ => return Err(LoxError::runtime(keyword, "Superclass must be a class.")),
        };

        let object = match distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        {
            Some(Value::Instance(instance)) => instance,
            _ => return Err(LoxError::runtime(keyword, "Can't use 'this' outside of a class.")),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(found.bind(self, object))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    /// Invokes a callable (native, user function or class).
    fn call(&mut self, callee: Value, paren: &Token, arguments: &[Value]) -> Result<Value> {
        match callee {
            Value::Native(native) => {
                check_arity(native.arity(), arguments.len(), paren)?;
                debug!("Calling native function '{}'", native.name());
                native
                    .call(self, arguments)
                    .map_err(|message| LoxError::runtime(paren, message))
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;
                function.call(self, arguments)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;
                class.instantiate(self, arguments)
            }

            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }
}

impl Drop for Interpreter {
    /// Closures keep their defining scope alive and scopes hold closures, so
    /// reference counting alone never frees them. Emptying every scope that
    /// is still alive breaks those cycles.
    fn drop(&mut self) {
        debug!("Tearing down {} tracked scope(s)", self.environments.len());

        for weak in self.environments.drain(..) {
            if let Some(env) = weak.upgrade() {
                if let Ok(mut scope) = env.try_borrow_mut() {
                    scope.clear();
                }
            }
        }

        if let Ok(mut globals) = self.globals.try_borrow_mut() {
            globals.clear();
        }
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        ))
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

/// Evaluates a unary expression.
fn evaluate_unary(operator: &Token, right: Value) -> Result<Value> {
    if let TokenType::BANG = operator.token_type {
        return Ok(Value::Bool(!right.is_truthy()));
    }

    let Value::Number(n) = right else {
        return Err(LoxError::runtime(
            operator,
            format!("Operand of '{}' must be a number.", operator.lexeme),
        ));
    };

    match operator.token_type {
        TokenType::MINUS => Ok(Value::Number(-n)),
        TokenType::PLUS_PLUS => Ok(Value::Number(n + 1.0)),
        TokenType::MINUS_MINUS => Ok(Value::Number(n - 1.0)),
        _ => Err(LoxError::runtime(
            operator,
            format!("Unknown unary operator '{}'.", operator.lexeme),
        )),
    }
}

/// Evaluates a binary expression.
fn evaluate_binary(left: Value, operator: &Token, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left.is_equal(&right))),
        TokenType::BANG_EQUAL => return Ok(Value::Bool(!left.is_equal(&right))),
        TokenType::PLUS => {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (a @ Value::String(_), b) | (a, b @ Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                _ => Err(LoxError::runtime(
                    operator,
                    "Operands of '+' must be numbers or strings.",
                )),
            };
        }
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(LoxError::runtime(
            operator,
            format!("Operands of '{}' must be numbers.", operator.lexeme),
        ));
    };
    let (a, b) = (*a, *b);

    let value: Value = match operator.token_type {
        TokenType::MINUS => Value::Number(a - b),
        TokenType::STAR => Value::Number(a * b),
        TokenType::SLASH => Value::Number(a / b),
        TokenType::PERCENT => Value::Number(a % b),
        TokenType::SLASH_PERCENT => Value::Number((a / b).floor()),
        TokenType::STAR_STAR => Value::Number(a.powf(b)),
        TokenType::GREATER => Value::Bool(a > b),
        TokenType::GREATER_EQUAL => Value::Bool(a >= b),
        TokenType::LESS => Value::Bool(a < b),
        TokenType::LESS_EQUAL => Value::Bool(a <= b),
        _ => {
            return Err(LoxError::runtime(
                operator,
                format!("Unknown binary operator '{}'.", operator.lexeme),
            ))
        }
    };

    Ok(value)
}
