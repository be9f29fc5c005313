//! Callable runtime objects: host natives, user functions, classes, and the
//! two heap objects scripts can hold, instances and arrays.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// A function implemented by the host.
///
/// The interpreter checks the argument count against `arity` before calling.
/// An `Err(message)` becomes a runtime error reported at the call site.
pub trait NativeFunction {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
    ) -> std::result::Result<Value, String>;
}

// ───────────────────────────── functions ──────────────────────────────

/// A script function or method together with the scope it closed over.
pub struct UserFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvRef,
    pub is_initializer: bool,
}

impl UserFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Runs the body in a fresh scope whose parent is the closure, not the
    /// caller's scope.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value> {
        debug!("Calling <fn {}> with {} argument(s)", self.name(), arguments.len());

        let env: EnvRef = interpreter.new_environment(Rc::clone(&self.closure));
        {
            let mut scope = env.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                scope.define(param.lexeme.clone(), argument.clone());
            }
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, env)?;

        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this").unwrap_or(Value::Null));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    pub fn bind(&self, interpreter: &mut Interpreter, instance: Rc<Instance>) -> Rc<UserFunction> {
        let env: EnvRef = interpreter.new_environment(Rc::clone(&self.closure));
        env.borrow_mut().define("this", Value::Instance(instance));

        Rc::new(UserFunction::new(
            Rc::clone(&self.declaration),
            env,
            self.is_initializer,
        ))
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ───────────────────────────── classes ────────────────────────────────

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<UserFunction>>,
}

impl Class {
    pub fn new<S: Into<String>>(
        name: S,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<UserFunction>>,
    ) -> Self {
        Self {
            name: name.into(),
            superclass,
            methods,
        }
    }

    /// Own methods first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<UserFunction>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self.superclass.as_ref()?.find_method(name),
        }
    }

    /// A class takes whatever its initializer takes.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Calling a class: allocate an instance, then run `init` on it if the
    /// class (or an ancestor) defines one.
    pub fn instantiate(
        self: &Rc<Self>,
        interpreter: &mut Interpreter,
        arguments: &[Value],
    ) -> Result<Value> {
        debug!("Instantiating class {}", self.name);

        let instance: Rc<Instance> = Rc::new(Instance::new(Rc::clone(self)));

        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(interpreter, Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Fields shadow methods. A method comes back bound to this instance.
    pub fn get(self: &Rc<Self>, name: &Token, interpreter: &mut Interpreter) -> Result<Value> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = self.class.find_method(&name.lexeme) {
            let bound: Rc<UserFunction> = method.bind(interpreter, Rc::clone(self));
            return Ok(Value::Function(bound));
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

// ────────────────────────────── arrays ────────────────────────────────

/// Fixed-length array. Scripts reach it only through `get`, `set` and
/// `length`.
pub struct Array {
    elements: RefCell<Box<[Value]>>,
}

impl Array {
    pub fn new(len: usize) -> Self {
        Self {
            elements: RefCell::new(vec![Value::Null; len].into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` truncated toward zero; `None` when out of range.
    pub fn get(&self, index: f64) -> Option<Value> {
        let slot: usize = self.slot(index)?;
        self.elements.borrow().get(slot).cloned()
    }

    /// Stores `value` at `index`; `false` when out of range.
    pub fn set(&self, index: f64, value: Value) -> bool {
        let Some(slot) = self.slot(index) else {
            return false;
        };

        match self.elements.borrow_mut().get_mut(slot) {
            Some(element) => {
                *element = value;
                true
            }
            None => false,
        }
    }

    fn slot(&self, index: f64) -> Option<usize> {
        let index: f64 = index.trunc();
        if index.is_nan() || index < 0.0 {
            return None;
        }
        Some(index as usize)
    }

    /// Member access on an array value.
    pub fn member(self: &Rc<Self>, name: &Token) -> Result<Value> {
        match name.lexeme.as_str() {
            "get" => Ok(Value::native(ArrayGet(Rc::clone(self)))),
            "set" => Ok(Value::native(ArraySet(Rc::clone(self)))),
            "length" => Ok(Value::Number(self.len() as f64)),
            other => Err(LoxError::runtime(
                name,
                format!("Undefined property '{}'.", other),
            )),
        }
    }
}

impl Array {
    /// Writes `[a, b]`. `open` holds the arrays already being written further
    /// up, so an array reached again prints as `[...]` instead of recursing.
    fn write_nested(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<*const Array>) -> fmt::Result {
        let this: *const Array = self;
        if open.contains(&this) {
            return write!(f, "[...]");
        }

        open.push(this);
        write!(f, "[")?;
        for (i, element) in self.elements.borrow().iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            match element {
                Value::Array(inner) => inner.write_nested(f, open)?,
                other => write!(f, "{}", other)?,
            }
        }
        open.pop();
        write!(f, "]")
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_nested(f, &mut Vec::new())
    }
}

fn index_argument(arguments: &[Value], method: &str) -> std::result::Result<f64, String> {
    match arguments.first() {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(format!("Index passed to '{}' must be a number.", method)),
    }
}

/// `array.get(i)`, bound to one array.
struct ArrayGet(Rc<Array>);

impl NativeFunction for ArrayGet {
    fn name(&self) -> &str {
        "get"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&self, _: &mut Interpreter, arguments: &[Value]) -> std::result::Result<Value, String> {
        let index: f64 = index_argument(arguments, "get")?;

        self.0
            .get(index)
            .ok_or_else(|| "Index out of bounds in 'get'.".to_string())
    }
}

/// `array.set(i, value)`, bound to one array. Returns the stored value.
struct ArraySet(Rc<Array>);

impl NativeFunction for ArraySet {
    fn name(&self) -> &str {
        "set"
    }

    fn arity(&self) -> usize {
        2
    }

    fn call(&self, _: &mut Interpreter, arguments: &[Value]) -> std::result::Result<Value, String> {
        let index: f64 = index_argument(arguments, "set")?;
        let value: Value = arguments.get(1).cloned().unwrap_or(Value::Null);

        if self.0.set(index, value.clone()) {
            Ok(value)
        } else {
            Err("Index out of bounds in 'set'.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 7)
    }

    #[test]
    fn test_array_bounds() {
        let array = Array::new(3);

        assert_eq!(array.len(), 3);
        assert_eq!(array.get(0.0), Some(Value::Null));
        assert_eq!(array.get(3.0), None);
        assert_eq!(array.get(-1.0), None);
        assert_eq!(array.get(f64::NAN), None);

        assert!(array.set(2.9, Value::Number(4.0)));
        assert_eq!(array.get(2.0), Some(Value::Number(4.0)));
        assert!(!array.set(10.0, Value::Null));
        assert_eq!(array.to_string(), "[null, null, 4]");
    }

    #[test]
    fn test_array_display_stops_at_cycles() {
        let array = Rc::new(Array::new(2));
        array.set(0.0, Value::Array(Rc::clone(&array)));
        array.set(1.0, Value::Number(1.0));

        assert_eq!(array.to_string(), "[[...], 1]");
        assert_eq!(Value::Array(Rc::clone(&array)).to_string(), "[[...], 1]");

        // Break the cycle.
        array.set(0.0, Value::Null);
    }

    #[test]
    fn test_array_members() {
        let mut interpreter = Interpreter::new();
        let array = Rc::new(Array::new(2));

        assert_eq!(
            array.member(&ident("length")).unwrap(),
            Value::Number(2.0)
        );

        let Value::Native(set) = array.member(&ident("set")).unwrap() else {
            panic!("set should be a native");
        };
        let stored = set
            .call(&mut interpreter, &[Value::Number(1.0), Value::String("x".into())])
            .unwrap();
        assert_eq!(stored, Value::String("x".into()));

        let Value::Native(get) = array.member(&ident("get")).unwrap() else {
            panic!("get should be a native");
        };
        assert_eq!(
            get.call(&mut interpreter, &[Value::Number(1.0)]).unwrap(),
            Value::String("x".into())
        );
        assert_eq!(
            get.call(&mut interpreter, &[Value::Number(5.0)]).unwrap_err(),
            "Index out of bounds in 'get'."
        );

        let err = array.member(&ident("push")).unwrap_err();
        assert_eq!(err.message(), "Undefined property 'push'.");
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn test_class_method_lookup_walks_superclass() {
        let closure: EnvRef = Rc::new(RefCell::new(Environment::new()));
        let decl = |name: &str, params: usize| {
            Rc::new(FunctionDecl {
                name: ident(name),
                params: (0..params).map(|i| ident(&format!("p{}", i))).collect(),
                body: Vec::new(),
            })
        };

        let mut base_methods = HashMap::new();
        base_methods.insert(
            "init".to_string(),
            Rc::new(UserFunction::new(decl("init", 2), Rc::clone(&closure), true)),
        );
        base_methods.insert(
            "greet".to_string(),
            Rc::new(UserFunction::new(decl("greet", 0), Rc::clone(&closure), false)),
        );
        let base = Rc::new(Class::new("Base", None, base_methods));

        let mut derived_methods = HashMap::new();
        derived_methods.insert(
            "greet".to_string(),
            Rc::new(UserFunction::new(decl("greet", 1), Rc::clone(&closure), false)),
        );
        let derived = Class::new("Derived", Some(Rc::clone(&base)), derived_methods);

        assert_eq!(derived.find_method("greet").map(|m| m.arity()), Some(1));
        assert_eq!(base.find_method("greet").map(|m| m.arity()), Some(0));
        assert!(derived.find_method("missing").is_none());
        assert_eq!(derived.arity(), 2);
        assert_eq!(Class::new("Empty", None, HashMap::new()).arity(), 0);
    }

    #[test]
    fn test_instance_fields_shadow_methods() {
        let mut interpreter = Interpreter::new();
        let closure: EnvRef = Rc::new(RefCell::new(Environment::new()));
        let method = Rc::new(UserFunction::new(
            Rc::new(FunctionDecl {
                name: ident("size"),
                params: Vec::new(),
                body: Vec::new(),
            }),
            closure,
            false,
        ));

        let mut methods = HashMap::new();
        methods.insert("size".to_string(), method);
        let class = Rc::new(Class::new("Box", None, methods));
        let instance = Rc::new(Instance::new(class));

        assert!(matches!(
            instance.get(&ident("size"), &mut interpreter).unwrap(),
            Value::Function(_)
        ));

        instance.set(&ident("size"), Value::Number(3.0));
        assert_eq!(
            instance.get(&ident("size"), &mut interpreter).unwrap(),
            Value::Number(3.0)
        );

        let err = instance.get(&ident("other"), &mut interpreter).unwrap_err();
        assert_eq!(err.message(), "Undefined property 'other'.");
        assert_eq!(Value::Instance(instance).to_string(), "Box instance");
    }
}
