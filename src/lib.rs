//! Walrus: a small dynamically typed scripting language with closures,
//! single-inheritance classes and fixed-size arrays.
//!
//! Source goes through four stages: [`scanner`] → [`parser`] → [`resolver`]
//! → [`interpreter`]. [`run`] drives all of them for one unit of input.

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use callable::NativeFunction;
pub use error::LoxError;
pub use interpreter::Interpreter;
pub use output::CaptureOutput;
pub use value::Value;

use log::info;

use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Scans, parses, resolves and executes `source` on `interpreter`.
///
/// Lexical and syntax errors are reported together and stop the run before
/// resolution; resolution errors stop it before execution. A runtime error
/// stops execution and is returned on its own. Globals defined by earlier
/// runs stay visible, so a host can feed a REPL one line at a time.
pub fn run(interpreter: &mut Interpreter, source: &str) -> Result<(), Vec<LoxError>> {
    let (tokens, mut errors) = Scanner::new(source).scan_all();

    let (statements, parse_errors) = Parser::new(tokens).parse_recovering();
    errors.extend(parse_errors);

    if !errors.is_empty() {
        info!("Run stopped with {} syntax error(s)", errors.len());
        return Err(errors);
    }

    Resolver::new(interpreter).resolve(&statements)?;

    interpreter.interpret(&statements).map_err(|e| vec![e])
}
