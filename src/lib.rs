//! Core implementation of the Class language: a small-step structural
//! operational semantics interpreter for a minimal class-based imperative
//! language. A program declares classes and ends in an initial statement;
//! execution rewrites the program one reduction at a time, so a host can
//! pause between any two steps, inspect and label objects in the store, and
//! resume. The main usage of this crate is to [load] a program into a
//! [Machine] and step it.
//!
//! ```
//! let mut machine = class_lang::load(
//!     "
//!     class Counter is begin
//!       var value;
//!       constructor(v) is value := v;
//!       method get() is return value;
//!     end;
//!     new Counter(x)
//!     ",
//! )
//! .unwrap();
//!
//! // The constructor argument `x` is unbound, so the first step fails; the
//! // configuration stays available for inspection.
//! let error = machine.execute_next().unwrap_err();
//! assert_eq!(
//!     error.to_string(),
//!     "Runtime error in step 1: undefined name `x`"
//! );
//! assert!(machine.inspect(".", 0).is_ok());
//! ```

#![deny(clippy::all)]

pub mod ast;
mod consts;
pub mod error;
mod inspect;
mod machine;
mod parse;
mod printer;
mod store;
mod util;

pub use consts::MAX_STEP_COUNT;
pub use inspect::{InspectedObject, InternalKey, ObjectPath, Segment};
pub use machine::Machine;
pub use printer::{program_to_string, stmt_to_string};
pub use store::{ClassObject, Method, Reference, StateKey, Store, Value};
pub use util::Span;

use ast::Program;
use error::ParseError;

/// Parse a complete Class program. The parser is total on success; a failure
/// reports the line and column of the offending position.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    parse::parse(source)
}

/// Parse a program and allocate a [Machine] ready to execute it.
pub fn load(source: &str) -> Result<Machine, ParseError> {
    Ok(Machine::new(parse::parse(source)?))
}
