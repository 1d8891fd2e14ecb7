//! cairn is a concatenative stack language: programs are sequences of
//! tokens evaluated left to right against a value stack. Dicts carry
//! metatables for operator overloading, lists of numbers vectorize
//! arithmetic, and numbers promote through int, bignum, rational, real
//! and complex as needed.

pub mod env;
pub mod ext;
pub mod interp;
pub mod obj;
pub mod ops;
pub mod parser;
pub mod symbol;

use thiserror::Error;

pub use interp::{Runtime, RuntimeError, Stack};
pub use obj::{Block, Number, Obj};
pub use parser::SyntaxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Compile and run `src` on a fresh stack, returning the stack contents.
pub fn eval(rt: &mut Runtime, src: &str) -> Result<Vec<Obj>, Error> {
    let block = rt.compile(src)?;
    let mut stack = Stack::new();
    rt.run_instrs(block.instrs(), &mut stack)?;
    Ok(stack.take_all())
}

/// `eval` rendered with `repr`, items separated by spaces. This is what
/// the REPL prints after each line.
pub fn eval_to_string(rt: &mut Runtime, src: &str) -> Result<String, Error> {
    let items = eval(rt, src)?;
    let parts: Vec<String> = items.iter().map(|o| o.repr(rt.symbols())).collect();
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_leaves_stack_contents() {
        let mut rt = Runtime::new();
        let out = eval_to_string(&mut rt, "1 2 + 4").unwrap();
        assert_eq!(out, "3 4");
    }

    #[test]
    fn variables_persist_across_eval_calls() {
        let mut rt = Runtime::new();
        eval(&mut rt, "7:x").unwrap();
        assert_eq!(eval_to_string(&mut rt, "x 1 +").unwrap(), "8");
    }

    #[test]
    fn syntax_and_runtime_errors_are_distinct() {
        let mut rt = Runtime::new();
        assert!(matches!(eval(&mut rt, "[1 2"), Err(Error::Syntax(_))));
        assert!(matches!(eval(&mut rt, "1 0 .%"), Err(Error::Runtime(_))));
    }
}
