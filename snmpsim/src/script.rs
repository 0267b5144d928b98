//! The device script language: parsing text into a [`Program`] and running it
//! with the [`Interpreter`] engine.

mod interp;
pub use interp::{ExecError, ExecErrorKind, Interpreter};

mod parsing;
pub use parsing::{parse_program, ParseError};

mod program;
pub use program::{Block, Expr, Program, Statement, StatementKind};
