//! Types produced by parsing a device script.

use snmpsim_core::{Oid, Value};
use std::time::Duration;

pub type Block = Vec<Statement>;

/// A parsed script: the top-level statements, run in order.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    pub statements: Block,
}

impl Program {
    /// Every OID the program names, first appearance first, without repeats.
    pub fn oids(&self) -> Vec<Oid> {
        let mut oids = Vec::new();
        collect_oids(&self.statements, &mut oids);
        oids
    }
}

fn collect_oids(block: &[Statement], oids: &mut Vec<Oid>) {
    for statement in block {
        match &statement.kind {
            StatementKind::Declare(oid)
            | StatementKind::Set(oid, _)
            | StatementKind::Add(oid, _)
            | StatementKind::Toggle(oid)
            | StatementKind::Clear(oid) => {
                if !oids.contains(oid) {
                    oids.push(oid.clone());
                }
            }
            StatementKind::Repeat(_, body) | StatementKind::Loop(body) => collect_oids(body, oids),
            StatementKind::Sleep(_) | StatementKind::Log(_) | StatementKind::Fail(_) => {}
        }
    }
}

/// One statement and the line it starts on.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StatementKind {
    /// `declare OID`
    Declare(Oid),
    /// `set OID EXPR`
    Set(Oid, Expr),
    /// `add OID INT`
    Add(Oid, i64),
    /// `toggle OID`
    Toggle(Oid),
    /// `clear OID`
    Clear(Oid),
    /// `sleep DURATION`
    Sleep(Duration),
    /// `repeat N { ... }`
    Repeat(u64, Block),
    /// `loop { ... }`
    Loop(Block),
    /// `log "text"`
    Log(String),
    /// `fail "text"`
    Fail(String),
}

/// The right-hand side of `set`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Expr {
    Literal(Value),
    /// `random LO HI`, inclusive on both ends.
    Random(i64, i64),
}
