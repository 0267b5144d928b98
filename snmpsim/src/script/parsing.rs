//! Parses device scripts into a [`Program`].
//!
//! A script is a list of statements, one per line. `#` starts a comment that
//! runs to the end of the line, and `{ ... }` groups statements for `repeat`
//! and `loop`:
//!
//! ```text
//! # sysDescr and sysUpTime
//! set 1.3.6.1.2.1.1.1.0 "Simulated switch"
//! set 1.3.6.1.2.1.1.3.0 0
//! declare 1.3.6.1.4.1.9999.1
//!
//! repeat 10 {
//!     sleep 1s
//!     add 1.3.6.1.2.1.1.3.0 100
//!     set 1.3.6.1.4.1.9999.1 random 0 100
//! }
//! ```

use super::program::*;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{
        char, digit1, line_ending, multispace1, not_line_ending, space0, space1,
    },
    combinator::{all_consuming, cut, eof, map, map_res, opt, peek, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use snmpsim_core::{Oid, Value};
use std::time::Duration;
use thiserror::Error as ThisError;

pub type Res<T, U> = IResult<T, U, VerboseError<T>>;

/// How much of the offending line a [`ParseError`] quotes.
const SNIPPET_CHARS: usize = 30;

/// Parses the full text of a script.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let source = source.replace('\r', "");
    let parser = Parser { source: &source };
    match parser.program() {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(describe(&source, err)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::at(&source, "", "statement")),
    }
}

/// A syntax error, located in the script.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("line {line}, column {column}: expected {expected} near '{near}'")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub expected: String,
    pub near: String,
}

impl ParseError {
    /// Builds an error at `at`, which must be a suffix of `source`.
    fn at(source: &str, at: &str, expected: &str) -> Self {
        let (line, column) = line_col(source, at);
        let near: String = at
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(SNIPPET_CHARS)
            .collect();
        Self {
            line,
            column,
            expected: expected.to_string(),
            near: if near.is_empty() {
                "<end of line>".to_string()
            } else {
                near
            },
        }
    }
}

/// Turns nom's error trace into a [`ParseError`] pointing at the innermost
/// failure and naming the innermost construct being parsed.
fn describe(source: &str, err: VerboseError<&str>) -> ParseError {
    let at = err.errors.first().map(|(input, _)| *input).unwrap_or(source);
    let expected = err
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(context) => Some(*context),
            _ => None,
        })
        .unwrap_or("statement");
    ParseError::at(source, at, expected)
}

/// One-based line and column of `at` within `source`.
fn line_col(source: &str, at: &str) -> (usize, usize) {
    let offset = source.len() - at.len();
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = offset - before.rfind('\n').map_or(0, |i| i + 1) + 1;
    (line, column)
}

/// Knows the whole source so statements can record their line.
struct Parser<'s> {
    source: &'s str,
}

impl<'s> Parser<'s> {
    fn program(&self) -> Res<&'s str, Program> {
        map(
            all_consuming(preceded(
                blank,
                many0(terminated(|i| self.statement(i), blank)),
            )),
            |statements| Program { statements },
        )(self.source)
    }

    fn statement(&self, input: &'s str) -> Res<&'s str, Statement> {
        let (line, _) = line_col(self.source, input);
        let (rest, kind) = context(
            "statement",
            alt((
                map(preceded(word("declare"), cut(oid)), StatementKind::Declare),
                map(
                    preceded(word("set"), cut(separated_pair(oid, space1, expr))),
                    |(oid, expr)| StatementKind::Set(oid, expr),
                ),
                map(
                    preceded(word("add"), cut(separated_pair(oid, space1, integer))),
                    |(oid, amount)| StatementKind::Add(oid, amount),
                ),
                map(preceded(word("toggle"), cut(oid)), StatementKind::Toggle),
                map(preceded(word("clear"), cut(oid)), StatementKind::Clear),
                map(preceded(word("sleep"), cut(duration)), StatementKind::Sleep),
                map(preceded(word("log"), cut(string)), StatementKind::Log),
                map(preceded(word("fail"), cut(string)), StatementKind::Fail),
                map(
                    preceded(
                        word("repeat"),
                        cut(pair(terminated(count, space0), |i| self.block(i))),
                    ),
                    |(times, body)| StatementKind::Repeat(times, body),
                ),
                map(
                    preceded(pair(tag("loop"), space0), |i| self.block(i)),
                    StatementKind::Loop,
                ),
            )),
        )(input)?;
        let (rest, ()) = cut(end_of_statement)(rest)?;
        Ok((rest, Statement { line, kind }))
    }

    fn block(&self, input: &'s str) -> Res<&'s str, Block> {
        context(
            "block",
            preceded(
                pair(char('{'), blank),
                cut(terminated(
                    many0(terminated(|i| self.statement(i), blank)),
                    char('}'),
                )),
            ),
        )(input)
    }
}

/// A keyword followed by at least one space.
fn word<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> Res<&'a str, &'a str> {
    terminated(tag(keyword), space1)
}

/// Skips whitespace, blank lines and comments.
fn blank(input: &str) -> Res<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn comment(input: &str) -> Res<&str, &str> {
    recognize(pair(char('#'), not_line_ending))(input)
}

/// Trailing spaces and an optional comment, then a line break, the end of the
/// script, or the `}` closing the enclosing block.
fn end_of_statement(input: &str) -> Res<&str, ()> {
    context(
        "end of statement",
        value(
            (),
            tuple((
                space0,
                opt(comment),
                alt((line_ending, eof, peek(tag("}")))),
            )),
        ),
    )(input)
}

fn oid(input: &str) -> Res<&str, Oid> {
    context(
        "OID",
        map_res(
            take_while1(|c: char| c.is_ascii_digit() || c == '.'),
            Oid::parse,
        ),
    )(input)
}

fn integer(input: &str) -> Res<&str, i64> {
    context(
        "integer",
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>()
        }),
    )(input)
}

fn count(input: &str) -> Res<&str, u64> {
    context("count", map_res(digit1, |s: &str| s.parse::<u64>()))(input)
}

/// A double-quoted string with `\\`, `\"`, `\n` and `\t` escapes.
fn string(input: &str) -> Res<&str, String> {
    context(
        "string",
        delimited(
            char('"'),
            map(
                opt(escaped_transform(
                    is_not("\\\"\n"),
                    '\\',
                    alt((
                        value("\\", char('\\')),
                        value("\"", char('"')),
                        value("\n", char('n')),
                        value("\t", char('t')),
                    )),
                )),
                Option::unwrap_or_default,
            ),
            cut(char('"')),
        ),
    )(input)
}

fn boolean(input: &str) -> Res<&str, bool> {
    alt((value(true, tag("true")), value(false, tag("false"))))(input)
}

fn literal(input: &str) -> Res<&str, Value> {
    context(
        "value",
        alt((
            map(boolean, Value::Boolean),
            map(integer, Value::Integer),
            map(string, Value::String),
        )),
    )(input)
}

fn expr(input: &str) -> Res<&str, Expr> {
    alt((
        map(
            preceded(
                pair(tag("random"), space1),
                cut(separated_pair(integer, space1, integer)),
            ),
            |(low, high)| Expr::Random(low, high),
        ),
        map(literal, Expr::Literal),
    ))(input)
}

/// `N` or `Nms` for milliseconds, `Ns` for seconds.
fn duration(input: &str) -> Res<&str, Duration> {
    context(
        "duration",
        map(
            pair(
                map_res(digit1, |s: &str| s.parse::<u64>()),
                opt(alt((tag("ms"), tag("s")))),
            ),
            |(amount, unit)| match unit {
                Some("s") => Duration::from_secs(amount),
                _ => Duration::from_millis(amount),
            },
        ),
    )(input)
}
