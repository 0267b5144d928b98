use super::program::*;
use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use snmpsim_core::{Engine, Oid, StoreError, Value, ValueStore};
use std::sync::{Mutex, PoisonError};
use thiserror::Error as ThisError;

/// Runs a parsed [`Program`] against a device's [`ValueStore`].
///
/// `random` draws from a [`SmallRng`]; give it a seed with
/// [`with_seed`](Interpreter::with_seed) to make a run repeatable.
#[derive(Debug)]
pub struct Interpreter {
    rng: Mutex<SmallRng>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    fn exec<'a>(
        &'a self,
        block: &'a [Statement],
        store: &'a ValueStore,
    ) -> BoxFuture<'a, Result<(), ExecError>> {
        async move {
            for statement in block {
                let result = match &statement.kind {
                    StatementKind::Declare(_) => Ok(()),
                    StatementKind::Set(oid, expr) => self.evaluate(expr).and_then(|value| {
                        tracing::trace!(line = statement.line, "{oid} = {value}");
                        store.set(oid, value).map_err(ExecErrorKind::from)
                    }),
                    StatementKind::Add(oid, amount) => add(store, oid, *amount),
                    StatementKind::Toggle(oid) => toggle(store, oid),
                    StatementKind::Clear(oid) => store
                        .set(oid, Value::Absent)
                        .map_err(ExecErrorKind::from),
                    StatementKind::Sleep(duration) => {
                        tokio::time::sleep(*duration).await;
                        Ok(())
                    }
                    StatementKind::Repeat(times, body) => {
                        for _ in 0..*times {
                            self.exec(body, store).await?;
                            tokio::task::yield_now().await;
                        }
                        Ok(())
                    }
                    StatementKind::Loop(body) => loop {
                        self.exec(body, store).await?;
                        tokio::task::yield_now().await;
                    },
                    StatementKind::Log(text) => {
                        tracing::info!(line = statement.line, "{text}");
                        Ok(())
                    }
                    StatementKind::Fail(text) => Err(ExecErrorKind::Failed(text.clone())),
                };
                result.map_err(|kind| ExecError {
                    line: statement.line,
                    kind,
                })?;
            }
            Ok(())
        }
        .boxed()
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value, ExecErrorKind> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Random(low, high) if low > high => Err(ExecErrorKind::EmptyRange {
                low: *low,
                high: *high,
            }),
            Expr::Random(low, high) => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Value::Integer(rng.gen_range(*low..=*high)))
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn add(store: &ValueStore, oid: &Oid, amount: i64) -> Result<(), ExecErrorKind> {
    store.update(oid, |value| match value {
        Value::Integer(n) => match n.checked_add(amount) {
            Some(sum) => {
                *n = sum;
                Ok(())
            }
            None => Err(ExecErrorKind::Overflow {
                oid: oid.clone(),
                amount,
            }),
        },
        other => Err(ExecErrorKind::NotAnInteger {
            oid: oid.clone(),
            found: other.type_name(),
        }),
    })?
}

fn toggle(store: &ValueStore, oid: &Oid) -> Result<(), ExecErrorKind> {
    store.update(oid, |value| match value {
        Value::Boolean(b) => {
            *b = !*b;
            Ok(())
        }
        other => Err(ExecErrorKind::NotABoolean {
            oid: oid.clone(),
            found: other.type_name(),
        }),
    })?
}

#[async_trait]
impl Engine for Interpreter {
    type Program = Program;
    type Error = ExecError;

    fn init(&self, program: &Program) -> Vec<String> {
        program.oids().iter().map(Oid::to_string).collect()
    }

    async fn run(&self, program: &Program, store: &ValueStore) -> Result<(), ExecError> {
        tracing::debug!("Running {} statements", program.statements.len());
        self.exec(&program.statements, store).await
    }
}

/// A statement that could not be carried out, and where it is.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ExecError {
    pub line: usize,
    pub kind: ExecErrorKind,
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ExecErrorKind {
    #[error("{oid} holds a value of type {found}, not an integer")]
    NotAnInteger { oid: Oid, found: &'static str },
    #[error("{oid} holds a value of type {found}, not a boolean")]
    NotABoolean { oid: Oid, found: &'static str },
    #[error("adding {amount} to {oid} overflows")]
    Overflow { oid: Oid, amount: i64 },
    #[error("random range {low}..{high} is empty")]
    EmptyRange { low: i64, high: i64 },
    #[error("script failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_program;
    use std::time::{Duration, Instant};

    fn oid(s: &str) -> Oid {
        Oid::parse(s).unwrap()
    }

    async fn run(source: &str) -> (Result<(), ExecError>, ValueStore) {
        let program = parse_program(source).unwrap();
        let interpreter = Interpreter::with_seed(7);
        let store = ValueStore::new(program.oids());
        let result = interpreter.run(&program, &store).await;
        (result, store)
    }

    #[test]
    fn init_lists_canonical_oids() {
        let program = parse_program("declare 1.3.6.01\nset 1.3.6.1 1\ntoggle 1.2\n").unwrap();
        assert_eq!(Interpreter::new().init(&program), ["1.3.6.1", "1.2"]);
    }

    #[tokio::test]
    async fn updates_values() {
        let (result, store) = run(
            "set 1.1 10\nadd 1.1 -3\nset 1.2 false\ntoggle 1.2\nset 1.3 \"x\"\nclear 1.3\ndeclare 1.4\n",
        )
        .await;
        result.unwrap();
        assert_eq!(store.get(&oid("1.1")), Some(Value::Integer(7)));
        assert_eq!(store.get(&oid("1.2")), Some(Value::Boolean(true)));
        assert_eq!(store.get(&oid("1.3")), Some(Value::Absent));
        assert_eq!(store.get(&oid("1.4")), Some(Value::Absent));
    }

    #[tokio::test]
    async fn repeats_blocks() {
        let (result, store) = run("set 1.1 0\nrepeat 5 {\n  repeat 3 { add 1.1 2 }\n}\n").await;
        result.unwrap();
        assert_eq!(store.get(&oid("1.1")), Some(Value::Integer(30)));
    }

    #[tokio::test]
    async fn random_stays_in_range() {
        let (result, store) =
            run("repeat 200 {\n  set 1.1 random -2 2\n  set 1.2 random 9 9\n}\n").await;
        result.unwrap();
        match store.get(&oid("1.1")) {
            Some(Value::Integer(n)) => assert!((-2..=2).contains(&n)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.get(&oid("1.2")), Some(Value::Integer(9)));
    }

    #[tokio::test]
    async fn seeded_runs_repeat() {
        let source = "set 1.1 random 0 1000000";
        let (_, first) = run(source).await;
        let (_, second) = run(source).await;
        assert_eq!(first.get(&oid("1.1")), second.get(&oid("1.1")));
    }

    #[tokio::test]
    async fn reports_type_mismatches() {
        let (result, _) = run("declare 1.1\nadd 1.1 1\n").await;
        assert_eq!(
            result.unwrap_err(),
            ExecError {
                line: 2,
                kind: ExecErrorKind::NotAnInteger {
                    oid: oid("1.1"),
                    found: "absent"
                }
            }
        );

        let (result, _) = run("set 1.1 3\ntoggle 1.1\n").await;
        assert!(matches!(
            result.unwrap_err().kind,
            ExecErrorKind::NotABoolean { found: "integer", .. }
        ));
    }

    #[tokio::test]
    async fn reports_overflow_and_keeps_value() {
        let (result, store) = run(&format!("set 1.1 {}\nadd 1.1 1\n", i64::MAX)).await;
        assert!(matches!(
            result.unwrap_err().kind,
            ExecErrorKind::Overflow { amount: 1, .. }
        ));
        assert_eq!(store.get(&oid("1.1")), Some(Value::Integer(i64::MAX)));
    }

    #[tokio::test]
    async fn reports_empty_range() {
        let (result, _) = run("set 1.1 random 5 4").await;
        assert_eq!(
            result.unwrap_err().kind,
            ExecErrorKind::EmptyRange { low: 5, high: 4 }
        );
    }

    #[tokio::test]
    async fn fail_stops_the_script() {
        let (result, store) = run("set 1.1 1\nfail \"fan stopped\"\nset 1.1 2\n").await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "line 2: script failed: fan stopped");
        assert_eq!(store.get(&oid("1.1")), Some(Value::Integer(1)));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn set_traces_the_new_value() {
        let (result, _) = run("set 1.1 \"eth0\"\nset 1.2 -4\n").await;
        result.unwrap();
        assert!(logs_contain("1.1 = \"eth0\""));
        assert!(logs_contain("1.2 = -4"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn log_statement_logs() {
        let (result, _) = run("log \"link flapped\"").await;
        result.unwrap();
        assert!(logs_contain("link flapped"));
    }

    #[tokio::test]
    async fn sleeps_between_statements() {
        let start = Instant::now();
        let (result, _) = run("sleep 30ms\nsleep 20\n").await;
        result.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn loop_runs_until_an_error() {
        let (result, store) = run(&format!(
            "set 1.1 {}\nloop {{\n  add 1.1 1\n}}\n",
            i64::MAX - 8
        ))
        .await;
        assert_eq!(result.unwrap_err().line, 3);
        assert_eq!(store.get(&oid("1.1")), Some(Value::Integer(i64::MAX)));
    }
}
