use crate::{
    engine::Engine,
    shutdown::{ExitStatus, Shutdown},
    store::ValueStore,
};
use std::sync::Arc;

/// Runs the script to completion against `store`, then fires `shutdown`.
///
/// Script errors are logged and reported as [`ExitStatus::ScriptFailed`];
/// they still end the simulation normally.
pub async fn run_program<E: Engine>(
    engine: Arc<E>,
    program: Arc<E::Program>,
    store: Arc<ValueStore>,
    shutdown: Shutdown,
) -> ExitStatus {
    let status = match engine.run(&program, &store).await {
        Ok(()) => {
            tracing::info!("Script finished");
            ExitStatus::Completed
        }
        Err(err) => {
            tracing::error!("Interpreting error: {err}");
            ExitStatus::ScriptFailed
        }
    };
    shutdown.shut_down_with_status(status);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{oid::Oid, Value};
    use async_trait::async_trait;

    /// Writes one value, then optionally fails.
    struct OneShot {
        fail: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[async_trait]
    impl Engine for OneShot {
        type Program = Oid;
        type Error = Boom;

        fn init(&self, program: &Oid) -> Vec<String> {
            vec![program.to_string()]
        }

        async fn run(&self, program: &Oid, store: &ValueStore) -> Result<(), Boom> {
            store.set(program, Value::Integer(7)).map_err(|_| Boom)?;
            if self.fail {
                return Err(Boom);
            }
            Ok(())
        }
    }

    async fn run(fail: bool) -> (ExitStatus, Shutdown, Arc<ValueStore>) {
        let oid = Oid::from([1, 3, 6, 1]);
        let store = Arc::new(ValueStore::new([oid.clone()]));
        let shutdown = Shutdown::new();
        let status = run_program(
            Arc::new(OneShot { fail }),
            Arc::new(oid),
            store.clone(),
            shutdown.clone(),
        )
        .await;
        (status, shutdown, store)
    }

    #[tokio::test]
    async fn success_fires_shutdown() {
        let (status, shutdown, store) = run(false).await;
        assert_eq!(status, ExitStatus::Completed);
        assert_eq!(shutdown.status(), Some(ExitStatus::Completed));
        assert_eq!(store.get(&Oid::from([1, 3, 6, 1])), Some(Value::Integer(7)));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failure_still_fires_shutdown() {
        let (status, shutdown, _) = run(true).await;
        assert_eq!(status, ExitStatus::ScriptFailed);
        assert_eq!(shutdown.status(), Some(ExitStatus::ScriptFailed));
        assert!(logs_contain("Interpreting error: boom"));
    }
}
