use crate::{
    config::SimConfig,
    device::Device,
    engine::Engine,
    mutation::run_program,
    responder::{Responder, TransportError},
    shutdown::{ExitStatus, Shutdown},
    store::ValueStore,
};
use std::{io, sync::Arc};
use thiserror::Error as ThisError;
use tokio::task::JoinSet;
use tracing::{instrument::WithSubscriber, Instrument};

/// Coordinates the two long-lived tasks of a simulation: the mutation task
/// running the script and the responder serving requests.
///
/// [`wait`](Sim::wait) is the join barrier: it returns only once every started
/// task has finished, except when the responder hits a transport failure,
/// which is reported at once. When a `Sim` is dropped its tasks are aborted.
///
/// # Examples
///
/// ```no_run
/// # use snmpsim_core::{Agent, Responder, Sim, ValueStore};
/// # use std::{sync::Arc, time::Duration};
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sim = Sim::new();
/// let store = Arc::new(ValueStore::default());
/// let agent = Agent::new(store);
/// let responder = Responder::bind(
///     "127.0.0.1:1161".parse()?,
///     agent,
///     Duration::from_secs(5),
///     sim.get_shutdown(),
/// )
/// .await?;
/// sim.start_responder(responder);
///
/// // Nothing else will fire the signal, so do it by hand.
/// sim.get_shutdown().shut_down();
/// sim.wait().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Sim {
    /// Stores all the running tasks.
    tasks: JoinSet<TaskOutcome>,
    /// Shared with the mutation task (which fires it) and the responder
    /// (which polls it).
    shutdown: Shutdown,
}

enum TaskOutcome {
    Mutation(ExitStatus),
    Responder(Result<(), TransportError>),
}

impl Sim {
    /// Creates a new Sim with no tasks.
    pub fn new() -> Sim {
        Self::default()
    }

    /// Gets the shutdown signal shared by this sim's tasks.
    pub fn get_shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawns the mutation task. The current tracing subscriber and span go
    /// with it.
    pub fn start_mutation<E: Engine>(
        &mut self,
        engine: Arc<E>,
        program: Arc<E::Program>,
        store: Arc<ValueStore>,
    ) {
        let fut = run_program(engine, program, store, self.shutdown.clone());
        self.tasks.spawn(
            async move { TaskOutcome::Mutation(fut.await) }
                .in_current_span()
                .with_current_subscriber(),
        );
    }

    /// Spawns the responder loop. It should have been bound with this sim's
    /// [`Shutdown`].
    pub fn start_responder(&mut self, responder: Responder) {
        self.tasks.spawn(
            async move { TaskOutcome::Responder(responder.run().await) }
                .in_current_span()
                .with_current_subscriber(),
        );
    }

    /// Waits for every task to finish and returns the status the shutdown
    /// signal fired with.
    ///
    /// A task that panics fires the signal with [`ExitStatus::Aborted`] so the
    /// other one still stops, and is reported once both are done.
    pub async fn wait(mut self) -> Result<ExitStatus, SimError> {
        let mut failure = None;
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(TaskOutcome::Mutation(status)) => {
                    tracing::debug!("Mutation task done: {status:?}")
                }
                Ok(TaskOutcome::Responder(Ok(()))) => tracing::debug!("Responder done"),
                Ok(TaskOutcome::Responder(Err(err))) => return Err(SimError::Transport(err)),
                Err(err) => {
                    tracing::error!("A simulation task failed: {err}");
                    self.shutdown.shut_down_with_status(ExitStatus::Aborted);
                    failure = Some(err.to_string());
                }
            }
        }
        if let Some(message) = failure {
            return Err(SimError::TaskFailed(message));
        }
        Ok(self.shutdown.status().unwrap_or(ExitStatus::Aborted))
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.shutdown.shut_down_with_status(ExitStatus::Aborted);
    }
}

impl std::fmt::Debug for Sim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("tasks", &self.tasks.len())
            .field("shutdown", &self.shutdown.status())
            .finish()
    }
}

/// Builds the device from the engine's keys, binds the responder and runs
/// both tasks until the script finishes.
pub async fn simulate<E: Engine>(
    engine: E,
    program: E::Program,
    config: &SimConfig,
) -> Result<ExitStatus, SimError> {
    let keys = engine.init(&program);
    let Device { store, agent } = Device::from_keys(keys, config);

    let mut sim = Sim::new();
    let responder = Responder::bind(config.bind, agent, config.recv_timeout, sim.get_shutdown())
        .await
        .map_err(SimError::Bind)?;
    sim.start_responder(responder);
    sim.start_mutation(Arc::new(engine), Arc::new(program), store);
    sim.wait().await
}

#[derive(Debug, ThisError)]
pub enum SimError {
    #[error("Failed to bind the agent socket: {0}")]
    Bind(#[source] io::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("A simulation task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{oid::Oid, snmp::Agent, Value};
    use async_trait::async_trait;
    use std::{
        net::Ipv4Addr,
        time::{Duration, Instant},
    };

    const TIMEOUT: Duration = Duration::from_millis(50);

    /// Sleeps for a while, then sets its key.
    struct Slow(Duration);

    #[async_trait]
    impl Engine for Slow {
        type Program = ();
        type Error = std::io::Error;

        fn init(&self, _: &()) -> Vec<String> {
            vec!["1.3.6.1.4.1.1".to_string()]
        }

        async fn run(&self, _: &(), store: &ValueStore) -> Result<(), Self::Error> {
            tokio::time::sleep(self.0).await;
            store
                .set(&Oid::from([1, 3, 6, 1, 4, 1, 1]), Value::Boolean(true))
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
        }
    }

    /// Panics instead of running.
    struct Panics;

    #[async_trait]
    impl Engine for Panics {
        type Program = ();
        type Error = std::io::Error;

        fn init(&self, _: &()) -> Vec<String> {
            vec![]
        }

        async fn run(&self, _: &(), _: &ValueStore) -> Result<(), Self::Error> {
            panic!("engine bug")
        }
    }

    fn local_config() -> SimConfig {
        SimConfig {
            bind: (Ipv4Addr::LOCALHOST, 0).into(),
            recv_timeout: TIMEOUT,
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn waits_for_both_tasks() {
        let start = Instant::now();
        let status = simulate(Slow(Duration::from_millis(100)), (), &local_config())
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::Completed);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn responder_stops_within_one_timeout() {
        let mut sim = Sim::new();
        let store = Arc::new(ValueStore::default());
        let responder = Responder::bind(
            (Ipv4Addr::LOCALHOST, 0).into(),
            Agent::new(store),
            TIMEOUT,
            sim.get_shutdown(),
        )
        .await
        .unwrap();
        sim.start_responder(responder);

        tokio::time::sleep(TIMEOUT * 3).await;
        let fired = Instant::now();
        sim.get_shutdown().shut_down();
        assert_eq!(sim.wait().await.unwrap(), ExitStatus::Completed);
        // one full timeout plus scheduling slack
        assert!(fired.elapsed() < TIMEOUT * 6);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    #[ntest::timeout(5000)]
    async fn spawned_tasks_log_to_the_caller() {
        simulate(Slow(Duration::ZERO), (), &local_config())
            .await
            .unwrap();
        assert!(logs_contain("Script finished"));
        assert!(logs_contain("Responder shutting down"));
    }

    #[tokio::test]
    #[ntest::timeout(5000)]
    async fn panicking_engine_stops_the_responder() {
        let result = simulate(Panics, (), &local_config()).await;
        assert!(matches!(result, Err(SimError::TaskFailed(_))));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let config = SimConfig {
            bind: taken.local_addr().unwrap(),
            ..local_config()
        };
        let result = simulate(Slow(Duration::ZERO), (), &config).await;
        assert!(matches!(result, Err(SimError::Bind(_))));
    }
}
