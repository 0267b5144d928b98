use crate::store::ValueStore;
use async_trait::async_trait;

/// A script execution engine that drives the simulated device.
///
/// The engine names every OID the device will ever expose up front, through
/// [`init`](Engine::init), and later writes into the [`ValueStore`] built from
/// those keys while [`run`](Engine::run) executes. Reads are served from the
/// same store, so the store doubles as the engine's lookup table.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    type Program: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists the OID keys `program` uses, in dotted-decimal form.
    fn init(&self, program: &Self::Program) -> Vec<String>;

    /// Runs `program` to completion, updating `store` as it goes.
    async fn run(&self, program: &Self::Program, store: &ValueStore) -> Result<(), Self::Error>;
}
