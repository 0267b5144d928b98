use std::sync::Arc;
use tokio::sync::watch;

/// A one-shot signal used to stop the responder once the script finishes.
/// You can create multiple connected shutdowns by cloning.
///
/// The signal fires at most once; later calls to
/// [`shut_down_with_status`](Shutdown::shut_down_with_status) are ignored and
/// the first status is kept forever.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Holds `None` until the signal fires.
    notify: Arc<watch::Sender<Option<ExitStatus>>>,
}

impl Shutdown {
    /// Creates a new active shutdown.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(None);
        Self {
            notify: Arc::new(notify),
        }
    }

    /// Fires the signal with `ExitStatus::Completed`.
    pub fn shut_down(&self) -> bool {
        self.shut_down_with_status(ExitStatus::Completed)
    }

    /// Fires the signal for every `Shutdown` cloned from this one.
    /// Returns `true` only for the call that actually fired it.
    pub fn shut_down_with_status(&self, status: ExitStatus) -> bool {
        let fired = self.notify.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(status);
            true
        });
        if fired {
            tracing::debug!("Shutdown signalled with {:?}", status);
        }
        fired
    }

    /// Checks the signal without waiting.
    pub fn is_shut_down(&self) -> bool {
        self.notify.borrow().is_some()
    }

    /// The status the signal fired with, if it has fired.
    pub fn status(&self) -> Option<ExitStatus> {
        *self.notify.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// How the simulation ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitStatus {
    /// The script ran to completion.
    Completed,
    /// The script stopped on an execution error.
    ScriptFailed,
    /// A task ended abnormally (for instance by panicking).
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active() {
        let status = ExitStatus::ScriptFailed;
        let shut0 = Shutdown::new();
        let shuts = [shut0.clone(), shut0.clone(), shut0.clone()];
        assert!(!shut0.is_shut_down());

        assert!(shuts[0].shut_down_with_status(status));

        for shut in shuts {
            assert!(shut.is_shut_down());
            assert_eq!(shut.status(), Some(status));
        }
    }

    #[test]
    fn fires_once() {
        let shut = Shutdown::new();
        assert!(shut.shut_down());
        assert!(!shut.clone().shut_down_with_status(ExitStatus::Aborted));
        assert_eq!(shut.status(), Some(ExitStatus::Completed));
    }
}
