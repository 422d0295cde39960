//! Cross-thread prompt coordination.
//!
//! Certificate problems are answered by a human, but verification runs on
//! whichever thread the transport is handshaking from. The coordinator
//! obtains a [`PromptChoice`] regardless of the calling thread: on the
//! designated interactive thread the backend is called directly, otherwise
//! the call is scheduled onto the interactive thread and the caller blocks
//! on a one-shot channel until the answer arrives.
//!
//! Each invocation owns its own channel, so concurrent prompts from
//! different threads neither deadlock nor share state. There is deliberately
//! no timeout: a prompt may block a connection attempt indefinitely while a
//! human decides.

use std::sync::mpsc;
use std::sync::Arc;

use keyfob_core::PromptChoice;

/// Severity category of a certificate prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptCategory {
    Information,
    Warning,
    Confirmation,
    Error,
}

impl PromptCategory {
    /// Uppercase name, as rendered by the console frontend.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PromptCategory::Information => "INFORMATION",
            PromptCategory::Warning => "WARNING",
            PromptCategory::Confirmation => "CONFIRMATION",
            PromptCategory::Error => "ERROR",
        }
    }
}

/// One certificate question put to the user.
#[derive(Debug, Clone)]
pub struct CertPrompt {
    pub category: PromptCategory,
    pub title: String,
    /// Fully formatted message; already carries the hostname/subject and
    /// the underlying error.
    pub message: String,
    /// The decision key: the fingerprint this answer applies to.
    pub fingerprint: String,
    /// Hostname or subject DN the problem was observed for.
    pub hostname: String,
    /// The underlying verification error, verbatim.
    pub detail: String,
}

/// Capability interface for a UI backend.
///
/// One trait covers thread identification, dispatch and rendering so the
/// trust engine depends on nothing UI-specific.
pub trait PromptBackend: Send + Sync {
    /// Whether the current thread is the designated interactive thread.
    fn is_interactive_thread(&self) -> bool;

    /// Schedule `job` to run on the interactive thread.
    fn run_on_interactive(&self, job: Box<dyn FnOnce() + Send>);

    /// Render the prompt and return the user's choice. Only ever called on
    /// the interactive thread.
    fn prompt(&self, request: &CertPrompt) -> PromptChoice;
}

/// Obtains prompt answers for the trust engine.
pub struct PromptCoordinator {
    backend: Arc<dyn PromptBackend>,
}

impl PromptCoordinator {
    pub fn new(backend: Arc<dyn PromptBackend>) -> Self {
        Self { backend }
    }

    /// Ask the user, blocking the calling thread until an answer exists.
    ///
    /// A failed hand-off (the interactive thread dropped the job, or the
    /// dispatch never ran) is treated as rejection, never as a silent
    /// accept.
    pub fn ask(&self, request: CertPrompt) -> PromptChoice {
        if self.backend.is_interactive_thread() {
            return self.backend.prompt(&request);
        }

        let (tx, rx) = mpsc::sync_channel::<PromptChoice>(1);
        let backend = Arc::clone(&self.backend);
        self.backend.run_on_interactive(Box::new(move || {
            let _ = tx.send(backend.prompt(&request));
        }));

        rx.recv().unwrap_or(PromptChoice::Reject)
    }
}

impl std::fmt::Debug for PromptCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptCoordinator").finish_non_exhaustive()
    }
}
