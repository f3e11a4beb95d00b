//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Routes service progress events to an [`OutputContext`].
///
/// Warnings go to stderr and are never suppressed: services use them for
/// per-item failures the user has to act on.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.ctx.step(message);
    }

    fn success(&self, message: &str) {
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        self.ctx.error(message);
    }
}
