//! Command implementations

pub mod down;
pub mod forward;
pub mod list;
pub mod up;
pub mod version;

use std::process::ExitCode;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Exit status when the cluster state could not be determined.
pub const EXIT_AMBIGUOUS: u8 = 3;

/// Options shared by commands that talk to the Docker daemon.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct DockerArgs {
    /// Allow insecure non-TLS connection to the docker daemon
    #[arg(long)]
    pub insecure: bool,
}

/// Token cancelled on the first Ctrl-C.
///
/// Must be called from within the runtime. The handler stays installed for
/// the rest of the process, so later interrupts no longer kill it; commands
/// bound their shutdown with a grace period instead.
#[must_use]
pub fn interrupt_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            trigger.cancel();
        }
    });
    token
}

/// `1` when any item of a batch failed, `0` otherwise.
#[must_use]
pub fn batch_exit_code(any_failed: bool) -> ExitCode {
    if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
