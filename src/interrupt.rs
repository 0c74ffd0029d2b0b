use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::BenchError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM into a cancellation flag.
///
/// Supervised children run in their own process group, so a terminal Ctrl-C
/// only reaches the harness; the supervisor forwards it to the group.
pub fn install() -> Result<&'static AtomicBool, BenchError> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        let action = SigAction::new(
            SigHandler::Handler(on_interrupt),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only stores to an atomic.
            unsafe { sigaction(signal, &action) }.map_err(|e| BenchError::SignalError {
                detail: format!("{:?}: {}", signal, e),
            })?;
        }
    }

    Ok(&INTERRUPTED)
}

pub fn is_interrupted(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}
