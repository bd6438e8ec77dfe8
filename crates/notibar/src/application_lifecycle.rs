//! Global shutdown of the notibar process.
//! Any task can request shutdown with `send_exit()`, and long-running tasks await `recv_exit()`
//! to find out when to clean up and stop.

use once_cell::sync::Lazy;
use tokio::sync::watch;

static APPLICATION_EXIT: Lazy<watch::Sender<bool>> = Lazy::new(|| watch::channel(false).0);

/// Notify all listening tasks that the process is shutting down.
pub fn send_exit() {
    APPLICATION_EXIT.send_replace(true);
}

/// Resolves once shutdown was requested, immediately if that already happened.
pub async fn recv_exit() {
    let mut recv = APPLICATION_EXIT.subscribe();
    // the sender lives in a static and is never dropped
    let _ = recv.wait_for(|exited| *exited).await;
}

/// Select in a loop, breaking once shutdown was requested (see `crate::application_lifecycle`).
#[macro_export]
macro_rules! loop_select_exiting {
    ($($content:tt)*) => {
        loop {
            tokio::select! {
                _ = $crate::application_lifecycle::recv_exit() => {
                    break;
                }
                $($content)*
            }
        }
    };
}
