//! Bounded-time pod readiness watching.
//!
//! Multiplexes a filtered pod watch's two channels against a deadline timer
//! and resolves to the first terminal condition. A channel closing is not
//! terminal by itself: the watcher keeps selecting over whatever remains
//! open until a Running pod arrives, an error arrives, or the deadline
//! fires. Dropping the watch on return cancels the upstream stream on every
//! exit path.

use std::time::Duration;

use flowscope_kube::{is_pod_running, PodWatch};

/// Terminal states of a readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A matching pod reached the Running phase before the deadline.
    Succeeded,
    /// The deadline elapsed without a Running pod or a stream error.
    TimedOut,
    /// The watch stream failed.
    WatchError(String),
}

/// Wait until a matching pod is Running, an error arrives, or `deadline`
/// elapses.
pub async fn wait_until_running(mut watch: PodWatch, deadline: Duration) -> WatchOutcome {
    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    let mut events_open = true;
    let mut errors_open = true;

    loop {
        tokio::select! {
            // Biased so that an already-delivered Running event wins over a
            // simultaneously pending error or an expiring timer.
            biased;

            event = watch.events.recv(), if events_open => match event {
                Some(pod) if is_pod_running(&pod) => return WatchOutcome::Succeeded,
                Some(_) => {}
                None => events_open = false,
            },
            error = watch.errors.recv(), if errors_open => match error {
                Some(e) => return WatchOutcome::WatchError(e.to_string()),
                None => errors_open = false,
            },
            () = &mut timer => return WatchOutcome::TimedOut,
        }
    }
}
