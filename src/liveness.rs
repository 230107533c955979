use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A reachability check for one external resource.
///
/// Probes bind their own timeout. An error or a timeout inside the probe
/// must be reported as `false`.
pub trait Probe: Send + 'static {
    fn probe(&mut self) -> impl Future<Output = bool> + Send;
}

impl<F, Fut> Probe for F
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    fn probe(&mut self) -> impl Future<Output = bool> + Send {
        self()
    }
}

/// Background loop that periodically probes a resource and reports changes.
///
/// The loop is strictly sequential: tick, probe, update, wait. Ticks that
/// come due while a probe is still running are skipped. The resource is
/// considered not live until a probe says otherwise.
pub struct LivenessPoller {
    name: String,
    live: Arc<AtomicBool>,
    stopped: AtomicBool,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LivenessPoller {
    /// Spawn the polling task. `on_change` runs on that task whenever the
    /// probe result differs from the previous one.
    ///
    /// A zero `interval` probes again as soon as the previous probe is done.
    /// Must be called from within a tokio runtime.
    pub fn start<P, F>(name: impl Into<String>, interval: Duration, probe: P, on_change: F) -> Self
    where
        P: Probe,
        F: FnMut(bool) + Send + 'static,
    {
        let name = name.into();
        let live = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(
            name.clone(),
            interval,
            probe,
            on_change,
            Arc::clone(&live),
            cancel.clone(),
        ));

        Self {
            name,
            live,
            stopped: AtomicBool::new(false),
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Last state reported by the probe.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Ask the loop to exit after the current iteration. Does not wait.
    ///
    /// Returns `true` if this call stopped the poller, `false` if it was
    /// already stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        debug!(poller = %self.name, "stopping");
        self.cancel.cancel();
        true
    }

    /// Wait for the polling task to finish. Returns immediately if it was
    /// already joined.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for LivenessPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<P, F>(
    name: String,
    interval: Duration,
    mut probe: P,
    mut on_change: F,
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    P: Probe,
    F: FnMut(bool) + Send + 'static,
{
    let mut ticker = (!interval.is_zero()).then(|| {
        let mut t = tokio::time::interval(interval);
        t.set_missed_tick_behavior(MissedTickBehavior::Skip);
        t
    });

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = next_tick(ticker.as_mut()) => {}
        }

        let now_live = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = probe.probe() => result,
        };
        debug!(poller = %name, live = now_live, "probe finished");

        if live.swap(now_live, Ordering::AcqRel) != now_live {
            info!(poller = %name, live = now_live, "liveness changed");
            on_change(now_live);
        }
    }

    debug!(poller = %name, "stopped");
}

async fn next_tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
