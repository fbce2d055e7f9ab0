use std::{future::Future, time::Duration};

use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info};

use ledhub_common::ReachabilityTracker;

/// Polls a device and calls `on_online` each time it comes back after being
/// unreachable. Runs until `shutdown` flips to true or its sender is dropped.
pub async fn run_default_watcher<P, PF, A, AF>(
    label: &'static str,
    period: Duration,
    mut probe: P,
    mut on_online: A,
    mut shutdown: watch::Receiver<bool>,
) where
    P: FnMut() -> PF,
    PF: Future<Output = bool>,
    A: FnMut() -> AF,
    AF: Future<Output = ()>,
{
    let mut tracker = ReachabilityTracker::new();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(group = label, "default watcher started");
    while !*shutdown.borrow() {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let reachable = probe().await;
        if tracker.observe(reachable) {
            info!(group = label, "device came online, applying default");
            on_online().await;
        } else {
            debug!(group = label, reachable, "probe");
        }
    }
    info!(group = label, "default watcher stopped");
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn applies_on_each_reconnect() {
        let (tx, rx) = watch::channel(false);
        let script = Arc::new(Mutex::new(VecDeque::from([false, true, true, false, true])));
        let probes = Arc::new(AtomicUsize::new(0));
        let applied_at = Arc::new(Mutex::new(Vec::new()));

        let probe = {
            let script = script.clone();
            let probes = probes.clone();
            move || {
                let next = script.lock().unwrap().pop_front();
                if next.is_some() {
                    probes.fetch_add(1, Ordering::SeqCst);
                } else {
                    tx.send(true).unwrap();
                }
                async move { next.unwrap_or(false) }
            }
        };
        let on_online = {
            let probes = probes.clone();
            let applied_at = applied_at.clone();
            move || {
                applied_at
                    .lock()
                    .unwrap()
                    .push(probes.load(Ordering::SeqCst) - 1);
                async {}
            }
        };

        run_default_watcher("test", Duration::from_secs(5), probe, on_online, rx).await;

        assert_eq!(*applied_at.lock().unwrap(), vec![1, 4]);
        assert!(script.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn device_up_at_start_is_left_alone() {
        let (tx, rx) = watch::channel(false);
        let mut remaining = 3;
        let applies = Arc::new(AtomicUsize::new(0));

        let probe = move || {
            if remaining == 0 {
                tx.send(true).unwrap();
            } else {
                remaining -= 1;
            }
            async { true }
        };
        let on_online = {
            let applies = applies.clone();
            move || {
                applies.fetch_add(1, Ordering::SeqCst);
                async {}
            }
        };

        run_default_watcher("test", Duration::from_secs(5), probe, on_online, rx).await;

        assert_eq!(applies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_shutdown_already_signalled() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let probes = Arc::new(AtomicUsize::new(0));

        let counted = probes.clone();
        run_default_watcher(
            "test",
            Duration::from_secs(5),
            move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { false }
            },
            || async {},
            rx,
        )
        .await;

        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_default_watcher(
            "test",
            Duration::from_secs(5),
            || async { false },
            || async {},
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(12)).await;
        drop(tx);

        handle.await.unwrap();
    }
}
