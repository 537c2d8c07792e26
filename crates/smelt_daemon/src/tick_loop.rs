use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::state::AppState;

fn make_interval(seconds: f64) -> tokio::time::Interval {
    let mut iv = tokio::time::interval(Duration::from_secs_f64(seconds));
    iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    iv
}

/// Drive scheduler quanta until `max_quanta` is reached (forever if `None`).
///
/// The timer is only recreated here, after a quantum has returned and the
/// lock is released, when the scheduler hands over a new interval.
pub async fn run_quantum_loop(app: AppState, initial_interval: f64, max_quanta: Option<u64>) {
    let mut current = initial_interval;
    let mut interval = make_interval(current);

    loop {
        interval.tick().await;
        if app.paused.load(Ordering::Relaxed) {
            continue;
        }

        let (envelope, rearm, save) = {
            let mut daemon = app.daemon.lock();
            let envelope = daemon.step(current);
            let save = if envelope.report.config_written {
                daemon.pending_save()
            } else {
                None
            };
            (envelope, daemon.scheduler.take_rearm(), save)
        };
        if let Some(save) = save {
            save.write().await;
        }
        let done = max_quanta.is_some_and(|max| envelope.quantum >= max);
        let _ = app.report_tx.send(envelope);

        if done {
            break;
        }
        if let Some(next) = rearm {
            tracing::debug!(from = current, to = next, "re-arming quantum timer");
            current = next;
            interval = make_interval(current);
            // A fresh interval fires immediately; that tick stands in for
            // the one just consumed.
            interval.tick().await;
        }
    }
}
