//! The single-threaded simulation loop.
//!
//! One `tokio::select!` serializes everything that touches the fleet:
//! publish ticks, inbound control messages and shutdown. The transport only
//! signals through a [`Notify`] that messages are waiting; the loop then
//! drains them with [`Simulator::poll`] and applies any interval change to
//! the scheduler before it is polled again.

use std::future::Future;

use tokio::sync::Notify;

use crate::scheduler::PublishScheduler;
use crate::simulator::Simulator;
use crate::traits::{Clock, MqttClient, RandomSource};

/// What a run of [`run_event_loop`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Times the inbox was drained.
    pub polls: u64,
    /// Interval changes applied to the scheduler.
    pub reschedules: u64,
}

/// Drive `simulator` until `shutdown` completes.
///
/// `inbox` must be notified whenever the client may have messages for
/// [`MqttClient::try_recv`]. A notification that arrives while the loop is
/// busy is kept as a permit, so no message waits longer than one pass.
pub async fn run_event_loop<C, R, K, F>(
    simulator: &mut Simulator<C, R, K>,
    scheduler: &mut PublishScheduler,
    inbox: &Notify,
    shutdown: F,
) -> LoopStats
where
    C: MqttClient,
    R: RandomSource,
    K: Clock,
    F: Future<Output = ()>,
{
    let mut stats = LoopStats::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(ticks = stats.ticks, "shutdown requested, leaving event loop");
                break;
            }
            _ = scheduler.tick() => {
                simulator.tick();
                stats.ticks += 1;
            }
            _ = inbox.notified() => {
                stats.polls += 1;
                if let Some(period) = simulator.poll() {
                    scheduler.reschedule(period);
                    stats.reschedules += 1;
                }
            }
        }
    }

    stats
}
