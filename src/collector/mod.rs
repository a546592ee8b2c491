//! Device Collection
//!
//! One collection cycle polls every configured device concurrently and
//! reconciles each device's gauges with the result of its own poll.
//!
//! # Architecture
//!
//! - Each device runs in its own task on a `JoinSet`, so a slow device only
//!   delays the end of the cycle, never another device
//! - Every task ends in exactly one [`FetchOutcome`]; failures are values,
//!   not errors, and never abort the cycle
//! - A task that panics is reported and its device is marked down
//!
//! # Cancellation
//!
//! Dropping a running [`run_cycle`] future aborts its tasks at their next
//! await point. Reconciling is synchronous, so a device is either fully
//! updated or untouched.

use crate::devices::DeviceDescriptor;
use crate::metrics::MetricsCollector;
use crate::switchbot::SwitchBotClient;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info};

pub mod device;

pub use device::{collect_device, fetch_device, FailureReason, FetchOutcome};

/// Shared state handed to every device task
#[derive(Clone)]
pub struct CollectionContext {
    /// SwitchBot API client
    pub client: Arc<SwitchBotClient>,
    /// Gauge set updated by every task
    pub metrics: MetricsCollector,
    /// Quota level below which a warning is logged
    pub rate_limit_low_water: i64,
}

/// Status of a single device collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// The device answered and its power gauge was updated
    Success,
    /// The device is down (already logged as warning)
    Failed,
}

/// Device counts of a finished cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub up: usize,
    pub down: usize,
}

/// Poll all devices concurrently and wait for every one of them.
pub async fn run_cycle(ctx: &CollectionContext, devices: &[DeviceDescriptor]) -> CycleSummary {
    run_cycle_with(ctx, devices, |task_ctx, task_device| async move {
        collect_device(&task_ctx, &task_device).await
    })
    .await
}

/// Run `collect` for every device on its own task and join them all.
///
/// A task that panics counts as down and its device is reconciled with
/// [`FailureReason::TaskPanicked`]; the other tasks are unaffected.
pub async fn run_cycle_with<F, Fut>(
    ctx: &CollectionContext,
    devices: &[DeviceDescriptor],
    collect: F,
) -> CycleSummary
where
    F: Fn(CollectionContext, DeviceDescriptor) -> Fut,
    Fut: Future<Output = CollectionStatus> + Send + 'static,
{
    let started = Instant::now();
    let mut tasks = JoinSet::new();
    let mut in_flight = HashMap::with_capacity(devices.len());

    for device in devices {
        let handle = tasks.spawn(collect(ctx.clone(), device.clone()));
        in_flight.insert(handle.id(), device);
    }

    let mut summary = CycleSummary::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, CollectionStatus::Success)) => summary.up += 1,
            Ok((_, CollectionStatus::Failed)) => summary.down += 1,
            Err(e) => {
                summary.down += 1;
                match in_flight.get(&e.id()) {
                    Some(device) => {
                        error!("Collection task for device {} failed: {}", device.id, e);
                        ctx.metrics
                            .reconcile(device, &FetchOutcome::failure(FailureReason::TaskPanicked));
                    }
                    None => error!("Collection task failed: {}", e),
                }
            }
        }
    }

    info!(
        "Collection cycle finished in {:.2?}: {} up, {} down",
        started.elapsed(),
        summary.up,
        summary.down
    );

    summary
}
