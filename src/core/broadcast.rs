use crate::domain::ports::DeviceApi;
use crate::utils::error::{DeviceError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct BroadcastOutcome {
    pub device: String,
    pub result: Result<()>,
    pub elapsed: Duration,
}

impl BroadcastOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Pushes one bitmap to every device, at most `concurrency` requests in flight.
///
/// Outcomes come back in the order the devices were given. A failing device
/// does not stop the others; a push task that panics shows up as that
/// device's `TaskError`.
pub async fn broadcast_bitmap<D>(
    devices: Vec<(String, D)>,
    bitmap: &[u8],
    concurrency: usize,
) -> Result<Vec<BroadcastOutcome>>
where
    D: DeviceApi + 'static,
{
    if concurrency == 0 {
        return Err(DeviceError::InvalidInput {
            message: "broadcast concurrency must be at least 1".to_string(),
        });
    }

    let permits = Arc::new(Semaphore::new(concurrency));
    let payload: Arc<[u8]> = Arc::from(bitmap);
    let mut handles = Vec::with_capacity(devices.len());

    for (name, device) in devices {
        let permits = Arc::clone(&permits);
        let payload = Arc::clone(&payload);
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let (result, elapsed) = match permits.acquire_owned().await {
                Ok(_permit) => {
                    // Time the push only, not the wait for a permit
                    let started = Instant::now();
                    let result = device.bitmap_put(&payload).await;
                    (result, started.elapsed())
                }
                Err(_) => (
                    Err(DeviceError::InvalidInput {
                        message: "broadcast was shut down".to_string(),
                    }),
                    Duration::ZERO,
                ),
            };
            BroadcastOutcome {
                device: task_name,
                result,
                elapsed,
            }
        });
        handles.push((name, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => BroadcastOutcome {
                device: name,
                result: Err(DeviceError::TaskError(e)),
                elapsed: Duration::ZERO,
            },
        };
        match &outcome.result {
            Ok(()) => tracing::debug!("{}: bitmap pushed in {:?}", outcome.device, outcome.elapsed),
            Err(e) => tracing::warn!("{}: bitmap push failed: {}", outcome.device, e),
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
