//! Job entry points and the shared failure policy.

pub mod extract;
pub mod notify;

use std::future::Future;
use std::time::Instant;
use tracing::{error, info};

use crate::config::Job;
use crate::delivery::AlertSink;
use crate::metrics::{record_job_result, record_job_start};
use crate::Result;

pub use extract::run_extract;
pub use notify::{run_notify, NotifyOutcome};

/// Alert text for a failed job.
pub fn failure_message(job: Job, err: &crate::Error) -> String {
    format!("Job {} failed: {}", job.name(), err)
}

/// Run a job body: on failure log it, publish an alert, and return the original error.
/// A failing alert is only logged.
pub async fn guarded<T, F>(job: Job, alerts: &dyn AlertSink, body: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    record_job_start(job.name());

    let result = body.await;
    record_job_result(job.name(), started.elapsed(), result.is_ok());

    match result {
        Ok(value) => {
            info!(job = job.name(), elapsed_ms = started.elapsed().as_millis() as u64, "Job finished");
            Ok(value)
        }
        Err(err) => {
            let message = failure_message(job, &err);
            error!(job = job.name(), error = ?err, "{}", message);
            if let Err(alert_err) = alerts.publish(job.alert_subject(), &message).await {
                error!(job = job.name(), error = %alert_err, "Failed to publish failure alert");
            }
            Err(err)
        }
    }
}
