//! Background job scheduler.
//!
//! Registers the optional catalog refresh job so the stored prices served by
//! the non-refreshing type listing do not drift too far.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::catalog::CatalogService;

/// Builds and starts the background job scheduler.
///
/// With `refresh_cron` set (six-field cron with seconds, e.g.
/// `0 0 */6 * * *`), a job invalidates the listing cache and rebuilds it on
/// that schedule. Returns the running [`JobScheduler`] handle, which must be
/// kept alive for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    catalog: Arc<CatalogService>,
    refresh_cron: Option<&str>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match refresh_cron {
        Some(cron) => register_refresh_job(&scheduler, catalog, cron).await?,
        None => tracing::info!("scheduler: NUTRIPRICE_REFRESH_CRON not set; no refresh job"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    catalog: Arc<CatalogService>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let catalog = Arc::clone(&catalog);

        Box::pin(async move {
            tracing::info!("scheduler: starting catalog price refresh");
            match catalog.refresh_all().await {
                Ok(listing) => tracing::info!(
                    count = listing.len(),
                    "scheduler: catalog price refresh complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: catalog price refresh failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered catalog refresh job");
    Ok(())
}
