// Scheduling service - what the screens ask for, translated into store queries

use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;

use super::ServiceStore;
use crate::agenda::{self, Agenda};
use crate::error::AppError;
use crate::models::{CreateServiceRequest, ServiceDB, TimeWindow};

/// Lower bound for the live view's poll interval
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct SchedulingService {
    store: Arc<dyn ServiceStore>,
    poll_interval: Duration,
}

impl SchedulingService {
    pub fn new(store: Arc<dyn ServiceStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// All services of a user
    pub async fn services_for(&self, uid: &str) -> Result<Vec<ServiceDB>, AppError> {
        self.store.list_services(uid, TimeWindow::all()).await
    }

    /// Next service after `now`, if any
    pub async fn upcoming_for(
        &self,
        uid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceDB>, AppError> {
        self.store.upcoming_service(uid, now).await
    }

    /// Validate the form and write the service.
    /// Nothing reaches the store when validation fails.
    pub async fn add_service(
        &self,
        uid: &str,
        request: CreateServiceRequest,
    ) -> Result<ServiceDB, AppError> {
        let service = request.validate().map_err(|e| {
            tracing::info!("Rejected service for user {}: {}", uid, e);
            AppError::from(e)
        })?;

        self.store.insert_service(uid, service).await
    }

    /// Services within `window`, grouped by day, with `today` always present
    pub async fn agenda_for(
        &self,
        uid: &str,
        window: TimeWindow,
        today: NaiveDate,
    ) -> Result<Agenda, AppError> {
        let services = self.store.list_services(uid, window).await?;
        Ok(agenda::group_by_day(services, today))
    }

    /// Live view of a user's services.
    ///
    /// Polls the store and yields the full list whenever it differs from the
    /// last one sent (the first result is always sent). A failed poll yields
    /// the error and polling continues. The stream ends when dropped.
    pub fn watch_services(
        &self,
        uid: String,
    ) -> impl Stream<Item = Result<Vec<ServiceDB>, AppError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let poll_interval = self.poll_interval;

        async_stream::stream! {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Vec<ServiceDB>> = None;

            loop {
                ticker.tick().await;
                match store.list_services(&uid, TimeWindow::all()).await {
                    Ok(snapshot) => {
                        if last.as_ref() != Some(&snapshot) {
                            last = Some(snapshot.clone());
                            yield Ok(snapshot);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Service snapshot for user {} failed: {}", uid, e);
                        yield Err(e);
                    }
                }
            }
        }
    }
}
