// Services module

pub mod firestore;
pub mod identity;
pub mod memory_store;
pub mod scheduling;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{NewService, ServiceDB, TimeWindow};

pub use firestore::FirestoreService;
pub use identity::IdentityService;
pub use memory_store::InMemoryServiceStore;
pub use scheduling::SchedulingService;

/// Document store holding service records
/// Every call is scoped to a single owner uid
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Services owned by `uid` whose begin time falls in `window`
    async fn list_services(&self, uid: &str, window: TimeWindow) -> Result<Vec<ServiceDB>, AppError>;

    /// The owner's service with the smallest begin time after `now`
    async fn upcoming_service(
        &self,
        uid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceDB>, AppError>;

    /// Persist a new service for `uid` and return it with its document ID
    async fn insert_service(&self, uid: &str, service: NewService) -> Result<ServiceDB, AppError>;
}
