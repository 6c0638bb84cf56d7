// In-memory service store
// Used when no Firebase project is configured, and by tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ServiceStore;
use crate::agenda::nearest_upcoming;
use crate::error::AppError;
use crate::models::{NewService, ServiceDB, TimeWindow};

#[derive(Default)]
pub struct InMemoryServiceStore {
    services: RwLock<Vec<ServiceDB>>,
}

impl InMemoryServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw records, bypassing validation (legacy or malformed documents)
    #[cfg(test)]
    pub async fn seed(&self, records: impl IntoIterator<Item = ServiceDB>) {
        self.services.write().await.extend(records);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }
}

#[async_trait]
impl ServiceStore for InMemoryServiceStore {
    async fn list_services(&self, uid: &str, window: TimeWindow) -> Result<Vec<ServiceDB>, AppError> {
        let services = self.services.read().await;
        let result = services
            .iter()
            .filter(|s| s.user_id == uid)
            .filter(|s| {
                if window.is_unbounded() {
                    return true;
                }
                s.begin_time.is_some_and(|begin| window.contains(begin))
            })
            .cloned()
            .collect();
        Ok(result)
    }

    async fn upcoming_service(
        &self,
        uid: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceDB>, AppError> {
        let services = self.services.read().await;
        let owned = services.iter().filter(|s| s.user_id == uid);
        Ok(nearest_upcoming(owned, now).cloned())
    }

    async fn insert_service(&self, uid: &str, service: NewService) -> Result<ServiceDB, AppError> {
        let record = service.into_db(uuid::Uuid::new_v4().to_string(), uid);
        self.services.write().await.push(record.clone());
        tracing::info!("Stored service {} in memory for user {}", record.id, uid);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateServiceRequest;
    use chrono::TimeZone;

    fn new_service(name: &str, begin: DateTime<Utc>) -> NewService {
        CreateServiceRequest {
            name: Some(name.to_string()),
            place: Some("Salon".to_string()),
            begin_time: Some(begin),
            end_time: Some(begin + chrono::Duration::hours(1)),
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_queries_are_scoped_to_owner() {
        let store = InMemoryServiceStore::new();
        let begin = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        store.insert_service("alice", new_service("Haircut", begin)).await.unwrap();
        store.insert_service("bob", new_service("Dentist", begin)).await.unwrap();

        let alice = store.list_services("alice", TimeWindow::all()).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].name, "Haircut");
        assert_eq!(alice[0].user_id, "alice");

        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let upcoming = store.upcoming_service("bob", now).await.unwrap().unwrap();
        assert_eq!(upcoming.name, "Dentist");
    }

    #[tokio::test]
    async fn test_window_excludes_records_without_begin_time() {
        let store = InMemoryServiceStore::new();
        store
            .seed(vec![ServiceDB {
                id: "legacy".to_string(),
                name: "Legacy".to_string(),
                place: String::new(),
                begin_time: None,
                end_time: None,
                user_id: "alice".to_string(),
            }])
            .await;

        let day = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let windowed = store
            .list_services("alice", TimeWindow::days(Some(day), Some(day)))
            .await
            .unwrap();
        assert!(windowed.is_empty());

        let all = store.list_services("alice", TimeWindow::all()).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
