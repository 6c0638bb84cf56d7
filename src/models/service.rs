// Service models - scheduled appointments
// Path: services/{service_id}

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service as stored in Firestore
/// Documents are schemaless, so the time fields may be missing on legacy records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDB {
    /// Document ID
    pub id: String,
    /// Human-readable label
    pub name: String,
    /// Human-readable location
    pub place: String,
    /// Appointment start
    pub begin_time: Option<DateTime<Utc>>,
    /// Appointment end
    pub end_time: Option<DateTime<Utc>>,
    /// Owning user (identity provider uid)
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// A validated service ready to be written
/// Only obtainable through `CreateServiceRequest::validate`
#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    name: String,
    place: String,
    begin_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl NewService {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn begin_time(&self) -> DateTime<Utc> {
        self.begin_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Stamp the owner and document ID onto the record
    pub fn into_db(self, id: String, uid: &str) -> ServiceDB {
        ServiceDB {
            id,
            name: self.name,
            place: self.place,
            begin_time: Some(self.begin_time),
            end_time: Some(self.end_time),
            user_id: uid.to_string(),
        }
    }
}

/// Request body for POST /v1/services (the "Add Service" form)
/// Every field is optional so empty inputs are reported as validation errors
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub name: Option<String>,
    pub place: Option<String>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceValidationError {
    #[error("Please fill all fields!")]
    MissingFields,
    #[error("End time must be after begin time!")]
    EndBeforeBegin,
}

impl CreateServiceRequest {
    /// Check the form before anything is sent to the store.
    /// Equal begin and end times are accepted.
    pub fn validate(self) -> Result<NewService, ServiceValidationError> {
        let name = non_empty(self.name).ok_or(ServiceValidationError::MissingFields)?;
        let place = non_empty(self.place).ok_or(ServiceValidationError::MissingFields)?;
        let (begin_time, end_time) = match (self.begin_time, self.end_time) {
            (Some(begin), Some(end)) => (begin, end),
            _ => return Err(ServiceValidationError::MissingFields),
        };

        if end_time < begin_time {
            return Err(ServiceValidationError::EndBeforeBegin);
        }

        Ok(NewService {
            name,
            place,
            begin_time,
            end_time,
        })
    }
}

/// Blank input counts as missing; the text itself is kept as typed
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Range filter on `beginTime`: from is inclusive, until is exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// No bounds: the full list
    pub fn all() -> Self {
        Self::default()
    }

    /// Whole UTC days, both ends inclusive
    pub fn days(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from: from.map(start_of_day),
            until: to.map(|d| start_of_day(d) + Duration::days(1)),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from)
            && self.until.map_or(true, |until| instant < until)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// Response for POST /v1/services
#[derive(Debug, Clone, Serialize)]
pub struct CreateServiceResponse {
    pub service: ServiceDB,
    pub notification: super::Notification,
}

/// Response for GET /v1/services/upcoming
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingServiceResponse {
    pub service: Option<ServiceDB>,
    /// Label to render when there is no upcoming service
    pub empty_label: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn request(begin: DateTime<Utc>, end: DateTime<Utc>) -> CreateServiceRequest {
        CreateServiceRequest {
            name: Some("Haircut".to_string()),
            place: Some("Salon".to_string()),
            begin_time: Some(begin),
            end_time: Some(end),
        }
    }

    #[test]
    fn test_validate_accepts_complete_form() {
        let service = request(at(10, 0), at(11, 0)).validate().unwrap();
        assert_eq!(service.name(), "Haircut");
        assert_eq!(service.place(), "Salon");
        assert_eq!(service.begin_time(), at(10, 0));
        assert_eq!(service.end_time(), at(11, 0));
    }

    #[test]
    fn test_validate_rejects_end_before_begin() {
        let err = request(at(12, 0), at(11, 0)).validate().unwrap_err();
        assert_eq!(err, ServiceValidationError::EndBeforeBegin);
        assert_eq!(err.to_string(), "End time must be after begin time!");
    }

    #[test]
    fn test_validate_accepts_zero_length_service() {
        assert!(request(at(12, 0), at(12, 0)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut req = request(at(10, 0), at(11, 0));
        req.name = Some("   ".to_string());
        assert_eq!(req.validate().unwrap_err(), ServiceValidationError::MissingFields);

        let mut req = request(at(10, 0), at(11, 0));
        req.place = None;
        assert_eq!(req.validate().unwrap_err(), ServiceValidationError::MissingFields);

        let mut req = request(at(10, 0), at(11, 0));
        req.end_time = None;
        assert_eq!(req.validate().unwrap_err(), ServiceValidationError::MissingFields);
    }

    #[test]
    fn test_validate_keeps_text_as_typed() {
        let mut req = request(at(10, 0), at(11, 0));
        req.name = Some(" Haircut ".to_string());
        req.place = Some("Salon\n".to_string());
        let service = req.validate().unwrap();
        assert_eq!(service.name(), " Haircut ");
        assert_eq!(service.place(), "Salon\n");
    }

    #[test]
    fn test_into_db_stamps_owner() {
        let db = request(at(10, 0), at(11, 0))
            .validate()
            .unwrap()
            .into_db("doc-1".to_string(), "user-1");
        assert_eq!(db.id, "doc-1");
        assert_eq!(db.user_id, "user-1");
        assert_eq!(db.begin_time, Some(at(10, 0)));
    }

    #[test]
    fn test_request_uses_wire_field_names() {
        let req: CreateServiceRequest = serde_json::from_str(
            r#"{"name":"Haircut","place":"Salon","beginTime":"2024-05-01T10:00:00Z","endTime":"2024-05-01T11:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(req.begin_time, Some(at(10, 0)));

        let json = serde_json::to_value(req.validate().unwrap().into_db("a".into(), "u")).unwrap();
        assert_eq!(json["userID"], "u");
        assert_eq!(json["beginTime"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_time_window_days() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let window = TimeWindow::days(Some(day), Some(day));
        assert!(window.contains(at(0, 0)));
        assert!(window.contains(at(23, 59)));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 0).unwrap()));
        assert!(TimeWindow::all().is_unbounded());
    }
}
