// Agenda - per-day grouping of services for the calendar view

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::ServiceDB;

/// Day key format used by the calendar component
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Rendered when a day has no services
pub const EMPTY_DAY_LABEL: &str = "No Service";
/// Rendered when the selected day is not in the agenda at all
pub const EMPTY_DATA_LABEL: &str = "No services for this day";

/// Services keyed by UTC calendar day of their begin time
pub type Agenda = BTreeMap<String, Vec<ServiceDB>>;

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT).ok()
}

/// Group services by the UTC day of `begin_time`.
///
/// Input order is kept within a day, nothing is deduplicated, and `today`
/// is always present (possibly empty). Records without a begin time are
/// skipped.
pub fn group_by_day<I>(services: I, today: NaiveDate) -> Agenda
where
    I: IntoIterator<Item = ServiceDB>,
{
    let mut agenda = Agenda::new();

    for service in services {
        let Some(begin) = service.begin_time else {
            tracing::warn!("Skipping service {} without beginTime", service.id);
            continue;
        };
        agenda
            .entry(day_key(begin.date_naive()))
            .or_default()
            .push(service);
    }

    agenda.entry(day_key(today)).or_default();
    agenda
}

/// The service with the smallest begin time strictly after `now`
pub fn nearest_upcoming<'a, I>(services: I, now: DateTime<Utc>) -> Option<&'a ServiceDB>
where
    I: IntoIterator<Item = &'a ServiceDB>,
{
    services
        .into_iter()
        .filter(|s| s.begin_time.is_some_and(|begin| begin > now))
        .min_by_key(|s| s.begin_time)
}

/// "9h05" style label used on agenda items
pub fn time_label(time: DateTime<Utc>) -> String {
    format!("{}h{:02}", time.hour(), time.minute())
}

/// An agenda row: the service plus its pre-rendered time range
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEntry {
    #[serde(flatten)]
    pub service: ServiceDB,
    pub time_range: Option<String>,
}

impl From<ServiceDB> for AgendaEntry {
    fn from(service: ServiceDB) -> Self {
        let time_range = match (service.begin_time, service.end_time) {
            (Some(begin), Some(end)) => Some(format!("{} - {}", time_label(begin), time_label(end))),
            (Some(begin), None) => Some(time_label(begin)),
            _ => None,
        };
        Self {
            service,
            time_range,
        }
    }
}

/// Response for GET /v1/services/agenda
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaResponse {
    pub today: String,
    pub days: BTreeMap<String, Vec<AgendaEntry>>,
    pub empty_day_label: &'static str,
    pub empty_data_label: &'static str,
}

impl AgendaResponse {
    pub fn new(agenda: Agenda, today: NaiveDate) -> Self {
        let days = agenda
            .into_iter()
            .map(|(day, services)| (day, services.into_iter().map(AgendaEntry::from).collect()))
            .collect();

        Self {
            today: day_key(today),
            days,
            empty_day_label: EMPTY_DAY_LABEL,
            empty_data_label: EMPTY_DATA_LABEL,
        }
    }
}
