use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use codetype_common::{Error, UserId};
use codetype_db::{DEFAULT_PAGE_LIMIT, HistoryEntry, Language, NewHistoryEntry, ensure_storable};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::SharedState;

/// Body of `POST /api/private/history`.
///
/// Absent fields take their zero value and are then caught by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateHistoryRequest {
    pub language: String,
    pub wpm: i64,
    pub accuracy: i64,
    pub errors: i64,
    /// Session duration in seconds.
    pub time: i64,
    /// Completion time, RFC3339.
    pub date: String,
}

impl CreateHistoryRequest {
    /// Check field ranges (422) and then the date format (400).
    pub fn into_new_entry(self, user_id: UserId) -> Result<NewHistoryEntry, ApiError> {
        let language = self.validate().map_err(ApiError::from)?;

        let completed_at = DateTime::parse_from_rfc3339(self.date.trim())
            .map_err(|_| ApiError::bad_request("Invalid date format, expected RFC3339"))?
            .with_timezone(&Utc);
        ensure_storable(completed_at)?;

        Ok(NewHistoryEntry {
            user_id,
            language,
            wpm: bounded("wpm", self.wpm)?,
            accuracy: bounded("accuracy", self.accuracy)?,
            errors: bounded("errors", self.errors)?,
            duration_seconds: bounded("time", self.time)?,
            completed_at,
        })
    }

    fn validate(&self) -> codetype_common::Result<Language> {
        if self.language.is_empty() {
            return Err(Error::Validation("language is required".into()));
        }
        let language: Language = self.language.parse()?;
        if self.wpm < 0 {
            return Err(Error::Validation("wpm must be non-negative".into()));
        }
        if !(0..=100).contains(&self.accuracy) {
            return Err(Error::Validation("accuracy must be between 0 and 100".into()));
        }
        if self.errors < 0 {
            return Err(Error::Validation("errors must be non-negative".into()));
        }
        if self.time < 0 {
            return Err(Error::Validation("time must be non-negative".into()));
        }
        if self.date.trim().is_empty() {
            return Err(Error::Validation("date is required".into()));
        }
        Ok(language)
    }
}

fn bounded<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T, ApiError> {
    T::try_from(value).map_err(|_| ApiError::unprocessable(format!("{field} is too large")))
}

/// Wire shape of a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntryResponse {
    pub id: String,
    pub language: Language,
    pub wpm: u32,
    pub accuracy: u8,
    pub errors: u32,
    pub time: u32,
    pub date: String,
    pub created_at: String,
    pub completed_at: String,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        let completed_at = entry.completed_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            id: entry.id,
            language: entry.language,
            wpm: entry.wpm,
            accuracy: entry.accuracy,
            errors: entry.errors,
            time: entry.duration_seconds,
            date: completed_at.clone(),
            created_at: entry.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            completed_at,
        }
    }
}

/// Raw paging parameters. Values that do not parse as integers fall back to
/// the defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListHistoryParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListHistoryParams {
    pub fn limit(&self) -> i64 {
        parse_or(self.limit.as_deref(), DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        parse_or(self.offset.as_deref(), 0)
    }
}

fn parse_or(raw: Option<&str>, fallback: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

/// `POST /api/private/history`
pub async fn create_history(
    State(state): State<SharedState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<CreateHistoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryEntryResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid JSON payload"))?;
    let entry = request.into_new_entry(user)?;

    let created = state
        .history
        .create(entry)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to save practice history"))?;

    info!(
        "stored {} practice result for user {}",
        created.language, created.user_id
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// `GET /api/private/history?limit=&offset=`, newest first.
pub async fn list_history(
    State(state): State<SharedState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(params): Query<ListHistoryParams>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let entries = state
        .history
        .list_by_user(&user, params.limit(), params.offset())
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to retrieve practice history"))?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// `DELETE /api/private/history`: remove every entry the caller owns.
pub async fn delete_history(
    State(state): State<SharedState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .history
        .delete_by_user(&user)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to delete practice history"))?;

    info!("removed {removed} practice results for user {user}");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::{CreateHistoryRequest, ListHistoryParams};
    use axum::http::StatusCode;
    use codetype_common::UserId;
    use codetype_db::Language;

    fn valid_request() -> CreateHistoryRequest {
        CreateHistoryRequest {
            language: "go".into(),
            wpm: 64,
            accuracy: 98,
            errors: 2,
            time: 45,
            date: "2024-03-10T12:30:00+02:00".into(),
        }
    }

    fn user() -> UserId {
        UserId::parse("u1").unwrap()
    }

    #[test]
    fn valid_request_becomes_entry_in_utc() {
        let entry = valid_request()
            .into_new_entry(user())
            .expect("valid request should convert");
        assert_eq!(entry.language, Language::Go);
        assert_eq!(entry.duration_seconds, 45);
        assert_eq!(entry.completed_at.to_rfc3339(), "2024-03-10T10:30:00+00:00");
    }

    #[test]
    fn out_of_range_fields_are_validation_errors() {
        let cases = [
            CreateHistoryRequest { accuracy: 101, ..valid_request() },
            CreateHistoryRequest { accuracy: -1, ..valid_request() },
            CreateHistoryRequest { wpm: -1, ..valid_request() },
            CreateHistoryRequest { errors: -3, ..valid_request() },
            CreateHistoryRequest { time: -10, ..valid_request() },
            CreateHistoryRequest { language: "ruby".into(), ..valid_request() },
            CreateHistoryRequest { language: String::new(), ..valid_request() },
            CreateHistoryRequest { date: "  ".into(), ..valid_request() },
            CreateHistoryRequest { wpm: i64::from(u32::MAX) + 1, ..valid_request() },
        ];
        for case in cases {
            let err = case.into_new_entry(user()).expect_err("case should be rejected");
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn malformed_date_is_a_bad_request() {
        let request = CreateHistoryRequest {
            date: "10/03/2024".into(),
            ..valid_request()
        };
        let err = request.into_new_entry(user()).expect_err("date should be rejected");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn dates_outside_four_digit_utc_years_are_validation_errors() {
        for date in ["9999-12-31T23:00:00-05:00", "0000-01-01T00:00:00+01:00"] {
            let request = CreateHistoryRequest {
                date: date.into(),
                ..valid_request()
            };
            let err = request.into_new_entry(user()).expect_err("date should be rejected");
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY, "date {date}");
        }

        let edge = CreateHistoryRequest {
            date: "9999-12-31T23:59:59Z".into(),
            ..valid_request()
        };
        assert!(edge.into_new_entry(user()).is_ok());
    }

    #[test]
    fn unparseable_paging_falls_back_to_defaults() {
        let params = ListHistoryParams {
            limit: Some("lots".into()),
            offset: Some("-".into()),
        };
        assert_eq!(params.limit(), 50);
        assert_eq!(params.offset(), 0);

        let params = ListHistoryParams {
            limit: Some("7".into()),
            offset: Some("3".into()),
        };
        assert_eq!(params.limit(), 7);
        assert_eq!(params.offset(), 3);
    }
}
