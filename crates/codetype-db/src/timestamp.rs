use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use codetype_common::{Error, Result};

/// Reject instants whose UTC year needs more or fewer than four digits.
///
/// Stored text is only fixed-width, and so only sorts chronologically, for
/// years 0000 through 9999.
pub fn ensure_storable(ts: DateTime<Utc>) -> Result<()> {
    if (0..=9999).contains(&ts.year()) {
        Ok(())
    } else {
        Err(Error::Validation(
            "date must fall between years 0000 and 9999 in UTC".into(),
        ))
    }
}

/// Fixed-width UTC text form used for every stored timestamp, so that
/// lexicographic order in SQL equals chronological order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> Result<String> {
    ensure_storable(ts)?;
    Ok(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| Error::Database(format!("invalid timestamp format: {raw}")))
}
