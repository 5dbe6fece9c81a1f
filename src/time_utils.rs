use std::fmt;
use std::str::FromStr;

use rusqlite::types::{
    FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef,
};
use serde::{Serialize, Serializer};

use crate::Error;

/// Calendar day of a link, stored and shown as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Date(time::Date);

pub(crate) const DATE_FORMAT : &'static [time::format_description::FormatItem<
    'static,
>] = time::macros::format_description!("[year]-[month]-[day]");

impl Date {
    /// Today in the local timezone, falling back to UTC when the local
    /// offset cannot be determined.
    pub fn today() -> Self {
        let now = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc());

        Date(now.date())
    }
}

impl FromStr for Date {
    type Err = Error;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        time::Date::parse(s.trim(), &DATE_FORMAT)
            .map(Date)
            .map_err(|_| Error::InvalidDate(s.to_string()))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.format(&DATE_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl Serialize for Date {
    fn serialize<S>(
        &self,
        serializer : S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S : Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<time::Date> for Date {
    fn from(d : time::Date) -> Self {
        Date(d)
    }
}

impl std::ops::Deref for Date {
    type Target = time::Date;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromSql for Date {
    fn column_result(value : ValueRef) -> FromSqlResult<Date> {
        let s : String = String::column_result(value)?;

        time::Date::parse(&s, &DATE_FORMAT)
            .map(Date)
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for Date {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let s = self.0.format(&DATE_FORMAT).map_err(|err| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(err))
        })?;

        Ok(ToSqlOutput::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_iso_days() {
        let d : Date = "2024-01-01".parse().unwrap();
        assert_eq!(d.to_string(), "2024-01-01");
        assert_eq!(d.year(), 2024);

        let padded : Date = " 2023-12-31 ".parse().unwrap();
        assert!(padded < d);
    }

    #[test]
    fn rejects_other_formats() {
        for s in &["01/02/2024", "2024-13-01", "", "2024-1-1x"] {
            let err = s.parse::<Date>().unwrap_err();
            assert!(matches!(err, Error::InvalidDate(_)), "{}", s);
        }
    }

    #[test]
    fn serializes_as_string() {
        let d : Date = "2024-02-29".parse().unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2024-02-29\"");
    }
}
