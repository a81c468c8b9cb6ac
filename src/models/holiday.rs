use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum HolidayKind {
    /// Day off.
    #[default]
    Holiday,
    /// Make-up working day on a weekend.
    Workday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub kind: HolidayKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayRequest {
    pub name: String,
    #[serde(default)]
    pub kind: HolidayKind,
}
