use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::validate::{validate, ValidationError};

/// Date format used in the spreadsheet (`DD.MM.YYYY`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Number of cells in a stored row.
pub const ROW_LEN: usize = 5;

/// One reading collected by the meters conversation, in prompt order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    HotWater,
    ColdWater,
    ElectricityT1,
    ElectricityT2,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::HotWater,
        Field::ColdWater,
        Field::ElectricityT1,
        Field::ElectricityT2,
    ];

    /// Human label, as used in prompts and reports.
    pub fn label(self) -> &'static str {
        match self {
            Field::HotWater => "hot water",
            Field::ColdWater => "cold water",
            Field::ElectricityT1 => "electricity (t1)",
            Field::ElectricityT2 => "electricity (t2)",
        }
    }

    fn column(self) -> usize {
        match self {
            Field::HotWater => 1,
            Field::ColdWater => 2,
            Field::ElectricityT1 => 3,
            Field::ElectricityT2 => 4,
        }
    }
}

/// Partially collected readings. `None` means "not entered yet", which is
/// distinct from a real `0` reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readings {
    pub hot_water: Option<u64>,
    pub cold_water: Option<u64>,
    pub electricity_t1: Option<u64>,
    pub electricity_t2: Option<u64>,
}

impl Readings {
    pub fn get(&self, field: Field) -> Option<u64> {
        match field {
            Field::HotWater => self.hot_water,
            Field::ColdWater => self.cold_water,
            Field::ElectricityT1 => self.electricity_t1,
            Field::ElectricityT2 => self.electricity_t2,
        }
    }

    /// First field, in prompt order, that has not been entered yet.
    pub fn first_unset(&self) -> Option<Field> {
        Field::ALL.into_iter().find(|f| self.get(*f).is_none())
    }

    pub fn set(&mut self, field: Field, value: u64) {
        let slot = match field {
            Field::HotWater => &mut self.hot_water,
            Field::ColdWater => &mut self.cold_water,
            Field::ElectricityT1 => &mut self.electricity_t1,
            Field::ElectricityT2 => &mut self.electricity_t2,
        };
        *slot = Some(value);
    }

    /// Stamp a date and produce the final record, if every field is set.
    pub fn finalize(&self, date: NaiveDate) -> Option<MeterRecord> {
        Some(MeterRecord {
            date,
            hot_water: self.hot_water?,
            cold_water: self.cold_water?,
            electricity_t1: self.electricity_t1?,
            electricity_t2: self.electricity_t2?,
        })
    }
}

/// One finalized submission, as stored in the spreadsheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterRecord {
    pub date: NaiveDate,
    pub hot_water: u64,
    pub cold_water: u64,
    pub electricity_t1: u64,
    pub electricity_t2: u64,
}

/// Signed, element-wise difference between two records. Display only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeterDiff {
    pub date: NaiveDate,
    pub hot_water: i64,
    pub cold_water: i64,
    pub electricity_t1: i64,
    pub electricity_t2: i64,
}

impl MeterDiff {
    pub fn get(&self, field: Field) -> i64 {
        match field {
            Field::HotWater => self.hot_water,
            Field::ColdWater => self.cold_water,
            Field::ElectricityT1 => self.electricity_t1,
            Field::ElectricityT2 => self.electricity_t2,
        }
    }
}

/// A stored row that cannot be read back as a [`MeterRecord`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("expected 5 cells, got {0}")]
    TooShort(usize),

    #[error("invalid date {0:?}")]
    Date(String),

    #[error("invalid {column}: {source}")]
    Reading {
        column: &'static str,
        #[source]
        source: ValidationError,
    },
}

impl MeterRecord {
    pub fn get(&self, field: Field) -> u64 {
        match field {
            Field::HotWater => self.hot_water,
            Field::ColdWater => self.cold_water,
            Field::ElectricityT1 => self.electricity_t1,
            Field::ElectricityT2 => self.electricity_t2,
        }
    }

    /// `self - other`, field by field. The date is taken from `self`.
    pub fn diff(&self, other: &MeterRecord) -> MeterDiff {
        // Readings come from `validate`, so they fit in an i64.
        let sub = |a: u64, b: u64| a as i64 - b as i64;
        MeterDiff {
            date: self.date,
            hot_water: sub(self.hot_water, other.hot_water),
            cold_water: sub(self.cold_water, other.cold_water),
            electricity_t1: sub(self.electricity_t1, other.electricity_t1),
            electricity_t2: sub(self.electricity_t2, other.electricity_t2),
        }
    }

    pub fn formatted_date(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// `[date, hot water, cold water, electricity t1, electricity t2]`.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(ROW_LEN);
        row.push(self.formatted_date());
        row.extend(Field::ALL.iter().map(|f| self.get(*f).to_string()));
        row
    }

    /// Parse a stored row. Extra trailing cells are ignored.
    pub fn from_row(row: &[String]) -> Result<Self, RowError> {
        if row.len() < ROW_LEN {
            return Err(RowError::TooShort(row.len()));
        }

        let raw_date = row[0].trim();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|_| RowError::Date(raw_date.to_string()))?;

        let mut readings = Readings::default();
        for field in Field::ALL {
            let value = validate(&row[field.column()]).map_err(|source| RowError::Reading {
                column: field.label(),
                source,
            })?;
            readings.set(field, value);
        }

        readings
            .finalize(date)
            .ok_or(RowError::TooShort(row.len()))
    }
}
