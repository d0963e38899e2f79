use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::core::{RegistryError, Result, Value};
use crate::result::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub const ALL: [Gender; 4] = [Self::Male, Self::Female, Self::Other, Self::PreferNotToSay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::PreferNotToSay => "prefer-not-to-say",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
            Self::PreferNotToSay => "Prefer not to say",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RegistryError::precondition(format!("Unknown gender '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloodGroup {
    APositive,
    ANegative,
    BPositive,
    BNegative,
    AbPositive,
    AbNegative,
    OPositive,
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RegistryError::precondition(format!("Unknown blood group '{}'", s)))
    }
}

/// Parses a date of birth typed as `YYYY-MM-DD` or `MM/DD/YYYY`.
pub fn parse_date_of_birth(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .ok()
}

/// Whole years between `birth` and `today`, one less when this year's
/// birthday has not been reached. `None` for birth dates after `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<i64> {
    if birth > today {
        return None;
    }
    let mut age = i64::from(today.year() - birth.year());
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    Some(age)
}

/// Age for a typed date of birth; empty or invalid input yields `None`.
pub fn age_from_input(input: &str, today: NaiveDate) -> Option<i64> {
    parse_date_of_birth(input).and_then(|birth| age_on(birth, today))
}

/// Registration form contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    pub name: String,
    pub date_of_birth: String,
    pub gender: Option<Gender>,
    pub contact: String,
    pub blood_group: Option<BloodGroup>,
    pub description: String,
}

impl PatientForm {
    /// Checks the fields the form marks as required.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::precondition("Name is required"));
        }
        if self.contact.trim().is_empty() {
            return Err(RegistryError::precondition("Contact number is required"));
        }
        if self.gender.is_none() {
            return Err(RegistryError::precondition("Gender is required"));
        }
        Ok(())
    }

    /// Insert parameters in column order: name, age, gender, contact,
    /// blood_group, description.
    pub fn insert_params(&self, today: NaiveDate) -> Vec<Value> {
        vec![
            Value::from(self.name.clone()),
            Value::from(age_from_input(&self.date_of_birth, today)),
            Value::from(self.gender.map(|g| g.as_str())),
            optional_text(&self.contact),
            Value::from(self.blood_group.map(|b| b.as_str())),
            optional_text(&self.description),
        ]
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Form pre-filled from a stored row. Only the age is stored, so the date
    /// of birth starts empty; unrecognized choice values are left unselected.
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            date_of_birth: String::new(),
            gender: patient.gender.as_deref().and_then(|g| g.parse().ok()),
            contact: patient.contact.clone().unwrap_or_default(),
            blood_group: patient.blood_group.as_deref().and_then(|b| b.parse().ok()),
            description: patient.description.clone().unwrap_or_default(),
        }
    }
}

fn optional_text(text: &str) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        Value::Text(text.to_string())
    }
}

/// A stored patient row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub contact: Option<String>,
    pub blood_group: Option<String>,
    pub description: Option<String>,
}

impl Patient {
    pub fn from_row(row: &Row) -> Result<Self> {
        let id = row
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RegistryError::TypeMismatch("patient row has no integer id".into()))?;
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::TypeMismatch("patient row has no name".into()))?
            .to_string();
        let text = |column: &str| row.get(column).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            id,
            name,
            age: row.get("age").and_then(Value::as_i64),
            gender: text("gender"),
            contact: text("contact"),
            blood_group: text("blood_group"),
            description: text("description"),
        })
    }
}
