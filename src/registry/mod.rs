pub mod patient;
pub mod repository;

pub use patient::{BloodGroup, Gender, Patient, PatientForm, age_from_input, age_on};
