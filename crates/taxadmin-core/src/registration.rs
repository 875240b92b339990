//! # Taxpayer Registration
//!
//! A registration is one of three shapes sharing a common envelope (number,
//! status, dates) kept by the API layer. The shape is a tagged union with
//! `registration_type` as the discriminant:
//!
//! ```json
//! {"registration_type": "sole_proprietor", "owner_name": "...", ...}
//! ```
//!
//! [`Registration::validate`] collects every problem rather than stopping at
//! the first one, so a client can fix a form in one round trip.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;

/// Discriminant of [`Registration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    /// Natural person.
    Individual,
    /// Company, partnership, trust or other organization.
    NonIndividual,
    /// Person trading under a business name.
    SoleProprietor,
}

impl RegistrationType {
    /// Every registration type.
    pub const ALL: &'static [RegistrationType] =
        &[Self::Individual, Self::NonIndividual, Self::SoleProprietor];

    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::NonIndividual => "non_individual",
            Self::SoleProprietor => "sole_proprietor",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::NonIndividual => "Non-Individual",
            Self::SoleProprietor => "Sole Proprietor",
        }
    }
}

impl fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == trimmed || t.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownLabel {
                kind: "registration type",
                value: s.to_string(),
            })
    }
}

/// Personal details of an individual registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualDetails {
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: String,
    /// National identity number.
    #[serde(default)]
    pub national_id: String,
    /// Date of birth.
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    /// Postal address.
    #[serde(default)]
    pub address: String,
    /// Occupation, if given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    /// Employed, Self-Employed, Unemployed, Retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_status: Option<String>,
    /// Country of tax residence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_residency: Option<String>,
}

/// Organization details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonIndividualDetails {
    /// Legal name.
    #[serde(default)]
    pub organization_name: String,
    /// Company registry number.
    #[serde(default)]
    pub organization_registration_number: String,
    /// Corporation, Partnership, LLC, Trust, NGO.
    #[serde(default)]
    pub business_type: String,
    /// Industry sector.
    #[serde(default)]
    pub industry_sector: String,
    /// Declared annual turnover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_turnover: Option<Money>,
    /// Headcount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_employees: Option<u32>,
}

/// Sole proprietor details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoleProprietorDetails {
    /// Owner's full name.
    #[serde(default)]
    pub owner_name: String,
    /// Owner's national identity number.
    #[serde(default)]
    pub national_id: String,
    /// Trading name.
    #[serde(default)]
    pub business_name: String,
    /// Trading address.
    #[serde(default)]
    pub business_address: String,
    /// Industry sector.
    #[serde(default)]
    pub industry_sector: String,
    /// Declared annual turnover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_turnover: Option<Money>,
}

/// A registration body, discriminated by `registration_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "registration_type", rename_all = "snake_case")]
pub enum Registration {
    /// Individual taxpayer.
    Individual(IndividualDetails),
    /// Organization.
    NonIndividual(NonIndividualDetails),
    /// Sole proprietor.
    SoleProprietor(SoleProprietorDetails),
}

fn require(errors: &mut Vec<String>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Required(field).to_string());
    }
}

fn non_negative_turnover(errors: &mut Vec<String>, turnover: Option<Money>) {
    if let Some(Err(e)) = turnover.map(|t| t.non_negative("annual_turnover")) {
        errors.push(e.to_string());
    }
}

impl Registration {
    /// The discriminant.
    pub fn registration_type(&self) -> RegistrationType {
        match self {
            Self::Individual(_) => RegistrationType::Individual,
            Self::NonIndividual(_) => RegistrationType::NonIndividual,
            Self::SoleProprietor(_) => RegistrationType::SoleProprietor,
        }
    }

    /// Name shown in listings.
    pub fn display_name(&self) -> String {
        match self {
            Self::Individual(d) => format!("{} {}", d.first_name.trim(), d.last_name.trim()),
            Self::NonIndividual(d) => d.organization_name.trim().to_string(),
            Self::SoleProprietor(d) => d.business_name.trim().to_string(),
        }
    }

    /// National id, for duplicate detection among people.
    pub fn national_id(&self) -> Option<&str> {
        match self {
            Self::Individual(d) => Some(d.national_id.trim()),
            Self::SoleProprietor(d) => Some(d.national_id.trim()),
            Self::NonIndividual(_) => None,
        }
    }

    /// Contact email, when the shape carries one.
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Individual(d) => Some(d.email.trim()),
            _ => None,
        }
    }

    /// Every validation problem, in field order. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self {
            Self::Individual(d) => {
                require(&mut errors, "first_name", &d.first_name);
                require(&mut errors, "last_name", &d.last_name);
                require(&mut errors, "email", &d.email);
                if !d.email.trim().is_empty() && !d.email.contains('@') {
                    errors.push("email must be a valid email address".to_string());
                }
                require(&mut errors, "phone", &d.phone);
                require(&mut errors, "national_id", &d.national_id);
                if d.date_of_birth.is_none() {
                    errors.push(ValidationError::Required("date_of_birth").to_string());
                }
                require(&mut errors, "address", &d.address);
            }
            Self::NonIndividual(d) => {
                require(&mut errors, "organization_name", &d.organization_name);
                require(
                    &mut errors,
                    "organization_registration_number",
                    &d.organization_registration_number,
                );
                require(&mut errors, "business_type", &d.business_type);
                require(&mut errors, "industry_sector", &d.industry_sector);
                non_negative_turnover(&mut errors, d.annual_turnover);
            }
            Self::SoleProprietor(d) => {
                require(&mut errors, "owner_name", &d.owner_name);
                require(&mut errors, "national_id", &d.national_id);
                require(&mut errors, "business_name", &d.business_name);
                require(&mut errors, "business_address", &d.business_address);
                require(&mut errors, "industry_sector", &d.industry_sector);
                non_negative_turnover(&mut errors, d.annual_turnover);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_by_tag() {
        let json = r#"{
            "registration_type": "sole_proprietor",
            "owner_name": "Ama Mensah",
            "national_id": "GH-123",
            "business_name": "Ama Prints",
            "business_address": "1 High St",
            "industry_sector": "Printing",
            "annual_turnover": "120000.00"
        }"#;
        let reg: Registration = serde_json::from_str(json).unwrap();
        assert_eq!(reg.registration_type(), RegistrationType::SoleProprietor);
        assert_eq!(reg.display_name(), "Ama Prints");
        assert_eq!(reg.national_id(), Some("GH-123"));
        assert!(reg.validate().is_empty());
    }

    #[test]
    fn serializes_with_tag() {
        let reg = Registration::NonIndividual(NonIndividualDetails {
            organization_name: "Acme".into(),
            organization_registration_number: "C-1".into(),
            business_type: "LLC".into(),
            industry_sector: "Retail".into(),
            annual_turnover: None,
            number_of_employees: Some(12),
        });
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["registration_type"], "non_individual");
        assert_eq!(value["number_of_employees"], 12);
        assert!(value.get("annual_turnover").is_none());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = serde_json::from_str::<Registration>(r#"{"registration_type":"trust"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn individual_collects_every_missing_field() {
        let reg: Registration =
            serde_json::from_str(r#"{"registration_type":"individual","first_name":"Kofi"}"#).unwrap();
        let errors = reg.validate();
        assert_eq!(
            errors,
            vec![
                "last_name is required",
                "email is required",
                "phone is required",
                "national_id is required",
                "date_of_birth is required",
                "address is required",
            ]
        );
    }

    #[test]
    fn negative_turnover_is_invalid() {
        let reg = Registration::SoleProprietor(SoleProprietorDetails {
            owner_name: "A".into(),
            national_id: "N".into(),
            business_name: "B".into(),
            business_address: "C".into(),
            industry_sector: "D".into(),
            annual_turnover: Some(Money::from_major(-1)),
        });
        assert_eq!(reg.validate(), vec!["annual_turnover must not be negative"]);
    }

    #[test]
    fn type_parses_tag_and_label() {
        assert_eq!(
            "Non-Individual".parse::<RegistrationType>().unwrap(),
            RegistrationType::NonIndividual
        );
        assert_eq!(
            "sole_proprietor".parse::<RegistrationType>().unwrap(),
            RegistrationType::SoleProprietor
        );
        assert!("company".parse::<RegistrationType>().is_err());
    }
}
