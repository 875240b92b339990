//! # Reference Numbers
//!
//! Human-facing identifiers of the form `{PREFIX}{8 uppercase hex}`, for
//! example `PMT-3F09A1BC`. The suffix is the first eight hex digits of a
//! random UUIDv4. Uniqueness is enforced by the database's unique
//! constraints, not by the generator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ValidationError;

/// Length of the random hex suffix.
pub const SUFFIX_LEN: usize = 8;

/// The kind of record a reference number identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Tax return.
    TaxReturn,
    /// Payment.
    Payment,
    /// Overpayment credit note.
    Credit,
    /// Refund request.
    Refund,
    /// Objection.
    Objection,
    /// Audit.
    Audit,
    /// Audit case.
    AuditCase,
    /// Service request.
    Request,
    /// Collection.
    Collection,
    /// Taxpayer registration.
    Registration,
}

impl ReferenceKind {
    /// Every kind, used when recognising a prefix.
    pub const ALL: &'static [ReferenceKind] = &[
        Self::TaxReturn,
        Self::Payment,
        Self::Credit,
        Self::Refund,
        Self::Objection,
        Self::Audit,
        Self::AuditCase,
        Self::Request,
        Self::Collection,
        Self::Registration,
    ];

    /// The prefix, including its trailing dash.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::TaxReturn => "TX-",
            Self::Payment => "PMT-",
            Self::Credit => "CR-",
            Self::Refund => "REF-",
            Self::Objection => "OBJ-",
            Self::Audit => "AUD-",
            Self::AuditCase => "AC-",
            Self::Request => "REQ-",
            Self::Collection => "COL-",
            Self::Registration => "RG-",
        }
    }
}

/// A validated reference number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceNumber {
    kind: ReferenceKind,
    value: String,
}

impl ReferenceNumber {
    /// Generate a fresh reference of the given kind.
    pub fn generate(kind: ReferenceKind) -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        let suffix = hex[..SUFFIX_LEN].to_ascii_uppercase();
        Self {
            kind,
            value: format!("{}{}", kind.prefix(), suffix),
        }
    }

    /// Parse and validate an existing reference.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let kind = ReferenceKind::ALL
            .iter()
            .copied()
            .find(|k| trimmed.starts_with(k.prefix()))
            .ok_or_else(|| ValidationError::InvalidReference(input.to_string()))?;
        let suffix = &trimmed[kind.prefix().len()..];
        let well_formed = suffix.len() == SUFFIX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
        if !well_formed {
            return Err(ValidationError::InvalidReference(input.to_string()));
        }
        Ok(Self {
            kind,
            value: trimmed.to_string(),
        })
    }

    /// The record kind encoded by the prefix.
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// The full reference text.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume into the owned string.
    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for ReferenceNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ReferenceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for ReferenceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_have_prefix_and_hex_suffix() {
        for kind in ReferenceKind::ALL {
            let r = ReferenceNumber::generate(*kind);
            assert!(r.as_str().starts_with(kind.prefix()));
            assert_eq!(r.as_str().len(), kind.prefix().len() + SUFFIX_LEN);
            assert_eq!(ReferenceNumber::parse(r.as_str()).unwrap(), r);
        }
    }

    #[test]
    fn generated_references_differ() {
        let a = ReferenceNumber::generate(ReferenceKind::Payment);
        let b = ReferenceNumber::generate(ReferenceKind::Payment);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_recognises_kind() {
        let r = ReferenceNumber::parse("OBJ-00FF12AB").unwrap();
        assert_eq!(r.kind(), ReferenceKind::Objection);
        let r = ReferenceNumber::parse("AC-DEADBEEF").unwrap();
        assert_eq!(r.kind(), ReferenceKind::AuditCase);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(ReferenceNumber::parse("PMT-123").is_err());
        assert!(ReferenceNumber::parse("PMT-abcdef12").is_err());
        assert!(ReferenceNumber::parse("XYZ-ABCDEF12").is_err());
        assert!(ReferenceNumber::parse("").is_err());
    }
}
