//! # API Route Modules
//!
//! - `auth`: the caller's identity, user administration, user types.
//! - `dashboard`: statistics, upcoming periods, notifications.
//! - `e_services`: taxpayer self-service (accounts, obligations, tracking,
//!   service requests).
//! - `tax`: filing, payments, refunds, objections, audits, the ledger, and
//!   the tax calculator.
//! - `process`: back-office audit, request, and collection workflows.
//! - `registration`: taxpayer registration and its approval.
//! - `reporting`: management reports.
//! - `admin`: metrics, settings, and the audit trail.

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod e_services;
pub mod process;
pub mod registration;
pub mod reporting;
pub mod tax;
