//! GiveFast - multi-tenant donation platform backend
//!
//! This crate implements the payment transaction and ITN (Instant Transaction
//! Notification) verification pipeline: payment initiation against the
//! configured gateway, cryptographic webhook verification, tamper-proof
//! tenant routing via signed merchant references, and an auditable
//! transaction state machine.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod payments;
pub mod services;
pub mod tenants;
pub mod transactions;
