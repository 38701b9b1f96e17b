//! Shared domain types for Zaplink.
//!
//! This crate contains the core domain types used across the Zaplink gateway:
//! Session, Message, Contact, the provider and bus event unions, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod contact;
pub mod error;
pub mod event;
pub mod jid;
pub mod message;
pub mod provider;
pub mod session;
