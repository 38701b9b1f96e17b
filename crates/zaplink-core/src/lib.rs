//! Session supervision, ingestion, and event distribution for Zaplink.
//!
//! This crate defines the "ports" (repository, provider, and credential-store
//! traits) that the infrastructure layer implements, plus the logic that runs
//! against them: the `SessionSupervisor` and its per-session connection state
//! machine, the `IngestionPipeline`, the outbound `MessageService`, and the
//! topic-based `EventBus`. It depends only on `zaplink-types` -- never on
//! `zaplink-infra` or any database/IO crate.

pub mod bus;
pub mod credentials;
pub mod messaging;
pub mod pipeline;
pub mod provider;
pub mod repository;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;
