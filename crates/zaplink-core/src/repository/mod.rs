//! Repository trait definitions (ports implemented in zaplink-infra).

pub mod contact;
pub mod message;
pub mod session;

pub use contact::ContactRepository;
pub use message::MessageRepository;
pub use session::SessionRepository;
