// [apps/controller/src/services/mod.rs]

pub mod authenticator;
pub mod alerting;
pub mod dispatcher;
pub mod hub;
pub mod ingestion;
pub mod sweeper;

pub use authenticator::{AgentAuthenticator, AgentSession, AuthError};
pub use dispatcher::NotificationDispatcher;
pub use hub::SubscriptionHub;
pub use sweeper::spawn_sweeper;
