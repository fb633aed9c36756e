//! Telegram front end: Bot API client, polling connector, message handlers.
//!
//! The connector owns the receive loop and its reconnect/backoff state; the
//! handlers own per-message behaviour; the client is plain transport. No
//! ambient globals — the process supervisor holds the single active
//! connector through a [`connector::Supervisor`].

pub mod api;
pub mod connector;
pub mod handlers;

pub use api::BotClient;
pub use connector::{BackoffPolicy, Connector, ConnectorHandle, FailureKind, Supervisor};
