//! The `session` module owns the client's MQTT session.
//!
//! - `state`: connection state, retry budget and message id bookkeeping,
//!   grouped in `MqttClientSession`;
//! - `handler`: the transition function applied to every broker event;
//! - `connection`: `ConnectionManager`, the connect and retry sequence;
//! - `scheduler`: `PublishScheduler`, the keep-alive driven publish loop.
//!
//! The session is passed by `&mut` from one phase to the next; nothing here
//! is shared between tasks.

pub mod connection;
pub mod handler;
pub mod scheduler;
pub mod state;

pub use connection::{BrokerEndpoint, ConnectionManager, ConnectionOptions};
pub use handler::{Outcome, handle};
pub use scheduler::{PublishScheduler, SchedulerExit};
pub use state::{ConnectionState, MqttClientSession, PublishRecord, RetryBudget};
