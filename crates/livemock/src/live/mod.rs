//! Live interception: operators watch a client id and may answer its requests.
//!
//! ## Module Structure
//!
//! - `protocol`: JSON message shapes exchanged with sessions
//! - `channel`: `NotificationChannel` trait and the `LiveHub` fan-out
//! - `coordinator`: pending-request lifecycle and the override/deadline race
//! - `server`: TCP listener speaking newline-delimited JSON

mod channel;
mod coordinator;
mod protocol;
mod server;


pub use channel::{
    LiveHub, NotificationChannel, OverrideHandler, PublishOutcome, SessionId, TransportError,
};
pub use coordinator::{
    InterceptionCoordinator, OverrideOutcome, PendingInterception, Resolution,
    DEFAULT_INTERCEPT_TIMEOUT,
};
pub use protocol::{
    render_headers, ClientMessage, InterceptEvent, OverrideResponse, ResponseEnvelope,
    ServerMessage, UI_ROLE,
};
pub use server::{LiveServer, MAX_LINE_LENGTH};
