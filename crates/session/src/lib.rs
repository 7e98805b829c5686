//! Session keys for smartkey accounts
//!
//! A session key is a throwaway key the account owner enables for a limited time, a limited number
//! of uses and a single contract function. Its record lives in a single slot store and its status
//! is always derived from the record and the current time.

mod clock;
mod descriptor;
mod error;
mod manager;
mod status;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use descriptor::SessionDescriptor;
pub use error::{SessionError, StoreError};
pub use manager::{SessionConfig, SessionManager, SessionUse, Settlement};
pub use status::{format_time_remaining, SessionState, SessionStatus};
pub use store::{load_or_ignore, FileSessionStore, MemorySessionStore, SessionStore};
