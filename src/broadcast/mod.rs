//! Broadcast channels for worker status and captured faults.
//!
//! Both channels fan out to any number of independent observers:
//! - [`BusyState`] replays the current busy flag to new observers and
//!   suppresses consecutive duplicates
//! - [`FaultChannel`] delivers every fault published after an observer
//!   subscribed, without replay
//!
//! Each observer gets its own unbounded backlog, so an observer that reads
//! late still sees every event. Observers that drop their receiver are
//! removed; publishing never blocks the worker.
//!
//! # Example
//!
//! ```ignore
//! let status = BusyState::new();
//! let observer = status.subscribe();
//! assert_eq!(observer.recv(), Ok(false)); // current value
//!
//! status.publish(true);
//! status.publish(true); // suppressed
//! status.publish(false);
//! ```

mod channel;
mod faults;
mod status;

pub use channel::{Broadcaster, Subscription, SubscriptionId};
pub use faults::{FaultChannel, FaultReceiver};
pub use status::{BusyState, StatusReceiver};
