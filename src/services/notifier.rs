//! Notification seam between the monitor and downstream subscribers
//!
//! The monitor calls `publish` synchronously after its state mutation has
//! completed. Implementations must not block; a failure is logged by the
//! caller and never undoes the mutation.

use crate::domain::error::PublishError;
use crate::io::egress_channel::EgressMessage;

pub trait Notifier: Send + Sync {
    fn publish(&self, message: EgressMessage) -> Result<(), PublishError>;
}
