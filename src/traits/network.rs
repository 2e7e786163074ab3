//! Wireless transport trait for the configuration surface.
//!
//! The transport carries register reads and writes between a remote client
//! and the [`WirelessInterface`](crate::wireless::WirelessInterface). It owns
//! the wire encoding; the interface owns validation and side effects.
//!
//! Requests are handled strictly one at a time: every request returned by
//! [`poll_request`](WirelessTransport::poll_request) is answered by exactly one
//! [`respond`](WirelessTransport::respond) call before the next poll.

use crate::wireless::{Field, RegisterError, RegisterValue};
use core::fmt::Debug;

/// A request from the remote client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOp {
    /// Read the current value of a field.
    Read(Field),
    /// Write a new value to a field.
    Write(Field, RegisterValue),
}

/// Answer to a [`RegisterOp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterReply {
    /// Current value of a field.
    Value(Field, RegisterValue),
    /// The write was stored.
    Accepted(Field),
    /// The write was rejected; the stored value is unchanged.
    Rejected(Field, RegisterError),
}

/// Radio-side transport for the register table.
///
/// Connection state is not part of this trait: the radio stack reports it
/// through [`LinkStatus`](crate::status::LinkStatus) from its own callbacks.
pub trait WirelessTransport {
    /// Error type for transport operations.
    type Error: Debug;

    /// Makes the device discoverable.
    fn start_advertising(&mut self) -> Result<(), Self::Error>;

    /// Stops being discoverable. Safe to call when not advertising.
    fn stop_advertising(&mut self) -> Result<(), Self::Error>;

    /// Returns the next pending request, if any. Never blocks.
    fn poll_request(&mut self) -> Option<RegisterOp>;

    /// Answers the request returned by the last `poll_request`.
    fn respond(&mut self, reply: RegisterReply);
}
