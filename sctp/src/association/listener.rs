//! Association lifecycle callbacks

use crate::association::CookieError;
use crate::codec::{ErrorCause, FormatError};
use crate::stream::StreamListener;
use std::fmt;

/// Why an association ended without a graceful shutdown
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// Peer sent ABORT with these causes
    Peer(Vec<ErrorCause>),
    /// We sent ABORT with this cause
    Local(ErrorCause),
    /// A COOKIE-ECHO was refused during the handshake
    Cookie(CookieError),
    /// A packet for this association could not be decoded
    Malformed(FormatError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Peer(causes) => {
                write!(f, "aborted by peer")?;
                for cause in causes {
                    write!(f, " [cause {}]", cause.code())?;
                }
                Ok(())
            }
            AbortReason::Local(cause) => write!(f, "aborted locally [cause {}]", cause.code()),
            AbortReason::Cookie(err) => write!(f, "handshake rejected: {}", err),
            AbortReason::Malformed(err) => write!(f, "malformed packet: {}", err),
        }
    }
}

/// Upper layer of an association: receives messages through
/// [`StreamListener`] and lifecycle events through the methods below.
pub trait AssociationListener: StreamListener {
    fn on_established(&mut self) {}

    fn on_aborted(&mut self, _reason: &AbortReason) {}

    fn on_shutdown_complete(&mut self) {}
}
