use std::fmt;

/// SCTP association states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    /// Initial state, no association
    Closed,
    /// INIT sent, waiting for INIT-ACK
    CookieWait,
    /// COOKIE-ECHO sent, waiting for COOKIE-ACK
    CookieEchoed,
    /// Association established
    Established,
    /// Local shutdown requested, draining outbound data
    ShutdownPending,
    /// SHUTDOWN sent, waiting for SHUTDOWN-ACK
    ShutdownSent,
    /// SHUTDOWN received, draining outbound data
    ShutdownReceived,
    /// SHUTDOWN-ACK sent, waiting for SHUTDOWN-COMPLETE
    ShutdownAckSent,
}

impl AssociationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationState::Closed => "CLOSED",
            AssociationState::CookieWait => "COOKIE-WAIT",
            AssociationState::CookieEchoed => "COOKIE-ECHOED",
            AssociationState::Established => "ESTABLISHED",
            AssociationState::ShutdownPending => "SHUTDOWN-PENDING",
            AssociationState::ShutdownSent => "SHUTDOWN-SENT",
            AssociationState::ShutdownReceived => "SHUTDOWN-RECEIVED",
            AssociationState::ShutdownAckSent => "SHUTDOWN-ACK-SENT",
        }
    }

    /// Any of the four shutdown states
    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self,
            AssociationState::ShutdownPending
                | AssociationState::ShutdownSent
                | AssociationState::ShutdownReceived
                | AssociationState::ShutdownAckSent
        )
    }

    /// States in which inbound DATA is accepted
    pub fn accepts_data(&self) -> bool {
        matches!(
            self,
            AssociationState::Established
                | AssociationState::ShutdownPending
                | AssociationState::ShutdownSent
                | AssociationState::ShutdownReceived
        )
    }
}

impl fmt::Display for AssociationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
