//! Endpoint states of connections, sessions and links

/// 2.4.6 Connection States
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing sent or received yet
    Start,

    /// Header received, none sent
    HeaderReceived,

    /// Header sent, none received
    HeaderSent,

    /// Headers exchanged in both directions
    HeaderExchange,

    /// Header and open sent, nothing received
    OpenPipe,

    /// Header, open and close sent, nothing received
    OpenClosePipe,

    /// Open received, none sent
    OpenReceived,

    /// Open sent, none received
    OpenSent,

    /// Open and close sent, no open received
    ClosePipe,

    /// Open sent and received
    Opened,

    /// The peer initiated close. Only the reply close may still be written
    CloseReceived,

    /// Close sent without error, waiting for the peer's close
    CloseSent,

    /// Close sent carrying an error. Incoming frames other than close are dropped
    Discarding,

    /// Neither side may write anything more
    End,
}

impl ConnectionState {
    /// Whether incoming frames other than close must be ignored
    pub fn is_discarding(&self) -> bool {
        matches!(self, ConnectionState::CloseSent | ConnectionState::Discarding)
    }

    /// Whether the connection has finished
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::End)
    }
}

/// 2.5.5 Session States
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel mapped
    Unmapped,

    /// Begin sent, none received
    BeginSent,

    /// Begin received, none sent
    BeginReceived,

    /// Begin sent and received
    Mapped,

    /// End sent, waiting for the peer's end
    EndSent,

    /// End received, reply pending
    EndReceived,

    /// End sent carrying an error. Incoming frames other than end are dropped
    Discarding,
}

/// 2.6 Link states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No handle assigned
    Detached,

    /// Attach sent, none received
    AttachSent,

    /// Attach received, none sent
    AttachReceived,

    /// Attach sent and received
    Attached,

    /// Detach sent, waiting for the peer's detach
    DetachSent,

    /// Detach received, reply pending
    DetachReceived,
}
