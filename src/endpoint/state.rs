use std::fmt;

use super::receiver::Receiver;
use super::sender::Sender;

/// Summary of the outbound half of a connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SenderState {
    Error,
    Closed,
    SynSent,
    SynAcked,
    FinSent,
    FinAcked,
}

/// Summary of the inbound half of a connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReceiverState {
    Error,
    Listen,
    SynRecv,
    FinRecv,
}

/// The named TCP states.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum State {
    Listen,
    SynRcvd,
    SynSent,
    Established,
    CloseWait,
    LastAck,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    Reset,
    Closed,
}

impl SenderState {
    pub fn of(sender: &Sender) -> Self {
        let stream = sender.stream_in();
        let next_seqno = sender.next_seqno_absolute();

        if stream.error() {
            Self::Error
        } else if next_seqno == 0 {
            Self::Closed
        } else if next_seqno == sender.bytes_in_flight() {
            Self::SynSent
        } else if !sender.fin_sent() {
            Self::SynAcked
        } else if sender.bytes_in_flight() > 0 {
            Self::FinSent
        } else {
            Self::FinAcked
        }
    }
}

impl ReceiverState {
    pub fn of(receiver: &Receiver) -> Self {
        if receiver.stream_out().error() {
            Self::Error
        } else if receiver.ackno().is_none() {
            Self::Listen
        } else if receiver.stream_out().input_ended() {
            Self::FinRecv
        } else {
            Self::SynRecv
        }
    }
}

impl State {
    pub const ALL: [State; 12] = [
        State::Listen,
        State::SynRcvd,
        State::SynSent,
        State::Established,
        State::CloseWait,
        State::LastAck,
        State::FinWait1,
        State::FinWait2,
        State::Closing,
        State::TimeWait,
        State::Reset,
        State::Closed,
    ];
}

/// A connection's state as observed from its parts. Two connections in the same named state
/// compare equal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TcpState {
    pub sender: SenderState,
    pub receiver: ReceiverState,
    pub active: bool,
    pub linger: bool,
}

impl TcpState {
    pub fn new(sender: &Sender, receiver: &Receiver, active: bool, linger: bool) -> Self {
        Self {
            sender: SenderState::of(sender),
            receiver: ReceiverState::of(receiver),
            active,
            // Only meaningful while active
            linger: active && linger,
        }
    }

    /// The named state this summary corresponds to, if any.
    pub fn named(&self) -> Option<State> {
        State::ALL
            .into_iter()
            .find(|&state| TcpState::from(state) == *self)
    }
}

impl From<State> for TcpState {
    fn from(state: State) -> Self {
        let (sender, receiver, active, linger) = match state {
            State::Listen => (SenderState::Closed, ReceiverState::Listen, true, true),
            State::SynRcvd => (SenderState::SynSent, ReceiverState::SynRecv, true, true),
            State::SynSent => (SenderState::SynSent, ReceiverState::Listen, true, true),
            State::Established => (SenderState::SynAcked, ReceiverState::SynRecv, true, true),
            State::CloseWait => (SenderState::SynAcked, ReceiverState::FinRecv, true, false),
            State::LastAck => (SenderState::FinSent, ReceiverState::FinRecv, true, false),
            State::Closing => (SenderState::FinSent, ReceiverState::FinRecv, true, true),
            State::FinWait1 => (SenderState::FinSent, ReceiverState::SynRecv, true, true),
            State::FinWait2 => (SenderState::FinAcked, ReceiverState::SynRecv, true, true),
            State::TimeWait => (SenderState::FinAcked, ReceiverState::FinRecv, true, true),
            State::Reset => (SenderState::Error, ReceiverState::Error, false, false),
            State::Closed => (SenderState::FinAcked, ReceiverState::FinRecv, false, false),
        };

        Self {
            sender,
            receiver,
            active,
            linger,
        }
    }
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error (connection was reset)",
            Self::Closed => "waiting for stream to begin (no SYN sent)",
            Self::SynSent => "stream started but nothing acknowledged",
            Self::SynAcked => "stream ongoing",
            Self::FinSent => "stream finished (FIN sent) but not fully acknowledged",
            Self::FinAcked => "stream finished and fully acknowledged",
        })
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error (connection was reset)",
            Self::Listen => "waiting for stream to begin (listening for SYN)",
            Self::SynRecv => "stream started",
            Self::FinRecv => "stream finished",
        })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Listen => "LISTEN",
            Self::SynRcvd => "SYN_RCVD",
            Self::SynSent => "SYN_SENT",
            Self::Established => "ESTABLISHED",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::FinWait1 => "FIN_WAIT_1",
            Self::FinWait2 => "FIN_WAIT_2",
            Self::Closing => "CLOSING",
            Self::TimeWait => "TIME_WAIT",
            Self::Reset => "RESET",
            Self::Closed => "CLOSED",
        })
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "sender=`{}`, receiver=`{}`, active={}, linger_after_streams_finish={}",
            self.sender, self.receiver, self.active as u8, self.linger as u8
        )?;

        if let Some(state) = self.named() {
            write!(f, " [{}]", state)?;
        }

        Ok(())
    }
}
