/*

https://www.rfc-editor.org/rfc/rfc9293

Bramble is a user-space implementation of TCP's reliable byte stream. It is split into small
automata which can be tested in isolation, and composed into a full duplex connection.

# Layers

  ByteStream     Bounded FIFO of bytes with end-of-input and error flags.
  Reassembler    Writes out-of-order, overlapping substrings into a ByteStream in order.
  Sender         Cuts an outbound ByteStream into segments and resends the oldest unacknowledged
                 one when the retransmission timer expires.
  Receiver       Feeds inbound segments to a Reassembler and computes the ackno and window to
                 advertise.
  Connection     Composes a Sender and a Receiver into the TCP state machine.

None of these perform I/O or read a clock. Segments to transmit are queued, received segments are
passed in by the caller, and time only advances through explicit calls to tick(). Given the same
calls (and a fixed ISN), a connection always behaves the same way.

The udp module provides one such caller, which carries segments over UDP datagrams.

# Sequence numbers

Segments carry 32-bit sequence numbers which start at a random ISN and wrap around. Internally,
positions are 64-bit absolute sequence numbers counted from the ISN, which never wrap:

  absolute:   0      1      2      ...    N      N+1
  seqno:      ISN    ISN+1  ISN+2  ...    ISN+N  ISN+N+1
  meaning:    SYN    byte 0 byte 1 ...    byte   FIN
                                          N-1

The SYN and FIN flags occupy one sequence number each. Stream indices count payload bytes only,
so stream index i corresponds to absolute sequence number i + 1.

A wrapped seqno is converted back to an absolute one by picking the candidate nearest to a
checkpoint, typically the most recent absolute seqno seen. This is unambiguous as long as the two
are less than 2^31 apart.

# Flow control

The receiver's window is the free space in its ByteStream, i.e. capacity minus bytes assembled but
not yet read by the application. Bytes held by the Reassembler out of order are counted against
the same capacity, but do not shrink the advertised window.

The sender never has more than one window of sequence space in flight. An advertised window of
zero is treated as a window of one, so that a single byte probes for the window reopening.

# Retransmission

One timer covers all outstanding segments:

  - Sending a segment starts the timer if it is not running.
  - An ack which retires at least one outstanding segment resets the timeout to its initial value
    and restarts the timer, or stops it if nothing is outstanding.
  - On expiry, the oldest outstanding segment is resent as-is, and the timeout is doubled.

The Nth consecutive retransmission of a segment therefore happens RTO * (2^N - 1) after it was
first sent. Once a segment has been resent more than max_retx_attempts times in a row, the
connection is reset.

# Connection state

The state of a connection is not stored. It is derived from a summary of each half plus two flags:

  state         sender      receiver    active  linger
  LISTEN        Closed      Listen      1       1
  SYN_SENT      SynSent     Listen      1       1
  SYN_RCVD      SynSent     SynRecv     1       1
  ESTABLISHED   SynAcked    SynRecv     1       1
  CLOSE_WAIT    SynAcked    FinRecv     1       0
  LAST_ACK      FinSent     FinRecv     1       0
  FIN_WAIT_1    FinSent     SynRecv     1       1
  FIN_WAIT_2    FinAcked    SynRecv     1       1
  CLOSING       FinSent     FinRecv     1       1
  TIME_WAIT     FinAcked    FinRecv     1       1
  CLOSED        FinAcked    FinRecv     0       0
  RESET         Error       Error       0       0

Linger is cleared when the inbound stream finishes before the outbound stream has been fully sent,
i.e. the peer closed first. In that case the connection closes as soon as its FIN is
acknowledged. Otherwise, the connection waits in TIME_WAIT for 10 * RTO of silence, so that a
retransmitted FIN from the peer can still be acknowledged.

# Resets

A received RST resets the connection only if it falls within the receive window (or, in SYN_SENT,
if it acknowledges our SYN). A reset poisons both streams and deactivates the connection; an
inactive connection ignores all further input.

*/

pub mod buffer;
pub mod endpoint;
pub mod frame;
pub mod segment;
pub mod seqnum;
pub mod udp;

pub use buffer::{ByteStream, Reassembler};
pub use endpoint::{Config, Connection, State, TcpState, MAX_PAYLOAD_SIZE};
pub use segment::{Header, Segment};
pub use seqnum::SeqNum;

/// Why a connection was reset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// The peer sent an acceptable RST.
    #[error("connection reset by peer")]
    Reset,
    /// The oldest outstanding segment was resent too many times without being acknowledged.
    #[error("connection timed out")]
    Timeout,
}
