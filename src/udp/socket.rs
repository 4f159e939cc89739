use std::io;
use std::net;
use std::sync::Arc;
use std::time;

use log::trace;

use crate::frame;
use crate::segment::Segment;

// Largest UDP payload which avoids IP fragmentation on a 1500-byte MTU
pub const FRAME_SIZE_MAX: usize = 1472;

const SOCKET_POLLING_KEY: usize = 0;

/// Sending half of a segment socket.
pub struct SegmentTx {
    socket: Arc<net::UdpSocket>,
}

/// Receiving half of a segment socket. Owns the poller and the receive buffer.
pub struct SegmentRx {
    socket: Arc<net::UdpSocket>,
    local_addr: net::SocketAddr,
    poller: polling::Poller,
    poller_events: polling::Events,
    recv_buffer: Box<[u8]>,
}

impl SegmentTx {
    /// Encodes `segment` and sends it as a single datagram.
    pub fn send(&self, segment: &Segment, addr: &net::SocketAddr) {
        let frame_bytes = frame::write_segment(segment);

        // A lost datagram is a lost segment, the connection resends as needed
        if let Err(err) = self.socket.send_to(&frame_bytes, addr) {
            trace!("send to {} failed: {}", addr, err);
        }
    }
}

impl SegmentRx {
    /// Returns the next well-formed segment waiting on the socket, along with its sender.
    /// Malformed datagrams are skipped. Returns Ok(None) once nothing is left to read.
    pub fn try_recv(&mut self) -> io::Result<Option<(Segment, net::SocketAddr)>> {
        loop {
            let (frame_len, sender_addr) = match self.socket.recv_from(&mut self.recv_buffer) {
                Ok(received) => received,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(err) => return Err(err),
            };

            match frame::read_segment(&self.recv_buffer[..frame_len]) {
                Some(segment) => return Ok(Some((segment, sender_addr))),
                None => trace!("dropped malformed frame from {}", sender_addr),
            }
        }
    }

    /// Blocks for up to `timeout` until the socket becomes readable. A false return means the
    /// wait timed out or woke spuriously.
    pub fn wait_readable(&mut self, timeout: Option<time::Duration>) -> io::Result<bool> {
        // Interest is oneshot, so it is renewed before every wait
        self.poller
            .modify(&*self.socket, polling::Event::readable(SOCKET_POLLING_KEY))?;

        self.poller_events.clear();

        Ok(self.poller.wait(&mut self.poller_events, timeout)? > 0)
    }

    pub fn local_addr(&self) -> net::SocketAddr {
        self.local_addr
    }
}

impl Drop for SegmentRx {
    fn drop(&mut self) {
        let _ = self.poller.delete(&*self.socket);
    }
}

/// Binds a non-blocking UDP socket which carries one segment per datagram, and splits it into
/// sending and receiving halves.
pub fn bind<A>(bind_address: A) -> io::Result<(SegmentTx, SegmentRx)>
where
    A: net::ToSocketAddrs,
{
    let socket = net::UdpSocket::bind(bind_address)?;
    socket.set_nonblocking(true)?;

    let local_addr = socket.local_addr()?;

    let poller = polling::Poller::new()?;

    // The registration is removed before the socket closes, see Drop for SegmentRx
    unsafe {
        poller.add(&socket, polling::Event::readable(SOCKET_POLLING_KEY))?;
    }

    let socket = Arc::new(socket);

    let tx = SegmentTx {
        socket: Arc::clone(&socket),
    };

    let rx = SegmentRx {
        socket,
        local_addr,
        poller,
        poller_events: polling::Events::new(),
        recv_buffer: vec![0; FRAME_SIZE_MAX].into_boxed_slice(),
    };

    Ok((tx, rx))
}
