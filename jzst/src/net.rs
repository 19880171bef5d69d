use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Socket options applied before a UDP socket is bound.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UdpOptions {
    pub reuse_address: bool,
    pub reuse_port: bool,
    pub broadcast: bool,
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
}

/// Binds a tokio UDP socket through socket2 so options that must precede
/// `bind` (address reuse, buffer sizes) can be set.
///
/// Buffer sizes are requests; the OS may clamp them, and a refusal is
/// logged rather than treated as fatal.
pub(crate) fn bind_udp(addr: SocketAddr, options: UdpOptions) -> io::Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    if options.reuse_address {
        socket.set_reuse_address(true)?;
    }
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    if options.reuse_port {
        socket.set_reuse_port(true)?;
    }
    if options.broadcast {
        socket.set_broadcast(true)?;
    }
    if let Some(size) = options.recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::debug!(size, "recv buffer size refused: {}", e);
        }
    }
    if let Some(size) = options.send_buffer_size {
        if let Err(e) = socket.set_send_buffer_size(size) {
            tracing::debug!(size, "send buffer size refused: {}", e);
        }
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
