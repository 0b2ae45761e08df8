//! Socket construction.
//!
//! Socket options are set through socket2 before the handle is converted
//! into a std or tokio type, so callers never deal with raw descriptors.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use tracing::warn;

/// Open a stream socket matching `addr`'s family, with no-delay enabled.
pub fn stream_socket(addr: &SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;
    Ok(socket)
}

/// Start a non-blocking connect of `socket` to `addr`.
///
/// The handshake usually completes later; the caller waits for writability
/// and then checks the outcome (see `client::connect`).
pub fn start_connect(socket: Socket, addr: &SocketAddr) -> io::Result<TcpStream> {
    socket.set_nonblocking(true)?;
    match socket.connect(&(*addr).into()) {
        Ok(()) => {}
        Err(ref e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => return Err(e),
    }
    Ok(socket.into())
}

/// Bind a listener on every local address for `port`.
///
/// Prefers one IPv6 socket with `IPV6_V6ONLY` off, which also accepts IPv4
/// clients as mapped addresses. Hosts without IPv6 get an IPv4 wildcard
/// listener instead. The returned listener is non-blocking.
pub fn dual_stack_listener(port: u16, backlog: i32) -> io::Result<TcpListener> {
    match bind_listener(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)), backlog) {
        Ok(listener) => Ok(listener),
        Err(e) if ipv6_unavailable(&e) => {
            warn!(error = %e, "IPv6 unavailable, listening on IPv4 only");
            bind_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), backlog)
        }
        Err(e) => Err(e),
    }
}

fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

fn ipv6_unavailable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::AddrNotAvailable | io::ErrorKind::Unsupported
    ) || e.raw_os_error() == Some(libc::EAFNOSUPPORT)
}

/// Display form of a peer: `[ip]:port`, with IPv4-mapped IPv6 shown as IPv4.
pub fn peer_label(addr: &SocketAddr) -> String {
    format!("[{}]:{}", addr.ip().to_canonical(), addr.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_label() {
        let v4: SocketAddr = "127.0.0.1:50414".parse().unwrap();
        assert_eq!(peer_label(&v4), "[127.0.0.1]:50414");

        let mapped: SocketAddr = "[::ffff:10.0.0.1]:1234".parse().unwrap();
        assert_eq!(peer_label(&mapped), "[10.0.0.1]:1234");

        let v6: SocketAddr = "[::1]:80".parse().unwrap();
        assert_eq!(peer_label(&v6), "[::1]:80");
    }

    #[test]
    fn test_stream_socket_sets_nodelay() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let socket = stream_socket(&addr).unwrap();
        assert!(socket.nodelay().unwrap());
    }

    #[test]
    fn test_dual_stack_listener_accepts_ipv4() {
        let listener = dual_stack_listener(0, 10).unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn test_dual_stack_listener_accepts_ipv6() {
        // Hosts without IPv6 loopback have nothing to check here.
        if TcpListener::bind("[::1]:0").is_err() {
            return;
        }

        let listener = dual_stack_listener(0, 10).unwrap();
        if listener.local_addr().unwrap().is_ipv4() {
            return;
        }
        listener.set_nonblocking(false).unwrap();
        let port = listener.local_addr().unwrap().port();

        let _client = TcpStream::connect(("::1", port)).unwrap();
        let (_accepted, peer) = listener.accept().unwrap();
        assert!(peer.is_ipv6());
        assert_eq!(peer_label(&peer), format!("[::1]:{}", peer.port()));
    }

    #[test]
    fn test_start_connect_does_not_block() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let socket = stream_socket(&addr).unwrap();
        let stream = start_connect(socket, &addr).unwrap();
        let (_accepted, peer) = listener.accept().unwrap();
        assert_eq!(stream.local_addr().unwrap(), peer);
    }
}
