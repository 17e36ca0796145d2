use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::net::TcpListener;

/// Binds a listening TCP socket on every local address at `port`.
///
/// An IPv6 dual-stack socket is tried first, plain IPv4 second. The socket
/// has `SO_REUSEADDR` set and is registered with the current tokio runtime,
/// so this must be called from within one.
///
/// Port `0` picks an ephemeral port; see [`TcpListener::local_addr`].
pub fn socket_listen(port: u16, backlog: i32) -> io::Result<TcpListener> {
    let socket = match bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)), backlog) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::debug!("IPv6 listen on port {port} failed ({e}), falling back to IPv4");
            bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), backlog)?
        }
    };

    TcpListener::from_std(socket.into())
}

fn bind(addr: SocketAddr, backlog: i32) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(addr))?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    #[tokio::test]
    async fn accepts_loopback_connections() {
        let listener = socket_listen(0, 16).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_ne!(port, 0);

        let (client, server) = tokio::join!(
            TcpStream::connect((Ipv4Addr::LOCALHOST, port)),
            listener.accept()
        );
        let (mut client, (mut server, _)) = (client.unwrap(), server.unwrap());

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
