use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;

/// Binds the server socket. A host of "*" binds a wildcard listener,
/// preferring an IPv6 dual-stack socket and falling back to IPv4.
pub async fn create_listener(
    host: &str,
    port: u16,
) -> std::io::Result<(String, tokio::net::TcpListener)> {
    if host == "*" {
        match bind_wildcard_socket(Domain::IPV6, format!("[::]:{}", port)) {
            Ok(bound) => return Ok(bound),
            Err(err) => {
                tracing::warn!(
                    "Failed to bind IPv6 dual-stack listener ({}), attempting IPv4 only",
                    err
                );
            }
        }
        return bind_wildcard_socket(Domain::IPV4, format!("0.0.0.0:{}", port));
    }

    let addr = format!("{}:{}", host, port);
    tracing::info!("Attempting to bind server to {}...", addr);

    let tokio_listener = tokio::net::TcpListener::bind(&addr).await?;

    Ok((addr, tokio_listener))
}

fn bind_wildcard_socket(
    domain: Domain,
    str_addr: String,
) -> std::io::Result<(String, tokio::net::TcpListener)> {
    let addr: SocketAddr = str_addr
        .parse()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    tracing::info!("Attempting to bind server to {}...", str_addr);

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if domain == Domain::IPV6 {
        // Dual-stack mode can be unavailable on some systems; keep going with
        // whatever the socket supports.
        if let Err(err) = socket.set_only_v6(false) {
            tracing::warn!("Failed to set dual-stack mode for IPv6 socket: {}", err);
        }
    }

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    // Make it non-blocking for tokio
    socket.set_nonblocking(true)?;

    let std_listener: std::net::TcpListener = socket.into();
    let tokio_listener = tokio::net::TcpListener::from_std(std_listener)?;

    Ok((str_addr, tokio_listener))
}
