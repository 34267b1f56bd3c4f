use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

/// Dials `addr` once and drops the connection straight away.
///
/// Used before a relay binds its listener so an unreachable target is
/// reported at startup rather than on the first client.
pub async fn probe(addr: &str, limit: Duration) -> io::Result<()> {
    trace!("probing {} (timeout {})", display!(addr), display!(limit));

    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no answer within {limit:?}"),
        )),
    }
}
