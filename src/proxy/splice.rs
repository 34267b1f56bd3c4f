use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::stats::StatsTable;

const BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToTarget,
    TargetToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToTarget => f.write_str("client->target"),
            Self::TargetToClient => f.write_str("target->client"),
        }
    }
}

/// Relays one accepted client session to `target` until both directions end.
///
/// A failed dial drops the client and leaves the stats untouched. Once the
/// dial succeeds the session is counted as active until both copy
/// directions have finished; each direction records its own byte count
/// when it finishes.
pub async fn splice(client: TcpStream, target: &str, port: &str, stats: &StatsTable) {
    let upstream = match TcpStream::connect(target).await {
        Ok(x) => x,
        Err(e) => {
            warn!("cannot connect to {}: {}", display!(target), display!(e));
            return;
        }
    };

    debug!("connected to target");
    splice_halves(client.into_split(), upstream.into_split(), port, stats).await;
}

/// Runs both copy directions of a session over already split streams and
/// keeps the session counted as active until both have finished.
async fn splice_halves<CR, CW, UR, UW>(
    (client_rx, client_tx): (CR, CW),
    (upstream_rx, upstream_tx): (UR, UW),
    port: &str,
    stats: &StatsTable,
) where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    UR: AsyncRead + Unpin,
    UW: AsyncWrite + Unpin,
{
    stats.record_connection_start(port);

    let forward = async {
        let n = pump(client_rx, upstream_tx, Direction::ClientToTarget).await;
        stats.record_bytes(port, n);
        n
    };

    let backward = async {
        let n = pump(upstream_rx, client_tx, Direction::TargetToClient).await;
        stats.record_bytes(port, n);
        n
    };

    let (sent, received) = tokio::join!(forward, backward);

    stats.record_connection_end(port);
    info!("disconnected ({sent} bytes sent, {received} bytes received)");
}

/// Copies `from` into `to` until end of stream, then shuts `to` down so the
/// far side sees the half close.
///
/// Returns the number of bytes written even if the copy stopped on an error.
async fn pump<R, W>(mut from: R, mut to: W, direction: Direction) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    let r: io::Result<()> = async {
        loop {
            let n = from.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            // Count partial writes too, so a failed copy reports what got through.
            let mut written = 0;
            while written < n {
                let m = to.write(&buf[written..n]).await?;
                if m == 0 {
                    return Err(io::ErrorKind::WriteZero.into());
                }
                written += m;
                total += m as u64;
            }
        }

        to.shutdown().await
    }
    .await;

    match r {
        Ok(()) => trace!("{direction}: end of stream after {total} bytes"),
        Err(e) => warn!("{direction}: copy failed after {total} bytes: {}", display!(e)),
    }

    total
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{duplex, split};
    use tokio::time::{sleep, timeout};

    use super::*;

    /// Accepts `left` bytes, then fails every write like a reset socket.
    struct FailAfter {
        left: usize,
    }

    impl AsyncWrite for FailAfter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.left == 0 {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }

            let n = buf.len().min(self.left);
            self.left -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn pump_copies_everything_and_closes_writer() {
        let (mut src_tx, src_rx) = duplex(64);
        let (dst_tx, mut dst_rx) = duplex(1 << 20);

        let payload: Vec<u8> = (0..100_000u32).map(|x| (x % 251) as u8).collect();
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            src_tx.write_all(&payload).await.unwrap();
        });

        let n = pump(src_rx, dst_tx, Direction::ClientToTarget).await;
        writer.await.unwrap();

        let mut out = Vec::new();
        dst_rx.read_to_end(&mut out).await.unwrap();

        assert_eq!(n, expected.len() as u64);
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn pump_reports_partial_count_on_write_error() {
        let (mut src_tx, src_rx) = duplex(64);
        let (dst_tx, dst_rx) = duplex(64);
        drop(dst_rx);

        src_tx.write_all(b"hello").await.unwrap();
        drop(src_tx);

        let n = pump(src_rx, dst_tx, Direction::TargetToClient).await;
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn pump_counts_bytes_accepted_before_failure() {
        let (mut src_tx, src_rx) = duplex(64);

        src_tx.write_all(b"hello world").await.unwrap();
        drop(src_tx);

        let n = pump(src_rx, FailAfter { left: 5 }, Direction::ClientToTarget).await;
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn failed_direction_does_not_cut_the_other() {
        let stats = Arc::new(StatsTable::default());
        stats.register("8080", "web", "localhost:8080", "example.com:8080");

        let (mut client, client_side) = duplex(1 << 20);
        let (mut target, target_side) = duplex(1 << 20);

        // The target stops taking writes after 5 bytes but keeps sending.
        let session = {
            let stats = Arc::clone(&stats);
            tokio::spawn(async move {
                splice_halves(
                    split(client_side),
                    (target_side, FailAfter { left: 5 }),
                    "8080",
                    &stats,
                )
                .await;
            })
        };

        client.write_all(b"hello world").await.unwrap();

        // The failed direction has reported; the session is still open.
        timeout(Duration::from_secs(5), async {
            while stats.snapshot()["8080"].bytes_transferred != 5 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot["8080"].active_connections, 1);
        assert_eq!(snapshot["8080"].total_connections, 1);

        let payload: Vec<u8> = (0..200_000u32).map(|x| (x % 251) as u8).collect();
        target.write_all(&payload).await.unwrap();
        drop(target);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);

        session.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot["8080"].active_connections, 0);
        assert_eq!(snapshot["8080"].total_connections, 1);
        assert_eq!(snapshot["8080"].bytes_transferred, 5 + payload.len() as u64);
    }
}
