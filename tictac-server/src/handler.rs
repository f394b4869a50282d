//! Per-connection handler
//!
//! Each accepted socket gets a reader task (this module's `handle_connection`)
//! and a writer task draining the connection's outbound queue. Sessions push
//! into that queue without waiting, so a slow or dead peer never blocks a
//! critical section. A peer whose queue fills up is disconnected.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};

use crate::error::{ProtocolError, RequestError, RuleViolation};
use crate::protocol::{Command, ErrorCode, ServerMessage, MAX_LINE_BYTES};
use crate::registry::{lock_session, Registry, SeatAssignment};
use crate::session::{ConnectionId, SeatHandle, OUTBOUND_QUEUE_CAPACITY};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Why a connection's read loop stopped
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    ReadFailed(std::io::Error),
    WriteFailed,
    /// The peer stopped reading and its outbound queue filled up
    Backlogged,
    /// The request line exceeded `MAX_LINE_BYTES`
    Oversized,
    Internal,
}

/// Serve one client until it disconnects
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, registry: Arc<Registry>) {
    let conn_id = next_connection_id();
    tracing::info!("New connection #{} from {}", conn_id, peer);

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let overflow = Arc::new(Notify::new());
    let outbox = SeatHandle::new(conn_id, tx, Arc::clone(&overflow));
    let mut writer = tokio::spawn(write_loop(conn_id, write_half, rx));

    let seat = match registry.join(outbox.clone()) {
        Ok(seat) => seat,
        Err(e) => {
            tracing::error!("Connection #{}: could not join a session: {}", conn_id, e);
            outbox.send(ServerMessage::error_with_detail(
                ErrorCode::ServerError,
                e.to_string(),
            ));
            drop(outbox);
            let _ = writer.await;
            return;
        }
    };

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(MAX_LINE_BYTES);
    let mut writer_done = false;

    let reason = loop {
        tokio::select! {
            read = read_line_capped(&mut reader, &mut buf) => match read {
                Ok(0) => break CloseReason::PeerClosed,
                Ok(_) => {
                    if let Err(e) = handle_request(&registry, &seat, &outbox, &buf) {
                        if let Some(reason) = report(&seat, &outbox, &buf, e) {
                            break reason;
                        }
                    }
                    buf.clear();
                }
                Err(e) => break CloseReason::ReadFailed(e),
            },
            _ = overflow.notified() => break CloseReason::Backlogged,
            _ = &mut writer => {
                writer_done = true;
                break CloseReason::WriteFailed;
            }
        }
    };

    match &reason {
        CloseReason::PeerClosed => tracing::info!("Connection #{} closed by peer", conn_id),
        other => tracing::warn!("Connection #{} closing: {:?}", conn_id, other),
    }

    if let Err(e) = registry.leave(&seat) {
        tracing::error!("Connection #{}: failed to release seat: {}", conn_id, e);
    }

    // The seat's copy of the sender is gone; dropping ours lets the writer
    // flush what is queued and stop. A backlogged peer is not read from,
    // so its writer could block forever.
    drop(outbox);
    if matches!(reason, CloseReason::Backlogged) {
        writer.abort();
    } else if !writer_done {
        let _ = writer.await;
    }
}

/// Read one request line into `buf`, stopping after `MAX_LINE_BYTES + 1`
/// bytes so an endless line cannot grow the buffer. Returns 0 at EOF.
///
/// Bytes already in `buf` count against the cap, so a read interrupted by
/// `select!` resumes where it left off.
async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let budget = (MAX_LINE_BYTES + 1).saturating_sub(buf.len()) as u64;
    reader.take(budget).read_until(b'\n', buf).await?;
    Ok(buf.len())
}

/// Parse and execute one request line
fn handle_request(
    registry: &Registry,
    seat: &SeatAssignment,
    outbox: &SeatHandle,
    raw: &[u8],
) -> Result<(), RequestError> {
    let command = Command::parse_bytes(raw)?;
    let shared = registry.get_session(seat.session_id)?;
    let mut session = lock_session(&shared)?;

    match command {
        Command::GetState => {
            // Only the requester asked
            outbox.send(ServerMessage::State(session.snapshot()));
        }
        Command::Move { row, col } => {
            session.apply_move(seat.player, row, col)?;
        }
    }

    Ok(())
}

/// Reply to a failed request. Returns why the connection must close, if it must.
fn report(
    seat: &SeatAssignment,
    outbox: &SeatHandle,
    raw: &[u8],
    error: RequestError,
) -> Option<CloseReason> {
    let line = String::from_utf8_lossy(&raw[..raw.len().min(MAX_LINE_BYTES)]);
    let (reply, close) = match &error {
        RequestError::Protocol(e) => {
            tracing::debug!("Connection #{}: malformed request {:?}: {}", seat.conn_id, line, e);
            // The rest of an oversized line cannot be told apart from the next request
            let close = matches!(e, ProtocolError::LineTooLong { .. }).then_some(CloseReason::Oversized);
            (
                ServerMessage::error_with_detail(ErrorCode::MalformedRequest, e.to_string()),
                close,
            )
        }
        RequestError::Rule(RuleViolation::NotYourTurn) => {
            tracing::debug!("Connection #{}: {:?} out of turn", seat.conn_id, line);
            (ServerMessage::error(ErrorCode::NotYourTurn), None)
        }
        RequestError::Rule(RuleViolation::InvalidMove(e)) => {
            tracing::debug!("Connection #{}: {:?} rejected: {}", seat.conn_id, line, e);
            (ServerMessage::error(ErrorCode::InvalidMove), None)
        }
        RequestError::Session(e) => {
            tracing::error!(
                "Connection #{} (session {}, seat {}): {}",
                seat.conn_id,
                seat.session_id,
                seat.player,
                e
            );
            (
                ServerMessage::error_with_detail(ErrorCode::ServerError, e.to_string()),
                Some(CloseReason::Internal),
            )
        }
    };

    outbox.send(reply);
    close
}

/// Drain the outbound queue onto the socket, one line per message
async fn write_loop(
    conn_id: ConnectionId,
    mut stream: OwnedWriteHalf,
    mut rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let mut line = msg.encode();
        line.push('\n');
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            tracing::debug!("Connection #{}: write failed: {}", conn_id, e);
            return;
        }
    }
    let _ = stream.shutdown().await;
}
