// beacond - A line-oriented directory/tracker service for a peer-to-peer file-sharing overlay
// Copyright (C) 2012  Justin Hill, Gordon Keesler, Matt Layher
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The per-peer protocol state machine (§4.C): handshake, command dispatch, teardown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::sink::SinkExt;
use log::{debug, error, info};
use tokio::net::TcpStream;
use tokio::select;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::protocol::{parse_await_connect, parse_ready, parse_size, ConnectCommand, ErrorCode, LineCodec, ReadyCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitConnect,
    Ready,
}

/// What to do once the current command has been handled.
enum Transition {
    Next(State),
    /// Close the session. `send_goodbye` is false for the silent I/O-error teardown path.
    Close { send_goodbye: bool },
}

type Conn = Framed<TcpStream, LineCodec>;

/// Runs one connection end to end: banner, `CONNECT`/`HELLO` handshake, the
/// ADD/DELETE/LIST/REQUEST/QUIT command loop, then teardown.
///
/// `cancel` is the pool-wide forced-shutdown signal; when it fires mid-session the
/// worker unwinds through the same teardown path a `QUIT` would, best-effort.
pub async fn run(
    stream: TcpStream,
    addr: SocketAddr,
    catalog: Arc<Catalog>,
    live_peers: Arc<AtomicUsize>,
    banner: String,
    cancel: CancellationToken,
    max_line_length: usize,
) {
    let peer = addr.to_string();
    let mut conn = Framed::new(stream, LineCodec::new(max_line_length));

    if conn.send(banner).await.is_err() {
        debug!("failed to send banner to {}", peer);
        teardown(&mut conn, &catalog, &live_peers, &peer, false).await;
        return;
    }

    let mut state = State::AwaitConnect;

    loop {
        let line = select! {
            _ = cancel.cancelled() => {
                debug!("session for {} cancelled by shutdown", peer);
                teardown(&mut conn, &catalog, &live_peers, &peer, true).await;
                return;
            }
            line = conn.next() => line,
        };

        let raw = match line {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                debug!("read error from {}: {}", peer, e);
                teardown(&mut conn, &catalog, &live_peers, &peer, false).await;
                return;
            }
            None => {
                // Zero-byte read: peer closed the connection without QUIT. Synthesized
                // as QUIT, so GOODBYE is still attempted (best-effort).
                teardown(&mut conn, &catalog, &live_peers, &peer, true).await;
                return;
            }
        };

        let transition = match state {
            State::AwaitConnect => handle_await_connect(&mut conn, &raw).await,
            State::Ready => handle_ready(&mut conn, &raw, &catalog, &peer).await,
        };

        match transition {
            Transition::Next(next) => state = next,
            Transition::Close { send_goodbye } => {
                teardown(&mut conn, &catalog, &live_peers, &peer, send_goodbye).await;
                return;
            }
        }
    }
}

async fn handle_await_connect(conn: &mut Conn, line: &str) -> Transition {
    match parse_await_connect(line) {
        ConnectCommand::Connect => {
            let _ = conn.send("HELLO".to_string()).await;
            Transition::Next(State::Ready)
        }
        ConnectCommand::Quit => Transition::Close { send_goodbye: true },
        ConnectCommand::Noise => Transition::Next(State::AwaitConnect),
    }
}

async fn handle_ready(conn: &mut Conn, line: &str, catalog: &Catalog, peer: &str) -> Transition {
    match parse_ready(line) {
        ReadyCommand::Quit => Transition::Close { send_goodbye: true },
        ReadyCommand::List => handle_list(conn, catalog).await,
        ReadyCommand::Request { file } => handle_request(conn, catalog, file).await,
        ReadyCommand::Add { file, hash, size } => handle_add(conn, catalog, peer, file, hash, size).await,
        ReadyCommand::Delete { file, hash } => handle_delete(conn, catalog, peer, file, hash).await,
        ReadyCommand::Unknown => {
            send_error(conn, ErrorCode::C0).await;
            Transition::Next(State::Ready)
        }
    }
}

async fn handle_add(
    conn: &mut Conn,
    catalog: &Catalog,
    peer: &str,
    file: Option<String>,
    hash: Option<String>,
    size: Option<String>,
) -> Transition {
    let file = match file {
        Some(f) => f,
        None => {
            send_error(conn, ErrorCode::A1).await;
            return Transition::Next(State::Ready);
        }
    };

    let hash = match hash {
        Some(h) => h,
        None => {
            send_error(conn, ErrorCode::A2).await;
            return Transition::Next(State::Ready);
        }
    };

    let size = match size.as_deref().and_then(parse_size) {
        Some(s) => s,
        None => {
            send_error(conn, ErrorCode::A3).await;
            return Transition::Next(State::Ready);
        }
    };

    match catalog.insert(file.clone(), hash.clone(), size, peer.to_string()) {
        Ok(()) => {
            info!("peer {} added {} [hash: {}] [size: {}]", peer, file, hash, size);
            send_ok(conn).await;
            Transition::Next(State::Ready)
        }
        Err(crate::error::CatalogError::Duplicate) => {
            send_error(conn, ErrorCode::A4).await;
            Transition::Next(State::Ready)
        }
        Err(e) => {
            error!("catalog insert failed for {}: {}", peer, e);
            send_error(conn, ErrorCode::A0).await;
            Transition::Close { send_goodbye: true }
        }
    }
}

async fn handle_delete(
    conn: &mut Conn,
    catalog: &Catalog,
    peer: &str,
    file: Option<String>,
    hash: Option<String>,
) -> Transition {
    let file = match file {
        Some(f) => f,
        None => {
            send_error(conn, ErrorCode::D1).await;
            return Transition::Next(State::Ready);
        }
    };

    let hash = match hash {
        Some(h) => h,
        None => {
            send_error(conn, ErrorCode::D2).await;
            return Transition::Next(State::Ready);
        }
    };

    match catalog.delete_one(&file, &hash, peer) {
        Ok(()) => {
            info!("peer {} removed {} [hash: {}]", peer, file, hash);
            send_ok(conn).await;
            Transition::Next(State::Ready)
        }
        Err(e) => {
            error!("catalog delete failed for {}: {}", peer, e);
            send_error(conn, ErrorCode::D0).await;
            Transition::Close { send_goodbye: true }
        }
    }
}

async fn handle_list(conn: &mut Conn, catalog: &Catalog) -> Transition {
    match catalog.list_files() {
        Ok(rows) => {
            for (file, size) in rows {
                if conn.send(format!("{} {}", file, size)).await.is_err() {
                    return Transition::Close { send_goodbye: false };
                }
            }
            send_ok(conn).await;
            Transition::Next(State::Ready)
        }
        Err(e) => {
            error!("catalog list failed: {}", e);
            send_error(conn, ErrorCode::L0).await;
            Transition::Close { send_goodbye: true }
        }
    }
}

async fn handle_request(conn: &mut Conn, catalog: &Catalog, file: Option<String>) -> Transition {
    let file = match file {
        Some(f) => f,
        None => {
            send_error(conn, ErrorCode::R1).await;
            return Transition::Next(State::Ready);
        }
    };

    match catalog.list_peers_for(&file) {
        Ok(rows) => {
            for (peer, size) in rows {
                if conn.send(format!("{} {}", peer, size)).await.is_err() {
                    return Transition::Close { send_goodbye: false };
                }
            }
            send_ok(conn).await;
            Transition::Next(State::Ready)
        }
        Err(e) => {
            error!("catalog request failed for {}: {}", file, e);
            send_error(conn, ErrorCode::R0).await;
            Transition::Close { send_goodbye: true }
        }
    }
}

async fn send_ok(conn: &mut Conn) {
    let _ = conn.send("OK".to_string()).await;
}

async fn send_error(conn: &mut Conn, code: ErrorCode) {
    let _ = conn.send(format!("ERROR {}", code)).await;
}

async fn teardown(
    conn: &mut Conn,
    catalog: &Catalog,
    live_peers: &AtomicUsize,
    peer: &str,
    send_goodbye: bool,
) {
    if send_goodbye {
        let _ = conn.send("GOODBYE".to_string()).await;
    }

    live_peers.fetch_sub(1, Ordering::SeqCst);

    if let Err(e) = catalog.delete_for_peer(peer) {
        error!("failed to clear catalog entries for {}: {}", peer, e);
    }
}
