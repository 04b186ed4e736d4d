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

//! Admission and lifecycle management for peer sessions (§4.D).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::catalog::Catalog;
use crate::session;

/// Tracks live sessions and admits new connections onto tracked tasks.
///
/// Capacity is advisory: a session over the soft limit is still admitted, but the
/// thresholds in §4.D are logged as the live count crosses 80%, then 100%, of
/// `capacity`, and a peer admitted past 100% is told to wait before the normal
/// banner/handshake flow proceeds.
pub struct Pool {
    catalog: Arc<Catalog>,
    live_peers: Arc<AtomicUsize>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    capacity: usize,
    server_name: String,
    banner: String,
    max_line_length: usize,
}

impl Pool {
    pub fn new(
        catalog: Arc<Catalog>,
        capacity: usize,
        server_name: &str,
        authors: &str,
        max_line_length: usize,
    ) -> Self {
        Self {
            catalog,
            live_peers: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            capacity,
            server_name: server_name.to_string(),
            banner: format!("{} {}", server_name, authors),
            max_line_length,
        }
    }

    pub fn live_peers(&self) -> usize {
        self.live_peers.load(Ordering::SeqCst)
    }

    /// Admits `stream` onto a tracked task running the session state machine.
    ///
    /// Thresholds are computed against `live_peers` after the increment, per §4.D:
    /// below 80% of capacity logs at info, [80%, 100%) and 100% both warn, and over
    /// 100% logs an error and writes a courtesy "please wait" line directly to the
    /// new peer's socket before the session still proceeds normally.
    pub async fn admit(&self, mut stream: TcpStream, addr: SocketAddr) {
        let live = self.live_peers.fetch_add(1, Ordering::SeqCst) + 1;

        if self.capacity == 0 || live * 5 < self.capacity * 4 {
            info!("peer {} admitted ({}/{})", addr, live, self.capacity);
        } else if live < self.capacity {
            warn!("thread pool nearing exhaustion ({}/{})", live, self.capacity);
        } else if live == self.capacity {
            warn!("thread pool exhausted ({}/{})", live, self.capacity);
        } else {
            error!("thread pool over-exhausted ({}/{})", live, self.capacity);

            let courtesy = format!(
                "{}: >> server has currently reached maximum user capacity, please wait\n",
                self.server_name
            );
            if let Err(e) = stream.write_all(courtesy.as_bytes()).await {
                log::debug!("failed to send over-capacity courtesy line to {}: {}", addr, e);
            }
        }

        let catalog = self.catalog.clone();
        let live_peers = self.live_peers.clone();
        let banner = self.banner.clone();
        let cancel = self.cancel.clone();
        let max_line_length = self.max_line_length;

        self.tracker.spawn(async move {
            session::run(stream, addr, catalog, live_peers, banner, cancel, max_line_length).await;
        });
    }

    /// Stops admitting new sessions and tears down live ones, per §4.D's two teardown
    /// modes: graceful when `live_peers == 0` (just join the (empty) tracker), forced
    /// otherwise (cancel immediately; every live session unwinds through its
    /// best-effort teardown path, same as the original's unconditional
    /// `pthread_cancel`/`thpool_destroy(.., force)` on any live client).
    pub async fn shutdown(&self) {
        self.tracker.close();

        if self.live_peers() == 0 {
            info!("shutting down with no live peers");
        } else {
            warn!("{} peer(s) still live, forcing shutdown", self.live_peers());
            self.cancel.cancel();
        }

        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_arithmetic_matches_eighty_percent() {
        let capacity = 64usize;
        assert!(51 * 5 >= capacity * 4);
        assert!(50 * 5 < capacity * 4);
    }

    #[test]
    fn threshold_boundaries_match_spec_table() {
        let capacity = 10usize;

        // < 80%: 7/10
        assert!(7 * 5 < capacity * 4);
        // [80%, 100%): 8/10 and 9/10
        assert!(8 * 5 >= capacity * 4 && 8 < capacity);
        assert!(9 * 5 >= capacity * 4 && 9 < capacity);
        // == 100%
        assert_eq!(10, capacity);
        // > 100%
        assert!(11 > capacity);
    }
}
