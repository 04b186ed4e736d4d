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

//! Listener lifecycle: bind, accept loop, and graceful/forced shutdown (§4.E).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::info;
use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tokio::select;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::ServerResult;
use crate::pool::Pool;
use crate::stats::Stats;

pub struct Server {
    listener: TcpListener,
    pool: Pool,
    queue_length: u32,
    port: u16,
    capacity: usize,
    start_time: Instant,
}

impl Server {
    /// Binds the listening socket honoring `bind_address`/`port`/`queue_length`, then
    /// truncates the catalog (I3: the directory starts from an empty catalog every run).
    pub async fn bind(config: &Config) -> ServerResult<Self> {
        let addr: SocketAddr = format!("{}:{}", config.general.bind_address, config.general.port).parse()?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(config.general.queue_length as i32)?;

        let listener = TcpListener::from_std(socket.into())?;
        let bound_addr = listener.local_addr()?;

        let catalog = Arc::new(Catalog::new());
        catalog.delete_all()?;

        let pool = Pool::new(
            catalog,
            config.general.capacity,
            &config.general.name,
            &config.general.authors,
            config.general.max_line_length,
        );

        info!(
            "{} listening on {} (queue_length: {}, capacity: {})",
            config.general.name, bound_addr, config.general.queue_length, config.general.capacity
        );

        Ok(Self {
            listener,
            pool,
            queue_length: config.general.queue_length,
            port: bound_addr.port(),
            capacity: config.general.capacity,
            start_time: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            start_time: self.start_time,
            port: self.port,
            queue_length: self.queue_length,
            live_peers: self.pool.live_peers(),
            capacity: self.capacity,
        }
    }

    /// Runs the accept loop until `shutdown` resolves, then drains live sessions.
    pub async fn serve(&self, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        tokio::pin!(shutdown);

        loop {
            select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.pool.admit(stream, addr).await,
                        Err(e) => log::warn!("accept failed: {}", e),
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received, draining live peers");
                    break;
                }
            }
        }

        self.pool.shutdown().await;
        info!("shutdown complete");

        Ok(())
    }
}
