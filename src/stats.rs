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

//! A point-in-time snapshot of server state, for logging and future external reporting.

use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub start_time: Instant,
    pub port: u16,
    pub queue_length: u32,
    pub live_peers: usize,
    pub capacity: usize,
}

impl Stats {
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
