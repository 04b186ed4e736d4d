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

use serde::Deserialize;

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6600
}

fn default_queue_length() -> u32 {
    32
}

fn default_capacity() -> usize {
    64
}

fn default_name() -> String {
    "beacond".to_string()
}

fn default_authors() -> String {
    "Justin Hill, Gordon Keesler, and Matt Layher".to_string()
}

fn default_max_line_length() -> usize {
    512
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(rename(deserialize = "General"), default)]
    pub general: General,
}

#[derive(Deserialize, Debug, Clone)]
pub struct General {
    /// Address the listening socket binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port the directory listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection backlog handed to `listen(2)`.
    #[serde(default = "default_queue_length")]
    pub queue_length: u32,

    /// Maximum number of concurrently live peer sessions.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Name used in the log prefix and the banner line.
    #[serde(default = "default_name")]
    pub name: String,

    /// Authors line appended to the banner sent on connect.
    #[serde(default = "default_authors")]
    pub authors: String,

    /// Maximum accepted command line length, in bytes, before truncation.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for General {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            queue_length: default_queue_length(),
            capacity: default_capacity(),
            name: default_name(),
            authors: default_authors(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: General::default(),
        }
    }
}
