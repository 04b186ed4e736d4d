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

use thiserror::Error;

/// Errors surfaced by the in-memory catalog store.
///
/// `Internal` is the only variant the wire protocol maps to a fatal, session-closing
/// reply (A0/D0/L0/R0); `Duplicate` is a recoverable validation-style failure (A4).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate announcement for this (file, hash, peer)")]
    Duplicate,

    #[error("catalog internal error: {0}")]
    Internal(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Fatal startup/bind errors for the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
