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

//! The shared catalog of announced files.
//!
//! Keyed by (file, hash, peer), with a secondary index on `file` so `LIST` and `REQUEST`
//! don't need a full scan. A single mutex around both structures is sufficient: every
//! operation here is synchronous and none of them is held across an `.await` point.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{CatalogError, CatalogResult};

type Key = (String, String, String);

#[derive(Default)]
struct Inner {
    /// (file, hash, peer) -> size
    rows: HashMap<Key, u64>,

    /// file -> set of (hash, peer) pairs announced for it
    by_file: BTreeMap<String, HashSet<(String, String)>>,
}

pub struct Catalog {
    inner: Mutex<Inner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> CatalogResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CatalogError::Internal("catalog mutex poisoned".to_string()))
    }

    /// Enforces I1: a duplicate (file, hash, peer) triple is rejected.
    pub fn insert(&self, file: String, hash: String, size: u64, peer: String) -> CatalogResult<()> {
        let mut inner = self.lock()?;

        let key = (file.clone(), hash.clone(), peer.clone());

        if inner.rows.contains_key(&key) {
            return Err(CatalogError::Duplicate);
        }

        inner.rows.insert(key, size);
        inner
            .by_file
            .entry(file)
            .or_insert_with(HashSet::new)
            .insert((hash, peer));

        Ok(())
    }

    /// Removes the at-most-one row matching all three fields. A missing row is not an
    /// error; this mirrors the original source's unconditional `DELETE ... WHERE` query.
    pub fn delete_one(&self, file: &str, hash: &str, peer: &str) -> CatalogResult<()> {
        let mut inner = self.lock()?;

        let key = (file.to_string(), hash.to_string(), peer.to_string());

        if inner.rows.remove(&key).is_some() {
            remove_from_index(&mut inner.by_file, file, hash, peer);
        }

        Ok(())
    }

    /// Removes every row belonging to `peer`. Used at session teardown (I2).
    pub fn delete_for_peer(&self, peer: &str) -> CatalogResult<()> {
        let mut inner = self.lock()?;

        let doomed: Vec<Key> = inner
            .rows
            .keys()
            .filter(|(_, _, p)| p == peer)
            .cloned()
            .collect();

        for (file, hash, peer) in doomed {
            inner.rows.remove(&(file.clone(), hash.clone(), peer.clone()));
            remove_from_index(&mut inner.by_file, &file, &hash, &peer);
        }

        Ok(())
    }

    /// Removes every row regardless of peer. Used once at startup to realize I3.
    pub fn delete_all(&self) -> CatalogResult<()> {
        let mut inner = self.lock()?;

        inner.rows.clear();
        inner.by_file.clear();

        Ok(())
    }

    /// Every distinct file, sorted ascending, paired with the size of any one matching row.
    pub fn list_files(&self) -> CatalogResult<Vec<(String, u64)>> {
        let inner = self.lock()?;

        let mut out = Vec::with_capacity(inner.by_file.len());

        for (file, entries) in inner.by_file.iter() {
            let size = entries
                .iter()
                .next()
                .and_then(|(hash, peer)| {
                    inner.rows.get(&(file.clone(), hash.clone(), peer.clone()))
                })
                .copied()
                .unwrap_or(0);

            out.push((file.clone(), size));
        }

        Ok(out)
    }

    /// Every (peer, size) row announced for `file`, sorted ascending by peer.
    pub fn list_peers_for(&self, file: &str) -> CatalogResult<Vec<(String, u64)>> {
        let inner = self.lock()?;

        let mut out: Vec<(String, u64)> = match inner.by_file.get(file) {
            Some(entries) => entries
                .iter()
                .map(|(hash, peer)| {
                    let size = inner
                        .rows
                        .get(&(file.to_string(), hash.clone(), peer.clone()))
                        .copied()
                        .unwrap_or(0);
                    (peer.clone(), size)
                })
                .collect(),
            None => Vec::new(),
        };

        out.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(out)
    }
}

fn remove_from_index(
    by_file: &mut BTreeMap<String, HashSet<(String, String)>>,
    file: &str,
    hash: &str,
    peer: &str,
) {
    if let Some(entries) = by_file.get_mut(file) {
        entries.remove(&(hash.to_string(), peer.to_string()));

        if entries.is_empty() {
            by_file.remove(file);
        }
    }
}
