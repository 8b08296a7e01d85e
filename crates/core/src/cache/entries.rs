//! Entry operations within a single store.
//!
//! Provides put/match/delete/keys for cached request-response pairs.

use std::collections::BTreeMap;

use super::connection::CacheStorage;
use super::hash::compute_cache_key;
use crate::http::Headers;
use crate::{Error, Request, Response, ResponseType};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Request headers a stored response varied on, by lowercased name.
type VaryMap = BTreeMap<String, Option<String>>;

/// A handle to one named store.
///
/// Handles are cheap to clone and stay valid after the store is deleted;
/// writes through a handle to a deleted store fail with `CACHE_MISS`.
#[derive(Clone, Debug)]
pub struct Store {
    storage: CacheStorage,
    name: String,
}

/// Listing view of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryInfo {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_type: String,
    pub stored_at: String,
}

/// A response ready to be written, with everything the closure needs owned.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    vary_json: Option<String>,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: &'static str,
    response_url: String,
}

impl EntryRow {
    /// Apply the put rules and serialize.
    fn prepare(request: &Request, response: &Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::RejectedPut(format!("{} {} is not a GET request", request.method, request.url)));
        }
        if response.status == 206 {
            return Err(Error::RejectedPut(format!("partial response for {}", request.url)));
        }

        let vary = response.vary();
        if vary.iter().any(|h| h == "*") {
            return Err(Error::RejectedPut(format!("response for {} varies on *", request.url)));
        }
        let vary_json = if vary.is_empty() {
            None
        } else {
            let map: VaryMap = vary
                .into_iter()
                .map(|name| {
                    let value = request.header(&name).map(str::to_string);
                    (name, value)
                })
                .collect();
            Some(serde_json::to_string(&map).map_err(|e| Error::CorruptEntry(e.to_string()))?)
        };

        let url = request.cache_url();
        Ok(Self {
            key_hash: compute_cache_key(&request.method, &url),
            method: request.method.clone(),
            url,
            vary_json,
            status: response.status,
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?,
            body: response.body.to_vec(),
            response_type: response.response_type.as_str(),
            response_url: response.url.clone(),
        })
    }
}

fn ensure_store(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    if exists { Ok(()) } else { Err(Error::CacheMiss(format!("store {name} was deleted"))) }
}

fn insert_row(conn: &rusqlite::Connection, store: &str, row: &EntryRow) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_entries (
            store_name, key_hash, method, url, vary_json, status, status_text,
            headers_json, body, response_type, response_url, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(store_name, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            vary_json = excluded.vary_json,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_type = excluded.response_type,
            response_url = excluded.response_url,
            stored_at = excluded.stored_at",
        params![
            store,
            &row.key_hash,
            &row.method,
            &row.url,
            &row.vary_json,
            row.status,
            &row.status_text,
            &row.headers_json,
            &row.body,
            row.response_type,
            &row.response_url,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Whether the request carries the same values the stored response varied on.
fn vary_matches(request: &Request, vary_json: Option<&str>) -> Result<bool, Error> {
    let Some(json) = vary_json else {
        return Ok(true);
    };
    let vary: VaryMap = serde_json::from_str(json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(vary
        .iter()
        .all(|(name, stored)| request.header(name) == stored.as_deref()))
}

impl Store {
    pub(crate) fn new(storage: CacheStorage, name: String) -> Self {
        Self { storage, name }
    }

    /// The store name (the version tag it belongs to).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response for the request, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// `RejectedPut` for non-GET requests, 206 responses and `Vary: *`;
    /// `CacheMiss` if the store has been deleted.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let row = EntryRow::prepare(request, response)?;
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                ensure_store(conn, &name)?;
                insert_row(conn, &name, &row)
            })
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction: either all land or none do.
    pub async fn put_all(&self, pairs: &[(Request, Response)]) -> Result<(), Error> {
        let rows = pairs
            .iter()
            .map(|(request, response)| EntryRow::prepare(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &name)?;
                for row in &rows {
                    insert_row(&tx, &name, row)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request.
    ///
    /// Only GET requests match. Returns None on a miss.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let key_hash = compute_cache_key(&request.method, &request.cache_url());
        let name = self.name.clone();
        let found = self
            .storage
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT vary_json, status, status_text, headers_json, body, response_type, response_url
                     FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key_hash], |row| {
                    Ok(StoredRow {
                        vary_json: row.get(0)?,
                        status: row.get(1)?,
                        status_text: row.get(2)?,
                        headers_json: row.get(3)?,
                        body: row.get(4)?,
                        response_type: row.get(5)?,
                        response_url: row.get(6)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some(row) = found else {
            return Ok(None);
        };
        if !vary_matches(request, row.vary_json.as_deref())? {
            tracing::debug!(store = %self.name, url = %request.url, "stored entry varies on different headers");
            return Ok(None);
        }
        row.into_response().map(Some)
    }

    /// Remove the entry for a request. Returns false if there was none.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let key_hash = compute_cache_key(&request.method, &request.cache_url());
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![name, key_hash],
                )?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Every entry in the store, in insertion order.
    pub async fn keys(&self) -> Result<Vec<EntryInfo>, Error> {
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<EntryInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, response_type, stored_at
                     FROM cache_entries WHERE store_name = ?1 ORDER BY rowid ASC",
                )?;
                let entries = stmt
                    .query_map(params![name], |row| {
                        Ok(EntryInfo {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get(2)?,
                            response_type: row.get(3)?,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        let name = self.name.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}

struct StoredRow {
    vary_json: Option<String>,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: String,
    response_url: String,
}

impl StoredRow {
    fn into_response(self) -> Result<Response, Error> {
        let headers: Headers =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let response_type: ResponseType = self.response_type.parse()?;
        Ok(Response {
            status: self.status,
            status_text: self.status_text,
            headers,
            body: self.body.into(),
            response_type,
            url: self.response_url,
        })
    }
}
