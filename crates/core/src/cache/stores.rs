//! Store-level operations: open, list, delete.
//!
//! Store names are listed in creation order.

use super::connection::CacheStorage;
use super::entries::Store;
use crate::{Error, Request, Response};
use tokio_rusqlite::params;

impl CacheStorage {
    /// Open the store with the given name, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<Store, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("store name cannot be empty".into()));
        }

        let store_name = name.to_string();
        let created = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store_name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)?;

        if created {
            tracing::debug!(store = name, "created cache store");
        }

        Ok(Store::new(self.clone(), name.to_string()))
    }

    /// Handle to a store without creating it.
    ///
    /// Lookups through the handle miss if the store does not exist.
    pub fn store(&self, name: &str) -> Store {
        Store::new(self.clone(), name.to_string())
    }

    /// Whether a store with this name exists.
    pub async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store had that name.
    pub async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every store, oldest first.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Look the request up in every store, oldest first, returning the first hit.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        for name in self.keys().await? {
            let store = self.store(&name);
            if let Some(response) = store.match_request(request).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
