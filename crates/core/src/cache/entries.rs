//! Cache and entry CRUD operations on [`CacheDb`].

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use crate::http::{Headers, Response};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response together with its bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_name: String,
    pub request_key: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub final_url: Option<String>,
    pub stored_at: String,
}

impl CacheEntry {
    pub fn into_response(self) -> Response {
        let response = Response::new(self.status, self.body).with_headers(self.headers);
        match self.final_url {
            Some(url) => response.with_url(url),
            None => response,
        }
    }
}

impl CacheDb {
    /// Create the cache called `name` unless it already exists.
    pub async fn create_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![name, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a cache called `name` exists.
    pub async fn cache_exists(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM caches WHERE name = ?1", params![name], |row| row.get(0))?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every cache, in creation order.
    pub async fn list_caches(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and, through the foreign key cascade, all its entries.
    ///
    /// Returns whether the cache existed.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the entry for `request_key` in cache `cache_name`.
    ///
    /// Fails with `CacheMiss` if the cache has been deleted in the meantime.
    pub async fn upsert_entry(&self, cache_name: &str, request_key: &str, response: &Response) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let request_key = request_key.to_string();
        let key_hash = compute_cache_key(&request_key);
        let status = i64::from(response.status());
        let headers_json = serde_json::to_string(response.headers())?;
        let body = response.body().to_vec();
        let final_url = response.url().map(str::to_string);
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let count = conn.execute(
                    "INSERT INTO entries (
                    cache_id, key_hash, request_key, status, headers_json, body, final_url, stored_at
                ) SELECT id, ?2, ?3, ?4, ?5, ?6, ?7, ?8 FROM caches WHERE name = ?1
                ON CONFLICT(cache_id, key_hash) DO UPDATE SET
                    request_key = excluded.request_key,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    final_url = excluded.final_url,
                    stored_at = excluded.stored_at",
                    params![cache_name, key_hash, request_key, status, headers_json, body, final_url, stored_at],
                )?;

                if count == 0 {
                    return Err(Error::CacheMiss(format!("cache {cache_name} no longer exists")));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `request_key` in cache `cache_name`.
    pub async fn get_entry(&self, cache_name: &str, request_key: &str) -> Result<Option<CacheEntry>, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = compute_cache_key(request_key);
        self.conn
            .call(move |conn| -> Result<Option<(CacheEntry, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.request_key, e.status, e.headers_json, e.body, e.final_url, e.stored_at
                FROM entries e JOIN caches c ON c.id = e.cache_id
                WHERE c.name = ?1 AND e.key_hash = ?2",
                )?;

                let result = stmt.query_row(params![cache_name, key_hash], |row| {
                    Ok((
                        CacheEntry {
                            cache_name: cache_name.clone(),
                            request_key: row.get(0)?,
                            status: row.get::<_, i64>(1)? as u16,
                            headers: Headers::new(),
                            body: row.get(3)?,
                            final_url: row.get(4)?,
                            stored_at: row.get(5)?,
                        },
                        row.get::<_, String>(2)?,
                    ))
                });

                match result {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?
            .map(|(mut entry, headers_json)| -> Result<CacheEntry, Error> {
                entry.headers = serde_json::from_str(&headers_json)?;
                Ok(entry)
            })
            .transpose()
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete_entry(&self, cache_name: &str, request_key: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = compute_cache_key(request_key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE key_hash = ?2
                     AND cache_id = (SELECT id FROM caches WHERE name = ?1)",
                    params![cache_name, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Request keys stored in a cache, oldest write first.
    pub async fn list_entry_keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.request_key FROM entries e JOIN caches c ON c.id = e.cache_id
                     WHERE c.name = ?1 ORDER BY e.stored_at, e.rowid",
                )?;
                let keys = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
