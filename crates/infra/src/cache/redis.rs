//! Redis-backed cache (`SET EX`, `GET`, `SCAN MATCH` + `DEL`).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{Cache, CacheError};

const SCAN_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct RedisCache {
    client: Arc<redis::Client>,
}

impl RedisCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn connection(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection()
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

/// Escape glob metacharacters so a key prefix matches literally.
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

impl Cache for RedisCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| CacheError::Command(format!("GET failed: {e}")))?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| CacheError::Serialization(e.to_string())))
            .transpose()
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut conn = self.connection()?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query(&mut conn)
            .map_err(|e| CacheError::Command(format!("SET failed: {e}")))?;
        Ok(())
    }

    fn invalidate_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection()?;
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut conn)
                .map_err(|e| CacheError::Command(format!("SCAN failed: {e}")))?;
            if !keys.is_empty() {
                let n: usize = redis::cmd("DEL")
                    .arg(&keys[..])
                    .query(&mut conn)
                    .map_err(|e| CacheError::Command(format!("DEL failed: {e}")))?;
                removed += n;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_match_literally() {
        assert_eq!(glob_escape("store:1:recs:s:a*b:"), "store:1:recs:s:a\\*b:*");
    }
}
