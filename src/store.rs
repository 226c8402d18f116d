use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use deadpool_postgres::{Config as PgConfig, Pool, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use crate::types::{Site, SiteFilters};

pub type PgPool = Pool;

/// Build a pool without touching the database; connections open lazily.
pub fn new_pool(pg_url: &str) -> Result<PgPool> {
    let mut cfg = PgConfig::new();
    cfg.url = Some(pg_url.to_string());

    Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
}

/// Pool plus schema bootstrap, run once on boot.
pub async fn init_pool(pg_url: &str) -> Result<PgPool> {
    let pool = new_pool(pg_url)?;
    ensure_table(&pool).await?;
    Ok(pool)
}

async fn ensure_table(pool: &PgPool) -> Result<()> {
    // Safe to run on every boot
    const SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS sites (
      url                      varchar(2000) PRIMARY KEY,
      contains_profanity       boolean NOT NULL,
      last_check_time          timestamptz NOT NULL,
      last_status_update_time  timestamptz NOT NULL
    );
    "#;

    let conn = pool.get().await?;
    conn.batch_execute(SQL).await?;
    Ok(())
}

/// Record the outcome of one check. `last_check_time` always advances; the
/// verdict and `last_status_update_time` are written only when the verdict
/// actually changed, so each statement touches exactly the fields that moved.
pub async fn upsert_check_result(pool: &PgPool, url: &str, flagged: bool) -> Result<Site> {
    let conn = pool.get().await?;
    let now = Utc::now();
    let existing = conn
        .query_opt(
            "SELECT contains_profanity, last_status_update_time FROM sites WHERE url = $1",
            &[&url],
        )
        .await
        .context("failed to load site")?;

    let site = match existing {
        None => {
            conn.execute(
                "INSERT INTO sites (url, contains_profanity, last_check_time, last_status_update_time) \
                 VALUES ($1, $2, $3, $3)",
                &[&url, &flagged, &now],
            )
            .await
            .context("failed to insert site")?;
            Site {
                url: url.to_string(),
                contains_profanity: flagged,
                last_check_time: now,
                last_status_update_time: now,
            }
        }
        Some(row) => {
            let previous: bool = row.get(0);
            if previous != flagged {
                conn.execute(
                    "UPDATE sites SET contains_profanity = $2, last_check_time = $3, \
                     last_status_update_time = $3 WHERE url = $1",
                    &[&url, &flagged, &now],
                )
                .await
                .context("failed to update site verdict")?;
                Site {
                    url: url.to_string(),
                    contains_profanity: flagged,
                    last_check_time: now,
                    last_status_update_time: now,
                }
            } else {
                conn.execute(
                    "UPDATE sites SET last_check_time = $2 WHERE url = $1",
                    &[&url, &now],
                )
                .await
                .context("failed to update site check time")?;
                Site {
                    url: url.to_string(),
                    contains_profanity: flagged,
                    last_check_time: now,
                    last_status_update_time: row.get(1),
                }
            }
        }
    };
    Ok(site)
}

pub async fn get_site(pool: &PgPool, url: &str) -> Result<Option<Site>> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "SELECT url, contains_profanity, last_check_time, last_status_update_time \
             FROM sites WHERE url = $1",
            &[&url],
        )
        .await
        .context("failed to load site")?;
    Ok(row.map(site_from_row))
}

pub async fn list_sites(pool: &PgPool, filters: &SiteFilters) -> Result<Vec<Site>> {
    let conn = pool.get().await?;
    let mut sql = String::from(
        "SELECT url, contains_profanity, last_check_time, last_status_update_time FROM sites",
    );
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    if let Some(flagged) = &filters.contains_profanity {
        params.push(flagged);
        clauses.push(format!("contains_profanity = ${}", params.len()));
    }
    if let Some(after) = &filters.last_check_after {
        params.push(after);
        clauses.push(format!("last_check_time > ${}", params.len()));
    }
    if let Some(after) = &filters.last_status_update_after {
        params.push(after);
        clauses.push(format!("last_status_update_time > ${}", params.len()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY url");

    let rows = conn
        .query(sql.as_str(), &params)
        .await
        .context("failed to list sites")?;
    Ok(rows.into_iter().map(site_from_row).collect())
}

fn site_from_row(row: tokio_postgres::Row) -> Site {
    Site {
        url: row.get(0),
        contains_profanity: row.get(1),
        last_check_time: row.get(2),
        last_status_update_time: row.get(3),
    }
}

/// Best-effort cache of listing results for filterless and verdict-only
/// queries. Never consulted when a timestamp filter is present.
#[derive(Default)]
pub struct ListingCache {
    entries: Mutex<HashMap<Option<bool>, Vec<Site>>>,
}

impl ListingCache {
    pub fn get(&self, key: Option<bool>) -> Option<Vec<Site>> {
        self.entries.lock().unwrap().get(&key).cloned()
    }

    pub fn put(&self, key: Option<bool>, sites: Vec<Site>) {
        self.entries.lock().unwrap().insert(key, sites);
    }

    /// Drop the entries a persisted check result makes stale: the
    /// unfiltered listing and the listing for that verdict.
    pub fn invalidate(&self, flagged: bool) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&None);
        entries.remove(&Some(flagged));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn site(url: &str, flagged: bool) -> Site {
        let now = Utc::now();
        Site {
            url: url.to_string(),
            contains_profanity: flagged,
            last_check_time: now,
            last_status_update_time: now,
        }
    }

    #[test]
    fn cache_round_trips_by_filter_key() {
        let cache = ListingCache::default();
        assert!(cache.get(None).is_none());

        cache.put(None, vec![site("https://a.example", true)]);
        cache.put(Some(true), vec![site("https://a.example", true)]);
        assert_eq!(cache.get(None).unwrap().len(), 1);
        assert_eq!(cache.get(Some(true)).unwrap().len(), 1);
    }

    #[test]
    fn invalidate_drops_the_unfiltered_and_matching_entries() {
        let cache = ListingCache::default();
        cache.put(None, vec![site("https://a.example", true)]);
        cache.put(Some(true), vec![site("https://a.example", true)]);
        cache.put(Some(false), vec![site("https://b.example", false)]);

        cache.invalidate(true);
        assert!(cache.get(None).is_none());
        assert!(cache.get(Some(true)).is_none());
        assert!(cache.get(Some(false)).is_some());
    }
}
