use std::collections::HashMap;

use actix_web::{get, web, HttpResponse, Responder};
use tracing::info;
use url::Url;

use crate::error::{detail, CheckError};
use crate::oracle::OracleClient;
use crate::params;
use crate::scrape::{self, PageClient};
use crate::store::{self, ListingCache, PgPool};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(check)
        .service(site)
        .service(sites);
}

#[get("/health")]
async fn health() -> impl Responder {
    web::Json(serde_json::json!({ "status": "ok" }))
}

/* ------------------------ /v1/check ------------------------ */

/// Fetch the site, ask the oracle about its words, persist the verdict.
/// Validation short-circuits before any network call; persistence only
/// runs once a definitive verdict exists.
#[get("/v1/check")]
async fn check(
    query: web::Query<HashMap<String, String>>,
    pg: web::Data<PgPool>,
    pages: web::Data<PageClient>,
    oracle: web::Data<OracleClient>,
    cache: web::Data<ListingCache>,
) -> Result<HttpResponse, CheckError> {
    let url = params::site_url(&query)?;
    let target = Url::parse(&url).map_err(anyhow::Error::new)?;

    let html = pages.fetch(&target).await?;
    let words = scrape::unique_words(&String::from_utf8_lossy(&html));
    let flagged = oracle.contains_profanity(&words).await?;

    let row = store::upsert_check_result(&pg, &url, flagged).await?;
    cache.invalidate(flagged);
    info!(url = %row.url, flagged, "check complete");
    Ok(HttpResponse::Ok().json(flagged))
}

/* ------------------------ /v1/site ------------------------ */

/// Stored record for one URL.
#[get("/v1/site")]
async fn site(
    query: web::Query<HashMap<String, String>>,
    pg: web::Data<PgPool>,
) -> Result<HttpResponse, CheckError> {
    let url = params::site_url(&query)?;
    match store::get_site(&pg, &url).await? {
        Some(site) => Ok(HttpResponse::Ok().json(site)),
        None => Ok(HttpResponse::NotFound().json(detail(&["Not found.".to_string()]))),
    }
}

/* ------------------------ /v1/sites ------------------------ */

/// Stored records, optionally filtered. Listings without a timestamp
/// filter go through the cache under their verdict key.
#[get("/v1/sites")]
async fn sites(
    query: web::Query<HashMap<String, String>>,
    pg: web::Data<PgPool>,
    cache: web::Data<ListingCache>,
) -> Result<HttpResponse, CheckError> {
    let filters = params::site_filters(&query)?;
    if filters.last_check_after.is_none() && filters.last_status_update_after.is_none() {
        let key = filters.contains_profanity;
        if let Some(sites) = cache.get(key) {
            return Ok(HttpResponse::Ok().json(sites));
        }
        let sites = store::list_sites(&pg, &filters).await?;
        cache.put(key, sites.clone());
        return Ok(HttpResponse::Ok().json(sites));
    }
    let sites = store::list_sites(&pg, &filters).await?;
    Ok(HttpResponse::Ok().json(sites))
}
