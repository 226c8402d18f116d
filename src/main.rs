use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt; // <- needed for .try_init()
use tracing_subscriber::{fmt, EnvFilter};

use profanity_worker::oracle::{OracleClient, DEFAULT_ORACLE_BASE, ORACLE_TIMEOUT};
use profanity_worker::routes;
use profanity_worker::scrape::PageClient;
use profanity_worker::store::{init_pool, ListingCache};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Logging
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .finish()
        .try_init();

    // Config
    let addr = std::env::var("CHECKER_BIND").unwrap_or_else(|_| "127.0.0.1:8000".into());
    let pg_url = std::env::var("PG_URL").expect("PG_URL not set");
    let oracle_base =
        std::env::var("ORACLE_BASE_URL").unwrap_or_else(|_| DEFAULT_ORACLE_BASE.into());

    // Init subsystems
    let pool = init_pool(&pg_url).await.expect("pg pool init failed");
    info!("✅ connected to Postgres");

    let pages = PageClient::new();
    let oracle = OracleClient::new(&oracle_base, ORACLE_TIMEOUT);
    let cache = web::Data::new(ListingCache::default());

    info!("🌐 checker listening on {}", addr);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(pages.clone()))
            .app_data(web::Data::new(oracle.clone()))
            .app_data(cache.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(addr)?
    .workers(2)
    .run()
    .await
}
