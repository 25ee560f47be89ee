use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::pagination::{Page, Paginator};
use crate::routes::listing::PostCard;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Cached index pages keyed by the requested page number.
pub type IndexCache = TtlCache<u64, Page<PostCard>>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub index_cache: Arc<Mutex<IndexCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let index_cache = TtlCache::new(
            config.cache.index_ttl(),
            config.cache.index_max_entries,
        );
        Self {
            db,
            config,
            index_cache: Arc::new(Mutex::new(index_cache)),
        }
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.config.listing.posts_per_page)
    }
}
