use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use crate::config::{API_PREFIX, Config};
use crate::db::Storage;
use crate::handlers::{auth, health, stocks, upload, watchlists};
use crate::market::{MarketData, TtlCache};
use crate::security::TokenIssuer;
use crate::service::StockLookup;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub tokens: TokenIssuer,
    pub market: Arc<dyn MarketData>,
    pub cache: TtlCache,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(storage: Storage, market: Arc<dyn MarketData>, config: Config) -> Self {
        Self {
            storage,
            tokens: TokenIssuer::new(&config.auth),
            market,
            cache: TtlCache::new(),
            config: Arc::new(config),
        }
    }

    pub fn stocks(&self) -> StockLookup<'_> {
        StockLookup {
            market: self.market.as_ref(),
            cache: &self.cache,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let upload_limit = state.config.upload.max_upload_size;

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/password", put(auth::change_password));

    let watchlist_routes = Router::new()
        .route("/", get(watchlists::list).post(watchlists::create))
        .route("/from-index", post(watchlists::create_from_index))
        .route(
            "/{id}",
            get(watchlists::get_one)
                .put(watchlists::update)
                .delete(watchlists::remove),
        )
        .route("/{id}/stocks", post(watchlists::add_stock))
        .route("/{id}/stocks/{symbol}", delete(watchlists::remove_stock));

    let upload_routes = Router::new()
        .route("/excel", post(upload::create_from_file))
        .route("/excel/append/{id}", post(upload::append_from_file))
        .layer(DefaultBodyLimit::max(upload_limit));

    let stock_routes = Router::new()
        .route("/search", get(stocks::search))
        .route("/{symbol}/info", get(stocks::info))
        .route("/{symbol}/historical", get(stocks::historical))
        .route("/{symbol}/validate", get(stocks::validate));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/watchlists", watchlist_routes)
        .nest("/upload", upload_routes)
        .nest("/stocks", stock_routes);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest(API_PREFIX, api)
        .with_state(state)
}
