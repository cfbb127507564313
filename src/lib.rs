pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod services;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::{
    cache::CatalogCache, cart::CartService, catalog::CatalogService, order::OrderService,
    payment::PaymentGateway, report::ReportService,
};

/// Everything a handler can reach. Cloned into every router as an
/// `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let db = Arc::new(db);
        let cache = Arc::new(CatalogCache::new());
        let cart = Arc::new(CartService::new(db.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), cart.clone(), gateway, &config));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), cache)),
            reports: Arc::new(ReportService::new(db.clone())),
            cart,
            orders,
            config: Arc::new(config),
            db,
        }
    }
}

/// Opens the database. An in-memory SQLite database only exists per
/// connection, so the pool is pinned to a single one.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);
    Database::connect(options).await
}

pub fn app(state: AppState) -> Router {
    api::create_api_router(state)
        .layer(axum::middleware::from_fn(
            middleware::logging::logging_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
