pub mod appresult;
pub mod config;
pub mod db;
pub mod rooms;

use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderValue, Router};
use serde_json::Value;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use crate::appresult::{AppError, AppResult};
use crate::{config::Config, rooms::{Broadcaster, Gateway, MessageStore, RoomRegistry}};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub registry: RoomRegistry,
    pub gateway: Gateway,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        Self {
            registry: RoomRegistry::new(db_pool.clone()),
            gateway: Gateway::new(MessageStore::new(db_pool), Broadcaster::new()),
            config: Arc::new(config),
        }
    }
}

pub fn app(app_state: AppState) -> anyhow::Result<Router> {
    let cors = match &app_state.config.cors_allow_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        None => CorsLayer::permissive(),
    };

    Ok(Router::new()
        .merge(rooms::router())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| AppError::validation(format!("expected {field}")))?
            .as_str()
            .ok_or_else(|| AppError::validation(format!("expected {field} to be a string")))?
            .to_owned()
        )
    }
}
