use std::{convert::Infallible, str::FromStr, sync::Arc};

use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use stockdash_core::{AcquisitionOutcome, CacheEntrySummary};
use stockdash_market_data::MarketSelector;
use tokio_stream::wrappers::WatchStream;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const QUOTES_EVENT: &str = "quotes";

#[derive(Deserialize)]
struct MarketQuery {
    market: Option<String>,
}

impl MarketQuery {
    fn selector(&self) -> ApiResult<MarketSelector> {
        match self.market.as_deref() {
            None | Some("") => Ok(MarketSelector::default()),
            Some(raw) => {
                MarketSelector::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
            }
        }
    }
}

#[derive(Serialize)]
struct PopulateResponse {
    inserted: usize,
}

async fn get_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> ApiResult<Json<AcquisitionOutcome>> {
    let market = query.selector()?;
    Ok(Json(state.quote_service.get_quotes(market).await))
}

async fn refresh_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> ApiResult<Json<AcquisitionOutcome>> {
    let market = query.selector()?;
    tracing::info!("Forced refresh requested for {}", market);
    Ok(Json(state.quote_service.force_refresh(market).await))
}

async fn stream_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let market = query.selector()?;
    let subscription = state.subscriptions.subscribe(market);

    let stream = WatchStream::new(subscription.watch()).map(|view| {
        let event = SseEvent::default().event(QUOTES_EVENT);
        let event = match event.json_data(&view) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to serialize quotes view: {}", e);
                SseEvent::default().event(QUOTES_EVENT).data("null")
            }
        };
        Ok(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn cache_summary(State(state): State<Arc<AppState>>) -> Json<Vec<CacheEntrySummary>> {
    Json(state.cache.snapshot())
}

async fn populate_store(State(state): State<Arc<AppState>>) -> ApiResult<Json<PopulateResponse>> {
    let inserted = state.seeder.populate_if_empty().await?;
    Ok(Json(PopulateResponse { inserted }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stocks", get(get_stocks))
        .route("/stocks/refresh", post(refresh_stocks))
        .route("/stocks/stream", get(stream_stocks))
        .route("/stocks/cache", get(cache_summary))
        .route("/stocks/populate", post(populate_store))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(market: Option<&str>) -> MarketQuery {
        MarketQuery {
            market: market.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_market_means_all() {
        assert_eq!(query(None).selector().unwrap(), MarketSelector::All);
        assert_eq!(query(Some("")).selector().unwrap(), MarketSelector::All);
    }

    #[test]
    fn test_market_is_case_insensitive() {
        assert_eq!(query(Some("SAUDI")).selector().unwrap(), MarketSelector::Saudi);
    }

    #[test]
    fn test_unknown_market_is_bad_request() {
        assert!(matches!(
            query(Some("nasdaq")).selector(),
            Err(ApiError::BadRequest(_))
        ));
    }
}
