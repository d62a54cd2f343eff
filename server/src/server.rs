use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::db;
use crate::fetcher::{self, FetchError};
use crate::readings::{self, StoreError};
use crate::scheduler::Scheduler;

pub async fn run(address: std::net::SocketAddr) {
    let scheduler = Scheduler::start();

    let (addr, server) = warp::serve(routes()).bind_with_graceful_shutdown(address, async {
        let _ = tokio::signal::ctrl_c().await;
    });

    log::info!("Listening on http://{}", addr);
    server.await;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    log::info!("Shut down.");
}

pub fn routes() -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    // Path filters come before method filters: a request for an unknown
    // path then rejects as not-found instead of method-not-allowed, which
    // warp would rank higher when combining rejections.
    let health_route = warp::path!("health").and(warp::get()).and_then(health);

    let fetch_route = warp::path!("weather" / "fetch")
        .and(warp::post())
        .and(warp::query::<FetchParams>())
        .and_then(fetch_now);

    let stats_route = warp::path!("weather" / "stats")
        .and(warp::get())
        .and_then(stats);

    let detail_route = warp::path!("weather" / i64)
        .and(warp::get())
        .and_then(detail);

    let list_route = warp::path!("weather")
        .and(warp::get())
        .and(warp::query::<ListParams>())
        .and_then(list);

    let reset_route = warp::path!("weather" / "reset")
        .and(warp::delete())
        .and_then(reset);

    health_route
        .or(fetch_route)
        .or(stats_route)
        .or(detail_route)
        .or(list_route)
        .or(reset_route)
        .recover(rejection)
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

async fn health() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({ "status": "ok" })))
}

/// One synchronous fetch+save cycle, returning the stored reading.
async fn fetch_now(params: FetchParams) -> Result<impl Reply, Rejection> {
    let weather = fetcher::fetch_current(params.lat, params.lon)
        .await
        .map_err(reject_fetch)?;

    let reading = db::with_connection(|conn| {
        readings::insert(
            conn,
            weather.temperature_c,
            weather.windspeed_kmh,
            weather.latitude,
            weather.longitude,
            None,
        )
    })
    .map_err(reject_store)?;

    Ok(warp::reply::json(&reading))
}

async fn list(params: ListParams) -> Result<impl Reply, Rejection> {
    // A negative limit would mean "unlimited" to SQLite.
    let limit = params.limit.unwrap_or(50).max(0);
    let rows = db::with_connection(|conn| readings::list_recent(conn, limit))
        .map_err(reject_store)?;
    Ok(warp::reply::json(&rows))
}

async fn stats() -> Result<impl Reply, Rejection> {
    let stats = db::with_connection(readings::stats).map_err(reject_store)?;
    Ok(warp::reply::json(&stats))
}

async fn detail(id: i64) -> Result<impl Reply, Rejection> {
    let reading =
        db::with_connection(|conn| readings::get_by_id(conn, id)).map_err(reject_store)?;
    Ok(warp::reply::json(&reading))
}

async fn reset() -> Result<impl Reply, Rejection> {
    let deleted = db::with_connection(readings::reset).map_err(reject_store)?;
    Ok(warp::reply::json(&serde_json::json!({
        "message": format!("Database reset successfully. Deleted {} records.", deleted),
        "deleted_count": deleted,
    })))
}

#[derive(Debug)]
struct ApiError {
    code: StatusCode,
    message: String,
}

impl warp::reject::Reject for ApiError {}

fn reject_fetch(err: FetchError) -> Rejection {
    let code = match err {
        FetchError::UpstreamUnavailable(_) => StatusCode::GATEWAY_TIMEOUT,
        FetchError::UpstreamHttp(_) | FetchError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    };
    warp::reject::custom(ApiError {
        code,
        message: err.to_string(),
    })
}

fn reject_store(err: StoreError) -> Rejection {
    let (code, message) = match err {
        StoreError::NotFound => (StatusCode::NOT_FOUND, "Record not found".to_string()),
        StoreError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    warp::reject::custom(ApiError { code, message })
}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub async fn rejection(err: warp::Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(api) = err.find::<ApiError>() {
        (api.code, api.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed.".to_string(),
        )
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error.".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });

    Ok(warp::reply::with_status(json, code))
}
