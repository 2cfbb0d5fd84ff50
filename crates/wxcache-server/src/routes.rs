//! Warp filters for the single `/` endpoint.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::CONTENT_TYPE;
use warp::reply::{Reply, Response};
use warp::Filter;
use wxcache_weather::{CachedLookup, LocationKey, WeatherResult};

use crate::error_mapping::{error_reply, handle_rejection};
use crate::page;

/// Upper bound on a submitted form body.
const MAX_FORM_BYTES: u64 = 4 * 1024;

/// `GET /` renders the form, `POST /` looks up the submitted `city`.
pub fn routes(
    lookup: Arc<CachedLookup>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let form = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(page::FORM_PAGE));

    let submit = warp::path::end()
        .and(warp::post())
        .and(warp::header::optional::<String>("accept"))
        .and(warp::body::content_length_limit(MAX_FORM_BYTES))
        .and(warp::body::form::<HashMap<String, String>>())
        .and(warp::any().map(move || lookup.clone()))
        .and_then(handle_submit);

    form.or(submit)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn handle_submit(
    accept: Option<String>,
    form: HashMap<String, String>,
    lookup: Arc<CachedLookup>,
) -> Result<Response, Infallible> {
    // A missing field is the same mistake as an empty one.
    let raw = form.get("city").map(String::as_str).unwrap_or_default();

    let location = match LocationKey::parse(raw) {
        Ok(location) => location,
        Err(err) => {
            tracing::debug!(error = %err, "Rejected location input");
            return Ok(error_reply(&err));
        }
    };

    match lookup.resolve(&location).await {
        Ok(result) => {
            tracing::info!(
                location = %location,
                cache = result.source.cache_status(),
                "Weather lookup served"
            );
            Ok(success_reply(&location, result, wants_html(accept.as_deref())))
        }
        Err(err) => {
            tracing::info!(location = %location, error = %err, "Weather lookup failed");
            Ok(error_reply(&err))
        }
    }
}

fn wants_html(accept: Option<&str>) -> bool {
    accept.is_some_and(|a| a.contains("text/html"))
}

fn success_reply(location: &LocationKey, result: WeatherResult, html: bool) -> Response {
    let cache_status = result.source.cache_status();
    if html {
        let page = page::result_page(location, &result.body);
        warp::reply::with_header(warp::reply::html(page), "x-cache", cache_status).into_response()
    } else {
        let reply = warp::reply::with_header(result.body, CONTENT_TYPE, "application/json");
        warp::reply::with_header(reply, "x-cache", cache_status).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_html() {
        assert!(wants_html(Some("text/html,application/xhtml+xml;q=0.9")));
        assert!(!wants_html(Some("application/json")));
        assert!(!wants_html(Some("*/*")));
        assert!(!wants_html(None));
    }
}
