//! Maps lookup errors and warp rejections to plain-text HTTP replies.

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Rejection;
use wxcache_core::WeatherError;

/// HTTP status for a lookup failure.
///
/// Input problems are the caller's (400); a location the provider does not
/// recognise is 404; any other provider failure is 502.
pub fn status_for(err: &WeatherError) -> StatusCode {
    match err {
        WeatherError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        WeatherError::UpstreamUnavailable { .. } if err.is_location_not_found() => {
            StatusCode::NOT_FOUND
        }
        WeatherError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        // The lookup absorbs store failures; these only arise at startup.
        WeatherError::CacheUnavailable(_) | WeatherError::CacheWriteFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Plain-text reply carrying the error's user message.
pub fn error_reply(err: &WeatherError) -> Response {
    warp::reply::with_status(err.user_message(), status_for(err)).into_response()
}

/// Turn routing rejections into short plain-text replies.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a form-encoded body.",
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required.")
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Malformed form body.")
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    Ok(warp::reply::with_status(message, status).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_bad_request() {
        let err = WeatherError::InvalidInput("empty".into());
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_location_is_not_found() {
        let err = WeatherError::UpstreamUnavailable {
            status: Some(400),
            message: "Invalid location".into(),
        };
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_provider_outage_is_bad_gateway() {
        for status in [None, Some(401), Some(429), Some(500), Some(503)] {
            let err = WeatherError::UpstreamUnavailable {
                status,
                message: "down".into(),
            };
            assert_eq!(status_for(&err), StatusCode::BAD_GATEWAY, "{status:?}");
        }
    }

    #[test]
    fn test_store_failures_are_unavailable() {
        let errors = [
            WeatherError::CacheUnavailable("refused".into()),
            WeatherError::CacheWriteFailed("OOM".into()),
        ];
        for err in errors {
            assert_eq!(status_for(&err), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_not_found_rejection() {
        let reply = handle_rejection(warp::reject::not_found()).await.unwrap();
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
    }
}
