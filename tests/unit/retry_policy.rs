//! Status-code policy of the retrying client

use std::sync::Arc;
use std::time::Duration;
use streetview_survey::fetcher::http::RetryingHttpClient;
use streetview_survey::fetcher::FetcherError;
use tokio::time::Instant;

use crate::support::{MockTransport, Reply, IMAGE_URL};

fn client(transport: Arc<MockTransport>, max_retries: u32) -> RetryingHttpClient {
    RetryingHttpClient::new(transport, max_retries, Duration::from_secs(20))
}

#[tokio::test(start_paused = true)]
async fn test_429_then_200_retries_exactly_once() {
    let transport = MockTransport::new()
        .then_image(Reply::RateLimited(None))
        .shared();

    let start = Instant::now();
    let response = client(transport.clone(), 3).get(IMAGE_URL, &[]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls().len(), 2);
    // No Retry-After: min(2^1, 60) seconds
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_429_is_not_bounded_by_max_retries() {
    let transport = MockTransport::new()
        .then_image(Reply::RateLimited(Some("1")))
        .then_image(Reply::RateLimited(Some("1")))
        .then_image(Reply::RateLimited(Some("1")))
        .shared();

    let response = client(transport.clone(), 0).get(IMAGE_URL, &[]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_503_exhaustion_returns_last_response() {
    let max_retries = 2;
    let transport = MockTransport::new()
        .image_fallback(Reply::Status(503, b"busy"))
        .shared();

    let start = Instant::now();
    let response = client(transport.clone(), max_retries)
        .get(IMAGE_URL, &[])
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], b"busy");
    assert_eq!(transport.calls().len(), max_retries as usize + 1);
    // 2s + 4s of backoff
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_network_exhaustion_is_an_error() {
    let transport = MockTransport::new().image_fallback(Reply::Offline).shared();

    let err = client(transport.clone(), 2)
        .get(IMAGE_URL, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::NetworkError { attempts: 3, .. }));
    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_404_and_other_statuses_return_immediately() {
    for status in [404, 400, 403] {
        let transport = MockTransport::new()
            .image_fallback(Reply::Status(status, b""))
            .shared();
        let start = Instant::now();

        let response = client(transport.clone(), 3).get(IMAGE_URL, &[]).await.unwrap();

        assert_eq!(response.status, status);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn test_network_backoff_is_capped_at_ten_seconds() {
    let transport = MockTransport::new()
        .then_image(Reply::Offline)
        .then_image(Reply::Offline)
        .then_image(Reply::Offline)
        .then_image(Reply::Offline)
        .shared();

    let start = Instant::now();
    let response = client(transport.clone(), 5).get(IMAGE_URL, &[]).await.unwrap();

    assert_eq!(response.status, 200);
    // 2 + 4 + 8 + 10
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(24), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(25), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_retry_after_falls_back_to_backoff() {
    let transport = MockTransport::new()
        .then_image(Reply::RateLimited(Some("99999999999999999999")))
        .shared();

    let start = Instant::now();
    let response = client(transport.clone(), 3).get(IMAGE_URL, &[]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.calls().len(), 2);
    // min(2^1, 60) seconds, as with no header at all
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
}
