//! End-to-end survey runs against the scripted transport

use std::time::Duration;
use streetview_survey::downloader::survey::{SurveyOptions, SurveyOrchestrator};
use streetview_survey::downloader::SurveyError;
use streetview_survey::fetcher::FetcherError;
use streetview_survey::{BoundingBox, Point};
use tempfile::TempDir;

use crate::support::{image_files, ledger_rows, test_config, MockTransport, Reply};

fn three_points() -> Vec<Point> {
    vec![
        Point::new(40.7128, -74.006),
        Point::new(40.7128, -74.005),
        Point::new(40.7138, -74.006),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_zero_results_writes_one_row_per_heading() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .metadata_fallback(Reply::metadata(r#"{"status":"ZERO_RESULTS"}"#))
        .shared();

    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), SurveyOptions::default(), transport.clone())
            .unwrap();
    let summary = orchestrator
        .run(&[Point::new(40.7128, -74.006)], dir.path())
        .await
        .unwrap();

    let rows = ledger_rows(dir.path());
    assert_eq!(rows.len(), 4);
    for (row, heading) in rows.iter().zip(["0", "90", "180", "270"]) {
        assert_eq!(
            row,
            &vec![
                "40.7128".to_string(),
                "-74.006".to_string(),
                heading.to_string(),
                String::new(),
                "ZERO_RESULTS".to_string(),
                "metadata".to_string(),
            ]
        );
    }

    assert!(image_files(dir.path()).is_empty());
    assert!(transport.image_calls().is_empty());
    assert_eq!(summary.points_skipped, 1);
    assert_eq!(summary.points_processed, 1);
    assert_eq!(summary.images_saved, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_metadata_is_recorded_as_error_and_survey_continues() {
    let dir = TempDir::new().unwrap();
    let outage = Reply::Status(503, b"<html><body>Service Unavailable</body></html>");
    let transport = MockTransport::new()
        .then_metadata(outage.clone())
        .then_metadata(outage.clone())
        .then_metadata(outage)
        .shared();

    let options = SurveyOptions::default()
        .with_headings(vec![0, 180])
        .with_max_retries(2);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let summary = orchestrator
        .run(&[Point::new(1.0, 2.0), Point::new(1.0, 2.5)], dir.path())
        .await
        .unwrap();

    // first point: 503 x3 with an HTML body; second point resolves normally
    assert_eq!(transport.metadata_calls().len(), 4);
    assert_eq!(transport.image_calls().len(), 2);
    assert_eq!(summary.points_skipped, 1);
    assert_eq!(summary.points_processed, 2);
    assert_eq!(summary.images_saved, 2);

    let rows = ledger_rows(dir.path());
    assert_eq!(rows.len(), 4);
    for (row, heading) in rows[..2].iter().zip(["0", "180"]) {
        assert_eq!(
            row,
            &vec![
                "1.0".to_string(),
                "2.0".to_string(),
                heading.to_string(),
                String::new(),
                "ERROR".to_string(),
                "metadata".to_string(),
            ]
        );
    }
    assert!(rows[2..].iter().all(|row| row[1] == "2.5" && row[4] == "OK"));
    assert_eq!(
        image_files(dir.path()),
        vec![
            "lat_1.0_lon_2.5_hdg_0_location.jpg".to_string(),
            "lat_1.0_lon_2.5_hdg_180_location.jpg".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_budget_caps_image_requests() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let options = SurveyOptions::default().with_max_requests(Some(2));
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let summary = orchestrator.run(&three_points(), dir.path()).await.unwrap();

    assert_eq!(transport.image_calls().len(), 2);
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.images_saved, 2);
    assert!(summary.budget_exhausted);
    assert_eq!(summary.points_processed, 0);
    assert_eq!(ledger_rows(dir.path()).len(), 2);
    assert_eq!(image_files(dir.path()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_budget_matching_work_is_not_reported_as_exhausted() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let options = SurveyOptions::default()
        .with_headings(vec![0, 180])
        .with_max_requests(Some(2));
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport).unwrap();
    let summary = orchestrator
        .run(&[Point::new(1.0, 2.0)], dir.path())
        .await
        .unwrap();

    assert_eq!(summary.requests_issued, 2);
    assert!(!summary.budget_exhausted);
    assert_eq!(summary.points_processed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pano_id_addresses_images_and_snapped_location_names_them() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .metadata_fallback(Reply::metadata(
            r#"{"status":"OK","pano_id":"CAoSLEFGMVFpcE","location":{"lat":40.712845,"lng":-74.005988}}"#,
        ))
        .shared();

    let options = SurveyOptions::default().with_headings(vec![90]);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    orchestrator
        .run(&[Point::new(40.7128, -74.006)], dir.path())
        .await
        .unwrap();

    let calls = transport.image_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].param("pano"), Some("CAoSLEFGMVFpcE"));
    assert_eq!(calls[0].param("location"), None);
    assert_eq!(calls[0].param("size"), Some("640x640"));
    assert_eq!(calls[0].param("key"), Some("test-key"));

    assert_eq!(
        image_files(dir.path()),
        vec!["lat_40.712845_lon_-74.005988_hdg_90_pano.jpg".to_string()]
    );
    let rows = ledger_rows(dir.path());
    assert_eq!(rows[0][0], "40.712845");
    assert_eq!(rows[0][4], "OK");
    assert_eq!(rows[0][5], "pano");
}

#[tokio::test(start_paused = true)]
async fn test_metadata_is_requested_with_sampled_location() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let orchestrator = SurveyOrchestrator::with_transport(
        test_config(),
        SurveyOptions::default().with_headings(vec![0]),
        transport.clone(),
    )
    .unwrap();
    orchestrator
        .run(&[Point::new(1.0, -2.5)], dir.path())
        .await
        .unwrap();

    let metadata = transport.metadata_calls();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].param("location"), Some("1.0,-2.5"));
    assert_eq!(
        transport.image_calls()[0].param("location"),
        Some("1.0,-2.5")
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_are_recorded_and_survey_continues() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .then_image(Reply::Status(503, b"unavailable"))
        .then_image(Reply::Status(503, b"unavailable"))
        .shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0, 90])
        .with_max_retries(1);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let summary = orchestrator
        .run(&[Point::new(1.0, 2.0)], dir.path())
        .await
        .unwrap();

    // heading 0: 503, retry, 503 -> recorded; heading 90: 200
    assert_eq!(transport.image_calls().len(), 3);
    assert_eq!(summary.images_failed, 1);
    assert_eq!(summary.images_saved, 1);

    let rows = ledger_rows(dir.path());
    assert_eq!(rows[0][3], "");
    assert_eq!(rows[0][4], "HTTP_503");
    assert_eq!(rows[1][4], "OK");
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_image_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .image_fallback(Reply::Status(403, b"denied"))
        .shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0]);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    orchestrator
        .run(&[Point::new(1.0, 2.0)], dir.path())
        .await
        .unwrap();

    assert_eq!(transport.image_calls().len(), 1);
    assert_eq!(ledger_rows(dir.path())[0][4], "HTTP_403");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_image_is_retried_once() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .then_image(Reply::RateLimited(Some("2")))
        .shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0]);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let summary = orchestrator
        .run(&[Point::new(1.0, 2.0)], dir.path())
        .await
        .unwrap();

    assert_eq!(transport.image_calls().len(), 2);
    assert_eq!(summary.images_saved, 1);
    // Budget counts logical image requests, not transport attempts
    assert_eq!(summary.requests_issued, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_metadata_aborts_survey() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .metadata_fallback(Reply::Offline)
        .shared();

    let options = SurveyOptions::default().with_max_retries(2);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let err = orchestrator
        .run(&three_points(), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SurveyError::Transport(FetcherError::NetworkError { attempts: 3, .. })
    ));
    assert_eq!(transport.metadata_calls().len(), 3);
    assert!(transport.image_calls().is_empty());
    assert!(ledger_rows(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_image_keeps_earlier_rows() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new()
        .then_image(Reply::image())
        .image_fallback(Reply::Offline)
        .shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0, 90])
        .with_max_retries(0);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport).unwrap();
    let result = orchestrator.run(&[Point::new(1.0, 2.0)], dir.path()).await;

    assert!(matches!(result, Err(SurveyError::Transport(_))));
    let rows = ledger_rows(dir.path());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][4], "OK");
    assert_eq!(image_files(dir.path()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_survey_respects_request_rate() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0, 120, 240])
        .with_max_per_minute(2);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();

    let start = tokio::time::Instant::now();
    orchestrator
        .run(&[Point::new(1.0, 2.0)], dir.path())
        .await
        .unwrap();

    assert_eq!(transport.image_calls().len(), 3);
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_run_bbox_follows_grid_order() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let options = SurveyOptions::default()
        .with_metadata(false)
        .with_headings(vec![0]);
    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), options, transport.clone()).unwrap();
    let summary = orchestrator
        .run_bbox(&BoundingBox::new(1.0, 1.5, 2.0, 2.5), 0.5, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.points_total, 4);
    let locations: Vec<String> = transport
        .image_calls()
        .iter()
        .map(|call| call.param("location").unwrap().to_string())
        .collect();
    assert_eq!(locations, vec!["1.0,2.0", "1.0,2.5", "1.5,2.0", "1.5,2.5"]);
}

#[tokio::test]
async fn test_invalid_grid_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new().shared();

    let orchestrator =
        SurveyOrchestrator::with_transport(test_config(), SurveyOptions::default(), transport.clone())
            .unwrap();
    let err = orchestrator
        .run_bbox(&BoundingBox::new(2.0, 1.0, 0.0, 1.0), 0.5, &dir.path().join("out"))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(transport.calls().is_empty());
    assert!(!dir.path().join("out").exists());
}
