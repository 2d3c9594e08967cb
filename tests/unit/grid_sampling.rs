//! Grid sampler properties over realistic survey areas

use streetview_survey::grid::{estimate_len, generate, GridError};
use streetview_survey::{BoundingBox, Point};

#[test]
fn test_degenerate_box_yields_single_point() {
    let points = generate(&BoundingBox::new(1.0, 1.0, 1.0, 1.0), 0.5).unwrap();
    assert_eq!(points, vec![Point::new(1.0, 1.0)]);
}

#[test]
fn test_city_block_is_row_major_and_contained() {
    let bbox = BoundingBox::new(40.712, 40.714, -74.007, -74.005);
    let points = generate(&bbox, 0.001).unwrap();

    assert_eq!(points.len(), 9);
    assert_eq!(points[0], Point::new(40.712, -74.007));
    assert_eq!(points[8], Point::new(40.714, -74.005));

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            a.lat() < b.lat() || (a.lat() == b.lat() && a.lon() < b.lon()),
            "{a} then {b} breaks row-major order"
        );
    }
    assert!(points.iter().all(|p| bbox.contains(p)));
}

#[test]
fn test_generation_is_deterministic() {
    let bbox = BoundingBox::new(51.5, 51.51, -0.13, -0.12);
    assert_eq!(generate(&bbox, 0.002).unwrap(), generate(&bbox, 0.002).unwrap());
}

#[test]
fn test_estimate_matches_generated_len() {
    let bbox = BoundingBox::new(0.0, 1.0, 0.0, 0.5);
    assert_eq!(estimate_len(&bbox, 0.25).unwrap(), generate(&bbox, 0.25).unwrap().len());
}

#[test]
fn test_rejections() {
    assert!(matches!(
        generate(&BoundingBox::new(1.0, 0.0, 0.0, 1.0), 0.1),
        Err(GridError::InvalidRange { .. })
    ));
    assert!(matches!(
        generate(&BoundingBox::new(0.0, 1.0, 0.0, 1.0), f64::NAN),
        Err(GridError::InvalidStep(_))
    ));
    assert!(matches!(
        generate(&BoundingBox::new(0.0, 1.0, 0.0, 1.0), -0.1),
        Err(GridError::InvalidStep(_))
    ));
}
