use preprocess::ScaleFactors;
use schema::{Detection, RawDetection};

/// Map detections from normalized-image space back to the uploaded image.
///
/// Each x coordinate is multiplied by `scale_x` and each y by `scale_y`.
/// Class, name, confidence and order are carried over unchanged. Results are
/// not clamped to the original bounds and inverted corners stay inverted.
pub fn rescale(detections: Vec<RawDetection>, factors: &ScaleFactors) -> Vec<Detection> {
    detections
        .into_iter()
        .map(|d| Detection {
            class_id: d.class_id,
            class_name: d.class_name,
            confidence: d.confidence,
            bbox: d.bbox.scaled(factors.scale_x, factors.scale_y),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::BoundingBox;

    fn raw(class_id: u32, confidence: f32, bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id,
            class_name: format!("c{class_id}"),
            confidence,
            bbox: BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        }
    }

    #[test]
    fn test_uniform_factor_of_two() {
        let factors = ScaleFactors {
            scale_x: 2.0,
            scale_y: 2.0,
        };
        let out = rescale(
            vec![
                raw(0, 0.9, [10.0, 10.0, 100.0, 100.0]),
                raw(2, 0.6, [200.0, 200.0, 300.0, 400.0]),
            ],
            &factors,
        );

        assert_eq!(out[0].bbox, BoundingBox::new(20.0, 20.0, 200.0, 200.0));
        assert_eq!(out[1].bbox, BoundingBox::new(400.0, 400.0, 600.0, 800.0));
        assert_eq!(out[0].confidence, 0.9);
        assert_eq!(out[1].class_name, "c2");
    }

    #[test]
    fn test_identity_is_noop() {
        let input = vec![raw(3, 0.7, [1.5, 2.5, 3.5, 4.5])];
        let out = rescale(input.clone(), &ScaleFactors::IDENTITY);
        assert_eq!(out[0].bbox, input[0].bbox);
    }

    #[test]
    fn test_axes_scaled_independently() {
        let factors = ScaleFactors::between((4000, 2000), (1920, 960));
        let out = rescale(vec![raw(0, 0.5, [0.0, 0.0, 1920.0, 960.0])], &factors);

        let b = out[0].bbox;
        assert!((b.x2 - 4000.0).abs() < 1e-2, "x2 = {}", b.x2);
        assert!((b.y2 - 2000.0).abs() < 1e-2, "y2 = {}", b.y2);
    }

    #[test]
    fn test_inverse_scaling_round_trips() {
        let factors = ScaleFactors {
            scale_x: 2.0833333,
            scale_y: 1.75,
        };
        let input = vec![raw(1, 0.8, [12.3, 45.6, 789.0, 1011.0])];
        let out = rescale(input.clone(), &factors);

        let back = out[0]
            .bbox
            .scaled(1.0 / factors.scale_x, 1.0 / factors.scale_y);
        let orig = input[0].bbox;
        for (a, b) in [
            (back.x1, orig.x1),
            (back.y1, orig.y1),
            (back.x2, orig.x2),
            (back.y2, orig.y2),
        ] {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_order_and_inverted_boxes_kept() {
        let factors = ScaleFactors {
            scale_x: 3.0,
            scale_y: 3.0,
        };
        let out = rescale(
            vec![
                raw(0, 0.2, [10.0, 10.0, 5.0, 5.0]),
                raw(1, 0.9, [0.0, 0.0, 1.0, 1.0]),
            ],
            &factors,
        );
        assert_eq!(out[0].class_id, 0);
        assert_eq!(out[0].bbox, BoundingBox::new(30.0, 30.0, 15.0, 15.0));
        assert_eq!(out[1].class_id, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(rescale(Vec::new(), &ScaleFactors::IDENTITY).is_empty());
    }
}
