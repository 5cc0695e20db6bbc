use crate::backend::ModelRecord;
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use preprocess::LetterboxTransform;
use schema::BoundingBox;

/// Upper bound on boxes kept per image after NMS.
pub const MAX_DETECTIONS: usize = 300;

/// Decodes the raw YOLO head: `[1, 4 + C, N]` or its transpose, where each
/// prediction holds a `cx, cy, w, h` box in model-input pixels followed by
/// one score per class.
#[derive(Debug, Clone, Copy)]
pub struct YoloDecoder {
    pub score_floor: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

struct Candidate {
    bbox: BoundingBox,
    score: f32,
    class_id: u32,
}

impl YoloDecoder {
    pub fn new(score_floor: f32, iou_threshold: f32) -> Self {
        Self {
            score_floor,
            iou_threshold,
            max_detections: MAX_DETECTIONS,
        }
    }

    /// Turn the head output into records in the letterbox source's pixel
    /// space, best score first. Predictions whose geometry is not finite are
    /// passed through without a box so the caller can account for them.
    pub fn decode(
        &self,
        output: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
    ) -> anyhow::Result<Vec<ModelRecord>> {
        let predictions = features_by_predictions(output)?;
        let num_features = predictions.nrows();

        let mut candidates = Vec::new();
        let mut without_geometry = Vec::new();

        for column in predictions.columns() {
            let Some((class_id, score)) = best_class(column.iter().skip(4).copied()) else {
                continue;
            };
            if score < self.score_floor {
                continue;
            }

            let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
            if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
                without_geometry.push(ModelRecord {
                    class_id,
                    confidence: score,
                    bbox: None,
                });
                continue;
            }

            let [x1, y1, x2, y2] = cxcywh_to_xyxy(cx, cy, w, h);
            let [x1, y1, x2, y2] = transform.to_source(x1, y1, x2, y2);
            candidates.push(Candidate {
                bbox: BoundingBox::new(x1, y1, x2, y2),
                score,
                class_id,
            });
        }

        tracing::trace!(
            num_features,
            predictions = predictions.ncols(),
            candidates = candidates.len(),
            "Decoded detection head"
        );

        let mut records: Vec<ModelRecord> = nms_per_class(&candidates, self.iou_threshold)
            .into_iter()
            .take(self.max_detections)
            .map(|i| {
                let c = &candidates[i];
                ModelRecord::new(c.class_id, c.score, [c.bbox.x1, c.bbox.y1, c.bbox.x2, c.bbox.y2])
            })
            .collect();
        records.extend(without_geometry);

        Ok(records)
    }
}

/// View the head as `[features, predictions]` whichever way it was exported.
fn features_by_predictions<'a>(output: &'a ArrayViewD<f32>) -> anyhow::Result<ArrayView2<'a, f32>> {
    let shape = output.shape();
    let view = match shape.len() {
        3 if shape[0] == 1 => output.index_axis(Axis(0), 0),
        2 => output.view(),
        _ => anyhow::bail!("Unexpected detection output shape {:?}", shape),
    };
    let view = view.into_dimensionality::<Ix2>()?;

    let view = if view.nrows() < view.ncols() {
        view
    } else {
        view.reversed_axes()
    };

    if view.nrows() <= 4 {
        anyhow::bail!(
            "Detection output has {} features per prediction, need 4 box values plus class scores",
            view.nrows()
        );
    }
    Ok(view)
}

/// Highest class score and its index. NaN scores never win.
#[inline]
fn best_class(scores: impl Iterator<Item = f32>) -> Option<(u32, f32)> {
    scores
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, s)| (i as u32, s))
}

#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Per-class non-maximum suppression. Returns kept indices, best score first.
fn nms_per_class(candidates: &[Candidate], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for (rank, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &order[rank + 1..] {
            if !suppressed[j]
                && candidates[j].class_id == candidates[i].class_id
                && candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    const IDENTITY: LetterboxTransform = LetterboxTransform {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
        source_width: 640,
        source_height: 640,
    };

    /// Builds a `[1, 4 + classes, N]` head from `(cx, cy, w, h, class, score)` rows,
    /// padded with zero-score predictions so predictions outnumber features.
    fn head(preds: &[(f32, f32, f32, f32, usize, f32)], classes: usize) -> Array<f32, IxDyn> {
        let features = 4 + classes;
        let n = preds.len().max(features + 1);
        let mut data = vec![0.0f32; features * n];
        for (i, &(cx, cy, w, h, class, score)) in preds.iter().enumerate() {
            data[i] = cx;
            data[n + i] = cy;
            data[2 * n + i] = w;
            data[3 * n + i] = h;
            data[(4 + class) * n + i] = score;
        }
        Array::from_shape_vec(IxDyn(&[1, features, n]), data).unwrap()
    }

    fn sample_head() -> Array<f32, IxDyn> {
        head(
            &[
                (100.0, 100.0, 50.0, 50.0, 0, 0.9),
                (102.0, 101.0, 50.0, 50.0, 0, 0.8), // overlaps the first, same class
                (101.0, 100.0, 50.0, 50.0, 1, 0.7), // overlaps, other class
                (400.0, 400.0, 20.0, 40.0, 2, 0.6),
                (500.0, 500.0, 10.0, 10.0, 2, 0.05), // under the floor
            ],
            6,
        )
    }

    #[test]
    fn test_decode_applies_class_aware_nms_and_floor() {
        let decoder = YoloDecoder::new(0.25, 0.45);
        let records = decoder.decode(&sample_head().view(), &IDENTITY).unwrap();

        let classes: Vec<u32> = records.iter().map(|r| r.class_id).collect();
        assert_eq!(classes, vec![0, 1, 2]);

        let confidences: Vec<f32> = records.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.6]);

        assert_eq!(records[0].bbox, Some([75.0, 75.0, 125.0, 125.0]));
        assert_eq!(records[2].bbox, Some([390.0, 380.0, 410.0, 420.0]));
    }

    #[test]
    fn test_transposed_layout_decodes_identically() {
        let decoder = YoloDecoder::new(0.25, 0.45);
        let features_first = head(
            &(0..20)
                .map(|i| (10.0 + i as f32 * 30.0, 50.0, 10.0, 10.0, i % 2, 0.5))
                .collect::<Vec<_>>(),
            2,
        );
        let predictions_first = features_first
            .view()
            .permuted_axes(IxDyn(&[0, 2, 1]))
            .to_owned();

        let a = decoder.decode(&features_first.view(), &IDENTITY).unwrap();
        let b = decoder.decode(&predictions_first.view(), &IDENTITY).unwrap();
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_letterbox_is_undone() {
        let decoder = YoloDecoder::new(0.25, 0.45);
        let transform = LetterboxTransform {
            scale: 0.5,
            offset_x: 0.0,
            offset_y: 80.0,
            source_width: 1280,
            source_height: 960,
        };
        let output = head(&[(320.0, 320.0, 100.0, 100.0, 0, 0.9)], 1);

        let records = decoder.decode(&output.view(), &transform).unwrap();
        assert_eq!(records[0].bbox, Some([540.0, 380.0, 740.0, 580.0]));
    }

    #[test]
    fn test_non_finite_geometry_passes_through_without_box() {
        let decoder = YoloDecoder::new(0.25, 0.45);
        let output = head(
            &[
                (f32::NAN, 10.0, 5.0, 5.0, 0, 0.9),
                (50.0, 50.0, 10.0, 10.0, 1, 0.8),
            ],
            2,
        );

        let records = decoder.decode(&output.view(), &IDENTITY).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].class_id, 1);
        assert!(records[0].bbox.is_some());
        assert_eq!(records[1].bbox, None);
        assert_eq!(records[1].confidence, 0.9);
    }

    #[test]
    fn test_max_detections_caps_output() {
        let mut decoder = YoloDecoder::new(0.0, 0.45);
        decoder.max_detections = 3;
        let output = head(
            &(0..10)
                .map(|i| (20.0 + i as f32 * 60.0, 20.0, 10.0, 10.0, 0, 0.1 * i as f32))
                .collect::<Vec<_>>(),
            1,
        );

        let records = decoder.decode(&output.view(), &IDENTITY).unwrap();
        assert_eq!(records.len(), 3);
        assert!((records[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_unexpected_shapes_rejected() {
        let decoder = YoloDecoder::new(0.25, 0.45);

        let four_features = Array::<f32, _>::zeros(IxDyn(&[1, 4, 100]));
        assert!(decoder.decode(&four_features.view(), &IDENTITY).is_err());

        let batched = Array::<f32, _>::zeros(IxDyn(&[2, 84, 100]));
        assert!(decoder.decode(&batched.view(), &IDENTITY).is_err());

        let flat = Array::<f32, _>::zeros(IxDyn(&[8400]));
        assert!(decoder.decode(&flat.view(), &IDENTITY).is_err());
    }

    #[test]
    fn test_best_class_ignores_nan() {
        assert_eq!(best_class([0.1, f32::NAN, 0.3].into_iter()), Some((2, 0.3)));
        assert_eq!(best_class([f32::NAN].into_iter()), None);
    }
}
