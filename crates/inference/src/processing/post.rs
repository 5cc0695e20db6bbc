use crate::backend::{InferenceOutput, labels};
use schema::{BoundingBox, RawDetection};

pub struct PostProcessor {
    pub confidence_threshold: f32,
}

#[derive(Debug, Default)]
pub struct ParsedDetections {
    pub detections: Vec<RawDetection>,
    /// Records dropped for missing or non-finite values.
    pub skipped: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Validate backend records and keep those at or above the threshold.
    ///
    /// Malformed records are logged and counted, never fatal. Model order is
    /// preserved and boxes are passed through as given, inverted corners included.
    #[tracing::instrument(skip_all, fields(records = output.records.len()))]
    pub fn parse_detections(
        &self,
        output: InferenceOutput,
        class_names: &[String],
    ) -> ParsedDetections {
        let mut parsed = ParsedDetections::default();

        for (index, record) in output.records.into_iter().enumerate() {
            let Some([x1, y1, x2, y2]) = record.bbox else {
                skip(&mut parsed, index, "missing geometry");
                continue;
            };
            let bbox = BoundingBox::new(x1, y1, x2, y2);
            if !bbox.is_finite() {
                skip(&mut parsed, index, "non-finite coordinates");
                continue;
            }
            if !record.confidence.is_finite() {
                skip(&mut parsed, index, "non-finite confidence");
                continue;
            }

            if record.confidence < self.confidence_threshold {
                continue;
            }

            let class_name = class_names
                .get(record.class_id as usize)
                .cloned()
                .unwrap_or_else(|| labels::fallback_name(record.class_id));

            parsed.detections.push(RawDetection {
                class_id: record.class_id,
                class_name,
                confidence: record.confidence,
                bbox,
            });
        }

        parsed
    }
}

fn skip(parsed: &mut ParsedDetections, index: usize, reason: &'static str) {
    tracing::warn!(index, reason, "Skipping malformed detection record");
    parsed.skipped += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelRecord;

    fn names() -> Vec<String> {
        vec!["person".to_string(), "car".to_string()]
    }

    fn output(records: Vec<ModelRecord>) -> InferenceOutput {
        InferenceOutput { records }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let processor = PostProcessor::new(0.5);
        let parsed = processor.parse_detections(
            output(vec![
                ModelRecord::new(0, 0.49, [0.0, 0.0, 1.0, 1.0]),
                ModelRecord::new(0, 0.5, [0.0, 0.0, 1.0, 1.0]),
                ModelRecord::new(1, 0.95, [0.0, 0.0, 1.0, 1.0]),
            ]),
            &names(),
        );

        let confidences: Vec<f32> = parsed.detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.5, 0.95]);
        assert_eq!(parsed.skipped, 0, "low confidence is not malformed");
    }

    #[test]
    fn test_malformed_records_are_skipped_and_counted() {
        let processor = PostProcessor::new(0.25);
        let parsed = processor.parse_detections(
            output(vec![
                ModelRecord::new(0, 0.9, [10.0, 10.0, 20.0, 20.0]),
                ModelRecord {
                    class_id: 1,
                    confidence: 0.8,
                    bbox: None,
                },
                ModelRecord::new(1, 0.8, [f32::INFINITY, 0.0, 1.0, 1.0]),
                ModelRecord::new(1, f32::NAN, [0.0, 0.0, 1.0, 1.0]),
                ModelRecord::new(1, 0.7, [30.0, 30.0, 40.0, 40.0]),
            ]),
            &names(),
        );

        assert_eq!(parsed.skipped, 3);
        assert_eq!(parsed.detections.len(), 2);
        assert_eq!(parsed.detections[0].class_name, "person");
        assert_eq!(parsed.detections[1].class_name, "car");
        assert_eq!(
            parsed.detections[1].bbox,
            BoundingBox::new(30.0, 30.0, 40.0, 40.0)
        );
    }

    #[test]
    fn test_order_and_inverted_boxes_preserved() {
        let processor = PostProcessor::new(0.1);
        let parsed = processor.parse_detections(
            output(vec![
                ModelRecord::new(1, 0.3, [50.0, 50.0, 10.0, 10.0]),
                ModelRecord::new(0, 0.9, [0.0, 0.0, 5.0, 5.0]),
            ]),
            &names(),
        );

        assert_eq!(parsed.detections[0].confidence, 0.3);
        assert_eq!(
            parsed.detections[0].bbox,
            BoundingBox::new(50.0, 50.0, 10.0, 10.0)
        );
        assert!(!parsed.detections[0].bbox.is_ordered());
    }

    #[test]
    fn test_unknown_class_gets_fallback_name() {
        let processor = PostProcessor::new(0.1);
        let parsed = processor.parse_detections(
            output(vec![ModelRecord::new(7, 0.9, [0.0, 0.0, 1.0, 1.0])]),
            &names(),
        );
        assert_eq!(parsed.detections[0].class_name, "class_7");
    }

    #[test]
    fn test_empty_output() {
        let parsed = PostProcessor::new(0.5).parse_detections(InferenceOutput::default(), &[]);
        assert!(parsed.detections.is_empty());
        assert_eq!(parsed.skipped, 0);
    }
}
