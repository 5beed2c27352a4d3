use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MeasureError;
use crate::helper::face_helper::{DpResult, DP_MAX_MM, DP_MIN_MM};
use crate::helper::face_shape::{FaceMeasurements, FaceShape, FaceShapeResult};
use crate::pipeline::pipeline::FaceAnalysisResult;

/// Confidence given to a value the user typed in.
pub const MANUAL_CONFIDENCE: u8 = 100;

// keeps ids unique when two records share a millisecond
static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMethod {
    Camera,
    Manual,
}

/// A saved DP measurement, ready to be stored by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub id: String,
    /// mm
    pub dp_value: f32,
    pub confidence: u8,
    pub method: MeasurementMethod,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_shape: Option<FaceShapeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_samples: Option<usize>,
}

impl MeasurementRecord {
    fn new(dp_value: f32, confidence: u8, method: MeasurementMethod) -> Self {
        let recorded_at = Utc::now();
        MeasurementRecord {
            id: format!(
                "measurement-{}-{}",
                recorded_at.timestamp_millis(),
                RECORD_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
            dp_value,
            confidence,
            method,
            recorded_at,
            face_shape: None,
            valid_samples: None,
        }
    }

    /// from_analysis records the outcome of a full capture.
    pub fn from_analysis(result: &FaceAnalysisResult) -> Self {
        MeasurementRecord {
            face_shape: Some(result.face_shape),
            valid_samples: Some(result.dp.valid_samples),
            ..MeasurementRecord::new(result.dp.value, result.dp.confidence, MeasurementMethod::Camera)
        }
    }

    /// from_reading records a single frame pupil meter reading.
    pub fn from_reading(dp: &DpResult) -> Self {
        MeasurementRecord::new(dp.value, dp.confidence, MeasurementMethod::Camera)
    }

    /// manual validates a typed in DP value. A chosen face shape is stored
    /// with full confidence and no measurements.
    ///
    /// # Arguments
    /// * `dp_value` - pupillary distance in mm
    /// * `face_shape` - optional self assessed face shape
    ///
    /// # Returns
    /// * `Result<MeasurementRecord, MeasureError>`
    pub fn manual(dp_value: f32, face_shape: Option<FaceShape>) -> Result<Self, MeasureError> {
        if !dp_value.is_finite() {
            return Err(MeasureError::InvalidManualValue);
        }
        if !(DP_MIN_MM..=DP_MAX_MM).contains(&dp_value) {
            return Err(MeasureError::ManualOutOfRange { value: dp_value, min: DP_MIN_MM, max: DP_MAX_MM });
        }

        Ok(MeasurementRecord {
            face_shape: face_shape.map(|classification| FaceShapeResult {
                classification,
                confidence: MANUAL_CONFIDENCE,
                measurements: FaceMeasurements::default(),
            }),
            ..MeasurementRecord::new(dp_value, MANUAL_CONFIDENCE, MeasurementMethod::Manual)
        })
    }
}

/// MeasurementHistory keeps the saved measurements, newest first, and tracks
/// which one is current. Persisting it is up to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementHistory {
    records: VecDeque<MeasurementRecord>,
    current_id: Option<String>,
}

impl MeasurementHistory {
    pub fn new() -> Self {
        MeasurementHistory::default()
    }

    /// add puts `record` in front and makes it current.
    pub fn add(&mut self, record: MeasurementRecord) -> &MeasurementRecord {
        debug!(id = record.id.as_str(), method = ?record.method, dp_mm = record.dp_value, "measurement added");
        self.current_id = Some(record.id.clone());
        self.records.push_front(record);
        &self.records[0]
    }

    /// remove drops the record with `id`. When it was current, the newest
    /// remaining record becomes current.
    ///
    /// # Arguments
    /// * `id` - id of the record to drop
    ///
    /// # Returns
    /// * `Option<MeasurementRecord>` - the removed record, `None` for an unknown id
    pub fn remove(&mut self, id: &str) -> Option<MeasurementRecord> {
        let idx = self.records.iter().position(|record| record.id == id)?;
        let removed = self.records.remove(idx)?;
        if self.current_id.as_deref() == Some(id) {
            self.current_id = self.records.front().map(|record| record.id.clone());
        }
        debug!(id, remaining = self.records.len(), "measurement removed");
        Some(removed)
    }

    /// select marks `id` as current. An unknown id is kept; `current` then
    /// falls back to the newest record.
    pub fn select(&mut self, id: &str) {
        self.current_id = Some(id.to_string());
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.current_id = None;
    }

    /// current returns the selected record, or the newest one when nothing
    /// valid is selected.
    pub fn current(&self) -> Option<&MeasurementRecord> {
        self.current_id
            .as_deref()
            .and_then(|id| self.get(id))
            .or_else(|| self.records.front())
    }

    pub fn get(&self, id: &str) -> Option<&MeasurementRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<MeasurementRecord>> for MeasurementHistory {
    /// Records are expected newest first, as `iter` yields them.
    fn from(records: Vec<MeasurementRecord>) -> Self {
        let current_id = records.first().map(|record| record.id.clone());
        MeasurementHistory { records: records.into(), current_id }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::error::MeasureError;
    use crate::helper::face_helper::DpResult;
    use crate::helper::face_shape::{FaceMeasurements, FaceShape, FaceShapeResult};
    use crate::modules::measurement::*;
    use crate::pipeline::pipeline::{DpMeasurement, FaceAnalysisResult};

    fn analysis() -> FaceAnalysisResult {
        FaceAnalysisResult {
            dp: DpMeasurement { value: 63.2, confidence: 85, valid_samples: 72 },
            face_shape: FaceShapeResult {
                classification: FaceShape::Heart,
                confidence: 85,
                measurements: FaceMeasurements { face_width: 0.4, face_height: 0.52, ..Default::default() },
            },
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_analysis() {
        let record = MeasurementRecord::from_analysis(&analysis());
        assert_eq!(record.method, MeasurementMethod::Camera);
        assert_eq!(record.dp_value, 63.2);
        assert_eq!(record.confidence, 85);
        assert_eq!(record.valid_samples, Some(72));
        assert_eq!(record.face_shape.unwrap().classification, FaceShape::Heart);
        assert!(record.id.starts_with("measurement-"));
    }

    #[test]
    fn test_from_reading() {
        let record = MeasurementRecord::from_reading(&DpResult { value: 61.0, confidence: 75 });
        assert_eq!(record.method, MeasurementMethod::Camera);
        assert!(record.face_shape.is_none());
        assert!(record.valid_samples.is_none());
    }

    #[test]
    fn test_manual_bounds() {
        assert!(MeasurementRecord::manual(50.0, None).is_ok());
        assert!(MeasurementRecord::manual(80.0, None).is_ok());
        assert_eq!(
            MeasurementRecord::manual(49.9, None),
            Err(MeasureError::ManualOutOfRange { value: 49.9, min: 50.0, max: 80.0 })
        );
        assert!(matches!(MeasurementRecord::manual(80.5, None), Err(MeasureError::ManualOutOfRange { .. })));
        assert_eq!(MeasurementRecord::manual(f32::NAN, None), Err(MeasureError::InvalidManualValue));
    }

    #[test]
    fn test_manual_with_face_shape() {
        let record = MeasurementRecord::manual(64.5, Some(FaceShape::Square)).unwrap();
        assert_eq!(record.method, MeasurementMethod::Manual);
        assert_eq!(record.confidence, 100);
        let shape = record.face_shape.unwrap();
        assert_eq!(shape.classification, FaceShape::Square);
        assert_eq!(shape.measurements, FaceMeasurements::default());
    }

    #[test]
    fn test_record_json() {
        let record = MeasurementRecord::manual(62.0, None).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["method"], "manual");
        assert_eq!(json["dpValue"], 62.0);
        assert!(json.get("faceShape").is_none());
        assert!(json.get("recordedAt").is_some());

        let parsed: MeasurementRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    fn manual(dp_value: f32) -> MeasurementRecord {
        MeasurementRecord::manual(dp_value, None).unwrap()
    }

    #[test]
    fn test_record_ids_are_unique() {
        let first = manual(60.0);
        let second = manual(60.0);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_history_add_puts_newest_first_and_current() {
        let mut history = MeasurementHistory::new();
        assert!(history.current().is_none());

        let older = history.add(manual(60.0)).id.clone();
        let newer = history.add(MeasurementRecord::from_analysis(&analysis())).id.clone();

        assert_eq!(history.len(), 2);
        let ids: Vec<&str> = history.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec![newer.as_str(), older.as_str()]);
        assert_eq!(history.current().unwrap().id, newer);
    }

    #[test]
    fn test_history_remove_current_selects_newest_remaining() {
        let mut history = MeasurementHistory::new();
        let a = history.add(manual(58.0)).id.clone();
        let b = history.add(manual(60.0)).id.clone();
        let c = history.add(manual(62.0)).id.clone();

        history.select(&b);
        assert_eq!(history.current().unwrap().id, b);

        // removing another record keeps the selection
        assert_eq!(history.remove(&a).unwrap().dp_value, 58.0);
        assert_eq!(history.current().unwrap().id, b);

        history.remove(&b);
        assert_eq!(history.current().unwrap().id, c);

        assert!(history.remove("measurement-unknown").is_none());
        history.remove(&c);
        assert!(history.is_empty());
        assert!(history.current().is_none());
    }

    #[test]
    fn test_history_unknown_selection_falls_back_to_newest() {
        let mut history = MeasurementHistory::new();
        history.add(manual(58.0));
        let newest = history.add(manual(61.0)).id.clone();

        history.select("measurement-missing");
        assert_eq!(history.current().unwrap().id, newest);
    }

    #[test]
    fn test_history_clear_and_restore() {
        let mut history = MeasurementHistory::new();
        history.add(manual(58.0));
        history.add(manual(61.0));
        let saved: Vec<MeasurementRecord> = history.iter().cloned().collect();

        history.clear();
        assert!(history.is_empty());
        assert!(history.current().is_none());

        let restored = MeasurementHistory::from(saved.clone());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.current(), saved.first());
    }
}
