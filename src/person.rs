use opencv::core::Rect;
use serde::{Deserialize, Serialize};

/// Sentinel identity meaning re-identification has not resolved this person.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// Pixel-space corner rectangle with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x1, self.y1, self.x2 - self.x1, self.y2 - self.y1)
    }

    fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }
}

/// One detected anatomical landmark. `conf` is absent for models that only
/// emit 2-dimensional keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub conf: Option<f32>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, conf: f32) -> Self {
        Self { x, y, conf: Some(conf) }
    }
}

/// One person as reported by the external detect/track/reid stages for a
/// single frame.
///
/// `track_id` is only stable within one tracking session; `reid_id` is the
/// long-lived identity, with [`UNKNOWN_IDENTITY`] when unresolved.
/// `repspoint` anchors every text/marker layer for this person.
/// `keypoints` is empty or a full skeleton's worth of landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonObservation {
    pub track_id: i32,
    pub reid_id: String,
    #[serde(default)]
    pub face_id: Option<String>,
    pub bbox: BoundingBox,
    pub repspoint: (i32, i32),
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl PersonObservation {
    pub fn is_unknown(&self) -> bool {
        self.reid_id == UNKNOWN_IDENTITY
    }

    /// Structural check for the fields the overlay layers rely on.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.bbox.is_ordered() {
            return Err(format!(
                "bounding box corners out of order: ({}, {}) -> ({}, {})",
                self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2
            ));
        }
        for (i, k) in self.keypoints.iter().enumerate() {
            if !k.x.is_finite() || !k.y.is_finite() {
                return Err(format!("keypoint {i} has non-finite coordinates"));
            }
            if let Some(conf) = k.conf {
                if !(0.0..=1.0).contains(&conf) {
                    return Err(format!("keypoint {i} confidence {conf} outside [0, 1]"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> PersonObservation {
        PersonObservation {
            track_id: 3,
            reid_id: "alice".into(),
            face_id: None,
            bbox: BoundingBox::new(10, 20, 110, 220),
            repspoint: (60, 120),
            keypoints: vec![Keypoint::new(30.0, 40.0, 0.9)],
        }
    }

    #[test]
    fn valid_observation_passes() {
        assert!(observation().validate().is_ok());
    }

    #[test]
    fn reversed_box_is_malformed() {
        let mut person = observation();
        person.bbox = BoundingBox::new(110, 20, 10, 220);
        assert!(person.validate().is_err());
    }

    #[test]
    fn out_of_range_confidence_is_malformed() {
        let mut person = observation();
        person.keypoints = vec![Keypoint::new(30.0, 40.0, 1.5)];
        assert!(person.validate().is_err());
    }

    #[test]
    fn non_finite_coordinate_is_malformed() {
        let mut person = observation();
        person.keypoints = vec![Keypoint::new(f32::NAN, 40.0, 0.9)];
        assert!(person.validate().is_err());
    }

    #[test]
    fn deserializes_pipeline_json() {
        let raw = r#"{
            "track_id": 7,
            "reid_id": "Unknown",
            "bbox": {"x1": 5, "y1": 6, "x2": 50, "y2": 90},
            "repspoint": [27, 48],
            "keypoints": [{"x": 10.0, "y": 12.0, "conf": 0.8}, {"x": 11.0, "y": 13.0}]
        }"#;
        let person: PersonObservation = serde_json::from_str(raw).unwrap();
        assert!(person.is_unknown());
        assert_eq!(person.face_id, None);
        assert_eq!(person.keypoints[1].conf, None);
    }
}
