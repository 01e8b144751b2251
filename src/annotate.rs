//! Frame annotation: composes overlay layers onto a BGR frame in place.

use std::sync::Once;

use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
};
use serde::{Deserialize, Serialize};

use crate::person::PersonObservation;
use crate::presence::PresenceTracker;
use crate::skeleton::{SkeletonRenderer, MIN_SKELETON_KEYPOINTS};

const LABEL_FONT: i32 = imgproc::FONT_HERSHEY_COMPLEX_SMALL;

/// Fixed screen position of the reid status banner.
const STATUS_POS: (i32, i32) = (125, 30);

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    /// The observation list contains an element that is not a valid person
    /// observation. Fatal to the call; the caller decides whether to skip
    /// the frame or abort.
    #[error("observation list has unsupported element at index {index}: {reason}")]
    MalformedInput { index: usize, reason: String },

    #[error(transparent)]
    Draw(#[from] opencv::Error),
}

/// Skeleton layer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkeletonOverlay {
    pub enabled: bool,
    pub limb_lines: bool,
    pub keypoint_radius: i32,
}

impl Default for SkeletonOverlay {
    fn default() -> Self {
        Self { enabled: false, limb_lines: false, keypoint_radius: 5 }
    }
}

/// Which identity labels to draw next to each person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityLabels {
    pub track_id: bool,
    pub reid_identity: bool,
    pub face_identity: bool,
}

/// Live counts from the reid stage; a non-zero count switches the matching
/// banner on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReidStatus {
    pub reid_active: usize,
    pub dedup_active: usize,
}

/// Which overlay layers [`FrameAnnotator::annotate`] draws.
///
/// Every toggle is independent and defaults to off; a disabled layer costs
/// nothing. Unknown keys in a deserialized config are rejected outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub show_box: bool,
    pub show_repspoint: bool,
    pub skeleton: SkeletonOverlay,
    pub ids: IdentityLabels,
    pub reid_status: ReidStatus,
}

/// Composes overlay layers onto video frames.
///
/// Holds no per-frame state: each [`annotate`](Self::annotate) call is a
/// function of the frame, the observations, the presence snapshot, and the
/// config. The skeleton capability is injected at construction and checked
/// once, not per call.
pub struct FrameAnnotator {
    skeleton: Option<SkeletonRenderer>,
}

static SKELETON_UNAVAILABLE: Once = Once::new();

impl FrameAnnotator {
    /// `skeleton` is the optional keypoint-drawing capability. Passing
    /// `None` warns once per process and leaves the skeleton layer off for
    /// good; it is never retried or treated as an error.
    pub fn new(skeleton: Option<SkeletonRenderer>) -> Self {
        if skeleton.is_none() {
            SKELETON_UNAVAILABLE.call_once(|| {
                tracing::warn!("no skeleton renderer supplied; skeleton overlay disabled");
            });
        }
        Self { skeleton }
    }

    /// Draw the configured layers for each observation onto `frame`.
    ///
    /// The frame is mutated in place and layers are additive, applied per
    /// person in a fixed order (box, representative point, skeleton,
    /// identity labels), with the reid status banner drawn once per frame
    /// after all persons. An empty observation list is an identity
    /// operation. A malformed observation fails the whole call; partial
    /// drawing is not promised in that case.
    pub fn annotate(
        &self,
        frame: &mut Mat,
        people: &[PersonObservation],
        presence: &PresenceTracker,
        now: f64,
        config: &RenderConfig,
    ) -> Result<(), AnnotateError> {
        if people.is_empty() {
            return Ok(());
        }
        for (index, person) in people.iter().enumerate() {
            if let Err(reason) = person.validate() {
                tracing::error!("annotate: observation list has unsupported element at index {index}: {reason}");
                return Err(AnnotateError::MalformedInput { index, reason });
            }
        }

        for person in people {
            let (x, y) = person.repspoint;

            if config.show_box {
                imgproc::rectangle(frame, person.bbox.rect(), bgr(255.0, 255.0, 0.0), 2, imgproc::LINE_8, 0)?;
            }
            if config.show_repspoint {
                imgproc::circle(frame, Point::new(x, y), 5, bgr(0.0, 0.0, 255.0), -1, imgproc::LINE_8, 0)?;
            }
            if config.skeleton.enabled && person.keypoints.len() >= MIN_SKELETON_KEYPOINTS {
                if let Some(renderer) = &self.skeleton {
                    renderer.draw(
                        frame,
                        &person.keypoints,
                        config.skeleton.keypoint_radius,
                        config.skeleton.limb_lines,
                    )?;
                }
            }
            if config.ids.track_id {
                put_label(frame, &person.track_id.to_string(), Point::new(x - 10, y - 65), bgr(0.0, 0.0, 255.0))?;
            }
            if config.ids.reid_identity {
                let color = if person.is_unknown() { bgr(0.0, 0.0, 255.0) } else { bgr(0.0, 255.0, 0.0) };
                let text = presence.elapsed_label(&person.reid_id, now);
                put_label(frame, &text, Point::new(x - 90, y - 90), color)?;
            }
            if config.ids.face_identity {
                if let Some(face_id) = &person.face_id {
                    put_label(frame, face_id, Point::new(x - 90, y - 350), bgr(255.0, 0.0, 255.0))?;
                }
            }
        }

        for (text, color) in status_banners(&config.reid_status) {
            imgproc::put_text(
                frame,
                text,
                Point::new(STATUS_POS.0, STATUS_POS.1),
                LABEL_FONT,
                1.0,
                color,
                1,
                imgproc::LINE_AA,
                false,
            )?;
        }
        Ok(())
    }
}

/// Banner layers in draw order. Both banners share one screen position, so
/// when reid and dedup are active at once the deduplication banner is drawn
/// last and its color wins.
fn status_banners(status: &ReidStatus) -> Vec<(&'static str, Scalar)> {
    let mut layers = Vec::new();
    if status.reid_active > 0 {
        layers.push(("REIDING", bgr(0.0, 255.0, 255.0)));
    }
    if status.dedup_active > 0 {
        layers.push(("DEDUPLICATING", bgr(0.0, 0.0, 255.0)));
    }
    layers
}

fn put_label(frame: &mut Mat, text: &str, origin: Point, color: Scalar) -> opencv::Result<()> {
    imgproc::put_text(frame, text, origin, LABEL_FONT, 1.0, color, 2, imgproc::LINE_8, false)
}

fn bgr(b: f64, g: f64, r: f64) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}
