//! Live analytic overlays for people-tracking pipelines.
//!
//! Two components, evaluated once per frame:
//!
//! - [`PresenceTracker`] keeps first-seen/last-seen timestamps per
//!   re-identified person, so labels can show how long each identity has
//!   been around.
//! - [`FrameAnnotator`] composes the requested overlay layers (bounding
//!   boxes, skeleton keypoints, identity labels, reid status banner) onto a
//!   BGR frame in place.
//!
//! Detection, tracking, and re-identification are external: callers feed
//! each frame's [`PersonObservation`] batch into `PresenceTracker::update`
//! and then into `FrameAnnotator::annotate` together with a
//! [`RenderConfig`].

pub mod annotate;
pub mod person;
pub mod presence;
pub mod skeleton;

pub use annotate::{
    AnnotateError, FrameAnnotator, IdentityLabels, ReidStatus, RenderConfig, SkeletonOverlay,
};
pub use person::{BoundingBox, Keypoint, PersonObservation, UNKNOWN_IDENTITY};
pub use presence::{PresenceRecord, PresenceTracker};
pub use skeleton::{SkeletonRenderer, MIN_SKELETON_KEYPOINTS, POSE_KEYPOINTS};
