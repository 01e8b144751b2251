//! Pose skeleton overlay in the COCO-17 keypoint layout.

use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
    prelude::*,
};

use crate::person::Keypoint;

/// Minimum keypoint count for an observation to get a skeleton overlay.
pub const MIN_SKELETON_KEYPOINTS: usize = 15;

/// Keypoint count of a full COCO pose; limb lines are only drawn for these.
pub const POSE_KEYPOINTS: usize = 17;

/// Keypoints below this confidence are not drawn.
const MIN_KEYPOINT_CONF: f32 = 0.5;

/// Limb connections between COCO-17 keypoint indices: legs, hips-torso,
/// shoulders-arms, then face.
const SKELETON: [[usize; 2]; 19] = [
    [15, 13],
    [13, 11],
    [16, 14],
    [14, 12],
    [11, 12],
    [5, 11],
    [6, 12],
    [5, 6],
    [5, 7],
    [6, 8],
    [7, 9],
    [8, 10],
    [1, 2],
    [0, 1],
    [0, 2],
    [1, 3],
    [2, 4],
    [3, 5],
    [4, 6],
];

/// Pose palette index per limb: legs orange, torso light blue, arms/face
/// per the ultralytics convention.
const LIMB_COLOR_INDICES: [usize; 19] = [9, 9, 9, 9, 7, 7, 7, 0, 0, 0, 0, 0, 16, 16, 16, 16, 16, 16, 16];

/// Pose palette index per keypoint.
const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 0, 0, 0, 0, 0, 0, 9, 9, 9, 9, 9, 9];

/// Ultralytics pose palette, RGB.
const POSE_PALETTE: [[u8; 3]; 20] = [
    [255, 128, 0],
    [255, 153, 51],
    [255, 178, 102],
    [230, 230, 0],
    [255, 153, 255],
    [153, 204, 255],
    [255, 102, 255],
    [255, 51, 255],
    [102, 178, 255],
    [51, 153, 255],
    [255, 153, 153],
    [255, 102, 102],
    [255, 51, 51],
    [153, 255, 153],
    [102, 255, 102],
    [51, 255, 51],
    [0, 255, 0],
    [0, 0, 255],
    [255, 0, 0],
    [255, 255, 255],
];

fn palette_bgr(index: usize) -> Scalar {
    let [r, g, b] = POSE_PALETTE[index % POSE_PALETTE.len()];
    Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

/// Models emit negative or exact-edge coordinates for undetected landmarks;
/// a coordinate is only usable when non-negative and not an exact multiple
/// of the frame bound.
fn coord_set(v: f32, bound: i32) -> bool {
    v >= 0.0 && v % bound as f32 != 0.0
}

fn confident(k: &Keypoint) -> bool {
    k.conf.map_or(true, |c| c >= MIN_KEYPOINT_CONF)
}

/// Draws pose keypoints and limb lines onto frames.
///
/// This is the annotator's optional capability: a [`crate::FrameAnnotator`]
/// built without one skips the skeleton layer entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletonRenderer;

impl SkeletonRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Draw `keypoints` onto `frame`. Limb lines are only drawn for full
    /// 17-point poses; keypoint sets of other sizes get circles with
    /// cycling palette colors.
    pub fn draw(
        &self,
        frame: &mut Mat,
        keypoints: &[Keypoint],
        radius: i32,
        limb_lines: bool,
    ) -> opencv::Result<()> {
        let (w, h) = (frame.cols(), frame.rows());
        let is_pose = keypoints.len() == POSE_KEYPOINTS;

        for (i, k) in keypoints.iter().enumerate() {
            if !coord_set(k.x, w) || !coord_set(k.y, h) || !confident(k) {
                continue;
            }
            let color = if is_pose { palette_bgr(KPT_COLOR_INDICES[i]) } else { palette_bgr(i) };
            imgproc::circle(
                frame,
                Point::new(k.x as i32, k.y as i32),
                radius,
                color,
                -1,
                imgproc::LINE_AA,
                0,
            )?;
        }

        if limb_lines && is_pose {
            for (i, pair) in SKELETON.iter().enumerate() {
                let (a, b) = (&keypoints[pair[0]], &keypoints[pair[1]]);
                if !confident(a) || !confident(b) {
                    continue;
                }
                if !coord_set(a.x, w) || !coord_set(a.y, h) {
                    continue;
                }
                if !coord_set(b.x, w) || !coord_set(b.y, h) {
                    continue;
                }
                imgproc::line(
                    frame,
                    Point::new(a.x as i32, a.y as i32),
                    Point::new(b.x as i32, b.y as i32),
                    palette_bgr(LIMB_COLOR_INDICES[i]),
                    2,
                    imgproc::LINE_AA,
                    0,
                )?;
            }
        }
        Ok(())
    }
}
