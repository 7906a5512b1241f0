use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Xywh};

/// Contains (x,y) of the center and (width,height) of bbox
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(x: f32, y: f32, w: f32, h: f32, confidence: f32, class: i32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            confidence,
            class,
        }
    }

    /// Builds a detection from the left-top-width-height box detectors emit.
    #[inline]
    pub fn from_ltwh(left: f32, top: f32, w: f32, h: f32, confidence: f32, class: i32) -> Self {
        Self {
            x: left + w / 2.,
            y: top + h / 2.,
            w,
            h,
            confidence,
            class,
        }
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox_ltrb().iou(&other.bbox_ltrb())
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Xywh> {
        BBox::xywh(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn bbox_ltrb(&self) -> BBox<Ltrb> {
        BBox::from_center_size(self.x, self.y, self.w, self.h)
    }

    #[inline(always)]
    pub fn xmax(&self) -> f32 {
        self.x + self.w / 2.
    }

    #[inline(always)]
    pub fn ymax(&self) -> f32 {
        self.y + self.h / 2.
    }

    #[inline(always)]
    pub fn xmin(&self) -> f32 {
        self.x - self.w / 2.
    }

    #[inline(always)]
    pub fn ymin(&self) -> f32 {
        self.y - self.h / 2.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ltwh_constructor_centers_the_box() {
        let det = Detection::from_ltwh(10., 20., 30., 40., 0.8, 41);

        assert_abs_diff_eq!(det.x, 25.);
        assert_abs_diff_eq!(det.y, 40.);
        assert_abs_diff_eq!(det.xmin(), 10.);
        assert_abs_diff_eq!(det.ymax(), 60.);
    }

    #[test]
    fn iou_matches_bbox_iou() {
        let a = Detection::new(50., 50., 20., 20., 0.9, 0);
        let b = Detection::new(60., 50., 20., 20., 0.9, 0);

        assert_abs_diff_eq!(a.iou(&b), a.bbox_ltrb().iou(&b.bbox_ltrb()));
        assert_abs_diff_eq!(a.iou(&b), b.iou(&a));
    }
}
