use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Stable key the appearance backend assigns to a tracked object.
pub type TrackId = u32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: TrackId,
    pub confirmed: bool,
    pub class: i32,
    pub confidence: f32,
    pub bbox: BBox<Ltrb>,
}
