use crate::{traits::ContourSelector, types::Contour};

/// Keeps the contour with the most vertices, a stand-in for the largest one.
/// Ties go to the contour traced first.
#[derive(Debug, Clone, Default)]
pub struct MostVerticesSelector;

impl ContourSelector for MostVerticesSelector {
    fn select(&self, contours: Vec<Contour>) -> Option<Contour> {
        let mut best: Option<Contour> = None;
        for contour in contours {
            if best.as_ref().is_none_or(|kept| contour.len() > kept.len()) {
                best = Some(contour);
            }
        }
        best
    }
}
