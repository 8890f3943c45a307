use api::FaceShapeCategory;
use std::collections::VecDeque;

use crate::config::FaceShapeThresholds;
use crate::geometry::FaceShapeRatios;

/// Map measured ratios to a category. Rules are checked in order and the first
/// match wins; anything unmatched (including NaN input) is oval.
pub fn classify(ratios: &FaceShapeRatios, thresholds: &FaceShapeThresholds) -> FaceShapeCategory {
    let FaceShapeRatios {
        face_width,
        face_length,
        jaw_width,
    } = *ratios;

    if face_length / face_width >= thresholds.rectangular_ratio {
        FaceShapeCategory::Rectangular
    } else if (face_length - face_width).abs() < thresholds.round_tolerance * face_length {
        FaceShapeCategory::Round
    } else if jaw_width > thresholds.square_jaw_ratio * face_width {
        FaceShapeCategory::Square
    } else if jaw_width < thresholds.triangular_jaw_ratio * face_width {
        FaceShapeCategory::Triangular
    } else {
        FaceShapeCategory::Oval
    }
}

/// Majority vote over the last `window` classifications.
///
/// Ties go to the most recent of the tied categories. A window of 1 passes
/// every classification straight through.
#[derive(Debug, Clone)]
pub struct FaceShapeVote {
    window: usize,
    history: VecDeque<FaceShapeCategory>,
}

impl FaceShapeVote {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, category: FaceShapeCategory) -> FaceShapeCategory {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(category);

        let mut best = category;
        let mut best_count = 0;
        // Walk newest first so ties resolve to the latest reading.
        for candidate in self.history.iter().rev() {
            let count = self.history.iter().filter(|c| *c == candidate).count();
            if count > best_count {
                best = *candidate;
                best_count = count;
            }
        }
        best
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
