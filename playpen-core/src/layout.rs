//! Split-pane layout: orientation plus an editor/preview ratio pair that
//! always sums to one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "horizontal" => Some(Self::Horizontal),
            "vertical" => Some(Self::Vertical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub orientation: Orientation,
    pub editor_ratio: f64,
    pub preview_ratio: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            editor_ratio: 0.5,
            preview_ratio: 0.5,
        }
    }
}

impl Layout {
    /// Build a layout, clamping then renormalizing the ratios.
    pub fn new(orientation: Orientation, editor_ratio: f64, preview_ratio: f64) -> Self {
        let (editor_ratio, preview_ratio) = normalize_ratios(editor_ratio, preview_ratio);
        Self {
            orientation,
            editor_ratio,
            preview_ratio,
        }
    }

    /// Merge a partial update into this layout.
    pub fn apply(&self, update: &LayoutUpdate) -> Self {
        Self::new(
            update.orientation.unwrap_or(self.orientation),
            update.editor_ratio.unwrap_or(self.editor_ratio),
            update.preview_ratio.unwrap_or(self.preview_ratio),
        )
    }
}

/// Partial layout change; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutUpdate {
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub editor_ratio: Option<f64>,
    #[serde(default)]
    pub preview_ratio: Option<f64>,
}

impl LayoutUpdate {
    pub fn orientation(orientation: Orientation) -> Self {
        Self {
            orientation: Some(orientation),
            ..Self::default()
        }
    }

    pub fn ratios(editor_ratio: f64, preview_ratio: f64) -> Self {
        Self {
            orientation: None,
            editor_ratio: Some(editor_ratio),
            preview_ratio: Some(preview_ratio),
        }
    }
}

/// Non-finite values count as 0.5, then everything is clamped to [0, 1].
pub fn clamp01(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Clamp each ratio and scale both so they sum to one. A zero pair splits
/// evenly.
pub fn normalize_ratios(editor: f64, preview: f64) -> (f64, f64) {
    let editor = clamp01(editor);
    let preview = clamp01(preview);
    let total = editor + preview;
    if total <= 0.0 {
        return (0.5, 0.5);
    }
    let editor = clamp01(editor / total);
    (editor, 1.0 - editor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(layout: &Layout) {
        assert!((layout.editor_ratio + layout.preview_ratio - 1.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&layout.editor_ratio));
        assert!((0.0..=1.0).contains(&layout.preview_ratio));
    }

    #[test]
    fn test_invariant_holds_for_hostile_inputs() {
        let inputs = [
            -1.0,
            0.0,
            0.25,
            0.5,
            1.0,
            1.5,
            1e300,
            -1e300,
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::MIN_POSITIVE,
        ];
        let mut layout = Layout::default();
        for &e in &inputs {
            for &p in &inputs {
                layout = layout.apply(&LayoutUpdate::ratios(e, p));
                assert_invariant(&layout);
                layout = layout.apply(&LayoutUpdate {
                    editor_ratio: Some(e),
                    ..LayoutUpdate::default()
                });
                assert_invariant(&layout);
                layout = layout.apply(&LayoutUpdate {
                    preview_ratio: Some(p),
                    ..LayoutUpdate::default()
                });
                assert_invariant(&layout);
            }
        }
    }

    #[test]
    fn test_partial_update_renormalizes_proportionally() {
        let layout = Layout::default().apply(&LayoutUpdate {
            editor_ratio: Some(1.0),
            ..LayoutUpdate::default()
        });
        // 1.0 and 0.5 scaled to sum to one
        assert!((layout.editor_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((layout.preview_ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_pair_splits_evenly() {
        assert_eq!(normalize_ratios(0.0, 0.0), (0.5, 0.5));
        assert_eq!(normalize_ratios(-3.0, -3.0), (0.5, 0.5));
    }

    #[test]
    fn test_orientation_update_keeps_ratios() {
        let base = Layout::new(Orientation::Horizontal, 0.3, 0.7);
        let next = base.apply(&LayoutUpdate::orientation(Orientation::Vertical));
        assert_eq!(next.orientation, Orientation::Vertical);
        assert!((next.editor_ratio - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!(Orientation::parse("vertical"), Some(Orientation::Vertical));
        assert_eq!(Orientation::parse("diagonal"), None);
    }
}
