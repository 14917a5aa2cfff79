//! Visual overlay model
//!
//! Reduces the latest frame analysis to lightweight annotations (labels
//! and counts) for a transparent canvas aligned to the video element.
//! Rendering itself is the host's concern; this is only the data model.

use crate::remote::SceneAnalysis;

/// One annotation drawn on the overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Short label
    pub label: String,
    /// Optional detail line
    pub detail: Option<String>,
}

/// Latest-analysis overlay state
#[derive(Debug, Clone, Default)]
pub struct OverlayModel {
    visible: bool,
    summary: Option<String>,
    annotations: Vec<Annotation>,
}

impl OverlayModel {
    /// Create a hidden, empty overlay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the overlay contents with a fresh analysis and show it
    pub fn update(&mut self, analysis: &SceneAnalysis) {
        self.summary = Some(analysis.summary.clone());
        self.annotations.clear();

        if let Some(objects) = &analysis.objects {
            for label in objects {
                self.annotations.push(Annotation {
                    label: label.clone(),
                    detail: None,
                });
            }
        }
        if let Some(people) = &analysis.people {
            if !people.is_empty() {
                self.annotations.push(Annotation {
                    label: format!(
                        "{} {}",
                        people.len(),
                        if people.len() == 1 { "person" } else { "people" }
                    ),
                    detail: Some(people.join(", ")),
                });
            }
        }
        if let Some(mood) = &analysis.mood {
            self.annotations.push(Annotation {
                label: "mood".to_string(),
                detail: Some(mood.clone()),
            });
        }

        self.visible = true;
    }

    /// Hide the overlay, keeping nothing stale behind it
    pub fn hide(&mut self) {
        self.visible = false;
        self.summary = None;
        self.annotations.clear();
    }

    /// Whether the overlay is currently shown
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Scene summary from the latest analysis
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Current annotations
    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}
