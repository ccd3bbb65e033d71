use thiserror::Error;

/// Failures in template matching and calibration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisionError {
    #[error("template is empty")]
    EmptyTemplate,

    #[error("template has no contrast")]
    FlatTemplate,

    #[error("template {template:?} is larger than frame {frame:?}")]
    TemplateTooLarge {
        template: (u32, u32),
        frame: (u32, u32),
    },

    #[error("minimap landmark not found (best score {score:.3} < {threshold:.3})")]
    LandmarkNotFound { score: f64, threshold: f64 },

    #[error("minimap region {top_left:?}..{bottom_right:?} does not fit frame {frame:?}")]
    MinimapOutOfFrame {
        top_left: (u32, u32),
        bottom_right: (u32, u32),
        frame: (u32, u32),
    },
}
