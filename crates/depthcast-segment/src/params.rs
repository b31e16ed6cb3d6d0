use serde::{Deserialize, Serialize};

/// How a region is flooded from its seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalMode {
    /// Full 4-connected depth-first flood on an explicit stack. Every
    /// neighbour of every accepted pixel is examined.
    #[default]
    Recursive,
    /// Work-list flood where each entry remembers the direction it was
    /// reached from and never looks back that way.
    IterativeDirected,
}

/// Thresholds for one segmentation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Largest depth step allowed between two adjacent accepted pixels.
    pub z_limit: u8,
    /// Pixels at or below this value are background.
    pub min_distance: u8,
    /// Largest deviation allowed from the region's running mean depth.
    pub medium_limit: u8,
    /// Regions with fewer pixels are discarded.
    pub min_area: usize,
    /// Upper bound on the number of returned regions.
    pub max_objects: usize,
    pub traversal: TraversalMode,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            z_limit: 10,
            min_distance: 30,
            medium_limit: 20,
            min_area: 1000,
            max_objects: 10,
            traversal: TraversalMode::Recursive,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SegmentationParamsError {
    #[error("max_objects must be at least 1")]
    ZeroMaxObjects,
    #[error("min_distance={0} leaves no foreground values")]
    NoForeground(u8),
}

impl SegmentationParams {
    pub fn validate(&self) -> Result<(), SegmentationParamsError> {
        if self.max_objects == 0 {
            return Err(SegmentationParamsError::ZeroMaxObjects);
        }
        if self.min_distance == u8::MAX {
            return Err(SegmentationParamsError::NoForeground(self.min_distance));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SegmentationParams::default().validate(), Ok(()));
    }

    #[test]
    fn zero_cap_is_rejected() {
        let params = SegmentationParams {
            max_objects: 0,
            ..SegmentationParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(SegmentationParamsError::ZeroMaxObjects)
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: SegmentationParams =
            serde_json::from_str(r#"{"z_limit": 4, "traversal": "iterative-directed"}"#)
                .expect("parse");
        assert_eq!(params.z_limit, 4);
        assert_eq!(params.traversal, TraversalMode::IterativeDirected);
        assert_eq!(params.min_area, SegmentationParams::default().min_area);
    }
}
