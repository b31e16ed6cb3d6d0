//! Region-growing segmentation of 8-bit depth frames.
//!
//! A depth frame stores inverse distance per pixel (`0` = nothing seen).
//! [`segment`] splits it into at most `max_objects` connected regions whose
//! neighbouring depths change smoothly and whose pixels stay close to the
//! region's running mean depth.
//!
//! ```
//! use depthcast_core::GrayImage;
//! use depthcast_segment::{segment, SegmentationParams};
//!
//! let mut frame = GrayImage::new(64, 48);
//! for y in 10..30 {
//!     for x in 10..30 {
//!         frame.set(x, y, 200);
//!     }
//! }
//! let params = SegmentationParams {
//!     min_area: 50,
//!     ..SegmentationParams::default()
//! };
//! let regions = segment(&frame.view(), &params);
//! assert_eq!(regions.len(), 1);
//! assert_eq!(regions.regions[0].area, 400);
//! ```

mod grow;
mod params;
mod region;

pub use grow::segment;
pub use params::{SegmentationParams, SegmentationParamsError, TraversalMode};
pub use region::{BoundingBox, LabelMask, RegionList, MASK_ON};
