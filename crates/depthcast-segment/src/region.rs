use depthcast_core::GrayImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Pixel value of member pixels in [`LabelMask::data`].
pub const MASK_ON: u8 = 255;

/// Inclusive pixel bounds of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min + 1
    }
}

/// One discovered region.
///
/// `data` is a full-frame binary buffer (`MASK_ON` for members, `0`
/// elsewhere); the region's identity lives in `region_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelMask {
    pub region_id: u32,
    pub width: usize,
    pub height: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub area: usize,
    /// Centroid of the member pixels.
    pub center: Point2<f32>,
    pub bbox: BoundingBox,
}

impl LabelMask {
    /// Build a mask from member pixel indices (row-major, `width`-strided).
    ///
    /// Returns `None` for an empty pixel list.
    pub fn from_indices(
        region_id: u32,
        width: usize,
        height: usize,
        pixels: &[usize],
    ) -> Option<Self> {
        let first = *pixels.first()?;
        let mut data = vec![0u8; width * height];
        let mut bbox = BoundingBox {
            x_min: first % width,
            y_min: first / width,
            x_max: first % width,
            y_max: first / width,
        };
        let (mut sx, mut sy) = (0u64, 0u64);

        for &idx in pixels {
            data[idx] = MASK_ON;
            let (x, y) = (idx % width, idx / width);
            sx += x as u64;
            sy += y as u64;
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }

        let n = pixels.len() as f64;
        Some(Self {
            region_id,
            width,
            height,
            data,
            area: pixels.len(),
            center: Point2::new((sx as f64 / n) as f32, (sy as f64 / n) as f32),
            bbox,
        })
    }

    /// Build a mask from any image; non-zero pixels are members.
    pub fn from_gray(region_id: u32, img: &GrayImage) -> Option<Self> {
        let pixels: Vec<usize> = img
            .data
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v != 0).then_some(i))
            .collect();
        Self::from_indices(region_id, img.width, img.height, &pixels)
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    /// Row-major indices of member pixels.
    pub fn pixel_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v != 0).then_some(i))
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }
}

/// Result of one segmentation pass, in discovery (raster) order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionList {
    pub width: usize,
    pub height: usize,
    pub regions: Vec<LabelMask>,
    /// Regions that met `min_area` but arrived after the cap was reached.
    pub dropped: usize,
    /// Regions discarded for being smaller than `min_area`.
    pub undersized: usize,
    /// Pixel tests performed (raster scan plus neighbour checks).
    pub visited: usize,
}

impl RegionList {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelMask> {
        self.regions.iter()
    }

    pub fn total_area(&self) -> usize {
        self.regions.iter().map(|m| m.area).sum()
    }

    /// Largest region by area; the earliest wins ties.
    pub fn largest(&self) -> Option<&LabelMask> {
        self.regions
            .iter()
            .fold(None, |best: Option<&LabelMask>, m| match best {
                Some(b) if b.area >= m.area => Some(b),
                _ => Some(m),
            })
    }

    /// One image holding every region, each pixel set to its region id
    /// (saturating at 255).
    pub fn label_image(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for mask in &self.regions {
            let id = mask.region_id.min(u8::MAX as u32) as u8;
            for idx in mask.pixel_indices() {
                out.data[idx] = id;
            }
        }
        out
    }

    /// Union of all regions as a binary mask.
    pub fn union_mask(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for mask in &self.regions {
            for idx in mask.pixel_indices() {
                out.data[idx] = MASK_ON;
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a RegionList {
    type Item = &'a LabelMask;
    type IntoIter = std::slice::Iter<'a, LabelMask>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
