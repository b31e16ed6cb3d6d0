/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("invalid buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Signed access; `None` outside the image.
    #[inline]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<u8> {
        let inside = (0..self.width as i64).contains(&x) && (0..self.height as i64).contains(&y);
        inside.then(|| self.data[y as usize * self.width + x as usize])
    }

    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Owned single-channel 8-bit image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// One captured depth frame: 8-bit inverse distance, `0` = background/invalid.
pub type DepthFrame = GrayImage;

impl GrayImage {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing row-major buffer, checking its length.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        let Some(expected) = width.checked_mul(height) else {
            return Err(ImageError::InvalidDimensions { width, height });
        };
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Signed access; `None` outside the image.
    #[inline]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<u8> {
        self.view().get_checked(x, y)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Largest pixel value and the mean over all pixels.
    pub fn max_and_mean(&self) -> (u8, f64) {
        if self.data.is_empty() {
            return (0, 0.0);
        }
        let mut max = 0u8;
        let mut sum = 0u64;
        for &v in &self.data {
            max = max.max(v);
            sum += v as u64;
        }
        (max, sum as f64 / self.data.len() as f64)
    }
}

/// Bilinear interpolation with pixel centres on integer coordinates.
/// Taps outside the image read as `0`.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let (xf, yf) = (x.floor(), y.floor());
    let (tx, ty) = (x - xf, y - yf);
    let (x0, y0) = (xf as i64, yf as i64);
    let tap = |dx: i64, dy: i64| src.get_checked(x0 + dx, y0 + dy).map_or(0.0, f32::from);

    let top = tap(0, 0) * (1.0 - tx) + tap(1, 0) * tx;
    let bottom = tap(0, 1) * (1.0 - tx) + tap(1, 1) * tx;
    top * (1.0 - ty) + bottom * ty
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_buffer_length() {
        assert!(GrayImage::from_raw(4, 3, vec![0; 12]).is_ok());
        assert_eq!(
            GrayImage::from_raw(4, 3, vec![0; 11]),
            Err(ImageError::InvalidBuffer {
                expected: 12,
                got: 11
            })
        );
    }

    #[test]
    fn bilinear_sample_at_pixel_centre_is_exact() {
        let mut img = GrayImage::new(3, 3);
        img.set(1, 1, 200);
        assert_eq!(sample_bilinear_u8(&img.view(), 1.0, 1.0), 200);
        assert_eq!(sample_bilinear_u8(&img.view(), 1.5, 1.0), 100);
    }

    #[test]
    fn max_and_mean_of_flat_image() {
        let img = GrayImage::filled(4, 4, 10);
        let (max, mean) = img.max_and_mean();
        assert_eq!(max, 10);
        assert!((mean - 10.0).abs() < 1e-12);
    }
}
