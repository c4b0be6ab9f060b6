use image::{imageops, imageops::FilterType, RgbImage};

use crate::engine::ClassifyError;

/// Memory layout of the model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, height, width, 3]`, the Keras default.
    #[default]
    Nhwc,
    /// `[1, 3, height, width]`.
    Nchw,
}

/// Resizes `image` to `size` x `size`, scales channels into `[0, 1]` and lays
/// the result out as a batch of one.
pub(crate) fn image_to_tensor(
    image: &RgbImage,
    size: u32,
    layout: TensorLayout,
) -> Result<(Vec<usize>, Vec<f32>), ClassifyError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifyError::InvalidInput("empty image".into()));
    }

    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let side = size as usize;
    let mut data = vec![0.0f32; side * side * 3];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            let idx = match layout {
                TensorLayout::Nhwc => (y * side + x) * 3 + c,
                TensorLayout::Nchw => c * side * side + y * side + x,
            };
            data[idx] = value;
        }
    }

    let shape = match layout {
        TensorLayout::Nhwc => vec![1, side, side, 3],
        TensorLayout::Nchw => vec![1, 3, side, side],
    };
    Ok((shape, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_nhwc_layout() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 51]));
        let (shape, data) = image_to_tensor(&image, 2, TensorLayout::Nhwc).unwrap();
        assert_eq!(shape, vec![1, 2, 2, 3]);
        assert_eq!(data.len(), 12);
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert!(data[1].abs() < 1e-6);
        assert!((data[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_nchw_layout() {
        let image = RgbImage::from_pixel(3, 3, Rgb([255, 0, 51]));
        let (shape, data) = image_to_tensor(&image, 2, TensorLayout::Nchw).unwrap();
        assert_eq!(shape, vec![1, 3, 2, 2]);
        assert!(data[..4].iter().all(|v| (v - 1.0).abs() < 1e-6));
        assert!(data[4..8].iter().all(|v| v.abs() < 1e-6));
        assert!(data[8..].iter().all(|v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let image = RgbImage::new(0, 0);
        assert!(matches!(
            image_to_tensor(&image, 224, TensorLayout::Nhwc),
            Err(ClassifyError::InvalidInput(_))
        ));
    }
}
