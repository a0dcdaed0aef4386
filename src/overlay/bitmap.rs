// Hint image decoding and composition into a screen-sized BGRA frame

use image::imageops::{self, FilterType};
use image::{ImageReader, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("cannot open image {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("image {} has no pixels", .path.display())]
    Empty { path: PathBuf },
}

/// Decode the image at `path`, guessing the format from its contents.
pub fn load_image(path: &Path) -> Result<RgbaImage, ImageLoadError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| ImageLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let decoded = reader.decode().map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let image = decoded.into_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageLoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "hint image loaded"
    );
    Ok(image)
}

/// Where the scaled image lands inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale `(width, height)` to fit `(area_w, area_h)` keeping the aspect
/// ratio, centered.
pub fn fit_centered(source: (u32, u32), area: (u32, u32)) -> Placement {
    let (src_w, src_h) = source;
    let (area_w, area_h) = area;
    if src_w == 0 || src_h == 0 || area_w == 0 || area_h == 0 {
        return Placement {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    }

    let scale = f64::min(
        f64::from(area_w) / f64::from(src_w),
        f64::from(area_h) / f64::from(src_h),
    );
    let width = ((f64::from(src_w) * scale).round() as u32).clamp(1, area_w);
    let height = ((f64::from(src_h) * scale).round() as u32).clamp(1, area_h);

    Placement {
        x: (area_w - width) / 2,
        y: (area_h - height) / 2,
        width,
        height,
    }
}

/// Build a top-down, premultiplied BGRA frame of `width` x `height` with the
/// image fitted and centered. Letterbox pixels are fully transparent.
pub fn compose_frame(image: &RgbaImage, width: u32, height: u32) -> Vec<u8> {
    let mut frame = vec![0u8; width as usize * height as usize * 4];
    let placement = fit_centered(image.dimensions(), (width, height));
    if placement.width == 0 || placement.height == 0 {
        return frame;
    }

    let scaled;
    let source = if image.dimensions() == (placement.width, placement.height) {
        image
    } else {
        scaled = imageops::resize(image, placement.width, placement.height, FilterType::Triangle);
        &scaled
    };

    let stride = width as usize * 4;
    for (row, line) in source.rows().enumerate() {
        let start = (placement.y as usize + row) * stride + placement.x as usize * 4;
        let dest = &mut frame[start..start + placement.width as usize * 4];
        for (px, out) in line.zip(dest.chunks_exact_mut(4)) {
            let [r, g, b, a] = px.0;
            out.copy_from_slice(&[premultiply(b, a), premultiply(g, a), premultiply(r, a), a]);
        }
    }
    frame
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((u32::from(channel) * u32::from(alpha) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn wide_image_is_letterboxed_vertically() {
        let placement = fit_centered((100, 50), (1920, 1080));
        assert_eq!(
            placement,
            Placement {
                x: 0,
                y: 60,
                width: 1920,
                height: 960
            }
        );
    }

    #[test]
    fn tall_image_is_centered_horizontally() {
        let placement = fit_centered((50, 100), (1000, 500));
        assert_eq!(
            placement,
            Placement {
                x: 375,
                y: 0,
                width: 250,
                height: 500
            }
        );
    }

    #[test]
    fn small_image_is_scaled_up() {
        let placement = fit_centered((16, 9), (1600, 900));
        assert_eq!((placement.width, placement.height), (1600, 900));
        assert_eq!((placement.x, placement.y), (0, 0));
    }

    #[test]
    fn empty_area_gives_empty_placement() {
        assert_eq!(fit_centered((10, 10), (0, 100)).width, 0);
    }

    #[test]
    fn frame_has_transparent_margins_and_premultiplied_pixels() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([200, 100, 50, 128]));

        // 2x1 in a 2x3 frame: the image occupies the middle row.
        let frame = compose_frame(&image, 2, 3);
        assert_eq!(frame.len(), 2 * 3 * 4);
        assert!(frame[..8].iter().all(|&b| b == 0));
        assert!(frame[16..].iter().all(|&b| b == 0));

        assert_eq!(&frame[8..12], &[0, 0, 255, 255]);
        assert_eq!(&frame[12..16], &[25, 50, 100, 128]);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempdir().unwrap();
        let err = load_image(&dir.path().join("hint.png")).unwrap_err();
        assert!(matches!(err, ImageLoadError::Open { .. }));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hint.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ImageLoadError::Decode { .. }));
    }

    #[test]
    fn png_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hint.png");
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        image.save(&path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }
}
