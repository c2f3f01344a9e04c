//! Block-replication upscaling of exported images, e.g. to turn 28x28 samples into
//! frames big enough for a video.

use crate::error::{GanError, Result};
use image::{DynamicImage, GrayImage, Luma};
use ndarray::linalg::kron;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a directory pass.
#[derive(Debug, Default)]
pub struct UpscaleSummary {
    pub processed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, GanError)>,
}

/// Single-channel view of an image: the mean of all decoded channels, in [0, 1].
pub fn to_grayscale(img: &DynamicImage) -> Array2<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let channels = img.color().channel_count() as usize;
    let raw: Vec<f32> = match channels {
        1 => img.to_luma32f().into_raw(),
        2 => img.to_luma_alpha32f().into_raw(),
        3 => img.to_rgb32f().into_raw(),
        _ => img.to_rgba32f().into_raw(),
    };
    let channels = channels.clamp(1, 4);
    Array2::from_shape_fn((h, w), |(r, c)| {
        let start = (r * w + c) * channels;
        raw[start..start + channels].iter().sum::<f32>() / channels as f32
    })
}

/// Kronecker expansion: every pixel becomes an `n` x `m` block of itself.
pub fn upscale(pixels: &Array2<f32>, n: usize, m: usize) -> Array2<f32> {
    kron(pixels, &Array2::ones((n, m)))
}

/// Map values to 8-bit gray, darkest value to 0 and brightest to 255.
pub fn to_gray_image(pixels: &Array2<f32>) -> GrayImage {
    let (h, w) = pixels.dim();
    let lo = pixels.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = pixels.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = hi - lo;
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = pixels[(y as usize, x as usize)];
        let level = if span > 0.0 { (v - lo) / span * 255.0 } else { 0.0 };
        Luma([level.round() as u8])
    })
}

/// Upscale one image file in place.
pub fn upscale_file(path: &Path, n: usize, m: usize) -> Result<()> {
    if n == 0 || m == 0 {
        return Err(GanError::InvalidInput(format!(
            "upscale factors must be positive, got ({n}, {m})"
        )));
    }
    let img = image::open(path)?;
    let gray = to_grayscale(&img);
    to_gray_image(&upscale(&gray, n, m)).save(path)?;
    Ok(())
}

/// Upscale every file of `dir` in place. Failures are collected per file.
pub fn upscale_dir(dir: impl AsRef<Path>, n: usize, m: usize) -> Result<UpscaleSummary> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let results: Vec<(PathBuf, Result<()>)> = paths
        .into_par_iter()
        .map(|path| {
            let result = upscale_file(&path, n, m);
            (path, result)
        })
        .collect();

    let mut summary = UpscaleSummary::default();
    for (path, result) in results {
        match result {
            Ok(()) => summary.processed.push(path),
            Err(e) => summary.failures.push((path, e)),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use proptest::prelude::*;

    #[test]
    fn factor_one_is_identity() {
        let pixels = array![[0.1, 0.5], [0.9, 0.3], [0.0, 1.0]];
        assert_eq!(upscale(&pixels, 1, 1), pixels);
    }

    #[test]
    fn grayscale_averages_channels() {
        let mut rgb = RgbImage::new(1, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert!((gray[(0, 0)] - 1.0 / 3.0).abs() < 1e-6);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn blocks_repeat_source_pixel(h in 1usize..6, w in 1usize..6, n in 1usize..5, m in 1usize..5) {
            let pixels = Array2::from_shape_fn((h, w), |(r, c)| (r * w + c) as f32);
            let big = upscale(&pixels, n, m);
            prop_assert_eq!(big.dim(), (n * h, m * w));
            for ((r, c), &v) in big.indexed_iter() {
                prop_assert_eq!(v, pixels[(r / n, c / m)]);
            }
        }
    }

    #[test]
    fn directory_pass_reports_bad_files_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(1, 1, Luma([200]));
        img.save(dir.path().join("im0.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let summary = upscale_dir(dir.path(), 2, 3).unwrap();
        assert_eq!(summary.processed, vec![dir.path().join("im0.png")]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, dir.path().join("notes.txt"));

        let out = image::open(dir.path().join("im0.png")).unwrap().to_luma8();
        assert_eq!(out.dimensions(), (9, 4));
        // the bright source pixel became a 3x2 block
        assert_eq!(out.get_pixel(3, 2)[0], 255);
        assert_eq!(out.get_pixel(5, 3)[0], 255);
        assert_eq!(out.get_pixel(2, 2)[0], 0);
    }
}
