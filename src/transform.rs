use crate::error::{GenerateError, Result};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageReader, Rgba, RgbaImage};
use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Noise offsets are `gen_range(0..NOISE_SPAN) - NOISE_OFFSET`, i.e. `[-50, 49]`.
const NOISE_SPAN: i32 = 100;
const NOISE_OFFSET: i32 = 50;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What a finished transform wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

impl TransformReport {
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

/// Decodes `input`, adds per-channel noise, stretches the result to exactly
/// `width` x `height` and writes it to `output` as an uncompressed PNG.
pub fn transform<R: Rng + ?Sized>(
    rng: &mut R,
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
) -> Result<TransformReport> {
    if width == 0 || height == 0 {
        return Err(GenerateError::config(format!(
            "target size {}x{} has a zero dimension",
            width, height
        )));
    }

    let source = decode(input)?;
    log::debug!(
        "{}: decoded {}x{}, resampling to {}x{}",
        input.display(),
        source.width(),
        source.height(),
        width,
        height
    );

    let noisy = add_noise(rng, &source);
    drop(source);
    let resized = resample(&noisy, width, height);
    drop(noisy);

    write_png(&resized, output)
}

/// Encodes `image` to `output` and reports the size of what landed on disk.
pub fn write_png(image: &RgbaImage, output: &Path) -> Result<TransformReport> {
    encode_png(image, output)?;
    let bytes = fs::metadata(output)
        .map_err(|source| GenerateError::Stat {
            path: output.to_path_buf(),
            source,
        })?
        .len();

    Ok(TransformReport {
        output: output.to_path_buf(),
        width: image.width(),
        height: image.height(),
        bytes,
    })
}

/// Reads any supported raster format, normalised to 8-bit RGBA.
pub fn decode(input: &Path) -> Result<RgbaImage> {
    let decode_error = |source: ImageError| GenerateError::Decode {
        path: input.to_path_buf(),
        source,
    };
    let image = ImageReader::open(input)
        .map_err(|err| decode_error(ImageError::IoError(err)))?
        .with_guessed_format()
        .map_err(|err| decode_error(ImageError::IoError(err)))?
        .decode()
        .map_err(decode_error)?;
    Ok(image.into_rgba8())
}

/// Returns a copy of `source` with uniform noise in `[-50, 49]` added to the
/// red, green and blue channels. Alpha is left untouched.
pub fn add_noise<R: Rng + ?Sized>(rng: &mut R, source: &RgbaImage) -> RgbaImage {
    let mut noisy = RgbaImage::new(source.width(), source.height());

    for (x, y, pixel) in noisy.enumerate_pixels_mut() {
        let Rgba([r, g, b, a]) = *source.get_pixel(x, y);
        *pixel = Rgba([
            jitter(rng, r),
            jitter(rng, g),
            jitter(rng, b),
            a,
        ]);
    }

    noisy
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, channel: u8) -> u8 {
    clamp_channel(channel as i32 + rng.gen_range(0..NOISE_SPAN) - NOISE_OFFSET)
}

pub fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

/// Catmull-Rom resample onto a fresh `width` x `height` canvas.
///
/// Aspect ratio is not preserved: the image is stretched to fill the target.
/// The canvas starts fully transparent, so compositing the resampled image
/// over it yields the resampled image itself.
pub fn resample(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width, height, FilterType::CatmullRom)
}

/// Writes `image` as an RGBA PNG with no deflate compression and no row
/// filtering.
pub fn encode_png(image: &RgbaImage, output: &Path) -> Result<()> {
    let encode_error = |source: ImageError| GenerateError::Encode {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(|err| encode_error(ImageError::IoError(err)))?;
    let mut writer = BufWriter::new(file);

    PngEncoder::new_with_quality(&mut writer, CompressionType::Uncompressed, PngFilter::NoFilter)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(encode_error)?;

    writer
        .flush()
        .map_err(|err| encode_error(ImageError::IoError(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_clamp_channel() {
        assert_eq!(clamp_channel(-50), 0);
        assert_eq!(clamp_channel(0), 0);
        assert_eq!(clamp_channel(128), 128);
        assert_eq!(clamp_channel(255), 255);
        assert_eq!(clamp_channel(304), 255);
        assert_eq!(clamp_channel(i32::MIN), 0);
        assert_eq!(clamp_channel(i32::MAX), 255);
    }

    #[test]
    fn test_clamp_channel_is_monotonic() {
        let mut previous = clamp_channel(-100);
        for value in -99..400 {
            let current = clamp_channel(value);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_noise_stays_within_offset() {
        let mut rng = StdRng::seed_from_u64(1);
        let source = solid(64, 64, [128, 128, 128, 255]);
        let noisy = add_noise(&mut rng, &source);

        assert_eq!(noisy.dimensions(), source.dimensions());
        for pixel in noisy.pixels() {
            for &channel in &pixel.0[..3] {
                assert!((78..=177).contains(&channel), "channel {}", channel);
            }
        }
    }

    #[test]
    fn test_noise_actually_varies_channels() {
        let mut rng = StdRng::seed_from_u64(2);
        let source = solid(32, 32, [128, 128, 128, 255]);
        let noisy = add_noise(&mut rng, &source);

        let distinct: std::collections::HashSet<u8> = noisy.pixels().map(|p| p.0[0]).collect();
        assert!(distinct.len() > 50);

        let mean = noisy.pixels().map(|p| p.0[1] as f64).sum::<f64>() / (32.0 * 32.0);
        assert!((mean - 127.5).abs() < 5.0, "mean {}", mean);
    }

    #[test]
    fn test_noise_preserves_alpha() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut source = RgbaImage::new(16, 16);
        for (x, y, pixel) in source.enumerate_pixels_mut() {
            *pixel = Rgba([x as u8 * 16, y as u8 * 16, 7, (x * 16 + y) as u8]);
        }
        let noisy = add_noise(&mut rng, &source);

        for (x, y, pixel) in noisy.enumerate_pixels() {
            assert_eq!(pixel.0[3], source.get_pixel(x, y).0[3]);
        }
    }

    #[test]
    fn test_noise_clamps_at_extremes() {
        let mut rng = StdRng::seed_from_u64(4);
        let black = add_noise(&mut rng, &solid(20, 20, [0, 0, 0, 255]));
        let white = add_noise(&mut rng, &solid(20, 20, [255, 255, 255, 255]));

        assert!(black.pixels().all(|p| p.0[..3].iter().all(|&c| c <= 49)));
        assert!(white.pixels().all(|p| p.0[..3].iter().all(|&c| c >= 205)));
        assert!(black.pixels().any(|p| p.0[0] == 0));
        assert!(white.pixels().any(|p| p.0[0] == 255));
    }

    #[test]
    fn test_resample_matches_target_size() {
        let source = solid(100, 40, [10, 20, 30, 255]);
        for &(width, height) in &[(1, 1), (300, 17), (50, 200), (100, 40)] {
            assert_eq!(resample(&source, width, height).dimensions(), (width, height));
        }
    }

    #[test]
    fn test_resample_stretches_without_keeping_aspect() {
        let mut source = solid(40, 40, [255, 0, 0, 255]);
        draw_filled_rect_mut(
            &mut source,
            Rect::at(20, 0).of_size(20, 40),
            Rgba([0, 0, 255, 255]),
        );

        let resized = resample(&source, 200, 10);
        let left = resized.get_pixel(5, 5).0;
        let right = resized.get_pixel(194, 5).0;
        assert!(left[0] > 250 && left[2] < 5, "{:?}", left);
        assert!(right[2] > 250 && right[0] < 5, "{:?}", right);
    }

    #[test]
    fn test_encode_png_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut rng = StdRng::seed_from_u64(5);
        let image = add_noise(&mut rng, &solid(33, 21, [90, 160, 220, 200]));

        encode_png(&image, &path).unwrap();
        let decoded = image::open(&path).unwrap();

        assert_eq!(decoded.color(), image::ColorType::Rgba8);
        assert_eq!(decoded.into_rgba8(), image);
    }

    #[test]
    fn test_encode_png_is_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        let image = solid(64, 64, [0, 0, 0, 255]);

        encode_png(&image, &path).unwrap();

        // A flat image would deflate to almost nothing if compression were on.
        let raw = 64 * 64 * 4;
        assert!(fs::metadata(&path).unwrap().len() > raw);
    }

    #[test]
    fn test_encode_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.png");
        let err = encode_png(&solid(2, 2, [0, 0, 0, 0]), &path).unwrap_err();
        assert_eq!(err.step(), "encode");
    }

    #[test]
    fn test_transform_red_square() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("red.png");
        let output = dir.path().join("red_out.png");
        solid(100, 100, [255, 0, 0, 255]).save(&input).unwrap();

        let mut rng = StdRng::seed_from_u64(6);
        let width = crate::dimension::randomize(&mut rng, 200).unwrap();
        let height = crate::dimension::randomize(&mut rng, 200).unwrap();
        let report = transform(&mut rng, &input, &output, width, height).unwrap();

        assert_eq!((report.width, report.height), (width, height));
        assert_eq!(report.bytes, fs::metadata(&output).unwrap().len());
        assert!(report.size_mb() > 0.0);

        let result = image::open(&output).unwrap().into_rgba8();
        assert_eq!(result.dimensions(), (width, height));
        assert!((100..=300).contains(&width) && (100..=300).contains(&height));

        let count = (width * height) as f64;
        let mean = |c: usize| result.pixels().map(|p| p.0[c] as f64).sum::<f64>() / count;
        assert!(mean(0) > 200.0, "red mean {}", mean(0));
        assert!(mean(1) < 40.0, "green mean {}", mean(1));
        assert!(mean(2) < 40.0, "blue mean {}", mean(2));
        assert!(result.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_transform_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        let output = dir.path().join("notes_out.png");
        fs::write(&input, "definitely not pixels").unwrap();

        let mut rng = StdRng::seed_from_u64(8);
        let err = transform(&mut rng, &input, &output, 10, 10).unwrap_err();

        assert!(matches!(err, GenerateError::Decode { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_transform_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let err = transform(
            &mut rng,
            &dir.path().join("missing.png"),
            &dir.path().join("out.png"),
            10,
            10,
        )
        .unwrap_err();
        assert_eq!(err.step(), "decode");
    }

    #[test]
    fn test_transform_rejects_zero_target() {
        let mut rng = StdRng::seed_from_u64(10);
        let err = transform(&mut rng, Path::new("a.png"), Path::new("b.png"), 0, 5).unwrap_err();
        assert_eq!(err.step(), "config");
    }
}
