use crate::batch;
use crate::error::{GenerateError, Result};
use crate::transform::{self, TransformReport};
use image::{Rgba, RgbaImage};
use rand::Rng;
use std::path::PathBuf;

const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_PART_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct NoiseConfig {
    pub output_dir: PathBuf,
    pub count: u32,
    pub width: u32,
    pub height: u32,
}

/// Opaque image whose color channels are all independently uniform.
pub fn random_image<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |_, _| Rgba([rng.gen(), rng.gen(), rng.gen(), u8::MAX]))
}

/// Something like `k3v0q9z1m2b7xa_0pl4c8r2n6t5ye.png`.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut part = || -> String {
        (0..NAME_PART_LEN)
            .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
            .collect()
    };
    let first = part();
    let second = part();
    format!("{}_{}.png", first, second)
}

pub fn run<R: Rng + ?Sized>(rng: &mut R, config: &NoiseConfig) -> Result<Vec<TransformReport>> {
    if config.count == 0 {
        return Err(GenerateError::config("image count must be at least 1"));
    }
    if config.width == 0 || config.height == 0 {
        return Err(GenerateError::config("width and height must be at least 1"));
    }

    batch::prepare_output_dir(&config.output_dir)?;

    let mut reports = Vec::with_capacity(config.count as usize);
    for i in 0..config.count {
        let output = config.output_dir.join(random_name(rng));
        let image = random_image(rng, config.width, config.height);
        let report = transform::write_png(&image, &output)?;
        println!(
            "{}/{}: generated {}, size: {:.2} MB",
            i + 1,
            config.count,
            report.output.display(),
            report.size_mb()
        );
        reports.push(report);
    }

    Ok(reports)
}
