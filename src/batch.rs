use crate::dimension;
use crate::error::{GenerateError, Result};
use crate::transform::{self, TransformReport};
use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What to do when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole batch at the first failing file.
    Abort,
    /// Record the failure and move on to the next file.
    Continue,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub policy: ErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFile {
    pub name: String,
    pub step: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let report = serde_yaml::to_string(self).context("failed to serialize batch report")?;
        fs::write(path, report)
            .with_context(|| format!("failed to write batch report {}", path.display()))
    }

    pub fn total_bytes(&self) -> u64 {
        self.processed.iter().map(|file| file.bytes).sum()
    }
}

/// Creates `path` (and parents) unless it already exists as a directory.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(GenerateError::config(format!(
            "output path is not a directory: {}",
            path.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("creating output directory {}", path.display());
            fs::create_dir_all(path).map_err(|source| GenerateError::Config {
                reason: format!("failed to create output directory {}", path.display()),
                source: Some(source),
            })
        }
        Err(source) => Err(GenerateError::Config {
            reason: format!("failed to access output directory {}", path.display()),
            source: Some(source),
        }),
    }
}

/// Every entry of `dir`, sorted by name. Nothing is filtered out, so
/// non-image entries surface later as decode failures.
pub fn list_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let unreadable = |source: io::Error| GenerateError::Enumeration {
        path: dir.to_path_buf(),
        reason: "directory is unreadable".to_owned(),
        source: Some(source),
    };

    let mut sources = fs::read_dir(dir)
        .map_err(unreadable)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(unreadable)?;

    if sources.is_empty() {
        return Err(GenerateError::enumeration(dir, "directory is empty"));
    }
    sources.sort();
    Ok(sources)
}

/// Processes every file of the source directory in order, one at a time.
pub fn run<R: Rng + ?Sized>(rng: &mut R, config: &BatchConfig) -> Result<BatchReport> {
    if config.width == 0 || config.height == 0 {
        return Err(GenerateError::config("base width and height must be at least 1"));
    }

    prepare_output_dir(&config.output_dir)?;
    let sources = list_sources(&config.source_dir)?;
    log::info!(
        "found {} source files in {}",
        sources.len(),
        config.source_dir.display()
    );

    let mut report = BatchReport::default();
    for input in &sources {
        let name = match input.file_name() {
            Some(name) => name,
            None => continue,
        };
        let output = config.output_dir.join(name);
        let name = name.to_string_lossy().into_owned();

        match process(rng, config, input, &output) {
            Ok(done) => {
                println!(
                    "generated {} ({}x{}), size: {:.2} MB",
                    done.output.display(),
                    done.width,
                    done.height,
                    done.size_mb()
                );
                report.processed.push(ProcessedFile {
                    name,
                    width: done.width,
                    height: done.height,
                    bytes: done.bytes,
                });
            }
            Err(err) if config.policy == ErrorPolicy::Abort => return Err(err),
            Err(err) => {
                let step = err.step().to_owned();
                let error = format!("{:#}", anyhow::Error::new(err));
                log::warn!("skipping {}: {}", name, error);
                report.failed.push(FailedFile { name, step, error });
            }
        }
    }

    Ok(report)
}

fn process<R: Rng + ?Sized>(
    rng: &mut R,
    config: &BatchConfig,
    input: &Path,
    output: &Path,
) -> Result<TransformReport> {
    let width = dimension::randomize(rng, config.width)?;
    let height = dimension::randomize(rng, config.height)?;
    log::debug!("{} -> {}x{}", input.display(), width, height);
    transform::transform(rng, input, output, width, height)
}
