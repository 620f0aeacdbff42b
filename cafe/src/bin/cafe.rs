//! Command line front end for the CAFE analyses
//!
//! Usage:
//! ```
//! cafe compare --test-cases kd_*.tif --controls ctrl_*.tif --output comparison.csv
//! cafe compare --test-cases kd_*.tif --controls ctrl_*.tif --samples pixels.csv
//! cafe trf --images kd:kd_01.tif --images wt:wt_01.tif --output trf_blobs.csv
//! cafe overlay cell.tif --output cell_overlay.png --alpha 80
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) to follow progress.

use cafe::analysis::{
    centromere_vs_chromatin, encode_centro_telomeres_multichannel, render_overlay, trf_quantify,
    Comparison,
};
use cafe::config::{ChannelAssignment, ComparisonParams, OutputMode, TrfParams};
use cafe::error::CafeError;
use cafe::image_proc::image::{load_rgb, save_gray};
use cafe::shared_args::{display_name, GroupedPath, SharedAnalysisArgs};
use clap::{Parser, Subcommand};
use log::info;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Centromere-associated fluorescence estimator",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare target intensity near centromeres with bulk chromatin
    Compare {
        /// Test-case images
        #[arg(short, long, num_args = 1.., required = true)]
        test_cases: Vec<PathBuf>,

        /// Control images
        #[arg(short, long, num_args = 1.., required = true)]
        controls: Vec<PathBuf>,

        /// Output CSV, one row per image
        #[arg(short, long, default_value = "comparison.csv")]
        output: PathBuf,

        /// Also write every sampled pixel, one row per pixel and region
        #[arg(long)]
        samples: Option<PathBuf>,

        #[command(flatten)]
        shared: SharedAnalysisArgs,
    },

    /// Quantify TRF1 foci, one CSV row per focus
    Trf {
        /// Images tagged with their group, as GROUP:PATH
        #[arg(short, long, num_args = 1.., required = true)]
        images: Vec<GroupedPath>,

        /// Output CSV
        #[arg(short, long, default_value = "trf_blobs.csv")]
        output: PathBuf,

        #[command(flatten)]
        shared: SharedAnalysisArgs,
    },

    /// Render the centromere/telomere overlay of one image as a grayscale PNG
    Overlay {
        /// Input image
        image: PathBuf,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,

        /// Overlay strength (0-100)
        #[arg(short, long, default_value_t = 100)]
        alpha: u8,

        #[command(flatten)]
        shared: SharedAnalysisArgs,
    },
}

#[derive(Debug, Serialize)]
struct ComparisonRow {
    group: String,
    filename: String,
    centromere_pixels: usize,
    chromatin_pixels: usize,
    centromere_mean: Option<f64>,
    chromatin_mean: Option<f64>,
    mean_difference: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SampleRow<'a> {
    group: &'a str,
    filename: &'a str,
    region: &'static str,
    value: f64,
}

/// Pixel samples of one image, kept for the long-format export
struct ImageSamples {
    group: String,
    filename: String,
    centromere: Vec<f64>,
    chromatin: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct TrfRow {
    filename: String,
    file_number: usize,
    group: String,
    size_pixels: usize,
    raw_mean: f64,
    raw_total: f64,
    raw_max: f64,
    pre_mean: Option<f64>,
    pre_total: Option<f64>,
    pre_max: Option<f64>,
    post_mean: Option<f64>,
    post_total: Option<f64>,
    post_max: Option<f64>,
    eccentricity: f64,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn compare_image(
    group: &str,
    path: &Path,
    channels: &ChannelAssignment,
    params: &ComparisonParams,
) -> cafe::Result<(ComparisonRow, ImageSamples)> {
    let image = load_rgb(path)?;
    let Comparison::Samples {
        centromere,
        chromatin,
    } = centromere_vs_chromatin(image.view(), channels, params)?
    else {
        return Err(CafeError::InvalidInput(
            "comparison did not return samples".to_string(),
        ));
    };

    let centromere_mean = mean(&centromere);
    let chromatin_mean = mean(&chromatin);
    info!(
        "{}: {} centromere px, {} chromatin px",
        path.display(),
        centromere.len(),
        chromatin.len()
    );

    let row = ComparisonRow {
        group: group.to_string(),
        filename: display_name(path),
        centromere_pixels: centromere.len(),
        chromatin_pixels: chromatin.len(),
        centromere_mean,
        chromatin_mean,
        mean_difference: centromere_mean.zip(chromatin_mean).map(|(c, r)| c - r),
    };
    let samples = ImageSamples {
        group: row.group.clone(),
        filename: row.filename.clone(),
        centromere,
        chromatin,
    };
    Ok((row, samples))
}

fn write_samples(path: &Path, images: &[ImageSamples]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for image in images {
        let regions = [
            ("centromere", &image.centromere),
            ("chromatin", &image.chromatin),
        ];
        for (region, values) in regions {
            for &value in values.iter() {
                writer.serialize(SampleRow {
                    group: &image.group,
                    filename: &image.filename,
                    region,
                    value,
                })?;
                count += 1;
            }
        }
    }
    writer.flush()?;
    info!("Wrote {count} pixel samples to {}", path.display());
    Ok(())
}

fn run_compare(
    test_cases: &[PathBuf],
    controls: &[PathBuf],
    output: &Path,
    samples: Option<&Path>,
    shared: &SharedAnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = shared.load_config()?;
    let params = ComparisonParams {
        output: OutputMode::Samples,
        ..config.comparison.clone()
    };

    let jobs: Vec<(&str, &PathBuf)> = test_cases
        .iter()
        .map(|p| ("test", p))
        .chain(controls.iter().map(|p| ("control", p)))
        .collect();
    info!("Comparing {} images", jobs.len());

    let (rows, per_image): (Vec<_>, Vec<_>) = jobs
        .par_iter()
        .map(|(group, path)| compare_image(group, path, &config.channels, &params))
        .collect::<cafe::Result<Vec<_>>>()?
        .into_iter()
        .unzip();

    let mut writer = csv::Writer::from_path(output)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", rows.len(), output.display());

    if let Some(path) = samples {
        write_samples(path, &per_image)?;
    }
    Ok(())
}

fn quantify_image(
    file_number: usize,
    input: &GroupedPath,
    params: &TrfParams,
) -> cafe::Result<Vec<TrfRow>> {
    let image = load_rgb(&input.path)?;
    let blobs = trf_quantify(image.view(), params)?;
    info!("{}: {} TRF1 foci", input, blobs.len());

    let filename = display_name(&input.path);
    Ok(blobs
        .into_iter()
        .map(|blob| TrfRow {
            filename: filename.clone(),
            file_number,
            group: input.group.clone(),
            size_pixels: blob.area,
            raw_mean: blob.raw.mean,
            raw_total: blob.raw.total,
            raw_max: blob.raw.max,
            pre_mean: blob.pre.mean,
            pre_total: blob.pre.total,
            pre_max: blob.pre.max,
            post_mean: blob.post.mean,
            post_total: blob.post.total,
            post_max: blob.post.max,
            eccentricity: blob.eccentricity,
        })
        .collect())
}

fn run_trf(
    images: &[GroupedPath],
    output: &Path,
    shared: &SharedAnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = shared.load_config()?;
    info!("Quantifying TRF1 foci in {} images", images.len());

    let per_image = images
        .par_iter()
        .enumerate()
        .map(|(i, input)| quantify_image(i, input, &config.trf))
        .collect::<cafe::Result<Vec<_>>>()?;

    let mut writer = csv::Writer::from_path(output)?;
    let mut count = 0;
    for row in per_image.iter().flatten() {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    info!("Wrote {count} foci to {}", output.display());
    Ok(())
}

fn run_overlay(
    image_path: &Path,
    output: &Path,
    alpha: u8,
    shared: &SharedAnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = shared.load_config()?;
    let image = load_rgb(image_path)?;
    let encoded =
        encode_centro_telomeres_multichannel(image.view(), &config.channels, &config.encode)?;
    let rendered = render_overlay(encoded.view(), alpha)?;
    save_gray(&rendered, output)?;
    info!("Wrote overlay of {} to {}", image_path.display(), output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Compare {
            test_cases,
            controls,
            output,
            samples,
            shared,
        } => run_compare(test_cases, controls, output, samples.as_deref(), shared),
        Commands::Trf {
            images,
            output,
            shared,
        } => run_trf(images, output, shared),
        Commands::Overlay {
            image,
            output,
            alpha,
            shared,
        } => run_overlay(image, output, *alpha, shared),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_written_in_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.csv");
        let images = vec![
            ImageSamples {
                group: "test".to_string(),
                filename: "kd_01.tif".to_string(),
                centromere: vec![5.0, 7.5],
                chromatin: vec![1.0],
            },
            ImageSamples {
                group: "control".to_string(),
                filename: "wt_01.tif".to_string(),
                centromere: vec![],
                chromatin: vec![2.0, 3.0],
            },
        ];
        write_samples(&path, &images).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["group", "filename", "region", "value"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[1].iter().collect::<Vec<_>>(),
            vec!["test", "kd_01.tif", "centromere", "7.5"]
        );
        assert_eq!(&rows[2][2], "chromatin");
        assert_eq!(
            rows[4].iter().collect::<Vec<_>>(),
            vec!["control", "wt_01.tif", "chromatin", "3.0"]
        );
    }
}
