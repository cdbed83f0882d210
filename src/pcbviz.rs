use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};

use pcbset::coco::{self, CocoFile, PredictionRecord};
use pcbset::config::VizArgs;
use pcbset::error::DatasetError;
use pcbset::io;
use pcbset::reconcile::reconcile;
use pcbset::types::AnnotationSet;
use pcbset::visualize;
use pcbset::Result;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = VizArgs::parse();

    let image_dir = PathBuf::from(&args.image_dir);
    if !image_dir.exists() {
        error!("The specified image_dir does not exist: {}", args.image_dir);
        return;
    }

    info!("Rendering overlays...");
    if let Err(e) = run(&args, &image_dir) {
        error!("Failed to render overlays: {}", e);
    }
}

fn run(args: &VizArgs, image_dir: &Path) -> Result<()> {
    let output_dir = Path::new(&args.output_dir);

    match (&args.ground_truth, &args.predictions) {
        (Some(gt_path), Some(pred_path)) => {
            let gt = CocoFile::load(Path::new(gt_path))?.into_set();
            let predictions = load_predictions(&gt, Path::new(pred_path))?;
            let stats = visualize::render_eval_overlays(
                &gt,
                &predictions,
                image_dir,
                output_dir,
                args.samples,
                args.seed,
            )?;
            info!("Rendered {} overlay images.", stats.converted);
        }
        _ => {
            let Some(label_dir) = &args.label_dir else {
                return Err(DatasetError::EmptyInput(
                    "either --label_dir or --ground_truth with --predictions is required"
                        .to_string(),
                ));
            };
            let stats = visualize::render_label_overlays(
                image_dir,
                Path::new(label_dir),
                output_dir,
            )?;
            stats.print_summary();
        }
    }

    Ok(())
}

/// Accept reconciled prediction arrays directly and fall back to reconciling
/// raw detector output keyed by image names.
fn load_predictions(gt: &AnnotationSet, path: &Path) -> Result<Vec<PredictionRecord>> {
    match io::read_json::<Vec<PredictionRecord>>(path) {
        Ok(records) => Ok(records),
        Err(_) => {
            let raw = coco::load_raw_predictions(path)?;
            let (records, report) = reconcile(gt, &raw);
            report.print_summary();
            Ok(records)
        }
    }
}
