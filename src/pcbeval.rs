use clap::Parser;
use log::{error, info};
use std::path::Path;

use pcbset::coco::{self, CocoFile};
use pcbset::config::EvalArgs;
use pcbset::evaluate::evaluate;
use pcbset::reconcile::reconcile;
use pcbset::Result;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = EvalArgs::parse();

    info!("Starting evaluation...");
    if let Err(e) = run(&args) {
        error!("Failed to evaluate predictions: {}", e);
    }
}

fn run(args: &EvalArgs) -> Result<()> {
    let gt = CocoFile::load(Path::new(&args.ground_truth))?.into_set();
    let raw = coco::load_raw_predictions(Path::new(&args.predictions))?;
    info!(
        "Loaded {} ground-truth images and {} raw predictions.",
        gt.images.len(),
        raw.len()
    );

    let (reconciled, report) = reconcile(&gt, &raw);
    report.print_summary();

    if let Some(path) = &args.reconciled_out {
        coco::save_predictions(Path::new(path), &reconciled)?;
        info!("Wrote reconciled predictions to {}", path);
    }

    let summary = evaluate(&gt, &reconciled)?;
    print!("{}", summary);
    Ok(())
}
