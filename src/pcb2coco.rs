use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};

use pcbset::coco::CocoFile;
use pcbset::config::{ClassTable, GroundTruthArgs};
use pcbset::dataset::build_ground_truth;
use pcbset::Result;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = GroundTruthArgs::parse();

    let image_dir = PathBuf::from(&args.image_dir);
    if !image_dir.exists() {
        error!("The specified image_dir does not exist: {}", args.image_dir);
        return;
    }

    info!("Building COCO ground truth...");
    if let Err(e) = run(&args, &image_dir) {
        error!("Failed to build ground truth: {}", e);
    }
}

fn run(args: &GroundTruthArgs, image_dir: &Path) -> Result<()> {
    let classes = ClassTable::new(args.label_list.clone());
    let (set, stats) = build_ground_truth(image_dir, Path::new(&args.label_dir), &classes)?;
    stats.print_summary();

    let coco = CocoFile::from_set(&set);
    coco.save(Path::new(&args.output))?;
    info!(
        "Wrote {} images and {} annotations to {}",
        coco.images.len(),
        coco.annotations.len(),
        args.output
    );
    Ok(())
}
