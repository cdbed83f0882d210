use clap::Parser;
use log::{error, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use pcbset::config::{ClassTable, ConvertArgs, ConvertConfig};
use pcbset::conversion::{discover_labels, process_annotations_in_parallel, ConvertOutput};
use pcbset::dataset::{check_integrity, split_dataset};
use pcbset::error::DatasetError;
use pcbset::io;
use pcbset::utils::{create_output_directory, create_progress_bar};
use pcbset::Result;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ConvertArgs::parse();

    let json_dir = PathBuf::from(&args.json_dir);
    if !json_dir.exists() {
        error!("The specified json_dir does not exist: {}", args.json_dir);
        return;
    }

    info!("Starting the conversion process...");
    if let Err(e) = run(&args, &json_dir) {
        error!("Failed to convert dataset: {}", e);
    }
}

fn run(args: &ConvertArgs, json_dir: &Path) -> Result<()> {
    let json_files = io::find_json_files(json_dir)?;
    if json_files.is_empty() {
        return Err(DatasetError::EmptyInput(json_dir.display().to_string()));
    }

    let annotations: Vec<_> = json_files
        .par_iter()
        .filter_map(|path| io::read_annotation(path).map(|ann| (path.clone(), ann)))
        .collect();
    info!("Read and parsed {} files.", annotations.len());

    let classes = if args.label_list.is_empty() {
        let table = discover_labels(&annotations);
        info!("Discovered {} labels.", table.len());
        table
    } else {
        ClassTable::new(args.label_list.clone())
    };

    let cfg = ConvertConfig {
        classes,
        format: args.output_format,
        target_size: args.target_size.map(|size| (size, size)),
    };

    let output_dir = PathBuf::from(&args.output_dir);
    let labels_dir = create_output_directory(&output_dir.join("labels"))?;
    let image_dir = args.image_dir.as_ref().map(PathBuf::from);
    let images_dir = match &image_dir {
        Some(_) => Some(create_output_directory(&output_dir.join("images"))?),
        None => None,
    };
    let out = ConvertOutput {
        labels_dir,
        images_dir,
    };

    let pb = create_progress_bar(annotations.len() as u64, "Convert");
    let stats =
        process_annotations_in_parallel(&annotations, &cfg, image_dir.as_deref(), &out, &pb);
    pb.finish_with_message("Conversion complete");
    stats.print_summary();

    if args.val_size > 0.0 {
        match &out.images_dir {
            Some(images_dir) => {
                let summary = split_dataset(
                    images_dir,
                    &out.labels_dir,
                    &output_dir,
                    args.val_size,
                    args.seed,
                )?;
                info!(
                    "Dataset split into {} train / {} val pairs.",
                    summary.train, summary.val
                );
            }
            None => info!("Skipping split: no image directory was given."),
        }
    }

    if args.verify {
        if let Some(images_dir) = &out.images_dir {
            check_integrity(images_dir, &out.labels_dir)?.print_summary();
        }
    }

    Ok(())
}
