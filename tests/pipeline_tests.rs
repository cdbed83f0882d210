use image::RgbImage;
use std::fs;
use std::path::Path;

use pcbset::coco::{CocoFile, RawPrediction};
use pcbset::config::ClassTable;
use pcbset::dataset::{build_ground_truth, check_integrity, split_dataset};
use pcbset::evaluate::evaluate;
use pcbset::reconcile::reconcile;

fn write_image(dir: &Path, name: &str, width: u32, height: u32) {
    RgbImage::new(width, height).save(dir.join(name)).unwrap();
}

fn fixture_dataset(root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let images = root.join("images");
    let labels = root.join("labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();

    write_image(&images, "board_a.png", 100, 100);
    write_image(&images, "board_b.png", 200, 100);

    // board_a gets one centered 50x50 object; board_b stays label-less.
    fs::write(labels.join("board_a.txt"), "0 0.500000 0.500000 0.500000 0.500000\n").unwrap();

    (images, labels)
}

#[test]
fn ground_truth_ids_are_dense_and_boxes_are_pixels() {
    let tmp = tempfile::tempdir().unwrap();
    let (images, labels) = fixture_dataset(tmp.path());

    let classes = ClassTable::new(vec!["component".to_string()]);
    let (set, stats) = build_ground_truth(&images, &labels, &classes).unwrap();

    assert_eq!(set.images.len(), 2);
    assert_eq!(set.images[0].id, 1);
    assert_eq!(set.images[1].id, 2);
    assert_eq!(set.images[0].external_name, "board_a");

    assert_eq!(set.records.len(), 1);
    let bbox = set.records[0].bbox;
    assert!((bbox.x - 25.0).abs() < 1e-9);
    assert!((bbox.y - 25.0).abs() < 1e-9);
    assert!((bbox.width - 50.0).abs() < 1e-9);

    assert_eq!(set.categories, vec![(0, "component".to_string())]);
    assert_eq!(stats.missing_pairs, 1);
}

#[test]
fn ground_truth_round_trips_through_coco_json() {
    let tmp = tempfile::tempdir().unwrap();
    let (images, labels) = fixture_dataset(tmp.path());

    let classes = ClassTable::new(vec!["component".to_string()]);
    let (set, _) = build_ground_truth(&images, &labels, &classes).unwrap();

    let json_path = tmp.path().join("ground_truth.json");
    CocoFile::from_set(&set).save(&json_path).unwrap();

    let loaded = CocoFile::load(&json_path).unwrap().into_set();
    assert_eq!(loaded.images.len(), set.images.len());
    assert_eq!(loaded.records, set.records);
    assert_eq!(loaded.categories, set.categories);
}

#[test]
fn empty_image_directory_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    let labels = tmp.path().join("labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();

    let classes = ClassTable::new(vec![]);
    assert!(build_ground_truth(&images, &labels, &classes).is_err());
}

#[test]
fn reconcile_then_evaluate_perfect_predictions() {
    let tmp = tempfile::tempdir().unwrap();
    let (images, labels) = fixture_dataset(tmp.path());

    let classes = ClassTable::new(vec!["component".to_string()]);
    let (gt, _) = build_ground_truth(&images, &labels, &classes).unwrap();

    let raw = vec![
        // Detector output keyed by file stem, with its own category id.
        RawPrediction {
            image_id: "board_a".to_string(),
            category_id: 7,
            bbox: [25.0, 25.0, 50.0, 50.0],
            score: 0.98,
        },
        RawPrediction {
            image_id: "board_z".to_string(),
            category_id: 7,
            bbox: [0.0, 0.0, 10.0, 10.0],
            score: 0.5,
        },
    ];

    let (reconciled, report) = reconcile(&gt, &raw);
    assert_eq!(report.dropped, 1);
    assert_eq!(reconciled.len(), 1);
    // Single-category ground truth forces the detector's category id.
    assert_eq!(reconciled[0].category_id, 0);
    assert_eq!(reconciled[0].image_id, 1);

    let summary = evaluate(&gt, &reconciled).unwrap();
    assert!((summary.ap - 1.0).abs() < 1e-9);
    assert!((summary.ar_100 - 1.0).abs() < 1e-9);
}

#[test]
fn split_copies_paired_files_into_both_trees() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    let labels = tmp.path().join("labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();

    for i in 0..5 {
        write_image(&images, &format!("board_{}.png", i), 10, 10);
        fs::write(labels.join(format!("board_{}.txt", i)), "0 0.5 0.5 0.2 0.2\n").unwrap();
    }
    // An unpaired image is excluded from the split.
    write_image(&images, "orphan.png", 10, 10);

    let output = tmp.path().join("split");
    let summary = split_dataset(&images, &labels, &output, 0.2, 42).unwrap();

    assert_eq!(summary.train + summary.val, 5);
    assert_eq!(summary.val, 1);
    assert_eq!(
        fs::read_dir(output.join("train/images")).unwrap().count(),
        summary.train
    );
    assert_eq!(
        fs::read_dir(output.join("val/labels")).unwrap().count(),
        summary.val
    );
}

#[test]
fn integrity_check_reports_mismatches_both_ways() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("images");
    let labels = tmp.path().join("labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();

    write_image(&images, "board_a.png", 10, 10);
    write_image(&images, "board_b.png", 10, 10);
    fs::write(labels.join("board_b.txt"), "").unwrap();
    fs::write(labels.join("board_c.txt"), "").unwrap();
    // A file with an image extension but no decodable content.
    fs::write(images.join("board_d.jpg"), b"not an image").unwrap();

    let report = check_integrity(&images, &labels).unwrap();
    assert_eq!(report.missing_labels, vec!["board_a".to_string(), "board_d".to_string()]);
    assert_eq!(report.missing_images, vec!["board_c".to_string()]);
    assert_eq!(report.undecodable.len(), 1);
    assert!(!report.is_clean());
}
