use std::fs;
use std::path::PathBuf;

use pcbset::config::{ClassTable, ConvertConfig, LabelFormat};
use pcbset::conversion::{process_annotation, ConvertOutput};
use pcbset::types::{ImageAnnotation, ProcessingStats, Shape};

fn annotation(width: u32, height: u32, shapes: Vec<Shape>) -> ImageAnnotation {
    ImageAnnotation {
        version: None,
        flags: None,
        shapes,
        image_path: None,
        image_height: height,
        image_width: width,
    }
}

fn shape(label: &str, points: Vec<(f64, f64)>) -> Shape {
    Shape {
        label: label.to_string(),
        points,
        group_id: None,
        shape_type: None,
        description: None,
    }
}

fn config(format: LabelFormat) -> ConvertConfig {
    ConvertConfig {
        classes: ClassTable::new(vec!["component".to_string()]),
        format,
        target_size: None,
    }
}

#[test]
fn label_file_contains_the_converted_line() {
    let tmp = tempfile::tempdir().unwrap();
    let out = ConvertOutput {
        labels_dir: tmp.path().to_path_buf(),
        images_dir: None,
    };

    let doc = annotation(
        200,
        100,
        vec![shape("component", vec![(0.0, 0.0), (100.0, 50.0)])],
    );
    let mut stats = ProcessingStats::new();
    process_annotation(
        &PathBuf::from("board_001.json"),
        &doc,
        &config(LabelFormat::Bbox),
        None,
        &out,
        &mut stats,
    )
    .unwrap();

    let written = fs::read_to_string(tmp.path().join("board_001.txt")).unwrap();
    assert_eq!(written, "0 0.250000 0.250000 0.500000 0.500000\n");
}

#[test]
fn document_with_unknown_label_still_produces_remaining_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    let out = ConvertOutput {
        labels_dir: tmp.path().to_path_buf(),
        images_dir: None,
    };

    let doc = annotation(
        200,
        100,
        vec![
            shape("mystery", vec![(5.0, 5.0), (20.0, 20.0)]),
            shape("component", vec![(0.0, 0.0), (100.0, 50.0)]),
        ],
    );
    let mut stats = ProcessingStats::new();
    process_annotation(
        &PathBuf::from("board_002.json"),
        &doc,
        &config(LabelFormat::Bbox),
        None,
        &out,
        &mut stats,
    )
    .unwrap();

    let written = fs::read_to_string(tmp.path().join("board_002.txt")).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert_eq!(stats.unknown_labels, 1);
}

#[test]
fn oriented_output_writes_eight_normalized_coordinates() {
    let tmp = tempfile::tempdir().unwrap();
    let out = ConvertOutput {
        labels_dir: tmp.path().to_path_buf(),
        images_dir: None,
    };

    let doc = annotation(
        100,
        100,
        vec![shape(
            "component",
            vec![(50.0, 10.0), (90.0, 50.0), (50.0, 90.0), (10.0, 50.0)],
        )],
    );
    let mut stats = ProcessingStats::new();
    process_annotation(
        &PathBuf::from("board_003.json"),
        &doc,
        &config(LabelFormat::Obb),
        None,
        &out,
        &mut stats,
    )
    .unwrap();

    let written = fs::read_to_string(tmp.path().join("board_003.txt")).unwrap();
    let fields: Vec<&str> = written.split_whitespace().collect();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[0], "0");
    assert_eq!(fields[1], "0.500000");
    assert_eq!(fields[2], "0.100000");
}

#[test]
fn annotation_json_parses_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let json_path = tmp.path().join("board_004.json");
    fs::write(
        &json_path,
        r#"{
            "imageWidth": 3904,
            "imageHeight": 3904,
            "shapes": [
                {"label": "component", "points": [[100.0, 200.0], [300.0, 400.0]]}
            ]
        }"#,
    )
    .unwrap();

    let doc = pcbset::io::read_annotation(&json_path).unwrap();
    assert_eq!(doc.image_width, 3904);
    assert_eq!(doc.shapes[0].label, "component");
}
