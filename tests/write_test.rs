//! Tests for writing LDraw text files
//!
//! Models are written, read back and compared, and the written form is
//! checked to be stable under a second cycle.

use libldr::model::{BfcCertification, BfcCommand, Element, StateMarker};
use libldr::parser::load_from_str;
use libldr::writer::{model_to_string, multipart_to_string, save_to_file};
use libldr::{Color, Model, ModelMultipart, Reference, Winding};
use nalgebra::Matrix3;

fn sample_multipart() -> ModelMultipart {
    let mut main = Model::with_name("house.ldr");
    main.description = "House".to_string();
    main.author = "A. Builder".to_string();
    main.set_header("CATEGORY", "Building");
    main.set_header("KEYWORDS", "roof, wall");
    main.insert_element(Element::Comment("walls first".to_string()));
    main.insert_element(
        Reference::new(Color::new(4), "wall.ldr")
            .with_position(0.0, -24.0, 10.5)
            .into(),
    );
    main.insert_element(Element::State(StateMarker::Step));
    main.insert_element(Element::Bfc(BfcCommand::InvertNext));
    main.insert_element(
        Reference::new(Color::new(0x2FF8000), "3001.dat")
            .with_matrix(Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0))
            .into(),
    );
    main.insert_element(Element::Print("done".to_string()));

    let mut wall = Model::with_name("wall.ldr");
    wall.set_bfc(BfcCertification::certified(Winding::Cw));
    wall.insert_element(Reference::new(Color::MAIN, "3001.dat").into());

    let mut mm = ModelMultipart::new(main);
    mm.insert_submodel(wall, "wall.ldr");
    mm
}

#[test]
fn test_multipart_survives_write_read_cycle() {
    let mm = sample_multipart();
    let text = multipart_to_string(&mm);
    let back = load_from_str(&text, "house.ldr").unwrap();

    assert_eq!(back.main().description, "House");
    assert_eq!(back.main().author, "A. Builder");
    assert_eq!(back.main().header("CATEGORY"), Some("Building"));
    assert_eq!(back.submodel_count(), 1);
    assert_eq!(
        back.find_submodel("wall.ldr").unwrap().bfc(),
        BfcCertification::certified(Winding::Cw)
    );
    assert_eq!(back.main().elements.len(), mm.main().elements.len());
    let placed = back.main().elements[1].as_reference().unwrap();
    assert_eq!(placed.position.y, -24.0);
    assert_eq!(placed.position.z, 10.5);
    let rotated = back.main().elements[4].as_reference().unwrap();
    assert_eq!(rotated.color, Color::new(0x2FF8000));
    assert_eq!(rotated.matrix[(2, 0)], -1.0);

    // the second cycle is byte-identical
    assert_eq!(multipart_to_string(&back), text);
}

#[test]
fn test_written_lines_follow_the_grammar() {
    let text = multipart_to_string(&sample_multipart());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "0 FILE house.ldr");
    assert_eq!(lines[1], "0 House");
    assert_eq!(lines[2], "0 Name: house.ldr");
    assert_eq!(lines[3], "0 Author: A. Builder");
    assert!(lines.contains(&"0 !CATEGORY Building"));
    assert!(lines.contains(&"1 4 0 -24 10.5 1 0 0 0 1 0 0 0 1 wall.ldr"));
    assert!(lines.contains(&"0 STEP"));
    assert!(lines.contains(&"0 BFC INVERTNEXT"));
    assert!(lines.contains(&"1 0x2FF8000 0 0 0 0 0 1 0 1 0 -1 0 0 3001.dat"));
    assert!(lines.contains(&"0 PRINT done"));
    assert!(lines.contains(&"0 FILE wall.ldr"));
    assert!(lines.contains(&"0 BFC CERTIFY CW"));
}

#[test]
fn test_plain_model_has_no_file_line() {
    let mut model = Model::with_name("3005.dat");
    model.description = "Brick 1 x 1".to_string();
    model.set_bfc(BfcCertification::uncertified());
    model.insert_element(Element::Triangle(libldr::Triangle {
        color: Color::EDGE,
        vertices: [
            nalgebra::Point3::new(0.0, 0.0, 0.0),
            nalgebra::Point3::new(1.0, 0.0, 0.0),
            nalgebra::Point3::new(0.0, 1.0, 0.0),
        ],
    }));
    let text = model_to_string(&model);
    assert_eq!(
        text,
        "0 Brick 1 x 1\n0 Name: 3005.dat\n0 BFC NOCERTIFY\n3 24 0 0 0 1 0 0 0 1 0\n"
    );
    let mm = ModelMultipart::new(model);
    assert_eq!(multipart_to_string(&mm), text);
}

#[test]
fn test_save_and_reload_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("house.ldr");
    let mm = sample_multipart();
    save_to_file(&mm, &path).unwrap();

    let back = ModelMultipart::from_file(&path).unwrap();
    assert_eq!(back.main().name, "house.ldr");
    assert!(back.find_submodel("WALL.LDR").is_some());
    // saving into a missing directory reports the path
    let err = save_to_file(&mm, &dir.path().join("missing/house.ldr")).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_leading_comment_without_description_stays_a_comment() {
    let mut model = Model::with_name("note.ldr");
    model.insert_element(Element::Comment("note".to_string()));
    model.insert_element(Reference::new(Color::new(4), "3001.dat").into());
    let mm = ModelMultipart::new(model);

    let text = multipart_to_string(&mm);
    assert!(text.starts_with("0\n0 Name: note.ldr\n0 note\n"));
    let back = load_from_str(&text, "note.ldr").unwrap();
    assert_eq!(back.main().description, "");
    assert_eq!(back.main().elements, mm.main().elements);
    assert_eq!(multipart_to_string(&back), text);
}
