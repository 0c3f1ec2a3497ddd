use super::*;

use std::path::PathBuf;

fn parse(json: &str) -> SceneDesc {
    SceneDesc::from_reader(json.as_bytes()).unwrap()
}

#[test]
fn colors_parse_from_hex_and_arrays() {
    let c: ColorDef = serde_json::from_str("\"#ff8000\"").unwrap();
    assert_eq!(c.0, 0xffff_8000);
    let c: ColorDef = serde_json::from_str("\"#FF800040\"").unwrap();
    assert_eq!(c.0, 0x40ff_8000);
    let c: ColorDef = serde_json::from_str("[1, 2, 3]").unwrap();
    assert_eq!(c.0, 0xff01_0203);
    let c: ColorDef = serde_json::from_str("[1, 2, 3, 4]").unwrap();
    assert_eq!(c.0, 0x0401_0203);

    assert!(serde_json::from_str::<ColorDef>("\"#12345\"").is_err());
    assert!(serde_json::from_str::<ColorDef>("\"#gg0000\"").is_err());
    assert!(serde_json::from_str::<ColorDef>("[1, 2]").is_err());
}

#[test]
fn vectors_accept_arrays_and_objects() {
    let v: Vec2Def = serde_json::from_str("[1.5, 2]").unwrap();
    assert_eq!((v.x, v.y), (1.5, 2.0));
    let v: Vec2Def = serde_json::from_str("{\"x\": 3, \"y\": 4}").unwrap();
    assert_eq!((v.x, v.y), (3.0, 4.0));
}

#[test]
fn node_fields_have_sensible_defaults() {
    let node: NodeDef = serde_json::from_str("{\"type\": \"fill\"}").unwrap();
    assert_eq!((node.anchor.x, node.anchor.y), (0.0, 0.0));
    assert_eq!((node.scale.x, node.scale.y), (1.0, 1.0));
    assert_eq!(node.opacity, 1.0);
    assert!(node.visible);
    assert!(node.width.is_none());
    assert!(matches!(node.kind, NodeKindDef::Fill));
}

#[test]
fn malformed_json_is_a_validation_error() {
    let err = SceneDesc::from_reader("{\"width\": 4".as_bytes()).unwrap_err();
    assert!(matches!(err, PaintError::Validation(_)), "{err}");
    let err = SceneDesc::from_reader("{\"width\": 4, \"height\": 4, \"nodes\": [{}]}".as_bytes())
        .unwrap_err();
    assert!(err.to_string().contains("parse scene JSON"), "{err}");
}

#[test]
fn embedded_opts_fill_in_defaults() {
    let desc = parse(r#"{"width": 8, "height": 8, "opts": {"dirty_rect_capacity": 5}}"#);
    assert_eq!(desc.opts().dirty_rect_capacity, 5);
    assert_eq!(
        desc.opts().max_non_dirty_area,
        EngineOpts::default().max_non_dirty_area
    );
}

#[test]
fn validate_rejects_dangling_references() {
    let cases = [
        r#"{"width": 0, "height": 8}"#,
        r#"{"width": 8, "height": 8, "opts": {"dirty_rect_capacity": 0}}"#,
        r#"{"width": 8, "height": 8, "nodes": [{"type": "image", "image": "nope"}]}"#,
        r#"{"width": 8, "height": 8, "nodes": [{"type": "text", "text": "A", "font": "nope"}]}"#,
        r#"{"width": 8, "height": 8, "nodes": [{"type": "fill", "opacity": 2}]}"#,
        r#"{"width": 8, "height": 8, "fonts": {"f": {"image": "nope"}}}"#,
        r#"{"width": 8, "height": 8,
            "nodes": [{"type": "fill", "name": "a"}],
            "updates": [{"target": "b", "x": 1}]}"#,
        r#"{"width": 8, "height": 8,
            "nodes": [{"type": "group", "children": [{"type": "image", "image": "x"}]}]}"#,
    ];
    for json in cases {
        assert!(parse(json).validate().is_err(), "{json}");
    }

    let ok = parse(
        r#"{"width": 8, "height": 8,
            "nodes": [{"type": "group", "name": "g"}],
            "updates": [{"target": "g", "add": [{"type": "fill", "name": "later"}]},
                        {"target": "later", "x": 2}]}"#,
    );
    ok.validate().unwrap();
}

#[test]
fn build_creates_named_nodes() {
    let desc = parse(
        r##"{"width": 32, "height": 16, "background": "#000000",
            "fonts": {"small": {"tint": "#ff0000"}},
            "nodes": [
              {"type": "fill", "name": "box", "x": 2, "y": 3, "width": 4, "height": 5,
               "background": [0, 0, 255]},
              {"type": "group", "name": "g", "x": 10, "clip_to_bounds": true,
               "width": 10, "height": 10,
               "children": [{"type": "text", "name": "label", "text": "HI", "font": "small"}]}
            ]}"##,
    );
    let mut stage = desc.build().unwrap();
    let tree = stage.tree();

    let b = tree.find("box").unwrap();
    assert_eq!((tree.node(b).x(), tree.node(b).y()), (2.0, 3.0));
    assert_eq!(tree.node(b).background(), 0xff00_00ff);

    let g = tree.find("g").unwrap();
    assert!(tree.node(g).group().unwrap().clip_to_bounds());
    let label = tree.find("label").unwrap();
    assert_eq!(tree.node(label).parent(), Some(g));
    assert_eq!((tree.node(label).width(), tree.node(label).height()), (7.0, 5.0));

    assert_eq!(stage.frame(), crate::scene::stage::Presented::Full);
    assert_eq!(stage.surface().get_pixel(3, 4), Some(0xff00_00ff));
    assert_eq!(stage.surface().get_pixel(20, 12), Some(0xff00_0000));
}

#[test]
fn updates_move_retext_and_remove_nodes() {
    let desc = parse(
        r##"{"width": 40, "height": 20,
            "nodes": [
              {"type": "fill", "name": "a", "width": 4, "height": 4, "background": "#ffffff"},
              {"type": "fill", "name": "b", "x": 30, "width": 4, "height": 4},
              {"type": "text", "name": "t", "text": "A"},
              {"type": "group", "name": "g"}
            ],
            "updates": [
              {"target": "a", "x": 10, "opacity": 0.5},
              {"target": "b", "remove": true},
              {"target": "t", "text": "AB"},
              {"target": "g", "add": [{"type": "fill", "name": "c", "x": 1}]}
            ]}"##,
    );
    assert_eq!(desc.update_count(), 4);
    let mut stage = desc.build().unwrap();
    stage.frame();
    desc.apply_updates(&mut stage).unwrap();

    let tree = stage.tree();
    let a = tree.find("a").unwrap();
    assert_eq!((tree.node(a).x(), tree.node(a).y()), (10.0, 0.0));
    assert_eq!(tree.node(a).opacity(), 0.5);

    let b = tree.find("b").unwrap();
    assert!(tree.node(b).parent().is_none());

    let t = tree.find("t").unwrap();
    let NodeKind::Leaf(LeafContent::Text { text, .. }) = tree.node(t).kind() else {
        panic!("text node lost its content");
    };
    assert_eq!(text, "AB");

    let c = tree.find("c").unwrap();
    assert_eq!(tree.node(c).parent(), tree.find("g"));

    stage.tick();
    assert!(!stage.dirty_rects().is_empty());
}

#[test]
fn images_load_relative_to_the_scene_file() {
    let dir = PathBuf::from("target").join("desc_unit");
    std::fs::create_dir_all(&dir).unwrap();
    RasterBuffer::new_opaque(2, 3, 0xff12_3456)
        .save_png(&dir.join("px.png"))
        .unwrap();
    let scene = dir.join("scene.json");
    std::fs::write(
        &scene,
        r#"{"width": 8, "height": 8,
            "images": {"px": "px.png"},
            "nodes": [{"type": "image", "name": "pic", "image": "px", "x": 1, "y": 1}]}"#,
    )
    .unwrap();

    let desc = SceneDesc::from_path(&scene).unwrap();
    let mut stage = desc.build().unwrap();
    let pic = stage.tree().find("pic").unwrap();
    assert_eq!(
        (stage.tree().node(pic).width(), stage.tree().node(pic).height()),
        (2.0, 3.0)
    );
    stage.frame();
    assert_eq!(stage.surface().get_pixel(2, 3), Some(0xff12_3456));
    assert_eq!(stage.surface().get_pixel(3, 3), Some(0));
}

#[test]
fn missing_scene_file_is_reported() {
    let err = SceneDesc::from_path("target/does/not/exist.json").unwrap_err();
    assert!(err.to_string().contains("open scene JSON"), "{err}");
}

#[test]
fn group_filters_parse_with_defaults() {
    let desc = parse(
        r##"{"width": 40, "height": 40,
            "nodes": [
              {"type": "group", "name": "shadowed", "width": 10, "height": 10,
               "filter": {"type": "drop_shadow", "offset_x": -2}},
              {"type": "group", "name": "soft", "filter": {"type": "blur", "radius": 5}},
              {"type": "group", "name": "bright", "filter": {"type": "glow"}}
            ]}"##,
    );
    desc.validate().unwrap();
    let stage = desc.build().unwrap();
    let tree = stage.tree();
    let filter_of = |name: &str| {
        let id = tree.find(name).unwrap();
        tree.node(id).group().unwrap().filter()
    };
    assert_eq!(
        filter_of("shadowed"),
        Some(Filter::DropShadow {
            radius: 3,
            offset_x: -2,
            offset_y: 3,
            color: 0x8000_0000,
        })
    );
    assert_eq!(filter_of("soft"), Some(Filter::Blur { radius: 5 }));
    assert_eq!(filter_of("bright"), Some(Filter::Glow { radius: 3 }));

    let too_wide = parse(
        r#"{"width": 8, "height": 8,
            "nodes": [{"type": "group", "filter": {"type": "blur", "radius": 33}}]}"#,
    );
    assert!(too_wide.validate().is_err());
}
