use std::fs::File;
use std::io::BufReader;
use lottie_data::model::{CompositionData, LayerContentData, MatteType, PositionData, TrackData};

fn load_card() -> CompositionData {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/card.json");
    let file = File::open(&path).expect("Failed to open card.json");
    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(comp) => comp,
        Err(e) => panic!("Failed to parse card.json: {}", e),
    }
}

#[test]
fn test_parse_card_fixture() {
    let comp = load_card();
    assert_eq!(comp.layers.len(), 5);
    assert_eq!(comp.frame_rate, 30.0);
    assert!((comp.duration_ms() - 2000.0).abs() < 1e-3);

    let card = &comp.layers[2];
    assert_eq!(card.matte_type, MatteType::Add);
    assert_eq!(card.transform.opacity.keyframes.len(), 2);
    assert!(card.transform.opacity.keyframes[0].easing.is_some());
    assert!(card.transform.opacity.keyframes[1].end_value.is_none());

    let title = &comp.layers[0];
    assert_eq!(title.parent_id, Some(3));
    assert!(matches!(title.transform.position, PositionData::Path(_)));

    assert_eq!(comp.layers[4].content, LayerContentData::Unsupported);
}

#[test]
fn test_parse_card_precomps() {
    let comp = load_card();
    let background = &comp.layers[3];
    assert_eq!(background.time_stretch, 2.0);
    match &background.content {
        LayerContentData::PreComp { ref_id } => {
            let layers = comp.precomps.get(ref_id).expect("precomp bg present");
            assert_eq!(layers.len(), 1);
            assert_eq!(layers[0].masks.len(), 1);
            // mask opacity falls back to fully opaque
            assert_eq!(layers[0].masks[0].opacity.keyframes[0].start_value, 100.0);
        }
        other => panic!("Expected PreComp, got {:?}", other),
    }
}

#[test]
fn test_keyframe_without_end_value_holds() {
    let json = r#"[
        { "start_value": [1.0, 2.0], "start_progress": 0.0, "end_progress": 0.5 },
        { "start_value": [3.0, 4.0], "end_value": [5.0, 6.0], "start_progress": 0.5 }
    ]"#;
    let track: TrackData<[f32; 2]> = serde_json::from_str(json).unwrap();
    assert_eq!(track.keyframes.len(), 2);
    assert_eq!(track.keyframes[0].end_value, None);
    assert_eq!(track.keyframes[1].end_value, Some([5.0, 6.0]));
    assert_eq!(track.keyframes[1].end_progress, 1.0);
}
