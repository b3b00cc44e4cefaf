use lottie_core::CompositionLayer;
use lottie_data::model::{
    BezierPath, CompositionData, LayerContentData, LayerData, MaskData, MaskMode, MatteType,
    TrackData,
};
use lottie_skia::SkiaRenderer;
use skia_safe::{Color, Rect, Surface};
use std::collections::HashMap;

fn solid(id: i64, name: &str, size: f32, color: [f32; 4]) -> LayerData {
    LayerData::new(
        id,
        name,
        LayerContentData::Solid {
            width: size,
            height: size,
            color,
        },
    )
}

fn comp(layers: Vec<LayerData>) -> CompositionLayer {
    CompositionLayer::new(&CompositionData {
        name: None,
        width: 100.0,
        height: 100.0,
        start_frame: 0.0,
        end_frame: 30.0,
        frame_rate: 30.0,
        layers,
        precomps: HashMap::new(),
    })
}

fn render(comp: &CompositionLayer, size: i32) -> Surface {
    let mut surface = Surface::new_raster_n32_premul((size, size)).expect("Failed to create surface");
    SkiaRenderer::draw(
        surface.canvas(),
        comp,
        Rect::from_wh(size as f32, size as f32),
        1.0,
        &(),
    );
    surface
}

fn pixel(surface: &mut Surface, x: i32, y: i32) -> Color {
    let image = surface.image_snapshot();
    let pixmap = image.peek_pixels().expect("raster surface");
    pixmap.get_color((x, y))
}

#[test]
fn test_solid_renders_inside_its_rect() {
    let comp = comp(vec![solid(1, "Red", 50.0, [1.0, 0.0, 0.0, 1.0])]);
    let mut surface = render(&comp, 100);

    assert_eq!(pixel(&mut surface, 10, 10), Color::RED);
    assert_eq!(pixel(&mut surface, 80, 80).a(), 0);
}

#[test]
fn test_dest_rect_scales_composition() {
    let comp = comp(vec![solid(1, "Red", 50.0, [1.0, 0.0, 0.0, 1.0])]);
    let mut surface = render(&comp, 200);

    // 50x50 in a 100x100 composition covers 100x100 on a 200px target.
    assert_eq!(pixel(&mut surface, 90, 90), Color::RED);
    assert_eq!(pixel(&mut surface, 150, 150).a(), 0);
}

#[test]
fn test_add_matte_keeps_only_covered_pixels() {
    let mut owner = solid(2, "Fill", 100.0, [0.0, 0.0, 1.0, 1.0]);
    owner.matte_type = MatteType::Add;
    let comp = comp(vec![solid(1, "Matte", 50.0, [1.0, 1.0, 1.0, 1.0]), owner]);
    let mut surface = render(&comp, 100);

    assert_eq!(pixel(&mut surface, 25, 25), Color::BLUE);
    assert_eq!(pixel(&mut surface, 75, 75).a(), 0);
}

#[test]
fn test_invert_matte_keeps_uncovered_pixels() {
    let mut owner = solid(2, "Fill", 100.0, [0.0, 0.0, 1.0, 1.0]);
    owner.matte_type = MatteType::Invert;
    let comp = comp(vec![solid(1, "Matte", 50.0, [1.0, 1.0, 1.0, 1.0]), owner]);
    let mut surface = render(&comp, 100);

    assert_eq!(pixel(&mut surface, 25, 25).a(), 0);
    assert_eq!(pixel(&mut surface, 75, 75), Color::BLUE);
}

#[test]
fn test_front_layer_paints_over_back_layer() {
    let comp = comp(vec![
        solid(1, "Front", 50.0, [0.0, 1.0, 0.0, 1.0]),
        solid(2, "Back", 100.0, [1.0, 0.0, 0.0, 1.0]),
    ]);
    let mut surface = render(&comp, 100);

    assert_eq!(pixel(&mut surface, 25, 25), Color::GREEN);
    assert_eq!(pixel(&mut surface, 75, 75), Color::RED);
}

#[test]
fn test_disjoint_add_masks_both_show() {
    let mut layer = solid(1, "Green", 100.0, [0.0, 1.0, 0.0, 1.0]);
    for x in [0.0, 60.0] {
        layer.masks.push(MaskData {
            name: String::new(),
            mode: MaskMode::Add,
            inverted: false,
            path: TrackData::constant(BezierPath::rect(x, 0.0, 20.0, 20.0)),
            opacity: TrackData::constant(100.0),
        });
    }
    let comp = comp(vec![layer]);
    let mut surface = render(&comp, 100);

    assert_eq!(pixel(&mut surface, 10, 10), Color::GREEN);
    assert_eq!(pixel(&mut surface, 70, 10), Color::GREEN);
    assert_eq!(pixel(&mut surface, 40, 10).a(), 0);
    assert_eq!(pixel(&mut surface, 10, 50).a(), 0);
}
