use glam::Vec4;
use kurbo::{Affine, BezPath, PathEl};
use lottie_core::canvas::{Canvas as LottieCanvas, ClipMode, LayerBlend, TextRun};
use lottie_core::geometry::is_empty_rect;
use lottie_core::CompositionLayer;
use skia_safe::{
    canvas::SaveLayerRec, BlendMode, Canvas, ClipOp, Color, Color4f, Font, FontMgr, FontStyle,
    Matrix, Paint, PaintStyle, Path, Rect, TextBlob,
};
use tracing::trace;

/// Host hooks for resources the composition only names.
pub trait LottieContext: Send + Sync {
    fn load_typeface(&self, family: &str, style: &str) -> Option<skia_safe::Typeface>;
    fn load_image(&self, id: &str) -> Option<skia_safe::Image>;
}

// Default no-op implementation
impl LottieContext for () {
    fn load_typeface(&self, _family: &str, _style: &str) -> Option<skia_safe::Typeface> {
        None
    }
    fn load_image(&self, _id: &str) -> Option<skia_safe::Image> {
        None
    }
}

pub struct SkiaRenderer;

impl SkiaRenderer {
    /// Draws the composition's current frame scaled into `dest_rect`.
    pub fn draw(
        canvas: &Canvas,
        composition: &CompositionLayer,
        dest_rect: Rect,
        alpha: f32,
        ctx: &dyn LottieContext,
    ) {
        let scale_x = sanitize(dest_rect.width() / composition.width());
        let scale_y = sanitize(dest_rect.height() / composition.height());
        let matrix = Affine::translate((sanitize(dest_rect.left) as f64, sanitize(dest_rect.top) as f64))
            * Affine::scale_non_uniform(scale_x as f64, scale_y as f64);

        canvas.save();
        let mut target = SkiaCanvas::new(canvas, ctx);
        composition.draw(&mut target, matrix, alpha);
        canvas.restore();
    }
}

/// Adapts a Skia canvas to the compositor's drawing surface.
///
/// Every geometry call carries its full transform, so the wrapped canvas keeps
/// whatever matrix the caller set up.
pub struct SkiaCanvas<'a> {
    canvas: &'a Canvas,
    ctx: &'a dyn LottieContext,
}

impl<'a> SkiaCanvas<'a> {
    pub fn new(canvas: &'a Canvas, ctx: &'a dyn LottieContext) -> Self {
        Self { canvas, ctx }
    }

    fn with_transform(&self, transform: Affine, draw: impl FnOnce(&Canvas)) {
        self.canvas.save();
        self.canvas.concat(&affine_to_matrix(transform));
        draw(self.canvas);
        self.canvas.restore();
    }

    fn typeface(&self, family: &str) -> Option<skia_safe::Typeface> {
        self.ctx.load_typeface(family, "Normal").or_else(|| {
            let font_mgr = FontMgr::new();
            font_mgr
                .match_family_style(family, FontStyle::normal())
                .or_else(|| font_mgr.match_family_style("Arial", FontStyle::normal()))
                .or_else(|| font_mgr.match_family_style("", FontStyle::normal()))
        })
    }
}

impl LottieCanvas for SkiaCanvas<'_> {
    fn save(&mut self) {
        self.canvas.save();
    }

    fn restore(&mut self) {
        self.canvas.restore();
    }

    fn clip_rect(&mut self, rect: kurbo::Rect) -> bool {
        self.canvas.clip_rect(to_sk_rect(rect), ClipOp::Intersect, true);
        !self.canvas.is_clip_empty()
    }

    fn clip_path(&mut self, path: &BezPath, transform: Affine, mode: ClipMode) {
        let op = match mode {
            ClipMode::Intersect => ClipOp::Intersect,
            ClipMode::Difference => ClipOp::Difference,
        };
        let path = kurbo_to_skia_path(&(transform * path.clone()));
        self.canvas.clip_path(&path, op, true);
    }

    fn save_layer(&mut self, bounds: kurbo::Rect, alpha: f32, blend: LayerBlend) {
        let mut paint = Paint::default();
        paint.set_alpha_f(sanitize(alpha));
        paint.set_blend_mode(match blend {
            LayerBlend::Normal => BlendMode::SrcOver,
            LayerBlend::DstIn => BlendMode::DstIn,
            LayerBlend::DstOut => BlendMode::DstOut,
        });

        if is_empty_rect(bounds) {
            self.canvas.save_layer(&SaveLayerRec::default().paint(&paint));
        } else {
            let bounds = to_sk_rect(bounds);
            self.canvas
                .save_layer(&SaveLayerRec::default().bounds(&bounds).paint(&paint));
        }
    }

    fn fill_rect(&mut self, rect: kurbo::Rect, transform: Affine, color: Vec4, alpha: f32) {
        let paint = fill_paint(color, alpha);
        self.with_transform(transform, |canvas| {
            canvas.draw_rect(to_sk_rect(rect), &paint);
        });
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Vec4, alpha: f32) {
        let paint = fill_paint(color, alpha);
        let path = kurbo_to_skia_path(path);
        self.with_transform(transform, |canvas| {
            canvas.draw_path(&path, &paint);
        });
    }

    fn draw_image(&mut self, asset_id: &str, width: f32, height: f32, transform: Affine, alpha: f32) {
        let dst = Rect::from_wh(sanitize(width), sanitize(height));
        match self.ctx.load_image(asset_id) {
            Some(img) => {
                let mut paint = Paint::default();
                paint.set_alpha_f(sanitize(alpha));
                let src = Rect::from_wh(img.width() as f32, img.height() as f32);
                self.with_transform(transform, |canvas| {
                    canvas.draw_image_rect(
                        img,
                        Some((&src, skia_safe::canvas::SrcRectConstraint::Strict)),
                        dst,
                        &paint,
                    );
                });
            }
            None => {
                trace!(asset_id, "image asset missing, drawing placeholder");
                let mut paint = Paint::default();
                paint.set_color(Color::MAGENTA);
                paint.set_style(PaintStyle::Fill);
                self.with_transform(transform, |canvas| {
                    canvas.draw_rect(dst, &paint);
                });
            }
        }
    }

    fn draw_text(&mut self, run: &TextRun, transform: Affine, alpha: f32) {
        let Some(typeface) = self.typeface(&run.font_family) else {
            trace!(family = %run.font_family, "no typeface available");
            return;
        };
        let font = Font::new(typeface, Some(sanitize(run.size)));
        let Some(blob) = TextBlob::from_str(&run.text, &font) else {
            return;
        };
        let paint = fill_paint(run.color, alpha);
        self.with_transform(transform, |canvas| {
            canvas.draw_text_blob(&blob, (0.0, 0.0), &paint);
        });
    }
}

fn fill_paint(color: Vec4, alpha: f32) -> Paint {
    let mut paint = Paint::new(glam_to_skia_color4f(color), None);
    paint.set_style(PaintStyle::Fill);
    paint.set_anti_alias(true);
    paint.set_alpha_f(sanitize(color.w * alpha).clamp(0.0, 1.0));
    paint
}

fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn glam_to_skia_color4f(v: Vec4) -> Color4f {
    Color4f::new(sanitize(v.x), sanitize(v.y), sanitize(v.z), sanitize(v.w))
}

fn to_sk_rect(rect: kurbo::Rect) -> Rect {
    Rect::new(
        sanitize(rect.x0 as f32),
        sanitize(rect.y0 as f32),
        sanitize(rect.x1 as f32),
        sanitize(rect.y1 as f32),
    )
}

fn affine_to_matrix(affine: Affine) -> Matrix {
    let [a, b, c, d, e, f] = affine.as_coeffs().map(|v| sanitize(v as f32));
    Matrix::new_all(a, c, e, b, d, f, 0.0, 0.0, 1.0)
}

fn kurbo_to_skia_path(bez_path: &BezPath) -> Path {
    let point = |p: kurbo::Point| (sanitize(p.x as f32), sanitize(p.y as f32));
    let mut path = Path::new();
    for el in bez_path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                path.move_to(point(p));
            }
            PathEl::LineTo(p) => {
                path.line_to(point(p));
            }
            PathEl::QuadTo(p1, p2) => {
                path.quad_to(point(p1), point(p2));
            }
            PathEl::CurveTo(p1, p2, p3) => {
                path.cubic_to(point(p1), point(p2), point(p3));
            }
            PathEl::ClosePath => {
                path.close();
            }
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_maps_like_skia_matrix() {
        let affine = Affine::translate((10.0, 20.0)) * Affine::scale_non_uniform(2.0, 3.0);
        let mapped = affine_to_matrix(affine).map_point((1.0, 1.0));
        assert_eq!((mapped.x, mapped.y), (12.0, 23.0));
    }

    #[test]
    fn test_path_conversion_keeps_bounds() {
        let mut bez = BezPath::new();
        bez.move_to((0.0, 0.0));
        bez.line_to((40.0, 0.0));
        bez.curve_to((40.0, 10.0), (30.0, 20.0), (0.0, 20.0));
        bez.close_path();
        let path = kurbo_to_skia_path(&bez);
        assert_eq!(path.count_verbs(), 4);
        let bounds = path.bounds();
        assert_eq!((bounds.right, bounds.bottom), (40.0, 20.0));
    }

    #[test]
    fn test_sanitize_drops_non_finite() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(1.5), 1.5);
    }
}
