use crate::animatable::AnimatableValue;
use crate::canvas::{Canvas, LayerBlend};
use crate::geometry::{is_empty_rect, union_bounds};
use crate::keyframe::{KeyframeTrack, ValueCallback};
use crate::layer::{LayerContent, LayerId, LayerNode};
use crate::transform::mark_on_change;
use kurbo::{Affine, Rect};
use lottie_data::model::{CompositionData, LayerData, MatteType};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

/// Nesting limit for precomps, guarding against reference cycles.
pub const MAX_PRECOMP_DEPTH: usize = 32;

/// Shared state while building one root composition and its precomps.
pub(crate) struct BuildContext<'a> {
    pub(crate) precomps: &'a HashMap<String, Vec<LayerData>>,
    /// Root duration, the denominator of time remapping.
    pub(crate) duration_ms: f32,
    pub(crate) invalidated: Rc<Cell<bool>>,
    depth: usize,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        precomps: &'a HashMap<String, Vec<LayerData>>,
        duration_ms: f32,
        invalidated: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            precomps,
            duration_ms,
            invalidated,
            depth: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Memo {
    Unknown,
    Yes,
    No,
}

impl Memo {
    fn known(self) -> Option<bool> {
        match self {
            Memo::Unknown => None,
            Memo::Yes => Some(true),
            Memo::No => Some(false),
        }
    }
}

impl From<bool> for Memo {
    fn from(value: bool) -> Self {
        if value {
            Memo::Yes
        } else {
            Memo::No
        }
    }
}

/// A group of layers with its own timeline and pixel size.
///
/// Nodes live in an arena (`nodes`) addressed by [`LayerId`]. Top-level
/// layers are listed front-to-back in `layers`; matte layers are reachable
/// only through their owner's matte slot. Drawing and progress propagation
/// walk `layers` back-to-front.
///
/// `has_masks` and `has_matte` are computed on first use and then frozen;
/// descriptors never change after load.
#[derive(Debug)]
pub struct CompositionLayer {
    name: String,
    width: f32,
    height: f32,
    start_progress: f32,
    time_stretch: f32,
    time_remap: Option<AnimatableValue<f32>>,
    duration_ms: f32,
    pub(crate) nodes: Vec<LayerNode>,
    pub(crate) layers: Vec<LayerId>,
    id_index: HashMap<i64, LayerId>,
    pub(crate) invalidated: Rc<Cell<bool>>,
    has_masks: Cell<Memo>,
    has_matte: Cell<Memo>,
    progress: f32,
    disposed: bool,
    #[cfg(test)]
    pub(crate) walks: Cell<usize>,
}

impl CompositionLayer {
    /// Builds the root composition. Malformed references are logged and
    /// tolerated, never fatal.
    pub fn new(data: &CompositionData) -> Self {
        let mut ctx = BuildContext::new(
            &data.precomps,
            data.duration_ms(),
            Rc::new(Cell::new(false)),
        );
        let mut root = Self::empty(
            data.name.clone().unwrap_or_default(),
            data.width,
            data.height,
            &ctx,
        );
        root.fill(&data.layers, &mut ctx);
        debug!(
            name = %root.name,
            layers = root.layers.len(),
            nodes = root.nodes.len(),
            "composition built"
        );
        root
    }

    pub(crate) fn build_precomp(
        layer: &LayerData,
        ref_id: &str,
        ctx: &mut BuildContext<'_>,
    ) -> Option<Self> {
        let precomps = ctx.precomps;
        let Some(descriptors) = precomps.get(ref_id) else {
            warn!(id = layer.id, ref_id, "precomp reference not found, skipping layer");
            return None;
        };
        if ctx.depth >= MAX_PRECOMP_DEPTH {
            warn!(id = layer.id, ref_id, "precomp nesting too deep, skipping layer");
            return None;
        }

        let mut nested = Self::empty(
            layer.name.clone(),
            layer.precomp_width,
            layer.precomp_height,
            ctx,
        );
        nested.start_progress = layer.start_progress;
        nested.time_stretch = layer.time_stretch;
        nested.time_remap = layer.time_remap.as_ref().map(|track| {
            let mut value = AnimatableValue::new(KeyframeTrack::from_data(track, |v| *v));
            mark_on_change(&mut value, &ctx.invalidated);
            value
        });

        ctx.depth += 1;
        nested.fill(descriptors, ctx);
        ctx.depth -= 1;
        Some(nested)
    }

    fn empty(name: String, width: f32, height: f32, ctx: &BuildContext<'_>) -> Self {
        Self {
            name,
            width,
            height,
            start_progress: 0.0,
            time_stretch: 1.0,
            time_remap: None,
            duration_ms: ctx.duration_ms,
            nodes: Vec::new(),
            layers: Vec::new(),
            id_index: HashMap::new(),
            invalidated: ctx.invalidated.clone(),
            has_masks: Cell::new(Memo::Unknown),
            has_matte: Cell::new(Memo::Unknown),
            progress: 0.0,
            disposed: false,
            #[cfg(test)]
            walks: Cell::new(0),
        }
    }

    fn fill(&mut self, descriptors: &[LayerData], ctx: &mut BuildContext<'_>) {
        self.nodes.reserve(descriptors.len());

        // Back to front: a layer requesting a matte claims the next layer
        // visited, which is the one authored directly in front of it.
        let mut pending_matte: Option<LayerId> = None;
        for data in descriptors.iter().rev() {
            let Some(node) = LayerNode::build(data, ctx) else {
                continue;
            };
            let id = self.nodes.len();
            if self.id_index.insert(node.id(), id).is_some() {
                warn!(id = node.id(), "duplicate layer id, later lookups use the front-most");
            }
            self.nodes.push(node);

            if let Some(owner) = pending_matte.take() {
                self.nodes[owner].matte = Some(id);
                // A nested composition counts its host's matte as its own.
                if let LayerContent::PreComp(nested) = &self.nodes[owner].content {
                    nested.has_matte.set(Memo::Yes);
                }
            } else {
                self.layers.insert(0, id);
                if data.matte_type.requests_matte() {
                    pending_matte = Some(id);
                }
            }
        }
        if let Some(owner) = pending_matte {
            warn!(id = self.nodes[owner].id(), "matte requested but no layer follows, drawing unmatted");
        }

        self.resolve_parents();
    }

    fn resolve_parents(&mut self) {
        for i in 0..self.nodes.len() {
            let Some(parent_id) = self.nodes[i].parent_id() else {
                continue;
            };
            match self.id_index.get(&parent_id) {
                Some(&parent) if parent != i => self.nodes[i].parent = Some(parent),
                Some(_) => warn!(id = parent_id, "layer is its own parent, ignoring"),
                None => warn!(
                    id = self.nodes[i].id(),
                    parent_id,
                    "parent not found, treating layer as root-relative"
                ),
            }
        }

        // Cutting one link per cycle leaves every chain finite.
        let count = self.nodes.len();
        for start in 0..count {
            let mut cursor = self.nodes[start].parent;
            let mut steps = 0;
            while let Some(p) = cursor {
                if p == start {
                    warn!(id = self.nodes[start].id(), "parent cycle, detaching layer");
                    self.nodes[start].parent = None;
                    break;
                }
                steps += 1;
                if steps > count {
                    break;
                }
                cursor = self.nodes[p].parent;
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Top-level layers, front-to-back.
    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    pub fn node(&self, id: LayerId) -> Option<&LayerNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a node by its descriptor id.
    pub fn find(&self, descriptor_id: i64) -> Option<LayerId> {
        self.id_index.get(&descriptor_id).copied()
    }

    /// Progress as last received, before localization.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn has_time_remap(&self) -> bool {
        self.time_remap.is_some()
    }

    /// Returns whether anything changed value since the last call.
    pub fn take_invalidated(&self) -> bool {
        self.invalidated.replace(false)
    }

    /// Localizes `progress` to this timeline and pushes it to every layer.
    pub fn set_progress(&mut self, progress: f32) {
        if self.disposed {
            return;
        }
        self.progress = progress;

        let time_stretch = self.time_stretch;
        let stretched = |value: f32| {
            if time_stretch != 0.0 {
                value / time_stretch
            } else {
                value
            }
        };

        let mut local = progress;
        if let Some(remap) = &mut self.time_remap {
            remap.set_progress(stretched(progress));
            if self.duration_ms > 0.0 {
                local = *remap.value() * 1000.0 / self.duration_ms;
            }
        }
        local = stretched(local);
        local -= self.start_progress;

        for i in (0..self.layers.len()).rev() {
            let id = self.layers[i];
            self.nodes[id].set_progress(local);
            if let Some(matte) = self.nodes[id].matte {
                self.nodes[matte].set_progress(local);
            }
        }
    }

    /// Draws every layer back-to-front, clipped to the declared size mapped
    /// through `parent_matrix`. A zero declared size draws unclipped.
    #[instrument(skip_all, fields(name = %self.name))]
    pub fn draw(&self, canvas: &mut dyn Canvas, parent_matrix: Affine, parent_alpha: f32) {
        if self.disposed {
            return;
        }

        let declared = Rect::new(0.0, 0.0, self.width as f64, self.height as f64);
        let clip = (!is_empty_rect(declared)).then(|| parent_matrix.transform_rect_bbox(declared));

        canvas.save();
        for &id in self.layers.iter().rev() {
            if let Some(clip) = clip {
                if is_empty_rect(clip) || !canvas.clip_rect(clip) {
                    continue;
                }
            }
            self.draw_layer(id, canvas, parent_matrix, parent_alpha);
        }
        canvas.restore();
    }

    fn draw_layer(&self, id: LayerId, canvas: &mut dyn Canvas, parent_matrix: Affine, parent_alpha: f32) {
        let node = &self.nodes[id];
        let matrix = self.layer_matrix(id, parent_matrix);
        let alpha = parent_alpha * node.transform.opacity();
        if alpha <= 0.0 {
            return;
        }

        let matte = node.matte;
        if !node.has_masks_on_this_layer() && matte.is_none() {
            node.draw_content(canvas, matrix, alpha);
            return;
        }

        // Unmeasured content (text) leaves the bounds empty, which opens an unbounded layer.
        let bounds = self.layer_bounds(id, parent_matrix);
        canvas.save_layer(bounds, 1.0, LayerBlend::Normal);
        node.apply_masks(canvas, matrix);
        node.draw_content(canvas, matrix, alpha);
        if let Some(matte) = matte {
            let blend = match node.matte_type() {
                MatteType::Invert => LayerBlend::DstOut,
                _ => LayerBlend::DstIn,
            };
            canvas.save_layer(bounds, 1.0, blend);
            self.draw_layer(matte, canvas, parent_matrix, parent_alpha);
            canvas.restore();
        }
        canvas.restore();
    }

    /// `parent_matrix`, then the parent chain root-most first, then the layer's own transform.
    fn layer_matrix(&self, id: LayerId, parent_matrix: Affine) -> Affine {
        let mut chain = Vec::new();
        let mut cursor = self.nodes[id].parent;
        while let Some(parent) = cursor {
            if chain.len() >= self.nodes.len() {
                break;
            }
            chain.push(parent);
            cursor = self.nodes[parent].parent;
        }

        let inherited = chain
            .iter()
            .rev()
            .fold(parent_matrix, |acc, &parent| acc * self.nodes[parent].transform.matrix());
        inherited * self.nodes[id].transform.matrix()
    }

    fn layer_bounds(&self, id: LayerId, parent_matrix: Affine) -> Rect {
        let node = &self.nodes[id];
        let bounds = node.content_bounds(self.layer_matrix(id, parent_matrix));
        node.bounds.set(bounds);
        bounds
    }

    /// Union of the top-level layers' bounds. Empty layers do not contribute.
    pub fn bounds(&self, matrix: Affine) -> Rect {
        if self.disposed {
            return Rect::ZERO;
        }
        self.layers
            .iter()
            .rev()
            .map(|&id| self.layer_bounds(id, matrix))
            .fold(Rect::ZERO, union_bounds)
    }

    /// Whether any shape layer, directly or inside nested compositions, carries masks.
    pub fn has_masks(&self) -> bool {
        if let Some(known) = self.has_masks.get().known() {
            return known;
        }
        #[cfg(test)]
        self.walks.set(self.walks.get() + 1);

        let found = self.layers.iter().rev().any(|&id| {
            let node = &self.nodes[id];
            match &node.content {
                LayerContent::Shape(_) => node.has_masks_on_this_layer(),
                LayerContent::PreComp(nested) => nested.has_masks(),
                _ => false,
            }
        });
        self.has_masks.set(Memo::from(found));
        found
    }

    /// Whether the layer hosting this composition, or any of its top-level
    /// layers, is paired with a matte.
    pub fn has_matte(&self) -> bool {
        if let Some(known) = self.has_matte.get().known() {
            return known;
        }
        #[cfg(test)]
        self.walks.set(self.walks.get() + 1);

        let found = self
            .layers
            .iter()
            .rev()
            .any(|&id| self.nodes[id].has_matte_on_this_layer());
        self.has_matte.set(Memo::from(found));
        found
    }

    /// Replaces the time remap with a callback, or removes remapping with `None`.
    pub(crate) fn set_time_remap_callback(&mut self, callback: Option<ValueCallback<f32>>) {
        self.time_remap = callback.map(|callback| {
            let mut value = AnimatableValue::from_callback(callback);
            mark_on_change(&mut value, &self.invalidated);
            value
        });
        self.invalidated.set(true);
    }

    /// Releases every node. Later calls, progress updates and draws do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for node in &mut self.nodes {
            node.dispose();
        }
        if let Some(remap) = &mut self.time_remap {
            remap.clear_listeners();
        }
        self.nodes.clear();
        self.layers.clear();
        self.id_index.clear();
        self.disposed = true;
    }
}
