//! Hierarchical name paths for locating layers and shapes, and the typed
//! value overrides installed through them.
//!
//! A key path is a list of names, one per nesting level, where `*` matches
//! exactly one level and `**` matches any number of levels. Resolving a path
//! against a composition returns concrete paths that carry the indices needed
//! to reach each match again.

use crate::composition::CompositionLayer;
use crate::keyframe::{FrameInfo, ValueCallback};
use crate::layer::{LayerContent, LayerNode, ShapeItem};
use glam::{Vec2, Vec4};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

const GLOBSTAR: &str = "**";
const WILDCARD: &str = "*";

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    keys: Vec<String>,
    /// Arena or shape index per level. Empty until resolved.
    route: Vec<usize>,
}

impl KeyPath {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            route: Vec::new(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_resolved(&self) -> bool {
        !self.route.is_empty()
    }

    fn child(&self, key: &str, index: usize) -> Self {
        let mut next = self.clone();
        next.keys.push(key.to_string());
        next.route.push(index);
        next
    }

    fn ends_with_globstar(&self) -> bool {
        self.keys.last().is_some_and(|k| k == GLOBSTAR)
    }

    fn matches(&self, key: &str, depth: usize) -> bool {
        self.keys
            .get(depth)
            .is_some_and(|k| k == key || k == GLOBSTAR || k == WILDCARD)
    }

    fn increment_depth_by(&self, key: &str, depth: usize) -> usize {
        if self.keys[depth] != GLOBSTAR {
            return 1;
        }
        if depth == self.keys.len() - 1 {
            return 0;
        }
        if self.keys[depth + 1] == key {
            2
        } else {
            0
        }
    }

    fn fully_resolves_to(&self, key: &str, depth: usize) -> bool {
        let len = self.keys.len();
        if depth >= len {
            return false;
        }
        let is_last = depth == len - 1;
        let at_depth = &self.keys[depth];

        if at_depth != GLOBSTAR {
            let matches = at_depth == key || at_depth == WILDCARD;
            return (is_last || (depth + 2 == len && self.ends_with_globstar())) && matches;
        }

        if !is_last && self.keys[depth + 1] == key {
            return depth + 2 == len || (depth + 3 == len && self.ends_with_globstar());
        }
        if is_last {
            return true;
        }
        if depth + 1 < len - 1 {
            return false;
        }
        self.keys[depth + 1] == key
    }

    fn propagate_to_children(&self, depth: usize) -> bool {
        depth + 1 < self.keys.len() || self.keys[depth] == GLOBSTAR
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("."))
    }
}

/// A typed override for one animatable property.
#[derive(Clone)]
pub enum LottieProperty {
    /// Percent. On shapes, the fill opacity.
    Opacity(ValueCallback<f32>),
    /// Degrees.
    Rotation(ValueCallback<f32>),
    Position(ValueCallback<Vec2>),
    /// Percent.
    Scale(ValueCallback<Vec2>),
    Anchor(ValueCallback<Vec2>),
    /// Solid layer color or shape fill color.
    Color(ValueCallback<Vec4>),
    /// Seconds on a nested composition's timeline. `None` removes remapping.
    TimeRemap(Option<ValueCallback<f32>>),
}

impl fmt::Debug for LottieProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LottieProperty::Opacity(_) => "Opacity",
            LottieProperty::Rotation(_) => "Rotation",
            LottieProperty::Position(_) => "Position",
            LottieProperty::Scale(_) => "Scale",
            LottieProperty::Anchor(_) => "Anchor",
            LottieProperty::Color(_) => "Color",
            LottieProperty::TimeRemap(_) => "TimeRemap",
        };
        f.write_str(name)
    }
}

/// A callback that ignores timing and always returns `value`.
pub fn constant<T: Clone + 'static>(value: T) -> ValueCallback<T> {
    Rc::new(move |_: &FrameInfo<'_, T>| value.clone())
}

impl CompositionLayer {
    /// Every concrete path matching `key_path`, in draw-list order.
    pub fn resolve_key_path(&self, key_path: &KeyPath) -> Vec<KeyPath> {
        let mut found = Vec::new();
        if key_path.keys.is_empty() {
            return found;
        }
        self.resolve_children(key_path, 0, &mut found, &KeyPath::default());
        found
    }

    fn resolve_children(&self, key_path: &KeyPath, depth: usize, found: &mut Vec<KeyPath>, partial: &KeyPath) {
        for &id in &self.layers {
            resolve_layer(&self.nodes[id], id, key_path, depth, found, partial);
        }
    }

    /// Installs `property` on everything `key_path` resolves to. Returns how
    /// many properties were overridden.
    pub fn add_value_callback(&mut self, key_path: &KeyPath, property: LottieProperty) -> usize {
        let targets = if key_path.is_resolved() {
            vec![key_path.clone()]
        } else {
            self.resolve_key_path(key_path)
        };

        let applied = targets
            .iter()
            .filter(|target| self.apply_along(&target.route, &property))
            .count();
        debug!(key_path = %key_path, ?property, applied, "value callback installed");
        applied
    }

    fn apply_along(&mut self, route: &[usize], property: &LottieProperty) -> bool {
        let Some((&first, rest)) = route.split_first() else {
            return false;
        };
        let flag = self.invalidated.clone();
        let Some(node) = self.nodes.get_mut(first) else {
            return false;
        };
        if rest.is_empty() {
            return apply_to_layer(node, property, &flag);
        }
        match &mut node.content {
            LayerContent::PreComp(nested) => nested.apply_along(rest, property),
            LayerContent::Shape(items) if rest.len() == 1 => items
                .get_mut(rest[0])
                .is_some_and(|item| apply_to_shape(item, property)),
            _ => false,
        }
    }
}

fn resolve_layer(
    node: &LayerNode,
    id: usize,
    key_path: &KeyPath,
    depth: usize,
    found: &mut Vec<KeyPath>,
    partial: &KeyPath,
) {
    let name = node.name();
    if !key_path.matches(name, depth) {
        return;
    }
    let current = partial.child(name, id);
    if key_path.fully_resolves_to(name, depth) {
        found.push(current.clone());
    }
    if !key_path.propagate_to_children(depth) {
        return;
    }

    let depth = depth + key_path.increment_depth_by(name, depth);
    match node.content() {
        LayerContent::PreComp(nested) => nested.resolve_children(key_path, depth, found, &current),
        LayerContent::Shape(items) => {
            for (index, item) in items.iter().enumerate() {
                if key_path.matches(&item.name, depth) && key_path.fully_resolves_to(&item.name, depth) {
                    found.push(current.child(&item.name, index));
                }
            }
        }
        _ => {}
    }
}

fn apply_to_layer(node: &mut LayerNode, property: &LottieProperty, flag: &Rc<Cell<bool>>) -> bool {
    let transform = &mut node.transform;
    match property {
        LottieProperty::Opacity(cb) => transform.opacity.set_value_callback(Some(cb.clone())),
        LottieProperty::Rotation(cb) => transform.rotation.set_value_callback(Some(cb.clone())),
        LottieProperty::Scale(cb) => transform.scale.set_value_callback(Some(cb.clone())),
        LottieProperty::Anchor(cb) => transform.anchor.set_value_callback(Some(cb.clone())),
        LottieProperty::Position(cb) => transform.set_position_callback(cb.clone(), flag),
        LottieProperty::Color(cb) => match &mut node.content {
            LayerContent::Solid { color, .. } => color.set_value_callback(Some(cb.clone())),
            _ => return false,
        },
        LottieProperty::TimeRemap(cb) => match &mut node.content {
            LayerContent::PreComp(nested) => nested.set_time_remap_callback(cb.clone()),
            _ => return false,
        },
    }
    true
}

fn apply_to_shape(item: &mut ShapeItem, property: &LottieProperty) -> bool {
    let Some(fill) = &mut item.fill else {
        return false;
    };
    match property {
        LottieProperty::Color(cb) => fill.color.set_value_callback(Some(cb.clone())),
        LottieProperty::Opacity(cb) => fill.opacity.set_value_callback(Some(cb.clone())),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_data::model::{
        BezierPath, CompositionData, FillData, LayerContentData, LayerData, PositionData, ShapeData,
        TrackData,
    };
    use std::collections::HashMap;

    fn shape_layer(id: i64, name: &str, shapes: &[&str]) -> LayerData {
        LayerData::new(
            id,
            name,
            LayerContentData::Shape {
                shapes: shapes
                    .iter()
                    .map(|s| ShapeData {
                        name: s.to_string(),
                        path: TrackData::constant(BezierPath::rect(0.0, 0.0, 10.0, 10.0)),
                        fill: Some(FillData {
                            color: TrackData::constant([0.0, 0.0, 0.0, 1.0]),
                            opacity: TrackData::constant(100.0),
                        }),
                    })
                    .collect(),
            },
        )
    }

    fn fixture() -> CompositionLayer {
        let mut precomps = HashMap::new();
        precomps.insert(
            "group".to_string(),
            vec![
                shape_layer(10, "Star", &["Fill 1"]),
                LayerData::new(
                    11,
                    "Box",
                    LayerContentData::Solid {
                        width: 10.0,
                        height: 10.0,
                        color: [1.0, 0.0, 0.0, 1.0],
                    },
                ),
            ],
        );
        let data = CompositionData {
            name: None,
            width: 100.0,
            height: 100.0,
            start_frame: 0.0,
            end_frame: 10.0,
            frame_rate: 10.0,
            layers: vec![
                shape_layer(1, "Heart", &["Fill 1", "Outline"]),
                LayerData::new(2, "Group", LayerContentData::PreComp { ref_id: "group".into() }),
            ],
            precomps,
        };
        CompositionLayer::new(&data)
    }

    fn names(paths: &[KeyPath]) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_exact_path() {
        let root = fixture();
        let found = root.resolve_key_path(&KeyPath::new(["Heart", "Fill 1"]));
        assert_eq!(names(&found), vec!["Heart.Fill 1"]);
        assert!(found[0].is_resolved());
    }

    #[test]
    fn test_single_level_wildcard() {
        let root = fixture();
        let found = root.resolve_key_path(&KeyPath::new(["*"]));
        assert_eq!(names(&found), vec!["Heart", "Group"]);

        let found = root.resolve_key_path(&KeyPath::new(["Group", "*"]));
        assert_eq!(names(&found), vec!["Group.Star", "Group.Box"]);
    }

    #[test]
    fn test_globstar_matches_any_depth() {
        let root = fixture();
        let found = root.resolve_key_path(&KeyPath::new(["**", "Fill 1"]));
        assert_eq!(names(&found), vec!["Heart.Fill 1", "Group.Star.Fill 1"]);

        let everything = root.resolve_key_path(&KeyPath::new(["**"]));
        assert!(everything.len() >= 7, "got {:?}", names(&everything));
    }

    #[test]
    fn test_no_match() {
        let root = fixture();
        assert!(root.resolve_key_path(&KeyPath::new(["Nope"])).is_empty());
        assert!(root.resolve_key_path(&KeyPath::new(Vec::<String>::new())).is_empty());
    }

    #[test]
    fn test_color_callback_reaches_fills_and_solids() {
        let mut root = fixture();
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let applied = root.add_value_callback(&KeyPath::new(["**", "Fill 1"]), LottieProperty::Color(constant(red)));
        assert_eq!(applied, 2);

        let heart = &root.nodes[root.find(1).unwrap()];
        let LayerContent::Shape(items) = heart.content() else { panic!() };
        assert_eq!(*items[0].fill.as_ref().unwrap().color.value(), red);
        assert_eq!(*items[1].fill.as_ref().unwrap().color.value(), Vec4::new(0.0, 0.0, 0.0, 1.0));

        let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let applied = root.add_value_callback(&KeyPath::new(["Group", "Box"]), LottieProperty::Color(constant(blue)));
        assert_eq!(applied, 1);
        assert!(root.take_invalidated());
    }

    #[test]
    fn test_transform_callbacks_follow_progress() {
        let mut data_root = fixture();
        let applied = data_root.add_value_callback(
            &KeyPath::new(["Heart"]),
            LottieProperty::Rotation(Rc::new(|info: &FrameInfo<'_, f32>| info.overall_progress * 360.0)),
        );
        assert_eq!(applied, 1);
        data_root.set_progress(0.25);
        let heart = &data_root.nodes[data_root.find(1).unwrap()];
        assert_eq!(*heart.transform().rotation.value(), 90.0);

        // Properties a target does not have are not counted.
        assert_eq!(
            data_root.add_value_callback(&KeyPath::new(["Heart"]), LottieProperty::TimeRemap(None)),
            0
        );
    }

    #[test]
    fn test_position_callback_on_split_position() {
        let mut layer = LayerData::new(1, "Mover", LayerContentData::Null);
        layer.transform.position = PositionData::Split {
            x: TrackData::constant(3.0),
            y: TrackData::constant(4.0),
        };
        let mut root = CompositionLayer::new(&CompositionData {
            name: None,
            width: 10.0,
            height: 10.0,
            start_frame: 0.0,
            end_frame: 10.0,
            frame_rate: 10.0,
            layers: vec![layer],
            precomps: HashMap::new(),
        });
        root.add_value_callback(&KeyPath::new(["Mover"]), LottieProperty::Position(constant(Vec2::new(7.0, 8.0))));
        let node = &root.nodes[0];
        assert_eq!(node.transform().position.value(), Vec2::new(7.0, 8.0));
    }

    #[test]
    fn test_time_remap_override_on_precomp() {
        let mut root = fixture();
        let applied = root.add_value_callback(
            &KeyPath::new(["Group"]),
            LottieProperty::TimeRemap(Some(constant(0.5))),
        );
        assert_eq!(applied, 1);
        let group = &root.nodes[root.find(2).unwrap()];
        let LayerContent::PreComp(nested) = group.content() else { panic!() };
        assert!(nested.has_time_remap());
    }
}
