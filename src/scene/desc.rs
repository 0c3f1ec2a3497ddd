use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::config::EngineOpts;
use crate::foundation::core::Argb;
use crate::foundation::error::{PaintError, PaintResult};
use crate::render::buffer::RasterBuffer;
use crate::render::composite::CompositeOp;
use crate::render::filter::{self, Filter};
use crate::scene::node::{LeafContent, NodeId, NodeKind};
use crate::scene::stage::Stage;
use crate::text::font::{BitmapFont, FontRegistry, builtin_font};

/// Straight-alpha ARGB color: `"#rrggbb"`, `"#rrggbbaa"`, `[r, g, b]` or `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ColorDef(pub(crate) Argb);

impl<'de> Deserialize<'de> for ColorDef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Arr(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map(ColorDef).map_err(serde::de::Error::custom),
            Repr::Arr(v) => match v[..] {
                [r, g, b] => Ok(ColorDef(pack(r, g, b, 0xff))),
                [r, g, b, a] => Ok(ColorDef(pack(r, g, b, a))),
                _ => Err(serde::de::Error::custom(
                    "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

fn pack(r: u8, g: u8, b: u8, a: u8) -> Argb {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

fn parse_hex(s: &str) -> Result<Argb, String> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if !s.is_ascii() || (s.len() != 6 && s.len() != 8) {
        return Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned());
    }
    let r = hex_byte(&s[0..2])?;
    let g = hex_byte(&s[2..4])?;
    let b = hex_byte(&s[4..6])?;
    let a = if s.len() == 8 { hex_byte(&s[6..8])? } else { 0xff };
    Ok(pack(r, g, b, a))
}

/// `[x, y]` or `{ "x": .., "y": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Vec2Def {
    pub(crate) x: f64,
    pub(crate) y: f64,
}

impl<'de> Deserialize<'de> for Vec2Def {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Arr([f64; 2]),
            Obj { x: f64, y: f64 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Arr([x, y]) => Ok(Self { x, y }),
            Repr::Obj { x, y } => Ok(Self { x, y }),
        }
    }
}

fn zero() -> Vec2Def {
    Vec2Def { x: 0.0, y: 0.0 }
}

fn unit_scale() -> Vec2Def {
    Vec2Def { x: 1.0, y: 1.0 }
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn three() -> u32 {
    3
}

fn shadow_offset() -> i32 {
    3
}

fn shadow_color() -> ColorDef {
    ColorDef(0x8000_0000)
}

/// Filter applied to a group's back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum FilterDef {
    Blur {
        #[serde(default = "three")]
        radius: u32,
    },
    DropShadow {
        #[serde(default = "three")]
        radius: u32,
        #[serde(default = "shadow_offset")]
        offset_x: i32,
        #[serde(default = "shadow_offset")]
        offset_y: i32,
        #[serde(default = "shadow_color")]
        color: ColorDef,
    },
    Glow {
        #[serde(default = "three")]
        radius: u32,
    },
}

impl FilterDef {
    fn radius(&self) -> u32 {
        match *self {
            Self::Blur { radius } | Self::Glow { radius } | Self::DropShadow { radius, .. } => {
                radius
            }
        }
    }

    pub(crate) fn to_filter(self) -> Filter {
        match self {
            Self::Blur { radius } => Filter::Blur { radius },
            Self::DropShadow {
                radius,
                offset_x,
                offset_y,
                color: ColorDef(color),
            } => Filter::DropShadow {
                radius,
                offset_x,
                offset_y,
                color,
            },
            Self::Glow { radius } => Filter::Glow { radius },
        }
    }
}

/// A bitmap font: the built-in one, or a glyph strip taken from `images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FontDef {
    pub(crate) image: Option<String>,
    pub(crate) first_char: Option<char>,
    pub(crate) last_char: Option<char>,
    pub(crate) positions: Vec<i32>,
    pub(crate) tracking: i32,
    pub(crate) tint: Option<ColorDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum NodeKindDef {
    Fill,
    Image {
        image: String,
    },
    Text {
        text: String,
        #[serde(default)]
        font: Option<String>,
    },
    Group {
        #[serde(default)]
        children: Vec<NodeDef>,
        #[serde(default)]
        clip_to_bounds: bool,
        #[serde(default)]
        back_buffered: bool,
        #[serde(default)]
        filter: Option<FilterDef>,
        #[serde(default)]
        back_composite: CompositeOp,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeDef {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) x: f64,
    #[serde(default)]
    pub(crate) y: f64,
    /// Defaults to the natural size of images and text, 0 otherwise.
    #[serde(default)]
    pub(crate) width: Option<f64>,
    #[serde(default)]
    pub(crate) height: Option<f64>,
    #[serde(default = "zero")]
    pub(crate) anchor: Vec2Def,
    #[serde(default = "unit_scale")]
    pub(crate) scale: Vec2Def,
    #[serde(default)]
    pub(crate) rotation_deg: f64,
    #[serde(default = "one")]
    pub(crate) opacity: f64,
    #[serde(default = "yes")]
    pub(crate) visible: bool,
    #[serde(default)]
    pub(crate) background: Option<ColorDef>,
    #[serde(default)]
    pub(crate) composite: Option<CompositeOp>,
    #[serde(default)]
    pub(crate) pixel_snapping: bool,
    #[serde(flatten)]
    pub(crate) kind: NodeKindDef,
}

/// Property changes applied to the node named `target` after the first frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UpdateDef {
    pub(crate) target: String,
    pub(crate) remove: bool,
    pub(crate) x: Option<f64>,
    pub(crate) y: Option<f64>,
    pub(crate) width: Option<f64>,
    pub(crate) height: Option<f64>,
    pub(crate) anchor: Option<Vec2Def>,
    pub(crate) scale: Option<Vec2Def>,
    pub(crate) rotation_deg: Option<f64>,
    pub(crate) opacity: Option<f64>,
    pub(crate) visible: Option<bool>,
    pub(crate) background: Option<ColorDef>,
    pub(crate) text: Option<String>,
    /// Nodes appended to the target group.
    pub(crate) add: Vec<NodeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SceneDef {
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default)]
    pub(crate) opts: EngineOpts,
    #[serde(default)]
    pub(crate) images: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub(crate) fonts: BTreeMap<String, FontDef>,
    #[serde(default)]
    pub(crate) background: Option<ColorDef>,
    #[serde(default)]
    pub(crate) nodes: Vec<NodeDef>,
    #[serde(default)]
    pub(crate) updates: Vec<UpdateDef>,
}

/// A scene file: surface size, engine options, assets, a node tree and a list of updates.
///
/// ```json
/// {
///   "width": 64, "height": 48,
///   "background": "#202020",
///   "nodes": [
///     { "type": "fill", "name": "box", "x": 4, "y": 4, "width": 10, "height": 10,
///       "background": "#ff0000" }
///   ],
///   "updates": [ { "target": "box", "x": 20 } ]
/// }
/// ```
///
/// Relative image paths resolve against the directory of the scene file.
#[derive(Debug, Clone)]
pub struct SceneDesc {
    def: SceneDef,
    base_dir: Option<PathBuf>,
}

struct Assets {
    images: HashMap<String, RasterBuffer>,
}

impl SceneDesc {
    /// Parse a scene from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> PaintResult<Self> {
        let def: SceneDef = serde_json::from_reader(r)
            .map_err(|e| PaintError::validation(format!("parse scene JSON: {e}")))?;
        Ok(Self {
            def,
            base_dir: None,
        })
    }

    /// Parse a scene from a JSON file on disk.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn from_path(path: impl AsRef<Path>) -> PaintResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading scene");
        let f = File::open(path).map_err(|e| {
            PaintError::validation(format!("open scene JSON '{}': {e}", path.display()))
        })?;
        let mut desc = Self::from_reader(BufReader::new(f))?;
        desc.base_dir = path.parent().map(Path::to_path_buf);
        Ok(desc)
    }

    pub fn width(&self) -> u32 {
        self.def.width
    }

    pub fn height(&self) -> u32 {
        self.def.height
    }

    pub fn opts(&self) -> &EngineOpts {
        &self.def.opts
    }

    /// Replaces the embedded options, e.g. after applying environment overrides.
    pub fn set_opts(&mut self, opts: EngineOpts) {
        self.def.opts = opts;
    }

    pub fn update_count(&self) -> usize {
        self.def.updates.len()
    }

    /// Checks sizes, options and every name reference.
    pub fn validate(&self) -> PaintResult<()> {
        if self.def.width == 0 || self.def.height == 0 {
            return Err(PaintError::validation("scene width and height must be > 0"));
        }
        self.def.opts.validate()?;

        for (name, font) in &self.def.fonts {
            if let Some(image) = &font.image {
                if !self.def.images.contains_key(image) {
                    return Err(PaintError::validation(format!(
                        "font '{name}' references unknown image '{image}'"
                    )));
                }
                if font.first_char.is_none() || font.last_char.is_none() {
                    return Err(PaintError::validation(format!(
                        "font '{name}' needs first_char and last_char"
                    )));
                }
            }
        }

        let mut names = Vec::new();
        for node in &self.def.nodes {
            self.validate_node(node, &mut names)?;
        }
        for (i, update) in self.def.updates.iter().enumerate() {
            for node in &update.add {
                self.validate_node(node, &mut names)?;
            }
            if !names.contains(&update.target.as_str()) {
                return Err(PaintError::validation(format!(
                    "updates[{i}] targets unknown node '{}'",
                    update.target
                )));
            }
        }
        Ok(())
    }

    fn validate_node<'a>(&'a self, node: &'a NodeDef, names: &mut Vec<&'a str>) -> PaintResult<()> {
        if let Some(name) = &node.name {
            names.push(name);
        }
        if !(0.0..=1.0).contains(&node.opacity) {
            return Err(PaintError::validation(format!(
                "node '{}' opacity must be within 0..=1",
                node.name.as_deref().unwrap_or("?")
            )));
        }
        match &node.kind {
            NodeKindDef::Image { image } if !self.def.images.contains_key(image) => Err(
                PaintError::validation(format!("node references unknown image '{image}'")),
            ),
            NodeKindDef::Text {
                font: Some(font), ..
            } if !self.def.fonts.contains_key(font) => Err(PaintError::validation(format!(
                "node references unknown font '{font}'"
            ))),
            NodeKindDef::Group {
                filter: Some(f), ..
            } if f.radius() > filter::MAX_RADIUS => Err(PaintError::validation(format!(
                "filter radius {} exceeds {}",
                f.radius(),
                filter::MAX_RADIUS
            ))),
            NodeKindDef::Group { children, .. } => {
                for child in children {
                    self.validate_node(child, names)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_path(&self, p: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.to_path_buf(),
        }
    }

    fn load_assets(&self) -> PaintResult<Assets> {
        let mut images = HashMap::new();
        for (name, path) in &self.def.images {
            let image = RasterBuffer::load_png(&self.resolve_path(path))
                .map_err(|e| PaintError::asset(format!("image '{name}': {e}")))?;
            images.insert(name.clone(), image);
        }
        Ok(Assets { images })
    }

    fn build_fonts(&self, assets: &Assets) -> PaintResult<FontRegistry> {
        let mut fonts = FontRegistry::new();
        for (name, def) in &self.def.fonts {
            let font = match (&def.image, def.first_char, def.last_char) {
                (Some(image), Some(first), Some(last)) => {
                    let strip = assets.images.get(image).ok_or_else(|| {
                        PaintError::validation(format!("font '{name}' image '{image}' missing"))
                    })?;
                    BitmapFont::new(strip.share(), first, last, def.positions.clone(), def.tracking)?
                }
                _ => builtin_font(),
            };
            let font = match def.tint {
                Some(ColorDef(rgb)) => font.tint(rgb),
                None => font,
            };
            fonts.register(name.clone(), Arc::new(font));
        }
        Ok(fonts)
    }

    /// Validates, loads assets and builds a stage holding the node tree.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(&self) -> PaintResult<Stage> {
        self.validate()?;
        let assets = self.load_assets()?;
        let fonts = self.build_fonts(&assets)?;
        let mut stage = Stage::with_fonts(
            self.def.width,
            self.def.height,
            self.def.opts.clone(),
            fonts,
        )?;

        let root = stage.tree().root();
        if let Some(ColorDef(bg)) = self.def.background {
            stage.tree_mut().node_mut(root).set_background(bg);
        }
        for node in &self.def.nodes {
            add_node(&mut stage, &assets, root, node);
        }
        tracing::debug!(nodes = stage.tree().len(), "scene built");
        Ok(stage)
    }

    /// Applies the `updates` list to a stage built from this scene. Images referenced by added
    /// nodes are loaded again.
    pub fn apply_updates(&self, stage: &mut Stage) -> PaintResult<()> {
        let assets = if self.def.updates.iter().any(|u| !u.add.is_empty()) {
            self.load_assets()?
        } else {
            Assets {
                images: HashMap::new(),
            }
        };
        for update in &self.def.updates {
            let target = stage.tree().find(&update.target).ok_or_else(|| {
                PaintError::validation(format!("update targets unknown node '{}'", update.target))
            })?;
            apply_update(stage, &assets, target, update);
        }
        Ok(())
    }
}

fn add_node(stage: &mut Stage, assets: &Assets, parent: NodeId, def: &NodeDef) -> NodeId {
    let (content, natural) = match &def.kind {
        NodeKindDef::Fill => (Some(LeafContent::Fill), None),
        NodeKindDef::Image { image } => match assets.images.get(image) {
            Some(img) => (
                Some(LeafContent::Image(img.share())),
                Some((f64::from(img.width()), f64::from(img.height()))),
            ),
            None => (Some(LeafContent::Fill), None),
        },
        NodeKindDef::Text { text, font } => {
            let glyphs = stage.fonts().resolve(font.as_deref());
            let size = (
                f64::from(glyphs.string_width(text)),
                f64::from(glyphs.height()),
            );
            (
                Some(LeafContent::Text {
                    text: text.clone(),
                    font: font.clone(),
                }),
                Some(size),
            )
        }
        NodeKindDef::Group { .. } => (None, None),
    };

    let tree = stage.tree_mut();
    let id = match content {
        Some(content) => tree.create_leaf(content),
        None => tree.create_group(),
    };
    {
        let node = tree.node_mut(id);
        if let Some(name) = &def.name {
            node.set_name(name.clone());
        }
        let (nw, nh) = natural.unwrap_or((0.0, 0.0));
        node.set_location(def.x, def.y);
        node.set_size(def.width.unwrap_or(nw), def.height.unwrap_or(nh));
        node.set_anchor(def.anchor.x, def.anchor.y);
        node.set_scale(def.scale.x, def.scale.y);
        node.set_angle(def.rotation_deg.to_radians());
        node.set_opacity(def.opacity);
        node.set_visible(def.visible);
        node.set_composite(def.composite);
        node.set_pixel_snapping(def.pixel_snapping);
        if let Some(ColorDef(bg)) = def.background {
            node.set_background(bg);
        }
        if let NodeKindDef::Group {
            clip_to_bounds,
            back_buffered,
            filter,
            back_composite,
            ..
        } = &def.kind
        {
            node.set_clip_to_bounds(*clip_to_bounds);
            node.set_back_buffered(*back_buffered);
            node.set_filter(filter.map(FilterDef::to_filter));
            node.set_back_composite(*back_composite);
        }
    }
    tree.add_child(parent, id);

    if let NodeKindDef::Group { children, .. } = &def.kind {
        for child in children {
            add_node(stage, assets, id, child);
        }
    }
    id
}

fn apply_update(stage: &mut Stage, assets: &Assets, target: NodeId, u: &UpdateDef) {
    if u.remove {
        stage.tree_mut().remove_child(target);
        return;
    }
    {
        let node = stage.tree_mut().node_mut(target);
        if u.x.is_some() || u.y.is_some() {
            let (x, y) = (u.x.unwrap_or(node.x()), u.y.unwrap_or(node.y()));
            node.set_location(x, y);
        }
        if u.width.is_some() || u.height.is_some() {
            let w = u.width.unwrap_or(node.width());
            let h = u.height.unwrap_or(node.height());
            node.set_size(w, h);
        }
        if let Some(a) = u.anchor {
            node.set_anchor(a.x, a.y);
        }
        if let Some(s) = u.scale {
            node.set_scale(s.x, s.y);
        }
        if let Some(deg) = u.rotation_deg {
            node.set_angle(deg.to_radians());
        }
        if let Some(o) = u.opacity {
            node.set_opacity(o);
        }
        if let Some(v) = u.visible {
            node.set_visible(v);
        }
        if let Some(ColorDef(bg)) = u.background {
            node.set_background(bg);
        }
        if let Some(text) = &u.text
            && let NodeKind::Leaf(LeafContent::Text { font, .. }) = node.kind()
        {
            let font = font.clone();
            node.set_content(LeafContent::Text {
                text: text.clone(),
                font,
            });
        }
    }
    for def in &u.add {
        add_node(stage, assets, target, def);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/desc.rs"]
mod tests;
