//! In-memory stand-in for an After Effects project.
//!
//! Items and layers are addressed with 1-based indices. New layers go on top
//! of the stack (index 1), pushing existing layers down.

use anyhow::{anyhow, bail};
use protocol::operation::{Rgb, ShapeType, TextAlignment};
use serde_json::{json, Map, Value};

pub const MAX_LISTED_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectSpec {
    pub display_name: &'static str,
    pub match_name: &'static str,
    pub category: &'static str,
    pub params: &'static [&'static str],
}

pub const EFFECT_CATALOG: &[EffectSpec] = &[
    EffectSpec {
        display_name: "Gaussian Blur",
        match_name: "ADBE Gaussian Blur 2",
        category: "Blur & Sharpen",
        params: &["Blurriness", "Blur Dimensions", "Repeat Edge Pixels"],
    },
    EffectSpec {
        display_name: "Camera Lens Blur",
        match_name: "ADBE Camera Lens Blur",
        category: "Blur & Sharpen",
        params: &["Blur Radius", "Iris Shape", "Iris Rotation"],
    },
    EffectSpec {
        display_name: "Directional Blur",
        match_name: "ADBE Directional Blur",
        category: "Blur & Sharpen",
        params: &["Direction", "Blur Length"],
    },
    EffectSpec {
        display_name: "Radial Blur",
        match_name: "ADBE Radial Blur",
        category: "Blur & Sharpen",
        params: &["Amount", "Center", "Type"],
    },
    EffectSpec {
        display_name: "Smart Blur",
        match_name: "ADBE Smart Blur",
        category: "Blur & Sharpen",
        params: &["Radius", "Threshold", "Mode"],
    },
    EffectSpec {
        display_name: "Unsharp Mask",
        match_name: "ADBE Unsharp Mask",
        category: "Blur & Sharpen",
        params: &["Amount", "Radius", "Threshold"],
    },
    EffectSpec {
        display_name: "Brightness & Contrast",
        match_name: "ADBE Brightness & Contrast 2",
        category: "Color Correction",
        params: &["Brightness", "Contrast", "Use Legacy"],
    },
    EffectSpec {
        display_name: "Color Balance (HLS)",
        match_name: "ADBE Color Balance (HLS)",
        category: "Color Correction",
        params: &["Hue", "Lightness", "Saturation"],
    },
    EffectSpec {
        display_name: "Levels",
        match_name: "ADBE Pro Levels2",
        category: "Color Correction",
        params: &["Input Black", "Input White", "Gamma", "Output Black", "Output White"],
    },
    EffectSpec {
        display_name: "Curves",
        match_name: "ADBE CurvesCustom",
        category: "Color Correction",
        params: &[],
    },
    EffectSpec {
        display_name: "Exposure",
        match_name: "ADBE Exposure2",
        category: "Color Correction",
        params: &["Exposure", "Offset", "Gamma Correction"],
    },
    EffectSpec {
        display_name: "Hue/Saturation",
        match_name: "ADBE HUE SATURATION",
        category: "Color Correction",
        params: &["Master Hue", "Master Saturation", "Master Lightness"],
    },
    EffectSpec {
        display_name: "Vibrance",
        match_name: "ADBE Vibrance",
        category: "Color Correction",
        params: &["Vibrance", "Saturation"],
    },
    EffectSpec {
        display_name: "Glow",
        match_name: "ADBE Glow",
        category: "Stylize",
        params: &["Glow Threshold", "Glow Radius", "Glow Intensity"],
    },
    EffectSpec {
        display_name: "Drop Shadow",
        match_name: "ADBE Drop Shadow",
        category: "Perspective",
        params: &["Shadow Color", "Opacity", "Direction", "Distance", "Softness"],
    },
    EffectSpec {
        display_name: "Bevel Alpha",
        match_name: "ADBE Bevel Alpha",
        category: "Perspective",
        params: &["Edge Thickness", "Light Angle", "Light Intensity"],
    },
    EffectSpec {
        display_name: "Noise",
        match_name: "ADBE Noise",
        category: "Noise & Grain",
        params: &["Amount of Noise", "Noise Type", "Clipping"],
    },
    EffectSpec {
        display_name: "Fractal Noise",
        match_name: "ADBE Fractal Noise",
        category: "Noise & Grain",
        params: &["Fractal Type", "Contrast", "Brightness", "Complexity"],
    },
];

pub fn effect_by_match_name(match_name: &str) -> Option<&'static EffectSpec> {
    EFFECT_CATALOG.iter().find(|spec| spec.match_name == match_name)
}

pub fn effect_by_display_name(name: &str) -> Option<&'static EffectSpec> {
    EFFECT_CATALOG
        .iter()
        .find(|spec| spec.display_name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: &'static str,
    pub match_name: &'static str,
    pub value: Value,
    pub keyframes: Vec<Keyframe>,
    pub expression: String,
}

impl Property {
    fn new(name: &'static str, match_name: &'static str, value: Value) -> Self {
        Self {
            name,
            match_name,
            value,
            keyframes: Vec::new(),
            expression: String::new(),
        }
    }

    pub fn is_time_varying(&self) -> bool {
        !self.keyframes.is_empty()
    }

    /// Adds a keyframe, replacing one already at `time`.
    pub fn set_value_at_time(&mut self, time: f64, value: Value) -> anyhow::Result<()> {
        check_property_value(self.name, &value)?;
        match self.keyframes.iter_mut().find(|key| key.time == time) {
            Some(key) => key.value = value,
            None => {
                let at = self.keyframes.partition_point(|key| key.time < time);
                self.keyframes.insert(at, Keyframe { time, value });
            }
        }
        Ok(())
    }

    pub fn set_value(&mut self, value: Value) -> anyhow::Result<()> {
        check_property_value(self.name, &value)?;
        self.value = value;
        Ok(())
    }
}

fn check_property_value(name: &str, value: &Value) -> anyhow::Result<()> {
    let numbers = |items: &Vec<Value>| items.iter().all(Value::is_number);
    let ok = match name {
        "Anchor Point" | "Position" | "Scale" => {
            matches!(value, Value::Array(items) if (2..=3).contains(&items.len()) && numbers(items))
        }
        _ => value.is_number(),
    };
    if !ok {
        let expected = match name {
            "Anchor Point" | "Position" | "Scale" => "an array of 2 or 3 numbers",
            _ => "a number",
        };
        bail!("value for '{name}' must be {expected}");
    }
    Ok(())
}

fn transform_group(position: &[f64]) -> Vec<Property> {
    vec![
        Property::new("Anchor Point", "ADBE Anchor Point", json!([0.0, 0.0])),
        Property::new("Position", "ADBE Position", json!(position)),
        Property::new("Scale", "ADBE Scale", json!([100.0, 100.0])),
        Property::new("Rotation", "ADBE Rotate Z", json!(0.0)),
        Property::new("Opacity", "ADBE Opacity", json!(100.0)),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDocument {
    pub text: String,
    pub font: String,
    pub font_size: f64,
    pub fill_color: Rgb,
    pub justification: TextAlignment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Text(TextDocument),
    Shape { shape_type: ShapeType },
    Solid { color: Rgb, size: [f64; 2] },
    Adjustment { size: [f64; 2] },
}

impl LayerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Text(_) => "text",
            LayerKind::Shape { .. } => "shape",
            LayerKind::Solid { .. } => "solid",
            LayerKind::Adjustment { .. } => "adjustment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub name: String,
    pub match_name: &'static str,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    pub enabled: bool,
    pub locked: bool,
    pub start_time: f64,
    pub in_point: f64,
    pub out_point: f64,
    pub transform: Vec<Property>,
    pub effects: Vec<Effect>,
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: LayerKind, position: &[f64]) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            locked: false,
            start_time: 0.0,
            in_point: 0.0,
            out_point: 0.0,
            transform: transform_group(position),
            effects: Vec::new(),
        }
    }

    /// Places the layer at `start_time`. A positive `duration` trims the out
    /// point, otherwise the layer runs to `comp_duration`.
    pub fn set_timing(&mut self, start_time: f64, duration: f64, comp_duration: f64) {
        self.start_time = start_time;
        self.in_point = start_time;
        self.out_point = if duration > 0.0 {
            start_time + duration
        } else {
            comp_duration
        };
    }

    /// Moves the layer in time, keeping its length.
    pub fn shift_start(&mut self, start_time: f64) {
        let delta = start_time - self.start_time;
        self.start_time = start_time;
        self.in_point += delta;
        self.out_point += delta;
    }

    /// Looks a transform property up by display name or match name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.transform
            .iter()
            .find(|prop| prop.name == name || prop.match_name == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.transform
            .iter_mut()
            .find(|prop| prop.name == name || prop.match_name == name)
    }

    pub fn property_value(&self, name: &str) -> Value {
        self.property(name)
            .map(|prop| prop.value.clone())
            .unwrap_or(Value::Null)
    }

    pub fn text_document_mut(&mut self) -> Option<&mut TextDocument> {
        match &mut self.kind {
            LayerKind::Text(doc) => Some(doc),
            _ => None,
        }
    }

    /// Adds an effect from the catalog. Repeated effects get a numeric suffix.
    pub fn add_effect(&mut self, spec: &EffectSpec) -> (usize, &mut Effect) {
        let same = self
            .effects
            .iter()
            .filter(|effect| effect.match_name == spec.match_name)
            .count();
        let name = if same == 0 {
            spec.display_name.to_string()
        } else {
            format!("{} {}", spec.display_name, same + 1)
        };
        self.effects.push(Effect {
            name,
            match_name: spec.match_name,
            params: Map::new(),
        });
        let index = self.effects.len();
        (index, &mut self.effects[index - 1])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_aspect: f64,
    pub duration: f64,
    pub frame_rate: f64,
    pub bg_color: Rgb,
    pub layers: Vec<Layer>,
}

impl Composition {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: u32) -> Option<&Layer> {
        let index = usize::try_from(index).ok()?.checked_sub(1)?;
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: u32) -> Option<&mut Layer> {
        let index = usize::try_from(index).ok()?.checked_sub(1)?;
        self.layers.get_mut(index)
    }

    pub fn layer_index_by_name(&self, name: &str) -> Option<u32> {
        self.layers
            .iter()
            .position(|layer| layer.name == name)
            .and_then(|pos| u32::try_from(pos + 1).ok())
    }

    /// Puts `layer` on top and returns its index, which is always 1.
    pub fn add_layer(&mut self, layer: Layer) -> u32 {
        self.layers.insert(0, layer);
        1
    }

    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "duration": self.duration,
            "frameRate": self.frame_rate,
            "width": self.width,
            "height": self.height,
            "numLayers": self.num_layers(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectItem {
    Composition(Composition),
    Solid { id: u32, name: String },
    Folder { id: u32, name: String },
}

impl ProjectItem {
    pub fn id(&self) -> u32 {
        match self {
            ProjectItem::Composition(comp) => comp.id,
            ProjectItem::Solid { id, .. } | ProjectItem::Folder { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProjectItem::Composition(comp) => &comp.name,
            ProjectItem::Solid { name, .. } | ProjectItem::Folder { name, .. } => name,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProjectItem::Composition(_) => "Composition",
            ProjectItem::Solid { .. } => "Solid",
            ProjectItem::Folder { .. } => "Folder",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub file_name: Option<String>,
    pub bits_per_channel: u8,
    items: Vec<ProjectItem>,
    active_comp: Option<u32>,
    next_id: u32,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            file_name: None,
            bits_per_channel: 8,
            items: Vec::new(),
            active_comp: None,
            next_id: 1,
        }
    }
}

impl Project {
    pub fn items(&self) -> &[ProjectItem] {
        &self.items
    }

    pub fn compositions(&self) -> impl Iterator<Item = &Composition> {
        self.items.iter().filter_map(|item| match item {
            ProjectItem::Composition(comp) => Some(comp),
            _ => None,
        })
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Adds a composition, makes it the active one and returns its id.
    pub fn add_composition(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        pixel_aspect: f64,
        duration: f64,
        frame_rate: f64,
    ) -> u32 {
        let id = self.allocate_id();
        self.items.push(ProjectItem::Composition(Composition {
            id,
            name: name.to_string(),
            width,
            height,
            pixel_aspect,
            duration,
            frame_rate,
            bg_color: [0.0, 0.0, 0.0],
            layers: Vec::new(),
        }));
        self.active_comp = Some(id);
        id
    }

    pub fn add_solid_source(&mut self, name: &str) -> u32 {
        let id = self.allocate_id();
        self.items.push(ProjectItem::Solid {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_folder(&mut self, name: &str) -> u32 {
        let id = self.allocate_id();
        self.items.push(ProjectItem::Folder {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn set_active(&mut self, comp_id: Option<u32>) {
        self.active_comp = comp_id;
    }

    pub fn active_comp(&self) -> Option<&Composition> {
        let id = self.active_comp?;
        self.comp_by_id(id)
    }

    fn comp_by_id(&self, id: u32) -> Option<&Composition> {
        self.compositions().find(|comp| comp.id == id)
    }

    pub fn comp_mut_by_id(&mut self, id: u32) -> Option<&mut Composition> {
        self.items.iter_mut().find_map(|item| match item {
            ProjectItem::Composition(comp) if comp.id == id => Some(comp),
            _ => None,
        })
    }

    /// The composition at 1-based project item `index`.
    pub fn comp_at(&mut self, index: u32) -> anyhow::Result<&mut Composition> {
        let position = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1));
        match position.and_then(|i| self.items.get_mut(i)) {
            Some(ProjectItem::Composition(comp)) => Ok(comp),
            _ => Err(anyhow!("Composition not found at index {index}")),
        }
    }

    /// The composition called `name`, falling back to the active one.
    pub fn resolve_comp_id(&self, name: &str) -> anyhow::Result<u32> {
        if let Some(comp) = self.compositions().find(|comp| comp.name == name) {
            return Ok(comp.id);
        }
        match self.active_comp() {
            Some(comp) => Ok(comp.id),
            None => bail!("No composition found with name '{name}' and no active composition"),
        }
    }

    /// A small project with one composition holding a text, shape and solid layer.
    pub fn demo() -> Self {
        let mut project = Project {
            file_name: Some("demo.aep".to_string()),
            ..Project::default()
        };
        project.add_folder("Assets");
        let solid = "Background";
        project.add_solid_source(solid);
        let main = project.add_composition("Main Comp", 1920, 1080, 1.0, 10.0, 30.0);
        project.add_composition("Lower Third", 1920, 1080, 1.0, 5.0, 25.0);
        project.set_active(Some(main));
        let Some(comp) = project.comp_mut_by_id(main) else {
            return project;
        };
        let duration = comp.duration;

        let mut background = Layer::new(
            solid,
            LayerKind::Solid {
                color: [0.1, 0.1, 0.1],
                size: [1920.0, 1080.0],
            },
            &[960.0, 540.0],
        );
        background.set_timing(0.0, 0.0, duration);
        comp.add_layer(background);

        let mut shape = Layer::new(
            "Shape Layer",
            LayerKind::Shape {
                shape_type: ShapeType::Ellipse,
            },
            &[960.0, 540.0],
        );
        shape.set_timing(0.0, 5.0, duration);
        comp.add_layer(shape);

        let title = TextDocument {
            text: "Hello After Effects".to_string(),
            font: "Arial".to_string(),
            font_size: 72.0,
            fill_color: [1.0, 1.0, 1.0],
            justification: TextAlignment::Center,
        };
        let mut text = Layer::new(title.text.clone(), LayerKind::Text(title), &[960.0, 300.0]);
        text.set_timing(0.0, 5.0, duration);
        comp.add_layer(text);
        project
    }
}
