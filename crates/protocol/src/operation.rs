//! Typed operation payloads, keyed by the wire command name.
//!
//! The command slot carries `{command, args}` as free-form JSON. Both sides
//! decode it here so that defaults and argument checks live in one place
//! instead of inside each handler.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type Rgb = [f64; 3];

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetProjectInfo,
    ListCompositions,
    GetLayerInfo,
    CreateComposition(CreateCompositionArgs),
    CreateTextLayer(CreateTextLayerArgs),
    CreateShapeLayer(CreateShapeLayerArgs),
    CreateSolidLayer(CreateSolidLayerArgs),
    SetLayerProperties(SetLayerPropertiesArgs),
    SetLayerKeyframe(SetLayerKeyframeArgs),
    SetLayerExpression(SetLayerExpressionArgs),
    ApplyEffect(ApplyEffectArgs),
    ApplyEffectTemplate(ApplyEffectTemplateArgs),
    BridgeTestEffects(LayerTarget),
}

impl Operation {
    pub const NAMES: [&'static str; 13] = [
        "getProjectInfo",
        "listCompositions",
        "getLayerInfo",
        "createComposition",
        "createTextLayer",
        "createShapeLayer",
        "createSolidLayer",
        "setLayerProperties",
        "setLayerKeyframe",
        "setLayerExpression",
        "applyEffect",
        "applyEffectTemplate",
        "bridgeTestEffects",
    ];

    pub fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    pub fn parse(name: &str, args: Value) -> Result<Self, OperationError> {
        let operation = match name {
            "getProjectInfo" => Operation::GetProjectInfo,
            "listCompositions" => Operation::ListCompositions,
            "getLayerInfo" => Operation::GetLayerInfo,
            "createComposition" => Operation::CreateComposition(decode(name, args)?),
            "createTextLayer" => Operation::CreateTextLayer(decode(name, args)?),
            "createShapeLayer" => Operation::CreateShapeLayer(decode(name, args)?),
            "createSolidLayer" => Operation::CreateSolidLayer(decode(name, args)?),
            "setLayerProperties" => Operation::SetLayerProperties(decode(name, args)?),
            "setLayerKeyframe" => Operation::SetLayerKeyframe(decode(name, args)?),
            "setLayerExpression" => Operation::SetLayerExpression(decode(name, args)?),
            "applyEffect" => Operation::ApplyEffect(decode(name, args)?),
            "applyEffectTemplate" => Operation::ApplyEffectTemplate(decode(name, args)?),
            "bridgeTestEffects" => Operation::BridgeTestEffects(decode(name, args)?),
            other => return Err(OperationError::Unknown(other.to_string())),
        };
        operation.validate()?;
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetProjectInfo => "getProjectInfo",
            Operation::ListCompositions => "listCompositions",
            Operation::GetLayerInfo => "getLayerInfo",
            Operation::CreateComposition(_) => "createComposition",
            Operation::CreateTextLayer(_) => "createTextLayer",
            Operation::CreateShapeLayer(_) => "createShapeLayer",
            Operation::CreateSolidLayer(_) => "createSolidLayer",
            Operation::SetLayerProperties(_) => "setLayerProperties",
            Operation::SetLayerKeyframe(_) => "setLayerKeyframe",
            Operation::SetLayerExpression(_) => "setLayerExpression",
            Operation::ApplyEffect(_) => "applyEffect",
            Operation::ApplyEffectTemplate(_) => "applyEffectTemplate",
            Operation::BridgeTestEffects(_) => "bridgeTestEffects",
        }
    }

    fn validate(&self) -> Result<(), OperationError> {
        let invalid = |message: &str| OperationError::InvalidArgs {
            command: self.name().to_string(),
            message: message.to_string(),
        };
        match self {
            Operation::CreateComposition(args) => {
                if args.width == 0 || args.height == 0 {
                    return Err(invalid("width and height must be positive"));
                }
                if args.pixel_aspect <= 0.0 || args.duration <= 0.0 || args.frame_rate <= 0.0 {
                    return Err(invalid(
                        "pixelAspect, duration and frameRate must be positive",
                    ));
                }
            }
            Operation::SetLayerProperties(args) => {
                if args.layer_index.is_none() && args.layer_name.is_none() {
                    return Err(invalid("layerIndex or layerName is required"));
                }
            }
            Operation::SetLayerKeyframe(args) => {
                check_indices(args.comp_index, args.layer_index).map_err(|m| invalid(m))?;
            }
            Operation::SetLayerExpression(args) => {
                check_indices(args.comp_index, args.layer_index).map_err(|m| invalid(m))?;
            }
            Operation::ApplyEffect(args) => {
                check_indices(args.comp_index, args.layer_index).map_err(|m| invalid(m))?;
                if args.effect_name.is_none()
                    && args.effect_match_name.is_none()
                    && args.preset_path.is_none()
                {
                    return Err(invalid(
                        "You must specify either effectName, effectMatchName, or presetPath",
                    ));
                }
            }
            Operation::ApplyEffectTemplate(args) => {
                check_indices(args.comp_index, args.layer_index).map_err(|m| invalid(m))?;
            }
            Operation::BridgeTestEffects(target) => {
                check_indices(target.comp_index, target.layer_index).map_err(|m| invalid(m))?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn check_indices(comp_index: u32, layer_index: u32) -> Result<(), &'static str> {
    if comp_index == 0 || layer_index == 0 {
        return Err("compIndex and layerIndex are 1-based");
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(command: &str, args: Value) -> Result<T, OperationError> {
    let args = match args {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(args).map_err(|err| OperationError::InvalidArgs {
        command: command.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    Unknown(String),
    InvalidArgs { command: String, message: String },
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Unknown(name) => write!(f, "Unknown command: {name}"),
            OperationError::InvalidArgs { command, message } => {
                write!(f, "invalid arguments for {command}: {message}")
            }
        }
    }
}

impl std::error::Error for OperationError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompositionArgs {
    #[serde(default = "default_comp_name")]
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "one")]
    pub pixel_aspect: f64,
    #[serde(default = "default_comp_duration")]
    pub duration: f64,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgb8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextLayerArgs {
    #[serde(default)]
    pub comp_name: String,
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_position")]
    pub position: Vec<f64>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "white")]
    pub color: Rgb,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_layer_duration")]
    pub duration: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default)]
    pub alignment: TextAlignment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Ellipse,
    Polygon,
    Star,
}

impl ShapeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeType::Rectangle => "rectangle",
            ShapeType::Ellipse => "ellipse",
            ShapeType::Polygon => "polygon",
            ShapeType::Star => "star",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateShapeLayerArgs {
    #[serde(default)]
    pub comp_name: String,
    #[serde(default)]
    pub shape_type: ShapeType,
    #[serde(default = "default_position")]
    pub position: Vec<f64>,
    #[serde(default = "default_shape_size")]
    pub size: [f64; 2],
    #[serde(default = "red")]
    pub fill_color: Rgb,
    #[serde(default)]
    pub stroke_color: Rgb,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_layer_duration")]
    pub duration: f64,
    #[serde(default = "default_shape_name")]
    pub name: String,
    #[serde(default = "default_points")]
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSolidLayerArgs {
    #[serde(default)]
    pub comp_name: String,
    #[serde(default = "white")]
    pub color: Rgb,
    #[serde(default = "default_solid_name")]
    pub name: String,
    #[serde(default = "default_position")]
    pub position: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f64; 2]>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_layer_duration")]
    pub duration: f64,
    #[serde(default)]
    pub is_adjustment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetLayerPropertiesArgs {
    #[serde(default)]
    pub comp_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<Rgb>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetLayerKeyframeArgs {
    pub comp_index: u32,
    pub layer_index: u32,
    pub property_name: String,
    pub time_in_seconds: f64,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetLayerExpressionArgs {
    pub comp_index: u32,
    pub layer_index: u32,
    pub property_name: String,
    pub expression_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEffectArgs {
    #[serde(default = "first")]
    pub comp_index: u32,
    #[serde(default = "first")]
    pub layer_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_match_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_path: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub effect_settings: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EffectTemplate {
    GaussianBlur,
    DirectionalBlur,
    ColorBalance,
    BrightnessContrast,
    Curves,
    Glow,
    DropShadow,
    CinematicLook,
    TextPop,
}

impl EffectTemplate {
    pub const ALL: [EffectTemplate; 9] = [
        EffectTemplate::GaussianBlur,
        EffectTemplate::DirectionalBlur,
        EffectTemplate::ColorBalance,
        EffectTemplate::BrightnessContrast,
        EffectTemplate::Curves,
        EffectTemplate::Glow,
        EffectTemplate::DropShadow,
        EffectTemplate::CinematicLook,
        EffectTemplate::TextPop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectTemplate::GaussianBlur => "gaussian-blur",
            EffectTemplate::DirectionalBlur => "directional-blur",
            EffectTemplate::ColorBalance => "color-balance",
            EffectTemplate::BrightnessContrast => "brightness-contrast",
            EffectTemplate::Curves => "curves",
            EffectTemplate::Glow => "glow",
            EffectTemplate::DropShadow => "drop-shadow",
            EffectTemplate::CinematicLook => "cinematic-look",
            EffectTemplate::TextPop => "text-pop",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEffectTemplateArgs {
    #[serde(default = "first")]
    pub comp_index: u32,
    #[serde(default = "first")]
    pub layer_index: u32,
    pub template_name: EffectTemplate,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_settings: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayerTarget {
    #[serde(default = "first")]
    pub comp_index: u32,
    #[serde(default = "first")]
    pub layer_index: u32,
}

impl Default for LayerTarget {
    fn default() -> Self {
        Self {
            comp_index: 1,
            layer_index: 1,
        }
    }
}

fn default_comp_name() -> String {
    "New Composition".to_string()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn one() -> f64 {
    1.0
}

fn first() -> u32 {
    1
}

fn default_comp_duration() -> f64 {
    10.0
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_text() -> String {
    "Text Layer".to_string()
}

fn default_position() -> Vec<f64> {
    vec![960.0, 540.0]
}

fn default_font_size() -> f64 {
    72.0
}

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_layer_duration() -> f64 {
    5.0
}

fn default_shape_size() -> [f64; 2] {
    [200.0, 200.0]
}

fn default_shape_name() -> String {
    "Shape Layer".to_string()
}

fn default_solid_name() -> String {
    "Solid Layer".to_string()
}

fn default_points() -> u32 {
    5
}

fn white() -> Rgb {
    [1.0, 1.0, 1.0]
}

fn red() -> Rgb {
    [1.0, 0.0, 0.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_names_are_distinguished_from_bad_args() {
        let err = Operation::parse("doesNotExist", json!({})).unwrap_err();
        assert_eq!(err, OperationError::Unknown("doesNotExist".to_string()));
        assert_eq!(err.to_string(), "Unknown command: doesNotExist");

        let err = Operation::parse("setLayerKeyframe", json!({ "compIndex": 1 })).unwrap_err();
        assert!(matches!(err, OperationError::InvalidArgs { .. }));
    }

    #[test]
    fn defaults_are_applied_at_the_boundary() {
        let op = Operation::parse("createComposition", json!({ "name": "Intro" })).expect("parse");
        let Operation::CreateComposition(args) = op else {
            panic!("unexpected operation");
        };
        assert_eq!(args.width, 1920);
        assert_eq!(args.height, 1080);
        assert_eq!(args.frame_rate, 30.0);
        assert!(args.background_color.is_none());
    }

    #[test]
    fn null_args_decode_like_empty_object() {
        let op = Operation::parse("bridgeTestEffects", Value::Null).expect("parse");
        assert_eq!(op, Operation::BridgeTestEffects(LayerTarget::default()));
    }

    #[test]
    fn effect_requires_some_identifier() {
        let err = Operation::parse("applyEffect", json!({ "compIndex": 1, "layerIndex": 1 }))
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("effectName, effectMatchName, or presetPath"));
    }

    #[test]
    fn templates_use_kebab_case_names() {
        let op = Operation::parse(
            "applyEffectTemplate",
            json!({ "compIndex": 2, "layerIndex": 3, "templateName": "drop-shadow" }),
        )
        .expect("parse");
        let Operation::ApplyEffectTemplate(args) = op else {
            panic!("unexpected operation");
        };
        assert_eq!(args.template_name, EffectTemplate::DropShadow);
        assert_eq!(args.template_name.as_str(), "drop-shadow");

        let err = Operation::parse(
            "applyEffectTemplate",
            json!({ "templateName": "sparkles" }),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidArgs { .. }));
    }

    #[test]
    fn zero_indices_are_rejected() {
        let err = Operation::parse(
            "setLayerExpression",
            json!({
                "compIndex": 0,
                "layerIndex": 1,
                "propertyName": "Position",
                "expressionString": "wiggle(3, 30)"
            }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("1-based"));
    }

    #[test]
    fn every_name_parses_with_minimal_args() {
        let minimal = |name: &str| match name {
            "setLayerProperties" => json!({ "layerIndex": 1 }),
            "setLayerKeyframe" => json!({
                "compIndex": 1, "layerIndex": 1, "propertyName": "Opacity",
                "timeInSeconds": 1.0, "value": 25
            }),
            "setLayerExpression" => json!({
                "compIndex": 1, "layerIndex": 1, "propertyName": "Position",
                "expressionString": ""
            }),
            "applyEffect" => json!({ "effectMatchName": "ADBE Glow" }),
            "applyEffectTemplate" => json!({ "templateName": "glow" }),
            _ => json!({}),
        };
        for name in Operation::NAMES {
            let op = Operation::parse(name, minimal(name)).expect(name);
            assert_eq!(op.name(), name);
        }
    }
}
