use protocol::operation::EffectTemplate;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEffect {
    pub match_name: &'static str,
    pub settings: Map<String, Value>,
}

impl TemplateEffect {
    fn new(match_name: &'static str, settings: Value) -> Self {
        let settings = match settings {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            match_name,
            settings,
        }
    }
}

/// The effects a template expands to. Custom settings only override a
/// default when they are set to something other than zero, false or empty.
pub fn expand(template: EffectTemplate, custom: &Map<String, Value>) -> Vec<TemplateEffect> {
    let or = |key: &str, default: Value| custom_or(custom, key, default);
    match template {
        EffectTemplate::GaussianBlur => vec![TemplateEffect::new(
            "ADBE Gaussian Blur 2",
            json!({ "Blurriness": or("blurriness", json!(20)) }),
        )],
        EffectTemplate::DirectionalBlur => vec![TemplateEffect::new(
            "ADBE Directional Blur",
            json!({
                "Direction": or("direction", json!(0)),
                "Blur Length": or("length", json!(10)),
            }),
        )],
        EffectTemplate::ColorBalance => vec![TemplateEffect::new(
            "ADBE Color Balance (HLS)",
            json!({
                "Hue": or("hue", json!(0)),
                "Lightness": or("lightness", json!(0)),
                "Saturation": or("saturation", json!(0)),
            }),
        )],
        EffectTemplate::BrightnessContrast => vec![TemplateEffect::new(
            "ADBE Brightness & Contrast 2",
            json!({
                "Brightness": or("brightness", json!(0)),
                "Contrast": or("contrast", json!(0)),
                "Use Legacy": false,
            }),
        )],
        EffectTemplate::Curves => vec![TemplateEffect::new("ADBE CurvesCustom", json!({}))],
        EffectTemplate::Glow => vec![TemplateEffect::new(
            "ADBE Glow",
            json!({
                "Glow Threshold": or("threshold", json!(50)),
                "Glow Radius": or("radius", json!(15)),
                "Glow Intensity": or("intensity", json!(1)),
            }),
        )],
        EffectTemplate::DropShadow => vec![TemplateEffect::new(
            "ADBE Drop Shadow",
            json!({
                "Shadow Color": or("color", json!([0, 0, 0, 1])),
                "Opacity": or("opacity", json!(50)),
                "Direction": or("direction", json!(135)),
                "Distance": or("distance", json!(10)),
                "Softness": or("softness", json!(10)),
            }),
        )],
        EffectTemplate::CinematicLook => vec![
            TemplateEffect::new("ADBE CurvesCustom", json!({})),
            TemplateEffect::new(
                "ADBE Vibrance",
                json!({ "Vibrance": 15, "Saturation": -5 }),
            ),
        ],
        EffectTemplate::TextPop => vec![
            TemplateEffect::new(
                "ADBE Drop Shadow",
                json!({
                    "Shadow Color": [0, 0, 0, 1],
                    "Opacity": 75,
                    "Distance": 5,
                    "Softness": 10,
                }),
            ),
            TemplateEffect::new(
                "ADBE Glow",
                json!({
                    "Glow Threshold": 50,
                    "Glow Radius": 10,
                    "Glow Intensity": 1.5,
                }),
            ),
        ],
    }
}

fn custom_or(custom: &Map<String, Value>, key: &str, default: Value) -> Value {
    match custom.get(key) {
        Some(value) if is_set(value) => value.clone(),
        _ => default,
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_settings_override_defaults() {
        let custom = json!({ "blurriness": 42 });
        let effects = expand(EffectTemplate::GaussianBlur, custom.as_object().unwrap());
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].settings["Blurriness"], json!(42));
    }

    #[test]
    fn zero_custom_value_keeps_default() {
        let custom = json!({ "radius": 0 });
        let effects = expand(EffectTemplate::Glow, custom.as_object().unwrap());
        assert_eq!(effects[0].settings["Glow Radius"], json!(15));
    }

    #[test]
    fn chains_expand_in_order() {
        let effects = expand(EffectTemplate::TextPop, &Map::new());
        let names: Vec<&str> = effects.iter().map(|e| e.match_name).collect();
        assert_eq!(names, vec!["ADBE Drop Shadow", "ADBE Glow"]);
    }

    #[test]
    fn every_template_expands_to_catalog_effects() {
        for template in EffectTemplate::ALL {
            for effect in expand(template, &Map::new()) {
                assert!(
                    crate::project::effect_by_match_name(effect.match_name).is_some(),
                    "{} uses unknown effect {}",
                    template.as_str(),
                    effect.match_name
                );
            }
        }
    }
}
