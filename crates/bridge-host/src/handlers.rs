use crate::project::{
    effect_by_display_name, effect_by_match_name, Composition, Effect, EffectSpec, Layer,
    LayerKind, Project, ProjectItem, Property, TextDocument, MAX_LISTED_ITEMS,
};
use crate::templates;
use anyhow::{anyhow, bail};
use exchange::OperationHandler;
use protocol::operation::{
    ApplyEffectArgs, ApplyEffectTemplateArgs, CreateCompositionArgs, CreateShapeLayerArgs,
    CreateSolidLayerArgs, CreateTextLayerArgs, EffectTemplate, LayerTarget, Operation,
    SetLayerExpressionArgs, SetLayerKeyframeArgs, SetLayerPropertiesArgs,
};
use protocol::HandlerOutput;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Runs operations against an in-memory project and answers with the same
/// JSON shapes the After Effects panel produces.
pub struct SimulatedHost {
    project: Project,
}

impl SimulatedHost {
    pub fn new(project: Project) -> Self {
        Self { project }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    fn comp_by_id(&mut self, id: u32) -> anyhow::Result<&mut Composition> {
        self.project
            .comp_mut_by_id(id)
            .ok_or_else(|| anyhow!("Composition {id} no longer exists"))
    }

    fn project_info(&self) -> Value {
        let mut compositions = 0;
        let mut folders = 0;
        let mut solids = 0;
        let mut items = Vec::new();
        for item in self.project.items().iter().take(MAX_LISTED_ITEMS) {
            match item {
                ProjectItem::Composition(_) => compositions += 1,
                ProjectItem::Folder { .. } => folders += 1,
                ProjectItem::Solid { .. } => solids += 1,
            }
            items.push(json!({
                "id": item.id(),
                "name": item.name(),
                "type": item.type_name(),
            }));
        }

        let mut result = json!({
            "projectName": self.project.file_name.as_deref().unwrap_or("Untitled Project"),
            "path": self.project.file_name.as_deref().unwrap_or(""),
            "numItems": self.project.items().len(),
            "bitsPerChannel": self.project.bits_per_channel,
            "timeMode": "Timecode",
            "items": items,
            "itemCounts": {
                "compositions": compositions,
                "footage": 0,
                "folders": folders,
                "solids": solids,
            },
        });
        if let Some(active) = self.project.active_comp() {
            result["activeComp"] = json!({
                "id": active.id,
                "name": active.name,
                "width": active.width,
                "height": active.height,
                "duration": active.duration,
                "frameRate": active.frame_rate,
                "numLayers": active.num_layers(),
            });
        }
        result
    }

    fn list_compositions(&self) -> Value {
        let compositions: Vec<Value> = self.project.compositions().map(Composition::summary).collect();
        json!({ "compositions": compositions })
    }

    fn layer_info(&self) -> Value {
        let Some(comp) = self.project.active_comp() else {
            return json!({ "error": "No active composition" });
        };
        let layers: Vec<Value> = comp
            .layers
            .iter()
            .enumerate()
            .map(|(pos, layer)| {
                json!({
                    "index": pos + 1,
                    "name": layer.name,
                    "enabled": layer.enabled,
                    "locked": layer.locked,
                    "inPoint": layer.in_point,
                    "outPoint": layer.out_point,
                })
            })
            .collect();
        json!({ "layers": layers })
    }

    fn create_composition(&mut self, args: &CreateCompositionArgs) -> anyhow::Result<Value> {
        let id = self.project.add_composition(
            &args.name,
            args.width,
            args.height,
            args.pixel_aspect,
            args.duration,
            args.frame_rate,
        );
        let comp = self.comp_by_id(id)?;
        if let Some(bg) = args.background_color {
            comp.bg_color = [
                f64::from(bg.r) / 255.0,
                f64::from(bg.g) / 255.0,
                f64::from(bg.b) / 255.0,
            ];
        }
        tracing::info!(name = %comp.name, id, "composition created");
        Ok(json!({
            "status": "success",
            "message": "Composition created successfully",
            "composition": {
                "name": comp.name,
                "id": comp.id,
                "width": comp.width,
                "height": comp.height,
                "pixelAspect": comp.pixel_aspect,
                "duration": comp.duration,
                "frameRate": comp.frame_rate,
                "bgColor": comp.bg_color,
            },
        }))
    }

    fn create_text_layer(&mut self, args: &CreateTextLayerArgs) -> anyhow::Result<Value> {
        check_position(&args.position)?;
        let id = self.project.resolve_comp_id(&args.comp_name)?;
        let comp = self.comp_by_id(id)?;
        let document = TextDocument {
            text: args.text.clone(),
            font: args.font_family.clone(),
            font_size: args.font_size,
            fill_color: args.color,
            justification: args.alignment,
        };
        let mut layer = Layer::new(args.text.clone(), LayerKind::Text(document), &args.position);
        layer.set_timing(args.start_time, args.duration, comp.duration);
        let index = comp.add_layer(layer);
        let info = created_layer(comp, index)?;
        Ok(json!({
            "status": "success",
            "message": "Text layer created successfully",
            "layer": info,
        }))
    }

    fn create_shape_layer(&mut self, args: &CreateShapeLayerArgs) -> anyhow::Result<Value> {
        check_position(&args.position)?;
        let id = self.project.resolve_comp_id(&args.comp_name)?;
        let comp = self.comp_by_id(id)?;
        let kind = LayerKind::Shape {
            shape_type: args.shape_type,
        };
        let mut layer = Layer::new(args.name.clone(), kind, &args.position);
        layer.set_timing(args.start_time, args.duration, comp.duration);
        let index = comp.add_layer(layer);
        let mut info = created_layer(comp, index)?;
        info.insert("shapeType".to_string(), json!(args.shape_type.as_str()));
        Ok(json!({
            "status": "success",
            "message": "Shape layer created successfully",
            "layer": info,
        }))
    }

    fn create_solid_layer(&mut self, args: &CreateSolidLayerArgs) -> anyhow::Result<Value> {
        check_position(&args.position)?;
        let id = self.project.resolve_comp_id(&args.comp_name)?;
        let size = match args.size {
            Some(size) => size,
            None => {
                let comp = self.comp_by_id(id)?;
                [f64::from(comp.width), f64::from(comp.height)]
            }
        };
        if size[0] <= 0.0 || size[1] <= 0.0 {
            bail!("Solid size must be positive");
        }
        // Solids also show up as footage items in the project.
        self.project.add_solid_source(&args.name);

        let comp = self.comp_by_id(id)?;
        let kind = if args.is_adjustment {
            LayerKind::Adjustment { size }
        } else {
            LayerKind::Solid {
                color: args.color,
                size,
            }
        };
        let mut layer = Layer::new(args.name.clone(), kind, &args.position);
        layer.set_timing(args.start_time, args.duration, comp.duration);
        let index = comp.add_layer(layer);
        let mut info = created_layer(comp, index)?;
        info.insert("isAdjustment".to_string(), json!(args.is_adjustment));
        let message = if args.is_adjustment {
            "Adjustment layer created successfully"
        } else {
            "Solid layer created successfully"
        };
        Ok(json!({
            "status": "success",
            "message": message,
            "layer": info,
        }))
    }

    fn set_layer_properties(&mut self, args: &SetLayerPropertiesArgs) -> anyhow::Result<Value> {
        let id = self.project.resolve_comp_id(&args.comp_name)?;
        let comp = self.comp_by_id(id)?;
        let index = match (args.layer_index, args.layer_name.as_deref()) {
            (Some(index), _) => {
                if index == 0 || (index as usize) > comp.num_layers() {
                    bail!("Layer index out of bounds: {index}");
                }
                index
            }
            (None, Some(name)) => comp
                .layer_index_by_name(name)
                .ok_or_else(|| anyhow!("Layer not found: {name}"))?,
            (None, None) => bail!("Layer not found: no layerIndex or layerName given"),
        };
        let layer = comp
            .layer_mut(index)
            .ok_or_else(|| anyhow!("Layer index out of bounds: {index}"))?;

        let mut changed = Vec::new();
        if let Some(document) = layer.text_document_mut() {
            if let Some(text) = &args.text {
                if &document.text != text {
                    document.text = text.clone();
                    changed.push("text");
                }
            }
            if let Some(font) = &args.font_family {
                if &document.font != font {
                    document.font = font.clone();
                    changed.push("fontFamily");
                }
            }
            if let Some(size) = args.font_size {
                if document.font_size != size {
                    document.font_size = size;
                    changed.push("fontSize");
                }
            }
            if let Some(color) = args.fill_color {
                if document.fill_color != color {
                    document.fill_color = color;
                    changed.push("fillColor");
                }
            }
        }

        let transform = [
            ("Position", "position", args.position.as_ref().map(|v| json!(v))),
            ("Scale", "scale", args.scale.as_ref().map(|v| json!(v))),
            ("Rotation", "rotation", args.rotation.map(|v| json!(v))),
            ("Opacity", "opacity", args.opacity.map(|v| json!(v))),
        ];
        for (property, label, value) in transform {
            let Some(value) = value else { continue };
            if let Some(prop) = layer.property_mut(property) {
                prop.set_value(value)?;
                changed.push(label);
            }
        }
        if let Some(start_time) = args.start_time {
            layer.shift_start(start_time);
            changed.push("startTime");
        }
        if let Some(duration) = args.duration.filter(|d| *d > 0.0) {
            let start = args.start_time.unwrap_or(layer.start_time);
            layer.out_point = start + duration;
            changed.push("duration");
        }
        tracing::debug!(layer = %layer.name, changed = ?changed, "layer properties updated");

        let mut info = Map::new();
        info.insert("name".to_string(), json!(layer.name));
        info.insert("index".to_string(), json!(index));
        for (key, property) in [
            ("position", "Position"),
            ("scale", "Scale"),
            ("rotation", "Rotation"),
            ("opacity", "Opacity"),
        ] {
            info.insert(key.to_string(), layer.property_value(property));
        }
        info.insert("inPoint".to_string(), json!(layer.in_point));
        info.insert("outPoint".to_string(), json!(layer.out_point));
        info.insert("changedProperties".to_string(), json!(changed));
        if let LayerKind::Text(document) = &layer.kind {
            info.insert("text".to_string(), json!(document.text));
            info.insert("fontFamily".to_string(), json!(document.font));
            info.insert("fontSize".to_string(), json!(document.font_size));
            info.insert("fillColor".to_string(), json!(document.fill_color));
        }
        Ok(json!({
            "status": "success",
            "message": "Layer properties updated successfully",
            "layer": info,
        }))
    }

    fn set_layer_keyframe(&mut self, args: &SetLayerKeyframeArgs) -> Result<String, String> {
        let property_name = &args.property_name;
        let layer = locate_layer(&mut self.project, args.comp_index, args.layer_index)?;
        let layer_name = layer.name.clone();
        let Some(property) = layer.property_mut(property_name) else {
            return Err(format!(
                "Property '{property_name}' not found on layer '{layer_name}'."
            ));
        };
        if let Err(err) = add_keyframe(property, args.time_in_seconds, args.value.clone()) {
            return Err(format!("Error setting keyframe: Error: {err}"));
        }
        Ok(format!(
            "Keyframe set for '{property_name}' on layer '{layer_name}' at {}s.",
            args.time_in_seconds
        ))
    }

    fn set_layer_expression(&mut self, args: &SetLayerExpressionArgs) -> Result<String, String> {
        let property_name = &args.property_name;
        let layer = locate_layer(&mut self.project, args.comp_index, args.layer_index)?;
        let layer_name = layer.name.clone();
        let Some(property) = layer.property_mut(property_name) else {
            return Err(format!(
                "Property '{property_name}' not found on layer '{layer_name}'."
            ));
        };
        property.expression = args.expression_string.clone();
        let action = if args.expression_string.is_empty() {
            "removed"
        } else {
            "set"
        };
        Ok(format!(
            "Expression {action} for '{property_name}' on layer '{layer_name}'."
        ))
    }

    fn apply_effect(&mut self, args: &ApplyEffectArgs) -> anyhow::Result<Value> {
        let comp = self.project.comp_at(args.comp_index)?;
        let comp_name = comp.name.clone();
        let layer = comp.layer_mut(args.layer_index).ok_or_else(|| {
            anyhow!(
                "Layer not found at index {} in composition '{comp_name}'",
                args.layer_index
            )
        })?;

        let effect = if let Some(preset) = &args.preset_path {
            if !Path::new(preset).exists() {
                bail!("Effect preset file not found: {preset}");
            }
            let name = preset.rsplit(['/', '\\']).next().unwrap_or(preset);
            json!({ "type": "preset", "name": name, "applied": true })
        } else {
            let spec = match (&args.effect_match_name, &args.effect_name) {
                (Some(match_name), _) => effect_by_match_name(match_name),
                (None, Some(name)) => effect_by_display_name(name),
                (None, None) => None,
            };
            let requested = args
                .effect_match_name
                .as_deref()
                .or(args.effect_name.as_deref())
                .unwrap_or_default();
            let spec = spec.ok_or_else(|| {
                anyhow!("Cannot add effect '{requested}' to layer '{}'", layer.name)
            })?;
            if let Some(category) = args.effect_category.as_deref().filter(|c| !c.is_empty()) {
                if !spec.category.eq_ignore_ascii_case(category) {
                    tracing::debug!(effect = spec.match_name, category, "effect category does not match");
                }
            }
            let (index, effect) = layer.add_effect(spec);
            apply_settings(effect, spec, &args.effect_settings);
            json!({
                "type": "effect",
                "name": effect.name,
                "matchName": effect.match_name,
                "index": index,
            })
        };
        tracing::info!(layer = %layer.name, composition = %comp_name, "effect applied");

        Ok(json!({
            "status": "success",
            "message": "Effect applied successfully",
            "effect": effect,
            "layer": { "name": layer.name, "index": args.layer_index },
            "composition": { "name": comp_name, "index": args.comp_index },
        }))
    }

    fn apply_effect_template(&mut self, args: &ApplyEffectTemplateArgs) -> anyhow::Result<Value> {
        let comp = self.project.comp_at(args.comp_index)?;
        let comp_name = comp.name.clone();
        let layer = comp.layer_mut(args.layer_index).ok_or_else(|| {
            anyhow!(
                "Layer not found at index {} in composition '{comp_name}'",
                args.layer_index
            )
        })?;

        let mut applied = Vec::new();
        for entry in templates::expand(args.template_name, &args.custom_settings) {
            let spec = effect_by_match_name(entry.match_name)
                .ok_or_else(|| anyhow!("Effect '{}' is not available", entry.match_name))?;
            let (_, effect) = layer.add_effect(spec);
            apply_settings(effect, spec, &entry.settings);
            applied.push(json!({ "name": effect.name, "matchName": effect.match_name }));
        }
        let template = args.template_name.as_str();
        tracing::info!(template, layer = %layer.name, "effect template applied");

        Ok(json!({
            "status": "success",
            "message": format!("Effect template '{template}' applied successfully"),
            "appliedEffects": applied,
            "layer": { "name": layer.name, "index": args.layer_index },
            "composition": { "name": comp_name, "index": args.comp_index },
        }))
    }

    fn bridge_test_effects(&mut self, target: LayerTarget) -> Value {
        let blur = ApplyEffectArgs {
            comp_index: target.comp_index,
            layer_index: target.layer_index,
            effect_name: None,
            effect_match_name: Some("ADBE Gaussian Blur 2".to_string()),
            effect_category: None,
            preset_path: None,
            effect_settings: json_object(json!({ "Blurriness": 5 })),
        };
        let shadow = ApplyEffectTemplateArgs {
            comp_index: target.comp_index,
            layer_index: target.layer_index,
            template_name: EffectTemplate::DropShadow,
            custom_settings: Map::new(),
        };
        let blur = status_result(self.apply_effect(&blur));
        let shadow = status_result(self.apply_effect_template(&shadow));
        json!({
            "status": "success",
            "message": "Bridge test effects applied.",
            "results": [blur, shadow],
        })
    }
}

impl OperationHandler for SimulatedHost {
    fn handle(&mut self, operation: Operation) -> anyhow::Result<HandlerOutput> {
        let value = match operation {
            Operation::GetProjectInfo => self.project_info(),
            Operation::ListCompositions => self.list_compositions(),
            Operation::GetLayerInfo => self.layer_info(),
            Operation::CreateComposition(args) => status_result(self.create_composition(&args)),
            Operation::CreateTextLayer(args) => status_result(self.create_text_layer(&args)),
            Operation::CreateShapeLayer(args) => status_result(self.create_shape_layer(&args)),
            Operation::CreateSolidLayer(args) => status_result(self.create_solid_layer(&args)),
            Operation::SetLayerProperties(args) => status_result(self.set_layer_properties(&args)),
            Operation::SetLayerKeyframe(args) => success_result(self.set_layer_keyframe(&args)),
            Operation::SetLayerExpression(args) => success_result(self.set_layer_expression(&args)),
            Operation::ApplyEffect(args) => status_result(self.apply_effect(&args)),
            Operation::ApplyEffectTemplate(args) => status_result(self.apply_effect_template(&args)),
            Operation::BridgeTestEffects(target) => self.bridge_test_effects(target),
        };
        Ok(HandlerOutput::Json(value))
    }
}

/// Finds the layer for a keyframe or expression call, with the panel's messages.
fn locate_layer(
    project: &mut Project,
    comp_index: u32,
    layer_index: u32,
) -> Result<&mut Layer, String> {
    let comp = project.comp_at(comp_index).map_err(|err| err.to_string())?;
    let comp_name = comp.name.clone();
    comp.layer_mut(layer_index)
        .ok_or_else(|| format!("Layer not found at index {layer_index} in composition '{comp_name}'"))
}

/// The first keyframe on a property also pins its current value at time zero.
fn add_keyframe(property: &mut Property, time: f64, value: Value) -> anyhow::Result<()> {
    if !property.is_time_varying() {
        let current = property.value.clone();
        property.set_value_at_time(0.0, current)?;
    }
    property.set_value_at_time(time, value)
}

fn created_layer(comp: &Composition, index: u32) -> anyhow::Result<Map<String, Value>> {
    let layer = comp
        .layer(index)
        .ok_or_else(|| anyhow!("Layer not found at index {index}"))?;
    let mut info = Map::new();
    info.insert("name".to_string(), json!(layer.name));
    info.insert("index".to_string(), json!(index));
    info.insert("type".to_string(), json!(layer.kind.type_name()));
    info.insert("inPoint".to_string(), json!(layer.in_point));
    info.insert("outPoint".to_string(), json!(layer.out_point));
    info.insert("position".to_string(), layer.property_value("Position"));
    Ok(info)
}

fn check_position(position: &[f64]) -> anyhow::Result<()> {
    if !(2..=3).contains(&position.len()) {
        bail!("position must have 2 or 3 components");
    }
    Ok(())
}

/// Copies the settings the effect knows about; unknown names are skipped.
fn apply_settings(effect: &mut Effect, spec: &EffectSpec, settings: &Map<String, Value>) {
    for (name, value) in settings {
        if spec.params.contains(&name.as_str()) {
            effect.params.insert(name.clone(), value.clone());
        } else {
            tracing::debug!(effect = %effect.name, param = %name, "skipping unknown effect parameter");
        }
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn status_result(outcome: anyhow::Result<Value>) -> Value {
    match outcome {
        Ok(value) => value,
        Err(err) => json!({ "status": "error", "message": format!("Error: {err}") }),
    }
}

fn success_result(outcome: Result<String, String>) -> Value {
    match outcome {
        Ok(message) => json!({ "success": true, "message": message }),
        Err(message) => json!({ "success": false, "message": message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(host: &mut SimulatedHost, command: &str, args: Value) -> Value {
        let operation = Operation::parse(command, args).expect("valid operation");
        match host.handle(operation).expect("handled") {
            HandlerOutput::Json(value) => value,
            HandlerOutput::Text(text) => panic!("unexpected text output: {text}"),
        }
    }

    fn demo() -> SimulatedHost {
        SimulatedHost::new(Project::demo())
    }

    // Demo project items: 1 folder, 2 solid, 3 "Main Comp", 4 "Lower Third".
    const MAIN_COMP: u32 = 3;

    #[test]
    fn list_compositions_reports_every_comp() {
        let mut host = demo();
        let result = run(&mut host, "listCompositions", json!({}));
        let comps = result["compositions"].as_array().unwrap();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0]["name"], "Main Comp");
        assert_eq!(comps[0]["numLayers"], 3);
        assert_eq!(comps[1]["frameRate"], 25.0);
    }

    #[test]
    fn project_info_counts_item_types() {
        let mut host = demo();
        let result = run(&mut host, "getProjectInfo", json!({}));
        assert_eq!(result["projectName"], "demo.aep");
        assert_eq!(result["numItems"], 4);
        assert_eq!(result["itemCounts"]["compositions"], 2);
        assert_eq!(result["itemCounts"]["folders"], 1);
        assert_eq!(result["itemCounts"]["solids"], 1);
        assert_eq!(result["activeComp"]["name"], "Main Comp");
    }

    #[test]
    fn layer_info_without_active_comp() {
        let mut host = SimulatedHost::new(Project::default());
        let result = run(&mut host, "getLayerInfo", json!({}));
        assert_eq!(result, json!({ "error": "No active composition" }));
    }

    #[test]
    fn create_composition_becomes_active() {
        let mut host = SimulatedHost::new(Project::default());
        let result = run(
            &mut host,
            "createComposition",
            json!({ "name": "Intro", "width": 1280, "height": 720, "backgroundColor": { "r": 255, "g": 0, "b": 0 } }),
        );
        assert_eq!(result["status"], "success");
        assert_eq!(result["composition"]["width"], 1280);
        assert_eq!(result["composition"]["frameRate"], 30.0);
        assert_eq!(result["composition"]["bgColor"], json!([1.0, 0.0, 0.0]));

        let layers = run(&mut host, "getLayerInfo", json!({}));
        assert_eq!(layers["layers"], json!([]));
    }

    #[test]
    fn text_layer_lands_on_top_of_named_comp() {
        let mut host = demo();
        let result = run(
            &mut host,
            "createTextLayer",
            json!({ "compName": "Main Comp", "text": "Title", "startTime": 1, "duration": 2 }),
        );
        assert_eq!(result["status"], "success");
        assert_eq!(result["layer"]["index"], 1);
        assert_eq!(result["layer"]["type"], "text");
        assert_eq!(result["layer"]["inPoint"], 1.0);
        assert_eq!(result["layer"]["outPoint"], 3.0);
        assert_eq!(result["layer"]["position"], json!([960.0, 540.0]));
    }

    #[test]
    fn layer_creation_without_any_comp_is_an_error_result() {
        let mut host = SimulatedHost::new(Project::default());
        let result = run(&mut host, "createShapeLayer", json!({ "compName": "Missing" }));
        assert_eq!(result["status"], "error");
        assert_eq!(
            result["message"],
            "Error: No composition found with name 'Missing' and no active composition"
        );
    }

    #[test]
    fn adjustment_solid_uses_comp_size_and_adds_footage() {
        let mut host = demo();
        let result = run(&mut host, "createSolidLayer", json!({ "isAdjustment": true }));
        assert_eq!(result["message"], "Adjustment layer created successfully");
        assert_eq!(result["layer"]["type"], "adjustment");
        assert_eq!(result["layer"]["isAdjustment"], true);
        assert_eq!(host.project().items().len(), 5);
    }

    #[test]
    fn set_layer_properties_updates_text_and_transform() {
        let mut host = demo();
        let result = run(
            &mut host,
            "setLayerProperties",
            json!({ "layerIndex": 1, "text": "Changed", "fontFamily": "Arial", "opacity": 50, "position": [10, 20] }),
        );
        assert_eq!(result["status"], "success");
        let layer = &result["layer"];
        assert_eq!(layer["text"], "Changed");
        assert_eq!(layer["opacity"], 50.0);
        assert_eq!(layer["changedProperties"], json!(["text", "position", "opacity"]));
    }

    #[test]
    fn set_layer_properties_by_missing_name() {
        let mut host = demo();
        let result = run(&mut host, "setLayerProperties", json!({ "layerName": "Ghost" }));
        assert_eq!(result["message"], "Error: Layer not found: Ghost");
        let result = run(&mut host, "setLayerProperties", json!({ "layerIndex": 9 }));
        assert_eq!(result["message"], "Error: Layer index out of bounds: 9");
    }

    #[test]
    fn keyframe_pins_initial_value() {
        let mut host = demo();
        let result = run(
            &mut host,
            "setLayerKeyframe",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "propertyName": "Opacity", "timeInSeconds": 1, "value": 25 }),
        );
        assert_eq!(result["success"], true);
        assert_eq!(
            result["message"],
            "Keyframe set for 'Opacity' on layer 'Hello After Effects' at 1s."
        );
        let comp = host.project().compositions().next().unwrap();
        let keys = &comp.layer(1).unwrap().property("Opacity").unwrap().keyframes;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].value, json!(100.0));
        assert_eq!(keys[1].value, json!(25));
    }

    #[test]
    fn keyframe_failures_use_success_false() {
        let mut host = demo();
        let result = run(
            &mut host,
            "setLayerKeyframe",
            json!({ "compIndex": 1, "layerIndex": 1, "propertyName": "Opacity", "timeInSeconds": 0, "value": 1 }),
        );
        assert_eq!(result, json!({ "success": false, "message": "Composition not found at index 1" }));

        let result = run(
            &mut host,
            "setLayerKeyframe",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "propertyName": "Bogus", "timeInSeconds": 0, "value": 1 }),
        );
        assert_eq!(
            result["message"],
            "Property 'Bogus' not found on layer 'Hello After Effects'."
        );

        let result = run(
            &mut host,
            "setLayerKeyframe",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "propertyName": "Position", "timeInSeconds": 0, "value": 3 }),
        );
        assert_eq!(result["success"], false);
        assert!(result["message"].as_str().unwrap().starts_with("Error setting keyframe"));
    }

    #[test]
    fn expression_set_and_removed() {
        let mut host = demo();
        let set = run(
            &mut host,
            "setLayerExpression",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 2, "propertyName": "Position", "expressionString": "wiggle(3, 30)" }),
        );
        assert_eq!(set["message"], "Expression set for 'Position' on layer 'Shape Layer'.");
        let removed = run(
            &mut host,
            "setLayerExpression",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 2, "propertyName": "Position", "expressionString": "" }),
        );
        assert_eq!(removed["success"], true);
        assert!(removed["message"].as_str().unwrap().starts_with("Expression removed"));
    }

    #[test]
    fn apply_effect_by_match_name_keeps_known_settings() {
        let mut host = demo();
        let result = run(
            &mut host,
            "applyEffect",
            json!({
                "compIndex": MAIN_COMP,
                "layerIndex": 1,
                "effectMatchName": "ADBE Gaussian Blur 2",
                "effectSettings": { "Blurriness": 12, "Nope": 1 }
            }),
        );
        assert_eq!(result["status"], "success");
        assert_eq!(result["effect"]["name"], "Gaussian Blur");
        assert_eq!(result["effect"]["index"], 1);
        assert_eq!(result["composition"]["name"], "Main Comp");

        let comp = host.project().compositions().next().unwrap();
        let effect = &comp.layer(1).unwrap().effects[0];
        assert_eq!(effect.params.get("Blurriness"), Some(&json!(12)));
        assert!(effect.params.get("Nope").is_none());
    }

    #[test]
    fn apply_effect_unknown_name_is_error() {
        let mut host = demo();
        let result = run(
            &mut host,
            "applyEffect",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "effectName": "Sparkles" }),
        );
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("Sparkles"));
    }

    #[test]
    fn missing_preset_file_is_error() {
        let mut host = demo();
        let result = run(
            &mut host,
            "applyEffect",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "presetPath": "/no/such/preset.ffx" }),
        );
        assert_eq!(
            result["message"],
            "Error: Effect preset file not found: /no/such/preset.ffx"
        );
    }

    #[test]
    fn template_chain_applies_every_effect() {
        let mut host = demo();
        let result = run(
            &mut host,
            "applyEffectTemplate",
            json!({ "compIndex": MAIN_COMP, "layerIndex": 1, "templateName": "cinematic-look" }),
        );
        assert_eq!(result["message"], "Effect template 'cinematic-look' applied successfully");
        let applied = result["appliedEffects"].as_array().unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1]["matchName"], "ADBE Vibrance");
    }

    #[test]
    fn bridge_test_reports_both_results() {
        let mut host = demo();
        let result = run(&mut host, "bridgeTestEffects", json!({ "compIndex": MAIN_COMP }));
        assert_eq!(result["status"], "success");
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["effect"]["matchName"], "ADBE Gaussian Blur 2");
        assert_eq!(results[1]["appliedEffects"][0]["name"], "Drop Shadow");
    }

    #[test]
    fn bridge_test_on_missing_comp_nests_errors() {
        let mut host = demo();
        let result = run(&mut host, "bridgeTestEffects", json!({}));
        assert_eq!(result["status"], "success");
        assert_eq!(result["results"][0]["status"], "error");
        assert_eq!(result["results"][1]["status"], "error");
    }
}
