use protocol::operation::EffectTemplate;
use rmcp::model::{Tool, ToolAnnotations};
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    /// Only reads the result slot or returns static text.
    ReadOnly,
    /// Writes a command the host will run against the project.
    Queues,
}

fn tool(
    name: &'static str,
    title: &str,
    description: &'static str,
    properties: Map<String, Value>,
    required: &[&str],
    access: Access,
) -> Tool {
    let mut input_schema = Map::new();
    input_schema.insert("type".to_string(), Value::String("object".to_string()));
    if !required.is_empty() {
        input_schema.insert("required".to_string(), json!(required));
    }
    input_schema.insert("properties".to_string(), Value::Object(properties));

    let read_only = access == Access::ReadOnly;
    Tool {
        name: name.into(),
        description: Some(description.into()),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        title: Some(title.to_string()),
        annotations: Some(ToolAnnotations {
            read_only_hint: Some(read_only),
            destructive_hint: Some(false),
            open_world_hint: Some(false),
            idempotent_hint: Some(read_only),
            title: Some(title.to_string()),
        }),
        icons: None,
    }
}

fn layer_identifier() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "compIndex".to_string(),
        json!({
            "type": "integer",
            "minimum": 1,
            "description": "1-based index of the target composition in the project panel."
        }),
    );
    properties.insert(
        "layerIndex".to_string(),
        json!({
            "type": "integer",
            "minimum": 1,
            "description": "1-based index of the target layer within the composition."
        }),
    );
    properties
}

fn settings_object(description: &str) -> Value {
    json!({
        "type": "object",
        "additionalProperties": true,
        "description": description
    })
}

fn template_names() -> Vec<&'static str> {
    EffectTemplate::ALL.iter().map(|t| t.as_str()).collect()
}

fn effect_properties(with_catalog_filters: bool) -> Map<String, Value> {
    let mut properties = layer_identifier();
    properties.insert(
        "effectName".to_string(),
        json!({
            "type": "string",
            "description": "Display name of the effect to apply (e.g., 'Gaussian Blur')."
        }),
    );
    properties.insert(
        "effectMatchName".to_string(),
        json!({
            "type": "string",
            "description": "After Effects internal name for the effect (more reliable, e.g., 'ADBE Gaussian Blur 2')."
        }),
    );
    if with_catalog_filters {
        properties.insert(
            "effectCategory".to_string(),
            json!({
                "type": "string",
                "description": "Optional category for filtering effects."
            }),
        );
        properties.insert(
            "presetPath".to_string(),
            json!({
                "type": "string",
                "description": "Optional path to an effect preset file (.ffx)."
            }),
        );
    }
    properties.insert(
        "effectSettings".to_string(),
        settings_object("Optional parameters for the effect (e.g., { 'Blurriness': 25 })."),
    );
    properties
}

fn template_properties() -> Map<String, Value> {
    let mut properties = layer_identifier();
    properties.insert(
        "templateName".to_string(),
        json!({
            "type": "string",
            "enum": template_names(),
            "description": "Name of the effect template to apply."
        }),
    );
    properties.insert(
        "customSettings".to_string(),
        settings_object("Optional custom settings to override defaults."),
    );
    properties
}

fn run_script() -> Tool {
    let mut properties = Map::new();
    properties.insert(
        "script".to_string(),
        json!({
            "type": "string",
            "description": "Name of the predefined script to run"
        }),
    );
    properties.insert(
        "parameters".to_string(),
        settings_object("Optional parameters for the script"),
    );
    tool(
        "run-script",
        "Run Script",
        "Run a read-only script in After Effects",
        properties,
        &["script"],
        Access::Queues,
    )
}

fn create_composition() -> Tool {
    let mut properties = Map::new();
    properties.insert(
        "name".to_string(),
        json!({ "type": "string", "description": "Name of the composition" }),
    );
    properties.insert(
        "width".to_string(),
        json!({ "type": "integer", "minimum": 1, "description": "Width of the composition in pixels" }),
    );
    properties.insert(
        "height".to_string(),
        json!({ "type": "integer", "minimum": 1, "description": "Height of the composition in pixels" }),
    );
    properties.insert(
        "pixelAspect".to_string(),
        json!({ "type": "number", "exclusiveMinimum": 0, "description": "Pixel aspect ratio (default: 1.0)" }),
    );
    properties.insert(
        "duration".to_string(),
        json!({ "type": "number", "exclusiveMinimum": 0, "description": "Duration in seconds (default: 10.0)" }),
    );
    properties.insert(
        "frameRate".to_string(),
        json!({ "type": "number", "exclusiveMinimum": 0, "description": "Frame rate in frames per second (default: 30.0)" }),
    );
    let channel = json!({ "type": "integer", "minimum": 0, "maximum": 255 });
    properties.insert(
        "backgroundColor".to_string(),
        json!({
            "type": "object",
            "properties": { "r": channel, "g": channel, "b": channel },
            "required": ["r", "g", "b"],
            "description": "Background color of the composition (RGB values 0-255)"
        }),
    );
    tool(
        "create-composition",
        "Create Composition",
        "Create a new composition in After Effects with specified parameters",
        properties,
        &["name", "width", "height"],
        Access::Queues,
    )
}

fn set_layer_keyframe() -> Tool {
    let mut properties = layer_identifier();
    properties.insert(
        "propertyName".to_string(),
        json!({
            "type": "string",
            "description": "Name of the property to keyframe (e.g., 'Position', 'Scale', 'Rotation', 'Opacity')."
        }),
    );
    properties.insert(
        "timeInSeconds".to_string(),
        json!({ "type": "number", "description": "The time (in seconds) for the keyframe." }),
    );
    properties.insert(
        "value".to_string(),
        json!({
            "description": "The value for the keyframe (e.g., [x,y] for Position, [w,h] for Scale, angle for Rotation, percentage for Opacity)"
        }),
    );
    tool(
        "setLayerKeyframe",
        "Set Layer Keyframe",
        "Set a keyframe for a specific layer property at a given time.",
        properties,
        &["compIndex", "layerIndex", "propertyName", "timeInSeconds", "value"],
        Access::Queues,
    )
}

fn set_layer_expression() -> Tool {
    let mut properties = layer_identifier();
    properties.insert(
        "propertyName".to_string(),
        json!({
            "type": "string",
            "description": "Name of the property to apply the expression to (e.g., 'Position', 'Scale', 'Rotation', 'Opacity')."
        }),
    );
    properties.insert(
        "expressionString".to_string(),
        json!({
            "type": "string",
            "description": "The JavaScript expression string. Provide an empty string (\"\") to remove the expression."
        }),
    );
    tool(
        "setLayerExpression",
        "Set Layer Expression",
        "Set or remove an expression for a specific layer property.",
        properties,
        &["compIndex", "layerIndex", "propertyName", "expressionString"],
        Access::Queues,
    )
}

fn test_animation() -> Tool {
    let mut properties = Map::new();
    properties.insert(
        "operation".to_string(),
        json!({
            "type": "string",
            "enum": ["keyframe", "expression"],
            "description": "The animation operation to test"
        }),
    );
    properties.insert(
        "compIndex".to_string(),
        json!({ "type": "integer", "minimum": 1, "description": "Composition index (usually 1)" }),
    );
    properties.insert(
        "layerIndex".to_string(),
        json!({ "type": "integer", "minimum": 1, "description": "Layer index (usually 1)" }),
    );
    tool(
        "test-animation",
        "Test Animation",
        "Test animation functionality in After Effects",
        properties,
        &["operation", "compIndex", "layerIndex"],
        Access::Queues,
    )
}

fn no_arguments(
    name: &'static str,
    title: &str,
    description: &'static str,
    access: Access,
) -> Tool {
    tool(name, title, description, Map::new(), &[], access)
}

/// Every tool the server advertises, in listing order.
pub(crate) fn all_tools() -> Vec<Tool> {
    vec![
        run_script(),
        no_arguments(
            "get-results",
            "Get Results",
            "Get results from the last script executed in After Effects",
            Access::ReadOnly,
        ),
        no_arguments(
            "get-help",
            "Get Help",
            "Get help on using the After Effects MCP integration",
            Access::ReadOnly,
        ),
        create_composition(),
        set_layer_keyframe(),
        set_layer_expression(),
        test_animation(),
        tool(
            "apply-effect",
            "Apply Effect",
            "Apply an effect to a layer in After Effects",
            effect_properties(true),
            &["compIndex", "layerIndex"],
            Access::Queues,
        ),
        tool(
            "apply-effect-template",
            "Apply Effect Template",
            "Apply a predefined effect template to a layer in After Effects",
            template_properties(),
            &["compIndex", "layerIndex", "templateName"],
            Access::Queues,
        ),
        tool(
            "mcp_aftereffects_applyEffect",
            "Apply Effect and Wait",
            "Apply an effect to a layer in After Effects and return the result",
            effect_properties(false),
            &["compIndex", "layerIndex"],
            Access::Queues,
        ),
        tool(
            "mcp_aftereffects_applyEffectTemplate",
            "Apply Effect Template and Wait",
            "Apply a predefined effect template to a layer in After Effects and return the result",
            template_properties(),
            &["compIndex", "layerIndex", "templateName"],
            Access::Queues,
        ),
        no_arguments(
            "mcp_aftereffects_get_effects_help",
            "Effects Help",
            "Get help on using After Effects effects",
            Access::ReadOnly,
        ),
        no_arguments(
            "run-bridge-test",
            "Run Bridge Test",
            "Run the bridge test effects script to verify communication and apply test effects",
            Access::Queues,
        ),
    ]
}
