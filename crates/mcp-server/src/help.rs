use protocol::operation::EffectTemplate;

const OPERATION_SUMMARIES: [(&str, &str); 13] = [
    ("getProjectInfo", "Information about the current project"),
    ("listCompositions", "List all compositions in the project"),
    ("getLayerInfo", "Information about layers in the active composition"),
    ("createComposition", "Create a new composition"),
    ("createTextLayer", "Create a new text layer"),
    ("createShapeLayer", "Create a new shape layer"),
    ("createSolidLayer", "Create a new solid layer"),
    ("setLayerProperties", "Set properties for a layer"),
    ("setLayerKeyframe", "Set a keyframe for a layer property"),
    ("setLayerExpression", "Set an expression for a layer property"),
    ("applyEffect", "Apply an effect to a layer"),
    ("applyEffectTemplate", "Apply a predefined effect template to a layer"),
    ("bridgeTestEffects", "Apply a pair of test effects to verify the bridge"),
];

pub(crate) fn template_summary(template: EffectTemplate) -> &'static str {
    match template {
        EffectTemplate::GaussianBlur => "Simple Gaussian blur effect",
        EffectTemplate::DirectionalBlur => "Motion blur in a specific direction",
        EffectTemplate::ColorBalance => "Adjust hue, lightness, and saturation",
        EffectTemplate::BrightnessContrast => "Basic brightness and contrast adjustment",
        EffectTemplate::Curves => "Advanced color adjustment using curves",
        EffectTemplate::Glow => "Add a glow effect to elements",
        EffectTemplate::DropShadow => "Add a customizable drop shadow",
        EffectTemplate::CinematicLook => "Combination of effects for a cinematic appearance",
        EffectTemplate::TextPop => "Effects to make text stand out (glow and shadow)",
    }
}

fn template_list(code: bool) -> String {
    EffectTemplate::ALL
        .iter()
        .map(|template| {
            let name = template.as_str();
            if code {
                format!("- `{name}`: {}\n", template_summary(*template))
            } else {
                format!("- {name}: {}\n", template_summary(*template))
            }
        })
        .collect()
}

pub(crate) fn bridge_help() -> String {
    let operations: String = OPERATION_SUMMARIES
        .iter()
        .map(|(name, summary)| format!("- {name}: {summary}\n"))
        .collect();
    format!(
        r#"# After Effects MCP Integration Help

Commands travel through a shared bridge directory: this server writes
ae_command.json, the host side runs it and writes ae_mcp_result.json.

1. **Start the host side**
   - In After Effects, open Window > mcp-bridge-auto.jsx; the panel checks for commands every few seconds
   - Without After Effects, run `ae-bridge-host --demo` for a simulated project
   - Both sides must use the same bridge directory

2. **Run scripts through MCP**
   - Use the `run-script` tool to queue a command
   - The host detects and runs the command automatically

3. **Get results through MCP**
   - After a command is executed, use the `get-results` tool
   - Results older than the staleness threshold come back with a warning

Available scripts:
{operations}
Effect Templates:
{templates}
Note: only the most recent command is kept. Queuing a new one replaces any command that has not run yet."#,
        templates = template_list(false),
    )
}

pub(crate) fn effects_help() -> String {
    format!(
        r#"# After Effects Effects Help

## Common Effect Match Names
These are internal names used by After Effects that can be used with the `effectMatchName` parameter:

### Blur & Sharpen
- Gaussian Blur: "ADBE Gaussian Blur 2"
- Camera Lens Blur: "ADBE Camera Lens Blur"
- Directional Blur: "ADBE Directional Blur"
- Radial Blur: "ADBE Radial Blur"
- Smart Blur: "ADBE Smart Blur"
- Unsharp Mask: "ADBE Unsharp Mask"

### Color Correction
- Brightness & Contrast: "ADBE Brightness & Contrast 2"
- Color Balance: "ADBE Color Balance (HLS)"
- Curves: "ADBE CurvesCustom"
- Exposure: "ADBE Exposure2"
- Hue/Saturation: "ADBE HUE SATURATION"
- Levels: "ADBE Pro Levels2"
- Vibrance: "ADBE Vibrance"

### Stylistic
- Glow: "ADBE Glow"
- Drop Shadow: "ADBE Drop Shadow"
- Bevel Alpha: "ADBE Bevel Alpha"
- Noise: "ADBE Noise"
- Fractal Noise: "ADBE Fractal Noise"
- CC Particle World: "CC Particle World"
- CC Light Sweep: "CC Light Sweep"

## Effect Templates
{templates}
## Example Usage
To apply a Gaussian blur effect:

```json
{{
  "compIndex": 1,
  "layerIndex": 1,
  "effectMatchName": "ADBE Gaussian Blur 2",
  "effectSettings": {{
    "Blurriness": 25
  }}
}}
```

To apply the "cinematic-look" template:

```json
{{
  "compIndex": 1,
  "layerIndex": 1,
  "templateName": "cinematic-look"
}}
```
"#,
        templates = template_list(true),
    )
}
