use rmcp::model::{
    GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};

pub(crate) fn all_prompts() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "list-compositions",
            Some("List compositions in the current After Effects project"),
            None,
        ),
        Prompt::new(
            "analyze-composition",
            Some("Analyze a composition by name"),
            Some(vec![PromptArgument {
                name: "compositionName".to_string(),
                title: None,
                description: Some("Name of the composition to analyze".to_string()),
                required: Some(true),
            }]),
        ),
        Prompt::new(
            "create-composition",
            Some("Create a new composition with specified settings"),
            None,
        ),
    ]
}

/// Renders a prompt into its single user message.
pub(crate) fn render(name: &str, arguments: Option<&JsonObject>) -> Result<GetPromptResult, String> {
    let text = match name {
        "list-compositions" => {
            "Please list all compositions in the current After Effects project.".to_string()
        }
        "analyze-composition" => {
            let composition = arguments
                .and_then(|args| args.get("compositionName"))
                .and_then(|value| value.as_str())
                .ok_or_else(|| "compositionName is required".to_string())?;
            format!(
                "Please analyze the composition named \"{composition}\" in the current After Effects project. Provide details about its duration, frame rate, resolution, and layers."
            )
        }
        "create-composition" => {
            "Please create a new composition with custom settings. You can specify parameters like name, width, height, frame rate, etc.".to_string()
        }
        other => return Err(format!("unknown prompt: {other}")),
    };
    Ok(GetPromptResult {
        description: None,
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::PromptMessageContent;
    use serde_json::json;

    fn message_text(result: &GetPromptResult) -> &str {
        match &result.messages[0].content {
            PromptMessageContent::Text { text } => text,
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn analyze_composition_names_the_composition() {
        let args = json!({ "compositionName": "Main Comp" });
        let result = render("analyze-composition", args.as_object()).expect("render");
        assert!(message_text(&result).contains("\"Main Comp\""));
    }

    #[test]
    fn analyze_composition_requires_a_name() {
        let err = render("analyze-composition", None).unwrap_err();
        assert!(err.contains("compositionName"));
    }

    #[test]
    fn every_listed_prompt_renders() {
        let args = json!({ "compositionName": "x" });
        for prompt in all_prompts() {
            assert!(render(&prompt.name, args.as_object()).is_ok(), "{}", prompt.name);
        }
        assert!(render("missing", None).is_err());
    }
}
