use crate::help::{bridge_help, effects_help};
use crate::prompts;
use crate::tools::all_tools;
use exchange::{BridgeClient, Clock, ExchangeStore, SystemClock};
use protocol::config::Timings;
use protocol::operation::{
    ApplyEffectArgs, ApplyEffectTemplateArgs, CreateCompositionArgs, Operation,
    SetLayerExpressionArgs, SetLayerKeyframeArgs,
};
use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam,
        GetPromptResult, Implementation, JsonObject, ListPromptsResult, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, RawResource, ReadResourceRequestParam,
        ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo,
    },
    ErrorData as McpError, RoleServer, ServerHandler,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const COMPOSITIONS_URI: &str = "aftereffects://compositions";
const PANEL_HINT: &str = "Please ensure the \"MCP Bridge Auto\" panel is open in After Effects.";

pub(crate) fn server_info() -> ServerInfo {
    ServerInfo {
        capabilities: ServerCapabilities::builder()
            .enable_tools()
            .enable_prompts()
            .enable_resources()
            .build(),
        server_info: Implementation {
            name: "AfterEffectsServer".to_string(),
            title: Some("After Effects MCP Bridge".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Implementation::from_build_env()
        },
        instructions: Some(
            "Commands are queued for the After Effects bridge panel. Queue with run-script or a dedicated tool, then call get-results a few seconds later. Tools prefixed mcp_aftereffects_ wait for the result themselves."
                .to_string(),
        ),
        ..ServerInfo::default()
    }
}

pub(crate) struct BridgeHandler<S, C = SystemClock> {
    client: BridgeClient<S, C>,
    timings: Timings,
    server_info: ServerInfo,
}

impl<S: ExchangeStore, C: Clock> BridgeHandler<S, C> {
    pub(crate) fn new(client: BridgeClient<S, C>, timings: Timings, server_info: ServerInfo) -> Self {
        Self {
            client,
            timings,
            server_info,
        }
    }

    /// Clears the result slot, then writes the command. Callers poll
    /// get-results afterwards.
    fn queue(&self, command: &str, args: Value) {
        self.client.reset_result();
        self.client.enqueue(command, args);
    }

    async fn submit(&self, command: &str, args: Value) -> String {
        self.client
            .submit(
                command,
                args,
                self.timings.await_timeout,
                self.timings.poll_interval,
            )
            .await
    }

    pub(crate) async fn dispatch_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let invalid = |err: String| McpError::invalid_params(err, None);
        match name {
            "run-script" => {
                let args: RunScriptArgs = parse_arguments(arguments).map_err(invalid)?;
                if !Operation::is_known(&args.script) {
                    tracing::warn!(script = %args.script, "rejected script outside the registry");
                    return Ok(error_result(format!(
                        "Error: Script \"{}\" is not allowed. Allowed scripts are: {}",
                        args.script,
                        Operation::NAMES.join(", ")
                    )));
                }
                self.queue(&args.script, Value::Object(args.parameters));
                Ok(text_result(format!(
                    "Command to run \"{}\" has been queued.\n{PANEL_HINT}\nUse the \"get-results\" tool after a few seconds to check for results.",
                    args.script
                )))
            }
            "get-results" => Ok(text_result(self.client.read_latest())),
            "get-help" => Ok(text_result(bridge_help())),
            "create-composition" => {
                let (comp, args) = parse_operation::<CreateCompositionArgs>(
                    "createComposition",
                    arguments,
                    &["name", "width", "height"],
                )
                .map_err(invalid)?;
                self.queue("createComposition", args);
                Ok(text_result(format!(
                    "Command to create composition \"{}\" has been queued.\n{PANEL_HINT}\nUse the \"get-results\" tool after a few seconds to check for results.",
                    comp.name
                )))
            }
            "setLayerKeyframe" => {
                let (keyframe, args) =
                    parse_operation::<SetLayerKeyframeArgs>("setLayerKeyframe", arguments, &[])
                        .map_err(invalid)?;
                self.queue("setLayerKeyframe", args);
                Ok(confirmation(format!(
                    "Command to set keyframe for \"{}\" on layer {} in comp {} has been queued.",
                    keyframe.property_name, keyframe.layer_index, keyframe.comp_index
                )))
            }
            "setLayerExpression" => {
                let (expression, args) = parse_operation::<SetLayerExpressionArgs>(
                    "setLayerExpression",
                    arguments,
                    &[],
                )
                .map_err(invalid)?;
                self.queue("setLayerExpression", args);
                Ok(confirmation(format!(
                    "Command to set expression for \"{}\" on layer {} in comp {} has been queued.",
                    expression.property_name, expression.layer_index, expression.comp_index
                )))
            }
            "test-animation" => {
                let args: TestAnimationArgs = parse_arguments(arguments).map_err(invalid)?;
                if args.comp_index == 0 || args.layer_index == 0 {
                    return Err(invalid("compIndex and layerIndex are 1-based".to_string()));
                }
                let (command, payload) = args.operation.command(args.comp_index, args.layer_index);
                let result = self.submit(command, payload).await;
                Ok(text_result(format!(
                    "Ran the {} test on layer {} in composition {}.\n{result}",
                    args.operation.as_str(),
                    args.layer_index,
                    args.comp_index
                )))
            }
            "apply-effect" => {
                let (effect, args) = parse_operation::<ApplyEffectArgs>(
                    "applyEffect",
                    arguments,
                    &["compIndex", "layerIndex"],
                )
                .map_err(invalid)?;
                self.queue("applyEffect", args);
                Ok(confirmation(format!(
                    "Command to apply effect to layer {} in composition {} has been queued.",
                    effect.layer_index, effect.comp_index
                )))
            }
            "apply-effect-template" => {
                let (template, args) = parse_operation::<ApplyEffectTemplateArgs>(
                    "applyEffectTemplate",
                    arguments,
                    &["compIndex", "layerIndex"],
                )
                .map_err(invalid)?;
                self.queue("applyEffectTemplate", args);
                Ok(confirmation(format!(
                    "Command to apply effect template '{}' to layer {} in composition {} has been queued.",
                    template.template_name.as_str(),
                    template.layer_index,
                    template.comp_index
                )))
            }
            "mcp_aftereffects_applyEffect" => {
                let (_, args) = parse_operation::<ApplyEffectArgs>(
                    "applyEffect",
                    arguments,
                    &["compIndex", "layerIndex"],
                )
                .map_err(invalid)?;
                Ok(text_result(self.submit("applyEffect", args).await))
            }
            "mcp_aftereffects_applyEffectTemplate" => {
                let (_, args) = parse_operation::<ApplyEffectTemplateArgs>(
                    "applyEffectTemplate",
                    arguments,
                    &["compIndex", "layerIndex"],
                )
                .map_err(invalid)?;
                Ok(text_result(self.submit("applyEffectTemplate", args).await))
            }
            "mcp_aftereffects_get_effects_help" => Ok(text_result(effects_help())),
            "run-bridge-test" => {
                self.queue("bridgeTestEffects", json!({}));
                Ok(text_result(format!(
                    "Bridge test effects command has been queued.\n{PANEL_HINT}\nUse the \"get-results\" tool after a few seconds to check for the test results."
                )))
            }
            _ => Err(McpError::invalid_params(
                format!("unknown tool: {name}"),
                None,
            )),
        }
    }

    pub(crate) async fn read_compositions(&self) -> String {
        self.submit("listCompositions", json!({})).await
    }
}

impl<S, C> ServerHandler for BridgeHandler<S, C>
where
    S: ExchangeStore + 'static,
    C: Clock + 'static,
{
    fn get_info(&self) -> ServerInfo {
        self.server_info.clone()
    }

    fn list_tools(
        &self,
        _: Option<PaginatedRequestParam>,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move { Ok(ListToolsResult::with_all_items(all_tools())) }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::debug!(tool = %request.name, "tool called");
            self.dispatch_tool(request.name.as_ref(), request.arguments)
                .await
        }
    }

    fn list_prompts(
        &self,
        _: Option<PaginatedRequestParam>,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        async move { Ok(ListPromptsResult::with_all_items(prompts::all_prompts())) }
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        async move {
            prompts::render(&request.name, request.arguments.as_ref())
                .map_err(|err| McpError::invalid_params(err, None))
        }
    }

    fn list_resources(
        &self,
        _: Option<PaginatedRequestParam>,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            let mut compositions = RawResource::new(COMPOSITIONS_URI, "compositions");
            compositions.description =
                Some("Compositions in the open After Effects project".to_string());
            compositions.mime_type = Some("application/json".to_string());
            Ok(ListResourcesResult::with_all_items(vec![
                compositions.no_annotation()
            ]))
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if request.uri != COMPOSITIONS_URI {
                return Err(McpError::resource_not_found(
                    format!("unknown resource: {}", request.uri),
                    None,
                ));
            }
            let text = self.read_compositions().await;
            let mut contents = ResourceContents::text(text, request.uri);
            if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
                *mime_type = Some("application/json".to_string());
            }
            Ok(ReadResourceResult {
                contents: vec![contents],
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunScriptArgs {
    script: String,
    #[serde(default)]
    parameters: JsonObject,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum AnimationTest {
    Keyframe,
    Expression,
}

impl AnimationTest {
    fn as_str(self) -> &'static str {
        match self {
            AnimationTest::Keyframe => "keyframe",
            AnimationTest::Expression => "expression",
        }
    }

    /// An Opacity keyframe at 25% one second in, or a wiggle on Position.
    fn command(self, comp_index: u32, layer_index: u32) -> (&'static str, Value) {
        match self {
            AnimationTest::Keyframe => (
                "setLayerKeyframe",
                json!({
                    "compIndex": comp_index,
                    "layerIndex": layer_index,
                    "propertyName": "Opacity",
                    "timeInSeconds": 1,
                    "value": 25,
                }),
            ),
            AnimationTest::Expression => (
                "setLayerExpression",
                json!({
                    "compIndex": comp_index,
                    "layerIndex": layer_index,
                    "propertyName": "Position",
                    "expressionString": "wiggle(3, 30)",
                }),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestAnimationArgs {
    operation: AnimationTest,
    comp_index: u32,
    layer_index: u32,
}

fn parse_arguments<T: DeserializeOwned>(args: Option<JsonObject>) -> Result<T, String> {
    let map = args.ok_or_else(|| "missing arguments".to_string())?;
    serde_json::from_value(Value::Object(map)).map_err(|err| err.to_string())
}

/// Checks tool arguments against the operation registry before anything is
/// queued. Returns the typed payload plus the arguments to write verbatim.
fn parse_operation<T: DeserializeOwned>(
    command: &str,
    args: Option<JsonObject>,
    required: &[&str],
) -> Result<(T, Value), String> {
    let map = args.ok_or_else(|| "missing arguments".to_string())?;
    if let Some(missing) = required.iter().find(|field| !map.contains_key(**field)) {
        return Err(format!("missing field `{missing}`"));
    }
    let args = Value::Object(map);
    Operation::parse(command, args.clone()).map_err(|err| err.to_string())?;
    let typed = serde_json::from_value(args.clone()).map_err(|err| err.to_string())?;
    Ok((typed, args))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        is_error: Some(false),
        meta: None,
        structured_content: None,
    }
}

fn error_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    }
}

fn confirmation(queued: String) -> CallToolResult {
    text_result(format!(
        "{queued}\nUse the \"get-results\" tool after a few seconds to check for confirmation."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::{CommandSlot, ManualClock, MemoryStore, OperationHandler, Poller, ResultSlot};
    use protocol::{executed_command, CommandStatus, HandlerOutput};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    type TestHandler = BridgeHandler<Arc<MemoryStore>, Arc<ManualClock>>;

    /// Answers every operation with its own name.
    struct EchoHost;

    impl OperationHandler for EchoHost {
        fn handle(&mut self, operation: Operation) -> anyhow::Result<HandlerOutput> {
            Ok(HandlerOutput::Json(json!({
                "status": "success",
                "message": format!("ran {}", operation.name()),
            })))
        }
    }

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn fixture() -> (Arc<ManualClock>, Arc<MemoryStore>, TestHandler) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let client = BridgeClient::new(store.clone(), clock.clone());
        let handler = BridgeHandler::new(client, Timings::default(), server_info());
        (clock, store, handler)
    }

    fn args(value: Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    fn text(result: &CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|content| content.text.clone())
            .expect("text content")
    }

    fn queued(store: &MemoryStore) -> protocol::CommandRecord {
        CommandSlot::new(store)
            .load()
            .expect("load")
            .expect("command record")
    }

    #[tokio::test]
    async fn run_script_outside_registry_is_refused() {
        let (_, store, handler) = fixture();
        let result = handler
            .dispatch_tool("run-script", args(json!({ "script": "deleteEverything" })))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("Script \"deleteEverything\" is not allowed"));
        assert!(text(&result).contains("listCompositions"));
        assert!(CommandSlot::new(&*store).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn run_script_resets_result_and_queues() {
        let (_, store, handler) = fixture();
        let result = handler
            .dispatch_tool(
                "run-script",
                args(json!({ "script": "getLayerInfo", "parameters": { "verbose": true } })),
            )
            .await
            .expect("tool result");
        assert!(text(&result).contains("Command to run \"getLayerInfo\" has been queued."));

        let record = queued(&store);
        assert_eq!(record.command, "getLayerInfo");
        assert_eq!(record.args, json!({ "verbose": true }));
        assert_eq!(record.status, CommandStatus::Pending);

        let placeholder = ResultSlot::new(&*store)
            .snapshot()
            .expect("read")
            .expect("placeholder");
        let placeholder: Value = serde_json::from_str(&placeholder.content).expect("json");
        assert_eq!(placeholder["status"], "waiting");
    }

    #[tokio::test]
    async fn malformed_arguments_are_invalid_params() {
        let (_, store, handler) = fixture();
        let err = handler
            .dispatch_tool("create-composition", args(json!({ "name": "Intro" })))
            .await
            .unwrap_err();
        assert!(err.message.contains("width"), "{}", err.message);

        let err = handler
            .dispatch_tool(
                "create-composition",
                args(json!({ "name": "Intro", "width": 0, "height": 1080 })),
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("positive"), "{}", err.message);

        let err = handler
            .dispatch_tool(
                "apply-effect",
                args(json!({ "compIndex": 1, "layerIndex": 1 })),
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("effectMatchName"), "{}", err.message);

        assert!(handler.dispatch_tool("setLayerKeyframe", None).await.is_err());
        assert!(CommandSlot::new(&*store).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let (_, _, handler) = fixture();
        let err = handler.dispatch_tool("render-movie", None).await.unwrap_err();
        assert!(err.message.contains("unknown tool: render-movie"));
    }

    #[tokio::test]
    async fn create_composition_queues_arguments_verbatim() {
        let (_, store, handler) = fixture();
        let payload = json!({
            "name": "Intro",
            "width": 1280,
            "height": 720,
            "backgroundColor": { "r": 10, "g": 20, "b": 30 }
        });
        let result = handler
            .dispatch_tool("create-composition", args(payload.clone()))
            .await
            .expect("tool result");
        assert!(text(&result).starts_with("Command to create composition \"Intro\" has been queued."));
        let record = queued(&store);
        assert_eq!(record.command, "createComposition");
        assert_eq!(record.args, payload);
    }

    #[tokio::test]
    async fn layer_tools_describe_what_was_queued() {
        let (_, store, handler) = fixture();
        let result = handler
            .dispatch_tool(
                "setLayerKeyframe",
                args(json!({
                    "compIndex": 2,
                    "layerIndex": 3,
                    "propertyName": "Position",
                    "timeInSeconds": 0.5,
                    "value": [100, 200]
                })),
            )
            .await
            .expect("tool result");
        assert!(text(&result)
            .starts_with("Command to set keyframe for \"Position\" on layer 3 in comp 2 has been queued."));
        assert!(text(&result).ends_with("to check for confirmation."));

        let result = handler
            .dispatch_tool(
                "apply-effect-template",
                args(json!({ "compIndex": 1, "layerIndex": 1, "templateName": "text-pop" })),
            )
            .await
            .expect("tool result");
        assert!(text(&result).contains("effect template 'text-pop' to layer 1"));
        assert_eq!(queued(&store).command, "applyEffectTemplate");
    }

    #[tokio::test]
    async fn get_results_without_a_result_file() {
        let (_, _, handler) = fixture();
        let result = handler
            .dispatch_tool("get-results", None)
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(false));
        assert!(text(&result).contains("No results file found"));
    }

    #[tokio::test]
    async fn test_animation_times_out_without_a_host() {
        let (clock, store, handler) = fixture();
        let started = clock.now();
        let result = handler
            .dispatch_tool(
                "test-animation",
                args(json!({ "operation": "keyframe", "compIndex": 1, "layerIndex": 1 })),
            )
            .await
            .expect("tool result");
        assert!(text(&result).contains("Timed out waiting for bridge result"));

        let waited = clock.now().duration_since(started).expect("monotonic");
        let timings = Timings::default();
        assert!(waited <= timings.await_timeout + timings.poll_interval);

        let record = queued(&store);
        assert_eq!(record.command, "setLayerKeyframe");
        assert_eq!(record.args["propertyName"], "Opacity");
        assert_eq!(record.args["value"], 25);
    }

    #[tokio::test]
    async fn waiting_tools_return_the_tagged_result() {
        let (clock, store, handler) = fixture();
        let poller = Poller::new(store.clone(), EchoHost, clock.clone());
        let host = async {
            tokio::task::yield_now().await;
            poller.tick()
        };
        let (result, _) = tokio::join!(
            handler.dispatch_tool(
                "mcp_aftereffects_applyEffect",
                args(json!({
                    "compIndex": 1,
                    "layerIndex": 1,
                    "effectMatchName": "ADBE Gaussian Blur 2"
                })),
            ),
            host
        );
        let value: Value = serde_json::from_str(&text(&result.expect("tool result"))).expect("json");
        assert_eq!(executed_command(&value), Some("applyEffect"));
        assert_eq!(value["message"], "ran applyEffect");
        assert_eq!(queued(&store).status, CommandStatus::Completed);
    }

    #[tokio::test]
    async fn compositions_resource_waits_for_list_compositions() {
        let (clock, store, handler) = fixture();
        let poller = Poller::new(store.clone(), EchoHost, clock.clone());
        let host = async {
            tokio::task::yield_now().await;
            poller.tick()
        };
        let (content, _) = tokio::join!(handler.read_compositions(), host);
        let value: Value = serde_json::from_str(&content).expect("json");
        assert_eq!(executed_command(&value), Some("listCompositions"));
    }
}
