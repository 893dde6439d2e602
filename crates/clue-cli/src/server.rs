use std::sync::Arc;
use std::time::Instant;

use clue_core::{
    AnalysisConfig, CaseFile, Catalog, Point, SampleCoalescer, SampleOutcome, SessionError, Tool,
};
use clue_store::Store;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

/// One lock around all state: samples, tool switches and closes are
/// evaluated strictly one at a time.
#[derive(Clone)]
pub struct ClueServer {
    state: Arc<Mutex<ServerState>>,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    catalog: Catalog,
    config: AnalysisConfig,
    store: Store,
    /// The case currently being worked. Switching cases flushes it first and
    /// is refused while that flush fails.
    file: Option<CaseFile>,
    coalescer: SampleCoalescer,
}

impl ClueServer {
    pub fn new(catalog: Catalog, config: AnalysisConfig, store: Store) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                catalog,
                config,
                store,
                file: None,
                coalescer: SampleCoalescer::new(),
            })),
            tool_router: Self::tool_router(),
        }
    }

    /// Persist anything still dirty. Called on shutdown.
    pub async fn flush(&self) {
        let mut state = self.state.lock().await;
        state.flush();
    }
}

impl ServerState {
    /// Save dirty items of the loaded case. A failure is logged and the items
    /// stay dirty, so the next flush retries them.
    fn flush(&mut self) -> bool {
        let Some(file) = self.file.as_mut() else {
            return true;
        };
        match file.persist(&self.store) {
            Ok(0) => true,
            Ok(saved) => {
                tracing::debug!("persisted {saved} evidence item(s) of {}", file.case_id());
                true
            }
            Err(e) => {
                tracing::error!("failed to persist discoveries for {}: {e}", file.case_id());
                false
            }
        }
    }

    fn load_case(&self, case_id: &str) -> Result<CaseFile, McpError> {
        let case = self
            .catalog
            .case(case_id)
            .ok_or_else(|| McpError::invalid_params(format!("unknown case '{case_id}'"), None))?;
        let file = CaseFile::load(case, self.config.clone(), &self.store)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        if file.dropped_on_load() > 0 {
            tracing::warn!(
                "ignored {} stored discoveries that no longer match case {case_id}",
                file.dropped_on_load()
            );
        }
        Ok(file)
    }

    fn switch_case(&mut self, case_id: &str) -> Result<&mut CaseFile, McpError> {
        if self.file.as_ref().is_none_or(|f| f.case_id() != case_id) {
            if !self.flush() {
                let open = self.file.as_ref().map_or("", |f| f.case_id());
                return Err(McpError::internal_error(
                    format!("{open} has unsaved discoveries; retry before switching cases"),
                    None,
                ));
            }
            let file = self.load_case(case_id)?;
            self.file = Some(file);
        }
        self.active()
    }

    fn active(&mut self) -> Result<&mut CaseFile, McpError> {
        self.file
            .as_mut()
            .ok_or_else(|| session_error(SessionError::NoActiveSession))
    }

    fn submit(&mut self, position: Point) -> Result<serde_json::Value, McpError> {
        let file = self.active()?;
        let now = Instant::now();
        file.tick(now).map_err(session_error)?;
        let outcome = file
            .submit_pointer_sample(position, now)
            .map_err(session_error)?;
        let persisted = match &outcome.discovery {
            Some(event) => {
                tracing::info!("discovered clue {} on {}", event.clue_id, event.evidence_id);
                self.flush()
            }
            None => true,
        };
        self.sample_json(&outcome, persisted)
    }

    fn sample_json(
        &self,
        outcome: &SampleOutcome,
        persisted: bool,
    ) -> Result<serde_json::Value, McpError> {
        let mut json = serde_json::to_value(outcome).map_err(internal_error)?;
        let file = self.file.as_ref();
        if let Some(event) = &outcome.discovery
            && let Some(clue) = file
                .and_then(|f| f.item(&event.evidence_id))
                .and_then(|item| item.clue(&event.clue_id))
        {
            json["clue"] = serde_json::json!({
                "id": clue.id,
                "description": clue.description,
                "revealedText": clue.revealed_text,
            });
        }
        json["persisted"] = serde_json::json!(persisted);
        json["banner"] = serde_json::json!(
            file.and_then(|f| f.session()).and_then(|s| s.banner().clue_id())
        );
        Ok(json)
    }
}

fn session_error(e: SessionError) -> McpError {
    McpError::invalid_params(e.to_string(), None)
}

fn internal_error(e: serde_json::Error) -> McpError {
    McpError::internal_error(format!("failed to encode response: {e}"), None)
}

fn json_result(value: &serde_json::Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(internal_error)?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct OpenEvidenceRequest {
    /// Case id, e.g. "case-001"
    case_id: String,
    /// Evidence id within the case, e.g. "ev-1-1"
    evidence_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SetToolRequest {
    /// MAGNIFIER, UV_LIGHT or SCANNER
    tool: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SampleRequest {
    /// Horizontal position in percent of the image width (0-100)
    x: f64,
    /// Vertical position in percent of the image height (0-100)
    y: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct BurstRequest {
    /// Pointer positions in arrival order. Only the last one is evaluated.
    points: Vec<SampleRequest>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ProgressRequest {
    /// Case id. Defaults to the case currently open.
    case_id: Option<String>,
}

#[tool_router]
impl ClueServer {
    #[tool(description = "List all cases with per-evidence discovery progress.")]
    async fn list_cases(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        state.flush();

        let mut cases = Vec::new();
        for case in &state.catalog.cases {
            let progress = match state.file.as_ref().filter(|f| f.case_id() == case.id) {
                Some(file) => file.progress(),
                None => state.load_case(&case.id)?.progress(),
            };
            let complete = progress.iter().all(|p| p.found == p.total);
            cases.push(serde_json::json!({
                "id": case.id,
                "title": case.title,
                "brief": case.brief,
                "evidence": progress,
                "complete": complete,
            }));
        }

        json_result(&serde_json::json!({ "cases": cases }))
    }

    #[tool(
        description = "Open an evidence item for analysis. Starts a fresh session with the magnifier active. Clues found earlier are listed under 'revealed'."
    )]
    async fn open_evidence(
        &self,
        Parameters(req): Parameters<OpenEvidenceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        state.coalescer = SampleCoalescer::new();
        let file = state.switch_case(&req.case_id)?;
        let session = file.open_evidence(&req.evidence_id).map_err(session_error)?;
        let session_id = session.id().to_string();
        let active_tool = session.active_tool();

        let item = file
            .item(&req.evidence_id)
            .ok_or_else(|| McpError::internal_error("evidence vanished after open", None))?;
        let revealed = file.revealed_clues(&req.evidence_id).map_err(session_error)?;
        tracing::debug!("opened {}/{} as session {session_id}", req.case_id, req.evidence_id);

        let result = serde_json::json!({
            "sessionId": session_id,
            "caseId": req.case_id,
            "evidenceId": item.id,
            "title": item.title,
            "content": item.content,
            "imageReference": item.image_reference,
            "activeTool": active_tool,
            "clueCount": item.hidden_clues.len(),
            "revealed": revealed,
        });
        json_result(&result)
    }

    #[tool(description = "Switch the active analysis tool. Resets proximity feedback.")]
    async fn set_tool(
        &self,
        Parameters(req): Parameters<SetToolRequest>,
    ) -> Result<CallToolResult, McpError> {
        let tool: Tool = req
            .tool
            .parse()
            .map_err(|e: String| McpError::invalid_params(e, None))?;
        let mut state = self.state.lock().await;
        let changed = state
            .active()?
            .set_active_tool(tool)
            .map_err(session_error)?;
        if changed {
            tracing::debug!("switched tool to {tool}");
        }
        json_result(&serde_json::json!({
            "activeTool": tool,
            "changed": changed,
        }))
    }

    #[tool(
        description = "Submit one pointer position (percent of image size). Returns proximity, feedback intensities and any discovery."
    )]
    async fn submit_sample(
        &self,
        Parameters(req): Parameters<SampleRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let result = state.submit(Point::new(req.x, req.y))?;
        json_result(&result)
    }

    #[tool(
        description = "Submit a burst of pointer positions. Superseded positions are dropped and only the most recent one is evaluated."
    )]
    async fn submit_pointer_burst(
        &self,
        Parameters(req): Parameters<BurstRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let before = state.coalescer.superseded();
        for p in &req.points {
            state.coalescer.push(Point::new(p.x, p.y));
        }
        let superseded = state.coalescer.superseded() - before;
        let Some(latest) = state.coalescer.take() else {
            return Err(McpError::invalid_params("burst contains no points", None));
        };
        let mut result = state.submit(latest)?;
        result["superseded"] = serde_json::json!(superseded);
        json_result(&result)
    }

    #[tool(
        description = "Close the open evidence item and persist its merged discovery state."
    )]
    async fn close_evidence(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let merged = state.active()?.close_evidence().map_err(session_error)?;
        let persisted = state.flush();
        json_result(&serde_json::json!({
            "evidenceId": merged.id,
            "discovered": merged.discovered_clue_ids,
            "complete": merged.is_complete(),
            "persisted": persisted,
        }))
    }

    #[tool(
        description = "Discovery progress for a case: found/total and status per evidence item."
    )]
    async fn progress(
        &self,
        Parameters(req): Parameters<ProgressRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let case_id = match req.case_id {
            Some(id) => id,
            None => state.active()?.case_id().to_string(),
        };
        // Another case is read straight from the store; the open one stays put.
        let other;
        let file = match state.file.as_ref().filter(|f| f.case_id() == case_id) {
            Some(file) => file,
            None => {
                other = state.load_case(&case_id)?;
                &other
            }
        };
        json_result(&serde_json::json!({
            "caseId": case_id,
            "evidence": file.progress(),
            "complete": file.is_complete(),
            "unsaved": file.dirty_count(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for ClueServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Evidence analysis lab. Coordinates are percentages of the evidence image.\n\n\
                 1. list_cases to see cases and progress.\n\
                 2. open_evidence with a case and evidence id.\n\
                 3. set_tool (MAGNIFIER, UV_LIGHT, SCANNER); each clue responds to one tool only.\n\
                 4. submit_sample or submit_pointer_burst while sweeping; proximity rises \
                    toward 1 near an undiscovered clue of the active tool. A discovery returns \
                    the clue text.\n\
                 5. close_evidence when done. Discoveries are saved as they happen."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::EvidenceKey;

    fn make_server() -> ClueServer {
        make_server_with(AnalysisConfig::default())
    }

    fn make_server_with(config: AnalysisConfig) -> ClueServer {
        let catalog = Catalog::builtin(&config).unwrap();
        ClueServer::new(catalog, config, Store::open_in_memory().unwrap())
    }

    fn text_from_result(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_result(result: &CallToolResult) -> serde_json::Value {
        let text = text_from_result(result);
        serde_json::from_str(&text).expect("handler should return valid JSON")
    }

    async fn open(server: &ClueServer, case_id: &str, evidence_id: &str) -> serde_json::Value {
        let result = server
            .open_evidence(Parameters(OpenEvidenceRequest {
                case_id: case_id.to_string(),
                evidence_id: evidence_id.to_string(),
            }))
            .await
            .unwrap();
        parse_result(&result)
    }

    async fn sample(server: &ClueServer, x: f64, y: f64) -> serde_json::Value {
        parse_result(
            &server
                .submit_sample(Parameters(SampleRequest { x, y }))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_cases_fresh() {
        let server = make_server();
        let json = parse_result(&server.list_cases().await.unwrap());
        let cases = json["cases"].as_array().unwrap();
        assert_eq!(cases.len(), 4);
        assert_eq!(cases[0]["id"], "case-001");
        assert_eq!(cases[0]["evidence"][0]["status"], "PENDING_LAB");
        assert_eq!(cases[0]["complete"], false);
    }

    #[tokio::test]
    async fn test_open_hides_clues_until_found() {
        let server = make_server();
        let json = open(&server, "case-001", "ev-1-1").await;
        assert_eq!(json["activeTool"], "MAGNIFIER");
        assert_eq!(json["clueCount"], 1);
        assert_eq!(json["revealed"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_sample_without_session_is_error() {
        let server = make_server();
        assert!(
            server
                .submit_sample(Parameters(SampleRequest { x: 1.0, y: 1.0 }))
                .await
                .is_err()
        );
        assert!(server.close_evidence().await.is_err());
    }

    #[tokio::test]
    async fn test_discovery_flow() {
        let server = make_server();
        open(&server, "case-001", "ev-1-1").await;

        let warm = sample(&server, 45.0, 65.0).await;
        assert!(warm["proximity"].as_f64().unwrap() > 0.0);
        assert!(warm["discovery"].is_null());

        let hit = sample(&server, 45.0, 55.0).await;
        assert_eq!(hit["discovery"]["clueId"], "c1");
        assert_eq!(hit["proximity"], 0.0);
        assert_eq!(hit["persisted"], true);
        assert_eq!(hit["banner"], "c1");
        assert!(!hit["clue"]["revealedText"].as_str().unwrap().is_empty());

        // same spot again: no second event
        let again = sample(&server, 45.0, 55.0).await;
        assert!(again["discovery"].is_null());

        let closed = parse_result(&server.close_evidence().await.unwrap());
        assert_eq!(closed["discovered"], serde_json::json!(["c1"]));
        assert_eq!(closed["complete"], true);

        let reopened = open(&server, "case-001", "ev-1-1").await;
        assert_eq!(reopened["revealed"][0]["id"], "c1");
    }

    #[tokio::test]
    async fn test_wrong_tool_never_discovers() {
        let server = make_server();
        open(&server, "case-001", "ev-1-3").await;
        // c3 is a UV_LIGHT clue; magnifier is active
        let json = sample(&server, 10.0, 10.0).await;
        assert!(json["discovery"].is_null());
        assert_eq!(json["proximity"], 0.0);

        let set = parse_result(
            &server
                .set_tool(Parameters(SetToolRequest {
                    tool: "uv_light".into(),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(set["activeTool"], "UV_LIGHT");
        assert_eq!(set["changed"], true);

        let json = sample(&server, 10.0, 10.0).await;
        assert_eq!(json["discovery"]["clueId"], "c3");
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let server = make_server();
        open(&server, "case-001", "ev-1-1").await;
        let err = server
            .set_tool(Parameters(SetToolRequest {
                tool: "xray".into(),
            }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_burst_evaluates_latest() {
        let server = make_server();
        open(&server, "case-001", "ev-1-4").await;
        let json = parse_result(
            &server
                .submit_pointer_burst(Parameters(BurstRequest {
                    points: vec![
                        SampleRequest { x: 0.0, y: 0.0 },
                        SampleRequest { x: 20.0, y: 20.0 },
                        SampleRequest { x: 50.0, y: 50.0 },
                    ],
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["superseded"], 2);
        assert_eq!(json["discovery"]["clueId"], "c4");

        let empty = server
            .submit_pointer_burst(Parameters(BurstRequest { points: vec![] }))
            .await;
        assert!(empty.is_err());
    }

    #[tokio::test]
    async fn test_progress_tracks_open_case() {
        let server = make_server();
        open(&server, "case-002", "ev-2-2").await;
        server
            .set_tool(Parameters(SetToolRequest {
                tool: "SCANNER".into(),
            }))
            .await
            .unwrap();
        sample(&server, 50.0, 50.0).await;

        let json = parse_result(
            &server
                .progress(Parameters(ProgressRequest { case_id: None }))
                .await
                .unwrap(),
        );
        assert_eq!(json["caseId"], "case-002");
        assert_eq!(json["evidence"][1]["status"], "COMPLETE");
        assert_eq!(json["evidence"][0]["status"], "PENDING_LAB");
        assert_eq!(json["unsaved"], 0);

        // switching cases keeps what was found
        open(&server, "case-001", "ev-1-1").await;
        let json = parse_result(
            &server
                .progress(Parameters(ProgressRequest {
                    case_id: Some("case-002".into()),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["evidence"][1]["found"], 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_rejected() {
        let server = make_server();
        let err = server
            .open_evidence(Parameters(OpenEvidenceRequest {
                case_id: "case-999".into(),
                evidence_id: "ev".into(),
            }))
            .await;
        assert!(err.is_err());
        let err = server
            .open_evidence(Parameters(OpenEvidenceRequest {
                case_id: "case-001".into(),
                evidence_id: "ev-9-9".into(),
            }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_case_switch_refused_until_discoveries_saved() {
        let server = make_server();
        open(&server, "case-001", "ev-1-1").await;
        server
            .state
            .lock()
            .await
            .store
            .conn()
            .execute_batch(
                "CREATE TRIGGER block_saves BEFORE INSERT ON discoveries
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let hit = sample(&server, 45.0, 55.0).await;
        assert_eq!(hit["discovery"]["clueId"], "c1");
        assert_eq!(hit["persisted"], false);

        let refused = server
            .open_evidence(Parameters(OpenEvidenceRequest {
                case_id: "case-002".into(),
                evidence_id: "ev-2-1".into(),
            }))
            .await;
        assert!(refused.is_err());

        let progress = parse_result(
            &server
                .progress(Parameters(ProgressRequest { case_id: None }))
                .await
                .unwrap(),
        );
        assert_eq!(progress["caseId"], "case-001");
        assert_eq!(progress["unsaved"], 1);

        server
            .state
            .lock()
            .await
            .store
            .conn()
            .execute_batch("DROP TRIGGER block_saves;")
            .unwrap();
        open(&server, "case-002", "ev-2-1").await;

        let state = server.state.lock().await;
        let saved = state
            .store
            .load_discovered(&EvidenceKey::new("case-001", "ev-1-1"))
            .unwrap()
            .expect("c1 should reach the store once saves work again");
        assert!(saved.contains("c1"));
    }

    #[tokio::test]
    async fn test_banner_clears_after_hold() {
        let config = AnalysisConfig {
            banner_ms: 20,
            ..AnalysisConfig::default()
        };
        let server = make_server_with(config);
        open(&server, "case-001", "ev-1-1").await;

        let hit = sample(&server, 45.0, 55.0).await;
        assert_eq!(hit["banner"], "c1");

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let later = sample(&server, 10.0, 10.0).await;
        assert!(later["banner"].is_null());
        assert!(later["discovery"].is_null());
    }

    #[tokio::test]
    async fn test_progress_of_other_case_keeps_session() {
        let server = make_server();
        open(&server, "case-001", "ev-1-1").await;

        let other = parse_result(
            &server
                .progress(Parameters(ProgressRequest {
                    case_id: Some("case-002".into()),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(other["caseId"], "case-002");
        assert_eq!(other["evidence"][0]["found"], 0);

        let hit = sample(&server, 45.0, 55.0).await;
        assert_eq!(hit["discovery"]["clueId"], "c1");
    }
}
