use crate::capture::is_main_frame;
use crate::host::BrowserHost;
use crate::rules::{HeaderDirective, HeaderOperation, RuleUpdate, SessionRule};
use crate::snapshot::RequestSnapshot;
use crate::store::TabId;
use crate::{EditorError, Result, js_templates};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused, HeaderEntry,
    RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Production [`BrowserHost`] over the Chrome DevTools Protocol.
///
/// Session rules live in a per-tab rule table; main-frame document requests
/// are paused at the Fetch layer and continued with the rule's directives
/// applied when its condition matches, which gives the declarative
/// replace/teardown semantics the rule engine expects.
pub struct CdpHost {
    pages: RwLock<HashMap<TabId, Arc<Page>>>,
    rules: Arc<RwLock<HashMap<TabId, SessionRule>>>,
}

impl CdpHost {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            rules: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Enables request interception on the page and starts the task that
    /// applies this tab's active directives to paused main-frame requests.
    pub async fn register_page(&self, tab: TabId, page: Arc<Page>) -> Result<()> {
        let pattern = RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: Some(ResourceType::Document),
            request_stage: Some(RequestStage::Request),
        };
        page.execute(FetchEnableParams {
            patterns: Some(vec![pattern]),
            handle_auth_requests: None,
        })
        .await
        .map_err(|e| EditorError::General(format!("Failed to enable Fetch domain: {}", e)))?;

        let mut paused_stream = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| EditorError::General(format!("Failed to attach pause listener: {}", e)))?;

        // The rule condition scopes rewrites to main-frame documents;
        // iframe documents in the same tab pass through untouched.
        let main_frame = page.mainframe().await.ok().flatten();

        let rules = self.rules.clone();
        let page_for_continue = page.clone();

        tokio::spawn(async move {
            while let Some(event) = paused_stream.next().await {
                let mut params = ContinueRequestParams::new(event.request_id.clone());

                if matches!(event.resource_type, ResourceType::Document)
                    && is_main_frame(main_frame.as_ref(), Some(&event.frame_id))
                    && let Some(rule) = rules.read().await.get(&tab)
                    && rule.applies_to(tab)
                {
                    let headers =
                        apply_directives(event.request.headers.inner(), &rule.action.request_headers);
                    params.headers = Some(
                        headers
                            .into_iter()
                            .map(|(name, value)| HeaderEntry { name, value })
                            .collect(),
                    );
                }

                if let Err(e) = page_for_continue.execute(params).await {
                    tracing::debug!(tab, error = %e, "failed to continue paused request");
                }
            }
        });

        self.pages.write().await.insert(tab, page);
        Ok(())
    }

    pub async fn remove_page(&self, tab: TabId) {
        self.pages.write().await.remove(&tab);
        self.rules.write().await.remove(&tab);
    }

    pub async fn active_rule_tabs(&self) -> Vec<TabId> {
        self.rules.read().await.keys().copied().collect()
    }

    async fn page(&self, tab: TabId) -> Result<Arc<Page>> {
        self.pages
            .read()
            .await
            .get(&tab)
            .cloned()
            .ok_or(EditorError::SessionNotFound(tab))
    }
}

impl Default for CdpHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserHost for CdpHost {
    async fn update_session_rules(&self, update: RuleUpdate) -> Result<()> {
        // One write lock for the whole update keeps remove-then-add atomic.
        let mut rules = self.rules.write().await;
        for id in &update.remove_rule_ids {
            rules.remove(id);
        }
        if let Some(add_rules) = update.add_rules {
            for rule in add_rules {
                rules.insert(rule.id, rule);
            }
        }
        Ok(())
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<()> {
        let page = self.page(tab).await?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| EditorError::NavigationFailed(e.to_string()))?;
        page.execute(params)
            .await
            .map_err(|e| EditorError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn submit_body(&self, tab: TabId, snapshot: &RequestSnapshot) -> Result<Option<String>> {
        let page = self.page(tab).await?;
        let script = js_templates::submit_body(snapshot);
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| EditorError::InjectionFailed(e.to_string()))?;
        Ok(result.into_value::<Option<String>>().unwrap_or(None))
    }

    async fn inject_script(&self, tab: TabId, script: &str) -> Result<()> {
        let page = self.page(tab).await?;
        page.evaluate(script)
            .await
            .map_err(|e| EditorError::InjectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn forward_test(&self, tab: TabId, payload: &serde_json::Value) -> Result<()> {
        let page = self.page(tab).await?;
        let script = js_templates::forward_test(payload);
        let result = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| EditorError::InjectionFailed(e.to_string()))?;
        if let Some(error) = result.into_value::<Option<String>>().unwrap_or(None) {
            return Err(EditorError::InjectionFailed(error));
        }
        Ok(())
    }
}

/// Applies set/remove directives to a captured header object, matching
/// names case-insensitively and appending set directives for headers not
/// present yet.
fn apply_directives(
    headers: &serde_json::Value,
    directives: &[HeaderDirective],
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = headers
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    for directive in directives {
        match directive.operation {
            HeaderOperation::Set => {
                let value = directive.value.clone().unwrap_or_default();
                match pairs
                    .iter_mut()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&directive.header))
                {
                    Some((_, existing)) => *existing = value,
                    None => pairs.push((directive.header.clone(), value)),
                }
            }
            HeaderOperation::Remove => {
                pairs.retain(|(name, _)| !name.eq_ignore_ascii_case(&directive.header));
            }
        }
    }

    pairs
}
