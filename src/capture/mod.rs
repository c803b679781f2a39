pub mod body;
pub mod lifecycle;
pub mod listener;
pub mod resolver;

pub use body::{FormField, RawSegment};
pub use lifecycle::LifecycleManager;
pub use listener::CaptureListener;
pub use resolver::EncodingResolver;

use crate::codec::{CodecRegistry, normalize_content_type};
use crate::host::BrowserHost;
use crate::store::{SessionStore, TabId};
use crate::{EditorError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventRequestWillBeSentExtraInfo, GetRequestPostDataParams, Request,
    ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a request-initiation event exposes about the outgoing body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    FormData(Vec<FormField>),
    Raw(Vec<RawSegment>),
    None,
}

/// Internal host-event model. The per-request progression is
/// Captured → Encoding-Resolved → [Edited → Rule-Active] → Terminal;
/// initiation strictly precedes header-send for one request, and the CDP
/// wiring below preserves that ordering by request-id correlation.
#[derive(Debug, Clone)]
pub struct RequestInitiated {
    pub tab: TabId,
    pub url: String,
    pub method: String,
    pub body: BodySource,
}

#[derive(Debug, Clone)]
pub struct HeadersSent {
    pub tab: TabId,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Redirect,
    Completed,
    Errored,
}

/// Wires the three pipeline observers onto one page's CDP event streams.
pub struct CaptureSet {
    pub listener: CaptureListener,
    pub resolver: EncodingResolver,
    pub lifecycle: LifecycleManager,
}

impl CaptureSet {
    pub fn new(
        store: Arc<SessionStore>,
        host: Arc<dyn BrowserHost>,
        registry: &'static CodecRegistry,
    ) -> Self {
        Self {
            listener: CaptureListener::new(store.clone(), registry),
            resolver: EncodingResolver::new(store.clone(), registry),
            lifecycle: LifecycleManager::new(store, host),
        }
    }

    /// Subscribes to the page's network events and feeds main-document
    /// traffic into the pipeline. Only the most recent main-frame request is
    /// tracked per tab; events for other request ids, and Document-typed
    /// events from sub-frames, are ignored.
    pub async fn attach(&self, page: &Arc<Page>, tab: TabId) -> Result<()> {
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(|e| EditorError::General(format!("Failed to enable Network domain: {}", e)))?;

        // Iframe navigations also arrive as Document-typed events; only
        // requests from the page's top-level frame belong to this session.
        let main_frame = page.mainframe().await.ok().flatten();

        // Request id of the in-flight main-frame request, shared between the
        // event tasks for correlation.
        let tracked: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

        let mut initiated_stream = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| EditorError::General(format!("Failed to attach request listener: {}", e)))?;

        let listener = self.listener.clone();
        let lifecycle = self.lifecycle.clone();
        let page_for_body = page.clone();
        let tracked_init = tracked.clone();
        let init_frame = main_frame.clone();

        tokio::spawn(async move {
            while let Some(event) = initiated_stream.next().await {
                if !matches!(event.r#type, Some(ResourceType::Document))
                    || !is_main_frame(init_frame.as_ref(), event.frame_id.as_ref())
                {
                    continue;
                }

                let request_id = event.request_id.inner().to_string();

                // A redirect hop arrives as a fresh initiation carrying the
                // response it redirected from; that terminates the previous
                // attempt before the hop is captured.
                if event.redirect_response.is_some()
                    && tracked_init.read().await.as_deref() == Some(request_id.as_str())
                {
                    lifecycle.on_terminal(tab, TerminalKind::Redirect).await;
                }

                // Track and snapshot before any awaited body fetch, so a
                // header-send event arriving in the meantime correlates and
                // refines the snapshot instead of being dropped.
                *tracked_init.write().await = Some(request_id);

                let inline = inline_body_source(&event.request);
                let needs_fetch = inline.is_none();

                listener
                    .on_request_initiated(RequestInitiated {
                        tab,
                        url: event.request.url.clone(),
                        method: event.request.method.clone(),
                        body: inline.unwrap_or(BodySource::None),
                    })
                    .await;

                if needs_fetch {
                    let body = match page_for_body
                        .execute(GetRequestPostDataParams::new(event.request_id.clone()))
                        .await
                    {
                        Ok(response) => classify_body(&event.request, response.post_data.clone()),
                        Err(_) => BodySource::None,
                    };
                    listener.on_body_fetched(tab, &body).await;
                }
            }
        });

        let mut headers_stream = page
            .event_listener::<EventRequestWillBeSentExtraInfo>()
            .await
            .map_err(|e| EditorError::General(format!("Failed to attach header listener: {}", e)))?;

        let resolver = self.resolver.clone();
        let tracked_headers = tracked.clone();

        tokio::spawn(async move {
            while let Some(event) = headers_stream.next().await {
                let request_id = event.request_id.inner().to_string();
                if tracked_headers.read().await.as_deref() != Some(request_id.as_str()) {
                    continue;
                }

                resolver
                    .on_headers_sent(HeadersSent {
                        tab,
                        headers: headers_to_pairs(event.headers.inner()),
                    })
                    .await;
            }
        });

        let mut finished_stream = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| EditorError::General(format!("Failed to attach finish listener: {}", e)))?;

        let lifecycle = self.lifecycle.clone();
        let tracked_finished = tracked.clone();

        tokio::spawn(async move {
            while let Some(event) = finished_stream.next().await {
                let request_id = event.request_id.inner().to_string();
                let mut current = tracked_finished.write().await;
                if current.as_deref() == Some(request_id.as_str()) {
                    *current = None;
                    drop(current);
                    lifecycle.on_terminal(tab, TerminalKind::Completed).await;
                }
            }
        });

        let mut failed_stream = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| EditorError::General(format!("Failed to attach failure listener: {}", e)))?;

        let lifecycle = self.lifecycle.clone();
        let tracked_failed = tracked;

        tokio::spawn(async move {
            while let Some(event) = failed_stream.next().await {
                let request_id = event.request_id.inner().to_string();
                let mut current = tracked_failed.write().await;
                if current.as_deref() == Some(request_id.as_str()) {
                    *current = None;
                    drop(current);
                    lifecycle.on_terminal(tab, TerminalKind::Errored).await;
                }
            }
        });

        Ok(())
    }
}

/// A session's events come from the page's top-level frame only. When the
/// main frame id could not be resolved at attach time the filter is
/// permissive rather than dropping all capture for the tab.
pub(crate) fn is_main_frame(main_frame: Option<&FrameId>, frame: Option<&FrameId>) -> bool {
    match main_frame {
        Some(id) => frame == Some(id),
        None => true,
    }
}

/// Body readable straight off the initiation event without another CDP
/// round trip. `None` means a body exists but must be fetched separately.
fn inline_body_source(request: &Request) -> Option<BodySource> {
    match inline_post_data(request) {
        Some(data) => Some(classify_body(request, data)),
        None if request.has_post_data == Some(true) => None,
        None => Some(BodySource::None),
    }
}

/// The CDP `postData` string was replaced by base64-encoded
/// `postDataEntries`; reassemble them into the same text form.
fn inline_post_data(request: &Request) -> Option<String> {
    let entries = request.post_data_entries.as_ref()?;
    let mut bytes = Vec::new();
    for entry in entries {
        let encoded: &str = entry.bytes.as_ref()?.as_ref();
        bytes.extend(BASE64.decode(encoded).ok()?);
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Form submissions are parsed into structured fields so capture re-encodes
/// them canonically; everything else is kept as one raw text segment.
fn classify_body(request: &Request, data: String) -> BodySource {
    let is_form = headers_to_pairs(request.headers.inner())
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .is_some_and(|(_, value)| {
            normalize_content_type(value) == "application/x-www-form-urlencoded"
        });

    if is_form {
        BodySource::FormData(body::parse_form_fields(data.as_bytes()))
    } else {
        BodySource::Raw(vec![RawSegment::Bytes(data.into_bytes())])
    }
}

fn headers_to_pairs(headers: &serde_json::Value) -> Vec<(String, String)> {
    headers
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| {
                    value.as_str().map(|v| (name.clone(), v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}
