use super::HeadersSent;
use crate::codec::CodecRegistry;
use crate::store::SessionStore;
use std::sync::Arc;

/// Second stage: refines the captured snapshot's encoding name from the
/// content-type header actually sent on the wire. The header-send event
/// always follows request initiation for the same request, so the snapshot
/// is already in the store; a missing snapshot means the event is stale and
/// is dropped.
#[derive(Clone)]
pub struct EncodingResolver {
    store: Arc<SessionStore>,
    registry: &'static CodecRegistry,
}

impl EncodingResolver {
    pub fn new(store: Arc<SessionStore>, registry: &'static CodecRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn on_headers_sent(&self, event: HeadersSent) {
        let Some(content_type) = event
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
        else {
            return;
        };

        let codec = self.registry.resolve_wire_type(content_type);
        tracing::debug!(tab = event.tab, enctype = codec.name(), "resolved body encoding");
        self.store.refine_enctype(event.tab, codec.name()).await;
    }
}
