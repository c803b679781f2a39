use super::{BodySource, RequestInitiated};
use crate::codec::CodecRegistry;
use crate::snapshot::RequestSnapshot;
use crate::store::{SessionStore, TabId};
use std::sync::Arc;

/// First stage of the pipeline: reconstructs the body of a request-initiation
/// event into canonical text and writes the initial snapshot.
///
/// Never blocks or fails the underlying request; anything it cannot make
/// sense of degrades to an empty body.
#[derive(Clone)]
pub struct CaptureListener {
    store: Arc<SessionStore>,
    registry: &'static CodecRegistry,
}

impl CaptureListener {
    pub fn new(store: Arc<SessionStore>, registry: &'static CodecRegistry) -> Self {
        Self { store, registry }
    }

    pub async fn on_request_initiated(&self, event: RequestInitiated) {
        let snapshot = RequestSnapshot::captured(
            event.url,
            &event.method,
            self.registry.default_name(),
            reconstruct(&event.body),
        );

        tracing::debug!(tab = event.tab, method = %snapshot.method, url = %snapshot.url, "captured request");
        self.store.record_capture(event.tab, snapshot).await;
    }

    /// Late-arriving body for the already-captured request (bodies too large
    /// to inline on the initiation event need a separate fetch). Updates the
    /// content only, so an encoding refinement that landed in the meantime
    /// is preserved.
    pub async fn on_body_fetched(&self, tab: TabId, body: &BodySource) {
        self.store.refine_content(tab, reconstruct(body)).await;
    }
}

fn reconstruct(body: &BodySource) -> String {
    match body {
        BodySource::FormData(fields) => super::body::from_form_fields(fields),
        BodySource::Raw(segments) => super::body::from_raw_segments(segments),
        BodySource::None => String::new(),
    }
}
