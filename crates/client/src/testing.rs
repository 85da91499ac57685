//! Recording transport for unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::TusError;
use crate::transport::{RawResponse, TusRequest, Transport};

/// Replies with queued responses in order and keeps every request it saw.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    requests: Mutex<Vec<TusRequest>>,
}

impl MockTransport {
    pub(crate) fn new(responses: impl IntoIterator<Item = RawResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, response: RawResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<TusRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: TusRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, TusError>> + Send + '_>> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            next.ok_or_else(|| TusError::Protocol {
                status: 599,
                body: "no response queued".into(),
            })
        })
    }
}
