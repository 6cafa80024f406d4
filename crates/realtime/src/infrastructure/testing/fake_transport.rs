//! In-memory transport.
//!
//! Records every opened link (URL, transmitted text, close code) and lets the
//! test play the server side by emitting lifecycle events on a link's sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::error::RealtimeError;
use crate::ports::outbound::{Transport, TransportEventSink, TransportLink};

#[derive(Debug)]
struct LinkRecord {
    url: Url,
    sink: TransportEventSink,
    sent: Vec<String>,
    close_code: Option<u16>,
}

#[derive(Debug, Default)]
struct FakeState {
    links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    auto_open: bool,
}

impl FakeTransport {
    /// Links stay pending until the test calls `open_link`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every link reports `Opened` as soon as it is created.
    pub fn auto_open() -> Self {
        Self {
            auto_open: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of links opened so far.
    pub fn open_count(&self) -> usize {
        self.lock().links.len()
    }

    pub fn url(&self, link: usize) -> Option<Url> {
        self.lock().links.get(link).map(|l| l.url.clone())
    }

    /// Text frames transmitted on `link`, oldest first.
    pub fn sent(&self, link: usize) -> Vec<String> {
        self.lock()
            .links
            .get(link)
            .map(|l| l.sent.clone())
            .unwrap_or_default()
    }

    /// Close code the client used on `link`, if it closed it.
    pub fn close_code(&self, link: usize) -> Option<u16> {
        self.lock().links.get(link).and_then(|l| l.close_code)
    }

    fn sink(&self, link: usize) -> Option<TransportEventSink> {
        self.lock().links.get(link).map(|l| l.sink.clone())
    }

    pub fn open_link(&self, link: usize) {
        if let Some(sink) = self.sink(link) {
            sink.opened();
        }
    }

    pub fn push_message(&self, link: usize, text: &str) {
        if let Some(sink) = self.sink(link) {
            sink.message(text);
        }
    }

    pub fn fail_link(&self, link: usize, message: &str) {
        if let Some(sink) = self.sink(link) {
            sink.error(message);
        }
    }

    /// Server-side close with `code`.
    pub fn close_link(&self, link: usize, code: u16) {
        if let Some(sink) = self.sink(link) {
            sink.closed(code);
        }
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &Url, events: TransportEventSink) -> Box<dyn TransportLink> {
        let index = {
            let mut state = self.lock();
            state.links.push(LinkRecord {
                url: url.clone(),
                sink: events.clone(),
                sent: Vec::new(),
                close_code: None,
            });
            state.links.len() - 1
        };
        if self.auto_open {
            events.opened();
        }
        Box::new(FakeLink {
            state: Arc::clone(&self.state),
            index,
        })
    }
}

struct FakeLink {
    state: Arc<Mutex<FakeState>>,
    index: usize,
}

impl FakeLink {
    fn with_record<R>(&self, f: impl FnOnce(&mut LinkRecord) -> R) -> Option<R> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.links.get_mut(self.index).map(f)
    }
}

impl TransportLink for FakeLink {
    fn send_text(&self, text: String) -> Result<(), RealtimeError> {
        self.with_record(|record| {
            if record.close_code.is_some() {
                return Err(RealtimeError::Transport("link closed".into()));
            }
            record.sent.push(text);
            Ok(())
        })
        .unwrap_or_else(|| Err(RealtimeError::Transport("unknown link".into())))
    }

    fn close(&self, code: u16) {
        self.with_record(|record| {
            record.close_code.get_or_insert(code);
        });
    }
}
