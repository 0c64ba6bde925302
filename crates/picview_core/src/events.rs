//! In-process notifications from the view models to the presentation layer.
//!
//! Handlers are registered per [`Topic`] and called synchronously, in
//! subscription order, once per [`EventBus::emit`]. Nothing is queued.

use std::collections::HashMap;

use crate::entities::{Folder, Image, ImageClassification, ImageId};

/// Names of the notifications a subscriber can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ClassificationStarted,
    ClassificationChanged,
    ClassificationCompleted,
    ImageLoaded,
    ImageSelected,
    ImagesLoaded,
    FolderChanged,
    ZoomChanged,
    RotationChanged,
    Error,
}

/// A notification together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ClassificationStarted(ImageId),
    ClassificationChanged(ImageClassification),
    ClassificationCompleted(ImageClassification),
    ImageLoaded(Image),
    ImageSelected(Image),
    ImagesLoaded(Vec<Image>),
    FolderChanged(Folder),
    ZoomChanged(f32),
    /// Degrees, one of 0, 90, 180 or 270.
    RotationChanged(u16),
    Error(String),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Self::ClassificationStarted(_) => Topic::ClassificationStarted,
            Self::ClassificationChanged(_) => Topic::ClassificationChanged,
            Self::ClassificationCompleted(_) => Topic::ClassificationCompleted,
            Self::ImageLoaded(_) => Topic::ImageLoaded,
            Self::ImageSelected(_) => Topic::ImageSelected,
            Self::ImagesLoaded(_) => Topic::ImagesLoaded,
            Self::FolderChanged(_) => Topic::FolderChanged,
            Self::ZoomChanged(_) => Topic::ZoomChanged,
            Self::RotationChanged(_) => Topic::RotationChanged,
            Self::Error(_) => Topic::Error,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&Event) + Send>;

/// Registry of topic subscribers.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: HashMap<Topic, Vec<(SubscriptionId, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(topic)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sid, _)| *sid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.handlers.get(&topic).map_or(0, Vec::len)
    }

    pub fn emit(&mut self, event: &Event) {
        if let Some(handlers) = self.handlers.get_mut(&event.topic()) {
            for (_, handler) in handlers.iter_mut() {
                handler(event);
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .handlers
            .iter()
            .map(|(topic, handlers)| (*topic, handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Box<dyn FnMut(&Event) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Box::new(move |event: &Event| {
                sink.lock().unwrap().push(format!("{name}:{:?}", event.topic()));
            }) as Box<dyn FnMut(&Event) + Send>
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        bus.subscribe(Topic::Error, make("first"));
        bus.subscribe(Topic::Error, make("second"));
        bus.subscribe(Topic::ZoomChanged, make("zoom"));

        bus.emit(&Event::Error("boom".into()));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:Error".to_string(), "second:Error".to_string()]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (log, make) = recorder();
        let mut bus = EventBus::new();
        let id = bus.subscribe(Topic::ZoomChanged, make("a"));
        bus.subscribe(Topic::ZoomChanged, make("b"));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(Topic::ZoomChanged), 1);

        bus.emit(&Event::ZoomChanged(1.2));
        assert_eq!(*log.lock().unwrap(), vec!["b:ZoomChanged".to_string()]);
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let mut bus = EventBus::new();
        bus.emit(&Event::RotationChanged(90));
        assert_eq!(bus.subscriber_count(Topic::RotationChanged), 0);
    }
}
