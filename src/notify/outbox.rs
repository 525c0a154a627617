//! outbox.rs
//! Non-blocking notification queue for the sensing loop.
//!
//! The sensing loop must never wait on the network: it posts into a bounded
//! channel with `try_send` and a worker thread performs the actual dispatch.
//! - Full queue: the notification is dropped and logged
//! - Teardown: dropping every `Outbox` clone ends the worker after it drains

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use log::{info, warn};

use crate::notify::dispatcher::NotificationDispatcher;

pub const OUTBOX_CAPACITY: usize = 32;

pub const VIDEO_RECORDED_TEXT: &str = "A video was recorded: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Text(String),
    /// Photo file name, served by the `/image` endpoint.
    Photo(String),
    /// Finished video file name; delivered as text with a `/video` link.
    Video(String),
}

#[derive(Clone)]
pub struct Outbox {
    tx: Sender<Notification>,
}

impl Outbox {
    /// Starts the delivery worker. Join the handle after dropping every clone.
    pub fn spawn(
        dispatcher: Arc<NotificationDispatcher>,
        recipient: String,
        capacity: usize,
    ) -> io::Result<(Self, JoinHandle<()>)> {
        let (tx, rx) = bounded(capacity);
        let handle = thread::Builder::new()
            .name("notify-outbox".to_string())
            .spawn(move || {
                while let Ok(notification) = rx.recv() {
                    deliver(&dispatcher, &recipient, &notification);
                }
                info!("[Notify] outbox drained, worker exiting");
            })?;
        Ok((Self { tx }, handle))
    }

    /// Outbox with no worker; the receiver sees everything posted.
    pub fn detached(capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    pub fn post(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => warn!("[Notify] outbox full, dropping {:?}", n),
            Err(TrySendError::Disconnected(n)) => {
                warn!("[Notify] outbox closed, dropping {:?}", n)
            }
        }
    }

    pub fn text(&self, text: impl Into<String>) {
        self.post(Notification::Text(text.into()));
    }

    pub fn photo(&self, file_name: impl Into<String>) {
        self.post(Notification::Photo(file_name.into()));
    }
}

pub fn deliver(dispatcher: &NotificationDispatcher, recipient: &str, notification: &Notification) -> bool {
    match notification {
        Notification::Text(text) => dispatcher.send_text(recipient, text),
        Notification::Photo(name) => dispatcher.send_image(recipient, name),
        Notification::Video(name) => {
            let text = format!("{}{}", VIDEO_RECORDED_TEXT, dispatcher.video_url(name));
            dispatcher.send_text(recipient, &text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::memory::MemoryTransport;

    #[test]
    fn worker_delivers_in_order_and_exits_when_dropped() {
        let transport = MemoryTransport::new();
        let dispatcher = Arc::new(NotificationDispatcher::new(transport.clone(), "https://h"));
        let (outbox, worker) = Outbox::spawn(dispatcher, "U1".to_string(), 8).unwrap();

        outbox.text("first");
        outbox.photo("p.jpg");
        outbox.text("last");
        drop(outbox);
        worker.join().unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(transport.texts(), vec!["first", "last"]);
        assert_eq!(sent[1].body["messages"][0]["type"], "image");
    }

    #[test]
    fn video_notification_links_to_media_endpoint() {
        let transport = MemoryTransport::new();
        let dispatcher = NotificationDispatcher::new(transport.clone(), "https://cam.example");
        assert!(deliver(&dispatcher, "U1", &Notification::Video("v.mp4".into())));
        assert_eq!(
            transport.texts(),
            vec!["A video was recorded: https://cam.example/video?file=v.mp4"]
        );
    }

    #[test]
    fn full_outbox_drops_instead_of_blocking() {
        let (outbox, rx) = Outbox::detached(2);
        outbox.text("a");
        outbox.text("b");
        outbox.text("c");
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![Notification::Text("a".into()), Notification::Text("b".into())]
        );
    }

    #[test]
    fn failed_delivery_does_not_stop_worker() {
        let transport = MemoryTransport::new();
        transport.set_failing(true);
        let dispatcher = Arc::new(NotificationDispatcher::new(transport.clone(), "https://h"));
        let (outbox, worker) = Outbox::spawn(dispatcher, "U1".to_string(), 8).unwrap();

        outbox.text("one");
        outbox.text("two");
        drop(outbox);
        worker.join().unwrap();
        assert_eq!(transport.attempts(), 2);
    }
}
