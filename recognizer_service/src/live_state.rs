use recognizer_proto::Image;
use std::sync::Arc;
use tokio::sync::watch;

/// The image currently being processed, pushed to every subscriber.
///
/// Writes go through [`LiveState::begin`], whose guard clears the slot when
/// it is dropped. Concurrent `begin` calls overwrite each other: the slot
/// holds the last writer's image and is cleared by whichever guard drops
/// first.
#[derive(Debug, Clone)]
pub struct LiveState {
    sender: Arc<watch::Sender<Option<Image>>>,
}

impl Default for LiveState {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveState {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A receiver that sees the current value first, then every change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Image>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Option<Image> {
        self.sender.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes `image` and returns a guard that clears it on drop.
    pub fn begin(&self, image: Image) -> ProcessingGuard<'_> {
        tracing::trace!(%image, "live state set");
        self.sender.send_replace(Some(image));
        ProcessingGuard { state: self }
    }

    fn clear(&self) {
        self.sender.send_replace(None);
        tracing::trace!("live state cleared");
    }
}

#[must_use = "the live state is cleared as soon as the guard is dropped"]
pub struct ProcessingGuard<'a> {
    state: &'a LiveState,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.state.clear();
    }
}
