use std::sync::Arc;

use tokio::sync::watch;

/// A single-slot store whose value can be replaced at any time, waking everyone subscribed to it.
///
/// Handles are cheap to clone and all refer to the same slot.
/// The slot starts out empty; reading it with [`Observable::get`] before anything was [`set`](Observable::set) is a bug.
#[derive(Debug)]
pub struct Observable<T> {
    sender: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<T: Clone> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Observable<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_value(value: T) -> Self {
        let observable = Self::new();
        observable.set(value);
        observable
    }

    /// Replace the held value and wake all subscriptions.
    pub fn set(&self, value: T) {
        self.sender.send_replace(Some(value));
    }

    /// Return the most recently set value.
    ///
    /// # Panics
    /// If no value has ever been set.
    pub fn get(&self) -> T {
        self.try_get().expect("Observable was read before a value was set")
    }

    pub fn try_get(&self) -> Option<T> {
        self.sender.borrow().clone()
    }

    /// Subscribe to future changes. Values set before this call are considered seen.
    /// Dropping the returned [`Subscription`] releases it.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription { receiver: self.sender.subscribe() }
    }

    /// Number of subscriptions that are currently alive.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription to an [`Observable`].
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: watch::Receiver<Option<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for a value this subscription has not seen yet.
    /// Several `set` calls in a row wake the subscription only once.
    pub async fn changed(&mut self) {
        if self.receiver.changed().await.is_err() {
            // every handle to the slot is gone, so nothing can change anymore
            std::future::pending::<()>().await;
        }
    }

    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Return the current value, marking it as seen.
    pub fn latest(&mut self) -> Option<T> {
        self.receiver.borrow_and_update().clone()
    }
}
