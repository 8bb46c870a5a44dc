//! Shared scene state.
//!
//! The store holds the macro-state `S`, the ordered list of user image URIs
//! and the music flag. Writers are the overlay and the CLI; every subsystem
//! only reads. Subscribers run synchronously inside the setter, and only when
//! the value actually changed.

use std::fmt;

/// Scene-wide macro state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TreeState {
    /// Elements float in random volumes around the origin.
    #[default]
    Chaos,
    /// Elements settle into the tree silhouette.
    Formed,
}

impl TreeState {
    /// The other state.
    pub fn toggled(self) -> Self {
        match self {
            TreeState::Chaos => TreeState::Formed,
            TreeState::Formed => TreeState::Chaos,
        }
    }

    #[inline]
    pub fn is_formed(self) -> bool {
        self == TreeState::Formed
    }

    /// Morph progress this state pulls toward.
    #[inline]
    pub fn progress_target(self) -> f32 {
        match self {
            TreeState::Chaos => 0.0,
            TreeState::Formed => 1.0,
        }
    }
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeState::Chaos => write!(f, "CHAOS"),
            TreeState::Formed => write!(f, "FORMED"),
        }
    }
}

/// What changed in a store notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    State { from: TreeState, to: TreeState },
    UserImages,
    Music(bool),
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(Change, &StateStore)>;

/// Observable container for the shared scene state.
#[derive(Default)]
pub struct StateStore {
    state: TreeState,
    user_images: Vec<String>,
    music_playing: bool,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store starting in the given macro state.
    pub fn with_state(state: TreeState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    #[inline]
    pub fn state(&self) -> TreeState {
        self.state
    }

    #[inline]
    pub fn user_images(&self) -> &[String] {
        &self.user_images
    }

    #[inline]
    pub fn music_playing(&self) -> bool {
        self.music_playing
    }

    pub fn set_state(&mut self, state: TreeState) {
        if self.state == state {
            return;
        }
        let from = self.state;
        self.state = state;
        log::info!("tree state {} -> {}", from, state);
        self.notify(Change::State { from, to: state });
    }

    pub fn toggle_state(&mut self) -> TreeState {
        let next = self.state.toggled();
        self.set_state(next);
        next
    }

    /// Replace the user image list, preserving order.
    pub fn set_user_images(&mut self, images: Vec<String>) {
        if self.user_images == images {
            return;
        }
        log::info!("user images updated ({} entries)", images.len());
        self.user_images = images;
        self.notify(Change::UserImages);
    }

    pub fn set_music_playing(&mut self, playing: bool) {
        if self.music_playing == playing {
            return;
        }
        self.music_playing = playing;
        self.notify(Change::Music(playing));
    }

    /// Register a callback run synchronously after every change.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(Change, &StateStore) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, change: Change) {
        // Detach the list so callbacks can borrow the store.
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for (_, callback) in subscribers.iter_mut() {
            callback(change, self);
        }
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("user_images", &self.user_images)
            .field("music_playing", &self.music_playing)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_default_is_chaos() {
        let store = StateStore::new();
        assert_eq!(store.state(), TreeState::Chaos);
        assert!(store.user_images().is_empty());
        assert!(!store.music_playing());
    }

    #[test]
    fn test_toggle_round_trip() {
        let mut store = StateStore::new();
        assert_eq!(store.toggle_state(), TreeState::Formed);
        assert_eq!(store.toggle_state(), TreeState::Chaos);
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let mut store = StateStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |change, store| {
            sink.borrow_mut().push((change, store.state()));
        });

        store.set_state(TreeState::Formed);
        store.set_state(TreeState::Formed);
        store.set_music_playing(true);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            (
                Change::State {
                    from: TreeState::Chaos,
                    to: TreeState::Formed
                },
                TreeState::Formed
            )
        );
        assert_eq!(seen[1].0, Change::Music(true));
    }

    #[test]
    fn test_user_images_keep_order() {
        let mut store = StateStore::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        store.subscribe(move |change, _| {
            if change == Change::UserImages {
                *c.borrow_mut() += 1;
            }
        });

        let images = vec!["file:///b.png".to_string(), "file:///a.png".to_string()];
        store.set_user_images(images.clone());
        store.set_user_images(images.clone());

        assert_eq!(store.user_images(), images.as_slice());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = StateStore::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let id = store.subscribe(move |_, _| *h.borrow_mut() += 1);

        store.toggle_state();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.toggle_state();

        assert_eq!(*hits.borrow(), 1);
    }
}
