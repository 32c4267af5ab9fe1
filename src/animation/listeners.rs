// 文件: animation/listeners.rs
// 作用: 生命周期监听器登记表：按注册顺序保存 start/update/stop 回调。
//       分发时先取快照，回调里增删监听器不会影响本轮分发。

//! Ordered lifecycle listener registrations for a [`Spring`](super::Spring).

use std::fmt;
use std::rc::Rc;

use super::Spring;

/// Listener callback. Identity is the `Rc` allocation, see [`Listeners::remove`].
pub type Callback = Rc<dyn Fn(&Spring)>;

/// Lifecycle event a listener can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Update,
    Stop,
}

#[derive(Clone, Default)]
struct Entry {
    on_start: Option<Callback>,
    on_update: Option<Callback>,
    on_stop: Option<Callback>,
}

#[derive(Default)]
pub struct Listeners {
    entries: Vec<Entry>,
}

impl Entry {
    fn slot(&self, event: Event) -> Option<&Callback> {
        match event {
            Event::Start => self.on_start.as_ref(),
            Event::Update => self.on_update.as_ref(),
            Event::Stop => self.on_stop.as_ref(),
        }
    }

    fn holds(&self, callback: &Callback) -> bool {
        [&self.on_start, &self.on_update, &self.on_stop]
            .into_iter()
            .flatten()
            .any(|cb| Rc::ptr_eq(cb, callback))
    }
}

impl Listeners {
    /// Appends a new entry. Registering the same callback twice gives two entries.
    pub fn add(&mut self, event: Event, callback: Callback) {
        let mut entry = Entry::default();
        match event {
            Event::Start => entry.on_start = Some(callback),
            Event::Update => entry.on_update = Some(callback),
            Event::Stop => entry.on_stop = Some(callback),
        }
        self.entries.push(entry);
    }

    /// Removes every entry holding `callback` in any slot and returns how many were removed.
    pub fn remove(&mut self, callback: &Callback) -> usize {
        let before = self.entries.len();
        // 按 Rc 指针比较身份，而不是比较闭包内容
        self.entries.retain(|entry| !entry.holds(callback));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Callbacks for `event` in registration order, detached from the registry so that the
    /// registry can change while they run.
    pub fn snapshot(&self, event: Event) -> Vec<Callback> {
        self.entries
            .iter()
            .filter_map(|entry| entry.slot(event))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}
