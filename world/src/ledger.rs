//! Town statistics, notifications and modal messages.

use std::collections::{HashSet, VecDeque};

use gateway_town_core::{Economy, Notifier};

/// Money and rating bookkeeping for the town.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TownLedger {
    money: i64,
    rating: i64,
    earned: i64,
    spent: i64,
}

impl TownLedger {
    /// Opens a ledger with a starting balance and rating.
    #[must_use]
    pub const fn new(money: i64, rating: i64) -> Self {
        Self {
            money,
            rating,
            earned: 0,
            spent: 0,
        }
    }

    /// Total credited since the ledger opened.
    #[must_use]
    pub const fn total_earned(&self) -> i64 {
        self.earned
    }

    /// Total debited since the ledger opened.
    #[must_use]
    pub const fn total_spent(&self) -> i64 {
        self.spent
    }
}

impl Economy for TownLedger {
    fn add_money(&mut self, amount: i64) {
        self.money += amount;
        self.earned += amount;
    }

    fn spend_money(&mut self, amount: i64) {
        self.money -= amount;
        self.spent += amount;
    }

    fn has_enough_money(&self, amount: i64) -> bool {
        self.money >= amount
    }

    fn money(&self) -> i64 {
        self.money
    }

    fn set_town_rating(&mut self, rating: i64) {
        self.rating = rating;
    }

    fn town_rating(&self) -> i64 {
        self.rating
    }
}

/// FIFO of short notices with duplicate suppression.
#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    pending: VecDeque<String>,
    live: HashSet<String>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every pending notice in arrival order.
    pub fn drain(&mut self) -> Vec<String> {
        self.live.clear();
        self.pending.drain(..).collect()
    }

    /// Notices waiting to be shown.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Number of notices waiting to be shown.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Notifier for NotificationQueue {
    fn enqueue(&mut self, message: &str) {
        let message = message.trim();
        if message.is_empty() || self.live.contains(message) {
            return;
        }
        let _ = self.live.insert(message.to_owned());
        self.pending.push_back(message.to_owned());
    }
}

/// Titled modal message shown between phases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Heading.
    pub title: String,
    /// Body text.
    pub body: String,
}

/// Holds at most one open message at a time plus the history of shown ones.
#[derive(Clone, Debug, Default)]
pub struct MessageBoard {
    open: Option<Message>,
    history: Vec<Message>,
}

impl MessageBoard {
    /// Opens a message, replacing any message still open.
    pub fn show(&mut self, title: impl Into<String>, body: impl Into<String>) {
        let message = Message {
            title: title.into(),
            body: body.into(),
        };
        tracing::info!(title = %message.title, "message shown");
        self.history.push(message.clone());
        self.open = Some(message);
    }

    /// Closes the open message.
    pub fn dismiss(&mut self) {
        self.open = None;
    }

    /// Reports whether a message is waiting to be dismissed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Currently open message.
    #[must_use]
    pub fn current(&self) -> Option<&Message> {
        self.open.as_ref()
    }

    /// Every message shown so far.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }
}
