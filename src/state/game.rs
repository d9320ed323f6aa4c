use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{AnswerId, QuestionEntity, ThemeId},
    platform::{Keyboard, MessageId, UserId},
};

/// Prices offered in every theme, cheapest first.
pub const PRICE_SCHEDULE: [i64; 5] = [100, 200, 300, 400, 500];

const ALL_SLOTS: u8 = (1 << PRICE_SCHEDULE.len()) - 1;

/// Bitmap of consumed price slots for one theme. Bit `i` covers `PRICE_SCHEDULE[i]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceSlots(u8);

impl PriceSlots {
    /// Slot index of `price`, if it belongs to the schedule.
    pub fn slot_for(price: i64) -> Option<usize> {
        PRICE_SCHEDULE.iter().position(|candidate| *candidate == price)
    }

    pub fn is_consumed(self, price: i64) -> bool {
        Self::slot_for(price).is_some_and(|slot| self.0 & (1 << slot) != 0)
    }

    /// Mark `price` as played. Returns `false` if it was already played or is
    /// not on the schedule.
    pub fn consume(&mut self, price: i64) -> bool {
        match Self::slot_for(price) {
            Some(slot) if self.0 & (1 << slot) == 0 => {
                self.0 |= 1 << slot;
                true
            }
            _ => false,
        }
    }

    pub fn is_exhausted(self) -> bool {
        self.0 == ALL_SLOTS
    }

    /// Mark every slot as played.
    pub fn exhaust(&mut self) {
        self.0 = ALL_SLOTS;
    }

    pub fn available_prices(self) -> impl Iterator<Item = i64> {
        PRICE_SCHEDULE
            .into_iter()
            .filter(move |price| !self.is_consumed(*price))
    }
}

/// Question currently in play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Fresh per question; echoed in answer payloads and used as the timer id.
    pub round_id: Uuid,
    pub theme_id: ThemeId,
    /// Question with answers already shuffled for display.
    pub question: QuestionEntity,
    pub correct_answer_id: AnswerId,
    pub price: i64,
    /// Answers received so far, in arrival order.
    pub answered: IndexMap<UserId, AnswerId>,
}

impl Round {
    pub fn is_correct(&self, answer_id: AnswerId) -> bool {
        answer_id == self.correct_answer_id
    }

    pub fn answer_title(&self, answer_id: AnswerId) -> Option<&str> {
        self.question
            .answers
            .iter()
            .find(|answer| answer.id == answer_id)
            .map(|answer| answer.title.as_str())
    }
}

/// Text and keyboard of a rendered screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Screen {
    pub fn new(text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// The chat message the bot keeps editing in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub message_id: Option<MessageId>,
    pub current: Option<Screen>,
    /// Screen shown before the stop confirmation, restored on cancel.
    pub previous: Option<Screen>,
}
