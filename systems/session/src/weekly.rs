//! Messages posted when a week ends.

use gateway_town_world::MessageBoard;

/// Balance that wins the game.
pub const WINNING_BALANCE: i64 = 1_000_000;

/// Zero-based day (July 1st) after which the goal can no longer be met.
pub const DEADLINE_DAY: u32 = 181;

const BUILD_DAY_TITLE: &str = "Build Day is Here!";

const TIPS: [&str; 5] = [
    "Your first week is done, congratulations!\n\n\
     Spend the money on more businesses and the roads that reach them.",
    "Your second week is done!\n\n\
     You're getting the hang of this.\n\n\
     Hold space to speed up the weeks between build days.",
    "Another week, another paycheck.\n\n\
     Expensive businesses earn more per visitor. Don't be afraid to sell old\n\
     businesses to make room, but nothing sold refunds its full price.",
    "You're well on your way!\n\n\
     Some businesses make travelers like your town more than others, and some\n\
     make them like it less. People love to gamble and hate billboards.",
    "Your town is more popular than ever!\n\n\
     Keep it up, and thanks for playing.",
];

/// End of the million dollar challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The town held the winning balance.
    Won,
    /// The deadline passed first.
    Failed,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Bulletin {
    tips_shown: usize,
    warned_negative: bool,
    outcome: Option<Outcome>,
}

impl Bulletin {
    pub(crate) fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Posts at most one message for the week that ended on `day`.
    pub(crate) fn post(&mut self, money: i64, day: u32, messages: &mut MessageBoard) {
        if !self.warned_negative && money < 0 {
            self.warned_negative = true;
            messages.show(
                "You (probably) lost!",
                "You have negative money!\n\n\
                 Upkeep adds up fast. Make sure the roads you pay for lead to\n\
                 profitable businesses.\n\n\
                 Selling businesses or restarting may be your best option.",
            );
            return;
        }

        if let Some(tip) = TIPS.get(self.tips_shown) {
            self.tips_shown += 1;
            messages.show(BUILD_DAY_TITLE, *tip);
            return;
        }

        if self.outcome.is_some() {
            return;
        }
        if money >= WINNING_BALANCE {
            self.outcome = Some(Outcome::Won);
            tracing::info!(money, day, "million dollar goal reached");
            messages.show(
                "You won!",
                "A million dollars in half a year!\n\nHope you had fun building a cozy town.",
            );
        } else if day >= DEADLINE_DAY {
            self.outcome = Some(Outcome::Failed);
            tracing::info!(money, day, "million dollar goal missed");
            messages.show(
                "You failed...",
                "A million dollars is a lot. You didn't make it in time!\n\n\
                 Feel free to keep building your town anyway.",
            );
        }
    }
}
