//! Dialogue State Machine
//!
//! Builds a portfolio one confirmed entry at a time. Transitions here are
//! pure: they mutate the session's `DialogueState` and report what happened.
//! Persistence, valuation and wording are left to the caller.
//!
//! ```text
//! Idle ──save_portfolio──▶ Saving(awaiting entry) ──mention──▶ Saving(awaiting confirmation)
//!   ▲                          ▲                                   │ yes/correct
//!   │                          └───────────────────────────────────┘
//!   └────────────────────────── done (from either Saving sub-state)
//! ```

use crate::extractor::EntityExtractor;
use crate::models::{
    DialogueMode, DialogueState, Intent, NormalizedTranscript, Portfolio, PortfolioEntry,
};
use crate::resolver::CoinResolver;
use std::sync::Arc;
use tracing::debug;

pub const CONFIRMATION_WORDS: &[&str] = &["yes", "yeah", "yep", "correct"];
pub const COMPLETION_WORD: &str = "done";

/// What an `Idle` session should do with a classified utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    StartSaving,
    StartUpdating,
    CheckValue,
    PriceLookup,
    NotUnderstood,
}

/// Outcome of one turn while `Saving`
#[derive(Debug, Clone, PartialEq)]
pub enum SavingStep {
    /// Pending entry confirmed and added to the portfolio
    Committed(PortfolioEntry),
    /// New pending entry awaiting a yes
    AwaitingConfirmation(PortfolioEntry),
    /// Extracted coin is not a known coin; nothing changed
    UnknownCoin(String),
    /// Confirmation with nothing pending
    NothingToConfirm,
    /// No coin and quantity found; nothing changed
    NotCaught,
    /// Session completed and reset to `Idle`
    Finished {
        portfolio: Portfolio,
        discarded: Option<PortfolioEntry>,
    },
}

pub fn route_idle(intent: Intent) -> IdleAction {
    match intent {
        Intent::SavePortfolio => IdleAction::StartSaving,
        Intent::UpdatePortfolio => IdleAction::StartUpdating,
        Intent::CheckValue => IdleAction::CheckValue,
        Intent::CoinPriceLookup => IdleAction::PriceLookup,
        Intent::Unknown => IdleAction::NotUnderstood,
    }
}

pub struct DialogueStateMachine {
    extractor: Arc<EntityExtractor>,
    resolver: Arc<CoinResolver>,
}

impl DialogueStateMachine {
    pub fn new(extractor: Arc<EntityExtractor>, resolver: Arc<CoinResolver>) -> Self {
        Self { extractor, resolver }
    }

    /// Enter `Saving` with `seed` as the working portfolio and nothing pending.
    pub fn begin_saving(&self, state: &mut DialogueState, seed: Portfolio) {
        state.mode = DialogueMode::Saving;
        state.pending_entry = None;
        state.portfolio = seed;
    }

    /// Advance a `Saving` session by one utterance.
    ///
    /// Completion is checked before confirmation, so "yes I'm done" finishes
    /// the session and drops whatever was pending.
    pub fn on_saving_turn(&self, state: &mut DialogueState, text: &NormalizedTranscript) -> SavingStep {
        debug_assert_eq!(state.mode, DialogueMode::Saving);

        if text.has_word(COMPLETION_WORD) {
            let discarded = state.pending_entry.take();
            let portfolio = std::mem::take(&mut state.portfolio);
            state.mode = DialogueMode::Idle;
            return SavingStep::Finished { portfolio, discarded };
        }

        let confirming = text.has_any_word(CONFIRMATION_WORDS);
        if confirming {
            if let Some(entry) = state.pending_entry.take() {
                state.portfolio.commit(entry.clone());
                return SavingStep::Committed(entry);
            }
        }

        let mentioned = self.extractor.extract(text);
        match mentioned.first() {
            Some(entry) if !self.resolver.is_known(&entry.coin_id) => {
                debug!(coin = %entry.coin_id, "Mentioned coin is not known");
                SavingStep::UnknownCoin(entry.coin_id.clone())
            }
            Some(entry) => {
                // A new mention replaces whatever was pending: one slot only
                state.pending_entry = Some(entry.clone());
                SavingStep::AwaitingConfirmation(entry.clone())
            }
            None if confirming => SavingStep::NothingToConfirm,
            None => SavingStep::NotCaught,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn machine() -> DialogueStateMachine {
        let resolver = Arc::new(CoinResolver::with_defaults());
        let extractor = Arc::new(EntityExtractor::new(resolver.clone()));
        DialogueStateMachine::new(extractor, resolver)
    }

    fn saving(portfolio: Portfolio, pending: Option<PortfolioEntry>) -> DialogueState {
        DialogueState {
            mode: DialogueMode::Saving,
            pending_entry: pending,
            portfolio,
            ..DialogueState::default()
        }
    }

    #[test]
    fn test_route_idle() {
        assert_eq!(route_idle(Intent::SavePortfolio), IdleAction::StartSaving);
        assert_eq!(route_idle(Intent::CheckValue), IdleAction::CheckValue);
        assert_eq!(route_idle(Intent::Unknown), IdleAction::NotUnderstood);
    }

    #[test]
    fn test_begin_saving_clears_state() {
        let mut state = DialogueState {
            pending_entry: Some(PortfolioEntry::new("bitcoin", 1.0)),
            portfolio: [("pepe", 3.0)].into_iter().collect(),
            ..DialogueState::default()
        };

        machine().begin_saving(&mut state, Portfolio::new());

        assert_eq!(state.mode, DialogueMode::Saving);
        assert!(state.portfolio.is_empty());
        assert!(state.pending_entry.is_none());
    }

    #[test]
    fn test_mention_becomes_pending() {
        let mut state = saving(Portfolio::new(), None);

        let step = machine().on_saving_turn(&mut state, &normalize("I have two ethereum"));

        assert_eq!(step, SavingStep::AwaitingConfirmation(PortfolioEntry::new("ethereum", 2.0)));
        assert_eq!(state.pending_entry, Some(PortfolioEntry::new("ethereum", 2.0)));
        assert!(state.portfolio.is_empty());
    }

    #[test]
    fn test_only_first_mention_is_held() {
        let mut state = saving(Portfolio::new(), None);

        machine().on_saving_turn(&mut state, &normalize("1 bitcoin and 2 ethereum"));

        assert_eq!(state.pending_entry, Some(PortfolioEntry::new("bitcoin", 1.0)));
    }

    #[test]
    fn test_yes_commits_pending() {
        let mut state = saving(Portfolio::new(), Some(PortfolioEntry::new("ethereum", 2.0)));

        let step = machine().on_saving_turn(&mut state, &normalize("Yes"));

        assert_eq!(step, SavingStep::Committed(PortfolioEntry::new("ethereum", 2.0)));
        assert_eq!(state.portfolio.get("ethereum"), Some(2.0));
        assert_eq!(state.portfolio.len(), 1);
        assert!(state.pending_entry.is_none());
        assert_eq!(state.mode, DialogueMode::Saving);
    }

    #[test]
    fn test_confirmation_is_whole_word() {
        let mut state = saving(Portfolio::new(), Some(PortfolioEntry::new("ethereum", 2.0)));

        let step = machine().on_saving_turn(&mut state, &normalize("that's incorrect"));

        assert_eq!(step, SavingStep::NotCaught);
        assert!(state.portfolio.is_empty());
        assert!(state.pending_entry.is_some());
    }

    #[test]
    fn test_new_mention_replaces_pending() {
        let mut state = saving(Portfolio::new(), Some(PortfolioEntry::new("ethereum", 2.0)));

        let step = machine().on_saving_turn(&mut state, &normalize("no, 3 ethereum"));

        assert_eq!(step, SavingStep::AwaitingConfirmation(PortfolioEntry::new("ethereum", 3.0)));
        assert_eq!(state.pending_entry, Some(PortfolioEntry::new("ethereum", 3.0)));
    }

    #[test]
    fn test_done_finishes_and_resets() {
        let portfolio: Portfolio = [("bitcoin", 1.0)].into_iter().collect();
        let mut state = saving(portfolio.clone(), None);

        let step = machine().on_saving_turn(&mut state, &normalize("I'm done"));

        assert_eq!(step, SavingStep::Finished { portfolio, discarded: None });
        assert_eq!(state.mode, DialogueMode::Idle);
        assert!(state.portfolio.is_empty());
    }

    #[test]
    fn test_done_takes_precedence_over_yes_and_discards_pending() {
        let mut state = saving(
            [("bitcoin", 1.0)].into_iter().collect(),
            Some(PortfolioEntry::new("tether", 10.0)),
        );

        let step = machine().on_saving_turn(&mut state, &normalize("yes done"));

        match step {
            SavingStep::Finished { portfolio, discarded } => {
                assert_eq!(portfolio.get("tether"), None);
                assert_eq!(discarded, Some(PortfolioEntry::new("tether", 10.0)));
            }
            other => panic!("expected Finished, got {:?}", other),
        }
        assert!(state.pending_entry.is_none());
        assert_eq!(state.mode, DialogueMode::Idle);
    }

    #[test]
    fn test_unknown_coin_not_made_pending() {
        let mut state = saving(Portfolio::new(), None);

        let step = machine().on_saving_turn(&mut state, &normalize("4 solana"));

        assert_eq!(step, SavingStep::UnknownCoin("solana".to_string()));
        assert!(state.pending_entry.is_none());
    }

    #[test]
    fn test_nothing_caught_leaves_state_unchanged() {
        let mut state = saving([("bitcoin", 1.0)].into_iter().collect(), None);

        let step = machine().on_saving_turn(&mut state, &normalize("hmm let me think"));

        assert_eq!(step, SavingStep::NotCaught);
        assert_eq!(state.portfolio.get("bitcoin"), Some(1.0));
        assert_eq!(state.mode, DialogueMode::Saving);
    }

    #[test]
    fn test_yes_without_pending() {
        let mut state = saving(Portfolio::new(), None);
        let step = machine().on_saving_turn(&mut state, &normalize("yes"));
        assert_eq!(step, SavingStep::NothingToConfirm);
    }

    #[test]
    fn test_commit_overwrites_existing_quantity() {
        let mut state = saving(
            [("bitcoin", 1.0)].into_iter().collect(),
            Some(PortfolioEntry::new("bitcoin", 4.0)),
        );

        machine().on_saving_turn(&mut state, &normalize("correct"));

        assert_eq!(state.portfolio.get("bitcoin"), Some(4.0));
    }
}
