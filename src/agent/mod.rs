//! Conversational assistant - one utterance in, one reply out
//!
//! NORMALIZE → (Idle: CLASSIFY → ROUTE) | (Saving: STATE MACHINE) → REPLY
//!
//! A turn never fails. Oracle and storage trouble shows up as a degraded
//! reply, never as an error to the caller.

use crate::classifier::{IntentClassifier, NluOracle};
use crate::config::AssistantConfig;
use crate::dialogue::{route_idle, DialogueStateMachine, IdleAction, SavingStep};
use crate::extractor::EntityExtractor;
use crate::gemini::GeminiClient;
use crate::market::{CoinCatalog, CoinGeckoClient, PriceOracle};
use crate::memory::{build_portfolio_store, PortfolioStore};
use crate::models::{
    Classification, DialogueMode, DialogueState, NormalizedTranscript, PortfolioEntry,
    PresentationMode, TurnReply, ValuationResult,
};
use crate::normalizer::normalize;
use crate::resolver::{CoinResolution, CoinResolver};
use crate::state::SessionStore;
use crate::valuation::{display_name, render_quotes, render_report, ValuationEngine};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_SESSION_ID: &str = "default_user";

const START_SAVING: &str = "Alright, let's save your portfolio. Say your first coin and amount.";
const NOT_CAUGHT: &str = "Sorry, I didn't catch that. Try saying a coin and quantity again.";
const NOTHING_TO_CONFIRM: &str =
    "Sorry, I don't have a coin to confirm. Please say the coin and quantity again.";
const NO_SAVED_PORTFOLIO: &str = "No saved portfolio found. Please save a new one first.";
const NOTHING_SAVED: &str = "No coins were added, so nothing was saved.";
const NOT_UNDERSTOOD: &str =
    "Sorry, I didn't understand that. Try saying 'save my portfolio' or 'check my portfolio value'.";
const WHICH_COIN: &str = "Which coin would you like a price for?";

/// Everything a turn needs, wired once at startup
pub struct Assistant {
    classifier: IntentClassifier,
    machine: DialogueStateMachine,
    resolver: Arc<CoinResolver>,
    valuation: ValuationEngine,
    sessions: SessionStore,
    portfolios: Arc<dyn PortfolioStore>,
    presentation: PresentationMode,
}

impl Assistant {
    pub fn new(
        nlu: Arc<dyn NluOracle>,
        prices: Arc<dyn PriceOracle>,
        resolver: Arc<CoinResolver>,
        portfolios: Arc<dyn PortfolioStore>,
        presentation: PresentationMode,
    ) -> Self {
        let extractor = Arc::new(EntityExtractor::new(resolver.clone()));

        Self {
            classifier: IntentClassifier::new(nlu),
            machine: DialogueStateMachine::new(extractor, resolver.clone()),
            resolver,
            valuation: ValuationEngine::new(prices),
            sessions: SessionStore::new(),
            portfolios,
            presentation,
        }
    }

    /// Wire the production oracles and store from configuration. A failed
    /// catalog fetch falls back to the curated coin set.
    pub async fn from_config(config: &AssistantConfig) -> Result<Self> {
        if config.gemini_api_key.is_empty() {
            warn!("GEMINI_API_KEY not set; every utterance will classify as unknown");
        }

        let gemini = GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_url.clone(),
            config.oracle_timeout,
            config.retry,
        )?;
        let coingecko = Arc::new(CoinGeckoClient::new(
            &config.coingecko_url,
            config.oracle_timeout,
            config.retry,
        )?);

        let resolver = if config.load_catalog {
            match coingecko.coin_ids().await {
                Ok(ids) => CoinResolver::with_catalog(ids),
                Err(e) => {
                    warn!("Coin catalog unavailable, using curated coins only: {}", e);
                    CoinResolver::with_defaults()
                }
            }
        } else {
            CoinResolver::with_defaults()
        };
        info!(known_coins = resolver.known_coins().len(), "Coin resolver ready");

        let portfolios =
            build_portfolio_store(config.database_url.as_deref(), &config.portfolio_dir);

        Ok(Self::new(
            Arc::new(gemini),
            coingecko,
            Arc::new(resolver),
            portfolios,
            config.presentation,
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one utterance for `session_id`. Turns for the same session
    /// are serialized; the session is written back only once the turn is done.
    pub async fn handle_turn(&self, session_id: &str, transcript: &str) -> TurnReply {
        let span = info_span!("turn", session_id, turn_id = %Uuid::new_v4());

        async {
            let text = normalize(transcript);
            debug!(normalized = %text, "Transcript normalized");

            let handle = self.sessions.acquire(session_id).await;
            let mut session = handle.lock().await;
            let mut working = session.clone();

            let (summary, valuation) = match working.mode {
                DialogueMode::Idle => self.idle_turn(session_id, &mut working, &text).await,
                DialogueMode::Saving => self.saving_turn(session_id, &mut working, &text).await,
            };

            working.updated_at = Utc::now();
            let mode = working.mode;
            *session = working;

            info!(mode = %mode, "Turn complete");
            TurnReply {
                summary,
                mode,
                valuation,
            }
        }
        .instrument(span)
        .await
    }

    async fn idle_turn(
        &self,
        user_id: &str,
        state: &mut DialogueState,
        text: &NormalizedTranscript,
    ) -> (String, Option<ValuationResult>) {
        let classification = self.classifier.classify(text).await;

        match route_idle(classification.intent) {
            IdleAction::StartSaving => {
                self.machine.begin_saving(state, Default::default());
                (START_SAVING.to_string(), None)
            }
            IdleAction::StartUpdating => {
                let saved = self.portfolios.load(user_id).await;
                let summary = if saved.is_empty() {
                    "You don't have a saved portfolio yet, so let's start a new one. \
                     Say your first coin and amount."
                        .to_string()
                } else {
                    format!(
                        "Let's update your portfolio. It has {} coin{} right now. \
                         Say a coin and amount, or 'done' to finish.",
                        saved.len(),
                        if saved.len() == 1 { "" } else { "s" }
                    )
                };
                self.machine.begin_saving(state, saved);
                (summary, None)
            }
            IdleAction::CheckValue => {
                let saved = self.portfolios.load(user_id).await;
                if saved.is_empty() {
                    return (NO_SAVED_PORTFOLIO.to_string(), None);
                }
                let result = self.valuation.value(&saved).await;
                (render_report(&result, self.presentation), Some(result))
            }
            IdleAction::PriceLookup => {
                let coins = self.coins_for_lookup(&classification, text);
                if coins.is_empty() {
                    return (WHICH_COIN.to_string(), None);
                }
                let quotes = self.valuation.quote(&coins).await;
                (render_quotes(&quotes), None)
            }
            IdleAction::NotUnderstood => (NOT_UNDERSTOOD.to_string(), None),
        }
    }

    async fn saving_turn(
        &self,
        user_id: &str,
        state: &mut DialogueState,
        text: &NormalizedTranscript,
    ) -> (String, Option<ValuationResult>) {
        match self.machine.on_saving_turn(state, text) {
            SavingStep::Committed(entry) => (
                format!(
                    "{} saved. Add another coin or say 'done' to finish.",
                    display_name(&entry.coin_id)
                ),
                None,
            ),
            SavingStep::AwaitingConfirmation(entry) => {
                (format!("Did you say {}?", describe(&entry)), None)
            }
            SavingStep::UnknownCoin(coin) => (
                format!(
                    "'{}' doesn't look like a valid coin. Please try again with a known crypto.",
                    coin
                ),
                None,
            ),
            SavingStep::NothingToConfirm => (NOTHING_TO_CONFIRM.to_string(), None),
            SavingStep::NotCaught => (NOT_CAUGHT.to_string(), None),
            SavingStep::Finished {
                portfolio,
                discarded,
            } => {
                let note = discarded
                    .map(|entry| format!("\n(The unconfirmed {} was not added.)", describe(&entry)))
                    .unwrap_or_default();

                if portfolio.is_empty() {
                    return (format!("{}{}", NOTHING_SAVED, note), None);
                }

                let headline = match self.portfolios.save(user_id, &portfolio).await {
                    Ok(()) => "✅ Portfolio saved.",
                    Err(e) => {
                        warn!("Portfolio save failed: {}", e);
                        "⚠️ I couldn't save your portfolio right now, but here is what you told me."
                    }
                };

                let result = self.valuation.value(&portfolio).await;
                let summary = format!(
                    "{}\n{}{}",
                    headline,
                    render_report(&result, self.presentation),
                    note
                );
                (summary, Some(result))
            }
        }
    }

    /// Coins named for a price lookup: the oracle's phrases if any,
    /// otherwise known coins spotted in the transcript.
    fn coins_for_lookup(&self, classification: &Classification, text: &NormalizedTranscript) -> Vec<String> {
        let mut coins: Vec<String> = Vec::new();
        let mut push = |coin: String| {
            if !coins.contains(&coin) {
                coins.push(coin);
            }
        };

        if !classification.portfolio.is_empty() {
            for phrase in classification.portfolio.coin_ids() {
                push(self.resolver.resolve_id(phrase));
            }
            return coins;
        }

        let words: Vec<&str> = text.words().collect();
        let mut i = 0;
        while i < words.len() {
            if i + 1 < words.len() {
                if let Some(coin) = self.direct_match(&format!("{} {}", words[i], words[i + 1])) {
                    push(coin);
                    i += 2;
                    continue;
                }
            }
            if let Some(coin) = self.direct_match(words[i]) {
                push(coin);
            }
            i += 1;
        }
        coins
    }

    /// Alias or exact hit only; fuzzy matching every word would invent coins.
    fn direct_match(&self, phrase: &str) -> Option<String> {
        match self.resolver.resolve(phrase) {
            CoinResolution::Alias(coin) | CoinResolution::Exact(coin) => Some(coin),
            _ => None,
        }
    }
}

/// `2 Ethereum`, `0.5 Bitcoin`
fn describe(entry: &PortfolioEntry) -> String {
    format!("{} {}", entry.quantity, display_name(&entry.coin_id))
}
