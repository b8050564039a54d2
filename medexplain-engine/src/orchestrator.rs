// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Simplification request orchestration
//!
//! One request runs three best-effort analytics passes around the rewrite:
//!
//! 1. intake: every extracted term at the placeholder score, before the
//!    backend is called, so the table reflects demand even if generation fails
//! 2. final: the same terms again with the readability score of the answer
//! 3. explained: the terms the backend marked with `[[...]]` (or, failing
//!    that, capitalized words of the input)
//!
//! Ledger failures are logged and reported in [`AnalyticsOutcome`]; they
//! never change the text returned to the caller.

use crate::generation::GenerationClient;
use medexplain_analysis::{
    extract_bracketed, strip_brackets, CapitalizedFallback, ReadabilityScorer, ResponseAssembler,
    TermExtractor, TermFlagger, TopicGuard,
};
use medexplain_core::{EngineConfig, EngineError, ScoringInput, TermSample};
use medexplain_storage::{MergeReport, TermLedger};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of one analytics pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Committed(MergeReport),
    /// Nothing to record, or the pass did not apply to this request
    Skipped,
    Failed(String),
}

impl PassOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PassOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsOutcome {
    pub intake: PassOutcome,
    pub final_pass: PassOutcome,
    pub explained_pass: PassOutcome,
}

#[derive(Debug, Clone)]
pub struct SimplifyOutcome {
    /// Reader-facing answer with bracket markers removed
    pub text: String,
    pub score: f64,
    /// Terms recorded by the explained pass
    pub terms: BTreeSet<String>,
    /// The input was judged off-topic and the refusal message returned
    pub off_topic: bool,
    /// Generation frames that could not be used
    pub skipped_fragments: usize,
    pub analytics: AnalyticsOutcome,
}

pub struct Simplifier {
    client: Arc<dyn GenerationClient>,
    ledger: Arc<TermLedger>,
    extractor: TermExtractor,
    scorer: ReadabilityScorer,
    assembler: ResponseAssembler,
    flagger: TermFlagger,
    fallback: CapitalizedFallback,
    guard: Option<TopicGuard>,
    placeholder_score: f64,
    off_topic_message: String,
}

impl Simplifier {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        ledger: Arc<TermLedger>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let guard = if config.orchestrator.guard_off_topic {
            Some(TopicGuard::new(&config.orchestrator.medical_keywords)?)
        } else {
            None
        };

        Ok(Self {
            client,
            ledger,
            extractor: TermExtractor::from_config(&config.extraction)?,
            scorer: ReadabilityScorer::new(config.scoring.clone())?,
            assembler: ResponseAssembler::new(config.generation.assembly),
            flagger: TermFlagger::from_config(&config.flags)?,
            fallback: CapitalizedFallback::new(&config.extraction.capitalized_pattern)?,
            guard,
            placeholder_score: config.orchestrator.placeholder_score,
            off_topic_message: config.orchestrator.off_topic_message.clone(),
        })
    }

    pub fn ledger(&self) -> &Arc<TermLedger> {
        &self.ledger
    }

    pub async fn simplify(&self, raw_text: &str) -> Result<SimplifyOutcome, EngineError> {
        let intake_terms = self.extractor.extract(raw_text);
        debug!(terms = ?intake_terms, "Intake terms extracted");

        let intake_samples = self.heuristic_samples(&intake_terms, self.placeholder_score);
        let intake = self.commit("intake", intake_samples).await;

        let body = self.client.generate(raw_text).await.map_err(|e| {
            warn!(model = self.client.model_name(), error = %e, "Generation request failed");
            EngineError::GenerationUnavailable(e.to_string())
        })?;

        let assembly = self.assembler.assemble(&body).map_err(|e| {
            warn!("{}", e);
            EngineError::EmptyGeneration {
                skipped: e.skipped.len(),
            }
        })?;

        let scoring = ScoringInput {
            raw_text: raw_text.to_string(),
            bracketed_terms: extract_bracketed(&assembly.text),
            rewritten_text: assembly.text,
        };

        let explained = if scoring.bracketed_terms.is_empty() {
            let fallback = self.fallback.find(&scoring.raw_text);
            debug!(terms = ?fallback, "No bracketed terms; using capitalized fallback");
            fallback
        } else {
            scoring.bracketed_terms.clone()
        };

        let score = self
            .scorer
            .score(&scoring.rewritten_text, scoring.bracketed_count());

        if explained.is_empty() && self.is_off_topic(raw_text) {
            info!("Input judged off-topic; returning refusal");
            return Ok(SimplifyOutcome {
                text: self.off_topic_message.clone(),
                score,
                terms: BTreeSet::new(),
                off_topic: true,
                skipped_fragments: assembly.skipped.len(),
                analytics: AnalyticsOutcome {
                    intake,
                    final_pass: PassOutcome::Skipped,
                    explained_pass: PassOutcome::Skipped,
                },
            });
        }

        let final_samples = self.heuristic_samples(&intake_terms, score);
        let final_pass = self.commit("final", final_samples).await;

        let explained_samples = explained
            .iter()
            .map(|term| {
                self.flagger
                    .explained_sample(term, score, &scoring.rewritten_text)
            })
            .collect();
        let explained_pass = self.commit("explained", explained_samples).await;

        info!(
            score,
            terms = explained.len(),
            skipped_fragments = assembly.skipped.len(),
            "Simplification complete"
        );

        Ok(SimplifyOutcome {
            text: strip_brackets(&scoring.rewritten_text),
            score,
            terms: explained,
            off_topic: false,
            skipped_fragments: assembly.skipped.len(),
            analytics: AnalyticsOutcome {
                intake,
                final_pass,
                explained_pass,
            },
        })
    }

    fn is_off_topic(&self, raw_text: &str) -> bool {
        match &self.guard {
            Some(guard) => !guard.is_probably_medical(raw_text),
            None => false,
        }
    }

    fn heuristic_samples(&self, terms: &BTreeSet<String>, score: f64) -> Vec<TermSample> {
        terms
            .iter()
            .map(|term| self.flagger.heuristic_sample(term, score))
            .collect()
    }

    /// Run one merge batch on the blocking pool
    async fn commit(&self, pass: &'static str, samples: Vec<TermSample>) -> PassOutcome {
        if samples.is_empty() {
            return PassOutcome::Skipped;
        }

        let ledger = Arc::clone(&self.ledger);
        match tokio::task::spawn_blocking(move || ledger.merge_batch(&samples)).await {
            Ok(Ok(report)) => PassOutcome::Committed(report),
            Ok(Err(e)) => {
                error!(pass, error = %e, "Failed to record term statistics");
                PassOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(pass, error = %e, "Term statistics task panicked");
                PassOutcome::Failed(format!("Blocking task panicked: {}", e))
            }
        }
    }
}
