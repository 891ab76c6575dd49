//! The capture-classify-fuse pipeline

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::audio::{CaptureLoop, CaptureSource, ClipBuffer};
use crate::classify::{TextEmotionClassifier, TranscriptionAdapter, VoiceEmotionClassifier};
use crate::emotion::{EmotionObservation, FusedResult, FusionEngine, FusionWeights, TaxonomyMapper};
use crate::{Error, Result};

use super::reorder::{ClipOutcome, ReorderBuffer};
use super::sink::ResultSink;

/// Capacity of the outcome channel between clip tasks and the emitter
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// The external collaborators a pipeline classifies through
pub struct Stages {
    /// Speech-to-text boundary
    pub transcriber: Arc<dyn TranscriptionAdapter>,
    /// Acoustic emotion boundary
    pub voice_classifier: Arc<dyn VoiceEmotionClassifier>,
    /// Linguistic emotion boundary
    pub text_classifier: Arc<dyn TextEmotionClassifier>,
    /// Fused result consumer
    pub sink: Arc<dyn ResultSink>,
}

/// Orchestrates continuous capture, per-clip branch fan-out, fusion, and
/// ordered emission
///
/// Each completed clip spawns two branch tasks (acoustic and linguistic)
/// that run in parallel with each other and with capture of the next clip;
/// a per-clip coordinator joins them, fuses, and hands the outcome to a
/// single emitter task that restores sequence order before the sink.
pub struct Pipeline {
    stages: Stages,
    mapper: Arc<TaxonomyMapper>,
    engine: Arc<FusionEngine>,
    branch_timeout: Duration,
    shutdown_grace: Duration,
}

impl Pipeline {
    /// Assemble a pipeline
    ///
    /// `branch_timeout` bounds each branch's wait before degraded fusion;
    /// `shutdown_grace` bounds how long in-flight clips may finish after a
    /// stop signal.
    #[must_use]
    pub fn new(
        stages: Stages,
        mapper: TaxonomyMapper,
        weights: FusionWeights,
        branch_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            stages,
            mapper: Arc::new(mapper),
            engine: Arc::new(FusionEngine::new(weights)),
            branch_timeout,
            shutdown_grace,
        }
    }

    /// Run the pipeline until the shutdown signal fires or capture fails
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the capture source is lost;
    /// per-clip branch failures degrade fusion but never halt the run.
    pub async fn run<S: CaptureSource>(
        &self,
        mut capture: CaptureLoop<S>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<()> {
        let (outcome_tx, outcome_rx) = mpsc::channel::<ClipOutcome>(OUTCOME_CHANNEL_CAPACITY);
        let emitter = tokio::spawn(emit_ordered(outcome_rx, Arc::clone(&self.stages.sink)));

        capture.start()?;
        tracing::info!(
            clip_samples = capture.clip_len(),
            sample_rate = capture.sample_rate(),
            branch_timeout_ms = self.branch_timeout.as_millis(),
            "pipeline running"
        );

        let mut clip_tasks: JoinSet<()> = JoinSet::new();
        let outcome: Result<()> = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                clip = capture.next_clip() => {
                    match clip {
                        Ok(clip) => {
                            self.spawn_clip(&mut clip_tasks, clip, outcome_tx.clone());
                            // Reap whatever has already finished
                            while clip_tasks.try_join_next().is_some() {}
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "capture failed");
                            break Err(e);
                        }
                    }
                }
            }
        };

        capture.stop();

        // Bounded grace period for in-flight clips, then hard abort
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while clip_tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                grace_ms = self.shutdown_grace.as_millis(),
                "grace period expired, aborting in-flight clips"
            );
            clip_tasks.abort_all();
        }

        // Closing the channel lets the emitter flush its buffer and exit
        drop(outcome_tx);
        if let Err(e) = emitter.await {
            tracing::error!(error = %e, "emitter task failed");
        }

        tracing::info!("pipeline stopped");
        outcome
    }

    /// Spawn the per-clip coordinator with its two branch tasks
    ///
    /// All three tasks go into `clip_tasks` so the shutdown grace period's
    /// `abort_all` covers the branches, not just the coordinator; a branch
    /// aborted mid-flight drops its sender and the coordinator sees a
    /// missing observation.
    fn spawn_clip(
        &self,
        clip_tasks: &mut JoinSet<()>,
        clip: ClipBuffer,
        outcome_tx: mpsc::Sender<ClipOutcome>,
    ) {
        let seq = clip.seq();
        let engine = Arc::clone(&self.engine);
        let timeout = self.branch_timeout;

        let (voice_tx, voice_rx) = oneshot::channel();
        let (text_tx, text_rx) = oneshot::channel();

        clip_tasks.spawn({
            let clip = clip.clone();
            let classifier = Arc::clone(&self.stages.voice_classifier);
            let mapper = Arc::clone(&self.mapper);
            async move {
                let _ = voice_tx.send(voice_branch(clip, classifier, mapper, timeout).await);
            }
        });
        clip_tasks.spawn({
            let transcriber = Arc::clone(&self.stages.transcriber);
            let classifier = Arc::clone(&self.stages.text_classifier);
            let mapper = Arc::clone(&self.mapper);
            async move {
                let _ = text_tx
                    .send(text_branch(clip, transcriber, classifier, mapper, timeout).await);
            }
        });

        clip_tasks.spawn(async move {
            let voice_obs = voice_rx.await.unwrap_or(None);
            let text_obs = text_rx.await.unwrap_or(None);

            let outcome = if voice_obs.is_none() && text_obs.is_none() {
                tracing::warn!(seq, "both branches failed, no result for clip");
                ClipOutcome::Skipped(seq)
            } else {
                match engine.fuse(voice_obs, text_obs) {
                    Ok(result) => ClipOutcome::Fused(Box::new(result)),
                    Err(e) => {
                        // Cannot happen from this coordinator: both branches
                        // observe the same clip
                        tracing::error!(seq, error = %e, "fusion rejected clip");
                        ClipOutcome::Skipped(seq)
                    }
                }
            };

            if outcome_tx.send(outcome).await.is_err() {
                tracing::warn!(seq, "emitter gone, dropping clip outcome");
            }
        });
    }

    /// Classify a single clip outside the continuous loop
    ///
    /// Runs both branches concurrently with the configured timeout and
    /// fuses whatever they produce. Used by the one-shot CLI path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassifierUnavailable`] if neither branch produced
    /// an observation
    pub async fn classify_clip(&self, clip: ClipBuffer) -> Result<FusedResult> {
        let (voice_obs, text_obs) = tokio::join!(
            voice_branch(
                clip.clone(),
                Arc::clone(&self.stages.voice_classifier),
                Arc::clone(&self.mapper),
                self.branch_timeout,
            ),
            text_branch(
                clip,
                Arc::clone(&self.stages.transcriber),
                Arc::clone(&self.stages.text_classifier),
                Arc::clone(&self.mapper),
                self.branch_timeout,
            ),
        );

        self.engine.fuse(voice_obs, text_obs)
    }
}

/// Acoustic branch: classify the clip's vocal tone
async fn voice_branch(
    clip: ClipBuffer,
    classifier: Arc<dyn VoiceEmotionClassifier>,
    mapper: Arc<TaxonomyMapper>,
    timeout: Duration,
) -> Option<EmotionObservation> {
    let seq = clip.seq();
    match tokio::time::timeout(timeout, classifier.classify(&clip)).await {
        Ok(Ok((label, confidence))) => {
            Some(EmotionObservation::voice(seq, label, confidence, &mapper))
        }
        Ok(Err(e)) => {
            tracing::warn!(seq, error = %e, "voice branch failed");
            None
        }
        Err(_) => {
            tracing::warn!(seq, timeout_ms = timeout.as_millis(), "voice branch timed out");
            None
        }
    }
}

/// Linguistic branch: transcribe the clip, then classify the transcript
async fn text_branch(
    clip: ClipBuffer,
    transcriber: Arc<dyn TranscriptionAdapter>,
    classifier: Arc<dyn TextEmotionClassifier>,
    mapper: Arc<TaxonomyMapper>,
    timeout: Duration,
) -> Option<EmotionObservation> {
    let seq = clip.seq();
    let work = async {
        let transcript = transcriber.transcribe(&clip).await?;
        if transcript.trim().is_empty() {
            return Err(Error::TranscriptionUnavailable(
                "empty transcript".to_string(),
            ));
        }
        let (label, confidence) = classifier.classify(&transcript).await?;
        Ok::<_, Error>((label, confidence))
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(Ok((label, confidence))) => {
            Some(EmotionObservation::text(seq, label, confidence, &mapper))
        }
        Ok(Err(e)) => {
            tracing::debug!(seq, error = %e, "text branch produced no observation");
            None
        }
        Err(_) => {
            tracing::warn!(seq, timeout_ms = timeout.as_millis(), "text branch timed out");
            None
        }
    }
}

/// Emitter task: restore sequence order, deliver to the sink, flush on close
async fn emit_ordered(mut outcome_rx: mpsc::Receiver<ClipOutcome>, sink: Arc<dyn ResultSink>) {
    let mut buffer = ReorderBuffer::new(0);

    while let Some(outcome) = outcome_rx.recv().await {
        for result in buffer.push(outcome) {
            deliver(&sink, &result).await;
        }
    }

    // Channel closed: pipeline is draining, emit what remains
    let flushed = buffer.flush();
    if !flushed.is_empty() {
        tracing::debug!(count = flushed.len(), "flushing buffered results");
    }
    for result in flushed {
        deliver(&sink, &result).await;
    }
}

async fn deliver(sink: &Arc<dyn ResultSink>, result: &FusedResult) {
    if let Err(e) = sink.emit(result).await {
        tracing::error!(seq = result.seq, error = %e, "sink emission failed");
    }
}
