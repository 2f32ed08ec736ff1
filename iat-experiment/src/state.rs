use crate::catalog::StimulusCatalog;
use crate::classifier::{Classification, ResponsePolicy, classify};
use crate::config::ExperimentConfig;
use crate::plan::BlockPlan;
use crate::sequencer::generate_trials;
use crate::store::ResultStore;
use crate::trial::{TrialContext, TrialToken};
use chrono::Local;
use iat_core::{
    BlockSpec, BlockStatistics, Category, ConfigurationError, PersistenceError, ResponseSide, SessionId,
    SessionPersistence, SessionPhase, SessionRecord, SessionSummary, TrialResult, TrialSpec,
};
use iat_timing::{Scheduler, Timer, TimerHandle, latency_between};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Signals the presenter feeds into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentEvent {
    StartSession { participant: String },
    Acknowledge,
    StartBlock,
    /// A response bound to the trial the presenter was showing.
    Respond { side: ResponseSide, token: TrialToken },
    Advance,
    /// Leave the completion screen before its timeout.
    Return,
    /// Abandon the running session; nothing is persisted.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    OutOfPhase(SessionPhase),
    StaleTrial,
    InvalidParticipant,
    Sealed,
    /// The previous session is sealed but not yet stored; retry or take it first.
    UnpersistedSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Dropped(DropReason),
    /// Practice block wrong key: the stimulus stays, nothing was recorded.
    PracticeError,
    Entered(SessionPhase),
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("session {session_id} was sealed but not persisted: {source}")]
    Persistence {
        session_id: SessionId,
        #[source]
        source: PersistenceError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    FixationElapsed { epoch: u64 },
    CompletionReturn { epoch: u64 },
}

/// What the presenter needs to draw the stimulus and bind the next key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusView<'a> {
    pub token: TrialToken,
    pub word: &'a str,
    pub category: Category,
    pub sequence_index: usize,
    pub total: usize,
    pub show_error: bool,
}

#[derive(Debug)]
struct SessionContext {
    store: ResultStore,
    block_index: usize,
    trials: Vec<TrialSpec>,
    cursor: usize,
    active: Option<TrialContext>,
}

#[derive(Debug)]
struct SealedSession {
    record: SessionRecord,
    persisted: bool,
}

/// Single-threaded IAT session engine.
///
/// Owns the phase, the running session's ledger and every deadline. Callers
/// push [`ExperimentEvent`]s through [`handle_event`](Self::handle_event) and
/// call [`update`](Self::update) from their loop so due deadlines fire. The
/// engine never blocks.
pub struct ExperimentStateMachine<T, R, P>
where
    T: Timer,
    R: Rng,
    P: SessionPersistence,
{
    phase: SessionPhase,
    timer: T,
    rng: R,
    persistence: P,
    config: ExperimentConfig,
    catalog: Arc<StimulusCatalog>,
    plan: Arc<BlockPlan>,
    scheduler: Scheduler<Deadline>,
    armed: Option<TimerHandle>,
    epoch: u64,
    session: Option<SessionContext>,
    sealed: Option<SealedSession>,
}

impl<T, R, P> ExperimentStateMachine<T, R, P>
where
    T: Timer,
    R: Rng,
    P: SessionPersistence,
{
    pub fn new(
        config: ExperimentConfig,
        catalog: Arc<StimulusCatalog>,
        plan: Arc<BlockPlan>,
        timer: T,
        rng: R,
        persistence: P,
    ) -> Result<Self, ConfigurationError> {
        plan.validate(&catalog)?;
        for id in [config.compatible_block, config.incompatible_block] {
            if plan.by_id(id).is_none() {
                return Err(ConfigurationError::UnknownBlock { id });
            }
        }

        Ok(Self {
            phase: SessionPhase::Idle,
            timer,
            rng,
            persistence,
            config,
            catalog,
            plan,
            scheduler: Scheduler::new(),
            armed: None,
            epoch: 0,
            session: None,
            sealed: None,
        })
    }

    pub fn handle_event(&mut self, event: ExperimentEvent) -> Result<EventOutcome, ExperimentError> {
        let outcome = match (self.phase, event) {
            (SessionPhase::Idle, ExperimentEvent::StartSession { participant }) => {
                self.start_session(&participant)
            }
            (SessionPhase::Instruction, ExperimentEvent::Acknowledge) => {
                if let Some(session) = self.session.as_mut() {
                    session.block_index = 0;
                }
                self.enter(SessionPhase::BlockInstruction)
            }
            (SessionPhase::BlockInstruction, ExperimentEvent::StartBlock) => self.start_block()?,
            (phase, ExperimentEvent::Respond { side, token }) if phase.accepts_responses() => {
                self.respond(side, token)
            }
            (phase, ExperimentEvent::Advance) if phase.accepts_advance() => self.advance()?,
            (SessionPhase::Complete, ExperimentEvent::Return) => self.enter(SessionPhase::Idle),
            (phase, ExperimentEvent::Abort) if phase.is_in_session() => self.abort(),
            (phase, event) => {
                tracing::debug!(?phase, ?event, "input out of phase, dropped");
                EventOutcome::Dropped(DropReason::OutOfPhase(phase))
            }
        };
        Ok(outcome)
    }

    /// Fires every deadline that has come due. Stale deadlines are ignored.
    pub fn update(&mut self) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        for deadline in self.scheduler.pop_due(self.timer.now()) {
            match deadline {
                Deadline::FixationElapsed { epoch }
                    if epoch == self.epoch && self.phase == SessionPhase::Fixation =>
                {
                    self.armed = None;
                    outcomes.push(self.begin_trial());
                }
                Deadline::CompletionReturn { epoch }
                    if epoch == self.epoch && self.phase == SessionPhase::Complete =>
                {
                    self.armed = None;
                    outcomes.push(self.enter(SessionPhase::Idle));
                }
                stale => tracing::debug!(?stale, epoch = self.epoch, "stale deadline ignored"),
            }
        }
        outcomes
    }

    /// Resubmits a sealed session whose first save failed. Returns whether a
    /// save happened.
    pub fn retry_persist(&mut self) -> Result<bool, ExperimentError> {
        let Some(sealed) = self.sealed.as_mut() else {
            return Ok(false);
        };
        if sealed.persisted {
            return Ok(false);
        }
        Self::persist(&mut self.persistence, sealed)?;
        Ok(true)
    }

    /// Hands over a sealed session whose save failed, for export elsewhere.
    /// Afterwards new sessions may start again.
    pub fn take_unpersisted(&mut self) -> Option<SessionRecord> {
        match self.sealed.take() {
            Some(sealed) if !sealed.persisted => {
                tracing::info!(session_id = %sealed.record.session_id, "unpersisted session taken by caller");
                Some(sealed.record)
            }
            other => {
                self.sealed = other;
                None
            }
        }
    }

    fn start_session(&mut self, participant: &str) -> EventOutcome {
        let participant = participant.trim();
        if !is_valid_participant(participant) {
            tracing::warn!(participant, "rejected participant label");
            return EventOutcome::Dropped(DropReason::InvalidParticipant);
        }
        if let Some(previous) = self.sealed.as_ref().filter(|s| !s.persisted) {
            tracing::warn!(
                session_id = %previous.record.session_id,
                "previous session not persisted, new session refused"
            );
            return EventOutcome::Dropped(DropReason::UnpersistedSession);
        }

        let started_at = Local::now();
        let session_id = SessionId::new(participant, &started_at);
        tracing::info!(%session_id, "session started");

        self.sealed = None;
        self.session = Some(SessionContext {
            store: ResultStore::new(participant, session_id, started_at),
            block_index: 0,
            trials: Vec::new(),
            cursor: 0,
            active: None,
        });
        self.enter(SessionPhase::Instruction)
    }

    fn start_block(&mut self) -> Result<EventOutcome, ExperimentError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(EventOutcome::Dropped(DropReason::OutOfPhase(self.phase)));
        };
        let Some(block) = self.plan.get(session.block_index) else {
            return Err(ConfigurationError::UnknownBlock {
                id: session.block_index as u8 + 1,
            }
            .into());
        };

        session.trials = generate_trials(block, &self.catalog, &mut self.rng)?;
        session.cursor = 0;
        tracing::info!(block = block.id, trials = session.trials.len(), "block started");

        Ok(self.enter_fixation())
    }

    fn begin_trial(&mut self) -> EventOutcome {
        let outcome = self.enter(SessionPhase::Trial);
        let token = TrialToken::from_epoch(self.epoch);
        let onset_ns = self.timer.now();
        if let Some(session) = self.session.as_mut() {
            session.active = Some(TrialContext::begin(token, onset_ns));
        }
        outcome
    }

    fn respond(&mut self, side: ResponseSide, token: TrialToken) -> EventOutcome {
        let now_ns = self.timer.now();
        let Some(session) = self.session.as_mut() else {
            return EventOutcome::Dropped(DropReason::OutOfPhase(self.phase));
        };
        let Some(context) = session.active.as_mut() else {
            return EventOutcome::Dropped(DropReason::StaleTrial);
        };
        if context.token() != token {
            tracing::debug!(%token, active = %context.token(), "late response rejected");
            return EventOutcome::Dropped(DropReason::StaleTrial);
        }
        let (Some(block), Some(spec)) = (
            self.plan.get(session.block_index),
            session.trials.get(session.cursor),
        ) else {
            return EventOutcome::Dropped(DropReason::StaleTrial);
        };

        let latency_ms = latency_between(context.onset_ns(), now_ns);
        let outcome = match classify(spec, ResponsePolicy::for_block(block), context, side, latency_ms) {
            Classification::Retry => {
                tracing::debug!(word = %spec.word, ?side, "practice error, awaiting correction");
                return EventOutcome::PracticeError;
            }
            Classification::Accepted(outcome) => outcome,
        };

        let result = TrialResult {
            participant_id: session.store.participant_id().to_string(),
            session_id: session.store.session_id().clone(),
            block_id: block.id,
            sequence_index: spec.sequence_index,
            word: spec.word.clone(),
            category: spec.category,
            correct_response: spec.correct_response,
            observed_response: outcome.observed,
            latency_ms: outcome.latency_ms,
            is_correct: outcome.is_correct,
        };
        if let Err(err) = session.store.append(result) {
            tracing::warn!(%err, "result dropped");
            return EventOutcome::Dropped(DropReason::Sealed);
        }

        session.cursor += 1;
        if session.cursor < session.trials.len() {
            self.enter_fixation()
        } else {
            session.trials.clear();
            self.enter(SessionPhase::BlockEnd)
        }
    }

    fn advance(&mut self) -> Result<EventOutcome, ExperimentError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(EventOutcome::Dropped(DropReason::OutOfPhase(self.phase)));
        };
        if session.block_index + 1 < self.plan.len() {
            session.block_index += 1;
            return Ok(self.enter(SessionPhase::BlockInstruction));
        }

        let Some(mut session) = self.session.take() else {
            return Ok(EventOutcome::Dropped(DropReason::OutOfPhase(self.phase)));
        };
        let record = match session.store.seal() {
            Ok(record) => record.clone(),
            Err(err) => {
                tracing::warn!(%err, "session already sealed");
                return Ok(EventOutcome::Dropped(DropReason::Sealed));
            }
        };
        tracing::info!(session_id = %record.session_id, trials = record.results.len(), "session sealed");

        let outcome = self.enter(SessionPhase::Complete);
        let due = self.timer.now() + ms_to_ns(self.config.completion_return_ms);
        self.armed = Some(self.scheduler.schedule(due, Deadline::CompletionReturn { epoch: self.epoch }));

        let sealed = self.sealed.insert(SealedSession {
            record,
            persisted: false,
        });
        Self::persist(&mut self.persistence, sealed)?;
        Ok(outcome)
    }

    fn abort(&mut self) -> EventOutcome {
        if let Some(session) = self.session.take() {
            tracing::info!(
                session_id = %session.store.session_id(),
                discarded = session.store.len(),
                "session aborted, unsealed results discarded"
            );
        }
        self.enter(SessionPhase::Idle)
    }

    fn persist(persistence: &mut P, sealed: &mut SealedSession) -> Result<(), ExperimentError> {
        match persistence.save(&sealed.record) {
            Ok(()) => {
                sealed.persisted = true;
                tracing::info!(session_id = %sealed.record.session_id, "session persisted");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(session_id = %sealed.record.session_id, %source, "persisting session failed");
                Err(ExperimentError::Persistence {
                    session_id: sealed.record.session_id.clone(),
                    source,
                })
            }
        }
    }

    fn enter_fixation(&mut self) -> EventOutcome {
        let outcome = self.enter(SessionPhase::Fixation);
        let (lo, hi) = self.config.fixation_bounds_ms();
        let fixation_ms = self.rng.random_range(lo..=hi);
        let due = self.timer.now() + ms_to_ns(fixation_ms);
        self.armed = Some(self.scheduler.schedule(due, Deadline::FixationElapsed { epoch: self.epoch }));
        outcome
    }

    /// Every transition goes through here: the pending deadline is cancelled,
    /// the active trial context cleared and the epoch bumped.
    fn enter(&mut self, next: SessionPhase) -> EventOutcome {
        if let Some(handle) = self.armed.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(session) = self.session.as_mut() {
            session.active = None;
        }
        self.epoch += 1;
        tracing::debug!(from = ?self.phase, to = ?next, epoch = self.epoch, "phase transition");
        self.phase = next;
        EventOutcome::Entered(next)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn plan(&self) -> &BlockPlan {
        &self.plan
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Time until the next deadline, zero if one is already due.
    pub fn next_deadline(&self) -> Option<Duration> {
        let now = self.timer.now();
        self.scheduler
            .next_due()
            .map(|due| Duration::from_nanos(due.saturating_sub(now)))
    }

    pub fn current_block(&self) -> Option<&BlockSpec> {
        self.session
            .as_ref()
            .and_then(|s| self.plan.get(s.block_index))
    }

    /// 1-based block position and plan length.
    pub fn block_progress(&self) -> Option<(usize, usize)> {
        self.session
            .as_ref()
            .map(|s| (s.block_index + 1, self.plan.len()))
    }

    pub fn current_stimulus(&self) -> Option<StimulusView<'_>> {
        let session = self.session.as_ref()?;
        let context = session.active.as_ref()?;
        let spec = session.trials.get(session.cursor)?;
        Some(StimulusView {
            token: context.token(),
            word: &spec.word,
            category: spec.category,
            sequence_index: spec.sequence_index,
            total: session.trials.len(),
            show_error: context.had_error(),
        })
    }

    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        let session = self.session.as_ref()?;
        if session.trials.is_empty() {
            return None;
        }
        Some((session.cursor + 1, session.trials.len()))
    }

    pub fn results(&self) -> &[TrialResult] {
        match (&self.session, &self.sealed) {
            (Some(session), _) => session.store.results(),
            (None, Some(sealed)) => sealed.record.results.as_slice(),
            (None, None) => &[],
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| s.store.session_id())
    }

    /// Statistics of the block being shown or just finished.
    pub fn block_statistics(&self) -> Option<BlockStatistics> {
        let session = self.session.as_ref()?;
        let block = self.plan.get(session.block_index)?;
        Some(session.store.statistics_for(block.id))
    }

    /// The last sealed session. Survives the return to idle until the next
    /// session starts.
    pub fn sealed_record(&self) -> Option<&SessionRecord> {
        self.sealed.as_ref().map(|s| &s.record)
    }

    pub fn is_persisted(&self) -> bool {
        self.sealed.as_ref().is_some_and(|s| s.persisted)
    }

    pub fn session_summary(&self) -> Option<SessionSummary> {
        self.sealed
            .as_ref()
            .map(|s| s.record.summary(self.config.compatible_block, self.config.incompatible_block))
    }
}

fn ms_to_ns(ms: u64) -> u64 {
    ms.saturating_mul(1_000_000)
}

/// Labels become part of session ids and file names.
fn is_valid_participant(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use iat_core::PersistenceError;
    use iat_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Default)]
    struct Recorder {
        saved: Vec<SessionRecord>,
        fail_next: bool,
    }

    impl SessionPersistence for Recorder {
        fn save(&mut self, record: &SessionRecord) -> Result<(), PersistenceError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(PersistenceError::Unavailable("disk full".into()));
            }
            self.saved.push(record.clone());
            Ok(())
        }

        fn list(&self) -> Result<Vec<SessionRecord>, PersistenceError> {
            Ok(self.saved.clone())
        }
    }

    type Machine = ExperimentStateMachine<ManualTimer, StdRng, Recorder>;

    fn machine_with(plan: BlockPlan) -> (Machine, ManualTimer) {
        let timer = ManualTimer::new();
        let machine = ExperimentStateMachine::new(
            ExperimentConfig::default(),
            Arc::new(StimulusCatalog::standard()),
            Arc::new(plan),
            timer.clone(),
            StdRng::seed_from_u64(11),
            Recorder::default(),
        )
        .unwrap();
        (machine, timer)
    }

    fn single_block_plan(id: u8) -> BlockPlan {
        let mut block = BlockPlan::standard().by_id(id).unwrap().clone();
        block.id = 4;
        BlockPlan::new(vec![block, BlockPlan::standard().by_id(7).unwrap().clone()]).unwrap()
    }

    fn send(m: &mut Machine, event: ExperimentEvent) -> EventOutcome {
        m.handle_event(event).unwrap()
    }

    fn into_first_trial(m: &mut Machine, timer: &ManualTimer) -> TrialToken {
        send(m, ExperimentEvent::StartSession { participant: "p01".into() });
        send(m, ExperimentEvent::Acknowledge);
        send(m, ExperimentEvent::StartBlock);
        assert_eq!(m.phase(), SessionPhase::Fixation);
        timer.advance_ms(300);
        assert_eq!(m.update(), vec![EventOutcome::Entered(SessionPhase::Trial)]);
        m.current_stimulus().unwrap().token
    }

    fn correct_side(m: &Machine) -> ResponseSide {
        let view = m.current_stimulus().unwrap();
        m.current_block().unwrap().side_of(view.category).unwrap()
    }

    #[test]
    fn idle_drops_everything_but_start() {
        let (mut m, _) = machine_with(BlockPlan::standard());
        for event in [ExperimentEvent::Acknowledge, ExperimentEvent::StartBlock, ExperimentEvent::Advance] {
            assert_eq!(
                send(&mut m, event),
                EventOutcome::Dropped(DropReason::OutOfPhase(SessionPhase::Idle))
            );
        }
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn invalid_labels_do_not_start_a_session() {
        let (mut m, _) = machine_with(BlockPlan::standard());
        for label in ["", "   ", "../etc", "a/b"] {
            assert_eq!(
                send(&mut m, ExperimentEvent::StartSession { participant: label.into() }),
                EventOutcome::Dropped(DropReason::InvalidParticipant)
            );
        }
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    #[test]
    fn session_id_is_label_and_timestamp() {
        let (mut m, _) = machine_with(BlockPlan::standard());
        send(&mut m, ExperimentEvent::StartSession { participant: " p01 ".into() });
        let id = m.session_id().unwrap().as_str().to_string();
        let (label, stamp) = id.split_at(4);
        assert_eq!(label, "p01_");
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
        assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn onset_waits_for_fixation() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        send(&mut m, ExperimentEvent::StartSession { participant: "p01".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        timer.advance_ms(5_000);
        send(&mut m, ExperimentEvent::StartBlock);
        assert_eq!(m.next_deadline(), Some(Duration::from_millis(300)));

        timer.advance_ms(299);
        assert!(m.update().is_empty());
        assert!(m.current_stimulus().is_none());

        timer.advance_ms(1);
        m.update();
        let token = m.current_stimulus().unwrap().token;
        timer.advance_ms(640);
        let side = correct_side(&m);
        send(&mut m, ExperimentEvent::Respond { side, token });
        assert_eq!(m.results()[0].latency_ms, 640);
    }

    #[test]
    fn responses_outside_trial_are_dropped() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        let token = into_first_trial(&mut m, &timer);
        let side = correct_side(&m);
        send(&mut m, ExperimentEvent::Respond { side, token });
        assert_eq!(m.phase(), SessionPhase::Fixation);

        assert_eq!(
            send(&mut m, ExperimentEvent::Respond { side, token }),
            EventOutcome::Dropped(DropReason::OutOfPhase(SessionPhase::Fixation))
        );
        assert_eq!(m.results().len(), 1);
    }

    #[test]
    fn late_response_for_previous_trial_is_rejected() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        let first = into_first_trial(&mut m, &timer);
        let side = correct_side(&m);
        send(&mut m, ExperimentEvent::Respond { side, token: first });
        timer.advance_ms(300);
        m.update();
        let second = m.current_stimulus().unwrap().token;
        assert_ne!(first, second);

        assert_eq!(
            send(&mut m, ExperimentEvent::Respond { side: ResponseSide::Left, token: first }),
            EventOutcome::Dropped(DropReason::StaleTrial)
        );
        assert_eq!(m.results().len(), 1);
        assert_eq!(m.current_stimulus().unwrap().sequence_index, 2);
    }

    #[test]
    fn practice_wrong_wrong_right_records_one_incorrect_result() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        let token = into_first_trial(&mut m, &timer);
        let side = correct_side(&m);

        timer.advance_ms(200);
        assert_eq!(
            send(&mut m, ExperimentEvent::Respond { side: side.opposite(), token }),
            EventOutcome::PracticeError
        );
        assert!(m.current_stimulus().unwrap().show_error);
        timer.advance_ms(200);
        send(&mut m, ExperimentEvent::Respond { side: side.opposite(), token });
        timer.advance_ms(200);
        assert_eq!(
            send(&mut m, ExperimentEvent::Respond { side, token }),
            EventOutcome::Entered(SessionPhase::Fixation)
        );

        let results = m.results();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_correct);
        assert_eq!(results[0].latency_ms, 600);
        assert_eq!(results[0].observed_response, side);

        timer.advance_ms(300);
        m.update();
        assert!(!m.current_stimulus().unwrap().show_error);
        assert_eq!(m.trial_progress(), Some((2, 20)));
    }

    #[test]
    fn test_block_scores_first_press_without_retry() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        let token = into_first_trial(&mut m, &timer);
        let side = correct_side(&m);
        assert!(!m.current_block().unwrap().is_practice);

        assert_eq!(
            send(&mut m, ExperimentEvent::Respond { side: side.opposite(), token }),
            EventOutcome::Entered(SessionPhase::Fixation)
        );
        let results = m.results();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_correct);
        assert_eq!(results[0].observed_response, side.opposite());
    }

    #[test]
    fn backwards_clock_clamps_latency_to_zero() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        timer.set_ns(10_000_000_000);
        let token = into_first_trial(&mut m, &timer);
        timer.set_ns(1_000);
        let side = correct_side(&m);
        send(&mut m, ExperimentEvent::Respond { side, token });
        assert_eq!(m.results()[0].latency_ms, 0);
        assert_eq!(m.phase(), SessionPhase::Fixation);
    }

    #[test]
    fn abort_discards_unsealed_session_and_cancels_fixation() {
        let (mut m, timer) = machine_with(BlockPlan::standard());
        let token = into_first_trial(&mut m, &timer);
        let side = correct_side(&m);
        send(&mut m, ExperimentEvent::Respond { side, token });
        assert!(m.next_deadline().is_some());

        assert_eq!(send(&mut m, ExperimentEvent::Abort), EventOutcome::Entered(SessionPhase::Idle));
        assert!(m.next_deadline().is_none());
        assert!(m.results().is_empty());
        assert!(m.persistence().saved.is_empty());
        timer.advance_ms(1_000);
        assert!(m.update().is_empty());
        assert_eq!(m.phase(), SessionPhase::Idle);
    }

    fn run_block(m: &mut Machine, timer: &ManualTimer) {
        send(m, ExperimentEvent::StartBlock);
        while m.phase() != SessionPhase::BlockEnd {
            timer.advance_ms(300);
            m.update();
            let token = m.current_stimulus().unwrap().token;
            let side = correct_side(m);
            timer.advance_ms(550);
            send(m, ExperimentEvent::Respond { side, token });
        }
    }

    #[test]
    fn persistence_failure_keeps_record_for_retry() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        m.persistence.fail_next = true;
        send(&mut m, ExperimentEvent::StartSession { participant: "p02".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        run_block(&mut m, &timer);
        assert_eq!(m.block_statistics().unwrap().accuracy_percent, 100.0);
        send(&mut m, ExperimentEvent::Advance);
        run_block(&mut m, &timer);

        let err = m.handle_event(ExperimentEvent::Advance).unwrap_err();
        assert!(matches!(err, ExperimentError::Persistence { .. }));
        assert_eq!(m.phase(), SessionPhase::Complete);
        assert!(!m.is_persisted());
        assert_eq!(m.sealed_record().unwrap().results.len(), 80);

        assert!(m.retry_persist().unwrap());
        assert!(m.is_persisted());
        assert!(!m.retry_persist().unwrap());
        assert_eq!(m.persistence().saved.len(), 1);

        let summary = m.session_summary().unwrap();
        assert_eq!(summary.compatible.mean_latency_ms, 550.0);
        assert_eq!(summary.iat_effect_ms, 0.0);
    }

    #[test]
    fn unsaved_session_blocks_the_next_start_until_taken() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        m.persistence.fail_next = true;
        send(&mut m, ExperimentEvent::StartSession { participant: "p02".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        run_block(&mut m, &timer);
        send(&mut m, ExperimentEvent::Advance);
        run_block(&mut m, &timer);
        assert!(m.handle_event(ExperimentEvent::Advance).is_err());

        timer.advance_ms(60_000);
        m.update();
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert_eq!(
            send(&mut m, ExperimentEvent::StartSession { participant: "p03".into() }),
            EventOutcome::Dropped(DropReason::UnpersistedSession)
        );
        assert_eq!(m.phase(), SessionPhase::Idle);
        assert_eq!(m.sealed_record().unwrap().results.len(), 80);

        let taken = m.take_unpersisted().unwrap();
        assert_eq!(taken.results.len(), 80);
        assert!(taken.session_id.as_str().starts_with("p02_"));
        assert!(m.take_unpersisted().is_none());
        assert!(!m.retry_persist().unwrap());
        assert!(m.persistence().saved.is_empty());

        assert_eq!(
            send(&mut m, ExperimentEvent::StartSession { participant: "p03".into() }),
            EventOutcome::Entered(SessionPhase::Instruction)
        );
    }

    #[test]
    fn retry_from_idle_unblocks_the_next_session() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        m.persistence.fail_next = true;
        send(&mut m, ExperimentEvent::StartSession { participant: "p02".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        run_block(&mut m, &timer);
        send(&mut m, ExperimentEvent::Advance);
        run_block(&mut m, &timer);
        assert!(m.handle_event(ExperimentEvent::Advance).is_err());
        send(&mut m, ExperimentEvent::Return);

        assert!(m.retry_persist().unwrap());
        assert!(m.take_unpersisted().is_none());
        assert!(m.sealed_record().is_some());
        assert_eq!(
            send(&mut m, ExperimentEvent::StartSession { participant: "p03".into() }),
            EventOutcome::Entered(SessionPhase::Instruction)
        );
        assert_eq!(m.persistence().saved.len(), 1);
    }

    #[test]
    fn completion_returns_to_idle_after_timeout_or_manually() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        send(&mut m, ExperimentEvent::StartSession { participant: "p03".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        run_block(&mut m, &timer);
        send(&mut m, ExperimentEvent::Advance);
        run_block(&mut m, &timer);
        assert_eq!(send(&mut m, ExperimentEvent::Advance), EventOutcome::Entered(SessionPhase::Complete));
        assert_eq!(
            send(&mut m, ExperimentEvent::Advance),
            EventOutcome::Dropped(DropReason::OutOfPhase(SessionPhase::Complete))
        );

        timer.advance_ms(59_999);
        assert!(m.update().is_empty());
        timer.advance_ms(1);
        assert_eq!(m.update(), vec![EventOutcome::Entered(SessionPhase::Idle)]);
        assert_eq!(m.sealed_record().unwrap().results.len(), 80);

        send(&mut m, ExperimentEvent::StartSession { participant: "p04".into() });
        assert!(m.sealed_record().is_none());
        send(&mut m, ExperimentEvent::Abort);

        assert_eq!(m.persistence().saved.len(), 1);
    }

    #[test]
    fn manual_return_cancels_the_timeout() {
        let (mut m, timer) = machine_with(single_block_plan(4));
        send(&mut m, ExperimentEvent::StartSession { participant: "p05".into() });
        send(&mut m, ExperimentEvent::Acknowledge);
        run_block(&mut m, &timer);
        send(&mut m, ExperimentEvent::Advance);
        run_block(&mut m, &timer);
        send(&mut m, ExperimentEvent::Advance);
        assert_eq!(send(&mut m, ExperimentEvent::Return), EventOutcome::Entered(SessionPhase::Idle));
        assert!(m.next_deadline().is_none());
    }

    #[test]
    fn unknown_summary_block_is_a_configuration_error() {
        let config = ExperimentConfig {
            incompatible_block: 9,
            ..ExperimentConfig::default()
        };
        let built = ExperimentStateMachine::new(
            config,
            Arc::new(StimulusCatalog::standard()),
            Arc::new(BlockPlan::standard()),
            ManualTimer::new(),
            StdRng::seed_from_u64(1),
            Recorder::default(),
        );
        assert!(matches!(built, Err(ConfigurationError::UnknownBlock { id: 9 })));
    }
}
