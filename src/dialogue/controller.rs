//! Dialogue controller: drives profile collection and question answering
//! for each session.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channels::ReplySink;
use crate::error::{ChannelError, ProfileError};
use crate::profile::prompts;
use crate::profile::{
    ClassNumber, CollectionState, CollectionStep, ProfileStore, SessionPhase, StudentProfile,
};
use crate::session::SessionId;
use crate::tutor::{AnswerOutcome, Answerer};

use super::command::Command;

/// What applying one answer to the collection state produced.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepOutcome {
    /// Answer accepted; ask the next question.
    Next(String),
    /// Answer rejected; the step is unchanged.
    Retry(String),
    /// The last answer was accepted.
    Complete(Result<StudentProfile, ProfileError>),
}

/// Apply a message to the current collection step.
fn apply_answer(state: &mut CollectionState, text: &str) -> StepOutcome {
    if text.is_empty() {
        return StepOutcome::Retry(match state.step {
            CollectionStep::Grade => prompts::grade_not_a_number(),
            _ => prompts::empty_answer(),
        });
    }

    match state.step {
        CollectionStep::Name => {
            state.draft.student_name = Some(text.to_string());
            state.advance();
            StepOutcome::Next(prompts::ask_institution(text))
        }
        CollectionStep::Institution => {
            state.draft.academic_name = Some(text.to_string());
            state.advance();
            StepOutcome::Next(prompts::ask_grade(text))
        }
        CollectionStep::Grade => {
            let Ok(number) = text.parse::<i64>() else {
                return StepOutcome::Retry(prompts::grade_not_a_number());
            };
            match ClassNumber::new(number) {
                Ok(class) => {
                    state.draft.set_class(class);
                    state.advance();
                    StepOutcome::Next(prompts::ask_subject(class))
                }
                Err(_) => StepOutcome::Retry(prompts::grade_out_of_range()),
            }
        }
        CollectionStep::Subject => {
            state.draft.subject = Some(text.to_string());
            StepOutcome::Complete(state.draft.build())
        }
    }
}

/// Handles the three session entry points: start, message and end.
pub struct DialogueController {
    store: Arc<ProfileStore>,
    answerer: Arc<dyn Answerer>,
    sink: Arc<dyn ReplySink>,
}

impl DialogueController {
    pub fn new(
        store: Arc<ProfileStore>,
        answerer: Arc<dyn Answerer>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            store,
            answerer,
            sink,
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// A new session begins: start profile collection and greet the user.
    pub async fn on_session_start(&self, session: &SessionId) -> Result<(), ChannelError> {
        self.store.begin_session(session).await;
        let live_sessions = self.store.session_count().await;
        info!(
            session = %session,
            live_sessions = live_sessions,
            "Session started"
        );
        self.reply(session, prompts::welcome()).await
    }

    /// Handle one text message.
    ///
    /// Every path ends in a reply; the only error is a failed send.
    pub async fn on_message(&self, session: &SessionId, text: &str) -> Result<(), ChannelError> {
        let text = text.trim();
        match self.store.phase(session).await {
            Some(SessionPhase::Collecting) => self.collect(session, text).await,
            Some(SessionPhase::Ready) => self.handle_command(session, text).await,
            None => self.restart_lost(session).await,
        }
    }

    /// The session is over; forget everything about it.
    pub async fn on_session_end(&self, session: &SessionId) {
        self.store.end_session(session).await;
        let live_sessions = self.store.session_count().await;
        info!(
            session = %session,
            live_sessions = live_sessions,
            "Session ended"
        );
    }

    async fn collect(&self, session: &SessionId, text: &str) -> Result<(), ChannelError> {
        let outcome = self
            .store
            .update_state(session, |state| {
                let step = state.step;
                let outcome = apply_answer(state, text);
                debug!(session = %session, step = step.number(), to = %state.step, "Collection step");
                outcome
            })
            .await;

        match outcome {
            Some(StepOutcome::Next(reply)) | Some(StepOutcome::Retry(reply)) => {
                self.reply(session, reply).await
            }
            Some(StepOutcome::Complete(Ok(profile))) => {
                info!(
                    session = %session,
                    level = %profile.academic_level(),
                    created_at = %profile.created_at(),
                    "Profile created"
                );
                let reply = prompts::profile_created(&profile);
                self.store.commit_profile(session, profile).await;
                self.reply(session, reply).await
            }
            Some(StepOutcome::Complete(Err(e))) => {
                error!(session = %session, error = %e, "Profile draft incomplete at last step");
                self.restart_lost(session).await
            }
            None => self.restart_lost(session).await,
        }
    }

    async fn handle_command(&self, session: &SessionId, text: &str) -> Result<(), ChannelError> {
        let Some(profile) = self.store.get_profile(session).await else {
            return self.restart_lost(session).await;
        };

        match Command::parse(text) {
            Command::ResetProfile => {
                self.store.reset_session(session).await;
                info!(session = %session, "Profile reset");
                self.reply(session, prompts::profile_reset()).await
            }
            Command::ShowProfile => {
                self.reply(session, prompts::profile_summary(&profile)).await
            }
            Command::Question(question) if question.is_empty() => {
                self.reply(session, prompts::empty_answer()).await
            }
            Command::Question(question) => self.answer(session, profile, question).await,
        }
    }

    async fn answer(
        &self,
        session: &SessionId,
        profile: StudentProfile,
        question: String,
    ) -> Result<(), ChannelError> {
        self.reply(session, prompts::thinking()).await?;

        // Run on its own task so a panicking answerer surfaces as a join error.
        let answerer = Arc::clone(&self.answerer);
        let task_profile = profile.clone();
        let handle =
            tokio::spawn(async move { answerer.answer(&task_profile, &question).await });

        let reply = match handle.await {
            Ok(AnswerOutcome::Answered(answer)) => prompts::answer(&profile, &answer),
            Ok(AnswerOutcome::Failed(reason)) => {
                warn!(session = %session, reason = %reason, "Answer failed");
                prompts::answer_failed(&reason)
            }
            Err(e) => {
                error!(session = %session, error = %e, "Answering task aborted");
                prompts::answer_crashed()
            }
        };

        self.reply(session, reply).await
    }

    async fn restart_lost(&self, session: &SessionId) -> Result<(), ChannelError> {
        warn!(session = %session, "No profile state for session; restarting collection");
        self.store.begin_session(session).await;
        self.reply(session, prompts::profile_lost()).await
    }

    async fn reply(&self, session: &SessionId, text: String) -> Result<(), ChannelError> {
        self.sink.send(session, &text).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::profile::AcademicLevel;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(SessionId, String)>>,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        fn last(&self) -> String {
            self.texts().last().cloned().unwrap_or_default()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, session: &SessionId, text: &str) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((session.clone(), text.to_string()));
            Ok(())
        }
    }

    enum StubAnswerer {
        Answers(&'static str),
        Fails(&'static str),
        Panics,
    }

    #[async_trait]
    impl Answerer for StubAnswerer {
        async fn answer(&self, _profile: &StudentProfile, _question: &str) -> AnswerOutcome {
            match self {
                Self::Answers(text) => AnswerOutcome::Answered(text.to_string()),
                Self::Fails(reason) => AnswerOutcome::Failed(reason.to_string()),
                Self::Panics => panic!("answerer exploded"),
            }
        }
    }

    fn setup(answerer: StubAnswerer) -> (DialogueController, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let controller = DialogueController::new(
            Arc::new(ProfileStore::new()),
            Arc::new(answerer),
            sink.clone(),
        );
        (controller, sink)
    }

    fn session() -> SessionId {
        SessionId::new("test", "s1")
    }

    async fn complete_profile(controller: &DialogueController) {
        let s = session();
        controller.on_session_start(&s).await.unwrap();
        for text in ["Ali", "Green Valley School", "8", "Science"] {
            controller.on_message(&s, text).await.unwrap();
        }
    }

    #[test]
    fn apply_answer_grade_rejections_leave_state_untouched() {
        let mut state = CollectionState::new();
        state.advance();
        state.advance();
        let before = state.clone();

        for text in ["abc", "0", "21", "-3", "8.5", "twelve"] {
            assert!(matches!(apply_answer(&mut state, text), StepOutcome::Retry(_)));
            assert_eq!(state, before, "input {text:?} changed the state");
        }
    }

    #[test]
    fn apply_answer_distinguishes_grade_errors() {
        let mut state = CollectionState {
            step: CollectionStep::Grade,
            ..Default::default()
        };
        assert_eq!(
            apply_answer(&mut state, "42"),
            StepOutcome::Retry(prompts::grade_out_of_range())
        );
        assert_eq!(
            apply_answer(&mut state, "ten"),
            StepOutcome::Retry(prompts::grade_not_a_number())
        );
    }

    #[tokio::test]
    async fn session_start_greets_and_begins_collection() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        controller.on_session_start(&session()).await.unwrap();

        assert_eq!(sink.texts(), vec![prompts::welcome()]);
        let state = controller.store().get_state(&session()).await.unwrap();
        assert_eq!(state.step, CollectionStep::Name);
    }

    #[tokio::test]
    async fn full_collection_builds_profile() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        complete_profile(&controller).await;

        let profile = controller.store().get_profile(&session()).await.unwrap();
        assert_eq!(profile.student_name(), "Ali");
        assert_eq!(profile.academic_name(), "Green Valley School");
        assert_eq!(profile.class_number().get(), 8);
        assert_eq!(profile.academic_level(), AcademicLevel::Middle);
        assert_eq!(profile.subject(), "Science");
        assert!(controller.store().get_state(&session()).await.is_none());

        let texts = sink.texts();
        assert_eq!(texts.len(), 5);
        assert!(texts[1].contains("Nice to meet you, **Ali**"));
        assert!(texts[2].contains("Green Valley School"));
        assert!(texts[3].contains("grade 8"));
        assert!(texts[4].contains("Profile Created Successfully"));
    }

    #[tokio::test]
    async fn invalid_grades_keep_step_three() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        let s = session();
        controller.on_session_start(&s).await.unwrap();
        controller.on_message(&s, "Ali").await.unwrap();
        controller.on_message(&s, "Green Valley School").await.unwrap();
        let before = controller.store().get_state(&s).await.unwrap();

        controller.on_message(&s, "25").await.unwrap();
        assert_eq!(sink.last(), prompts::grade_out_of_range());
        controller.on_message(&s, "eight").await.unwrap();
        assert_eq!(sink.last(), prompts::grade_not_a_number());

        let after = controller.store().get_state(&s).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(after.step.number(), 3);

        controller.on_message(&s, "12").await.unwrap();
        let state = controller.store().get_state(&s).await.unwrap();
        assert_eq!(state.step, CollectionStep::Subject);
        assert_eq!(state.draft.academic_level, Some(AcademicLevel::HigherSecondary));
    }

    #[tokio::test]
    async fn commands_during_collection_are_answers() {
        let (controller, _sink) = setup(StubAnswerer::Answers("unused"));
        let s = session();
        controller.on_session_start(&s).await.unwrap();
        controller.on_message(&s, "profile").await.unwrap();

        let state = controller.store().get_state(&s).await.unwrap();
        assert_eq!(state.draft.student_name.as_deref(), Some("profile"));
        assert_eq!(state.step, CollectionStep::Institution);
    }

    #[tokio::test]
    async fn empty_name_is_reasked() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        let s = session();
        controller.on_session_start(&s).await.unwrap();
        controller.on_message(&s, "   ").await.unwrap();

        assert_eq!(sink.last(), prompts::empty_answer());
        assert_eq!(
            controller.store().get_state(&s).await.unwrap().step,
            CollectionStep::Name
        );
    }

    #[tokio::test]
    async fn my_profile_shows_summary_without_changes() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        complete_profile(&controller).await;
        let before = controller.store().get_profile(&session()).await.unwrap();

        controller.on_message(&session(), "My Profile").await.unwrap();

        let summary = sink.last();
        for field in ["Ali", "Green Valley School", "8", "Middle", "Science"] {
            assert!(summary.contains(field), "summary missing {field}");
        }
        let after = controller.store().get_profile(&session()).await.unwrap();
        assert_eq!(after, before);
        assert!(controller.store().get_state(&session()).await.is_none());
    }

    #[tokio::test]
    async fn reset_profile_restarts_at_name() {
        let (controller, sink) = setup(StubAnswerer::Answers("should not be used"));
        complete_profile(&controller).await;

        controller.on_message(&session(), "reset profile").await.unwrap();
        assert_eq!(sink.last(), prompts::profile_reset());
        assert!(controller.store().get_profile(&session()).await.is_none());
        assert_eq!(
            controller.store().get_state(&session()).await.unwrap(),
            CollectionState::new()
        );

        controller.on_message(&session(), "What is gravity?").await.unwrap();
        let state = controller.store().get_state(&session()).await.unwrap();
        assert_eq!(state.step, CollectionStep::Institution);
        assert_eq!(state.draft.student_name.as_deref(), Some("What is gravity?"));
        assert!(!sink.texts().iter().any(|t| t.contains("should not be used")));
    }

    #[tokio::test]
    async fn blank_question_is_reasked_without_answering() {
        let (controller, sink) = setup(StubAnswerer::Answers("should not be used"));
        complete_profile(&controller).await;
        let before = controller.store().get_profile(&session()).await.unwrap();
        let sent = sink.count();

        controller.on_message(&session(), "   ").await.unwrap();

        assert_eq!(sink.count(), sent + 1);
        assert_eq!(sink.last(), prompts::empty_answer());
        let after = controller.store().get_profile(&session()).await.unwrap();
        assert_eq!(after, before);
        assert!(controller.store().get_state(&session()).await.is_none());
    }

    #[tokio::test]
    async fn question_sends_thinking_then_answer() {
        let (controller, sink) = setup(StubAnswerer::Answers("Mass attracts mass."));
        complete_profile(&controller).await;
        let before = sink.count();

        controller.on_message(&session(), "What is gravity?").await.unwrap();

        let texts = sink.texts();
        assert_eq!(texts.len(), before + 2);
        assert_eq!(texts[before], prompts::thinking());
        assert!(texts[before + 1].contains("Answer for Ali (Middle level)"));
        assert!(texts[before + 1].contains("Mass attracts mass."));
    }

    #[tokio::test]
    async fn failed_answer_is_sent_as_fallback() {
        let (controller, sink) = setup(StubAnswerer::Fails("rate limited"));
        complete_profile(&controller).await;

        controller.on_message(&session(), "Explain atoms").await.unwrap();
        assert_eq!(sink.last(), "Sorry, I encountered an error: rate limited");
        assert!(controller.store().get_profile(&session()).await.is_some());
    }

    #[tokio::test]
    async fn panicking_answerer_yields_retry_message() {
        let (controller, sink) = setup(StubAnswerer::Panics);
        complete_profile(&controller).await;

        let result = controller.on_message(&session(), "Explain atoms").await;
        assert!(result.is_ok());
        assert_eq!(sink.last(), prompts::answer_crashed());

        let profile = controller.store().get_profile(&session()).await;
        assert_eq!(profile.unwrap().student_name(), "Ali");
        assert_eq!(
            controller.store().phase(&session()).await,
            Some(SessionPhase::Ready)
        );
    }

    #[tokio::test]
    async fn message_without_session_restarts_collection() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        controller.on_message(&session(), "hello?").await.unwrap();

        assert_eq!(sink.texts(), vec![prompts::profile_lost()]);
        assert_eq!(
            controller.store().get_state(&session()).await.unwrap().step,
            CollectionStep::Name
        );
    }

    #[tokio::test]
    async fn session_end_clears_store() {
        let (controller, _sink) = setup(StubAnswerer::Answers("unused"));
        complete_profile(&controller).await;
        controller.on_session_end(&session()).await;

        assert!(controller.store().get_profile(&session()).await.is_none());
        assert!(controller.store().get_state(&session()).await.is_none());
    }

    #[tokio::test]
    async fn sessions_do_not_interfere() {
        let (controller, sink) = setup(StubAnswerer::Answers("unused"));
        let a = SessionId::new("test", "a");
        let b = SessionId::new("test", "b");
        controller.on_session_start(&a).await.unwrap();
        controller.on_session_start(&b).await.unwrap();
        controller.on_message(&a, "Ali").await.unwrap();

        assert_eq!(
            controller.store().get_state(&b).await.unwrap().step,
            CollectionStep::Name
        );
        let to_a = sink
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == &a)
            .count();
        assert_eq!(to_a, 2);
    }
}
