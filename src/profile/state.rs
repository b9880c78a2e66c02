//! Profile collection state machine: tracks which question is next.

use super::model::ProfileDraft;

/// The questions asked while building a profile.
///
/// Progresses linearly: Name → Institution → Grade → Subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStep {
    Name,
    Institution,
    Grade,
    Subject,
}

impl CollectionStep {
    /// 1-based position in the question sequence.
    pub fn number(&self) -> u8 {
        match self {
            Self::Name => 1,
            Self::Institution => 2,
            Self::Grade => 3,
            Self::Subject => 4,
        }
    }

    /// The step after this one, or `None` once the subject is asked.
    pub fn next(&self) -> Option<CollectionStep> {
        match self {
            Self::Name => Some(Self::Institution),
            Self::Institution => Some(Self::Grade),
            Self::Grade => Some(Self::Subject),
            Self::Subject => None,
        }
    }
}

impl Default for CollectionStep {
    fn default() -> Self {
        Self::Name
    }
}

impl std::fmt::Display for CollectionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Institution => "institution",
            Self::Grade => "grade",
            Self::Subject => "subject",
        };
        write!(f, "{s}")
    }
}

/// In-progress profile collection for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionState {
    pub step: CollectionStep,
    pub draft: ProfileDraft,
}

impl CollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next question. Returns the new step, or `None` if the
    /// current step is already the last one (the step is left unchanged).
    pub fn advance(&mut self) -> Option<CollectionStep> {
        let next = self.step.next()?;
        self.step = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_steps() {
        use CollectionStep::*;
        let mut current = Name;
        for expected in [Institution, Grade, Subject] {
            let next = current.next().unwrap();
            assert_eq!(next, expected);
            current = next;
        }
        assert!(current.next().is_none());
    }

    #[test]
    fn step_numbers() {
        use CollectionStep::*;
        let numbers: Vec<u8> = [Name, Institution, Grade, Subject]
            .iter()
            .map(|s| s.number())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn display_is_snake_case() {
        use CollectionStep::*;
        let names: Vec<String> = [Name, Institution, Grade, Subject]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["name", "institution", "grade", "subject"]);
    }

    #[test]
    fn new_state_starts_at_name() {
        let state = CollectionState::new();
        assert_eq!(state.step, CollectionStep::Name);
        assert_eq!(state.draft, ProfileDraft::default());
    }

    #[test]
    fn advance_stops_at_subject() {
        let mut state = CollectionState::new();
        assert_eq!(state.advance(), Some(CollectionStep::Institution));
        assert_eq!(state.advance(), Some(CollectionStep::Grade));
        assert_eq!(state.advance(), Some(CollectionStep::Subject));
        assert_eq!(state.advance(), None);
        assert_eq!(state.step, CollectionStep::Subject);
    }
}
