//! Recognizes profile-management commands once a profile exists.

/// Phrases that discard the profile and start over.
const RESET_PHRASES: &[&str] = &["change profile", "new profile", "reset profile"];

/// Phrases that show the stored profile.
const SHOW_PHRASES: &[&str] = &["my profile", "show profile", "profile"];

/// What a message means in question-answering mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ResetProfile,
    ShowProfile,
    Question(String),
}

impl Command {
    /// Classify a message. Commands match the whole message, ignoring case
    /// and surrounding whitespace; anything else is a question.
    pub fn parse(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        if RESET_PHRASES.contains(&normalized.as_str()) {
            Self::ResetProfile
        } else if SHOW_PHRASES.contains(&normalized.as_str()) {
            Self::ShowProfile
        } else {
            Self::Question(text.trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_phrases() {
        for text in ["change profile", "New Profile", "  RESET PROFILE  "] {
            assert_eq!(Command::parse(text), Command::ResetProfile, "{text}");
        }
    }

    #[test]
    fn show_phrases() {
        for text in ["my profile", "Show Profile", "profile", " PROFILE\n"] {
            assert_eq!(Command::parse(text), Command::ShowProfile, "{text}");
        }
    }

    #[test]
    fn phrases_must_match_whole_message() {
        assert_eq!(
            Command::parse("can you change profile pictures?"),
            Command::Question("can you change profile pictures?".into())
        );
        assert_eq!(
            Command::parse("profile of a triangle"),
            Command::Question("profile of a triangle".into())
        );
    }

    #[test]
    fn question_is_trimmed() {
        assert_eq!(
            Command::parse("  What is a cell?  "),
            Command::Question("What is a cell?".into())
        );
    }
}
