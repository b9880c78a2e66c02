//! User-facing prompts for the profile dialogue and the tutoring system
//! prompt sent to the LLM.

use super::model::{ClassNumber, StudentProfile, MAX_CLASS, MIN_CLASS};

/// Greeting sent when a session starts.
pub fn welcome() -> String {
    "Welcome to AI Teacher Assistant! 🎓✨\n\n\
     I'm here to help you learn! But first, let me get to know you better.\n\n\
     **What's your name?** 😊"
        .to_string()
}

/// Asked after the student gives their name.
pub fn ask_institution(student_name: &str) -> String {
    format!(
        "Nice to meet you, **{student_name}**! 👋\n\n\
         Which school, college, or university do you attend?"
    )
}

/// Asked after the student gives their institution.
pub fn ask_grade(academic_name: &str) -> String {
    format!(
        "Great! So you're studying at **{academic_name}**. 🏫\n\n\
         What grade/class are you in? (Please enter a number like 5, 10, 12, etc.)"
    )
}

/// Asked after a valid grade.
pub fn ask_subject(class: ClassNumber) -> String {
    format!(
        "Perfect! You're in **grade {class}** ({} level). 📚\n\n\
         What subject would you like help with today? (e.g., Math, Science, English, History, etc.)",
        class.academic_level()
    )
}

/// Grade answer parsed but outside the accepted range.
pub fn grade_out_of_range() -> String {
    format!("Please enter a valid grade/class number between {MIN_CLASS} and {MAX_CLASS}. 🤔")
}

/// Grade answer was not a number.
pub fn grade_not_a_number() -> String {
    "Please enter a valid number for your grade/class. For example: 10 🔢".to_string()
}

/// Empty answer to a free-text question.
pub fn empty_answer() -> String {
    "I didn't catch that. Could you type your answer again? ✏️".to_string()
}

/// Summary sent once the profile is complete.
pub fn profile_created(profile: &StudentProfile) -> String {
    format!(
        "🎉 **Profile Created Successfully!**\n\n\
         📋 **Your Details:**\n\
         • **Name:** {name}\n\
         • **Institution:** {institution}\n\
         • **Grade:** {class} ({level} level)\n\
         • **Subject:** {subject}\n\n\
         ✅ **All set!** Now you can ask me any questions about **{subject}** or any other topic. \
         I'll explain things at a level that's perfect for you!\n\n\
         💡 **Try asking me something like:**\n\
         • \"Explain [topic] in simple terms\"\n\
         • \"Help me solve this problem\"\n\
         • \"What is [concept]?\"\n\n\
         What would you like to learn about? 🤓",
        name = profile.student_name(),
        institution = profile.academic_name(),
        class = profile.class_number(),
        level = profile.academic_level(),
        subject = profile.subject(),
    )
}

/// Reply to "my profile".
pub fn profile_summary(profile: &StudentProfile) -> String {
    format!(
        "📋 **Your Current Profile:**\n\n\
         • **Name:** {}\n\
         • **Institution:** {}\n\
         • **Grade:** {} ({} level)\n\
         • **Subject Focus:** {}\n\n\
         💡 *Type \"change profile\" if you want to create a new one.*",
        profile.student_name(),
        profile.academic_name(),
        profile.class_number(),
        profile.academic_level(),
        profile.subject(),
    )
}

/// Reply to "change profile".
pub fn profile_reset() -> String {
    "Sure! Let's create a new profile. 🔄\n\n**What's your name?**".to_string()
}

/// Sent when a message arrives for a session with nothing stored.
pub fn profile_lost() -> String {
    "It seems I lost your profile information. Let's start over! 😅\n\n**What's your name?**"
        .to_string()
}

/// Interim notice before the answer arrives.
pub fn thinking() -> String {
    "🤔 Let me think about that...".to_string()
}

/// Wraps a successful answer.
pub fn answer(profile: &StudentProfile, answer: &str) -> String {
    format!(
        "**📖 Answer for {} ({} level):**\n\n{answer}\n\n---\n\
         💡 *Need help with something else? Just ask! You can also type \"my profile\" \
         to see your details or \"change profile\" to start over.*",
        profile.student_name(),
        profile.academic_level(),
    )
}

/// Fallback text for a failed answer.
pub fn answer_failed(reason: &str) -> String {
    format!("Sorry, I encountered an error: {reason}")
}

/// Sent when answering blew up unexpectedly.
pub fn answer_crashed() -> String {
    "❌ Sorry, something went wrong while answering.\n\n\
     Please try asking your question again! 🔄"
        .to_string()
}

/// System prompt for answering a student's question.
pub fn tutor_system_prompt(profile: &StudentProfile) -> String {
    format!(
        "You are a helpful teacher assistant.\n\n\
         Student Details:\n\
         - Name: {name}\n\
         - Academic Institution: {institution}\n\
         - Class/Grade: {class}\n\
         - Academic Level: {level}\n\
         - Subject Focus: {subject}\n\n\
         Please provide educational responses appropriate for a {level} level student studying {subject}.\n\
         Adjust your language complexity and examples to match their academic level.",
        name = profile.student_name(),
        institution = profile.academic_name(),
        class = profile.class_number(),
        level = profile.academic_level(),
        subject = profile.subject(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ali() -> StudentProfile {
        StudentProfile::new("Ali", "Green Valley School", 8, "Science").unwrap()
    }

    #[test]
    fn system_prompt_includes_profile_fields() {
        let prompt = tutor_system_prompt(&ali());
        assert!(prompt.contains("Name: Ali"));
        assert!(prompt.contains("Academic Institution: Green Valley School"));
        assert!(prompt.contains("Class/Grade: 8"));
        assert!(prompt.contains("Academic Level: Middle"));
        assert!(prompt.contains("Subject Focus: Science"));
        assert!(prompt.contains("appropriate for a Middle level student studying Science"));
    }

    #[test]
    fn summary_includes_all_five_fields() {
        let summary = profile_summary(&ali());
        for field in ["Ali", "Green Valley School", "8", "Middle", "Science"] {
            assert!(summary.contains(field), "summary missing {field}");
        }
    }

    #[test]
    fn ask_subject_mentions_band() {
        let class = ClassNumber::new(11).unwrap();
        let text = ask_subject(class);
        assert!(text.contains("grade 11"));
        assert!(text.contains("Higher Secondary level"));
    }

    #[test]
    fn grade_guidance_names_the_range() {
        assert!(grade_out_of_range().contains("between 1 and 20"));
    }

    #[test]
    fn answer_template_wraps_text() {
        let text = answer(&ali(), "Photosynthesis turns light into sugar.");
        assert!(text.starts_with("**📖 Answer for Ali (Middle level):**"));
        assert!(text.contains("Photosynthesis turns light into sugar."));
    }

    #[test]
    fn failure_text_is_apologetic() {
        assert_eq!(
            answer_failed("timeout"),
            "Sorry, I encountered an error: timeout"
        );
    }
}
