//! Student profile data models.

use chrono::{DateTime, Utc};

use crate::error::ProfileError;

/// Lowest accepted grade/class number.
pub const MIN_CLASS: i64 = 1;
/// Highest accepted grade/class number.
pub const MAX_CLASS: i64 = 20;

/// Coarse academic band derived from the class number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcademicLevel {
    Primary,
    Middle,
    Secondary,
    HigherSecondary,
    University,
}

impl AcademicLevel {
    /// Band for a validated class number.
    ///
    /// 1-5 Primary, 6-8 Middle, 9-10 Secondary, 11-12 Higher Secondary,
    /// everything above University.
    pub fn for_class(class: ClassNumber) -> Self {
        match class.get() {
            1..=5 => Self::Primary,
            6..=8 => Self::Middle,
            9..=10 => Self::Secondary,
            11..=12 => Self::HigherSecondary,
            _ => Self::University,
        }
    }
}

impl std::fmt::Display for AcademicLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "Primary",
            Self::Middle => "Middle",
            Self::Secondary => "Secondary",
            Self::HigherSecondary => "Higher Secondary",
            Self::University => "University",
        };
        write!(f, "{s}")
    }
}

/// A grade/class number known to be within 1..=20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassNumber(u8);

impl ClassNumber {
    pub fn new(value: i64) -> Result<Self, ProfileError> {
        if (MIN_CLASS..=MAX_CLASS).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ProfileError::ClassOutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The academic band this class falls into.
    pub fn academic_level(self) -> AcademicLevel {
        AcademicLevel::for_class(self)
    }
}

impl std::fmt::Display for ClassNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed student profile.
///
/// Fields are private so a profile cannot change after creation, and the
/// academic level is always computed from the class number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    student_name: String,
    academic_name: String,
    class_number: ClassNumber,
    academic_level: AcademicLevel,
    subject: String,
    created_at: DateTime<Utc>,
}

impl StudentProfile {
    /// Build a profile, rejecting class numbers outside 1..=20.
    pub fn new(
        student_name: impl Into<String>,
        academic_name: impl Into<String>,
        class_number: i64,
        subject: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        let class_number = ClassNumber::new(class_number)?;
        Ok(Self::from_parts(
            student_name.into(),
            academic_name.into(),
            class_number,
            subject.into(),
        ))
    }

    fn from_parts(
        student_name: String,
        academic_name: String,
        class_number: ClassNumber,
        subject: String,
    ) -> Self {
        Self {
            student_name,
            academic_name,
            class_number,
            academic_level: class_number.academic_level(),
            subject,
            created_at: Utc::now(),
        }
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn academic_name(&self) -> &str {
        &self.academic_name
    }

    pub fn class_number(&self) -> ClassNumber {
        self.class_number
    }

    pub fn academic_level(&self) -> AcademicLevel {
        self.academic_level
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Profile fields collected so far during the question sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub student_name: Option<String>,
    pub academic_name: Option<String>,
    pub class_number: Option<ClassNumber>,
    pub academic_level: Option<AcademicLevel>,
    pub subject: Option<String>,
}

impl ProfileDraft {
    /// Record the grade together with its derived band.
    pub fn set_class(&mut self, class: ClassNumber) {
        self.class_number = Some(class);
        self.academic_level = Some(class.academic_level());
    }

    /// Convert a fully populated draft into a profile.
    pub fn build(&self) -> Result<StudentProfile, ProfileError> {
        let student_name = self
            .student_name
            .clone()
            .ok_or(ProfileError::Incomplete("student name"))?;
        let academic_name = self
            .academic_name
            .clone()
            .ok_or(ProfileError::Incomplete("academic institution"))?;
        let class_number = self
            .class_number
            .ok_or(ProfileError::Incomplete("class number"))?;
        let subject = self
            .subject
            .clone()
            .ok_or(ProfileError::Incomplete("subject"))?;

        Ok(StudentProfile::from_parts(
            student_name,
            academic_name,
            class_number,
            subject,
        ))
    }
}
