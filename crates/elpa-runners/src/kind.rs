//! The closed set of built-in node kinds, plus a catch-all for anything the
//! registry doesn't recognize.

use std::fmt;
use std::str::FromStr;

/// A node's type, resolved from its wire-format `type` string.
///
/// `Unknown` is not an error case — a workflow authored against a newer
/// kind set still loads and runs here; the scheduler treats unresolved
/// kinds as a skip rather than a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    StudentProfile,
    CurriculumSelector,
    ContentGenerator,
    VocabularyBuilder,
    ScaffoldedContent,
    L1Bridge,
    HumanInput,
    ComprehensionCheck,
    MultipleChoice,
    Loop,
    Conditional,
    ProficiencyRouter,
    Merge,
    ProgressTracker,
    FeedbackGenerator,
    Celebration,
    MathProblemGenerator,
    VisualSupport,
    ComprehensibleInput,
    ReadingPassage,
    AiModel,
    PromptTemplate,
    StructuredOutput,
    VoiceInput,
    FreeResponse,
    OralPractice,
    SpeakingAssessment,
    WordProblemDecoder,
    Parallel,
    Variable,
    Input,
    Output,
    Unknown(String),
}

impl FromStr for NodeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "student-profile" => Self::StudentProfile,
            "curriculum-selector" => Self::CurriculumSelector,
            "content-generator" => Self::ContentGenerator,
            "vocabulary-builder" => Self::VocabularyBuilder,
            "scaffolded-content" => Self::ScaffoldedContent,
            "l1-bridge" => Self::L1Bridge,
            "human-input" => Self::HumanInput,
            "comprehension-check" => Self::ComprehensionCheck,
            "multiple-choice" => Self::MultipleChoice,
            "loop" => Self::Loop,
            "conditional" => Self::Conditional,
            "proficiency-router" => Self::ProficiencyRouter,
            "merge" => Self::Merge,
            "progress-tracker" => Self::ProgressTracker,
            "feedback-generator" => Self::FeedbackGenerator,
            "celebration" => Self::Celebration,
            "math-problem-generator" => Self::MathProblemGenerator,
            "visual-support" => Self::VisualSupport,
            "comprehensible-input" => Self::ComprehensibleInput,
            "reading-passage" => Self::ReadingPassage,
            "ai-model" => Self::AiModel,
            "prompt-template" => Self::PromptTemplate,
            "structured-output" => Self::StructuredOutput,
            "voice-input" => Self::VoiceInput,
            "free-response" => Self::FreeResponse,
            "oral-practice" => Self::OralPractice,
            "speaking-assessment" => Self::SpeakingAssessment,
            "word-problem-decoder" => Self::WordProblemDecoder,
            "parallel" => Self::Parallel,
            "variable" => Self::Variable,
            "input" => Self::Input,
            "output" => Self::Output,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StudentProfile => "student-profile",
            Self::CurriculumSelector => "curriculum-selector",
            Self::ContentGenerator => "content-generator",
            Self::VocabularyBuilder => "vocabulary-builder",
            Self::ScaffoldedContent => "scaffolded-content",
            Self::L1Bridge => "l1-bridge",
            Self::HumanInput => "human-input",
            Self::ComprehensionCheck => "comprehension-check",
            Self::MultipleChoice => "multiple-choice",
            Self::Loop => "loop",
            Self::Conditional => "conditional",
            Self::ProficiencyRouter => "proficiency-router",
            Self::Merge => "merge",
            Self::ProgressTracker => "progress-tracker",
            Self::FeedbackGenerator => "feedback-generator",
            Self::Celebration => "celebration",
            Self::MathProblemGenerator => "math-problem-generator",
            Self::VisualSupport => "visual-support",
            Self::ComprehensibleInput => "comprehensible-input",
            Self::ReadingPassage => "reading-passage",
            Self::AiModel => "ai-model",
            Self::PromptTemplate => "prompt-template",
            Self::StructuredOutput => "structured-output",
            Self::VoiceInput => "voice-input",
            Self::FreeResponse => "free-response",
            Self::OralPractice => "oral-practice",
            Self::SpeakingAssessment => "speaking-assessment",
            Self::WordProblemDecoder => "word-problem-decoder",
            Self::Parallel => "parallel",
            Self::Variable => "variable",
            Self::Input => "input",
            Self::Output => "output",
            Self::Unknown(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_kinds() {
        for kind in ["loop", "merge", "human-input", "math-problem-generator"] {
            let parsed: NodeKind = kind.parse().unwrap();
            assert_eq!(parsed.to_string(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_preserved_not_rejected() {
        let parsed: NodeKind = "future-node-kind".parse().unwrap();
        assert_eq!(parsed, NodeKind::Unknown("future-node-kind".to_string()));
        assert_eq!(parsed.to_string(), "future-node-kind");
    }
}
