//! Student profile: read-only input to an execution.

use serde::{Deserialize, Serialize};

/// A student's learning profile. Borrowed by the engine for the duration
/// of an execution and never mutated — adjustments (e.g. to language
/// level) live on [`crate::context::ExecutionContext`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    #[serde(rename = "gradeLevel")]
    pub grade_level: String,
    #[serde(rename = "nativeLanguage")]
    pub native_language: String,
    #[serde(default, rename = "additionalLanguages")]
    pub additional_languages: Vec<String>,
    /// 1 (Beginning) ..= 5 (Proficient).
    #[serde(rename = "elpaLevel")]
    pub proficiency_level: u8,
    #[serde(default, rename = "literacyLevel")]
    pub literacy_level: Option<u8>,
    #[serde(default, rename = "numeracyLevel")]
    pub numeracy_level: Option<u8>,
    #[serde(default, rename = "learningStyles")]
    pub learning_styles: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub accommodations: Vec<String>,
    #[serde(default, rename = "schoolId")]
    pub school_id: Option<String>,
    #[serde(default, rename = "teacherId")]
    pub teacher_id: Option<String>,
}

impl StudentProfile {
    pub fn new(id: impl Into<String>, grade_level: impl Into<String>, proficiency_level: u8) -> Self {
        Self {
            id: id.into(),
            grade_level: grade_level.into(),
            native_language: "en".to_string(),
            additional_languages: Vec::new(),
            proficiency_level: proficiency_level.clamp(1, 5),
            literacy_level: None,
            numeracy_level: None,
            learning_styles: Vec::new(),
            interests: Vec::new(),
            accommodations: Vec::new(),
            school_id: None,
            teacher_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_shape() {
        let json = serde_json::json!({
            "id": "s1",
            "gradeLevel": "5",
            "nativeLanguage": "es",
            "elpaLevel": 3,
            "interests": ["dinosaurs"]
        });
        let student: StudentProfile = serde_json::from_value(json).unwrap();
        assert_eq!(student.proficiency_level, 3);
        assert_eq!(student.native_language, "es");
        assert_eq!(student.interests, vec!["dinosaurs".to_string()]);
    }

    #[test]
    fn clamps_proficiency_on_construction() {
        let student = StudentProfile::new("s1", "3", 9);
        assert_eq!(student.proficiency_level, 5);
    }
}
