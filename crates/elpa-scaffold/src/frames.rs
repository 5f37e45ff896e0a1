//! Sentence-frame catalogue: fixed, deterministic scaffolds for students to
//! fill in rather than write from scratch, banded by proficiency level.

use serde::{Deserialize, Serialize};

/// One sentence frame offered to a student at a given proficiency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceFrame {
    pub pattern: String,
    pub example: String,
    pub purpose: String,
    pub elpa_level: u8,
}

const DEFAULT_COUNT: usize = 3;
const MAX_COUNT: usize = 5;

fn frame(pattern: &str, example: &str, purpose: &str, level: u8) -> SentenceFrame {
    SentenceFrame {
        pattern: pattern.to_string(),
        example: example.to_string(),
        purpose: purpose.to_string(),
        elpa_level: level,
    }
}

fn catalogue_for_level(level: u8, topic: &str) -> Vec<SentenceFrame> {
    match level {
        1 => vec![
            frame(
                "I see a ___.",
                &format!("I see a {topic}."),
                "naming",
                1,
            ),
            frame(
                "This is ___.",
                &format!("This is {topic}."),
                "identifying",
                1,
            ),
            frame(
                "I like ___.",
                &format!("I like {topic}."),
                "expressing preference",
                1,
            ),
            frame(
                "___ is big.",
                &format!("{topic} is big."),
                "describing",
                1,
            ),
            frame(
                "I can see ___.",
                &format!("I can see {topic}."),
                "naming",
                1,
            ),
        ],
        2 => vec![
            frame(
                "The ___ is ___.",
                &format!("The {topic} is interesting."),
                "describing",
                2,
            ),
            frame(
                "I think ___ because ___.",
                &format!("I think {topic} is important because it helps us learn."),
                "giving a reason",
                2,
            ),
            frame(
                "First, ___. Then, ___.",
                &format!("First, we study {topic}. Then, we practice."),
                "sequencing",
                2,
            ),
            frame(
                "___ has ___ and ___.",
                &format!("{topic} has parts and a purpose."),
                "listing features",
                2,
            ),
        ],
        3 => vec![
            frame(
                "In my opinion, ___ because ___.",
                &format!("In my opinion, {topic} matters because it affects our daily lives."),
                "opinion with justification",
                3,
            ),
            frame(
                "___ is similar to ___, but ___.",
                &format!("{topic} is similar to a related idea, but it works differently."),
                "comparing and contrasting",
                3,
            ),
            frame(
                "One example of ___ is ___.",
                &format!("One example of {topic} is what we just read about."),
                "illustrating with an example",
                3,
            ),
            frame(
                "As a result of ___, ___.",
                &format!("As a result of {topic}, the outcome changed."),
                "explaining cause and effect",
                3,
            ),
        ],
        4 => vec![
            frame(
                "Although ___, ___.",
                &format!("Although {topic} seems simple, it has deeper implications."),
                "conceding a counterpoint",
                4,
            ),
            frame(
                "The evidence suggests that ___.",
                &format!("The evidence suggests that {topic} is more complex than it appears."),
                "supporting a claim with evidence",
                4,
            ),
            frame(
                "___ leads to ___, which in turn ___.",
                &format!("{topic} leads to a change, which in turn affects the next step."),
                "describing a causal chain",
                4,
            ),
            frame(
                "On the other hand, ___.",
                &format!("On the other hand, {topic} could be viewed differently."),
                "presenting a counterargument",
                4,
            ),
        ],
        5 => vec![
            frame(
                "Given that ___, it follows that ___.",
                &format!("Given that {topic} behaves this way, it follows that the conclusion holds."),
                "logical inference",
                5,
            ),
            frame(
                "While some argue that ___, the evidence indicates ___.",
                &format!("While some argue that {topic} is settled, the evidence indicates otherwise."),
                "synthesizing conflicting viewpoints",
                5,
            ),
            frame(
                "This analysis of ___ reveals ___.",
                &format!("This analysis of {topic} reveals an underlying pattern."),
                "analytical synthesis",
                5,
            ),
            frame(
                "The implications of ___ extend beyond ___.",
                &format!("The implications of {topic} extend beyond the immediate context."),
                "extrapolating implications",
                5,
            ),
        ],
        _ => unreachable!("level normalized before reaching catalogue_for_level"),
    }
}

/// Generate up to `count` sentence frames for `topic` at `proficiency_level`
/// (1..=5). Levels outside that range fall back to level 3. `count` is
/// clamped to the catalogue size for the level and to a hard ceiling of 5.
pub fn generate_sentence_frames(
    topic: &str,
    proficiency_level: u8,
    count: Option<usize>,
) -> Vec<SentenceFrame> {
    let level = if (1..=5).contains(&proficiency_level) {
        proficiency_level
    } else {
        3
    };
    let wanted = count.unwrap_or(DEFAULT_COUNT).min(MAX_COUNT);
    let catalogue = catalogue_for_level(level, topic);
    catalogue.into_iter().take(wanted).collect()
}
