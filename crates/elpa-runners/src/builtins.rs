//! The built-in runner library: one [`NodeRunner`] implementation per node
//! kind, plus [`builtin_registry`] which wires them all into a
//! [`NodeRunnerRegistry`] ready to hand to the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use elpa_core::{ExecutionContext, Node};
use elpa_scaffold::{analyze_readability, generate_sentence_frames};
use serde_json::{json, Map, Value};

use crate::ai::AiClient;
use crate::error::{Result, RunnerError};
use crate::kind::NodeKind;
use crate::registry::{NodeRunner, NodeRunnerRegistry, RunnerOutput};
use crate::util::{config_bool, config_str, config_u64, input_str, input_u64};

/// Entry node: copies the student profile into the flow. Subsequent nodes
/// never need `context.student` directly — they read it from here.
pub struct StudentProfileRunner;

#[async_trait]
impl NodeRunner for StudentProfileRunner {
    async fn run(&self, _node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let student = &context.student;
        Ok(RunnerOutput::new(json!({
            "studentProfile": student,
            "elpaLevel": student.proficiency_level,
            "nativeLanguage": student.native_language,
            "gradeLevel": student.grade_level,
            "interests": student.interests,
        })))
    }
}

pub struct CurriculumSelectorRunner;

#[async_trait]
impl NodeRunner for CurriculumSelectorRunner {
    async fn run(&self, node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let subject_area = config_str(&node.config, "subjectArea", "ela");
        let strand = config_str(&node.config, "strand", "");
        let outcomes = node
            .config
            .get("specificOutcomes")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(RunnerOutput::new(json!({
            "subjectArea": subject_area,
            "strand": strand,
            "outcomes": outcomes,
            "gradeLevel": context.student.grade_level,
        })))
    }
}

/// AI-backed content production. Falls back to an `ai-unavailable`-mapped
/// error if the collaborator can't be reached.
pub struct ContentGeneratorRunner {
    pub ai: Arc<dyn AiClient>,
}

#[async_trait]
impl NodeRunner for ContentGeneratorRunner {
    async fn run(&self, node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let content_type = config_str(&node.config, "contentType", "passage");
        let length = config_u64(&node.config, "length", 150);
        let topic = config_str(&node.config, "topic", "the lesson topic");

        if !self.ai.is_available() {
            return Err(RunnerError::AiUnavailable("content generator".into()));
        }

        let prompt = format!(
            "Write a {content_type} of about {length} words about {topic} for a level {} English learner.",
            context.current_language_level
        );
        let content = self.ai.generate_text_completion(&prompt).await?;
        let report = analyze_readability(&content);

        Ok(RunnerOutput::new(json!({
            "content": content,
            "readabilityLevel": report.suggested_elpa_level,
            "wordCount": report.total_words,
            "vocabulary": Vec::<String>::new(),
        })))
    }
}

/// Extracts up to `config.maxWords` (default 5) candidate vocabulary words
/// from `input.content` — a deterministic heuristic, no AI call required.
pub struct VocabularyBuilderRunner;

#[async_trait]
impl NodeRunner for VocabularyBuilderRunner {
    async fn run(&self, node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let max_words = config_u64(&node.config, "maxWords", 5) as usize;
        let content = input_str(&input, "content").unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        let mut vocabulary = Vec::new();
        for word in content.split(|c: char| !c.is_alphanumeric()) {
            if word.len() < 5 {
                continue;
            }
            let lower = word.to_lowercase();
            if !seen.insert(lower.clone()) {
                continue;
            }
            vocabulary.push(json!({
                "word": lower,
                "definition": format!("a word related to {lower}"),
                "l1Translation": format!("[{}] {lower}", context.student.native_language),
            }));
            if vocabulary.len() >= max_words {
                break;
            }
        }

        Ok(RunnerOutput::new(json!({
            "vocabulary": vocabulary,
            "sourceContent": content,
        })))
    }
}

/// Adjusts content to the current proficiency level. Pure context
/// adjustment — no AI call.
pub struct ScaffoldedContentRunner;

#[async_trait]
impl NodeRunner for ScaffoldedContentRunner {
    async fn run(&self, _node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let content = input_str(&input, "content").unwrap_or_default();
        let level = context.current_language_level;

        let scaffolding = match level {
            1 | 2 => vec!["simplified vocabulary", "shorter sentences", "visual cues"],
            3 => vec!["sentence frames", "key term glossary"],
            _ => vec!["extension questions"],
        };
        let supports = generate_sentence_frames("this passage", level, Some(2));

        Ok(RunnerOutput::new(json!({
            "scaffolding": scaffolding,
            "adjustedLevel": level,
            "supports": supports,
            "content": content,
        })))
    }
}

/// Produces a translated bridge back to the student's native language.
pub struct L1BridgeRunner;

fn extract_key_terms(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 6)
        .map(|w| w.to_lowercase())
        .filter(|w| seen.insert(w.clone()))
        .take(8)
        .collect()
}

#[async_trait]
impl NodeRunner for L1BridgeRunner {
    async fn run(&self, node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let bridge_mode = config_str(&node.config, "bridgeMode", "gloss");
        let original = input_str(&input, "content").unwrap_or_default();
        let lang = &context.student.native_language;
        let translated = format!("[{lang}:{bridge_mode}] {original}");
        let key_terms = extract_key_terms(&original);

        Ok(RunnerOutput::new(json!({
            "originalText": original,
            "translatedText": translated,
            "keyTerms": key_terms,
        })))
    }
}

/// Pauses execution for a human response. `inputType` defaults to `"text"`;
/// the voice/oral/speaking variants below reuse this with a different
/// default and, for `speaking-assessment`, a rubric passthrough.
pub struct HumanInputRunner {
    pub default_input_type: &'static str,
    pub include_rubric: bool,
}

#[async_trait]
impl NodeRunner for HumanInputRunner {
    async fn run(&self, node: &Node, _input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let prompt = config_str(&node.config, "prompt", "Please respond.");
        let input_type = config_str(&node.config, "inputType", self.default_input_type);
        let mut output = json!({
            "prompt": prompt,
            "inputType": input_type,
            "awaiting": true,
        });
        if self.include_rubric {
            if let Some(rubric) = node.config.get("rubric") {
                output["rubric"] = rubric.clone();
            }
        }
        Ok(RunnerOutput::pausing(output))
    }
}

/// Passive: echoes the question set and pass threshold downstream, used
/// by both `comprehension-check` and `multiple-choice`.
pub struct ComprehensionCheckRunner;

#[async_trait]
impl NodeRunner for ComprehensionCheckRunner {
    async fn run(&self, node: &Node, _input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let questions = node
            .config
            .get("questions")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let pass_threshold = config_u64(&node.config, "passThreshold", 70);
        Ok(RunnerOutput::new(json!({
            "questions": questions,
            "passThreshold": pass_threshold,
        })))
    }
}

/// `iteration`/`isComplete` math. The scheduler owns re-entry; this runner
/// only ever computes the next iteration number.
pub struct LoopRunner;

#[async_trait]
impl NodeRunner for LoopRunner {
    async fn run(&self, node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let max_iterations = config_u64(&node.config, "maxIterations", 5);
        let prior = input_u64(&input, "_loopIteration").unwrap_or(0);
        let iteration = prior + 1;
        let is_complete = iteration >= max_iterations;
        Ok(RunnerOutput::new(json!({
            "iteration": iteration,
            "isComplete": is_complete,
        })))
    }
}

/// Evaluates `config.condition` against `input`/`context.variables` and
/// routes to the `true`/`false` port.
///
/// The grammar is deliberately tiny: `<name> <op> <value>` where `op` is
/// one of `==`, `!=`, `>=`, `<=`, `>`, `<`, and `<name>` is resolved first
/// against `input`, then `context.variables`. A bare name with no operator
/// is truthy-tested directly.
pub struct ConditionalRunner;

fn lookup(name: &str, input: &Value, context: &ExecutionContext) -> Option<Value> {
    input
        .get(name)
        .cloned()
        .or_else(|| context.variables.get(name).cloned())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn evaluate_condition(condition: &str, input: &Value, context: &ExecutionContext) -> bool {
    const OPS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];
    for op in OPS {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            let lhs = lookup(lhs.trim(), input, context);
            let rhs = rhs.trim();
            let Some(lhs) = lhs else { return false };

            if let (Some(l), Ok(r)) = (lhs.as_f64(), rhs.parse::<f64>()) {
                return match op {
                    "==" => l == r,
                    "!=" => l != r,
                    ">=" => l >= r,
                    "<=" => l <= r,
                    ">" => l > r,
                    "<" => l < r,
                    _ => unreachable!(),
                };
            }
            let l = lhs.as_str().map(str::to_string).unwrap_or_default();
            let r = rhs.trim_matches('"');
            return match op {
                "==" => l == r,
                "!=" => l != r,
                _ => false,
            };
        }
    }
    lookup(condition.trim(), input, context)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

#[async_trait]
impl NodeRunner for ConditionalRunner {
    async fn run(&self, node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let condition = config_str(&node.config, "condition", "");
        let condition_met = evaluate_condition(&condition, &input, context);
        Ok(RunnerOutput::new(json!({
            "conditionMet": condition_met,
            "conditionEvaluated": condition,
        })))
    }
}

/// Multi-way branch on a score against `config.routingCriteria`, a map of
/// route name to minimum score. The highest threshold the score clears
/// wins; `"needs-review"` is the fallback.
pub struct ProficiencyRouterRunner;

#[async_trait]
impl NodeRunner for ProficiencyRouterRunner {
    async fn run(&self, node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let score = input_u64(&input, "score").unwrap_or(context.current_language_level as u64 * 20);

        let mut criteria: Vec<(String, u64)> = node
            .config
            .get("routingCriteria")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_else(|| vec![("mastered".to_string(), 80), ("needs-review".to_string(), 0)]);
        criteria.sort_by(|a, b| b.1.cmp(&a.1));

        let route = criteria
            .iter()
            .find(|(_, threshold)| score >= *threshold)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "needs-review".to_string());

        Ok(RunnerOutput::new(json!({
            "score": score,
            "route": route,
            "criteria": criteria.into_iter().collect::<std::collections::HashMap<_, _>>(),
        })))
    }
}

/// The scheduler assembles the per-strategy merged input before invoking
/// this runner; it only needs to surface it under the contracted key.
pub struct MergeRunner;

#[async_trait]
impl NodeRunner for MergeRunner {
    async fn run(&self, _node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        Ok(RunnerOutput::new(json!({ "merged": input })))
    }
}

/// Side effect: the returned `_appendContent` field is read by the
/// scheduler and appended to `context.accumulated_content`.
pub struct ProgressTrackerRunner;

#[async_trait]
impl NodeRunner for ProgressTrackerRunner {
    async fn run(&self, _node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let answered = input_u64(&input, "questionsAnswered").unwrap_or(0);
        let correct = input_u64(&input, "correctAnswers").unwrap_or(0);
        let time_spent = input_u64(&input, "timeSpent").unwrap_or(0);
        let accuracy = if answered > 0 {
            (correct as f64 / answered as f64) * 100.0
        } else {
            0.0
        };
        let report = format!("{correct}/{answered} correct ({accuracy:.0}%), {time_spent}s spent");

        Ok(RunnerOutput::new(json!({
            "progress": {
                "questionsAnswered": answered,
                "correctAnswers": correct,
                "timeSpent": time_spent,
                "accuracy": accuracy,
            },
            "report": report,
            "_appendContent": [report.clone()],
        })))
    }
}

/// Three score bands: `>= 80`, `50..80`, `< 50`.
pub struct FeedbackGeneratorRunner;

#[async_trait]
impl NodeRunner for FeedbackGeneratorRunner {
    async fn run(&self, _node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let score = input_u64(&input, "score").unwrap_or(0);
        let feedback = if score >= 80 {
            "Excellent work! You've mastered this material."
        } else if score >= 50 {
            "Good effort — review the areas you missed and try again."
        } else {
            "Let's go over this together before moving on."
        };
        Ok(RunnerOutput::new(json!({ "feedback": feedback })))
    }
}

/// Terminal decoration node.
pub struct CelebrationRunner;

#[async_trait]
impl NodeRunner for CelebrationRunner {
    async fn run(&self, node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let celebration_type = config_str(&node.config, "celebrationType", "confetti");
        let message = config_str(&node.config, "message", "Great job!");
        let achieved = input
            .get("achieved")
            .cloned()
            .unwrap_or(Value::Bool(true));
        Ok(RunnerOutput::new(json!({
            "celebration": { "type": celebration_type, "message": message },
            "trigger": achieved,
        })))
    }
}

/// Mirrors [`ContentGeneratorRunner`] specialized to numeracy.
pub struct MathProblemGeneratorRunner {
    pub ai: Arc<dyn AiClient>,
}

#[async_trait]
impl NodeRunner for MathProblemGeneratorRunner {
    async fn run(&self, node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        if !self.ai.is_available() {
            return Err(RunnerError::AiUnavailable("math problem generator".into()));
        }
        let difficulty = config_str(&node.config, "difficulty", "medium");
        let operation = config_str(&node.config, "operation", "addition");
        let prompt = format!(
            "Write one {difficulty} {operation} word problem for a student at numeracy level {}.",
            context.student.numeracy_level.unwrap_or(context.student.proficiency_level)
        );
        let problem = self.ai.generate_text_completion(&prompt).await?;
        Ok(RunnerOutput::new(json!({
            "problem": problem,
            "operands": Vec::<u64>::new(),
            "operation": operation,
            "difficulty": difficulty,
        })))
    }
}

/// Pure context-adjustment runner shared by `visual-support` and
/// `comprehensible-input`: no AI call, produces descriptive support data.
pub struct DescriptiveSupportRunner {
    pub support_kind: &'static str,
}

#[async_trait]
impl NodeRunner for DescriptiveSupportRunner {
    async fn run(&self, _node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let content = input_str(&input, "content").unwrap_or_default();
        Ok(RunnerOutput::new(json!({
            "supports": [self.support_kind],
            "description": format!("{} support generated for level {}", self.support_kind, context.current_language_level),
            "content": content,
            "adjustedLevel": context.current_language_level,
        })))
    }
}

/// Mirrors [`ContentGeneratorRunner`] with a fixed `contentType` and an
/// additional readability pass over its own output.
pub struct ReadingPassageRunner {
    pub ai: Arc<dyn AiClient>,
}

#[async_trait]
impl NodeRunner for ReadingPassageRunner {
    async fn run(&self, node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        if !self.ai.is_available() {
            return Err(RunnerError::AiUnavailable("reading passage generator".into()));
        }
        let topic = config_str(&node.config, "topic", "the lesson topic");
        let prompt = format!(
            "Write a short reading passage about {topic} for a level {} English learner.",
            context.current_language_level
        );
        let content = self.ai.generate_text_completion(&prompt).await?;
        let report = analyze_readability(&content);
        Ok(RunnerOutput::new(json!({
            "content": content,
            "contentType": "passage",
            "readabilityLevel": report.suggested_elpa_level,
            "wordCount": report.total_words,
        })))
    }
}

/// Generic AI-collaborator escape hatch: calls `generateTextCompletion`
/// with `config.prompt`, falling back to `input.prompt`.
pub struct AiModelRunner {
    pub ai: Arc<dyn AiClient>,
}

#[async_trait]
impl NodeRunner for AiModelRunner {
    async fn run(&self, node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let prompt = config_str(&node.config, "prompt", &input_str(&input, "prompt").unwrap_or_default());
        if prompt.is_empty() {
            return Err(RunnerError::InvalidConfig("ai-model requires a prompt".into()));
        }
        let content = self.ai.generate_text_completion(&prompt).await?;
        Ok(RunnerOutput::new(json!({ "content": content })))
    }
}

/// Substitutes `{{name}}` placeholders in `config.template` from `input`
/// and `context.variables`. No AI call.
pub struct PromptTemplateRunner;

fn substitute_template(template: &str, input: &Value, context: &ExecutionContext) -> String {
    let mut result = template.to_string();
    let mut names: Vec<String> = Vec::new();
    if let Some(obj) = input.as_object() {
        names.extend(obj.keys().cloned());
    }
    names.extend(context.variables.keys().cloned());

    for name in names {
        let placeholder = format!("{{{{{name}}}}}");
        if !result.contains(&placeholder) {
            continue;
        }
        let value = lookup(&name, input, context)
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();
        result = result.replace(&placeholder, &value);
    }
    result
}

#[async_trait]
impl NodeRunner for PromptTemplateRunner {
    async fn run(&self, node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let template = config_str(&node.config, "template", "");
        let rendered = substitute_template(&template, &input, context);
        Ok(RunnerOutput::new(json!({ "content": rendered })))
    }
}

/// Calls `generateStructuredOutput` against `config.schema`.
pub struct StructuredOutputRunner {
    pub ai: Arc<dyn AiClient>,
}

#[async_trait]
impl NodeRunner for StructuredOutputRunner {
    async fn run(&self, node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let schema = node.config.get("schema").cloned().unwrap_or(Value::Null);
        let prompt = config_str(&node.config, "prompt", &input_str(&input, "prompt").unwrap_or_default());
        let result = self.ai.generate_structured_output(&prompt, &schema).await?;
        Ok(RunnerOutput::new(result))
    }
}

/// Mirrors [`L1BridgeRunner`] composed with [`VocabularyBuilderRunner`]:
/// extracts key terms and produces an L1 gloss alongside the pass-through
/// content.
pub struct WordProblemDecoderRunner;

#[async_trait]
impl NodeRunner for WordProblemDecoderRunner {
    async fn run(&self, _node: &Node, input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let content = input_str(&input, "content").unwrap_or_default();
        let key_terms = extract_key_terms(&content);
        let l1_gloss = format!("[{}] {content}", context.student.native_language);
        Ok(RunnerOutput::new(json!({
            "content": content,
            "keyTerms": key_terms,
            "l1Gloss": l1_gloss,
        })))
    }
}

/// Structural marker: copies input to output verbatim. The scheduler is
/// what actually fans this node's successors out.
pub struct ParallelRunner;

#[async_trait]
impl NodeRunner for ParallelRunner {
    async fn run(&self, _node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        Ok(RunnerOutput::new(input))
    }
}

/// The one runner specified to mutate a context variable directly. It
/// does so by proposing the mutation through `_setVariable`; the
/// scheduler is the sole writer of `context.variables`.
pub struct VariableRunner;

#[async_trait]
impl NodeRunner for VariableRunner {
    async fn run(&self, node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        let name = config_str(&node.config, "name", "");
        if name.is_empty() {
            return Err(RunnerError::InvalidConfig("variable node requires config.name".into()));
        }
        let value = node
            .config
            .get("value")
            .cloned()
            .or_else(|| input.get("value").cloned())
            .unwrap_or(Value::Null);
        Ok(RunnerOutput::new(json!({
            "name": name,
            "value": value,
            "_setVariable": { "name": name, "value": value },
        })))
    }
}

/// Workflow boundary marker: copies the context fields named in
/// `config.fields` into its output. A generalization of
/// [`StudentProfileRunner`].
pub struct InputRunner;

#[async_trait]
impl NodeRunner for InputRunner {
    async fn run(&self, node: &Node, _input: Value, context: &ExecutionContext) -> Result<RunnerOutput> {
        let fields: Vec<String> = node
            .config
            .get("fields")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut out = Map::new();
        for field in fields {
            let value = match field.as_str() {
                "studentId" => json!(context.student.id),
                "gradeLevel" => json!(context.student.grade_level),
                "nativeLanguage" => json!(context.student.native_language),
                "elpaLevel" => json!(context.student.proficiency_level),
                "currentLanguageLevel" => json!(context.current_language_level),
                other => context.variables.get(other).cloned().unwrap_or(Value::Null),
            };
            out.insert(field, value);
        }
        Ok(RunnerOutput::new(Value::Object(out)))
    }
}

/// Terminal pass-through sink.
pub struct OutputRunner;

#[async_trait]
impl NodeRunner for OutputRunner {
    async fn run(&self, _node: &Node, input: Value, _context: &ExecutionContext) -> Result<RunnerOutput> {
        Ok(RunnerOutput::new(input))
    }
}

/// Wires every built-in runner into a fresh registry.
pub fn builtin_registry(ai: Arc<dyn AiClient>) -> NodeRunnerRegistry {
    let mut registry = NodeRunnerRegistry::new();
    registry.register(NodeKind::StudentProfile, Arc::new(StudentProfileRunner));
    registry.register(NodeKind::CurriculumSelector, Arc::new(CurriculumSelectorRunner));
    registry.register(
        NodeKind::ContentGenerator,
        Arc::new(ContentGeneratorRunner { ai: ai.clone() }),
    );
    registry.register(NodeKind::VocabularyBuilder, Arc::new(VocabularyBuilderRunner));
    registry.register(NodeKind::ScaffoldedContent, Arc::new(ScaffoldedContentRunner));
    registry.register(NodeKind::L1Bridge, Arc::new(L1BridgeRunner));
    registry.register(
        NodeKind::HumanInput,
        Arc::new(HumanInputRunner { default_input_type: "text", include_rubric: false }),
    );
    registry.register(NodeKind::ComprehensionCheck, Arc::new(ComprehensionCheckRunner));
    registry.register(NodeKind::MultipleChoice, Arc::new(ComprehensionCheckRunner));
    registry.register(NodeKind::Loop, Arc::new(LoopRunner));
    registry.register(NodeKind::Conditional, Arc::new(ConditionalRunner));
    registry.register(NodeKind::ProficiencyRouter, Arc::new(ProficiencyRouterRunner));
    registry.register(NodeKind::Merge, Arc::new(MergeRunner));
    registry.register(NodeKind::ProgressTracker, Arc::new(ProgressTrackerRunner));
    registry.register(NodeKind::FeedbackGenerator, Arc::new(FeedbackGeneratorRunner));
    registry.register(NodeKind::Celebration, Arc::new(CelebrationRunner));
    registry.register(
        NodeKind::MathProblemGenerator,
        Arc::new(MathProblemGeneratorRunner { ai: ai.clone() }),
    );
    registry.register(
        NodeKind::VisualSupport,
        Arc::new(DescriptiveSupportRunner { support_kind: "visual" }),
    );
    registry.register(
        NodeKind::ComprehensibleInput,
        Arc::new(DescriptiveSupportRunner { support_kind: "comprehensible-input" }),
    );
    registry.register(
        NodeKind::ReadingPassage,
        Arc::new(ReadingPassageRunner { ai: ai.clone() }),
    );
    registry.register(NodeKind::AiModel, Arc::new(AiModelRunner { ai: ai.clone() }));
    registry.register(NodeKind::PromptTemplate, Arc::new(PromptTemplateRunner));
    registry.register(
        NodeKind::StructuredOutput,
        Arc::new(StructuredOutputRunner { ai: ai.clone() }),
    );
    registry.register(
        NodeKind::VoiceInput,
        Arc::new(HumanInputRunner { default_input_type: "voice", include_rubric: false }),
    );
    registry.register(
        NodeKind::FreeResponse,
        Arc::new(HumanInputRunner { default_input_type: "text", include_rubric: false }),
    );
    registry.register(
        NodeKind::OralPractice,
        Arc::new(HumanInputRunner { default_input_type: "audio", include_rubric: false }),
    );
    registry.register(
        NodeKind::SpeakingAssessment,
        Arc::new(HumanInputRunner { default_input_type: "audio", include_rubric: true }),
    );
    registry.register(NodeKind::WordProblemDecoder, Arc::new(WordProblemDecoderRunner));
    registry.register(NodeKind::Parallel, Arc::new(ParallelRunner));
    registry.register(NodeKind::Variable, Arc::new(VariableRunner));
    registry.register(NodeKind::Input, Arc::new(InputRunner));
    registry.register(NodeKind::Output, Arc::new(OutputRunner));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::StudentProfile;
    use std::collections::HashMap as StdHashMap;

    fn context() -> ExecutionContext {
        ExecutionContext::new(StudentProfile::new("s1", "5", 3))
    }

    fn node(kind: &str, config: Map<String, Value>) -> Node {
        Node::new("n1", kind).with_config(config)
    }

    #[tokio::test]
    async fn loop_runner_computes_iteration_and_completion() {
        let runner = LoopRunner;
        let mut config = Map::new();
        config.insert("maxIterations".to_string(), json!(3));
        let n = node("loop", config);

        let r1 = runner.run(&n, json!({}), &context()).await.unwrap();
        assert_eq!(r1.output["iteration"], 1);
        assert_eq!(r1.output["isComplete"], false);

        let r3 = runner
            .run(&n, json!({ "_loopIteration": 2 }), &context())
            .await
            .unwrap();
        assert_eq!(r3.output["iteration"], 3);
        assert_eq!(r3.output["isComplete"], true);
    }

    #[tokio::test]
    async fn feedback_generator_covers_all_three_bands() {
        let runner = FeedbackGeneratorRunner;
        let ctx = context();
        let high = runner.run(&node("feedback-generator", Map::new()), json!({"score": 90}), &ctx).await.unwrap();
        let mid = runner.run(&node("feedback-generator", Map::new()), json!({"score": 60}), &ctx).await.unwrap();
        let low = runner.run(&node("feedback-generator", Map::new()), json!({"score": 10}), &ctx).await.unwrap();
        assert!(high.output["feedback"].as_str().unwrap().contains("Excellent"));
        assert!(mid.output["feedback"].as_str().unwrap().contains("Good effort"));
        assert!(low.output["feedback"].as_str().unwrap().contains("together"));
    }

    #[tokio::test]
    async fn proficiency_router_picks_highest_cleared_threshold() {
        let runner = ProficiencyRouterRunner;
        let mut config = Map::new();
        let mut criteria = Map::new();
        criteria.insert("mastered".to_string(), json!(80));
        criteria.insert("needs-review".to_string(), json!(0));
        config.insert("routingCriteria".to_string(), Value::Object(criteria));
        let n = node("proficiency-router", config);

        let result = runner.run(&n, json!({ "score": 85 }), &context()).await.unwrap();
        assert_eq!(result.output["route"], "mastered");

        let result = runner.run(&n, json!({ "score": 40 }), &context()).await.unwrap();
        assert_eq!(result.output["route"], "needs-review");
    }

    #[tokio::test]
    async fn conditional_runner_branches_on_comparison() {
        let runner = ConditionalRunner;
        let mut config = Map::new();
        config.insert("condition".to_string(), json!("score >= 50"));
        let n = node("conditional", config);

        let met = runner.run(&n, json!({ "score": 60 }), &context()).await.unwrap();
        assert_eq!(met.output["conditionMet"], true);

        let not_met = runner.run(&n, json!({ "score": 20 }), &context()).await.unwrap();
        assert_eq!(not_met.output["conditionMet"], false);
    }

    #[tokio::test]
    async fn l1_bridge_produces_translation_and_key_terms() {
        let runner = L1BridgeRunner;
        let mut ctx = context();
        ctx.student.native_language = "es".to_string();
        let result = runner
            .run(&node("l1-bridge", Map::new()), json!({ "content": "photosynthesis happens" }), &ctx)
            .await
            .unwrap();
        assert!(result.output["translatedText"].as_str().unwrap().starts_with("[es"));
        assert!(!result.output["keyTerms"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn human_input_variants_default_input_type_and_pause() {
        let voice = HumanInputRunner { default_input_type: "voice", include_rubric: false };
        let result = voice.run(&node("voice-input", Map::new()), json!({}), &context()).await.unwrap();
        assert!(result.should_pause);
        assert_eq!(result.output["inputType"], "voice");
    }

    #[tokio::test]
    async fn variable_runner_proposes_a_context_mutation() {
        let runner = VariableRunner;
        let mut config = Map::new();
        config.insert("name".to_string(), json!("score"));
        config.insert("value".to_string(), json!(42));
        let result = runner.run(&node("variable", config), json!({}), &context()).await.unwrap();
        assert_eq!(result.output["_setVariable"]["name"], "score");
        assert_eq!(result.output["_setVariable"]["value"], 42);
    }

    #[tokio::test]
    async fn builtin_registry_has_every_kind_registered() {
        struct NoopAi;
        #[async_trait]
        impl AiClient for NoopAi {
            async fn generate_text_completion(&self, _prompt: &str) -> Result<String> {
                Ok("stub".to_string())
            }
            async fn stream_text_completion(
                &self,
                _prompt: &str,
            ) -> Result<futures::stream::BoxStream<'static, crate::ai::TextChunk>> {
                use futures::stream;
                Ok(Box::pin(stream::empty()))
            }
            async fn generate_structured_output(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
                Ok(json!({}))
            }
        }

        let registry = builtin_registry(Arc::new(NoopAi));
        let expected: StdHashMap<&str, ()> = [
            "student-profile", "curriculum-selector", "content-generator", "vocabulary-builder",
            "scaffolded-content", "l1-bridge", "human-input", "comprehension-check",
            "multiple-choice", "loop", "conditional", "proficiency-router", "merge",
            "progress-tracker", "feedback-generator", "celebration", "math-problem-generator",
            "visual-support", "comprehensible-input", "reading-passage", "ai-model",
            "prompt-template", "structured-output", "voice-input", "free-response",
            "oral-practice", "speaking-assessment", "word-problem-decoder", "parallel",
            "variable", "input", "output",
        ]
        .into_iter()
        .map(|k| (k, ()))
        .collect();

        for kind in expected.keys() {
            assert!(registry.get(kind).is_some(), "missing runner for {kind}");
        }
        assert_eq!(registry.len(), expected.len());
    }
}
