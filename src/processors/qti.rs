//! QTI assessment content processor and interpreter.
//!
//! Turns one QTI assessment resource into a list of `<problem>` or
//! `<openassessment>` nodes. The interpreter reads the constrained
//! condition language inside `<resprocessing>` only to recover the set
//! of correct response identifiers; scoring formulas are out of scope.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::info;

use crate::cartridge::manifest::ResourceRecord;
use crate::cartridge::{resource_type, Cartridge};
use crate::filesystem;
use crate::olx::OlxNode;
use crate::processors::{ContentProcessor, ProcessError, ProcessorContext};
use crate::utils::{percent_decode, unescape_html_entities};
use crate::xml::{QtiAssessment, QtiItem, QtiRespCondition};

const FIB_TEXTLINE_SIZE_BUFFER: usize = 10;

#[derive(Debug, Error)]
pub enum QtiError {
    /// Correctness semantics are undefined without a profile, so no
    /// safe OLX node can be synthesized.
    #[error("Item {ident:?} has no cc_profile metadata field")]
    MissingProfile { ident: String },

    #[error("Unknown cc_profile: {0:?}")]
    UnknownProfile(String),
}

/// The six question profiles Common Cartridge QTI declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QtiProfile {
    MultipleChoice,
    MultipleResponse,
    FillInTheBlank,
    Essay,
    Boolean,
    PatternMatch,
}

impl QtiProfile {
    pub fn parse(value: &str) -> Result<Self, QtiError> {
        match value {
            "cc.multiple_choice.v0p1" => Ok(Self::MultipleChoice),
            "cc.multiple_response.v0p1" => Ok(Self::MultipleResponse),
            "cc.fib.v0p1" => Ok(Self::FillInTheBlank),
            "cc.essay.v0p1" => Ok(Self::Essay),
            "cc.true_false.v0p1" => Ok(Self::Boolean),
            "cc.pattern_match.v0p1" => Ok(Self::PatternMatch),
            other => Err(QtiError::UnknownProfile(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EssayFeedback {
    pub general: Option<String>,
    pub correct: Option<String>,
    pub incorrect: Option<String>,
}

impl EssayFeedback {
    fn is_empty(&self) -> bool {
        self.general.is_none() && self.correct.is_none() && self.incorrect.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum ProblemPayload {
    /// Multiple choice, multiple response and true/false questions.
    /// True/false is structurally a two-choice multiple choice.
    Choices {
        description: String,
        choices: IndexMap<String, Choice>,
    },
    FillInTheBlank {
        description: String,
        answer: String,
        additional_answers: Vec<String>,
        is_regexp: bool,
    },
    Essay {
        description: String,
        sample_solution: Option<String>,
        feedback: EssayFeedback,
    },
}

/// One parsed question, transient per processor invocation.
#[derive(Debug, Clone)]
pub struct QtiProblem {
    pub ident: String,
    pub profile: QtiProfile,
    pub payload: ProblemPayload,
}

pub struct QtiProcessor;

impl ContentProcessor for QtiProcessor {
    fn name(&self) -> &'static str {
        "qti"
    }

    fn process(
        &self,
        cartridge: &Cartridge,
        _context: &mut ProcessorContext,
        resource: &ResourceRecord,
        _idref: &str,
    ) -> Result<Option<Vec<OlxNode>>, ProcessError> {
        if !resource_type::is_qti_assessment(&resource.resource_type) {
            return Ok(None);
        }
        let Some(resource_file) = resource.first_file() else {
            return Ok(None);
        };

        let file_path = cartridge.build_resource_file_path(&resource_file.href);
        let xml_text = filesystem::read_xml_text(&file_path)?;
        let assessment = QtiAssessment::parse(&xml_text)?;

        let problems = parse_problems(&assessment, &file_path.display().to_string())?;
        let nodes = problems.iter().flat_map(create_problem_nodes).collect();
        Ok(Some(nodes))
    }
}

/// Parse every item of an assessment.
///
/// Item identifiers are suffixed with their zero-based position:
/// malformed exports reuse identifiers across items and the consuming
/// LMS rejects duplicate block identifiers.
pub fn parse_problems(assessment: &QtiAssessment, source: &str) -> Result<Vec<QtiProblem>, QtiError> {
    let mut problems = Vec::with_capacity(assessment.items.len());

    for (index, item) in assessment.items.iter().enumerate() {
        let raw_ident = item.ident.clone().unwrap_or_default();
        let profile_value = item
            .cc_profile
            .clone()
            .ok_or_else(|| QtiError::MissingProfile { ident: raw_ident.clone() })?;
        let profile = QtiProfile::parse(&profile_value)?;

        if profile == QtiProfile::PatternMatch {
            info!("Problem with ID {} can't be converted.", raw_ident);
            info!("    Profile {} is not supported.", profile_value);
            info!("    At file {}.", source);
            continue;
        }

        problems.push(QtiProblem {
            ident: format!("{raw_ident}{index}"),
            profile,
            payload: parse_payload(item, profile),
        });
    }

    Ok(problems)
}

fn parse_payload(item: &QtiItem, profile: QtiProfile) -> ProblemPayload {
    let description = item.description.clone().unwrap_or_default();

    match profile {
        QtiProfile::MultipleChoice | QtiProfile::MultipleResponse | QtiProfile::Boolean => {
            let mut choices: IndexMap<String, Choice> = item
                .response_labels
                .iter()
                .map(|(ident, text)| {
                    (
                        ident.clone(),
                        Choice {
                            text: text.clone(),
                            correct: false,
                        },
                    )
                })
                .collect();
            mark_correct_responses(&item.resp_conditions, &mut choices);
            ProblemPayload::Choices { description, choices }
        }
        QtiProfile::FillInTheBlank => {
            let (answer, additional_answers, is_regexp) = parse_fib_answers(&item.resp_conditions);
            ProblemPayload::FillInTheBlank {
                description,
                answer,
                additional_answers,
                is_regexp,
            }
        }
        QtiProfile::Essay => ProblemPayload::Essay {
            description,
            sample_solution: item.solution.clone(),
            feedback: parse_essay_feedback(item),
        },
        // Pattern match items are skipped before payload parsing.
        QtiProfile::PatternMatch => ProblemPayload::Essay {
            description,
            sample_solution: None,
            feedback: EssayFeedback::default(),
        },
    }
}

/// Mark the correct responses a condition list describes.
///
/// Equality assertions are treated as "this response is correct"
/// whether they sit flat or nested inside an `and` or `or` group; the
/// formula itself is not evaluated. Walking stops at the first
/// condition whose continue flag is "No", a missing attribute reads as
/// "No". Conditions after that point are unreachable by definition.
fn mark_correct_responses(conditions: &[QtiRespCondition], choices: &mut IndexMap<String, Choice>) {
    for condition in conditions {
        let mut correct_answers: Vec<&String> = condition.varequals.iter().collect();
        if correct_answers.is_empty() {
            correct_answers.extend(condition.and_varequals.iter());
            correct_answers.extend(condition.or_varequals.iter());
        }

        for answer in correct_answers {
            if let Some(choice) = choices.get_mut(answer) {
                choice.correct = true;
            }
        }

        if !condition.continue_processing {
            break;
        }
    }
}

/// Collect fill-in-the-blank answers.
///
/// Exact answers and substring patterns are mutually exclusive modes;
/// pattern mode wins when both occur. The primary answer is then the
/// first pattern and every exact answer is re-emitted escaped among the
/// additional answers.
fn parse_fib_answers(conditions: &[QtiRespCondition]) -> (String, Vec<String>, bool) {
    let mut exact_answers = Vec::new();
    let mut answer_patterns = Vec::new();

    for condition in conditions {
        exact_answers.extend(condition.varequals.iter().cloned());
        answer_patterns.extend(condition.varsubstrings.iter().cloned());

        if !condition.continue_processing {
            break;
        }
    }

    if answer_patterns.is_empty() {
        let mut answers = exact_answers.into_iter();
        (answers.next().unwrap_or_default(), answers.collect(), false)
    } else {
        let mut patterns = answer_patterns.into_iter();
        let answer = patterns.next().unwrap_or_default();
        let additional = patterns
            .chain(exact_answers.iter().map(|exact| regex::escape(exact)))
            .collect();
        (answer, additional, true)
    }
}

/// Collect per-response-type essay feedback.
///
/// A feedback bucket exists only when the first condition's display
/// feedback link actually references the response type; an unreferenced
/// `<itemfeedback>` block alone is not enough.
fn parse_essay_feedback(item: &QtiItem) -> EssayFeedback {
    let mut feedback = EssayFeedback::default();
    if item.feedbacks.is_empty() {
        return feedback;
    }
    let Some(first_condition) = item.resp_conditions.first() else {
        return feedback;
    };

    for (resp_type, slot) in [
        ("general_fb", &mut feedback.general),
        ("correct_fb", &mut feedback.correct),
        ("general_incorrect_fb", &mut feedback.incorrect),
    ] {
        if first_condition
            .display_feedback_links
            .iter()
            .any(|link| link == resp_type)
        {
            *slot = item
                .feedbacks
                .iter()
                .find(|entry| entry.ident == resp_type)
                .and_then(|entry| entry.text.clone());
        }
    }

    feedback
}

/// Build the OLX nodes for one parsed problem. Essays with a sample
/// solution expand to two nodes, the solution HTML block first.
pub fn create_problem_nodes(problem: &QtiProblem) -> Vec<OlxNode> {
    match &problem.payload {
        ProblemPayload::Choices { description, choices } => match problem.profile {
            QtiProfile::MultipleResponse => {
                vec![create_multiple_response_problem(description, choices)]
            }
            _ => vec![create_multiple_choice_problem(description, choices)],
        },
        ProblemPayload::FillInTheBlank {
            description,
            answer,
            additional_answers,
            is_regexp,
        } => vec![create_fib_problem(description, answer, additional_answers, *is_regexp)],
        ProblemPayload::Essay {
            description,
            sample_solution,
            feedback,
        } => {
            let ora = create_essay_problem(&problem.ident, description, feedback);
            match sample_solution {
                // OLX has no sample solution equivalent, so it goes on
                // top as a plain HTML block.
                Some(solution) => vec![OlxNode::new("html").with_cdata(solution.clone()), ora],
                None => vec![ora],
            }
        }
    }
}

/// Prepare the question stem for embedding.
///
/// Material texts arrive as escaped, sometimes percent-encoded HTML
/// markup; bare text is wrapped so the fragment stays a single element.
fn description_markup(description: &str) -> String {
    let markup = percent_decode(&unescape_html_entities(description));
    if markup.trim_start().starts_with('<') {
        markup
    } else {
        format!("<p>{markup}</p>")
    }
}

fn create_multiple_choice_problem(description: &str, choices: &IndexMap<String, Choice>) -> OlxNode {
    let mut choice_group = OlxNode::new("choicegroup").with_attribute("type", "MultipleChoice");
    for choice in choices.values() {
        choice_group = choice_group.with_element(
            OlxNode::new("choice")
                .with_attribute("correct", if choice.correct { "true" } else { "false" })
                .with_text(&choice.text),
        );
    }

    OlxNode::new("problem").with_element(
        OlxNode::new("multiplechoiceresponse")
            .with_raw(description_markup(description))
            .with_element(choice_group),
    )
}

fn create_multiple_response_problem(description: &str, choices: &IndexMap<String, Choice>) -> OlxNode {
    let mut checkbox_group = OlxNode::new("checkboxgroup").with_attribute("type", "MultipleChoice");
    for choice in choices.values() {
        checkbox_group = checkbox_group.with_element(
            OlxNode::new("choice")
                .with_attribute("correct", if choice.correct { "true" } else { "false" })
                .with_text(&choice.text),
        );
    }

    OlxNode::new("problem").with_element(
        OlxNode::new("choiceresponse")
            .with_attribute("partial_credit", "EDC")
            .with_raw(description_markup(description))
            .with_element(checkbox_group),
    )
}

fn create_fib_problem(
    description: &str,
    answer: &str,
    additional_answers: &[String],
    is_regexp: bool,
) -> OlxNode {
    let response_type = if is_regexp { "ci regexp" } else { "ci" };
    let mut max_answer_length = answer.len();

    let mut string_response = OlxNode::new("stringresponse")
        .with_attribute("answer", answer)
        .with_attribute("type", response_type)
        .with_raw(description_markup(description));

    for additional in additional_answers {
        max_answer_length = max_answer_length.max(additional.len());
        string_response = string_response
            .with_element(OlxNode::new("additional_answer").with_attribute("answer", additional));
    }

    string_response = string_response.with_element(
        OlxNode::new("textline")
            .with_attribute("size", (max_answer_length + FIB_TEXTLINE_SIZE_BUFFER).to_string()),
    );

    OlxNode::new("problem").with_element(string_response)
}

fn feedback_criterion(feedback: &EssayFeedback) -> OlxNode {
    let mut criterion = OlxNode::new("criterion")
        .with_attribute("feedback", "optional")
        .with_element(OlxNode::new("name").with_text("Feedback"))
        .with_element(OlxNode::new("label").with_text("Feedback"))
        .with_element(OlxNode::new("prompt").with_text("Example Feedback"));

    for (name, text) in [
        ("General", feedback.general.as_deref()),
        ("Correct", feedback.correct.as_deref()),
        ("Incorrect", feedback.incorrect.as_deref()),
    ] {
        criterion = criterion.with_element(
            OlxNode::new("option")
                .with_attribute("points", "0")
                .with_element(OlxNode::new("name").with_text(name))
                .with_element(OlxNode::new("label").with_text(name))
                .with_element(OlxNode::new("explanation").with_text(text.unwrap_or(name))),
        );
    }
    criterion
}

fn default_essay_criterion() -> OlxNode {
    let option = |name: &str, points: &str| {
        OlxNode::new("option")
            .with_attribute("points", points)
            .with_element(OlxNode::new("name").with_text(name))
            .with_element(OlxNode::new("label").with_text(name))
            .with_element(OlxNode::new("explanation").with_text("Explanation"))
    };

    OlxNode::new("criterion")
        .with_attribute("feedback", "optional")
        .with_element(OlxNode::new("name").with_text("Ideas"))
        .with_element(OlxNode::new("label").with_text("Ideas"))
        .with_element(OlxNode::new("prompt").with_text("Example criterion"))
        .with_element(option("Poor", "0"))
        .with_element(option("Good", "1"))
}

fn create_essay_problem(ident: &str, description: &str, feedback: &EssayFeedback) -> OlxNode {
    let criterion = if feedback.is_empty() {
        default_essay_criterion()
    } else {
        feedback_criterion(feedback)
    };

    OlxNode::new("openassessment")
        .with_attribute("url_name", ident)
        .with_attribute("text_response", "required")
        .with_attribute("prompts_type", "html")
        .with_element(OlxNode::new("title").with_text("Open Response Assessment"))
        .with_element(
            OlxNode::new("assessments").with_element(
                OlxNode::new("assessment")
                    .with_attribute("name", "staff-assessment")
                    .with_attribute("required", "True"),
            ),
        )
        .with_element(
            OlxNode::new("prompts").with_element(
                OlxNode::new("prompt")
                    .with_element(OlxNode::new("description").with_text(description)),
            ),
        )
        .with_element(
            OlxNode::new("rubric")
                .with_element(criterion)
                .with_element(OlxNode::new("feedbackprompt").with_text("Feedback prompt text"))
                .with_element(
                    OlxNode::new("feedback_default_text").with_text("Feedback prompt default text"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(
        continue_processing: bool,
        varequals: &[&str],
        varsubstrings: &[&str],
    ) -> QtiRespCondition {
        QtiRespCondition {
            continue_processing,
            varequals: varequals.iter().map(|s| s.to_string()).collect(),
            varsubstrings: varsubstrings.iter().map(|s| s.to_string()).collect(),
            ..QtiRespCondition::default()
        }
    }

    fn choices(idents: &[&str]) -> IndexMap<String, Choice> {
        idents
            .iter()
            .map(|ident| {
                (
                    ident.to_string(),
                    Choice {
                        text: format!("choice {ident}"),
                        correct: false,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_marking_stops_after_continue_no() {
        let mut responses = choices(&["a", "b", "c"]);
        let conditions = vec![
            condition(true, &["a"], &[]),
            condition(false, &["b"], &[]),
            // Unreachable: the previous condition does not continue.
            condition(true, &["c"], &[]),
        ];
        mark_correct_responses(&conditions, &mut responses);

        assert!(responses["a"].correct);
        assert!(responses["b"].correct);
        assert!(!responses["c"].correct);
    }

    #[test]
    fn test_missing_continue_attribute_stops_immediately() {
        let mut responses = choices(&["a", "b"]);
        let conditions = vec![condition(false, &["a"], &[]), condition(false, &["b"], &[])];
        mark_correct_responses(&conditions, &mut responses);

        assert!(responses["a"].correct);
        assert!(!responses["b"].correct);
    }

    #[test]
    fn test_nested_varequals_mark_correct() {
        let mut responses = choices(&["a", "b", "c"]);
        let conditions = vec![QtiRespCondition {
            continue_processing: false,
            and_varequals: vec!["a".to_string(), "c".to_string()],
            or_varequals: vec!["b".to_string()],
            ..QtiRespCondition::default()
        }];
        mark_correct_responses(&conditions, &mut responses);

        assert!(responses["a"].correct);
        assert!(responses["b"].correct);
        assert!(responses["c"].correct);
    }

    #[test]
    fn test_fib_exact_answers() {
        let conditions = vec![condition(false, &["blue", "azure"], &[])];
        let (answer, additional, is_regexp) = parse_fib_answers(&conditions);
        assert_eq!(answer, "blue");
        assert_eq!(additional, vec!["azure"]);
        assert!(!is_regexp);
    }

    #[test]
    fn test_fib_pattern_mode_wins_and_escapes_exact_answers() {
        let conditions = vec![condition(false, &["a+b"], &["bl.e", "gr.en"])];
        let (answer, additional, is_regexp) = parse_fib_answers(&conditions);
        assert!(is_regexp);
        assert_eq!(answer, "bl.e");
        assert_eq!(additional, vec!["gr.en".to_string(), regex::escape("a+b")]);
    }

    #[test]
    fn test_duplicate_idents_are_position_suffixed() {
        let assessment = QtiAssessment {
            title: None,
            items: vec![mc_item("q1"), mc_item("q1")],
        };
        let problems = parse_problems(&assessment, "quiz.xml").unwrap();
        assert_eq!(problems[0].ident, "q10");
        assert_eq!(problems[1].ident, "q11");
    }

    #[test]
    fn test_missing_profile_is_fatal() {
        let mut item = mc_item("q1");
        item.cc_profile = None;
        let assessment = QtiAssessment {
            title: None,
            items: vec![item],
        };
        assert!(matches!(
            parse_problems(&assessment, "quiz.xml"),
            Err(QtiError::MissingProfile { ident }) if ident == "q1"
        ));
    }

    #[test]
    fn test_unknown_profile_is_fatal() {
        let mut item = mc_item("q1");
        item.cc_profile = Some("cc.telepathy.v0p1".to_string());
        let assessment = QtiAssessment {
            title: None,
            items: vec![item],
        };
        assert!(matches!(
            parse_problems(&assessment, "quiz.xml"),
            Err(QtiError::UnknownProfile(profile)) if profile == "cc.telepathy.v0p1"
        ));
    }

    #[test]
    fn test_pattern_match_items_are_skipped() {
        let mut pattern_item = mc_item("q1");
        pattern_item.cc_profile = Some("cc.pattern_match.v0p1".to_string());
        let assessment = QtiAssessment {
            title: None,
            items: vec![pattern_item, mc_item("q2")],
        };
        let problems = parse_problems(&assessment, "quiz.xml").unwrap();
        assert_eq!(problems.len(), 1);
        // The surviving item keeps its own position suffix.
        assert_eq!(problems[0].ident, "q21");
    }

    #[test]
    fn test_true_false_marks_second_label_correct() {
        let mut item = mc_item("q1");
        item.cc_profile = Some("cc.true_false.v0p1".to_string());
        item.resp_conditions = vec![condition(false, &["b"], &[])];

        let assessment = QtiAssessment {
            title: None,
            items: vec![item],
        };
        let problems = parse_problems(&assessment, "quiz.xml").unwrap();

        let ProblemPayload::Choices { choices, .. } = &problems[0].payload else {
            panic!("expected a choices payload");
        };
        let correct: Vec<&String> = choices
            .iter()
            .filter(|(_, choice)| choice.correct)
            .map(|(ident, _)| ident)
            .collect();
        assert_eq!(correct, vec!["b"]);
    }

    #[test]
    fn test_multiple_choice_node_shape() {
        let problems = parse_problems(
            &QtiAssessment {
                title: None,
                items: vec![mc_item("q1")],
            },
            "quiz.xml",
        )
        .unwrap();
        let nodes = create_problem_nodes(&problems[0]);

        let xml = nodes[0].to_xml();
        assert!(xml.contains("<multiplechoiceresponse>"));
        assert!(xml.contains(r#"<choicegroup type="MultipleChoice">"#));
        assert!(xml.contains("<p>Pick one</p>"));
    }

    #[test]
    fn test_fib_node_textline_sizing() {
        let node = create_fib_problem("Enter the word", "short", &["a considerably longer answer".to_string()], false);
        let xml = node.to_xml();
        assert!(xml.contains(r#"type="ci""#));
        let expected_size = "a considerably longer answer".len() + FIB_TEXTLINE_SIZE_BUFFER;
        assert!(xml.contains(&format!(r#"<textline size="{expected_size}"/>"#)));
    }

    #[test]
    fn test_essay_with_solution_emits_html_block_first() {
        let problem = QtiProblem {
            ident: "e10".to_string(),
            profile: QtiProfile::Essay,
            payload: ProblemPayload::Essay {
                description: "Discuss".to_string(),
                sample_solution: Some("<p>a model answer</p>".to_string()),
                feedback: EssayFeedback::default(),
            },
        };
        let nodes = create_problem_nodes(&problem);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tag, "html");
        assert_eq!(nodes[1].tag, "openassessment");
        assert_eq!(nodes[1].attribute("url_name"), Some("e10"));
    }

    #[test]
    fn test_essay_feedback_gated_on_display_links() {
        let mut item = mc_item("q1");
        item.cc_profile = Some("cc.essay.v0p1".to_string());
        item.resp_conditions = vec![QtiRespCondition {
            display_feedback_links: vec!["correct_fb".to_string()],
            ..QtiRespCondition::default()
        }];
        item.feedbacks = vec![
            crate::xml::QtiItemFeedback {
                ident: "correct_fb".to_string(),
                text: Some("Nice".to_string()),
            },
            // Present but never referenced by a display feedback link.
            crate::xml::QtiItemFeedback {
                ident: "general_fb".to_string(),
                text: Some("Ignored".to_string()),
            },
        ];

        let feedback = parse_essay_feedback(&item);
        assert_eq!(feedback.correct.as_deref(), Some("Nice"));
        assert!(feedback.general.is_none());
        assert!(feedback.incorrect.is_none());
    }

    fn mc_item(ident: &str) -> QtiItem {
        QtiItem {
            ident: Some(ident.to_string()),
            title: Some("Question".to_string()),
            cc_profile: Some("cc.multiple_choice.v0p1".to_string()),
            description: Some("&lt;p&gt;Pick one&lt;/p&gt;".to_string()),
            response_labels: vec![
                ("a".to_string(), "First".to_string()),
                ("b".to_string(), "Second".to_string()),
            ],
            resp_conditions: vec![condition(false, &["a"], &[])],
            feedbacks: Vec::new(),
            solution: None,
        }
    }
}
