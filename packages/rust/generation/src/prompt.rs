//! Prompt templates, one per content mode.
//!
//! A prompt is the task description, the output rules, the literal JSON
//! schema the model must follow, and the user content embedded verbatim.
//! Building a prompt is a pure function of `(content, mode)`.

use studygen_shared::ContentMode;

/// Sampling temperature for every mode. Low, because the output is structured.
pub const TEMPERATURE: f64 = 0.3;

/// Output limits sent with each request, fixed per mode family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationLimits {
    pub max_output_tokens: u32,
    pub top_k: u32,
    pub top_p: f64,
}

impl GenerationLimits {
    /// Limits for `mode`.
    pub fn for_mode(mode: ContentMode) -> Self {
        match mode {
            // Long-form prose.
            ContentMode::Summary | ContentMode::StudySheet => Self {
                max_output_tokens: 8192,
                top_k: 40,
                top_p: 0.95,
            },
            // Many short structured items.
            ContentMode::MultipleChoiceQuiz | ContentMode::Flashcards => Self {
                max_output_tokens: 4096,
                top_k: 40,
                top_p: 0.95,
            },
            ContentMode::TextRecognition => Self {
                max_output_tokens: 8192,
                top_k: 1,
                top_p: 1.0,
            },
            ContentMode::Classification => Self {
                max_output_tokens: 512,
                top_k: 20,
                top_p: 0.9,
            },
        }
    }
}

struct Template {
    task: &'static str,
    rules: &'static [&'static str],
    schema: &'static str,
}

const JSON_ONLY: &str = "Respond ONLY with valid JSON. Do not add explanations, \
                         markdown code fences, or any text before or after the JSON.";

fn template(mode: ContentMode) -> Template {
    match mode {
        ContentMode::Summary => Template {
            task: "You are an expert teacher. Write a clear, well-structured summary of the \
                   study material below for a student preparing for an exam.",
            rules: &[
                "Give the summary a short, descriptive title.",
                "Organize the content into sections, each starting with a `## ` heading.",
                "Cover every key concept, definition and relationship in the material.",
                "Use short paragraphs and bullet points where they help readability.",
                "Write in the same language as the material.",
            ],
            schema: r###"{
  "title": "Summary title",
  "content": "## First section\n...\n\n## Second section\n..."
}"###,
        },
        ContentMode::MultipleChoiceQuiz => Template {
            task: "You are an expert teacher. Create a multiple-choice quiz that tests \
                   understanding of the study material below.",
            rules: &[
                "Create exactly 8 questions.",
                "Each question has exactly 4 options.",
                "`correct` is the 0-based index (0, 1, 2 or 3) of the single right option.",
                "Vary the position of the correct option across questions.",
                "Each `explanation` says in one or two sentences why the answer is right.",
                "Only ask about facts stated in the material.",
                "Write in the same language as the material.",
            ],
            schema: r#"{
  "questions": [
    {
      "question": "Question text?",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct": 0,
      "explanation": "Why option A is correct."
    }
  ]
}"#,
        },
        ContentMode::Flashcards => Template {
            task: "You are an expert teacher. Create flashcards for memorizing the key \
                   facts in the study material below.",
            rules: &[
                "Create between 12 and 15 flashcards.",
                "The `front` is a term or a short question.",
                "The `back` is a concise definition or answer, at most two sentences.",
                "Do not repeat the same fact on two cards.",
                "Write in the same language as the material.",
            ],
            schema: r#"{
  "cards": [
    { "front": "Term or question", "back": "Definition or answer" }
  ]
}"#,
        },
        ContentMode::StudySheet => Template {
            task: "You are an expert teacher. Create a one-page study sheet that a student \
                   can review the night before an exam.",
            rules: &[
                "Give the sheet a short, descriptive title.",
                "Create between 4 and 6 sections (for example key concepts, definitions, \
                 formulas or dates, common mistakes).",
                "A section's `content` is either a paragraph string or an array of short \
                 bullet strings.",
                "Prefer bullet arrays for lists of facts.",
                "Write in the same language as the material.",
            ],
            schema: r#"{
  "title": "Study sheet title",
  "sections": [
    { "title": "Key concepts", "content": ["Concept one", "Concept two"] },
    { "title": "Overview", "content": "A short paragraph." }
  ]
}"#,
        },
        ContentMode::TextRecognition => Template {
            task: "Transcribe all readable text in the attached image.",
            rules: &[
                "Keep the original reading order, paragraphs and line breaks.",
                "Do not translate, summarize or correct the text.",
                "If the image contains no readable text, return an empty string.",
                "Any additional notes below are context from the user, not text to transcribe.",
            ],
            schema: r#"{
  "text": "The transcribed text"
}"#,
        },
        ContentMode::Classification => Template {
            task: "Classify the study material below into the school or university subject \
                   it belongs to.",
            rules: &[
                "`subject` is a single broad subject name, e.g. Biology, History, Calculus.",
                "`topics` lists up to 5 specific topics the material covers.",
                "`confidence` is a number between 0 and 1.",
            ],
            schema: r#"{
  "subject": "Biology",
  "topics": ["Photosynthesis"],
  "confidence": 0.9
}"#,
        },
    }
}

/// Build the complete instruction string for `mode` around `content`.
///
/// The content is embedded verbatim, even when empty; deciding whether empty
/// input is acceptable belongs to the caller.
pub fn build_prompt(content: &str, mode: ContentMode) -> String {
    let template = template(mode);

    let mut prompt = String::with_capacity(content.len() + 1024);
    prompt.push_str(template.task);
    prompt.push_str("\n\nRules:\n");
    for rule in template.rules {
        prompt.push_str("- ");
        prompt.push_str(rule);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(JSON_ONLY);
    prompt.push_str("\nUse exactly this JSON structure:\n");
    prompt.push_str(template.schema);
    prompt.push_str("\n\n");
    prompt.push_str(match mode {
        ContentMode::TextRecognition => "Additional notes:",
        _ => "Study material:",
    });
    prompt.push_str("\n\"\"\"\n");
    prompt.push_str(content);
    prompt.push_str("\n\"\"\"\n");
    prompt
}
