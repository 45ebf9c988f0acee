//! System prompts and aggregation content for judge calls.

use std::fmt::Write as _;

use crate::domain::models::chunk::AppUsageStats;
use crate::domain::models::criteria::EvaluationCriteria;
use crate::domain::models::trajectory::TrajectoryMeta;
use crate::services::content_sanitizer::ContentSanitizer;

const EVIDENCE_HIERARCHY: &str = "\
Evidence hierarchy:
1. PRIMARY: screenshots and recorded user actions. Base every claim on what they show.
2. SECONDARY: application-focus signals. Use them to corroborate primary evidence, never to override it.
If the primary evidence is ambiguous, say so and lower your confidence instead of guessing.";

const PRIVATE_REASONING_RULE: &str = "\
Do not reveal private chain-of-thought or scratch work. Report only conclusions and the observable \
evidence supporting them, in the fields requested.";

/// Builds the text that frames each judge call.
///
/// All trajectory-derived strings are sanitized here, so callers can pass raw
/// metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder {
    sanitizer: ContentSanitizer,
}

impl PromptBuilder {
    pub const fn new(sanitizer: ContentSanitizer) -> Self {
        Self { sanitizer }
    }

    /// System prompt for one evaluation window.
    ///
    /// `previous_summary` is the running summary from the prior window, if any.
    pub fn chunk_system_prompt(
        &self,
        meta: &TrajectoryMeta,
        criteria: &EvaluationCriteria,
        window: usize,
        total_windows: usize,
        previous_summary: Option<&str>,
    ) -> String {
        let mut prompt = String::from(
            "You are an impartial judge reviewing a recorded computer-use session one segment at a time.\n\n",
        );
        self.push_task(&mut prompt, meta);
        push_rubric(&mut prompt, criteria);
        prompt.push_str(EVIDENCE_HIERARCHY);
        prompt.push_str("\n\n");

        let _ = writeln!(prompt, "You are viewing segment {} of {}.", window + 1, total_windows);
        match previous_summary.and_then(|s| self.sanitizer.summary(s)) {
            Some(summary) => {
                let _ = writeln!(prompt, "Running summary of the session so far:\n{summary}\n");
                prompt.push_str(
                    "Extend this summary with what happens in the new segment. Keep earlier facts unless the new evidence contradicts them.\n\n",
                );
            }
            None => prompt.push_str("This is the first segment; start the running summary.\n\n"),
        }

        prompt.push_str(PRIVATE_REASONING_RULE);
        prompt.push_str("\nRespond only by calling the provided tool with a concise running `summary`.");
        prompt
    }

    /// System prompt for the final aggregation call.
    pub fn final_system_prompt(&self, meta: &TrajectoryMeta, criteria: &EvaluationCriteria) -> String {
        let mut prompt = String::from(
            "You are an impartial judge producing the final evaluation of a recorded computer-use session from per-segment summaries.\n\n",
        );
        self.push_task(&mut prompt, meta);
        push_rubric(&mut prompt, criteria);
        prompt.push_str(EVIDENCE_HIERARCHY);
        prompt.push_str("\n\n");
        prompt.push_str(
            "Score each component as an integer from 0 to 100 and justify every score in its own field. \
`confidence` reflects how well the evidence supports your scores. \
`observations` must be 2 to 6 bullet points, one per line, each starting with \"- \".\n\n",
        );
        prompt.push_str(PRIVATE_REASONING_RULE);
        prompt.push_str("\nRespond only by calling the provided tool.");
        prompt
    }

    /// User content for the final call: ordered summaries, app usage and target app.
    pub fn final_user_content(
        &self,
        summaries: &[String],
        app_usage: &AppUsageStats,
        target_app: Option<&str>,
    ) -> String {
        let mut content = String::from("Segment summaries in recording order:\n\n");
        let total = summaries.len();
        for (i, summary) in summaries.iter().enumerate() {
            let summary = self.sanitizer.summary(summary).unwrap_or_default();
            let _ = writeln!(content, "Chunk {}/{}: {}\n", i + 1, total, summary);
        }

        if app_usage.is_empty() {
            content.push_str("Application usage: no focus data recorded.\n");
        } else {
            let _ = writeln!(
                content,
                "Application usage across the session ({} focus observations):",
                app_usage.total
            );
            for (app, count) in app_usage.ranked() {
                let share = app_usage.percentage(app);
                let app = self.sanitizer.note(app).unwrap_or_default();
                let _ = writeln!(content, "- {app}: {count} ({share:.1}%)");
            }
        }

        if let Some(target) = target_app.and_then(|t| self.sanitizer.note(t)) {
            let _ = writeln!(content, "\nTarget application: {target}");
        }
        content
    }

    fn push_task(&self, prompt: &mut String, meta: &TrajectoryMeta) {
        prompt.push_str("Task context:\n");
        let _ = writeln!(prompt, "- Session: {}", meta.session_id);
        if let Some(task) = meta.task_description.as_deref().and_then(|t| self.sanitizer.text(t)) {
            let _ = writeln!(prompt, "- Task: {task}");
        }
        if let Some(platform) = meta.platform.as_deref().and_then(|p| self.sanitizer.note(p)) {
            let _ = writeln!(prompt, "- Platform: {platform}");
        }
        if let Some(quest) = &meta.quest {
            if let Some(title) = self.sanitizer.note(&quest.title) {
                let _ = writeln!(prompt, "- Quest: {title}");
            }
            if let Some(app) = quest.target_app.as_deref().and_then(|a| self.sanitizer.note(a)) {
                let _ = writeln!(prompt, "- Target application: {app}");
            }
            for objective in quest.objectives.iter().filter_map(|o| self.sanitizer.text(o)) {
                let _ = writeln!(prompt, "  - Objective: {objective}");
            }
        }
        let requirements: Vec<String> = meta
            .requirements()
            .iter()
            .filter_map(|r| self.sanitizer.text(r))
            .collect();
        if !requirements.is_empty() {
            prompt.push_str("- Required actions:\n");
            for requirement in requirements {
                let _ = writeln!(prompt, "  - {requirement}");
            }
        }
        prompt.push('\n');
    }
}

fn push_rubric(prompt: &mut String, criteria: &EvaluationCriteria) {
    let _ = writeln!(
        prompt,
        "Scoring rubric (weights sum to 100):\n\
- Outcome achievement ({:.0}%): did the user accomplish the task?\n\
- Process quality ({:.0}%): were the steps sensible, deliberate and free of avoidable errors?\n\
- Efficiency ({:.0}%): was the task done without unnecessary detours or repetition?\n",
        criteria.outcome_achievement, criteria.process_quality, criteria.efficiency
    );
}
