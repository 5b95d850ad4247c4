//! Prompt templates
//!
//! A template turns rendered codebase context into the text sent to a backend.
//! Each template knows three shapes: the whole context in one call, one chunk
//! of a multi-call run, and the synthesis of all chunk results.

use warden_core::CallResult;

/// Builds prompts for one kind of request.
pub trait PromptTemplate: Send + Sync {
    /// Prompt embedding the complete rendered context.
    fn full_prompt(&self, context: &str) -> String;

    /// Prompt for chunk `index` (1-based) of `total`.
    fn chunk_prompt(&self, context: &str, index: usize, total: usize) -> String;

    /// Prompt combining chunk results, labelled by chunk number in order.
    fn synthesis_prompt(&self, results: &[CallResult]) -> String;

    /// Template text that is present regardless of context.
    ///
    /// Subtracted from the input budget when sizing the context, so it must
    /// be at least as long as every prompt shape that embeds context. The
    /// default takes the longer of the full prompt and a chunk prompt with
    /// the widest possible part numbers.
    fn fixed_text(&self) -> String {
        let full = self.full_prompt("");
        let chunk = self.chunk_prompt("", usize::MAX, usize::MAX);
        if chunk.chars().count() > full.chars().count() {
            chunk
        } else {
            full
        }
    }
}

/// `### Chunk {n}` sections in ordinal order.
fn render_results(results: &[CallResult]) -> String {
    results
        .iter()
        .map(|result| format!("### Chunk {}\n{}", result.ordinal, result.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// RUN RULE
// ============================================================================

/// Applies an existing rule to the codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRulePrompt {
    pub rule_content: String,
}

impl RunRulePrompt {
    pub fn new(rule_content: impl Into<String>) -> Self {
        Self {
            rule_content: rule_content.into(),
        }
    }
}

const RUN_RULE_STEPS: &str = "Execute this rule step by step:\n\
1. Analyze the codebase context against the rule requirements\n\
2. Identify what needs to be done according to the rule\n\
3. Provide specific, actionable guidance\n\
4. If code changes are needed, provide the complete updated code\n\
5. Follow the implementation checklist in the rule\n\n\
Be thorough and specific. Focus on security best practices.";

impl PromptTemplate for RunRulePrompt {
    fn full_prompt(&self, context: &str) -> String {
        format!(
            "You are executing a Secure Flow security rule. Follow the rule instructions \
             precisely and apply them to the provided codebase context.\n\n\
             ## Rule to Execute:\n{}\n\n\
             ## Codebase Context:\n{}\n\n{}",
            self.rule_content, context, RUN_RULE_STEPS
        )
    }

    fn chunk_prompt(&self, context: &str, index: usize, total: usize) -> String {
        format!(
            "You are executing a Secure Flow security rule against part {index} of {total} \
             of a codebase. You only see this part; other parts are reviewed separately and \
             the findings are combined afterwards.\n\n\
             ## Rule to Execute:\n{rule}\n\n\
             ## Codebase Context (part {index} of {total}):\n{context}\n\n\
             Report every finding for the files in this part, with concrete fixes. \
             Do not speculate about files you cannot see.",
            rule = self.rule_content,
        )
    }

    fn synthesis_prompt(&self, results: &[CallResult]) -> String {
        format!(
            "You executed a Secure Flow security rule over a codebase split into {} parts. \
             Combine the partial results below into one coherent answer. Merge duplicate \
             findings, keep every distinct finding and preserve file references.\n\n\
             ## Rule:\n{}\n\n\
             ## Partial Results:\n{}\n\n{}",
            results.len(),
            self.rule_content,
            render_results(results),
            RUN_RULE_STEPS
        )
    }
}

// ============================================================================
// GENERATE RULE
// ============================================================================

/// Drafts a new rule file from a name, description and example code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRulePrompt {
    pub rule_name: String,
    pub description: String,
    pub languages: Vec<String>,
}

impl GenerateRulePrompt {
    pub fn new(
        rule_name: impl Into<String>,
        description: impl Into<String>,
        languages: Vec<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            description: description.into(),
            languages,
        }
    }

    /// `secure-flow-` followed by the lowercased, hyphen-joined rule name.
    pub fn rule_id(&self) -> String {
        let slug = self
            .rule_name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        format!("secure-flow-{}", slug)
    }

    fn header(&self) -> String {
        format!(
            "You are creating a security rule for Secure Flow, a security framework for AI \
             coding agents.\n\n\
             Rule Name: {}\nDescription: {}\nTarget Languages: {}\n\n",
            self.rule_name,
            self.description,
            self.languages.join(", ")
        )
    }

    fn structure(&self) -> String {
        format!(
            "Create a complete rule file following this structure:\n\n\
             1. Frontmatter (YAML between --- markers):\n   \
             - description: Brief description of the rule\n   \
             - languages: List of applicable languages\n   \
             - alwaysApply: false (boolean)\n\n\
             2. Content:\n   \
             - rule_id: {}\n   \
             - Title as H2 heading\n   \
             - Detailed description\n   \
             - Sections with subsections (use ### for subsections)\n   \
             - Implementation Checklist at the end with checkboxes\n\n\
             Return ONLY the complete markdown file content, starting with the frontmatter.",
            self.rule_id()
        )
    }
}

impl PromptTemplate for GenerateRulePrompt {
    fn full_prompt(&self, context: &str) -> String {
        format!(
            "{}Relevant Codebase Context:\n{}\n\n{}",
            self.header(),
            context,
            self.structure()
        )
    }

    fn chunk_prompt(&self, context: &str, index: usize, total: usize) -> String {
        format!(
            "{}This is part {index} of {total} of the relevant codebase. Do not write the \
             rule yet. List the security-relevant patterns, risks and conventions in this \
             part that the rule should cover.\n\n\
             Relevant Codebase Context (part {index} of {total}):\n{context}",
            self.header(),
        )
    }

    fn synthesis_prompt(&self, results: &[CallResult]) -> String {
        format!(
            "{}The codebase was reviewed in {} parts. Notes from each part:\n\n{}\n\n{}",
            self.header(),
            results.len(),
            render_results(results),
            self.structure()
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
