//! Analysis configuration.
//!
//! The configuration is part of every result cache key, so two requests
//! for the same method under different options never share a result.
//! It can be built programmatically or read from an options file made of
//! `key = value` lines:
//!
//! ```text
//! # comments start with '#' or ';'
//! [*.cs]
//! interprocedural_analysis_kind = context-sensitive
//! max_interprocedural_method_call_chain = 3
//! pessimistic_analysis = default
//! pessimistic_analysis.dispose = false
//! points_to_analysis = true
//! copy_analysis = true
//! value_content_analysis = true
//! ```

use crate::errors::{AnalysisError, AnalysisResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MAX_CALL_CHAIN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum InterproceduralAnalysisKind {
    /// Invocations are never followed.
    None,
    /// Callees are analyzed once per call chain, independently of the
    /// arguments values.
    NonContextSensitive,
    /// Callees are analyzed per call site, with the caller's arguments
    /// values as initial state.
    #[default]
    ContextSensitive,
}

impl fmt::Display for InterproceduralAnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::NonContextSensitive => write!(f, "non-context-sensitive"),
            Self::ContextSensitive => write!(f, "context-sensitive"),
        }
    }
}

impl FromStr for InterproceduralAnalysisKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Ok(Self::None),
            "non-context-sensitive" | "noncontextsensitive" => Ok(Self::NonContextSensitive),
            "context-sensitive" | "contextsensitive" => Ok(Self::ContextSensitive),
            _ => Err(invalid("interprocedural_analysis_kind", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AnalysisKind {
    PointsTo,
    Copy,
    ValueContent,
    Null,
    Dispose,
    ParameterValidation,
}

impl AnalysisKind {
    pub const ALL: [Self; 6] = [
        Self::PointsTo,
        Self::Copy,
        Self::ValueContent,
        Self::Null,
        Self::Dispose,
        Self::ParameterValidation,
    ];
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PointsTo => write!(f, "points-to"),
            Self::Copy => write!(f, "copy"),
            Self::ValueContent => write!(f, "value-content"),
            Self::Null => write!(f, "null"),
            Self::Dispose => write!(f, "dispose"),
            Self::ParameterValidation => write!(f, "parameter-validation"),
        }
    }
}

impl FromStr for AnalysisKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == normalized)
            .ok_or_else(|| invalid("analysis kind", s))
    }
}

/// How unanalyzable code (calls that are not followed) is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum PessimisticMode {
    /// Use the per analysis kind policy, see
    /// [`AnalysisConfig::pessimistic_defaults`].
    #[default]
    Default,
    /// Unknown effects make every reachable value unknown.
    Pessimistic,
    /// Unknown effects are assumed to leave values untouched.
    Optimistic,
}

impl FromStr for PessimisticMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "true" | "pessimistic" => Ok(Self::Pessimistic),
            "false" | "optimistic" => Ok(Self::Optimistic),
            _ => Err(invalid("pessimistic_analysis", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AnalysisConfig {
    pub interprocedural: InterproceduralAnalysisKind,
    /// Maximum length of the call chain followed from the analyzed method.
    pub max_call_chain: usize,
    pub pessimistic: PessimisticMode,
    /// Analysis kinds that run pessimistically in [`PessimisticMode::Default`].
    pub pessimistic_defaults: BTreeSet<AnalysisKind>,
    pub points_to: bool,
    pub copy: bool,
    pub value_content: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interprocedural: InterproceduralAnalysisKind::default(),
            max_call_chain: DEFAULT_MAX_CALL_CHAIN,
            pessimistic: PessimisticMode::default(),
            pessimistic_defaults: AnalysisKind::ALL
                .into_iter()
                .filter(|kind| *kind != AnalysisKind::ParameterValidation)
                .collect(),
            points_to: true,
            copy: true,
            value_content: true,
        }
    }
}

lazy_static! {
    static ref OPTION_LINE: Regex =
        Regex::new(r"^\s*([A-Za-z0-9_.\-]+)\s*=\s*(.*?)\s*$").expect("valid option regex");
}

fn invalid(key: &str, value: &str) -> AnalysisError {
    AnalysisError::InvalidOption {
        key: key.to_string(),
        reason: format!("unexpected value '{value}'"),
    }
}

fn parse_bool(key: &str, value: &str) -> AnalysisResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

impl AnalysisConfig {
    /// Returns whether the given analysis kind treats unanalyzable code
    /// pessimistically.
    #[must_use]
    pub fn is_pessimistic(&self, kind: AnalysisKind) -> bool {
        match self.pessimistic {
            PessimisticMode::Pessimistic => true,
            PessimisticMode::Optimistic => false,
            PessimisticMode::Default => self.pessimistic_defaults.contains(&kind),
        }
    }

    /// Parses an options file content on top of the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidOption`] on unknown keys, invalid
    /// values or lines that are neither comments, sections nor options.
    pub fn from_options(text: &str) -> AnalysisResult<Self> {
        let mut config = Self::default();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with(';')
                || (trimmed.starts_with('[') && trimmed.ends_with(']'))
            {
                continue;
            }
            let captures = OPTION_LINE
                .captures(trimmed)
                .ok_or_else(|| AnalysisError::InvalidOption {
                    key: trimmed.to_string(),
                    reason: "expected 'key = value'".to_string(),
                })?;
            config.apply_option(&captures[1], &captures[2])?;
        }
        Ok(config)
    }

    /// Sets a single option.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidOption`] on unknown keys or invalid values.
    pub fn apply_option(&mut self, key: &str, value: &str) -> AnalysisResult<()> {
        log::trace!("option {key} = {value}");
        match key {
            "interprocedural_analysis_kind" => self.interprocedural = value.parse()?,
            "max_interprocedural_method_call_chain" => {
                self.max_call_chain = value.parse().map_err(|_| invalid(key, value))?;
            }
            "pessimistic_analysis" => self.pessimistic = value.parse()?,
            "points_to_analysis" => self.points_to = parse_bool(key, value)?,
            "copy_analysis" => self.copy = parse_bool(key, value)?,
            "value_content_analysis" => self.value_content = parse_bool(key, value)?,
            _ => {
                let kind = key
                    .strip_prefix("pessimistic_analysis.")
                    .ok_or_else(|| AnalysisError::InvalidOption {
                        key: key.to_string(),
                        reason: "unknown option".to_string(),
                    })?
                    .parse::<AnalysisKind>()?;
                if parse_bool(key, value)? {
                    self.pessimistic_defaults.insert(kind);
                } else {
                    self.pessimistic_defaults.remove(&kind);
                }
            }
        }
        Ok(())
    }
}
