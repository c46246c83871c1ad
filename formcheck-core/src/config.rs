use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{FileType, SectionTag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Slack applied to every tolerance comparison so decimal boundaries that
/// floats cannot represent exactly (86.4pt / 72 = 1.2in) stay inclusive.
pub const COMPARISON_EPSILON: f64 = 1e-9;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_rule_set_name() -> String {
    "default".to_string()
}

fn default_accepted_file_types() -> Vec<FileType> {
    vec![FileType::Pdf]
}

fn default_font_family_target() -> String {
    "Times New Roman".to_string()
}

fn default_font_family_aliases() -> Vec<String> {
    vec![
        "Times".to_string(),
        "Times-Roman".to_string(),
        "TimesNewRoman".to_string(),
        "Times New Roman".to_string(),
        "TimesNewRomanPSMT".to_string(),
        "TimesNewRomanPS".to_string(),
    ]
}

fn default_numeric_tolerance() -> Option<Tolerance> {
    Some(Tolerance::absolute(1.0))
}

fn default_margin_tolerance() -> Option<Tolerance> {
    Some(Tolerance::absolute(0.2))
}

fn default_points_per_unit() -> f64 {
    72.0 // PDF points per inch
}

fn default_sections() -> Vec<SectionRule> {
    vec![
        SectionRule {
            tag: SectionTag::TechnicalRequirements,
            max_pages: 8,
            keywords: vec![
                r"technical\s+requirements?".to_string(),
                r"technical\s+specifications?".to_string(),
                r"system\s+requirements?".to_string(),
                r"technical\s+details".to_string(),
            ],
            require_present: false,
        },
        SectionRule {
            tag: SectionTag::Budget,
            max_pages: 4,
            keywords: vec![
                "budget".to_string(),
                "financial".to_string(),
                "cost".to_string(),
                "pricing".to_string(),
                r"expenses?".to_string(),
            ],
            require_present: false,
        },
        SectionRule {
            tag: SectionTag::Qualification,
            max_pages: 4,
            keywords: vec![
                r"qualifications?".to_string(),
                r"credentials?".to_string(),
                "experience".to_string(),
                "expertise".to_string(),
                "competenc".to_string(),
            ],
            require_present: false,
        },
    ]
}

// ===== TOLERANCES =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// Fixed deviation in the rule's own unit
    Absolute,
    /// Fraction of the target (0.1 = ±10%)
    Relative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tolerance {
    pub mode: ToleranceMode,
    pub value: f64,
}

impl Tolerance {
    pub fn absolute(value: f64) -> Self {
        Self {
            mode: ToleranceMode::Absolute,
            value,
        }
    }

    pub fn relative(value: f64) -> Self {
        Self {
            mode: ToleranceMode::Relative,
            value,
        }
    }

    /// Largest deviation from `target` that still passes
    pub fn allowed_deviation(&self, target: f64) -> f64 {
        match self.mode {
            ToleranceMode::Absolute => self.value,
            ToleranceMode::Relative => (target * self.value).abs(),
        }
    }
}

/// A numeric target with an optional tolerance. No tolerance means the
/// observed value must match the target exactly; in YAML that is spelled
/// `tolerance: null`, an omitted tolerance keeps ±1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NumericRule {
    pub target: f64,
    #[serde(default = "default_numeric_tolerance")]
    pub tolerance: Option<Tolerance>,
}

impl NumericRule {
    pub fn new(target: f64, tolerance: Option<Tolerance>) -> Self {
        Self { target, tolerance }
    }

    pub fn admits(&self, observed: f64) -> bool {
        let allowed = self
            .tolerance
            .map(|t| t.allowed_deviation(self.target))
            .unwrap_or(0.0);
        (observed - self.target).abs() <= allowed + COMPARISON_EPSILON
    }
}

// ===== INDIVIDUAL RULES =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeRule {
    #[serde(default = "default_accepted_file_types")]
    pub accepted: Vec<FileType>,
}

impl Default for FileTypeRule {
    fn default() -> Self {
        Self {
            accepted: default_accepted_file_types(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FamilyMatch {
    /// Normalized family must equal the target or an alias
    #[default]
    Exact,
    /// Normalized family must start with the target or an alias
    Prefix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontFamilyRule {
    #[serde(default = "default_font_family_target")]
    pub target: String,
    /// Renderer names that count as the target family
    #[serde(default = "default_font_family_aliases")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub match_mode: FamilyMatch,
}

impl Default for FontFamilyRule {
    fn default() -> Self {
        Self {
            target: default_font_family_target(),
            aliases: default_font_family_aliases(),
            match_mode: FamilyMatch::Exact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRule {
    /// Required margin on every side, in rule units
    pub target: f64,
    /// Applied to each side independently; `null` for exact margins
    #[serde(default = "default_margin_tolerance")]
    pub tolerance: Option<Tolerance>,
    /// Points per rule unit (72 = inches)
    #[serde(default = "default_points_per_unit")]
    pub points_per_unit: f64,
}

impl MarginRule {
    pub fn side_rule(&self) -> NumericRule {
        NumericRule::new(self.target, self.tolerance)
    }
}

impl Default for MarginRule {
    fn default() -> Self {
        Self {
            target: 1.0,
            tolerance: default_margin_tolerance(),
            points_per_unit: default_points_per_unit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRule {
    pub tag: SectionTag,
    /// Page budget; counts above this fail, zero tolerance
    pub max_pages: usize,
    /// Case-insensitive regex patterns; any match tags the page
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Fail the section when no page carries its tag
    #[serde(default)]
    pub require_present: bool,
}

// ===== RULE SET =====

/// The complete, explicit rule configuration for one analysis. Passed by
/// reference into the analyzer; nothing in the engine reads global rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "default_rule_set_name")]
    pub name: String,
    #[serde(default)]
    pub file_type: FileTypeRule,
    #[serde(default = "default_font_size_rule")]
    pub font_size: NumericRule,
    #[serde(default)]
    pub font_family: FontFamilyRule,
    #[serde(default)]
    pub margin: MarginRule,
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionRule>,
    /// Run font, margin and section analysis concurrently
    #[serde(default = "default_true")]
    pub parallel_analysis: bool,
    /// Upper bound on document loading, in milliseconds
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,
}

fn default_font_size_rule() -> NumericRule {
    NumericRule::new(12.0, default_numeric_tolerance())
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            name: default_rule_set_name(),
            file_type: FileTypeRule::default(),
            font_size: default_font_size_rule(),
            font_family: FontFamilyRule::default(),
            margin: MarginRule::default(),
            sections: default_sections(),
            parallel_analysis: true,
            load_timeout_ms: None,
        }
    }
}

impl RuleSet {
    /// Load a rule set from a YAML file and validate it
    pub fn load_from_file(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> AnalysisResult<Self> {
        let rules: RuleSet = serde_yaml::from_str(content)
            .map_err(|e| AnalysisError::Config(format!("YAML parse error: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn to_yaml(&self) -> AnalysisResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AnalysisError::Config(format!("YAML serialize error: {e}")))
    }

    /// Load rule set with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!("Failed to load rules from {}: {}; using defaults", p, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn section(&self, tag: SectionTag) -> Option<&SectionRule> {
        self.sections.iter().find(|s| s.tag == tag)
    }

    /// Structural checks. Keyword patterns are compiled (and rejected) when
    /// the section detector is built.
    pub fn validate(&self) -> AnalysisResult<()> {
        let mut seen = BTreeSet::new();
        for section in &self.sections {
            if !seen.insert(section.tag) {
                return Err(AnalysisError::Config(format!(
                    "section '{}' is configured more than once",
                    section.tag
                )));
            }
            if section.keywords.is_empty() {
                tracing::warn!(
                    "Section '{}' has no keywords and will never be detected",
                    section.tag
                );
            }
        }
        for tag in SectionTag::ALL {
            if !seen.contains(&tag) {
                return Err(AnalysisError::Config(format!(
                    "section '{tag}' is missing from the rule set"
                )));
            }
        }

        for (name, tolerance) in [
            ("font_size", self.font_size.tolerance),
            ("margin", self.margin.tolerance),
        ] {
            if let Some(t) = tolerance {
                if !t.value.is_finite() || t.value < 0.0 {
                    return Err(AnalysisError::Config(format!(
                        "{name} tolerance must be a non-negative number, got {}",
                        t.value
                    )));
                }
            }
        }

        if !(self.margin.points_per_unit.is_finite() && self.margin.points_per_unit > 0.0) {
            return Err(AnalysisError::Config(format!(
                "margin.points_per_unit must be positive, got {}",
                self.margin.points_per_unit
            )));
        }

        if self.font_family.target.trim().is_empty() {
            return Err(AnalysisError::Config(
                "font_family.target must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// ===== PROFILES =====

/// Named rule sets, so different callers or tenants can carry their own
/// rules without sharing mutable state.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, RuleSet>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            profiles: HashMap::new(),
        };
        registry.load_builtin_profiles();
        registry
    }

    pub fn get(&self, name: &str) -> Option<&RuleSet> {
        self.profiles.get(name)
    }

    /// Sorted profile names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn insert(&mut self, rules: RuleSet) -> AnalysisResult<()> {
        rules.validate()?;
        self.profiles.insert(rules.name.clone(), rules);
        Ok(())
    }

    /// Register a YAML rule set. A file that leaves `name` at its default is
    /// registered under its file stem instead.
    pub fn load_profile_from_file(&mut self, path: impl AsRef<Path>) -> AnalysisResult<String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut rules: RuleSet = serde_yaml::from_str(&content)
            .map_err(|e| AnalysisError::Config(format!("YAML parse error: {e}")))?;
        if rules.name == default_rule_set_name() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                rules.name = stem.to_string();
            }
        }
        let name = rules.name.clone();
        self.insert(rules)?;
        Ok(name)
    }

    fn load_builtin_profiles(&mut self) {
        self.profiles
            .insert(default_rule_set_name(), RuleSet::default());

        // Strict house style: exact margins, half-point size slack
        let strict = RuleSet {
            name: "strict".to_string(),
            font_size: NumericRule::new(12.0, Some(Tolerance::absolute(0.5))),
            margin: MarginRule {
                target: 1.0,
                tolerance: None,
                points_per_unit: default_points_per_unit(),
            },
            sections: default_sections()
                .into_iter()
                .map(|s| SectionRule {
                    require_present: true,
                    ..s
                })
                .collect(),
            ..RuleSet::default()
        };
        self.profiles.insert(strict.name.clone(), strict);
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
