//! Catalog-wide plausibility audit.
//!
//! Every item is checked against the nutrition invariants: non-negative
//! values, sugar and fiber within carbs, calories consistent with macros and
//! within a range plausible for the category, confidence within 0-100.

mod fix;

pub use fix::{FixSummary, apply_fixes};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{info, instrument};

use crate::catalog::{
    CatalogError, CatalogRepository, Category, MenuItem, NutrientField, NutritionRecord,
};

/// Minimum absolute calorie gap reported as a mismatch.
pub const CALORIC_MISMATCH_MIN_KCAL: f64 = 50.0;

/// Relative calorie gap reported as a mismatch.
pub const CALORIC_MISMATCH_RATIO: f64 = 0.20;

/// Valid confidence score range.
pub const CONFIDENCE_RANGE: (i64, i64) = (0, 100);

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditRule {
    NegativeValue,
    SugarExceedsCarbs,
    FiberExceedsCarbs,
    CaloricMismatch,
    CalorieOutOfRange,
    ConfidenceOutOfRange,
    MissingNutrition,
}

impl AuditRule {
    /// All rules, in the order they are checked and fixed.
    pub const ALL: [Self; 7] = [
        Self::NegativeValue,
        Self::SugarExceedsCarbs,
        Self::FiberExceedsCarbs,
        Self::CaloricMismatch,
        Self::CalorieOutOfRange,
        Self::ConfidenceOutOfRange,
        Self::MissingNutrition,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegativeValue => "negative_value",
            Self::SugarExceedsCarbs => "sugar_exceeds_carbs",
            Self::FiberExceedsCarbs => "fiber_exceeds_carbs",
            Self::CaloricMismatch => "caloric_mismatch",
            Self::CalorieOutOfRange => "calorie_out_of_range",
            Self::ConfidenceOutOfRange => "confidence_out_of_range",
            Self::MissingNutrition => "missing_nutrition",
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::NegativeValue
            | Self::SugarExceedsCarbs
            | Self::FiberExceedsCarbs
            | Self::ConfidenceOutOfRange => Severity::Error,
            Self::CaloricMismatch | Self::CalorieOutOfRange => Severity::Warning,
            Self::MissingNutrition => Severity::Info,
        }
    }
}

impl fmt::Display for AuditRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plausible calorie bounds (kcal) for a category.
#[must_use]
pub fn category_bounds(category: Category) -> (f64, f64) {
    match category {
        Category::Beverage => (0.0, 1200.0),
        Category::Dessert => (50.0, 1800.0),
        Category::Side => (20.0, 1200.0),
        Category::Snack => (50.0, 1500.0),
        Category::Entree => (150.0, 2500.0),
    }
}

/// Returns `true` when stated and expected calories disagree by more than
/// `max(50, 20% of the larger)`.
#[must_use]
pub fn is_caloric_mismatch(calories: f64, expected: f64) -> bool {
    let tolerance = CALORIC_MISMATCH_MIN_KCAL.max(CALORIC_MISMATCH_RATIO * calories.max(expected));
    (calories - expected).abs() > tolerance
}

/// One rule violation on one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub menu_item_id: i64,
    pub item_name: String,
    pub rule: AuditRule,
    /// Nutrient the finding is about, when it concerns a single one.
    pub field: Option<NutrientField>,
    pub message: String,
}

impl Finding {
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.rule.severity()
    }
}

fn finding(item: &MenuItem, rule: AuditRule, field: Option<NutrientField>, message: String) -> Finding {
    Finding {
        menu_item_id: item.id,
        item_name: item.name.clone(),
        rule,
        field,
        message,
    }
}

/// Checks one item and its nutrition, returning findings in rule order.
#[must_use]
pub fn audit_item(item: &MenuItem, nutrition: Option<&NutritionRecord>) -> Vec<Finding> {
    let Some(record) = nutrition else {
        return vec![finding(
            item,
            AuditRule::MissingNutrition,
            None,
            "no nutrition data".to_string(),
        )];
    };
    let facts = record.facts();
    let mut findings = Vec::new();

    for field in NutrientField::ALL {
        if let Some(value) = field.get(&facts)
            && value < 0.0
        {
            findings.push(finding(
                item,
                AuditRule::NegativeValue,
                Some(field),
                format!("{field} is negative ({value})"),
            ));
        }
    }

    if let Some(carbs) = facts.carbs {
        if let Some(sugar) = facts.sugar
            && sugar > carbs
        {
            findings.push(finding(
                item,
                AuditRule::SugarExceedsCarbs,
                Some(NutrientField::Sugar),
                format!("sugar {sugar} g exceeds carbs {carbs} g"),
            ));
        }
        if let Some(fiber) = facts.fiber
            && fiber > carbs
        {
            findings.push(finding(
                item,
                AuditRule::FiberExceedsCarbs,
                Some(NutrientField::Fiber),
                format!("fiber {fiber} g exceeds carbs {carbs} g"),
            ));
        }
    }

    if let (Some(calories), Some(expected)) = (facts.calories, facts.expected_calories())
        && is_caloric_mismatch(calories, expected)
    {
        findings.push(finding(
            item,
            AuditRule::CaloricMismatch,
            Some(NutrientField::Calories),
            format!("{calories} kcal stated, macros imply {expected:.0} kcal"),
        ));
    }

    if let Some(calories) = facts.calories {
        let category = item.category();
        let (low, high) = category_bounds(category);
        if calories < low || calories > high {
            findings.push(finding(
                item,
                AuditRule::CalorieOutOfRange,
                Some(NutrientField::Calories),
                format!("{calories} kcal outside {low:.0}-{high:.0} for {category}"),
            ));
        }
    }

    let (low, high) = CONFIDENCE_RANGE;
    if !(low..=high).contains(&record.confidence_score) {
        findings.push(finding(
            item,
            AuditRule::ConfidenceOutOfRange,
            None,
            format!("confidence {} outside {low}-{high}", record.confidence_score),
        ));
    }

    findings
}

/// Findings across the catalog with per-rule and per-severity counts.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub items_checked: usize,
    pub findings: Vec<Finding>,
    pub by_rule: BTreeMap<&'static str, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl AuditReport {
    /// Builds a report from findings, computing the counts.
    #[must_use]
    pub fn from_findings(items_checked: usize, findings: Vec<Finding>) -> Self {
        let mut by_rule = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for finding in &findings {
            *by_rule.entry(finding.rule.as_str()).or_insert(0) += 1;
            *by_severity.entry(finding.severity()).or_insert(0) += 1;
        }
        Self {
            items_checked,
            findings,
            by_rule,
            by_severity,
        }
    }

    /// Number of findings for one rule.
    #[must_use]
    pub fn count(&self, rule: AuditRule) -> usize {
        self.by_rule.get(rule.as_str()).copied().unwrap_or(0)
    }

    /// Number of findings at one severity.
    #[must_use]
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Returns `true` when any error-level finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count_severity(Severity::Error) > 0
    }
}

/// Audits every item in the catalog.
///
/// # Errors
///
/// Returns [`CatalogError`] if the catalog cannot be read.
#[instrument(skip(repo))]
pub async fn audit_catalog(repo: &dyn CatalogRepository) -> Result<AuditReport, CatalogError> {
    let items = repo.list_menu_items().await?;
    let nutrition: HashMap<i64, NutritionRecord> = repo
        .list_nutrition()
        .await?
        .into_iter()
        .map(|record| (record.menu_item_id, record))
        .collect();

    let findings: Vec<Finding> = items
        .iter()
        .flat_map(|item| audit_item(item, nutrition.get(&item.id)))
        .collect();
    let report = AuditReport::from_findings(items.len(), findings);

    info!(
        items = report.items_checked,
        findings = report.findings.len(),
        errors = report.count_severity(Severity::Error),
        warnings = report.count_severity(Severity::Warning),
        "catalog audited"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{NutritionFacts, NutritionSource};

    fn item(category: Category) -> MenuItem {
        MenuItem {
            id: 1,
            restaurant_id: 1,
            name: "Test Item".to_string(),
            description: None,
            price: None,
            photo_url: None,
            category_str: category.as_str().to_string(),
            is_fried: false,
            is_vegetarian: false,
            name_key: "test item".to_string(),
        }
    }

    fn record(facts: NutritionFacts, confidence: i64) -> NutritionRecord {
        NutritionRecord {
            menu_item_id: 1,
            calories: facts.calories,
            carbs: facts.carbs,
            fat: facts.fat,
            protein: facts.protein,
            sugar: facts.sugar,
            fiber: facts.fiber,
            sodium: facts.sodium,
            cholesterol: facts.cholesterol,
            alcohol_grams: facts.alcohol_grams,
            source_str: NutritionSource::Crowdsourced.as_str().to_string(),
            confidence_score: confidence,
        }
    }

    fn rules(findings: &[Finding]) -> Vec<AuditRule> {
        findings.iter().map(|f| f.rule).collect()
    }

    #[test]
    fn test_missing_nutrition_is_info() {
        let findings = audit_item(&item(Category::Entree), None);
        assert_eq!(rules(&findings), vec![AuditRule::MissingNutrition]);
        assert_eq!(findings[0].severity(), Severity::Info);
    }

    #[test]
    fn test_consistent_record_has_no_findings() {
        // 4*30 + 4*60 + 9*20 = 540
        let facts = NutritionFacts {
            calories: Some(550.0),
            protein: Some(30.0),
            carbs: Some(60.0),
            fat: Some(20.0),
            sugar: Some(8.0),
            fiber: Some(4.0),
            ..NutritionFacts::default()
        };
        assert!(audit_item(&item(Category::Entree), Some(&record(facts, 60))).is_empty());
    }

    #[test]
    fn test_rules_fire_in_order() {
        let facts = NutritionFacts {
            calories: Some(3000.0),
            protein: Some(-5.0),
            carbs: Some(10.0),
            fat: Some(10.0),
            sugar: Some(15.0),
            fiber: Some(12.0),
            ..NutritionFacts::default()
        };
        let findings = audit_item(&item(Category::Entree), Some(&record(facts, 140)));
        assert_eq!(
            rules(&findings),
            vec![
                AuditRule::NegativeValue,
                AuditRule::SugarExceedsCarbs,
                AuditRule::FiberExceedsCarbs,
                AuditRule::CaloricMismatch,
                AuditRule::CalorieOutOfRange,
                AuditRule::ConfidenceOutOfRange,
            ]
        );
        assert_eq!(findings[0].field, Some(NutrientField::Protein));
    }

    #[test]
    fn test_caloric_mismatch_tolerance() {
        // Small items: the 50 kcal floor applies.
        assert!(!is_caloric_mismatch(100.0, 145.0));
        assert!(is_caloric_mismatch(100.0, 151.0));
        // Large items: 20% of the larger value applies.
        assert!(!is_caloric_mismatch(1000.0, 820.0));
        assert!(is_caloric_mismatch(1000.0, 790.0));
    }

    #[test]
    fn test_mismatch_needs_all_macros() {
        let facts = NutritionFacts {
            calories: Some(900.0),
            protein: Some(1.0),
            carbs: Some(1.0),
            ..NutritionFacts::default()
        };
        let findings = audit_item(&item(Category::Entree), Some(&record(facts, 50)));
        assert!(!rules(&findings).contains(&AuditRule::CaloricMismatch));
    }

    #[test]
    fn test_category_bounds_apply() {
        let facts = NutritionFacts {
            calories: Some(100.0),
            ..NutritionFacts::default()
        };
        let entree = audit_item(&item(Category::Entree), Some(&record(facts, 50)));
        assert_eq!(rules(&entree), vec![AuditRule::CalorieOutOfRange]);
        let side = audit_item(&item(Category::Side), Some(&record(facts, 50)));
        assert!(side.is_empty());
    }

    #[test]
    fn test_report_counts() {
        let mut findings = audit_item(&item(Category::Entree), None);
        findings.extend(audit_item(
            &item(Category::Beverage),
            Some(&record(
                NutritionFacts {
                    sugar: Some(-1.0),
                    ..NutritionFacts::default()
                },
                -3,
            )),
        ));
        let report = AuditReport::from_findings(2, findings);
        assert_eq!(report.count(AuditRule::MissingNutrition), 1);
        assert_eq!(report.count(AuditRule::NegativeValue), 1);
        assert_eq!(report.count(AuditRule::ConfidenceOutOfRange), 1);
        assert_eq!(report.count_severity(Severity::Error), 2);
        assert_eq!(report.count_severity(Severity::Info), 1);
        assert!(report.has_errors());
    }
}
