// Category profiles
// Each search category ships its own canonical schema: which locale column
// variants fold together, what gets backfilled, and which columns get
// typed. The pipeline itself never knows a category's field names.

use crate::normalize::{BackfillRule, CoercionRule, ColumnType};
use crate::pipeline::RunConfig;
use crate::reconcile::SynonymGroup;

/// Four-digit year anywhere in a listing title ("Catalina 30 1999").
pub const TITLE_YEAR_PATTERN: &str = r"\b((?:19|20)\d{2})\b";

/// Declarative normalization profile for one search category.
#[derive(Debug, Clone)]
pub struct CategoryProfile {
    /// Category code as it appears in the source's URLs (e.g. "boo").
    pub code: &'static str,
    pub name: &'static str,
    pub synonym_groups: Vec<SynonymGroup>,
    pub backfill_rules: Vec<BackfillRule>,
    pub coercion_rules: Vec<CoercionRule>,
}

impl CategoryProfile {
    /// Start a run configuration carrying this profile's rules. Cities and
    /// extra filters are the caller's to add.
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.code)
            .with_synonym_groups(self.synonym_groups.clone())
            .with_backfill_rules(self.backfill_rules.clone())
            .with_coercion_rules(self.coercion_rules.clone())
    }
}

/// Coercions every category shares: listing envelope fields the source
/// emits regardless of category.
fn common_coercions() -> Vec<CoercionRule> {
    vec![
        CoercionRule::new("name", ColumnType::TrimmedString),
        CoercionRule::new("url", ColumnType::TrimmedString),
        CoercionRule::new("where", ColumnType::TrimmedString),
        CoercionRule::new("body", ColumnType::TrimmedString),
        CoercionRule::new("repost_of", ColumnType::TrimmedString),
        CoercionRule::new("price", ColumnType::Float),
        CoercionRule::new("id", ColumnType::Int),
        CoercionRule::new("datetime", ColumnType::DateTime),
        CoercionRule::new("last_updated", ColumnType::DateTime),
        CoercionRule::new("created", ColumnType::DateTime),
        CoercionRule::new("has_image", ColumnType::Bool),
    ]
}

/// Sailboats and power boats ("boo"). The source mixes English and Spanish
/// attribute keys freely, so this is the profile with the most folding.
pub fn boats() -> CategoryProfile {
    let mut coercion_rules = common_coercions();
    coercion_rules.extend([
        CoercionRule::new("condition", ColumnType::TrimmedString),
        CoercionRule::new("make / manufacturer", ColumnType::TrimmedString),
        CoercionRule::new("model name / number", ColumnType::TrimmedString),
        CoercionRule::new("boat_propulsion_type", ColumnType::TrimmedString),
        CoercionRule::new("propulsion type", ColumnType::TrimmedString),
        CoercionRule::new("length overall (LOA)", ColumnType::Float),
        CoercionRule::new("engine hours (total)", ColumnType::Float),
        CoercionRule::new("year manufactured", ColumnType::Int),
    ]);

    CategoryProfile {
        code: "boo",
        name: "boats",
        synonym_groups: vec![
            SynonymGroup::new(
                "year manufactured",
                &["mfg_year", "año de fabricación"],
            ),
            SynonymGroup::new("condition", &["condición"]),
            SynonymGroup::new(
                "engine hours (total)",
                &["horas del motor (en total)"],
            ),
            SynonymGroup::new("make / manufacturer", &["marca / fabricante"]),
            SynonymGroup::new(
                "model name / number",
                &["nombre / número de modelo"],
            ),
            SynonymGroup::new("boat_propulsion_type", &["tipo de propulsión"]),
            SynonymGroup::new("length overall (LOA)", &["longitud total"]),
        ],
        backfill_rules: vec![BackfillRule::new(
            "year manufactured",
            "name",
            TITLE_YEAR_PATTERN,
        )],
        coercion_rules,
    }
}

/// Bikes ("bia"). No locale folding mapped out yet; envelope typing only.
pub fn bikes() -> CategoryProfile {
    CategoryProfile {
        code: "bia",
        name: "bikes",
        synonym_groups: vec![SynonymGroup::new("condition", &["condición"])],
        backfill_rules: Vec::new(),
        coercion_rules: common_coercions(),
    }
}

/// RVs ("rva").
pub fn rvs() -> CategoryProfile {
    CategoryProfile {
        code: "rva",
        name: "rvs",
        synonym_groups: vec![SynonymGroup::new("condition", &["condición"])],
        backfill_rules: vec![BackfillRule::new(
            "year manufactured",
            "name",
            TITLE_YEAR_PATTERN,
        )],
        coercion_rules: common_coercions(),
    }
}

/// Real estate ("rea").
pub fn properties() -> CategoryProfile {
    CategoryProfile {
        code: "rea",
        name: "properties",
        synonym_groups: Vec::new(),
        backfill_rules: Vec::new(),
        coercion_rules: common_coercions(),
    }
}

/// Look up a profile by category code or name.
pub fn profile_for(category: &str) -> Option<CategoryProfile> {
    match category {
        "boo" | "boats" => Some(boats()),
        "bia" | "bikes" => Some(bikes()),
        "rva" | "rvs" => Some(rvs()),
        "rea" | "properties" => Some(properties()),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
