//! Catalog row types and the nutrition value object.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Menu category used for plausibility bounds and estimator weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Entree,
    Dessert,
    Beverage,
    Side,
    Snack,
}

impl Category {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entree => "entree",
            Self::Dessert => "dessert",
            Self::Beverage => "beverage",
            Self::Side => "side",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entree" => Ok(Self::Entree),
            "dessert" => Ok(Self::Dessert),
            "beverage" => Ok(Self::Beverage),
            "side" => Ok(Self::Side),
            "snack" => Ok(Self::Snack),
            _ => Err(format!("invalid category: {s}")),
        }
    }
}

/// Where a nutrition record's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutritionSource {
    /// Published by the park operator.
    Official,
    /// Looked up from a nutrition API.
    ApiLookup,
    /// Reported by guests or aggregator sites.
    Crowdsourced,
    /// Computed by the estimator from similar items.
    Estimated,
}

impl NutritionSource {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::ApiLookup => "api_lookup",
            Self::Crowdsourced => "crowdsourced",
            Self::Estimated => "estimated",
        }
    }
}

impl fmt::Display for NutritionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NutritionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "official" => Ok(Self::Official),
            "api_lookup" => Ok(Self::ApiLookup),
            "crowdsourced" => Ok(Self::Crowdsourced),
            "estimated" => Ok(Self::Estimated),
            _ => Err(format!("invalid nutrition source: {s}")),
        }
    }
}

/// Allergen classes tracked per menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergenType {
    Milk,
    Egg,
    Wheat,
    Soy,
    Peanut,
    TreeNut,
    Fish,
    Shellfish,
    Sesame,
}

impl AllergenType {
    /// All allergen types, in storage order.
    pub const ALL: [Self; 9] = [
        Self::Milk,
        Self::Egg,
        Self::Wheat,
        Self::Soy,
        Self::Peanut,
        Self::TreeNut,
        Self::Fish,
        Self::Shellfish,
        Self::Sesame,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Milk => "milk",
            Self::Egg => "egg",
            Self::Wheat => "wheat",
            Self::Soy => "soy",
            Self::Peanut => "peanut",
            Self::TreeNut => "tree_nut",
            Self::Fish => "fish",
            Self::Shellfish => "shellfish",
            Self::Sesame => "sesame",
        }
    }
}

impl fmt::Display for AllergenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AllergenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("invalid allergen type: {s}"))
    }
}

/// How certain an allergen edge is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergenSeverity {
    MayContain,
    Contains,
}

impl AllergenSeverity {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MayContain => "may_contain",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for AllergenSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AllergenSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(Self::Contains),
            "may_contain" => Ok(Self::MayContain),
            _ => Err(format!("invalid allergen severity: {s}")),
        }
    }
}

/// Reads `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A theme park.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Park {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub timezone: Option<String>,
    /// Normalized name; identity key.
    #[serde(default)]
    pub name_key: String,
}

/// A dining location inside a park.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub park_id: i64,
    pub name: String,
    /// Land or area within the park, when known.
    pub land: Option<String>,
    #[serde(default)]
    pub name_key: String,
}

/// A single dish or drink on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub photo_url: Option<String>,
    /// Category stored as text, parsed via `category()`.
    #[sqlx(rename = "category")]
    #[serde(rename = "category", default, deserialize_with = "null_as_default")]
    pub category_str: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_fried: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_vegetarian: bool,
    #[serde(default)]
    pub name_key: String,
}

impl MenuItem {
    /// Returns the parsed category.
    ///
    /// Falls back to `Entree` if the stored value is invalid.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category_str.parse().unwrap_or(Category::Entree)
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MenuItem {{ id: {}, name: {}, category: {} }}",
            self.id,
            self.name,
            self.category()
        )
    }
}

/// Fields for creating a menu item.
#[derive(Debug, Clone)]
pub struct NewMenuItem<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: Option<f64>,
    pub photo_url: Option<&'a str>,
    pub category: Category,
    pub is_fried: bool,
    pub is_vegetarian: bool,
}

/// Nutrient values for one serving. Missing values are `None`, not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub sugar: Option<f64>,
    #[serde(default)]
    pub fiber: Option<f64>,
    #[serde(default)]
    pub sodium: Option<f64>,
    #[serde(default)]
    pub cholesterol: Option<f64>,
    #[serde(default)]
    pub alcohol_grams: Option<f64>,
}

/// kcal per gram of protein and carbohydrate.
pub const KCAL_PER_GRAM_PROTEIN_CARB: f64 = 4.0;
/// kcal per gram of fat.
pub const KCAL_PER_GRAM_FAT: f64 = 9.0;
/// kcal per gram of alcohol.
pub const KCAL_PER_GRAM_ALCOHOL: f64 = 7.0;

impl NutritionFacts {
    /// Calories implied by the macros (Atwater factors).
    ///
    /// `None` unless protein, carbs and fat are all present. Alcohol counts
    /// when present.
    #[must_use]
    pub fn expected_calories(&self) -> Option<f64> {
        let (protein, carbs, fat) = (self.protein?, self.carbs?, self.fat?);
        let alcohol = self.alcohol_grams.unwrap_or(0.0);
        Some(
            KCAL_PER_GRAM_PROTEIN_CARB * (protein + carbs)
                + KCAL_PER_GRAM_FAT * fat
                + KCAL_PER_GRAM_ALCOHOL * alcohol,
        )
    }

    /// Returns `true` when no nutrient is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        NutrientField::ALL.iter().all(|field| field.get(self).is_none())
    }

    /// Checks the write-time invariants: non-negative values, sugar and fiber
    /// not above carbs.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        for field in NutrientField::ALL {
            if let Some(value) = field.get(self)
                && (value < 0.0 || !value.is_finite())
            {
                return Err(format!("{} must be a non-negative number, got {value}", field.column()));
            }
        }
        if let (Some(sugar), Some(carbs)) = (self.sugar, self.carbs)
            && sugar > carbs
        {
            return Err(format!("sugar ({sugar}) exceeds carbs ({carbs})"));
        }
        if let (Some(fiber), Some(carbs)) = (self.fiber, self.carbs)
            && fiber > carbs
        {
            return Err(format!("fiber ({fiber}) exceeds carbs ({carbs})"));
        }
        Ok(())
    }
}

/// One nutrient column. Used to address fields generically in audits and fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientField {
    Calories,
    Carbs,
    Fat,
    Protein,
    Sugar,
    Fiber,
    Sodium,
    Cholesterol,
    AlcoholGrams,
}

impl NutrientField {
    /// All nutrient fields, in column order.
    pub const ALL: [Self; 9] = [
        Self::Calories,
        Self::Carbs,
        Self::Fat,
        Self::Protein,
        Self::Sugar,
        Self::Fiber,
        Self::Sodium,
        Self::Cholesterol,
        Self::AlcoholGrams,
    ];

    /// Column name in `nutritional_data`.
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Carbs => "carbs",
            Self::Fat => "fat",
            Self::Protein => "protein",
            Self::Sugar => "sugar",
            Self::Fiber => "fiber",
            Self::Sodium => "sodium",
            Self::Cholesterol => "cholesterol",
            Self::AlcoholGrams => "alcohol_grams",
        }
    }

    /// Reads this field from a facts value.
    #[must_use]
    pub fn get(&self, facts: &NutritionFacts) -> Option<f64> {
        match self {
            Self::Calories => facts.calories,
            Self::Carbs => facts.carbs,
            Self::Fat => facts.fat,
            Self::Protein => facts.protein,
            Self::Sugar => facts.sugar,
            Self::Fiber => facts.fiber,
            Self::Sodium => facts.sodium,
            Self::Cholesterol => facts.cholesterol,
            Self::AlcoholGrams => facts.alcohol_grams,
        }
    }

    /// Writes this field on a facts value.
    pub fn set(&self, facts: &mut NutritionFacts, value: Option<f64>) {
        let slot = match self {
            Self::Calories => &mut facts.calories,
            Self::Carbs => &mut facts.carbs,
            Self::Fat => &mut facts.fat,
            Self::Protein => &mut facts.protein,
            Self::Sugar => &mut facts.sugar,
            Self::Fiber => &mut facts.fiber,
            Self::Sodium => &mut facts.sodium,
            Self::Cholesterol => &mut facts.cholesterol,
            Self::AlcoholGrams => &mut facts.alcohol_grams,
        };
        *slot = value;
    }
}

impl fmt::Display for NutrientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// A stored nutrition row for one menu item.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub menu_item_id: i64,
    pub calories: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub protein: Option<f64>,
    pub sugar: Option<f64>,
    pub fiber: Option<f64>,
    pub sodium: Option<f64>,
    pub cholesterol: Option<f64>,
    pub alcohol_grams: Option<f64>,
    /// Source stored as text, parsed via `source()`.
    #[sqlx(rename = "source")]
    #[serde(rename = "source", default, deserialize_with = "null_as_default")]
    pub source_str: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence_score: i64,
}

impl NutritionRecord {
    /// Returns the parsed source.
    ///
    /// Falls back to `Crowdsourced` if the stored value is invalid.
    #[must_use]
    pub fn source(&self) -> NutritionSource {
        self.source_str.parse().unwrap_or(NutritionSource::Crowdsourced)
    }

    /// Returns the nutrient values as a facts value.
    #[must_use]
    pub fn facts(&self) -> NutritionFacts {
        NutritionFacts {
            calories: self.calories,
            carbs: self.carbs,
            fat: self.fat,
            protein: self.protein,
            sugar: self.sugar,
            fiber: self.fiber,
            sodium: self.sodium,
            cholesterol: self.cholesterol,
            alcohol_grams: self.alcohol_grams,
        }
    }

    /// Overwrites the nutrient values, keeping source and confidence.
    pub fn set_facts(&mut self, facts: &NutritionFacts) {
        self.calories = facts.calories;
        self.carbs = facts.carbs;
        self.fat = facts.fat;
        self.protein = facts.protein;
        self.sugar = facts.sugar;
        self.fiber = facts.fiber;
        self.sodium = facts.sodium;
        self.cholesterol = facts.cholesterol;
        self.alcohol_grams = facts.alcohol_grams;
    }
}

/// An allergen edge as stored.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AllergenRecord {
    pub menu_item_id: i64,
    #[sqlx(rename = "allergen_type")]
    #[serde(rename = "allergen_type")]
    pub allergen_type_str: String,
    #[sqlx(rename = "severity")]
    #[serde(rename = "severity")]
    pub severity_str: String,
}

impl AllergenRecord {
    /// Returns the parsed allergen type, if valid.
    #[must_use]
    pub fn allergen_type(&self) -> Option<AllergenType> {
        self.allergen_type_str.parse().ok()
    }

    /// Returns the parsed severity, if valid.
    #[must_use]
    pub fn severity(&self) -> Option<AllergenSeverity> {
        self.severity_str.parse().ok()
    }
}

/// Row counts across the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub parks: i64,
    pub restaurants: i64,
    pub menu_items: i64,
    pub with_nutrition: i64,
    pub allergen_edges: i64,
    /// Nutrition row count per source label, sorted by label.
    pub by_source: Vec<(String, i64)>,
}
