//! The blending rule engine itself (spec.md §4.11).
//!
//! `make_blend` is the sole entry point: given an ingredient list and a
//! read-only catalog snapshot, it is a pure function from input to
//! `(Product, quantity)` -- no I/O, no mutable state, matching the
//! "pure rule evaluation over persistent records" pattern the rest of the
//! repository uses for rule tables (spec.md §1).

use wargame_types::{
    ChakraValence, ConstraintRecipe, FailedBlend, Ingredient, Product, ProductType, SubsetRecipe,
};

use crate::error::HerbalismError;

/// Fallback product returned when no `FailedBlend` row and no `Product`
/// row can resolve a ruined blend (spec.md §4.11 step 7).
const SLUDGE_ITEM_NUMBER: &str = "6000";

/// A read-only snapshot of every herbalism rule table the engine
/// consults. Borrowed for the lifetime of one `make_blend` call; the
/// engine never mutates or caches it.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    pub ingredients: &'a [Ingredient],
    pub products: &'a [Product],
    pub subset_recipes: &'a [SubsetRecipe],
    pub constraint_recipes: &'a [ConstraintRecipe],
    pub failed_blends: &'a [FailedBlend],
}

impl Catalog<'_> {
    fn find_ingredient(&self, item_number: &str) -> Option<&Ingredient> {
        self.ingredients
            .iter()
            .find(|i| i.item_number == item_number)
    }

    /// First product with this item number, irrespective of type --
    /// mirrors `Product.fetch_by_item_number`'s documented "first match"
    /// behavior for item numbers shared across product types.
    fn find_product(&self, item_number: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.item_number == item_number)
    }

    fn find_failed_blend(&self, product_type: ProductType) -> Option<&FailedBlend> {
        self.failed_blends
            .iter()
            .find(|f| f.product_type == product_type)
    }

    /// The ruined product for `product_type`, falling back to a
    /// hard-coded sludge product if no `FailedBlend` row exists, its
    /// target product is missing, or sludge itself isn't in the table
    /// (spec.md §4.11 step 7).
    fn ruined_product(&self, product_type: ProductType) -> Product {
        if let Some(failed) = self.find_failed_blend(product_type) {
            if let Some(product) = self.find_product(&failed.product_item_number) {
                return product.clone();
            }
        }
        self.sludge()
    }

    fn sludge(&self) -> Product {
        self.find_product(SLUDGE_ITEM_NUMBER).cloned().unwrap_or(Product {
            item_number: SLUDGE_ITEM_NUMBER.to_owned(),
            name: "Sludge".to_owned(),
            product_type: ProductType::Salve,
        })
    }
}

/// The result of one `make_blend` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendResult {
    pub product: Product,
    pub quantity: u32,
}

/// The computed net chakra signature of an ingredient set (spec.md
/// §4.11 step 5).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChakraResult {
    pub primary_chakra: Option<String>,
    pub primary_magnitude: i32,
    pub primary_is_boon: Option<ChakraValence>,
    pub secondary_chakra: Option<String>,
    pub secondary_magnitude: i32,
    pub secondary_is_boon: Option<ChakraValence>,
    pub tier: u8,
}

fn count_property(ingredients: &[&Ingredient], property: &str) -> usize {
    ingredients.iter().filter(|i| i.has_property(property)).count()
}

fn all_have_property(ingredients: &[&Ingredient], property: &str) -> bool {
    !ingredients.is_empty() && ingredients.iter().all(|i| i.has_property(property))
}

fn has_property(ingredients: &[&Ingredient], property: &str) -> bool {
    ingredients.iter().any(|i| i.has_property(property))
}

/// Either a ruined product (final answer, no further matching) or a
/// product type to match subset/constraint recipes against.
enum ProductTypeOutcome {
    Ruined(Product),
    Normal(ProductType),
}

/// spec.md §4.11 step 3, the fixed alcohol/ingestible/aromatic/salt
/// decision table.
fn calc_product_type(catalog: &Catalog<'_>, ingredients: &[&Ingredient]) -> ProductTypeOutcome {
    let alcohol_count = count_property(ingredients, "alcohol");
    let is_ingestible = all_have_property(ingredients, "ingestible");
    let has_aromatic = has_property(ingredients, "aromatic");
    let has_salt = has_property(ingredients, "salt");

    if alcohol_count > 2 {
        return ProductTypeOutcome::Ruined(catalog.ruined_product(ProductType::Tincture));
    }
    if alcohol_count == 2 {
        return if is_ingestible {
            ProductTypeOutcome::Normal(ProductType::Tincture)
        } else {
            ProductTypeOutcome::Ruined(catalog.ruined_product(ProductType::Tincture))
        };
    }
    if alcohol_count == 1 {
        return if is_ingestible {
            ProductTypeOutcome::Normal(ProductType::Tincture)
        } else if has_aromatic {
            ProductTypeOutcome::Normal(ProductType::Incense)
        } else {
            ProductTypeOutcome::Normal(ProductType::Decoction)
        };
    }
    if is_ingestible {
        ProductTypeOutcome::Normal(ProductType::Tea)
    } else if has_salt {
        ProductTypeOutcome::Normal(ProductType::Bath)
    } else {
        ProductTypeOutcome::Normal(ProductType::Salve)
    }
}

/// spec.md §4.11 step 5: sum chakra strengths per lowercased chakra name
/// across both chakra fields of every ingredient, rank by magnitude.
///
/// Accumulation order matters for tie-breaking: ties in magnitude keep
/// first-seen order (a stable sort over first-seen insertion order),
/// matching the source's dict-preserves-insertion-order + stable-sort
/// behavior.
#[must_use]
pub fn calculate_chakras(ingredients: &[&Ingredient]) -> ChakraResult {
    let mut totals: Vec<(String, i32)> = Vec::new();
    let mut accumulate = |chakra: &Option<String>, strength: Option<i32>| {
        let (Some(chakra), Some(strength)) = (chakra.as_ref(), strength) else {
            return;
        };
        let key = chakra.to_lowercase();
        if let Some(entry) = totals.iter_mut().find(|(name, _)| *name == key) {
            entry.1 = entry.1.saturating_add(strength);
        } else {
            totals.push((key, strength));
        }
    };
    for ingredient in ingredients {
        accumulate(&ingredient.primary_chakra, ingredient.primary_chakra_strength);
        accumulate(&ingredient.secondary_chakra, ingredient.secondary_chakra_strength);
    }

    if totals.is_empty() {
        return ChakraResult::default();
    }

    totals.sort_by(|a, b| b.1.unsigned_abs().cmp(&a.1.unsigned_abs()));

    let mut result = ChakraResult::default();
    let (primary_name, primary_mag) = totals[0].clone();
    result.primary_chakra = Some(primary_name);
    result.primary_magnitude = primary_mag;
    result.primary_is_boon = Some(valence(primary_mag));

    let secondary_abs = if let Some((secondary_name, secondary_mag)) = totals.get(1) {
        result.secondary_chakra = Some(secondary_name.clone());
        result.secondary_magnitude = *secondary_mag;
        result.secondary_is_boon = Some(valence(*secondary_mag));
        secondary_mag.unsigned_abs()
    } else {
        0
    };

    let diff = primary_mag.unsigned_abs().saturating_sub(secondary_abs);
    result.tier = if diff > 10 {
        3
    } else if diff >= 8 {
        2
    } else if diff >= 4 {
        1
    } else {
        0
    };
    if result.secondary_chakra.is_none() {
        result.tier = result.tier.saturating_add(1);
    }
    result
}

fn valence(magnitude: i32) -> ChakraValence {
    if magnitude > 0 {
        ChakraValence::Boon
    } else {
        ChakraValence::Bane
    }
}

/// Pattern match for constraint-recipe ingredient patterns: `'*'` matches
/// any single character at that position, other characters must match
/// exactly, and lengths must be equal (spec.md §4.11 step 6).
#[must_use]
pub fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern.chars().count() != value.chars().count() {
        return false;
    }
    pattern
        .chars()
        .zip(value.chars())
        .all(|(p, v)| p == '*' || p == v)
}

fn ingredients_match(recipe: &ConstraintRecipe, item_numbers: &[String]) -> bool {
    match &recipe.ingredients {
        None => true,
        Some(patterns) if patterns.is_empty() => true,
        Some(patterns) => patterns.iter().all(|pattern| {
            item_numbers
                .iter()
                .any(|actual| pattern_matches(pattern, actual))
        }),
    }
}

fn constraint_matches(
    recipe: &ConstraintRecipe,
    item_numbers: &[String],
    chakras: &ChakraResult,
) -> bool {
    if let Some(tier) = recipe.tier {
        if tier != chakras.tier {
            return false;
        }
    }
    if let Some(want) = &recipe.primary_chakra {
        let Some(got) = &chakras.primary_chakra else {
            return false;
        };
        if !want.eq_ignore_ascii_case(got) {
            return false;
        }
    }
    if let Some(want) = recipe.primary_is_boon {
        if chakras.primary_is_boon != Some(want) {
            return false;
        }
    }
    if let Some(want) = &recipe.secondary_chakra {
        let Some(got) = &chakras.secondary_chakra else {
            return false;
        };
        if !want.eq_ignore_ascii_case(got) {
            return false;
        }
    }
    if let Some(want) = recipe.secondary_is_boon {
        if chakras.secondary_is_boon != Some(want) {
            return false;
        }
    }
    ingredients_match(recipe, item_numbers)
}

/// spec.md §4.11 steps 4-7: subset match, then chakra/tier, then
/// constraint match, falling back to the ruined product.
fn calc_product(
    catalog: &Catalog<'_>,
    product_type: ProductType,
    ingredients: &[&Ingredient],
    item_numbers: &[String],
) -> (Product, u32) {
    let item_number_set: std::collections::BTreeSet<&str> =
        item_numbers.iter().map(String::as_str).collect();

    let mut subset_matches: Vec<&SubsetRecipe> = catalog
        .subset_recipes
        .iter()
        .filter(|r| r.product_type == product_type)
        .filter(|r| r.ingredients.iter().all(|i| item_number_set.contains(i.as_str())))
        .collect();
    // Largest subset wins; ties broken by id (spec.md §4.11 step 4).
    subset_matches.sort_by(|a, b| b.ingredients.len().cmp(&a.ingredients.len()).then(a.id.cmp(&b.id)));

    if let Some(best) = subset_matches.first() {
        if let Some(product) = catalog.find_product(&best.product_item_number) {
            return (product.clone(), best.quantity_produced);
        }
    }

    let chakras = calculate_chakras(ingredients);
    if chakras.tier == 0 {
        return (catalog.ruined_product(product_type), 1);
    }

    let mut constraint_matches: Vec<&ConstraintRecipe> = catalog
        .constraint_recipes
        .iter()
        .filter(|r| r.product_type == product_type)
        .filter(|r| constraint_matches(r, item_numbers, &chakras))
        .collect();
    constraint_matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    if let Some(best) = constraint_matches.first() {
        if let Some(product) = catalog.find_product(&best.product_item_number) {
            return (product.clone(), best.quantity_produced);
        }
    }

    (catalog.ruined_product(product_type), 1)
}

/// Blend an ordered ingredient list into a product (spec.md §4.11).
///
/// `item_numbers` need not be pre-sorted or deduplicated; the engine
/// normalizes (descending sort), validates the count is 1..=6, resolves
/// each number against `catalog.ingredients`, and runs the full
/// type/subset/chakra/constraint pipeline.
pub fn make_blend(
    catalog: &Catalog<'_>,
    item_numbers: &[String],
) -> Result<BlendResult, HerbalismError> {
    if item_numbers.is_empty() {
        return Err(HerbalismError::NoIngredients);
    }
    if item_numbers.len() > 6 {
        return Err(HerbalismError::TooManyIngredients);
    }

    let mut sorted_numbers = item_numbers.to_vec();
    sorted_numbers.sort_by(|a, b| b.cmp(a));

    let mut ingredients = Vec::with_capacity(sorted_numbers.len());
    let mut unknown = Vec::new();
    for number in &sorted_numbers {
        match catalog.find_ingredient(number) {
            Some(ingredient) => ingredients.push(ingredient),
            None => unknown.push(number.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(HerbalismError::UnknownIngredients(unknown));
    }

    match calc_product_type(catalog, &ingredients) {
        ProductTypeOutcome::Ruined(product) => Ok(BlendResult { product, quantity: 1 }),
        ProductTypeOutcome::Normal(product_type) => {
            let (product, quantity) =
                calc_product(catalog, product_type, &ingredients, &sorted_numbers);
            Ok(BlendResult { product, quantity })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ingredient(
        number: &str,
        properties: &[&str],
        primary: Option<(&str, i32)>,
        secondary: Option<(&str, i32)>,
    ) -> Ingredient {
        Ingredient {
            item_number: number.to_owned(),
            name: number.to_owned(),
            primary_chakra: primary.map(|(c, _)| c.to_owned()),
            primary_chakra_strength: primary.map(|(_, s)| s),
            secondary_chakra: secondary.map(|(c, _)| c.to_owned()),
            secondary_chakra_strength: secondary.map(|(_, s)| s),
            properties: properties.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    fn product(item_number: &str, product_type: ProductType) -> Product {
        Product {
            item_number: item_number.to_owned(),
            name: item_number.to_owned(),
            product_type,
        }
    }

    #[test]
    fn rejects_empty_and_oversized_input() {
        let catalog = Catalog {
            ingredients: &[],
            products: &[],
            subset_recipes: &[],
            constraint_recipes: &[],
            failed_blends: &[],
        };
        assert_eq!(make_blend(&catalog, &[]), Err(HerbalismError::NoIngredients));
        let seven: Vec<String> = (0..7).map(|n| n.to_string()).collect();
        assert_eq!(
            make_blend(&catalog, &seven),
            Err(HerbalismError::TooManyIngredients)
        );
    }

    #[test]
    fn unknown_item_numbers_are_reported() {
        let ingredients = vec![ingredient("5111", &["ingestible"], None, None)];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &[],
            subset_recipes: &[],
            constraint_recipes: &[],
            failed_blends: &[],
        };
        let err = make_blend(&catalog, &["5111".to_owned(), "9999".to_owned()]).unwrap_err();
        assert_eq!(err, HerbalismError::UnknownIngredients(vec!["9999".to_owned()]));
    }

    #[test]
    fn subset_recipe_match_wins_over_chakra_path() {
        let ingredients = vec![
            ingredient("5419", &["ingestible"], None, None),
            ingredient("5111", &["ingestible"], None, None),
        ];
        let products = vec![product("7000", ProductType::Tea)];
        let subset_recipes = vec![SubsetRecipe {
            id: 1,
            product_item_number: "7000".to_owned(),
            product_type: ProductType::Tea,
            quantity_produced: 3,
            ingredients: vec!["5419".to_owned(), "5111".to_owned()],
        }];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &products,
            subset_recipes: &subset_recipes,
            constraint_recipes: &[],
            failed_blends: &[],
        };
        let result = make_blend(&catalog, &["5111".to_owned(), "5419".to_owned()]).unwrap();
        assert_eq!(result.product.item_number, "7000");
        assert_eq!(result.quantity, 3);
    }

    #[test]
    fn order_of_input_does_not_affect_result() {
        let ingredients = vec![
            ingredient("5419", &["ingestible"], None, None),
            ingredient("5111", &["ingestible"], None, None),
        ];
        let products = vec![product("7000", ProductType::Tea)];
        let subset_recipes = vec![SubsetRecipe {
            id: 1,
            product_item_number: "7000".to_owned(),
            product_type: ProductType::Tea,
            quantity_produced: 3,
            ingredients: vec!["5419".to_owned(), "5111".to_owned()],
        }];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &products,
            subset_recipes: &subset_recipes,
            constraint_recipes: &[],
            failed_blends: &[],
        };
        let a = make_blend(&catalog, &["5111".to_owned(), "5419".to_owned()]).unwrap();
        let b = make_blend(&catalog, &["5419".to_owned(), "5111".to_owned()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn excess_alcohol_ruins_the_blend_as_tincture() {
        let ingredients = vec![
            ingredient("1", &["alcohol"], None, None),
            ingredient("2", &["alcohol"], None, None),
            ingredient("3", &["alcohol"], None, None),
        ];
        let products = vec![product("9001", ProductType::Tincture)];
        let failed_blends = vec![FailedBlend {
            product_item_number: "9001".to_owned(),
            product_type: ProductType::Tincture,
        }];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &products,
            subset_recipes: &[],
            constraint_recipes: &[],
            failed_blends: &failed_blends,
        };
        let result =
            make_blend(&catalog, &["1".to_owned(), "2".to_owned(), "3".to_owned()]).unwrap();
        assert_eq!(result.product.item_number, "9001");
        assert_eq!(result.quantity, 1);
    }

    #[test]
    fn missing_ruined_product_falls_back_to_sludge() {
        let ingredients = vec![
            ingredient("1", &["alcohol"], None, None),
            ingredient("2", &["alcohol"], None, None),
            ingredient("3", &["alcohol"], None, None),
        ];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &[],
            subset_recipes: &[],
            constraint_recipes: &[],
            failed_blends: &[],
        };
        let result =
            make_blend(&catalog, &["1".to_owned(), "2".to_owned(), "3".to_owned()]).unwrap();
        assert_eq!(result.product.item_number, "6000");
        assert_eq!(result.product.product_type, ProductType::Salve);
    }

    #[test]
    fn zero_tier_falls_back_to_ruined_product() {
        // A single ingredient with no chakra fields set produces no
        // chakra totals at all, so tier stays 0 and the blend is ruined.
        let ingredients = vec![ingredient("5111", &["ingestible"], None, None)];
        let products = vec![product("7001", ProductType::Tea)];
        let failed_blends = vec![FailedBlend {
            product_item_number: "7001".to_owned(),
            product_type: ProductType::Tea,
        }];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &products,
            subset_recipes: &[],
            constraint_recipes: &[],
            failed_blends: &failed_blends,
        };
        let result = make_blend(&catalog, &["5111".to_owned()]).unwrap();
        assert_eq!(result.product.item_number, "7001");
    }

    #[test]
    fn constraint_recipe_wildcard_and_fifo_ordering() {
        let ingredients = vec![ingredient(
            "5111",
            &[],
            Some(("fire", 12)),
            None,
        )];
        let products = vec![
            product("8001", ProductType::Salve),
            product("8002", ProductType::Salve),
        ];
        let constraint_recipes = vec![
            ConstraintRecipe {
                id: 1,
                product_item_number: "8001".to_owned(),
                product_type: ProductType::Salve,
                quantity_produced: 1,
                ingredients: Some(vec!["51*1".to_owned()]),
                primary_chakra: Some("fire".to_owned()),
                primary_is_boon: Some(ChakraValence::Boon),
                secondary_chakra: None,
                secondary_is_boon: None,
                tier: Some(4),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            ConstraintRecipe {
                id: 2,
                product_item_number: "8002".to_owned(),
                product_type: ProductType::Salve,
                quantity_produced: 1,
                ingredients: None,
                primary_chakra: Some("fire".to_owned()),
                primary_is_boon: Some(ChakraValence::Boon),
                secondary_chakra: None,
                secondary_is_boon: None,
                tier: Some(4),
                created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            },
        ];
        let catalog = Catalog {
            ingredients: &ingredients,
            products: &products,
            subset_recipes: &[],
            constraint_recipes: &constraint_recipes,
            failed_blends: &[],
        };
        // Both recipes match; the earlier created_at (8002) wins FIFO.
        let result = make_blend(&catalog, &["5111".to_owned()]).unwrap();
        assert_eq!(result.product.item_number, "8002");
    }

    #[test]
    fn pattern_matches_wildcard_positions() {
        assert!(pattern_matches("51*1", "5111"));
        assert!(pattern_matches("51*1", "5121"));
        assert!(!pattern_matches("51*1", "5112"));
        assert!(!pattern_matches("51*1", "511"));
    }

    #[test]
    fn chakra_ties_keep_first_seen_order() {
        let ingredients = vec![
            ingredient("1", &[], Some(("fire", 5)), None),
            ingredient("2", &[], Some(("water", 5)), None),
        ];
        let refs: Vec<&Ingredient> = ingredients.iter().collect();
        let result = calculate_chakras(&refs);
        assert_eq!(result.primary_chakra.as_deref(), Some("fire"));
        assert_eq!(result.secondary_chakra.as_deref(), Some("water"));
    }
}
