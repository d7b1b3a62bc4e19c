//! Catalog predicates.
//!
//! Each filter knows how to express itself as SQL over the `recipe` table
//! and how to test an in-memory [`Recipe`], so both stores agree on what a
//! listing contains.

use recipebox_sql::{Expr, Select, Source};

use crate::{Params, Recipe};

/// Alias the catalog statements give the `recipe` table.
pub(crate) const RECIPE: &str = "r";

const CATEGORY_PARAM: &str = "category";
const SEARCH_PARAM: &str = "search";

fn col(name: &str) -> Expr {
    Expr::qualified(RECIPE, name)
}

/// One predicate of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Public and approved. Always the first filter of a listing.
    Listed,
    /// Category equals the value exactly.
    CategoryEquals(String),
    /// Title, description or any single ingredient contains the term,
    /// ignoring case.
    TextContains(String),
}

impl Filter {
    /// The SQL form of this filter. Values are added to `params`.
    pub fn to_expr(&self, params: &mut Params) -> Expr {
        match self {
            Filter::Listed => col("is_public")
                .eq(Expr::bool(true))
                .and(col("is_approved").eq(Expr::bool(true))),
            Filter::CategoryEquals(category) => {
                params.insert(CATEGORY_PARAM, category.as_str());
                col("category").eq(Expr::param(CATEGORY_PARAM))
            }
            Filter::TextContains(term) => {
                params.insert(SEARCH_PARAM, contains_pattern(term));
                let pattern = || Expr::param(SEARCH_PARAM);
                let any_ingredient = Select::new(Source::unnest(col("ingredients"), "ingredient"))
                    .item(Expr::int(1))
                    .filter(Expr::column("ingredient").ilike(pattern()));
                col("title")
                    .ilike(pattern())
                    .or(col("description").ilike(pattern()))
                    .or(Expr::exists(any_ingredient))
            }
        }
    }

    /// Evaluate this filter against a recipe the way Postgres would.
    pub fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            Filter::Listed => recipe.is_listed(),
            Filter::CategoryEquals(category) => recipe.category == *category,
            Filter::TextContains(term) => {
                let pattern = contains_pattern(term);
                ilike(&recipe.title, &pattern)
                    || ilike(&recipe.description, &pattern)
                    || recipe.ingredients.iter().any(|i| ilike(i, &pattern))
            }
        }
    }
}

/// `%term%`. The term itself is not escaped, so `%` and `_` inside it keep
/// their wildcard meaning and `\` escapes the character after it.
pub(crate) fn contains_pattern(term: &str) -> String {
    format!("%{term}%")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    /// `%`
    AnyRun,
    /// `_`
    AnyOne,
    Literal(char),
}

/// Split a lowercased pattern into tokens. `\` makes the next character
/// literal, as LIKE's default escape does. `None` for a pattern ending in a
/// lone `\`, which Postgres rejects.
fn tokenize(pattern: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::AnyRun,
            '_' => Token::AnyOne,
            '\\' => Token::Literal(chars.next()?),
            c => Token::Literal(c),
        });
    }
    Some(tokens)
}

/// Case-insensitive LIKE: `%` matches any run of characters, `_` exactly one,
/// and `\` escapes the character after it.
pub(crate) fn ilike(haystack: &str, pattern: &str) -> bool {
    let text: Vec<char> = haystack.to_lowercase().chars().collect();
    let Some(pat) = tokenize(&pattern.to_lowercase()) else {
        return false;
    };

    // Backtrack to the most recent `%` on a mismatch.
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pat.get(p) {
            Some(Token::AnyRun) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Token::AnyOne) => {
                t += 1;
                p += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pat[p..].iter().all(|tok| *tok == Token::AnyRun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilike_wildcards() {
        assert!(ilike("Chicken Soup", "%soup%"));
        assert!(ilike("soup", "%SOUP%"));
        assert!(!ilike("Salad", "%soup%"));
        assert!(ilike("anything", "%%"));
        assert!(ilike("", "%%"));
        assert!(ilike("cat", "c_t"));
        assert!(!ilike("cart", "c_t"));
        assert!(ilike("100% rye", "%0%%"));
        assert!(ilike("ab", "%a%b%"));
        assert!(!ilike("ba", "%a%b%"));
    }

    #[test]
    fn ilike_is_unicode_case_insensitive() {
        assert!(ilike("Свекла", "%СВЕК%"));
        assert!(ilike("Борщ с говядиной", "%ГОВЯД%"));
    }

    #[test]
    fn backslash_escapes_wildcards() {
        assert!(ilike("a_b", r"a\_b"));
        assert!(!ilike("axb", r"a\_b"));
        assert!(ilike("100% rye", r"%100\%%"));
        assert!(!ilike("100 rye", r"%100\%%"));
        assert!(ilike(r"c:\temp", r"%c:\\t%"));
        assert!(!ilike("abc", "abc\\"));
    }

    #[test]
    fn escaped_search_term_matches_literally() {
        let recipe_title = "a_b";
        assert!(ilike(recipe_title, &contains_pattern(r"a\_b")));
        assert!(!ilike("aXb", &contains_pattern(r"a\_b")));
    }
}
