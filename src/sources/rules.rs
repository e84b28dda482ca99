//! Ordered extraction rules with first-non-empty-wins resolution.
//!
//! A rule is written as `css`, `css::text` or `css::attr(name)`. Sources list
//! several rules per field so that markup changes degrade to the next rule
//! instead of losing the field.

use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;

/// Errors raised while compiling rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("malformed rule `{0}`")]
    Syntax(String),

    #[error("invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
}

/// What a rule reads from the element it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    Text,
    Attr(String),
}

/// A single compiled extraction rule.
#[derive(Debug, Clone)]
pub struct Rule {
    expr: String,
    selector: Selector,
    extract: Extract,
}

impl Rule {
    /// Compiles a rule expression.
    pub fn parse(expr: &str) -> Result<Self, RuleError> {
        let trimmed = expr.trim();
        let (css, extract) = match trimmed.rsplit_once("::") {
            Some((css, "text")) => (css, Extract::Text),
            Some((css, target)) => {
                let name = target
                    .strip_prefix("attr(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| RuleError::Syntax(expr.to_string()))?;
                (css, Extract::Attr(name.to_string()))
            }
            None => (trimmed, Extract::Text),
        };

        let css = css.trim();
        if css.is_empty() {
            return Err(RuleError::Syntax(expr.to_string()));
        }

        let selector = compile(css)?;
        Ok(Self { expr: trimmed.to_string(), selector, extract })
    }

    pub fn extract(&self) -> &Extract {
        &self.extract
    }

    /// Evaluates the rule on the first element it selects inside `fragment`.
    pub fn eval(&self, fragment: ElementRef<'_>) -> Option<String> {
        let element = fragment.select(&self.selector).next()?;
        let value = match &self.extract {
            Extract::Text => collapse_whitespace(&element.text().collect::<String>()),
            Extract::Attr(name) => element.value().attr(name)?.trim().to_string(),
        };

        (!value.is_empty()).then_some(value)
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// Ordered rules for one field.
#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<Rule>,
}

impl RuleChain {
    /// Compiles every expression, failing on the first bad one.
    pub fn parse<S: AsRef<str>>(exprs: &[S]) -> Result<Self, RuleError> {
        let rules = exprs.iter().map(|e| Rule::parse(e.as_ref())).collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// Returns the first non-empty value produced by the rules, in order.
    pub fn resolve(&self, fragment: ElementRef<'_>) -> Option<String> {
        self.resolve_where(fragment, |_| true)
    }

    /// Like [`resolve`](Self::resolve), but candidates must also satisfy `accept`.
    pub fn resolve_where<F>(&self, fragment: ElementRef<'_>, accept: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        self.rules.iter().filter_map(|rule| rule.eval(fragment)).find(|value| accept(value))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Ordered container selectors; the first one with any match wins.
#[derive(Debug, Clone, Default)]
pub struct ContainerRules {
    selectors: Vec<(String, Selector)>,
}

impl ContainerRules {
    pub fn parse<S: AsRef<str>>(exprs: &[S]) -> Result<Self, RuleError> {
        let selectors = exprs
            .iter()
            .map(|e| {
                let css = e.as_ref().trim();
                compile(css).map(|selector| (css.to_string(), selector))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { selectors })
    }

    /// Finds item containers, returning the matching selector alongside them.
    pub fn find<'a>(&self, document: &'a Html) -> Option<(&str, Vec<ElementRef<'a>>)> {
        self.selectors.iter().find_map(|(css, selector)| {
            let found: Vec<ElementRef<'a>> = document.select(selector).collect();
            (!found.is_empty()).then_some((css.as_str(), found))
        })
    }
}

fn compile(css: &str) -> Result<Selector, RuleError> {
    Selector::parse(css).map_err(|e| RuleError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="card">
            <h3 class="name">  Brake   Disc </h3>
            <span class="price"></span>
            <a class="link" href="/p/1" title="Brake Disc Set">Open</a>
            <img src="/img/1.jpg" data-src="">
        </div>
    "#;

    fn with_card<T>(f: impl FnOnce(ElementRef<'_>) -> T) -> T {
        let html = Html::parse_fragment(CARD);
        f(html.root_element())
    }

    #[test]
    fn test_parse_rule_forms() {
        assert_eq!(Rule::parse(".name").unwrap().extract(), &Extract::Text);
        assert_eq!(Rule::parse(".name::text").unwrap().extract(), &Extract::Text);
        assert_eq!(
            Rule::parse("a::attr(href)").unwrap().extract(),
            &Extract::Attr("href".to_string())
        );
        assert_eq!("img::attr( src )".parse::<Rule>().unwrap().extract(), &Extract::Attr("src".into()));
    }

    #[test]
    fn test_parse_rule_errors() {
        assert!(matches!(Rule::parse("::text"), Err(RuleError::Syntax(_))));
        assert!(matches!(Rule::parse("a::attr()"), Err(RuleError::Syntax(_))));
        assert!(matches!(Rule::parse("a::html"), Err(RuleError::Syntax(_))));
        assert!(matches!(Rule::parse("div[[::text"), Err(RuleError::Selector { .. })));
    }

    #[test]
    fn test_text_is_trimmed_and_collapsed() {
        let rule = Rule::parse(".name::text").unwrap();
        assert_eq!(with_card(|card| rule.eval(card)), Some("Brake Disc".to_string()));
    }

    #[test]
    fn test_empty_values_do_not_match() {
        let rule = Rule::parse(".price::text").unwrap();
        assert_eq!(with_card(|card| rule.eval(card)), None);

        let rule = Rule::parse("img::attr(data-src)").unwrap();
        assert_eq!(with_card(|card| rule.eval(card)), None);
    }

    #[test]
    fn test_chain_returns_first_non_empty() {
        let chain =
            RuleChain::parse(&[".missing::text", ".price::text", "a::attr(title)", ".name::text"])
                .unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(with_card(|card| chain.resolve(card)), Some("Brake Disc Set".to_string()));
    }

    #[test]
    fn test_chain_without_match() {
        let chain = RuleChain::parse(&[".nope", ".price"]).unwrap();
        assert_eq!(with_card(|card| chain.resolve(card)), None);
        assert!(RuleChain::default().is_empty());
    }

    #[test]
    fn test_resolve_where_skips_rejected_values() {
        let chain = RuleChain::parse(&["img::attr(src)", "a::attr(href)"]).unwrap();
        let value = with_card(|card| chain.resolve_where(card, |v| v.starts_with("/p/")));
        assert_eq!(value, Some("/p/1".to_string()));
    }

    #[test]
    fn test_containers_first_matching_selector_wins() {
        let html = Html::parse_document(
            r#"<ul><li class="item">a</li><li class="item">b</li></ul><div class="card">c</div>"#,
        );
        let rules = ContainerRules::parse(&[".product", ".item", ".card"]).unwrap();
        let (css, found) = rules.find(&html).unwrap();
        assert_eq!(css, ".item");
        assert_eq!(found.len(), 2);

        let rules = ContainerRules::parse(&[".product"]).unwrap();
        assert!(rules.find(&html).is_none());
    }
}
