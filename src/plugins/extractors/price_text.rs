use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::scraper::RenderedPage;

/// Where a page was served from, used to guess a currency when the price
/// text itself carries no symbol.
#[derive(Debug, Clone)]
pub struct WebsiteContext {
    pub url: String,
    pub lang: Option<String>, // HTML lang attribute
}

impl WebsiteContext {
    pub fn from_page(page: &RenderedPage) -> Self {
        Self {
            url: page.final_url.clone(),
            lang: page.lang.clone(),
        }
    }
}

/// Turns price-looking text ("$1,299.99", "1.299,99 €", "19.99") into an
/// amount and an ISO currency code.
pub struct PriceParser {
    price_regex: Regex,
    currency_symbols: Vec<(String, String)>, // Longest symbol first
    default_currency: String,
    locale_currency_map: HashMap<String, String>,
    path_patterns: Vec<(Regex, &'static str)>,
}

impl PriceParser {
    pub fn new(default_currency: &str) -> Self {
        let mut currency_symbols = vec![
            ("US$".to_string(), "USD".to_string()),
            ("USD$".to_string(), "USD".to_string()),
            ("A$".to_string(), "AUD".to_string()),
            ("AU$".to_string(), "AUD".to_string()),
            ("C$".to_string(), "CAD".to_string()),
            ("CA$".to_string(), "CAD".to_string()),
            ("USD".to_string(), "USD".to_string()),
            ("EUR".to_string(), "EUR".to_string()),
            ("GBP".to_string(), "GBP".to_string()),
            ("£".to_string(), "GBP".to_string()),
            ("€".to_string(), "EUR".to_string()),
            ("¥".to_string(), "JPY".to_string()),
            ("₹".to_string(), "INR".to_string()),
        ];
        // A bare $ means whatever dollar the deployment is configured for
        let dollar = if default_currency.ends_with('D') { default_currency } else { "USD" };
        currency_symbols.push(("$".to_string(), dollar.to_string()));
        currency_symbols.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let locale_currency_map = [
            ("en-au", "AUD"),
            ("en-us", "USD"),
            ("en-gb", "GBP"),
            ("en-ca", "CAD"),
            ("fr-fr", "EUR"),
            ("de-de", "EUR"),
            ("es-es", "EUR"),
            ("it-it", "EUR"),
            ("ja-jp", "JPY"),
            ("ja", "JPY"),
            ("ko-kr", "KRW"),
            ("zh-cn", "CNY"),
            ("hi-in", "INR"),
            ("en-in", "INR"),
        ]
        .into_iter()
        .map(|(locale, currency)| (locale.to_string(), currency.to_string()))
        .collect();

        let path_patterns = [
            (r"/en-au/|/au/|/australia/", "AUD"),
            (r"/en-us/|/us/|/usa/", "USD"),
            (r"/en-gb/|/gb/|/uk/", "GBP"),
            (r"/en-ca/|/ca/|/canada/", "CAD"),
            (r"/de/|/fr/|/es/|/it/", "EUR"),
            (r"/jp/|/japan/", "JPY"),
            (r"/in/|/india/", "INR"),
        ]
        .into_iter()
        .filter_map(|(pattern, currency)| Regex::new(pattern).ok().map(|re| (re, currency)))
        .collect();

        Self {
            // Whole numeric tokens; which separator is decimal is decided later
            price_regex: Regex::new(AMOUNT_TOKEN).expect("price pattern is valid"),
            currency_symbols,
            default_currency: default_currency.to_string(),
            locale_currency_map,
            path_patterns,
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    /// First amount in `text` plus its currency.
    pub fn parse(&self, text: &str, context: Option<&WebsiteContext>) -> Option<(Decimal, String)> {
        let amount = self.parse_amount(text)?;
        Some((amount, self.currency_for(text, context)))
    }

    /// First numeric token in `text` that reads as an amount. Tokens that
    /// are not well-formed ("3.5.1") are skipped rather than truncated.
    pub fn parse_amount(&self, text: &str) -> Option<Decimal> {
        self.price_regex
            .find_iter(text)
            .find_map(|token| normalize_amount(token.as_str()))
    }

    /// Currency in order of priority: explicit symbol in the text, then the
    /// website's locale, then the configured default.
    pub fn currency_for(&self, text: &str, context: Option<&WebsiteContext>) -> String {
        self.extract_currency(text)
            .or_else(|| self.infer_currency_from_website(context))
            .unwrap_or_else(|| self.default_currency.clone())
    }

    /// Normalise a currency code as found in markup ("usd " -> "USD").
    pub fn normalize_code(&self, code: &str) -> Option<String> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(code.to_ascii_uppercase())
        } else {
            self.extract_currency(code)
        }
    }

    fn extract_currency(&self, text: &str) -> Option<String> {
        self.currency_symbols
            .iter()
            .find(|(symbol, _)| text.contains(symbol.as_str()))
            .map(|(_, code)| code.clone())
    }

    fn infer_currency_from_website(&self, context: Option<&WebsiteContext>) -> Option<String> {
        let context = context?;
        let parsed = url::Url::parse(&context.url).ok();

        if let Some(path) = parsed.as_ref().map(|u| u.path().to_lowercase()) {
            let path = format!("{}/", path.trim_end_matches('/'));
            if let Some((_, currency)) = self.path_patterns.iter().find(|(re, _)| re.is_match(&path)) {
                return Some(currency.to_string());
            }
        }

        if let Some(lang) = &context.lang {
            if let Some(currency) = self.locale_currency_map.get(&lang.to_lowercase()) {
                return Some(currency.clone());
            }
        }

        parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .and_then(infer_currency_from_host)
            .map(str::to_string)
    }
}

/// A run of digits with `.`/`,` separators, starting and ending on a digit.
pub const AMOUNT_TOKEN: &str = r"\d[\d.,]*\d|\d";

/// Read one numeric token, accepting both "1,299.99" and "1.299,99".
///
/// The last separator is the decimal mark when the other kind appears
/// before it, or when it is followed by anything but exactly three digits.
/// Otherwise it groups thousands. Groups must be well-formed and a decimal
/// part has one or two digits.
fn normalize_amount(token: &str) -> Option<Decimal> {
    let Some(pos) = token.rfind(['.', ',']) else {
        return Decimal::from_str(token).ok();
    };

    let (head, tail) = (&token[..pos], &token[pos + 1..]);
    let sep = if token[pos..].starts_with('.') { '.' } else { ',' };
    let other = if sep == '.' { ',' } else { '.' };

    let is_decimal = if head.contains(sep) {
        false
    } else {
        head.contains(other) || tail.len() != 3
    };

    let digits = if is_decimal {
        if tail.len() > 2 {
            return None;
        }
        format!("{}.{}", ungroup(head, other)?, tail)
    } else {
        if token.contains(other) {
            return None;
        }
        ungroup(token, sep)?
    };

    Decimal::from_str(&digits).ok()
}

// "1,299,000" -> "1299000"; the first group takes 1-3 digits, the rest 3
fn ungroup(text: &str, sep: char) -> Option<String> {
    let mut groups = text.split(sep);
    let first = groups.next()?;
    if first.is_empty() || (text.contains(sep) && first.len() > 3) {
        return None;
    }

    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }

    digits.chars().all(|c| c.is_ascii_digit()).then_some(digits)
}

fn infer_currency_from_host(host: &str) -> Option<&'static str> {
    let tlds = [
        (".com.au", "AUD"),
        (".au", "AUD"),
        (".co.uk", "GBP"),
        (".uk", "GBP"),
        (".ca", "CAD"),
        (".de", "EUR"),
        (".fr", "EUR"),
        (".es", "EUR"),
        (".it", "EUR"),
        (".co.jp", "JPY"),
        (".jp", "JPY"),
        (".in", "INR"),
        (".com", "USD"),
        (".us", "USD"),
    ];

    tlds.iter()
        .find(|(tld, _)| host.ends_with(tld))
        .map(|(_, currency)| *currency)
}
