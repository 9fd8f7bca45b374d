//! Multilingual field resolution.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Ar,
    Fr,
}

impl FromStr for Lang {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            "fr" => Ok(Self::Fr),
            _ => Err(()),
        }
    }
}

impl Lang {
    /// Parse a `lang` query value, defaulting to English.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    /// Pick the variant for this language, falling back to English, then to
    /// whichever variant is non-empty.
    pub fn resolve<'a>(&self, en: &'a str, ar: &'a str, fr: &'a str) -> &'a str {
        let preferred = match self {
            Self::En => en,
            Self::Ar => ar,
            Self::Fr => fr,
        };
        if !preferred.is_empty() {
            return preferred;
        }
        [en, ar, fr].into_iter().find(|v| !v.is_empty()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_requested_language() {
        assert_eq!(Lang::Ar.resolve("Phones", "هواتف", "Téléphones"), "هواتف");
        assert_eq!(Lang::Fr.resolve("Phones", "هواتف", "Téléphones"), "Téléphones");
    }

    #[test]
    fn falls_back_to_english_then_any() {
        assert_eq!(Lang::Ar.resolve("Phones", "", "Téléphones"), "Phones");
        assert_eq!(Lang::Fr.resolve("", "هواتف", ""), "هواتف");
        assert_eq!(Lang::En.resolve("", "", ""), "");
    }

    #[test]
    fn unknown_lang_defaults_to_english() {
        assert_eq!(Lang::parse_or_default(Some("de")), Lang::En);
        assert_eq!(Lang::parse_or_default(None), Lang::En);
        assert_eq!(Lang::parse_or_default(Some("ar")), Lang::Ar);
    }
}
