use std::path::PathBuf;

use regex::{Regex, RegexBuilder};

use crate::config::NamingConfig;
use crate::error::{Result, SheafError};

/// A creation event whose file name passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedPage {
    /// Parsed sequence index from the file name.
    pub index: u32,
    pub path: PathBuf,
}

/// Compiled page-name pattern. Anything that does not match is scanner noise
/// and never enters a batch.
#[derive(Clone, Debug)]
pub struct PagePattern {
    regex: Regex,
}

impl PagePattern {
    pub fn new(config: &NamingConfig) -> Result<Self> {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| regex::escape(ext))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"^{}(\d{{{}}})\.({})$",
            regex::escape(&config.prefix),
            config.index_width,
            extensions
        );
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| SheafError::Internal(format!("invalid page pattern: {err}")))?;
        Ok(Self { regex })
    }

    /// Classify `name`, returning the parsed index on a match.
    pub fn validate(&self, name: &str, path: impl Into<PathBuf>) -> Option<ValidatedPage> {
        let captures = self.regex.captures(name)?;
        let index = captures.get(1)?.as_str().parse().ok()?;
        Some(ValidatedPage {
            index,
            path: path.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> PagePattern {
        PagePattern::new(&NamingConfig::default()).unwrap()
    }

    #[test]
    fn accepts_well_formed_names() {
        let page = pattern().validate("img_042.jpg", "/scan/img_042.jpg").unwrap();
        assert_eq!(page.index, 42);
        assert_eq!(page.path, PathBuf::from("/scan/img_042.jpg"));
    }

    #[test]
    fn extension_and_prefix_are_case_insensitive() {
        assert!(pattern().validate("IMG_007.PNG", "x").is_some());
        assert_eq!(pattern().validate("img_007.Bmp", "x").unwrap().index, 7);
    }

    #[test]
    fn rejects_wrong_digit_count() {
        assert!(pattern().validate("img_42.jpg", "x").is_none());
        assert!(pattern().validate("img_0042.jpg", "x").is_none());
    }

    #[test]
    fn rejects_unknown_extensions_and_prefixes() {
        assert!(pattern().validate("img_001.tiff", "x").is_none());
        assert!(pattern().validate("scan_001.jpg", "x").is_none());
        assert!(pattern().validate("img_001.jpg.part", "x").is_none());
    }

    #[test]
    fn custom_naming_config_is_honored() {
        let config = NamingConfig {
            prefix: "page-".to_string(),
            index_width: 4,
            extensions: vec!["png".to_string()],
        };
        let pattern = PagePattern::new(&config).unwrap();
        assert_eq!(pattern.validate("page-0110.png", "x").unwrap().index, 110);
        assert!(pattern.validate("page-0110.jpg", "x").is_none());
        assert!(pattern.validate("img_011.png", "x").is_none());
    }
}
