//! @ai:module:intent Pull a 0-3 grade out of free-text critic answers
//! @ai:module:layer domain
//! @ai:module:public_api GradeExtractor
//! @ai:module:stateless true

use crate::error::Result;
use regex::Regex;

/// @ai:intent Finds the grade a critic settled on
pub struct GradeExtractor {
    grade_regex: Regex,
}

impl GradeExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            grade_regex: Regex::new(r"[0-3]")?,
        })
    }

    /// @ai:intent Rightmost digit 0-3 in the text
    /// @ai:post None when the text has no such digit
    /// @ai:effects pure
    /// @ai:example ("Grade: 2, not 3") -> Some(3)
    pub fn extract(&self, text: &str) -> Option<u8> {
        self.grade_regex
            .find_iter(text)
            .last()
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_rightmost_grade() {
        let extractor = GradeExtractor::new().unwrap();

        assert_eq!(extractor.extract("2"), Some(2));
        assert_eq!(extractor.extract("I'd say 1, maybe 3."), Some(3));
        assert_eq!(extractor.extract("Grade 7 of 9"), None);
        assert_eq!(extractor.extract("Score: 25"), Some(2));
        assert_eq!(extractor.extract(""), None);
    }
}
