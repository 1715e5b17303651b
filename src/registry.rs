use crate::models::Language;

/// Base image, file extension, and in-container interpreter command for
/// one supported language. Adding a language means adding a profile here
/// and a `Language` match arm, nothing more.
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    pub image: &'static str,
    pub extension: &'static str,
    pub interpreter: &'static str,
}

pub fn profile(language: Language) -> LanguageProfile {
    match language {
        Language::Python => LanguageProfile {
            image: "python:3.9-slim",
            extension: "py",
            interpreter: "python",
        },
        Language::Javascript => LanguageProfile {
            image: "node:16-alpine",
            extension: "js",
            interpreter: "node",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_profile_matches_spec() {
        let p = profile(Language::Python);
        assert_eq!(p.image, "python:3.9-slim");
        assert_eq!(p.extension, "py");
        assert_eq!(p.interpreter, "python");
    }

    #[test]
    fn javascript_profile_matches_spec() {
        let p = profile(Language::Javascript);
        assert_eq!(p.image, "node:16-alpine");
        assert_eq!(p.extension, "js");
        assert_eq!(p.interpreter, "node");
    }

    #[test]
    fn unknown_language_rejected_at_parse() {
        assert!(Language::from_str("ruby").is_err());
    }
}
