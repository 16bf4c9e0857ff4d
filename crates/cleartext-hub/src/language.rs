//! Language detection, restricted to a fixed set of common languages.

use cleartext_core::error::{ClearTextError, Result};

/// Codes the API will report. Anything else is "undetectable".
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "fr", "de", "es", "it", "pt", "nl", "ru", "zh-cn", "zh-tw", "ja", "ko", "ar", "tr", "sv",
    "no", "fi", "pl",
];

/// Something that can name the language of a text.
pub trait LanguageDetector: Send + Sync {
    /// Return a code from [`SUPPORTED_LANGUAGES`] or
    /// [`ClearTextError::UndetectableLanguage`].
    fn detect(&self, text: &str) -> Result<&'static str>;
}

/// Below this `whatlang` confidence a guess is treated as noise.
const MIN_CONFIDENCE: f64 = 0.2;

/// Trigram-based detector backed by `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<&'static str> {
        let info = whatlang::detect(text).ok_or(ClearTextError::UndetectableLanguage)?;
        if info.confidence() < MIN_CONFIDENCE {
            tracing::debug!(
                "Rejecting {} guess with confidence {:.3}",
                info.lang().code(),
                info.confidence()
            );
            return Err(ClearTextError::UndetectableLanguage);
        }
        let code = short_code(info.lang().code()).ok_or(ClearTextError::UndetectableLanguage)?;
        tracing::debug!(
            "Detected {} (confidence {:.2}) for {} chars",
            code,
            info.confidence(),
            text.chars().count()
        );
        Ok(code)
    }
}

/// Map an ISO 639-3 code to the short code used in the API, for supported
/// languages only. `whatlang` only knows Mandarin, so Chinese is `zh-cn`.
fn short_code(iso639_3: &str) -> Option<&'static str> {
    let code = match iso639_3 {
        "eng" => "en",
        "fra" => "fr",
        "deu" => "de",
        "spa" => "es",
        "ita" => "it",
        "por" => "pt",
        "nld" => "nl",
        "rus" => "ru",
        "cmn" => "zh-cn",
        "jpn" => "ja",
        "kor" => "ko",
        "ara" => "ar",
        "tur" => "tr",
        "swe" => "sv",
        "nob" => "no",
        "fin" => "fi",
        "pol" => "pl",
        _ => return None,
    };
    debug_assert!(SUPPORTED_LANGUAGES.contains(&code));
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_french() {
        assert_eq!(WhatlangDetector.detect("Bonjour tout le monde").unwrap(), "fr");
        assert_eq!(
            WhatlangDetector
                .detect("Je voudrais réserver une table pour deux personnes ce soir, merci.")
                .unwrap(),
            "fr"
        );
    }

    #[test]
    fn test_english_and_german() {
        assert_eq!(
            WhatlangDetector
                .detect("The quick brown fox jumps over the lazy dog while the farmer watches.")
                .unwrap(),
            "en"
        );
        assert_eq!(
            WhatlangDetector
                .detect("Ich habe heute keine Zeit, weil ich den ganzen Tag arbeiten muss.")
                .unwrap(),
            "de"
        );
    }

    #[test]
    fn test_no_letters_is_undetectable() {
        let err = WhatlangDetector.detect("12345 67890 !!! ???").unwrap_err();
        assert!(matches!(err, ClearTextError::UndetectableLanguage));
    }

    #[test]
    fn test_keyboard_mash_is_undetectable() {
        let err = WhatlangDetector.detect("asdfghjkl").unwrap_err();
        assert!(matches!(err, ClearTextError::UndetectableLanguage));
    }

    #[test]
    fn test_language_outside_allow_list() {
        let err = WhatlangDetector
            .detect("नमस्ते दुनिया, आप कैसे हैं? मैं आज बाज़ार जा रहा हूँ।")
            .unwrap_err();
        assert!(matches!(err, ClearTextError::UndetectableLanguage));
    }

    #[test]
    fn test_every_mapped_code_is_supported() {
        for iso in [
            "eng", "fra", "deu", "spa", "ita", "por", "nld", "rus", "cmn", "jpn", "kor", "ara",
            "tur", "swe", "nob", "fin", "pol",
        ] {
            assert!(SUPPORTED_LANGUAGES.contains(&short_code(iso).unwrap()));
        }
        assert!(short_code("hin").is_none());
    }
}
