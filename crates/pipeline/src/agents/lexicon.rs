//! Token-level helpers shared by the extraction agents.

/// Strip sentence punctuation from both ends of a token.
pub(crate) fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | '.' | '?' | '!' | ';' | ':' | '"' | '\''))
}

/// Parse a digit token, tolerating thousands commas ("42,000").
pub(crate) fn parse_integer(token: &str) -> Option<u32> {
    let cleaned: String = token.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

/// Spoken numbers up to ninety-nine, hyphenated compounds included
/// ("twenty-four").
pub(crate) fn spoken_number(token: &str) -> Option<u32> {
    if let Some(value) = spoken_word(token) {
        return Some(value);
    }
    let mut total = 0u32;
    let mut parts = 0;
    for part in token.split('-') {
        total += spoken_word(part)?;
        parts += 1;
    }
    if parts > 1 {
        Some(total)
    } else {
        None
    }
}

fn spoken_word(word: &str) -> Option<u32> {
    let value = match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::{parse_integer, spoken_number, trim_punctuation};

    #[test]
    fn punctuation_is_trimmed_from_both_ends() {
        assert_eq!(trim_punctuation("Dallas,"), "Dallas");
        assert_eq!(trim_punctuation("\"reefer\"."), "reefer");
    }

    #[test]
    fn integers_tolerate_thousands_commas() {
        assert_eq!(parse_integer("42,000"), Some(42_000));
        assert_eq!(parse_integer("24"), Some(24));
        assert_eq!(parse_integer("24k"), None);
    }

    #[test]
    fn spoken_compounds_sum_their_parts() {
        assert_eq!(spoken_number("twenty-four"), Some(24));
        assert_eq!(spoken_number("forty-two"), Some(42));
        assert_eq!(spoken_number("seven"), Some(7));
        assert_eq!(spoken_number("truck"), None);
    }
}
