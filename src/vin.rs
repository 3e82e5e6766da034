//! ISO 3779 layout rules.
//!
//! Positions 1–3 are the World Manufacturer Identifier, 4–8 describe the
//! vehicle, 9 is the check digit (mandatory in North America, often
//! filler elsewhere), 10 is the model year and 11–17 the plant and serial.

pub const VIN_LENGTH: usize = 17;

/// Score of a VIN whose check digit validates.
pub const MAX_STRUCTURAL_SCORE: u32 = 100;

const WEIGHTS: [u32; VIN_LENGTH] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

/// Characters allowed in a VIN: digits and capitals except I, O and Q.
pub fn is_vin_char(c: char) -> bool {
    c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
}

pub fn is_well_formed(vin: &str) -> bool {
    vin.len() == VIN_LENGTH && vin.chars().all(is_vin_char)
}

fn transliterate(c: char) -> Option<u32> {
    let value = match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A' | 'J' => 1,
        'B' | 'K' | 'S' => 2,
        'C' | 'L' | 'T' => 3,
        'D' | 'M' | 'U' => 4,
        'E' | 'N' | 'V' => 5,
        'F' | 'W' => 6,
        'G' | 'P' | 'X' => 7,
        'H' | 'Y' => 8,
        'R' | 'Z' => 9,
        _ => return None,
    };
    Some(value)
}

/// The check digit position 9 should hold, or `None` for a malformed VIN.
pub fn expected_check_digit(vin: &str) -> Option<char> {
    if !is_well_formed(vin) {
        return None;
    }
    let mut sum = 0u32;
    for (c, weight) in vin.chars().zip(WEIGHTS) {
        sum += transliterate(c)? * weight;
    }
    match sum % 11 {
        10 => Some('X'),
        r => char::from_digit(r, 10),
    }
}

pub fn has_valid_check_digit(vin: &str) -> bool {
    expected_check_digit(vin).is_some_and(|expected| vin.as_bytes()[8] as char == expected)
}

fn is_model_year_code(c: char) -> bool {
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P' | 'R'..='T' | 'V'..='Y')
}

/// How well `vin` fits the ISO 3779 layout.
///
/// A validating check digit scores [`MAX_STRUCTURAL_SCORE`]. Otherwise the
/// score sums: letter in position 1 (5), each digit in positions 12–17 (1),
/// valid model-year code in position 10 (2), digit or `X` in position 9 (2).
/// That sum never reaches the maximum. Malformed input scores 0.
pub fn structural_score(vin: &str) -> u32 {
    if !is_well_formed(vin) {
        return 0;
    }
    if has_valid_check_digit(vin) {
        return MAX_STRUCTURAL_SCORE;
    }
    let chars: Vec<char> = vin.chars().collect();
    let mut score = 0;
    if chars[0].is_ascii_alphabetic() {
        score += 5;
    }
    score += chars[11..].iter().filter(|c| c.is_ascii_digit()).count() as u32;
    if is_model_year_code(chars[9]) {
        score += 2;
    }
    if chars[8].is_ascii_digit() || chars[8] == 'X' {
        score += 2;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "1M8GDM9AXKP042788";

    #[test]
    fn known_vin_validates() {
        assert_eq!(expected_check_digit(VALID), Some('X'));
        assert!(has_valid_check_digit(VALID));
        assert!(has_valid_check_digit("11111111111111111"));
        assert!(has_valid_check_digit("JHMCM56557C404453"));
    }

    #[test]
    fn valid_check_digit_scores_maximal() {
        assert_eq!(structural_score(VALID), MAX_STRUCTURAL_SCORE);
    }

    #[test]
    fn any_single_digit_change_lowers_the_score() {
        for pos in [0usize, 6, 11, 16] {
            let original = VALID.as_bytes()[pos] as char;
            for d in '0'..='9' {
                if d == original {
                    continue;
                }
                let mut altered: Vec<char> = VALID.chars().collect();
                altered[pos] = d;
                let altered: String = altered.into_iter().collect();
                assert!(
                    structural_score(&altered) < structural_score(VALID),
                    "{altered} should score below {VALID}"
                );
            }
        }
    }

    #[test]
    fn european_vin_without_check_digit_scores_partially() {
        // Position 9 is filler ('Z') on many European VINs.
        let score = structural_score("WP1ZZZ9PZ9LA42290");
        assert!(!has_valid_check_digit("WP1ZZZ9PZ9LA42290"));
        // letter first (5) + five serial digits (5) + year '9' (2)
        assert_eq!(score, 12);
    }

    #[test]
    fn malformed_input_scores_zero() {
        assert_eq!(structural_score("WP1ZZZ9PZ9LA4229"), 0);
        assert_eq!(structural_score("WP1ZZZ9PZOLA42290"), 0);
        assert_eq!(expected_check_digit("short"), None);
        assert!(!has_valid_check_digit(""));
    }

    #[test]
    fn alphabet_excludes_i_o_q() {
        assert!(!is_vin_char('I'));
        assert!(!is_vin_char('O'));
        assert!(!is_vin_char('Q'));
        assert!(!is_vin_char('w'));
        assert!(is_vin_char('W'));
        assert!(is_vin_char('0'));
    }
}
