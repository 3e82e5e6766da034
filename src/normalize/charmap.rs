//! Character confusion tables.
//!
//! Each table is plain data so tests can walk every pair. Bump
//! [`CHARMAP_VERSION`] whenever a pair is added or removed.

pub const CHARMAP_VERSION: u32 = 1;

/// Latin letters that look the same as a Cyrillic letter.
/// These twelve Cyrillic letters are exactly the plate alphabet.
pub const LATIN_CYRILLIC: &[(char, char)] = &[
    ('A', 'А'),
    ('B', 'В'),
    ('C', 'С'),
    ('E', 'Е'),
    ('H', 'Н'),
    ('K', 'К'),
    ('M', 'М'),
    ('O', 'О'),
    ('P', 'Р'),
    ('T', 'Т'),
    ('X', 'Х'),
    ('Y', 'У'),
];

/// Digits that OCR swaps with a plate letter, as (digit, Cyrillic letter).
pub const DIGIT_LETTER: &[(char, char)] = &[('0', 'О')];

/// Letters that never occur in a VIN, with the digit they are mistaken for.
pub const VIN_SUBSTITUTIONS: &[(char, char)] = &[('I', '1'), ('O', '0'), ('Q', '0')];

fn forward(table: &[(char, char)], c: char) -> Option<char> {
    table.iter().find(|(from, _)| *from == c).map(|&(_, to)| to)
}

fn backward(table: &[(char, char)], c: char) -> Option<char> {
    table.iter().find(|(_, to)| *to == c).map(|&(from, _)| from)
}

/// Latin look-alike → Cyrillic; anything else unchanged.
pub fn to_cyrillic(c: char) -> char {
    forward(LATIN_CYRILLIC, c).unwrap_or(c)
}

/// Cyrillic look-alike → Latin; anything else unchanged.
pub fn to_latin(c: char) -> char {
    backward(LATIN_CYRILLIC, c).unwrap_or(c)
}

pub fn is_plate_letter(c: char) -> bool {
    backward(LATIN_CYRILLIC, c).is_some()
}

/// Coerce a character that sits in a letter slot of a plate.
pub fn as_plate_letter(c: char) -> char {
    forward(DIGIT_LETTER, c).unwrap_or(c)
}

/// Coerce a character that sits in a digit slot of a plate.
pub fn as_plate_digit(c: char) -> char {
    backward(DIGIT_LETTER, c).unwrap_or(c)
}

/// Replace letters that are forbidden in a VIN.
pub fn vin_substitute(c: char) -> char {
    forward(VIN_SUBSTITUTIONS, c).unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_latin_cyrillic_pair_round_trips() {
        for &(latin, cyrillic) in LATIN_CYRILLIC {
            assert_ne!(latin, cyrillic, "{latin} must differ from its Cyrillic twin");
            assert_eq!(to_cyrillic(latin), cyrillic);
            assert_eq!(to_latin(cyrillic), latin);
            assert_eq!(to_latin(to_cyrillic(latin)), latin);
            assert!(is_plate_letter(cyrillic));
            assert!(!is_plate_letter(latin));
        }
    }

    #[test]
    fn tables_have_unique_keys() {
        for table in [LATIN_CYRILLIC, DIGIT_LETTER, VIN_SUBSTITUTIONS] {
            for (i, (from, _)) in table.iter().enumerate() {
                assert!(table[..i].iter().all(|(f, _)| f != from));
            }
        }
        for (i, (_, to)) in LATIN_CYRILLIC.iter().enumerate() {
            assert!(LATIN_CYRILLIC[..i].iter().all(|(_, t)| t != to));
        }
    }

    #[test]
    fn digit_letter_pairs_round_trip() {
        for &(digit, letter) in DIGIT_LETTER {
            assert_eq!(as_plate_letter(digit), letter);
            assert_eq!(as_plate_digit(letter), digit);
            assert!(is_plate_letter(letter));
        }
    }

    #[test]
    fn vin_substitutions_cover_forbidden_letters() {
        for c in ['I', 'O', 'Q'] {
            assert!(vin_substitute(c).is_ascii_digit());
        }
        assert_eq!(vin_substitute('W'), 'W');
    }

    #[test]
    fn unmapped_characters_pass_through() {
        assert_eq!(to_cyrillic('Z'), 'Z');
        assert_eq!(to_latin('Д'), 'Д');
        assert_eq!(as_plate_digit('7'), '7');
    }
}
