//! Latin/Cyrillic look-alike folding for OCR output.

/// Target alphabet for glyph folding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alphabet {
    /// Cyrillic plate letters (АВЕКМНОРСТУХ) and digits
    Plate,
    /// ISO 3779 VIN alphabet; left untouched
    Vin,
}

/// Latin glyphs OCR confuses with plate letters, applied in this order.
/// `'0'` folds to `'О'`: plate grammar has no use for a zero the OCR
/// cannot distinguish from the letter.
pub const PLATE_GLYPHS: [(char, char); 25] = [
    ('O', 'О'),
    ('o', 'о'),
    ('0', 'О'),
    ('B', 'В'),
    ('b', 'в'),
    ('A', 'А'),
    ('a', 'а'),
    ('E', 'Е'),
    ('e', 'е'),
    ('K', 'К'),
    ('k', 'к'),
    ('M', 'М'),
    ('m', 'м'),
    ('H', 'Н'),
    ('h', 'н'),
    ('P', 'Р'),
    ('p', 'р'),
    ('C', 'С'),
    ('c', 'с'),
    ('T', 'Т'),
    ('t', 'т'),
    ('Y', 'У'),
    ('y', 'у'),
    ('X', 'Х'),
    ('x', 'х'),
];

impl Alphabet {
    pub fn table(self) -> &'static [(char, char)] {
        match self {
            Alphabet::Plate => &PLATE_GLYPHS,
            Alphabet::Vin => &[],
        }
    }
}

/// Rewrites every character that has an entry in the alphabet's table.
///
/// Table values never appear as keys, so a single pass gives the same result
/// as applying the entries one after another.
pub fn normalize(text: &str, alphabet: Alphabet) -> String {
    let table = alphabet.table();
    text.chars()
        .map(|c| {
            table
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}
