//! Static alias table for canonical region identifiers.
//!
//! Every governorate appears under a handful of transliterations across the
//! source datasets. Each entry pairs the canonical id with the raw variants
//! observed in the wild; variants are cleaned through the same pipeline as
//! live input when the lookup table is built, so the spellings here can stay
//! human-readable.

/// Canonical id plus the raw spellings that resolve to it.
pub(crate) const REGION_ALIASES: &[(&str, &[&str])] = &[
    (
        "sanaa",
        &[
            "Sana'a",
            "Sanaa",
            "Şan‘ā’",
            "San'a'",
            "Sana",
            "SANA'A_CITY",
            "Sana'a City",
            "Amanat Al Asimah",
            "Amanat Alasimah",
            "Capital Municipality",
            "Capital Secretariat",
            "صنعاء",
        ],
    ),
    ("aden", &["Aden", "'Adan", "Adan", "عدن"]),
    ("taiz", &["Taiz", "Ta'izz", "Ta'iz", "Taizz", "تعز"]),
    (
        "hodeidah",
        &[
            "Al Hudaydah",
            "Hodeidah",
            "Al-Hudaydah",
            "Hudaydah",
            "Al Hodeidah",
            "Hodeida",
        ],
    ),
    ("ibb", &["Ibb", "Ib"]),
    ("dhamar", &["Dhamar", "Thamar"]),
    ("hajjah", &["Hajjah", "Hajja"]),
    ("saada", &["Sa'dah", "Saada", "Sa'ada", "Sadah", "Saadah"]),
    ("amran", &["'Amran", "Amran", "Omran"]),
    (
        "al_bayda",
        &["Al Bayda'", "Al-Bayda", "Al Bayda", "Al Baida", "Al Beida"],
    ),
    (
        "al_dhale",
        &["Al Dhale'e", "Ad Dali'", "Al-Dhale", "Ad Dale", "Al Dhalea", "Dhale"],
    ),
    ("lahj", &["Lahij", "Lahj", "Lahej"]),
    ("abyan", &["Abyan"]),
    ("shabwah", &["Shabwah", "Shabwa"]),
    ("marib", &["Ma'rib", "Marib", "Mareb"]),
    ("al_jawf", &["Al Jawf", "Al-Jawf", "Al Jouf"]),
    (
        "hadramaut",
        &["Hadramaut", "Hadhramaut", "Hadramawt", "Hadhramout", "Hadramout"],
    ),
    (
        "al_mahrah",
        &["Al Maharah", "Al-Mahrah", "Al Mahra", "Mahra", "Al Mahrah"],
    ),
    (
        "al_mahwit",
        &["Al Mahwit", "Al-Mahwit", "Mahweet", "Al Mahweet"],
    ),
    ("raymah", &["Raymah", "Rayma", "Remah"]),
    (
        "socotra",
        &["Socotra", "Soqatra", "Suqutra", "Socotra Archipelago"],
    ),
];

/// Canonical ids filtered from every downstream structure.
///
/// The offshore archipelago has no road connectivity to the mainland market
/// network, and "unknown" absorbs records whose region could not be named.
pub(crate) const EXCLUDED_REGIONS: &[&str] = &["socotra", "unknown"];

/// Trailing administrative suffixes dropped during cleaning.
pub(crate) const ADMIN_SUFFIXES: &[&str] = &[
    "governorate",
    "muhafazah",
    "muhafazat",
    "province",
    "city",
    "district",
    "region",
];
