use crate::domain::entities::company::Company;

const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "corp",
    "corporation",
    "ltd",
    "limited",
    "co",
    "company",
    "incorporated",
];

/// Similarity above which a scraped company name is accepted
pub const NAME_MATCH_THRESHOLD: f64 = 0.7;

/// Lowercase, drop corporate suffix words, keep only alphanumerics
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && !CORPORATE_SUFFIXES.contains(word))
        .collect()
}

/// Slug form used in source URLs: `Acme Gold Corp.` -> `acme-gold-corp`
pub fn url_friendly_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&normalize_name(a), &normalize_name(b))
}

/// Whether a name read from a source page refers to `company`
pub fn names_match(found: &str, company: &Company) -> bool {
    std::iter::once(company.name.as_str())
        .chain(company.name_alt.as_deref())
        .any(|candidate| similarity(found, candidate) > NAME_MATCH_THRESHOLD)
}
