use log::{debug, info};

use super::{dedupe_names, NameExtractor};

/// Common medications recognized without the LLM.
pub const DEFAULT_LEXICON: &[&str] = &[
    "Paracetamol",
    "Ibuprofeno",
    "Amoxicilina",
    "Omeprazol",
    "Aspirina",
    "Ácido Acetilsalicílico",
    "Loratadina",
    "Diclofenaco",
    "Ciprofloxacino",
    "Cetirizina",
    "Azitromicina",
    "Clonazepam",
    "Alprazolam",
    "Enalapril",
    "Losartán",
    "Metformina",
    "Atorvastatina",
    "Naproxeno",
    "Cefalexina",
    "Ranitidina",
    "Dexametasona",
    "Levofloxacin",
    "Alercit",
    "Alertron",
    "Respi bon",
    "Ventalog",
    "Desloradine",
    "Tixel",
];

/// Case-insensitive substring search against a fixed lexicon.
///
/// Matches are returned in lexicon order, not in the order they appear in
/// the text.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    lexicon: Vec<String>,
}

impl KeywordExtractor {
    pub fn new<I, S>(lexicon: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeywordExtractor {
            lexicon: lexicon.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_LEXICON.iter().copied())
    }
}

impl NameExtractor for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    fn extract(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();

        let found: Vec<&str> = self
            .lexicon
            .iter()
            .map(String::as_str)
            .filter(|candidate| {
                let needle = candidate.trim().to_lowercase();
                !needle.is_empty() && haystack.contains(&needle)
            })
            .collect();
        debug!("Keyword matches before dedup: {:?}", found);

        let unique = dedupe_names(found);
        info!("Keyword extraction found {} medication(s)", unique.len());
        unique
    }
}
