//! Local extraction heuristics, used when no language model is available.
//!
//! Authors come from an `Authors:` / `By` label in the first 50 lines, or
//! failing that from lines that look like a bare two- or three-word
//! capitalised name. Affiliations are lines among the first 100 that carry
//! an institution keyword; the country is guessed from a fixed table.

use super::{EntityExtractor, ExtractedEntities};
use crate::error::PaperMapError;
use crate::model::{AffiliationCandidate, Author};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

const AUTHOR_SCAN_LINES: usize = 50;
const AFFILIATION_SCAN_LINES: usize = 100;
const MAX_AUTHORS: usize = 10;
const MAX_NAME_LINE_AUTHORS: usize = 5;
const MAX_AFFILIATIONS: usize = 10;

static AUTHOR_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:authors?|by):?\s*([\w\s,.]+)").expect("valid regex"));

static NAME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][a-z]+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?$").expect("valid regex")
});

static INSTITUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)University|Institut|College|Academy|School|Laboratory|Center|Centre|大学|研究所|学院",
    )
    .expect("valid regex")
});

/// First matching row wins.
static COUNTRIES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Japan", r"Japan|日本"),
        ("USA", r"\bUSA\b|United States|America"),
        ("UK", r"\bUK\b|United Kingdom|England|Britain"),
        ("Germany", r"Germany|Deutschland"),
        ("France", r"France|française"),
        ("China", r"China|中国"),
        ("South Korea", r"Korea|韓国"),
        ("Canada", r"Canada"),
        ("Australia", r"Australia"),
        ("Singapore", r"Singapore"),
        ("Switzerland", r"Switzerland"),
        ("Netherlands", r"Netherlands"),
        ("Sweden", r"Sweden"),
        ("Italy", r"Italy"),
        ("Spain", r"Spain"),
    ]
    .into_iter()
    .map(|(country, pattern)| {
        let re = Regex::new(&format!("(?i){pattern}")).expect("valid regex");
        (country, re)
    })
    .collect()
});

/// Author names from the leading lines of `text`, deduplicated, at most 10.
pub fn extract_authors(text: &str) -> Vec<Author> {
    let lines: Vec<&str> = text.lines().take(AUTHOR_SCAN_LINES).collect();
    let mut names: Vec<String> = Vec::new();

    for line in &lines {
        let Some(list) = AUTHOR_LABEL.captures(line).and_then(|c| c.get(1)) else {
            continue;
        };
        for name in list.as_str().split([',', ';']).map(str::trim) {
            let len = name.chars().count();
            if len > 2 && len < 50 {
                push_unique(&mut names, name);
            }
        }
        if !names.is_empty() {
            break;
        }
    }

    if names.is_empty() {
        for line in &lines {
            let trimmed = line.trim();
            if NAME_LINE.is_match(trimmed) {
                push_unique(&mut names, trimmed);
                if names.len() >= MAX_NAME_LINE_AUTHORS {
                    break;
                }
            }
        }
    }

    names.truncate(MAX_AUTHORS);
    names.into_iter().map(Author::new).collect()
}

/// Institution lines from the leading lines of `text`, deduplicated, at most 10.
pub fn extract_affiliations(text: &str) -> Vec<AffiliationCandidate> {
    let mut affiliations: Vec<AffiliationCandidate> = Vec::new();

    for line in text.lines().take(AFFILIATION_SCAN_LINES) {
        let trimmed = line.trim();
        let len = trimmed.chars().count();
        if len <= 5 || len >= 200 || !INSTITUTION.is_match(trimmed) {
            continue;
        }
        if affiliations.iter().any(|a| a.name == trimmed) {
            continue;
        }
        let country = guess_country(trimmed).map(str::to_string);
        affiliations.push(AffiliationCandidate::new(trimmed, country));
        if affiliations.len() >= MAX_AFFILIATIONS {
            break;
        }
    }

    affiliations
}

fn guess_country(line: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(country, _)| *country)
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// [`EntityExtractor`] running [`extract_authors`] and [`extract_affiliations`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

#[async_trait]
impl EntityExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract(&self, text: &str) -> Result<ExtractedEntities, PaperMapError> {
        Ok(ExtractedEntities {
            authors: extract_authors(text),
            affiliations: extract_affiliations(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(authors: &[Author]) -> Vec<&str> {
        authors.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn labelled_author_list() {
        let text = "Deep Maps of Science\nAuthors: Jane Doe, John Smith, Li Wei\nUniversity of Tokyo";
        assert_eq!(names(&extract_authors(text)), ["Jane Doe", "John Smith", "Li Wei"]);
    }

    #[test]
    fn by_label_and_short_fragments() {
        let text = "A Study\nby Ada Lovelace, Al, Charles Babbage.";
        assert_eq!(names(&extract_authors(text)), ["Ada Lovelace", "Charles Babbage."]);
    }

    #[test]
    fn label_inside_a_word_is_ignored() {
        let text = "Lobby studies of the Road\nAlan Turing\nGrace Brewster Hopper";
        assert_eq!(names(&extract_authors(text)), ["Alan Turing", "Grace Brewster Hopper"]);
    }

    #[test]
    fn only_first_labelled_line_is_used() {
        let text = "Authors: Jane Doe\nAuthors: Someone Else";
        assert_eq!(names(&extract_authors(text)), ["Jane Doe"]);
    }

    #[test]
    fn name_lines_capped_at_five() {
        let text = "Alice Adams\nBob Brown\nCarol Clark\nDan Davis\nEve Evans\nFrank Ford\nAlice Adams";
        assert_eq!(
            names(&extract_authors(text)),
            ["Alice Adams", "Bob Brown", "Carol Clark", "Dan Davis", "Eve Evans"]
        );
    }

    #[test]
    fn name_lines_deduplicate() {
        let text = "Alice Adams\nAlice Adams\nBob Brown";
        assert_eq!(names(&extract_authors(text)), ["Alice Adams", "Bob Brown"]);
    }

    #[test]
    fn labelled_list_capped_at_ten() {
        let list: Vec<String> = (0..15).map(|i| format!("Author Number{i}")).collect();
        let text = format!("Authors: {}", list.join(", "));
        let authors = extract_authors(&text);
        assert_eq!(authors.len(), 10);
        assert_eq!(authors[9].name, "Author Number9");
    }

    #[test]
    fn only_leading_lines_are_scanned() {
        let mut text = "filler line\n".repeat(60);
        text.push_str("Authors: Late Author");
        assert!(extract_authors(&text).is_empty());
    }

    #[test]
    fn affiliations_with_countries() {
        let text = "Title\n  University of Tokyo, Japan  \nMax Planck Institute, Germany\n\
                    Duke University, Durham\nSchool of Computing, National University of Singapore\n\
                    東京大学\nCenter for AI, USA";
        let affs = extract_affiliations(text);
        let got: Vec<(&str, Option<&str>)> =
            affs.iter().map(|a| (a.name.as_str(), a.country.as_deref())).collect();
        assert_eq!(
            got,
            [
                ("University of Tokyo, Japan", Some("Japan")),
                ("Max Planck Institute, Germany", Some("Germany")),
                ("Duke University, Durham", None),
                ("School of Computing, National University of Singapore", Some("Singapore")),
                ("Center for AI, USA", Some("USA")),
            ]
        );
    }

    #[test]
    fn short_and_long_lines_are_skipped() {
        let long = format!("University {}", "x".repeat(200));
        let text = format!("大学\n{long}\nUniversity College London, UK");
        let affs = extract_affiliations(&text);
        assert_eq!(affs.len(), 1);
        assert_eq!(affs[0].country.as_deref(), Some("UK"));
    }

    #[test]
    fn cjk_keyword_lines() {
        let affs = extract_affiliations("京都大学 情報学研究科 日本");
        assert_eq!(affs.len(), 1);
        assert_eq!(affs[0].country.as_deref(), Some("Japan"));
    }

    #[test]
    fn affiliations_deduplicate_and_cap() {
        let mut lines = vec!["University of Tokyo".to_string(); 3];
        lines.extend((0..15).map(|i| format!("Laboratory {i} of Science")));
        let affs = extract_affiliations(&lines.join("\n"));
        assert_eq!(affs.len(), 10);
        assert_eq!(affs[0].name, "University of Tokyo");
        assert_eq!(affs[1].name, "Laboratory 0 of Science");
    }

    #[tokio::test]
    async fn extractor_combines_both() {
        let text = "University of Tokyo\nAuthors: Jane Doe, John Smith";
        let entities = HeuristicExtractor.extract(text).await.unwrap();
        assert_eq!(names(&entities.authors), ["Jane Doe", "John Smith"]);
        assert_eq!(entities.affiliations[0].name, "University of Tokyo");
        assert_eq!(entities.affiliations[0].country, None);
    }
}
