//! Canonical value tables (countries, US states, entity status)
//!
//! Built once per rule-table version and shared read-only (`Arc<NormalizationTables>`) by the
//! field comparator and the similarity scorer. Lookups use `fold_text` keys, so
//! "United States", "U.S.A." and "united  states" all resolve to "US".

use crate::similarity::normalize::fold_text;
use std::collections::{BTreeMap, HashMap};

/// Canonical entity-status tokens
pub mod status {
    pub const MICRO: &str = "micro_entity";
    pub const SMALL: &str = "small_entity";
    pub const UNDISCOUNTED: &str = "undiscounted";
}

/// ISO 3166-1 alpha-2 code followed by names and alpha-3 code accepted as aliases
const COUNTRIES: &[(&str, &[&str])] = &[
    ("US", &["united states", "united states of america", "usa", "america", "u s", "u s a"]),
    ("CA", &["canada", "can"]),
    ("MX", &["mexico", "mex"]),
    ("BR", &["brazil", "brasil", "bra"]),
    ("AR", &["argentina", "arg"]),
    ("CL", &["chile", "chl"]),
    ("GB", &["united kingdom", "great britain", "uk", "england", "scotland", "wales", "gbr"]),
    ("IE", &["ireland", "irl"]),
    ("FR", &["france", "fra"]),
    ("DE", &["germany", "deutschland", "federal republic of germany", "deu"]),
    ("NL", &["netherlands", "the netherlands", "holland", "nld"]),
    ("BE", &["belgium", "bel"]),
    ("LU", &["luxembourg", "lux"]),
    ("CH", &["switzerland", "schweiz", "suisse", "che"]),
    ("AT", &["austria", "osterreich", "aut"]),
    ("IT", &["italy", "italia", "ita"]),
    ("ES", &["spain", "espana", "esp"]),
    ("PT", &["portugal", "prt"]),
    ("DK", &["denmark", "dnk"]),
    ("SE", &["sweden", "swe"]),
    ("NO", &["norway", "nor"]),
    ("FI", &["finland", "fin"]),
    ("IS", &["iceland", "isl"]),
    ("PL", &["poland", "pol"]),
    ("CZ", &["czech republic", "czechia", "cze"]),
    ("SK", &["slovakia", "svk"]),
    ("HU", &["hungary", "hun"]),
    ("RO", &["romania", "rou"]),
    ("BG", &["bulgaria", "bgr"]),
    ("GR", &["greece", "grc"]),
    ("TR", &["turkey", "turkiye", "tur"]),
    ("UA", &["ukraine", "ukr"]),
    ("RU", &["russia", "russian federation", "rus"]),
    ("IL", &["israel", "isr"]),
    ("AE", &["united arab emirates", "uae", "are"]),
    ("SA", &["saudi arabia", "sau"]),
    ("EG", &["egypt", "egy"]),
    ("ZA", &["south africa", "zaf"]),
    ("NG", &["nigeria", "nga"]),
    ("KE", &["kenya", "ken"]),
    ("IN", &["india", "ind"]),
    ("PK", &["pakistan", "pak"]),
    ("CN", &["china", "peoples republic of china", "prc", "chn"]),
    ("HK", &["hong kong", "hkg"]),
    ("TW", &["taiwan", "republic of china", "twn"]),
    ("JP", &["japan", "jpn"]),
    ("KR", &["south korea", "korea", "republic of korea", "kor"]),
    ("SG", &["singapore", "sgp"]),
    ("MY", &["malaysia", "mys"]),
    ("TH", &["thailand", "tha"]),
    ("VN", &["vietnam", "viet nam", "vnm"]),
    ("PH", &["philippines", "phl"]),
    ("ID", &["indonesia", "idn"]),
    ("AU", &["australia", "aus"]),
    ("NZ", &["new zealand", "nzl"]),
];

/// USPS two-letter code followed by full names
const US_STATES: &[(&str, &[&str])] = &[
    ("AL", &["alabama"]),
    ("AK", &["alaska"]),
    ("AZ", &["arizona"]),
    ("AR", &["arkansas"]),
    ("CA", &["california", "calif"]),
    ("CO", &["colorado"]),
    ("CT", &["connecticut"]),
    ("DE", &["delaware"]),
    ("FL", &["florida"]),
    ("GA", &["georgia"]),
    ("HI", &["hawaii"]),
    ("ID", &["idaho"]),
    ("IL", &["illinois"]),
    ("IN", &["indiana"]),
    ("IA", &["iowa"]),
    ("KS", &["kansas"]),
    ("KY", &["kentucky"]),
    ("LA", &["louisiana"]),
    ("ME", &["maine"]),
    ("MD", &["maryland"]),
    ("MA", &["massachusetts", "mass"]),
    ("MI", &["michigan"]),
    ("MN", &["minnesota"]),
    ("MS", &["mississippi"]),
    ("MO", &["missouri"]),
    ("MT", &["montana"]),
    ("NE", &["nebraska"]),
    ("NV", &["nevada"]),
    ("NH", &["new hampshire"]),
    ("NJ", &["new jersey"]),
    ("NM", &["new mexico"]),
    ("NY", &["new york"]),
    ("NC", &["north carolina"]),
    ("ND", &["north dakota"]),
    ("OH", &["ohio"]),
    ("OK", &["oklahoma"]),
    ("OR", &["oregon"]),
    ("PA", &["pennsylvania"]),
    ("RI", &["rhode island"]),
    ("SC", &["south carolina"]),
    ("SD", &["south dakota"]),
    ("TN", &["tennessee"]),
    ("TX", &["texas"]),
    ("UT", &["utah"]),
    ("VT", &["vermont"]),
    ("VA", &["virginia"]),
    ("WA", &["washington"]),
    ("WV", &["west virginia"]),
    ("WI", &["wisconsin"]),
    ("WY", &["wyoming"]),
    ("DC", &["district of columbia", "washington dc"]),
    ("PR", &["puerto rico"]),
    ("GU", &["guam"]),
    ("VI", &["us virgin islands", "virgin islands"]),
];

/// Immutable lookup tables from folded alias to canonical form
#[derive(Debug, Clone, Default)]
pub struct NormalizationTables {
    countries: HashMap<String, String>,
    states: HashMap<String, String>,
    entity_status: HashMap<String, String>,
}

impl NormalizationTables {
    /// Tables with the built-in country, state and entity-status entries
    pub fn builtin() -> Self {
        let mut tables = Self::default();
        for (code, aliases) in COUNTRIES {
            tables.insert_alias(Table::Country, code, code);
            for alias in *aliases {
                tables.insert_alias(Table::Country, alias, code);
            }
        }
        for (code, names) in US_STATES {
            tables.insert_alias(Table::State, code, code);
            for name in *names {
                tables.insert_alias(Table::State, name, code);
            }
        }
        for token in [status::MICRO, status::SMALL, status::UNDISCOUNTED] {
            tables.insert_alias(Table::EntityStatus, token, token);
        }
        tables
    }

    /// Extend with externally configured aliases (alias → canonical value)
    pub fn with_aliases(
        mut self,
        countries: &BTreeMap<String, String>,
        states: &BTreeMap<String, String>,
        entity_status: &BTreeMap<String, String>,
    ) -> Self {
        for (alias, canonical) in countries {
            self.insert_alias(Table::Country, alias, canonical);
        }
        for (alias, canonical) in states {
            self.insert_alias(Table::State, alias, canonical);
        }
        for (alias, canonical) in entity_status {
            self.insert_alias(Table::EntityStatus, alias, canonical);
        }
        self
    }

    fn insert_alias(&mut self, table: Table, alias: &str, canonical: &str) {
        let map = match table {
            Table::Country => &mut self.countries,
            Table::State => &mut self.states,
            Table::EntityStatus => &mut self.entity_status,
        };
        map.insert(fold_text(alias), canonical.trim().to_string());
    }

    /// ISO alpha-2 code for a country name or code
    pub fn canonical_country(&self, value: &str) -> Option<&str> {
        self.countries.get(&fold_text(value)).map(String::as_str)
    }

    /// Two-letter code for a US state name or code
    pub fn canonical_state(&self, value: &str) -> Option<&str> {
        self.states.get(&fold_text(value)).map(String::as_str)
    }

    /// Canonical token for a verbose entity-status phrase
    ///
    /// Exact aliases win; otherwise keywords decide. A negated phrase only maps when it
    /// rules out every discount ("not a small entity"); "not a micro entity" says nothing
    /// about small status and stays unmapped.
    pub fn canonical_entity_status(&self, value: &str) -> Option<&str> {
        let key = fold_text(value);
        if let Some(token) = self.entity_status.get(&key) {
            return Some(token.as_str());
        }

        let negated = key
            .split_whitespace()
            .any(|word| NEGATIONS.contains(&word));
        let micro = key.contains("micro");
        let small = key.contains("small");

        if ["undiscounted", "large entity", "regular"].iter().any(|k| key.contains(k)) {
            Some(status::UNDISCOUNTED)
        } else if negated {
            if small && !micro {
                Some(status::UNDISCOUNTED)
            } else {
                None
            }
        } else if micro {
            Some(status::MICRO)
        } else if small {
            Some(status::SMALL)
        } else {
            None
        }
    }
}

/// Words that negate an entity-status claim (after `fold_text`, so "doesn't" is "doesnt")
const NEGATIONS: &[&str] = &["not", "no", "doesnt", "isnt", "cannot", "never", "neither", "nor"];

#[derive(Clone, Copy)]
enum Table {
    Country,
    State,
    EntityStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_aliases() {
        let tables = NormalizationTables::builtin();
        assert_eq!(tables.canonical_country("United States"), Some("US"));
        assert_eq!(tables.canonical_country("U.S.A."), Some("US"));
        assert_eq!(tables.canonical_country("us"), Some("US"));
        assert_eq!(tables.canonical_country("Deutschland"), Some("DE"));
        assert_eq!(tables.canonical_country("Atlantis"), None);
    }

    #[test]
    fn test_state_names() {
        let tables = NormalizationTables::builtin();
        assert_eq!(tables.canonical_state("Massachusetts"), Some("MA"));
        assert_eq!(tables.canonical_state("new  york"), Some("NY"));
        assert_eq!(tables.canonical_state("CA"), Some("CA"));
    }

    #[test]
    fn test_entity_status_phrases() {
        let tables = NormalizationTables::builtin();
        assert_eq!(
            tables.canonical_entity_status("Applicant claims small entity status under 37 CFR 1.27"),
            Some(status::SMALL)
        );
        assert_eq!(tables.canonical_entity_status("Micro Entity"), Some(status::MICRO));
        assert_eq!(
            tables.canonical_entity_status("Applicant is not a small entity"),
            Some(status::UNDISCOUNTED)
        );
        assert_eq!(tables.canonical_entity_status("unknown"), None);
    }

    #[test]
    fn test_negated_micro_status_is_not_micro() {
        let tables = NormalizationTables::builtin();
        assert_eq!(tables.canonical_entity_status("Applicant is not a micro entity"), None);
        assert_eq!(
            tables.canonical_entity_status("Applicant does not qualify as a micro entity"),
            None
        );
        assert_eq!(
            tables.canonical_entity_status("Applicant no longer qualifies as a small entity"),
            Some(status::UNDISCOUNTED)
        );
        assert_eq!(tables.canonical_entity_status("micro_entity"), Some(status::MICRO));
    }

    #[test]
    fn test_configured_aliases_extend_builtin() {
        let mut countries = BTreeMap::new();
        countries.insert("Bundesrepublik".to_string(), "DE".to_string());
        let tables = NormalizationTables::builtin().with_aliases(&countries, &BTreeMap::new(), &BTreeMap::new());

        assert_eq!(tables.canonical_country("bundesrepublik"), Some("DE"));
        assert_eq!(tables.canonical_country("Germany"), Some("DE"));
    }
}
