// Country name to ISO 3166 code resolution for joining rows onto map
// geometries. Names without a code resolve to `GeoMatch::Unmatched`; the
// caller decides what to leave out.
use crate::error::ReportResult;
use crate::util::clean_text;
use csv::{ReaderBuilder, Trim};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoCode {
    pub numeric: u16,
    pub alpha3: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoMatch {
    Matched(IsoCode),
    Unmatched,
}

impl GeoMatch {
    pub fn code(&self) -> Option<&IsoCode> {
        match self {
            GeoMatch::Matched(code) => Some(code),
            GeoMatch::Unmatched => None,
        }
    }

    pub fn numeric(&self) -> Option<u16> {
        self.code().map(|c| c.numeric)
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, GeoMatch::Matched(_))
    }
}

pub trait CountryCodes {
    fn lookup(&self, name: &str) -> GeoMatch;
}

// (name, numeric, alpha-3)
const ISO_COUNTRIES: &[(&str, u16, &str)] = &[
    ("Afghanistan", 4, "AFG"),
    ("Albania", 8, "ALB"),
    ("Algeria", 12, "DZA"),
    ("Angola", 24, "AGO"),
    ("Argentina", 32, "ARG"),
    ("Armenia", 51, "ARM"),
    ("Australia", 36, "AUS"),
    ("Austria", 40, "AUT"),
    ("Azerbaijan", 31, "AZE"),
    ("Bahrain", 48, "BHR"),
    ("Bangladesh", 50, "BGD"),
    ("Belarus", 112, "BLR"),
    ("Belgium", 56, "BEL"),
    ("Belize", 84, "BLZ"),
    ("Benin", 204, "BEN"),
    ("Bhutan", 64, "BTN"),
    ("Bolivia", 68, "BOL"),
    ("Bosnia and Herzegovina", 70, "BIH"),
    ("Botswana", 72, "BWA"),
    ("Brazil", 76, "BRA"),
    ("Bulgaria", 100, "BGR"),
    ("Burkina Faso", 854, "BFA"),
    ("Burundi", 108, "BDI"),
    ("Cambodia", 116, "KHM"),
    ("Cameroon", 120, "CMR"),
    ("Canada", 124, "CAN"),
    ("Central African Republic", 140, "CAF"),
    ("Chad", 148, "TCD"),
    ("Chile", 152, "CHL"),
    ("China", 156, "CHN"),
    ("Colombia", 170, "COL"),
    ("Comoros", 174, "COM"),
    ("Congo (Brazzaville)", 178, "COG"),
    ("Congo (Kinshasa)", 180, "COD"),
    ("Costa Rica", 188, "CRI"),
    ("Croatia", 191, "HRV"),
    ("Cuba", 192, "CUB"),
    ("Cyprus", 196, "CYP"),
    ("Czechia", 203, "CZE"),
    ("Denmark", 208, "DNK"),
    ("Djibouti", 262, "DJI"),
    ("Dominican Republic", 214, "DOM"),
    ("Ecuador", 218, "ECU"),
    ("Egypt", 818, "EGY"),
    ("El Salvador", 222, "SLV"),
    ("Estonia", 233, "EST"),
    ("Eswatini", 748, "SWZ"),
    ("Ethiopia", 231, "ETH"),
    ("Finland", 246, "FIN"),
    ("France", 250, "FRA"),
    ("Gabon", 266, "GAB"),
    ("Gambia", 270, "GMB"),
    ("Georgia", 268, "GEO"),
    ("Germany", 276, "DEU"),
    ("Ghana", 288, "GHA"),
    ("Greece", 300, "GRC"),
    ("Guatemala", 320, "GTM"),
    ("Guinea", 324, "GIN"),
    ("Guyana", 328, "GUY"),
    ("Haiti", 332, "HTI"),
    ("Honduras", 340, "HND"),
    ("Hong Kong", 344, "HKG"),
    ("Hungary", 348, "HUN"),
    ("Iceland", 352, "ISL"),
    ("India", 356, "IND"),
    ("Indonesia", 360, "IDN"),
    ("Iran", 364, "IRN"),
    ("Iraq", 368, "IRQ"),
    ("Ireland", 372, "IRL"),
    ("Israel", 376, "ISR"),
    ("Italy", 380, "ITA"),
    ("Ivory Coast", 384, "CIV"),
    ("Jamaica", 388, "JAM"),
    ("Japan", 392, "JPN"),
    ("Jordan", 400, "JOR"),
    ("Kazakhstan", 398, "KAZ"),
    ("Kenya", 404, "KEN"),
    ("Kuwait", 414, "KWT"),
    ("Kyrgyzstan", 417, "KGZ"),
    ("Laos", 418, "LAO"),
    ("Latvia", 428, "LVA"),
    ("Lebanon", 422, "LBN"),
    ("Lesotho", 426, "LSO"),
    ("Liberia", 430, "LBR"),
    ("Libya", 434, "LBY"),
    ("Lithuania", 440, "LTU"),
    ("Luxembourg", 442, "LUX"),
    ("Madagascar", 450, "MDG"),
    ("Malawi", 454, "MWI"),
    ("Malaysia", 458, "MYS"),
    ("Maldives", 462, "MDV"),
    ("Mali", 466, "MLI"),
    ("Malta", 470, "MLT"),
    ("Mauritania", 478, "MRT"),
    ("Mauritius", 480, "MUS"),
    ("Mexico", 484, "MEX"),
    ("Moldova", 498, "MDA"),
    ("Mongolia", 496, "MNG"),
    ("Montenegro", 499, "MNE"),
    ("Morocco", 504, "MAR"),
    ("Mozambique", 508, "MOZ"),
    ("Myanmar", 104, "MMR"),
    ("Namibia", 516, "NAM"),
    ("Nepal", 524, "NPL"),
    ("Netherlands", 528, "NLD"),
    ("New Zealand", 554, "NZL"),
    ("Nicaragua", 558, "NIC"),
    ("Niger", 562, "NER"),
    ("Nigeria", 566, "NGA"),
    ("North Macedonia", 807, "MKD"),
    ("Norway", 578, "NOR"),
    ("Oman", 512, "OMN"),
    ("Pakistan", 586, "PAK"),
    ("Panama", 591, "PAN"),
    ("Paraguay", 600, "PRY"),
    ("Peru", 604, "PER"),
    ("Philippines", 608, "PHL"),
    ("Poland", 616, "POL"),
    ("Portugal", 620, "PRT"),
    ("Qatar", 634, "QAT"),
    ("Romania", 642, "ROU"),
    ("Russia", 643, "RUS"),
    ("Rwanda", 646, "RWA"),
    ("Saudi Arabia", 682, "SAU"),
    ("Senegal", 686, "SEN"),
    ("Serbia", 688, "SRB"),
    ("Sierra Leone", 694, "SLE"),
    ("Singapore", 702, "SGP"),
    ("Slovakia", 703, "SVK"),
    ("Slovenia", 705, "SVN"),
    ("Somalia", 706, "SOM"),
    ("South Africa", 710, "ZAF"),
    ("South Korea", 410, "KOR"),
    ("South Sudan", 728, "SSD"),
    ("Spain", 724, "ESP"),
    ("Sri Lanka", 144, "LKA"),
    ("State of Palestine", 275, "PSE"),
    ("Sudan", 729, "SDN"),
    ("Suriname", 740, "SUR"),
    ("Sweden", 752, "SWE"),
    ("Switzerland", 756, "CHE"),
    ("Syria", 760, "SYR"),
    ("Taiwan", 158, "TWN"),
    ("Tajikistan", 762, "TJK"),
    ("Tanzania", 834, "TZA"),
    ("Thailand", 764, "THA"),
    ("Togo", 768, "TGO"),
    ("Trinidad and Tobago", 780, "TTO"),
    ("Tunisia", 788, "TUN"),
    ("Turkiye", 792, "TUR"),
    ("Turkmenistan", 795, "TKM"),
    ("Uganda", 800, "UGA"),
    ("Ukraine", 804, "UKR"),
    ("United Arab Emirates", 784, "ARE"),
    ("United Kingdom", 826, "GBR"),
    ("United States", 840, "USA"),
    ("Uruguay", 858, "URY"),
    ("Uzbekistan", 860, "UZB"),
    ("Venezuela", 862, "VEN"),
    ("Vietnam", 704, "VNM"),
    ("Yemen", 887, "YEM"),
    ("Zambia", 894, "ZMB"),
    ("Zimbabwe", 716, "ZWE"),
];

// Spellings used by different survey editions, mapped to the names above.
const ALIASES: &[(&str, &str)] = &[
    ("Czech Republic", "Czechia"),
    ("Swaziland", "Eswatini"),
    ("Hong Kong S.A.R. of China", "Hong Kong"),
    ("Hong Kong S.A.R., China", "Hong Kong"),
    ("Côte d'Ivoire", "Ivory Coast"),
    ("Cote d'Ivoire", "Ivory Coast"),
    ("Lao PDR", "Laos"),
    ("Macedonia", "North Macedonia"),
    ("Republic of Moldova", "Moldova"),
    ("Russian Federation", "Russia"),
    ("Korea", "South Korea"),
    ("Republic of Korea", "South Korea"),
    ("Palestinian Territories", "State of Palestine"),
    ("Taiwan Province of China", "Taiwan"),
    ("Turkey", "Turkiye"),
    ("Viet Nam", "Vietnam"),
    ("United States of America", "United States"),
    ("Congo", "Congo (Brazzaville)"),
    ("Democratic Republic of the Congo", "Congo (Kinshasa)"),
    ("Gambia, The", "Gambia"),
    ("Syrian Arab Republic", "Syria"),
    ("Iran, Islamic Republic of", "Iran"),
];

/// Case-, whitespace- and apostrophe-insensitive lookup key.
fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{2019}', '\u{2018}'], "'")
        .to_lowercase()
}

static BUILTIN: Lazy<HashMap<String, IsoCode>> = Lazy::new(|| {
    let mut map: HashMap<String, IsoCode> = ISO_COUNTRIES
        .iter()
        .map(|(name, numeric, alpha3)| {
            (normalize_name(name), IsoCode { numeric: *numeric, alpha3: alpha3.to_string() })
        })
        .collect();
    for (alias, canonical) in ALIASES {
        if let Some(code) = map.get(&normalize_name(canonical)).cloned() {
            map.insert(normalize_name(alias), code);
        }
    }
    map
});

#[derive(Debug, Deserialize)]
struct OverrideRow {
    name: Option<String>,
    numeric: Option<u16>,
    alpha3: Option<String>,
}

/// Built-in ISO table plus caller-supplied mappings, which win on conflict.
#[derive(Debug, Clone, Default)]
pub struct IsoTable {
    overrides: HashMap<String, IsoCode>,
}

impl IsoTable {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, code: IsoCode) {
        self.overrides.insert(normalize_name(name), code);
    }

    /// Add mappings from a `name,numeric,alpha3` CSV. Incomplete lines are
    /// skipped with a warning.
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> ReportResult<usize> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
        let mut added = 0usize;
        for (line, result) in rdr.deserialize::<OverrideRow>().enumerate() {
            let row = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("geo codes line {}: unreadable ({e})", line + 2);
                    continue;
                }
            };
            match (clean_text(row.name), row.numeric, clean_text(row.alpha3)) {
                (Some(name), Some(numeric), Some(alpha3)) => {
                    self.insert(&name, IsoCode { numeric, alpha3: alpha3.to_uppercase() });
                    added += 1;
                }
                _ => warn!("geo codes line {}: incomplete, skipped", line + 2),
            }
        }
        info!("geo codes: {added} extra mapping(s) loaded");
        Ok(added)
    }
}

impl CountryCodes for IsoTable {
    fn lookup(&self, name: &str) -> GeoMatch {
        let key = normalize_name(name);
        self.overrides
            .get(&key)
            .or_else(|| BUILTIN.get(&key))
            .cloned()
            .map_or(GeoMatch::Unmatched, GeoMatch::Matched)
    }
}

/// Resolve each distinct name once. Unmatched names are logged, never
/// dropped from the result.
pub fn match_countries<'a>(
    codes: &dyn CountryCodes,
    names: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, GeoMatch> {
    let mut out = BTreeMap::new();
    for name in names {
        if out.contains_key(name) {
            continue;
        }
        let found = codes.lookup(name);
        if !found.is_matched() {
            warn!("no ISO code for '{name}'; it is left off the maps");
        }
        out.insert(name.to_string(), found);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_survey_spellings() {
        let table = IsoTable::builtin();
        assert_eq!(table.lookup("Finland").numeric(), Some(246));
        assert_eq!(table.lookup("  taiwan   province of China ").numeric(), Some(158));
        let turkey = table.lookup("Turkiye");
        assert_eq!(turkey.code().map(|c| c.alpha3.as_str()), Some("TUR"));
        assert_eq!(table.lookup("Congo (Kinshasa)").numeric(), Some(180));
        assert_eq!(table.lookup("Côte d’Ivoire").numeric(), Some(384));
    }

    #[test]
    fn disputed_territories_are_unmatched() {
        let table = IsoTable::builtin();
        assert_eq!(table.lookup("Somaliland region"), GeoMatch::Unmatched);
        assert_eq!(table.lookup("Somaliland"), GeoMatch::Unmatched);
        assert_eq!(table.lookup("Kosovo"), GeoMatch::Unmatched);
        assert_eq!(table.lookup(""), GeoMatch::Unmatched);
    }

    #[test]
    fn overrides_take_precedence() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codes.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "name,numeric,alpha3").unwrap();
        writeln!(f, "Kosovo,383,xkx").unwrap();
        writeln!(f, "Finland,999,FFF").unwrap();
        writeln!(f, "Broken,,").unwrap();
        drop(f);

        let mut table = IsoTable::builtin();
        assert_eq!(table.load_overrides(&path).unwrap(), 2);
        assert_eq!(
            table.lookup("kosovo"),
            GeoMatch::Matched(IsoCode { numeric: 383, alpha3: "XKX".into() })
        );
        assert_eq!(table.lookup("Finland").numeric(), Some(999));
    }

    #[test]
    fn match_countries_keeps_unmatched_names() {
        let table = IsoTable::builtin();
        let matched = match_countries(&table, ["Finland", "Somaliland", "Finland"]);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched["Somaliland"], GeoMatch::Unmatched);
        assert!(matched["Finland"].is_matched());
    }
}
