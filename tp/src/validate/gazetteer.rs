//! Built-in gazetteer of supported Sri Lanka destinations

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fuzzy::similarity;

/// Broad travel region, used to suggest neighbouring places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    South,
    West,
    HillCountry,
    CulturalTriangle,
    North,
    East,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::South => "South Coast",
            Region::West => "West Coast",
            Region::HillCountry => "Hill Country",
            Region::CulturalTriangle => "Cultural Triangle",
            Region::North => "North",
            Region::East => "East Coast",
        };
        write!(f, "{}", s)
    }
}

/// One supported destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Place {
    pub name: &'static str,
    pub region: Region,
    /// Short category used by location recommendations
    pub kind: &'static str,
    pub aliases: &'static [&'static str],
    /// What the place is known for
    pub highlight: &'static str,
}

impl Place {
    fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_lowercase()).chain(self.aliases.iter().map(|a| a.to_string()))
    }
}

macro_rules! place {
    ($name:expr, $region:ident, $kind:expr, [$($alias:expr),*], $highlight:expr) => {
        Place {
            name: $name,
            region: Region::$region,
            kind: $kind,
            aliases: &[$($alias),*],
            highlight: $highlight,
        }
    };
}

pub static PLACES: &[Place] = &[
    place!("Galle", South, "heritage", ["galle fort"], "Dutch-era fort, ramparts and cafes"),
    place!("Mirissa", South, "beach", [], "whale watching and palm-lined bays"),
    place!("Unawatuna", South, "beach", [], "sheltered swimming beach and jungle beach walk"),
    place!("Hikkaduwa", South, "beach", [], "coral reef snorkelling and surf"),
    place!("Weligama", South, "beach", [], "beginner surf breaks and stilt fishermen"),
    place!("Tangalle", South, "beach", [], "quiet beaches and lagoons"),
    place!("Matara", South, "town", [], "Star Fort and Dondra lighthouse"),
    place!("Bentota", South, "beach", [], "river safaris and water sports"),
    place!("Yala National Park", South, "wildlife", ["yala"], "leopards and elephants on safari"),
    place!("Tissamaharama", South, "town", ["tissa"], "lake-side base for Yala safaris"),
    place!("Kataragama", South, "religious", [], "multi-faith pilgrimage town"),
    place!("Colombo", West, "town", ["cmb", "colombo city"], "markets, Galle Face Green and food scene"),
    place!("Negombo", West, "beach", [], "fishing lagoon and beaches near the airport"),
    place!("Mount Lavinia", West, "beach", ["mt lavinia"], "seaside hotel and sunset beach"),
    place!("Kandy", HillCountry, "heritage", ["senkadagala"], "Temple of the Tooth and lake walks"),
    place!("Ella", HillCountry, "viewpoint", [], "Nine Arch Bridge and Little Adam's Peak"),
    place!("Nuwara Eliya", HillCountry, "nature", ["nuwaraeliya", "little england"], "tea estates and cool climate"),
    place!("Haputale", HillCountry, "viewpoint", [], "Lipton's Seat and tea country views"),
    place!("Horton Plains", HillCountry, "nature", ["worlds end", "world's end"], "World's End escarpment hike"),
    place!("Adam's Peak", HillCountry, "religious", ["adams peak", "sri pada", "sri paada"], "sunrise pilgrimage climb"),
    place!("Knuckles Range", HillCountry, "nature", ["knuckles"], "cloud forest trekking"),
    place!("Ratnapura", HillCountry, "town", [], "gem mines and rainforest edge"),
    place!("Sigiriya", CulturalTriangle, "heritage", ["sigiri", "lion rock"], "fifth-century rock fortress"),
    place!("Dambulla", CulturalTriangle, "religious", [], "painted cave temples"),
    place!("Anuradhapura", CulturalTriangle, "heritage", [], "ancient stupas and sacred Bo tree"),
    place!("Polonnaruwa", CulturalTriangle, "heritage", [], "medieval capital ruins by bicycle"),
    place!("Minneriya", CulturalTriangle, "wildlife", [], "elephant gathering safaris"),
    place!("Mihintale", CulturalTriangle, "religious", [], "birthplace of Buddhism in Sri Lanka"),
    place!("Jaffna", North, "town", [], "Tamil culture, temples and cuisine"),
    place!("Wilpattu", North, "wildlife", ["wilpattu national park"], "quiet leopard safaris among lakes"),
    place!("Trincomalee", East, "beach", ["trinco"], "Nilaveli beach and Koneswaram temple"),
    place!("Arugam Bay", East, "beach", ["arugambay", "arugam"], "world-class surf point"),
    place!("Batticaloa", East, "town", ["batti"], "lagoon town with Dutch fort"),
    place!("Pasikudah", East, "beach", ["pasikuda"], "shallow calm bay"),
];

/// Places hit hard by the Southwest Monsoon
const SW_MONSOON_AFFECTED: &[&str] = &[
    "galle",
    "bentota",
    "mirissa",
    "colombo",
    "unawatuna",
    "hikkaduwa",
    "weligama",
    "mount lavinia",
    "kandy",
    "nuwara eliya",
    "ella",
    "haputale",
];

/// Places and countries that are clearly outside Sri Lanka
const FOREIGN_HINTS: &[&str] = &[
    "paris",
    "france",
    "london",
    "england",
    "united kingdom",
    "uk",
    "usa",
    "united states",
    "america",
    "new york",
    "india",
    "delhi",
    "mumbai",
    "goa",
    "chennai",
    "kerala",
    "maldives",
    "male",
    "thailand",
    "bangkok",
    "phuket",
    "bali",
    "indonesia",
    "dubai",
    "singapore",
    "japan",
    "tokyo",
    "italy",
    "rome",
    "spain",
    "germany",
    "australia",
    "sydney",
    "nepal",
    "china",
    "vietnam",
];

const COUNTRY_NAMES: &[&str] = &["sri lanka", "srilanka", "ceylon", "lanka"];

fn key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['.', ','], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact match on a canonical name or alias, case-insensitive
pub fn lookup(name: &str) -> Option<&'static Place> {
    let key = key(name);
    PLACES.iter().find(|p| p.names().any(|n| n == key))
}

/// Closest place whose similarity reaches `threshold`
pub fn fuzzy_lookup(name: &str, threshold: f64) -> Option<(&'static Place, f64)> {
    let key = key(name);
    if key.is_empty() {
        return None;
    }
    PLACES
        .iter()
        .filter_map(|p| {
            let best = p.names().map(|n| similarity(&key, &n)).fold(0.0_f64, f64::max);
            (best >= threshold).then_some((p, best))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// First place named anywhere in free text, on word boundaries
pub fn mentioned_in(text: &str) -> Option<&'static Place> {
    let words: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let padded = format!(" {} ", key(&words));
    PLACES
        .iter()
        .find(|p| p.names().any(|n| padded.contains(&format!(" {} ", n))))
}

/// Up to `limit` other places in the same region
pub fn neighbours(place: &Place, limit: usize) -> Vec<&'static Place> {
    PLACES
        .iter()
        .filter(|p| p.region == place.region && p.name != place.name)
        .take(limit)
        .collect()
}

/// Whether `name` names a place or country outside Sri Lanka
pub fn is_foreign(name: &str) -> bool {
    let key = key(name);
    if key.is_empty() || lookup(&key).is_some() {
        return false;
    }
    FOREIGN_HINTS
        .iter()
        .any(|hint| key == *hint || key.split(' ').any(|word| word == *hint) || key.ends_with(&format!(" {}", hint)))
}

/// The country itself rather than a place in it
pub fn is_country_name(name: &str) -> bool {
    COUNTRY_NAMES.contains(&key(name).as_str())
}

pub fn is_monsoon_affected(name: &str) -> bool {
    SW_MONSOON_AFFECTED.contains(&key(name).as_str())
}

/// Places on the east coast, which stays drier during the Southwest Monsoon
pub fn dry_season_alternatives() -> Vec<&'static str> {
    PLACES
        .iter()
        .filter(|p| p.region == Region::East || p.region == Region::CulturalTriangle)
        .filter(|p| p.kind == "beach" || p.kind == "heritage")
        .map(|p| p.name)
        .collect()
}
