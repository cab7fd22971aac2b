use crate::store::Document;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Collection holding one document per student, keyed by RA.
pub const STUDENTS: &str = "students";

pub const QUARTERS_FIELD: &str = "quarters";
pub const NAME_FIELD: &str = "name";
pub const RA_FIELD: &str = "ra";
pub const EVALUATION_TIMESTAMP_FIELD: &str = "evaluation_timestamp";

/// Integer score in `[0, 10]`. The only way to build one is through a range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 10;

    pub fn new(v: i64) -> Option<Score> {
        if (Self::MIN..=Self::MAX).contains(&v) {
            Some(Score(v as u8))
        } else {
            None
        }
    }

    pub fn clamped(v: i64) -> Score {
        Score(v.clamp(Self::MIN, Self::MAX) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    BusinessDrivers,
    Functionality,
    NonFunctionalRequirements,
    Engineering,
    Technology,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::BusinessDrivers,
        Metric::Functionality,
        Metric::NonFunctionalRequirements,
        Metric::Engineering,
        Metric::Technology,
    ];

    pub fn field(self) -> &'static str {
        match self {
            Metric::BusinessDrivers => "business_drivers",
            Metric::Functionality => "functionality",
            Metric::NonFunctionalRequirements => "non_functional_requirements",
            Metric::Engineering => "engineering",
            Metric::Technology => "technology",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::BusinessDrivers => "Business Drivers",
            Metric::Functionality => "Functionality",
            Metric::NonFunctionalRequirements => "Non-Functional Requirements",
            Metric::Engineering => "Engineering",
            Metric::Technology => "Technology",
        }
    }

    fn index(self) -> usize {
        match self {
            Metric::BusinessDrivers => 0,
            Metric::Functionality => 1,
            Metric::NonFunctionalRequirements => 2,
            Metric::Engineering => 3,
            Metric::Technology => 4,
        }
    }
}

/// The five-metric score set for one student in one quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreVector([Score; 5]);

impl ScoreVector {
    pub fn new(
        business_drivers: Score,
        functionality: Score,
        non_functional_requirements: Score,
        engineering: Score,
        technology: Score,
    ) -> Self {
        ScoreVector([
            business_drivers,
            functionality,
            non_functional_requirements,
            engineering,
            technology,
        ])
    }

    pub fn from_fn(mut f: impl FnMut(Metric) -> Score) -> Self {
        ScoreVector(Metric::ALL.map(&mut f))
    }

    pub fn get(&self, metric: Metric) -> Score {
        self.0[metric.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, Score)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.get(*m)))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (metric, score) in self.iter() {
            map.insert(metric.field().to_string(), score.get().into());
        }
        serde_json::Value::Object(map)
    }
}

/// Academic evaluation period code, e.g. `2024-T1`.
///
/// Codes shaped `<year>-<letters><number>` order by year, prefix and then
/// numeric term, so `2024-T2` sorts before `2024-T10`. Any other code sorts
/// after all of those, lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuarterCode(String);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'a> {
    Parsed {
        year: u32,
        prefix: &'a str,
        term: u64,
    },
    Raw(&'a str),
}

impl QuarterCode {
    pub fn parse(raw: &str) -> Option<QuarterCode> {
        let t = raw.trim();
        if t.is_empty() {
            None
        } else {
            Some(QuarterCode(t.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> SortKey<'_> {
        let raw = SortKey::Raw(self.0.as_str());
        let Some((year, rest)) = self.0.split_once('-') else {
            return raw;
        };
        if year.is_empty() || !year.chars().all(|c| c.is_ascii_digit()) {
            return raw;
        }
        let digits_at = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (prefix, term) = rest.split_at(digits_at);
        if term.is_empty()
            || !term.chars().all(|c| c.is_ascii_digit())
            || !prefix.chars().all(|c| c.is_ascii_alphabetic())
        {
            return raw;
        }
        match (year.parse::<u32>(), term.parse::<u64>()) {
            (Ok(year), Ok(term)) => SortKey::Parsed { year, prefix, term },
            _ => raw,
        }
    }
}

impl Ord for QuarterCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for QuarterCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QuarterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for QuarterCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterRecord {
    pub scores: ScoreVector,
    pub evaluation_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub quarters: BTreeMap<QuarterCode, QuarterRecord>,
    pub created_at: String,
    pub updated_at: String,
}

impl StudentRecord {
    /// Reads a student document leniently: missing metrics read as 0 and
    /// stored values outside `[0, 10]` are clamped.
    pub fn from_document(doc: &Document) -> StudentRecord {
        let name = doc
            .data
            .get(NAME_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut quarters = BTreeMap::new();
        if let Some(map) = doc.data.get(QUARTERS_FIELD).and_then(|v| v.as_object()) {
            for (code, entry) in map {
                let Some(code) = QuarterCode::parse(code) else {
                    continue;
                };
                let scores = ScoreVector::from_fn(|metric| {
                    read_score(&doc.id, &code, metric, entry.get(metric.field()))
                });
                let evaluation_timestamp = entry
                    .get(EVALUATION_TIMESTAMP_FIELD)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                quarters.insert(
                    code,
                    QuarterRecord {
                        scores,
                        evaluation_timestamp,
                    },
                );
            }
        }

        StudentRecord {
            id: doc.id.clone(),
            name,
            quarters,
            created_at: doc.create_time.clone(),
            updated_at: doc.update_time.clone(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} (RA: {})", self.name, self.id)
    }
}

fn read_score(
    id: &str,
    code: &QuarterCode,
    metric: Metric,
    value: Option<&serde_json::Value>,
) -> Score {
    let Some(value) = value else {
        return Score::default();
    };
    let raw = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64));
    let Some(raw) = raw else {
        tracing::warn!(ra = id, quarter = %code, metric = metric.field(), "non-numeric stored score read as 0");
        return Score::default();
    };
    let score = Score::clamped(raw);
    if i64::from(score.get()) != raw {
        tracing::warn!(ra = id, quarter = %code, metric = metric.field(), raw, "stored score out of range, clamped");
    }
    score
}
