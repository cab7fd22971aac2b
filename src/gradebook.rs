use crate::catalog::QuarterCatalog;
use crate::editor;
use crate::error::GradebookError;
use crate::lookup::{self, LookupOutcome, LookupQuery};
use crate::model::{QuarterCode, ScoreVector, StudentRecord, STUDENTS};
use crate::report::EvolutionReport;
use crate::store::DocumentStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    #[serde(rename = "ra")]
    pub id: String,
    pub name: String,
    pub label: String,
}

/// Student operations over an injected store.
///
/// The roster (every student's name and RA, used to populate pickers) is
/// cached after the first full scan. Registration and rename drop it; callers
/// can also drop it explicitly with `invalidate_roster`.
pub struct Gradebook {
    store: Box<dyn DocumentStore>,
    roster: Option<Vec<RosterEntry>>,
}

impl Gradebook {
    pub fn new(store: Box<dyn DocumentStore>) -> Gradebook {
        Gradebook {
            store,
            roster: None,
        }
    }

    pub fn roster(&mut self) -> Result<&[RosterEntry], GradebookError> {
        if self.roster.is_none() {
            let mut entries: Vec<RosterEntry> = self
                .store
                .stream(STUDENTS)?
                .iter()
                .map(|doc| {
                    let rec = StudentRecord::from_document(doc);
                    RosterEntry {
                        label: rec.label(),
                        id: rec.id,
                        name: rec.name,
                    }
                })
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            tracing::debug!(count = entries.len(), "roster cache filled");
            self.roster = Some(entries);
        }
        Ok(self.roster.as_deref().unwrap_or(&[]))
    }

    pub fn roster_cached(&self) -> bool {
        self.roster.is_some()
    }

    pub fn invalidate_roster(&mut self) {
        self.roster = None;
    }

    pub fn lookup(&self, query: &LookupQuery) -> Result<LookupOutcome, GradebookError> {
        lookup::resolve(self.store.as_ref(), query)
    }

    pub fn select(&self, id: &str) -> Result<StudentRecord, GradebookError> {
        lookup::select_candidate(self.store.as_ref(), id)
    }

    pub fn register(&mut self, id: &str, name: &str) -> Result<StudentRecord, GradebookError> {
        let rec = lookup::register(self.store.as_ref(), id, name)?;
        self.invalidate_roster();
        Ok(rec)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<StudentRecord, GradebookError> {
        let rec = lookup::rename(self.store.as_ref(), id, name)?;
        self.invalidate_roster();
        Ok(rec)
    }

    pub fn student(&self, id: &str) -> Result<StudentRecord, GradebookError> {
        lookup::load_student(self.store.as_ref(), id)?
            .ok_or_else(|| GradebookError::StudentNotFound(id.to_string()))
    }

    pub fn available_quarters(
        &self,
        catalog: &QuarterCatalog,
        id: &str,
    ) -> Result<(StudentRecord, Vec<QuarterCode>), GradebookError> {
        if catalog.is_empty() {
            return Err(GradebookError::CatalogEmpty {
                reason: catalog.load_error().map(|s| s.to_string()),
            });
        }
        let rec = self.student(id)?;
        let available = editor::available_quarters(catalog, &rec);
        Ok((rec, available))
    }

    pub fn record_scores(
        &self,
        catalog: &QuarterCatalog,
        id: &str,
        code: &QuarterCode,
        scores: &ScoreVector,
    ) -> Result<StudentRecord, GradebookError> {
        editor::record_quarter(self.store.as_ref(), catalog, id, code, scores)
    }

    pub fn edit_scores(
        &self,
        id: &str,
        code: &QuarterCode,
        scores: &ScoreVector,
    ) -> Result<StudentRecord, GradebookError> {
        editor::edit_quarter(self.store.as_ref(), id, code, scores)
    }

    pub fn evolution(&self, id: &str) -> Result<(StudentRecord, EvolutionReport), GradebookError> {
        let rec = self.student(id)?;
        let report = EvolutionReport::project(&rec.quarters)
            .ok_or_else(|| GradebookError::NoScores(rec.id.clone()))?;
        Ok((rec, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Score;
    use crate::store::SqliteStore;

    fn gradebook() -> Gradebook {
        Gradebook::new(Box::new(
            SqliteStore::open_in_memory("test-project").expect("open store"),
        ))
    }

    #[test]
    fn roster_cache_is_dropped_on_register_and_rename() {
        let mut gb = gradebook();
        assert!(gb.roster().expect("roster").is_empty());
        assert!(gb.roster_cached());

        gb.register("1001", "Bruno").expect("register");
        assert!(!gb.roster_cached());
        gb.register("1002", "Ana").expect("register");
        let labels: Vec<String> = gb
            .roster()
            .expect("roster")
            .iter()
            .map(|e| e.label.clone())
            .collect();
        assert_eq!(labels, vec!["Ana (RA: 1002)", "Bruno (RA: 1001)"]);

        gb.rename("1001", "Bruno Lima").expect("rename");
        assert!(!gb.roster_cached());
        assert_eq!(gb.roster().expect("roster")[1].name, "Bruno Lima");

        gb.invalidate_roster();
        assert!(!gb.roster_cached());
    }

    #[test]
    fn concrete_scenario_availability_and_report() {
        let mut gb = gradebook();
        let catalog = QuarterCatalog::from_codes(["2024-T1", "2024-T2"]);
        gb.register("1001", "Ana Silva").expect("register");

        let (_, available) = gb.available_quarters(&catalog, "1001").expect("available");
        assert_eq!(available.len(), 2);
        assert!(matches!(gb.evolution("1001"), Err(GradebookError::NoScores(_))));

        let t1 = QuarterCode::parse("2024-T1").expect("code");
        let mut vals = [7, 8, 6, 9, 5].into_iter();
        let scores = ScoreVector::from_fn(|_| Score::new(vals.next().unwrap_or(0)).expect("score"));
        gb.record_scores(&catalog, "1001", &t1, &scores).expect("record");

        let (_, available) = gb.available_quarters(&catalog, "1001").expect("available");
        let codes: Vec<&str> = available.iter().map(|c| c.as_str()).collect();
        assert_eq!(codes, vec!["2024-T2"]);

        let (_, report) = gb.evolution("1001").expect("report");
        assert_eq!(report.radar.len(), 1);
        assert_eq!(report.series[0].values, vec![7]);
    }

    #[test]
    fn empty_catalog_is_reported() {
        let mut gb = gradebook();
        gb.register("1001", "Ana").expect("register");
        assert!(matches!(
            gb.available_quarters(&QuarterCatalog::default(), "1001"),
            Err(GradebookError::CatalogEmpty { .. })
        ));
    }
}
