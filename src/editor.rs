use crate::catalog::QuarterCatalog;
use crate::error::GradebookError;
use crate::lookup::load_student;
use crate::model::{
    QuarterCode, ScoreVector, StudentRecord, EVALUATION_TIMESTAMP_FIELD, QUARTERS_FIELD, STUDENTS,
};
use crate::store::{DocumentStore, FieldPath, StoreError, WriteMap, WriteValue};

/// Catalog codes, in catalog order, that the student has no scores for yet.
pub fn available_quarters(catalog: &QuarterCatalog, record: &StudentRecord) -> Vec<QuarterCode> {
    catalog
        .codes()
        .iter()
        .filter(|c| !record.quarters.contains_key(*c))
        .cloned()
        .collect()
}

fn score_fields(scores: &ScoreVector) -> WriteMap {
    scores
        .iter()
        .map(|(metric, score)| (metric.field().to_string(), WriteValue::from(score.get())))
        .collect()
}

/// Merge-inserts a fresh quarter with a server timestamp. Sibling quarters and
/// the name are not touched.
pub fn record_quarter(
    store: &dyn DocumentStore,
    catalog: &QuarterCatalog,
    id: &str,
    code: &QuarterCode,
    scores: &ScoreVector,
) -> Result<StudentRecord, GradebookError> {
    if catalog.is_empty() {
        return Err(GradebookError::CatalogEmpty {
            reason: catalog.load_error().map(|s| s.to_string()),
        });
    }
    let record =
        load_student(store, id)?.ok_or_else(|| GradebookError::StudentNotFound(id.to_string()))?;
    if !catalog.contains(code) {
        return Err(GradebookError::QuarterNotInCatalog(code.to_string()));
    }
    if record.quarters.contains_key(code) {
        return Err(GradebookError::QuarterAlreadyRecorded {
            ra: record.id,
            quarter: code.to_string(),
        });
    }

    let mut entry = score_fields(scores);
    entry.insert(
        EVALUATION_TIMESTAMP_FIELD.to_string(),
        WriteValue::ServerTimestamp,
    );
    let mut quarters = WriteMap::new();
    quarters.insert(code.to_string(), WriteValue::Map(entry));
    let mut data = WriteMap::new();
    data.insert(QUARTERS_FIELD.to_string(), WriteValue::Map(quarters));

    store.set(STUDENTS, &record.id, data, true)?;
    tracing::info!(ra = %record.id, quarter = %code, "quarter scores recorded");
    load_student(store, &record.id)?.ok_or(GradebookError::StudentNotFound(record.id))
}

/// Rewrites the five scores of an existing quarter. The evaluation timestamp
/// and other quarters stay as they are.
pub fn edit_quarter(
    store: &dyn DocumentStore,
    id: &str,
    code: &QuarterCode,
    scores: &ScoreVector,
) -> Result<StudentRecord, GradebookError> {
    let record =
        load_student(store, id)?.ok_or_else(|| GradebookError::StudentNotFound(id.to_string()))?;
    if !record.quarters.contains_key(code) {
        return Err(GradebookError::QuarterNotRecorded {
            ra: record.id,
            quarter: code.to_string(),
        });
    }

    let fields = scores
        .iter()
        .map(|(metric, score)| {
            (
                FieldPath::new([QUARTERS_FIELD, code.as_str(), metric.field()]),
                WriteValue::from(score.get()),
            )
        })
        .collect();

    match store.update(STUDENTS, &record.id, fields) {
        Ok(()) => {}
        Err(StoreError::NotFound { .. }) => {
            return Err(GradebookError::StudentNotFound(record.id))
        }
        Err(StoreError::FieldPathNotFound { .. }) => {
            return Err(GradebookError::QuarterNotRecorded {
                ra: record.id,
                quarter: code.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(ra = %record.id, quarter = %code, "quarter scores updated");
    load_student(store, &record.id)?.ok_or(GradebookError::StudentNotFound(record.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::register;
    use crate::model::{Metric, Score};
    use crate::store::SqliteStore;

    fn scores(v: [i64; 5]) -> ScoreVector {
        let mut it = v.into_iter();
        ScoreVector::from_fn(|_| Score::new(it.next().unwrap_or(0)).expect("score in range"))
    }

    fn code(s: &str) -> QuarterCode {
        QuarterCode::parse(s).expect("quarter code")
    }

    fn setup() -> (SqliteStore, QuarterCatalog) {
        let store = SqliteStore::open_in_memory("test-project").expect("open store");
        register(&store, "1001", "Ana Silva").expect("register");
        (store, QuarterCatalog::from_codes(["2024-T1", "2024-T2"]))
    }

    #[test]
    fn availability_shrinks_as_quarters_are_recorded() {
        let (store, catalog) = setup();
        let rec = load_student(&store, "1001").expect("load").expect("student");
        assert_eq!(available_quarters(&catalog, &rec), vec![code("2024-T1"), code("2024-T2")]);

        let rec = record_quarter(&store, &catalog, "1001", &code("2024-T1"), &scores([7, 8, 6, 9, 5]))
            .expect("record");
        assert_eq!(available_quarters(&catalog, &rec), vec![code("2024-T2")]);

        let rec = record_quarter(&store, &catalog, "1001", &code("2024-T2"), &scores([1, 1, 1, 1, 1]))
            .expect("record");
        assert!(available_quarters(&catalog, &rec).is_empty());
    }

    #[test]
    fn record_writes_scores_and_timestamp_without_touching_siblings() {
        let (store, catalog) = setup();
        let first = record_quarter(&store, &catalog, "1001", &code("2024-T1"), &scores([7, 8, 6, 9, 5]))
            .expect("record T1");
        let t1_before = first.quarters.get(&code("2024-T1")).cloned().expect("T1");

        let rec = record_quarter(&store, &catalog, "1001", &code("2024-T2"), &scores([2, 3, 4, 5, 6]))
            .expect("record T2");
        assert_eq!(rec.name, "Ana Silva");
        assert_eq!(rec.quarters.get(&code("2024-T1")), Some(&t1_before));

        let t2 = rec.quarters.get(&code("2024-T2")).expect("T2");
        assert_eq!(t2.scores, scores([2, 3, 4, 5, 6]));
        assert!(t2.evaluation_timestamp.is_some());
        assert_eq!(t1_before.scores.get(Metric::BusinessDrivers).get(), 7);
        assert_eq!(t1_before.scores.get(Metric::Technology).get(), 5);
    }

    #[test]
    fn record_guards_catalog_membership_and_duplicates() {
        let (store, catalog) = setup();
        assert!(matches!(
            record_quarter(&store, &catalog, "1001", &code("2030-T1"), &scores([1; 5])),
            Err(GradebookError::QuarterNotInCatalog(_))
        ));
        record_quarter(&store, &catalog, "1001", &code("2024-T1"), &scores([1; 5])).expect("record");
        assert!(matches!(
            record_quarter(&store, &catalog, "1001", &code("2024-T1"), &scores([2; 5])),
            Err(GradebookError::QuarterAlreadyRecorded { .. })
        ));
        assert!(matches!(
            record_quarter(&store, &catalog, "9999", &code("2024-T2"), &scores([2; 5])),
            Err(GradebookError::StudentNotFound(_))
        ));
        assert!(matches!(
            record_quarter(&store, &QuarterCatalog::default(), "1001", &code("2024-T2"), &scores([2; 5])),
            Err(GradebookError::CatalogEmpty { .. })
        ));
    }

    #[test]
    fn edit_overwrites_only_the_five_scores() {
        let (store, catalog) = setup();
        record_quarter(&store, &catalog, "1001", &code("2024-T1"), &scores([7, 8, 6, 9, 5])).expect("T1");
        let before = record_quarter(&store, &catalog, "1001", &code("2024-T2"), &scores([4, 4, 4, 4, 4]))
            .expect("T2");
        let t1_before = before.quarters.get(&code("2024-T1")).cloned().expect("T1");
        let t2_before = before.quarters.get(&code("2024-T2")).cloned().expect("T2");

        let after = edit_quarter(&store, "1001", &code("2024-T2"), &scores([10, 9, 8, 7, 6])).expect("edit");
        let t2_after = after.quarters.get(&code("2024-T2")).expect("T2");
        assert_eq!(t2_after.scores, scores([10, 9, 8, 7, 6]));
        assert_eq!(t2_after.evaluation_timestamp, t2_before.evaluation_timestamp);
        assert_eq!(after.quarters.get(&code("2024-T1")), Some(&t1_before));
        assert_eq!(after.name, "Ana Silva");
    }

    #[test]
    fn edit_requires_existing_quarter() {
        let (store, _) = setup();
        assert!(matches!(
            edit_quarter(&store, "1001", &code("2024-T1"), &scores([1; 5])),
            Err(GradebookError::QuarterNotRecorded { .. })
        ));
        assert!(matches!(
            edit_quarter(&store, "9999", &code("2024-T1"), &scores([1; 5])),
            Err(GradebookError::StudentNotFound(_))
        ));
    }
}
