//! Column planning.
//!
//! Insertions are applied one at a time to a working copy of the existing
//! columns. Each anchor is resolved against the list as it stands after the
//! previous insertions, so a new column may be anchored to another new column.

use tracing::debug;

use crate::error::{ReorderError, Result};
use crate::schema::{ColumnDescriptor, InsertionRequest, Position};

/// Merges `insertions` into `existing`, returning the new physical order.
///
/// Fails without partial results on the first insertion whose anchor is
/// unknown or whose name is already taken (names compare case-insensitively).
pub fn plan_columns(
    existing: &[ColumnDescriptor],
    insertions: &[InsertionRequest],
) -> Result<Vec<ColumnDescriptor>> {
    insertions
        .iter()
        .try_fold(existing.to_vec(), |mut working, request| {
            if working.iter().any(|c| c.has_name(&request.name)) {
                return Err(ReorderError::DuplicateColumn(request.name.clone()));
            }

            let anchor = working
                .iter()
                .position(|c| c.has_name(&request.anchor))
                .ok_or_else(|| ReorderError::AnchorNotFound {
                    column: request.name.clone(),
                    anchor: request.anchor.clone(),
                })?;

            let index = match request.position {
                Position::Before => anchor,
                Position::After => anchor + 1,
            };

            debug!(
                column = %request.name,
                anchor = %request.anchor,
                position = %request.position,
                index,
                "Placing column"
            );
            working.insert(index, request.to_descriptor());
            Ok(working)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnOrigin;

    fn existing(names: &[&str]) -> Vec<ColumnDescriptor> {
        names
            .iter()
            .map(|n| ColumnDescriptor::existing(*n, "INT"))
            .collect()
    }

    fn names(columns: &[ColumnDescriptor]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_no_insertions_keeps_order() {
        let planned = plan_columns(&existing(&["A", "B", "C"]), &[]).unwrap();
        assert_eq!(names(&planned), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_insert_before_and_after() {
        let planned = plan_columns(
            &existing(&["A", "B", "C"]),
            &[
                InsertionRequest::new("X", "INT", "A").before(),
                InsertionRequest::new("Y", "INT", "C").after(),
                InsertionRequest::new("Z", "INT", "b").after(),
            ],
        )
        .unwrap();

        assert_eq!(names(&planned), vec!["X", "A", "B", "Z", "C", "Y"]);
    }

    #[test]
    fn test_anchor_on_previous_insertion() {
        let planned = plan_columns(
            &existing(&["X", "Tail"]),
            &[
                InsertionRequest::new("A", "INT", "X").after(),
                InsertionRequest::new("B", "INT", "A").after(),
            ],
        )
        .unwrap();

        assert_eq!(names(&planned), vec!["X", "A", "B", "Tail"]);
    }

    #[test]
    fn test_insertion_order_matters() {
        let existing = existing(&["A"]);
        let first = InsertionRequest::new("P", "INT", "A").after();
        let second = InsertionRequest::new("Q", "INT", "A").after();

        let pq = plan_columns(&existing, &[first.clone(), second.clone()]).unwrap();
        let qp = plan_columns(&existing, &[second, first]).unwrap();

        assert_eq!(names(&pq), vec!["A", "Q", "P"]);
        assert_eq!(names(&qp), vec!["A", "P", "Q"]);
    }

    #[test]
    fn test_every_name_exactly_once() {
        let existing = existing(&["A", "B", "C", "D"]);
        let insertions = vec![
            InsertionRequest::new("N1", "INT", "D").after(),
            InsertionRequest::new("N2", "INT", "N1").before(),
            InsertionRequest::new("N3", "INT", "A").before(),
            InsertionRequest::new("N4", "INT", "N3").after(),
        ];

        let planned = plan_columns(&existing, &insertions).unwrap();
        assert_eq!(planned.len(), existing.len() + insertions.len());
        for name in ["A", "B", "C", "D", "N1", "N2", "N3", "N4"] {
            assert_eq!(planned.iter().filter(|c| c.name == name).count(), 1);
        }
        assert_eq!(
            planned
                .iter()
                .filter(|c| c.origin == ColumnOrigin::Inserted)
                .count(),
            4
        );
    }

    #[test]
    fn test_anchor_not_found() {
        let err = plan_columns(
            &existing(&["A"]),
            &[InsertionRequest::new("New", "INT", "Z").before()],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ReorderError::AnchorNotFound { ref anchor, .. } if anchor == "Z"
        ));
    }

    #[test]
    fn test_duplicate_existing_name() {
        let err = plan_columns(
            &existing(&["A"]),
            &[InsertionRequest::new("A", "INT", "A").after()],
        )
        .unwrap_err();

        assert!(matches!(err, ReorderError::DuplicateColumn(ref n) if n == "A"));
    }

    #[test]
    fn test_duplicate_between_insertions_ignores_case() {
        let err = plan_columns(
            &existing(&["A"]),
            &[
                InsertionRequest::new("Note", "INT", "A").after(),
                InsertionRequest::new("NOTE", "INT", "A").before(),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, ReorderError::DuplicateColumn(ref n) if n == "NOTE"));
    }

    #[test]
    fn test_non_ascii_anchor_ignores_case() {
        let planned = plan_columns(
            &existing(&["Über", "Ende"]),
            &[InsertionRequest::new("X", "INT", "über").after()],
        )
        .unwrap();

        assert_eq!(names(&planned), vec!["Über", "X", "Ende"]);
    }

    #[test]
    fn test_non_ascii_duplicate_ignores_case() {
        let err = plan_columns(
            &existing(&["Äpfel"]),
            &[InsertionRequest::new("äpfel", "INT", "Äpfel").after()],
        )
        .unwrap_err();

        assert!(matches!(err, ReorderError::DuplicateColumn(ref n) if n == "äpfel"));
    }

    #[test]
    fn test_input_untouched_on_failure() {
        let existing = existing(&["A", "B"]);
        let result = plan_columns(
            &existing,
            &[
                InsertionRequest::new("X", "INT", "A").after(),
                InsertionRequest::new("Y", "INT", "Missing").after(),
            ],
        );

        assert!(result.is_err());
        assert_eq!(names(&existing), vec!["A", "B"]);
    }
}
