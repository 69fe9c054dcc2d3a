use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use crate::db::ScheduleStore;
use crate::error::AppError;
use crate::models::Class;
use crate::schedule;

/// An existing session that a candidate session runs into.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub class_id: i64,
    pub existing_start: DateTime<FixedOffset>,
}

struct Competitor {
    class_id: i64,
    starts: Vec<DateTime<FixedOffset>>,
}

fn competitors(classes: Vec<Class>) -> Vec<Competitor> {
    classes
        .into_iter()
        .map(|class| Competitor {
            class_id: class.class_id,
            starts: schedule::decode(&class.schedule)
                .into_iter()
                .map(|s| s.start)
                .collect(),
        })
        .collect()
}

fn first_collision(candidate: &DateTime<Utc>, competing: &[Competitor]) -> Option<Collision> {
    competing.iter().find_map(|c| {
        c.starts
            .iter()
            .find(|start| schedule::overlaps(candidate, *start))
            .map(|start| Collision {
                class_id: c.class_id,
                existing_start: *start,
            })
    })
}

/// First session of another class at `place` that overlaps `candidate`.
pub async fn place_conflict<S>(
    store: &mut S,
    candidate: &DateTime<Utc>,
    place: &str,
    excluding: Option<i64>,
) -> Result<Option<Collision>, AppError>
where
    S: ScheduleStore + ?Sized,
{
    let competing = competitors(store.classes_at_place(place, excluding).await?);
    Ok(first_collision(candidate, &competing))
}

/// First session of another active class taught by `lecturer_id` that overlaps `candidate`.
pub async fn lecturer_conflict<S>(
    store: &mut S,
    candidate: &DateTime<Utc>,
    lecturer_id: i64,
    excluding: Option<i64>,
) -> Result<Option<Collision>, AppError>
where
    S: ScheduleStore + ?Sized,
{
    let competing = competitors(store.active_classes_for_lecturer(lecturer_id, excluding).await?);
    Ok(first_collision(candidate, &competing))
}

/// Checks each session in order, place before lecturer, and fails on the first overlap.
///
/// Competing classes are loaded once per dimension. `excluding` is the class being edited.
pub async fn ensure_no_conflicts<S>(
    store: &mut S,
    sessions: &[DateTime<Utc>],
    place: Option<&str>,
    lecturer_id: Option<i64>,
    excluding: Option<i64>,
) -> Result<(), AppError>
where
    S: ScheduleStore + ?Sized,
{
    let at_place = match place {
        Some(place) => competitors(store.classes_at_place(place, excluding).await?),
        None => Vec::new(),
    };
    let taught = match lecturer_id {
        Some(lecturer_id) => {
            competitors(store.active_classes_for_lecturer(lecturer_id, excluding).await?)
        }
        None => Vec::new(),
    };
    debug!(
        "checking {} sessions against {} classes at place and {} for lecturer",
        sessions.len(),
        at_place.len(),
        taught.len()
    );

    for (i, start) in sessions.iter().enumerate() {
        if let Some(hit) = first_collision(start, &at_place) {
            return Err(AppError::Conflict(format!(
                "session {} at {} overlaps class {} at place '{}' (session at {})",
                i + 1,
                start.to_rfc3339(),
                hit.class_id,
                place.unwrap_or_default(),
                hit.existing_start.to_rfc3339()
            )));
        }
        if let Some(hit) = first_collision(start, &taught) {
            return Err(AppError::Conflict(format!(
                "session {} at {} overlaps class {} taught by lecturer {} (session at {})",
                i + 1,
                start.to_rfc3339(),
                hit.class_id,
                lecturer_id.unwrap_or_default(),
                hit.existing_start.to_rfc3339()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassStatus;
    use crate::schedule::codec::weekly;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FakeStore {
        classes: Vec<Class>,
    }

    #[async_trait]
    impl ScheduleStore for FakeStore {
        async fn classes_at_place(
            &mut self,
            place: &str,
            excluding: Option<i64>,
        ) -> Result<Vec<Class>, AppError> {
            Ok(self
                .classes
                .iter()
                .filter(|c| c.place.as_deref() == Some(place) && Some(c.class_id) != excluding)
                .cloned()
                .collect())
        }

        async fn active_classes_for_lecturer(
            &mut self,
            lecturer_id: i64,
            excluding: Option<i64>,
        ) -> Result<Vec<Class>, AppError> {
            Ok(self
                .classes
                .iter()
                .filter(|c| {
                    c.lecturer_id == Some(lecturer_id)
                        && c.status == ClassStatus::Active
                        && Some(c.class_id) != excluding
                })
                .cloned()
                .collect())
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, h, m, 0).unwrap()
    }

    fn class(
        class_id: i64,
        place: Option<&str>,
        lecturer_id: Option<i64>,
        status: ClassStatus,
        anchor: DateTime<Utc>,
    ) -> Class {
        Class {
            class_id,
            class_name: format!("Class {}", class_id),
            lecturer_id,
            schedule: schedule::encode(&weekly(anchor).unwrap()),
            created_by: 1,
            status,
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
            place: place.map(str::to_string),
        }
    }

    fn starts(anchor: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        weekly(anchor).unwrap().into_iter().map(|s| s.start).collect()
    }

    #[tokio::test]
    async fn test_place_overlap_is_reported() {
        let mut store = FakeStore {
            classes: vec![class(1, Some("Room A"), None, ClassStatus::Pending, at(9, 0))],
        };

        let hit = place_conflict(&mut store, &at(10, 0), "Room A", None)
            .await
            .unwrap()
            .expect("expected a collision");
        assert_eq!(hit.class_id, 1);
        assert_eq!(hit.existing_start, at(9, 0).fixed_offset());

        assert!(place_conflict(&mut store, &at(11, 0), "Room A", None).await.unwrap().is_none());
        assert!(place_conflict(&mut store, &at(10, 0), "Room B", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_archived_class_still_holds_its_place() {
        let mut store = FakeStore {
            classes: vec![class(1, Some("Room A"), None, ClassStatus::Archived, at(9, 0))],
        };
        let err = ensure_no_conflicts(&mut store, &starts(at(9, 30)), Some("Room A"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lecturer_only_blocked_by_active_classes() {
        let mut store = FakeStore {
            classes: vec![
                class(1, None, Some(7), ClassStatus::Archived, at(9, 0)),
                class(2, None, Some(7), ClassStatus::Active, at(13, 0)),
            ],
        };

        assert!(lecturer_conflict(&mut store, &at(10, 0), 7, None).await.unwrap().is_none());
        let hit = lecturer_conflict(&mut store, &at(14, 0), 7, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.class_id, 2);
    }

    #[tokio::test]
    async fn test_edited_class_is_excluded() {
        let mut store = FakeStore {
            classes: vec![class(4, Some("Room A"), Some(7), ClassStatus::Active, at(9, 0))],
        };
        ensure_no_conflicts(&mut store, &starts(at(9, 0)), Some("Room A"), Some(7), Some(4))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_names_session_and_class() {
        let mut store = FakeStore {
            classes: vec![class(9, Some("Room A"), None, ClassStatus::Active, at(9, 0))],
        };
        // Only the third week collides.
        let sessions = vec![
            Utc.with_ymd_and_hms(2024, 12, 23, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 30, 9, 0, 0).unwrap(),
            at(10, 0),
        ];

        match ensure_no_conflicts(&mut store, &sessions, Some("Room A"), None, None).await {
            Err(AppError::Conflict(msg)) => {
                assert!(msg.starts_with("session 3 at 2025-01-06T10:00:00+00:00"), "{}", msg);
                assert!(msg.contains("class 9"), "{}", msg);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_place_is_checked_before_lecturer() {
        let mut store = FakeStore {
            classes: vec![
                class(1, Some("Room A"), None, ClassStatus::Active, at(9, 0)),
                class(2, Some("Room B"), Some(7), ClassStatus::Active, at(9, 0)),
            ],
        };
        match ensure_no_conflicts(&mut store, &starts(at(9, 0)), Some("Room A"), Some(7), None).await {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("class 1 at place"), "{}", msg),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_place_and_no_lecturer_never_conflicts() {
        let mut store = FakeStore {
            classes: vec![class(1, Some("Room A"), Some(7), ClassStatus::Active, at(9, 0))],
        };
        ensure_no_conflicts(&mut store, &starts(at(9, 0)), None, None, None)
            .await
            .unwrap();
    }
}
