use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::MigrateError;
use crate::model::{DestinationMode, MigrateOptions, PlaylistGroup, PrivacyStatus};
use crate::ports::catalog::CatalogClient;

/// Breather between consecutive group migrations.
const GROUP_PAUSE: Duration = Duration::from_millis(200);

/// Advisory progress stream for the UI layer, the write-side counterpart of
/// the dry-run planner's event channel.
#[derive(Debug, Clone)]
pub enum MigrateProgress {
    GroupStarted {
        playlist_title: String,
        index: usize,
        of: usize,
    },
    GroupFinished {
        playlist_title: String,
        written: usize,
        failed: bool,
    },
}

/// What happened to one playlist group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub playlist_title: String,
    pub destination_id: String,
    pub written: usize,
    /// Items with no match; they were already visible as "no match" in the
    /// dry-run preview and are silently skipped at write time.
    pub skipped_unmatched: usize,
    /// Matched ids dropped by input or destination deduplication.
    pub skipped_duplicates: usize,
}

/// Collapses an id list to first occurrences only, preserving order.
pub fn dedupe_first_occurrence(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Writes dry-run groups into the destination catalog: resolve (or create)
/// the destination playlist, deduplicate, then batch-write the matches.
pub struct MigrationExecutor<'a> {
    destination: &'a dyn CatalogClient,
    options: MigrateOptions,
    progress: Option<UnboundedSender<MigrateProgress>>,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(destination: &'a dyn CatalogClient, options: MigrateOptions) -> Self {
        Self {
            destination,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: UnboundedSender<MigrateProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Migrates every group, continuing past per-group failures. Outcomes
    /// are index-aligned with the input groups. There is no cross-group
    /// atomicity and no rollback of partial writes.
    pub async fn migrate_all(
        &self,
        groups: &[PlaylistGroup],
    ) -> Vec<Result<GroupOutcome, MigrateError>> {
        let mut outcomes = Vec::with_capacity(groups.len());

        for (index, group) in groups.iter().enumerate() {
            self.emit(MigrateProgress::GroupStarted {
                playlist_title: group.playlist_title.clone(),
                index,
                of: groups.len(),
            });

            let outcome = self.migrate_group(group).await;
            if let Err(error) = &outcome {
                tracing::warn!(
                    playlist = %group.playlist_title,
                    %error,
                    "migration of group failed"
                );
            }
            self.emit(MigrateProgress::GroupFinished {
                playlist_title: group.playlist_title.clone(),
                written: outcome.as_ref().map(|o| o.written).unwrap_or(0),
                failed: outcome.is_err(),
            });
            outcomes.push(outcome);

            if index + 1 < groups.len() {
                tokio::time::sleep(GROUP_PAUSE).await;
            }
        }

        outcomes
    }

    pub async fn migrate_group(&self, group: &PlaylistGroup) -> Result<GroupOutcome, MigrateError> {
        let destination_id = self.resolve_destination(group).await?;

        let mut ids: Vec<String> = group
            .items
            .iter()
            .filter_map(|item| item.destination_id.clone())
            .collect();
        let skipped_unmatched = group.items.len() - ids.len();
        let matched = ids.len();

        if self.options.dedupe_input {
            ids = dedupe_first_occurrence(ids);
        }
        if self.options.dedupe_existing && !ids.is_empty() {
            let existing = self
                .destination
                .list_playlist_member_ids(&destination_id)
                .await?;
            ids.retain(|id| !existing.contains(id));
        }
        let skipped_duplicates = matched - ids.len();

        // An empty write list is a successful zero-item migration.
        if !ids.is_empty() {
            self.destination.add_items(&destination_id, &ids).await?;
        }

        tracing::info!(
            playlist = %group.playlist_title,
            destination_id = %destination_id,
            written = ids.len(),
            skipped_unmatched,
            skipped_duplicates,
            "migrated playlist group"
        );

        Ok(GroupOutcome {
            playlist_title: group.playlist_title.clone(),
            destination_id,
            written: ids.len(),
            skipped_unmatched,
            skipped_duplicates,
        })
    }

    fn emit(&self, event: MigrateProgress) {
        if let Some(progress) = &self.progress {
            // A gone consumer is not an error; progress is advisory.
            let _ = progress.send(event);
        }
    }

    async fn resolve_destination(&self, group: &PlaylistGroup) -> Result<String, MigrateError> {
        match &self.options.mode {
            // Verbatim, no existence check; a missing playlist surfaces as
            // an HTTP error on the write step.
            DestinationMode::MergeInto(id) => Ok(id.clone()),
            DestinationMode::MergeByName => {
                if let Some(existing) = self
                    .destination
                    .find_playlist_by_title(&group.playlist_title)
                    .await?
                {
                    return Ok(existing.id);
                }
                if self.options.allow_create_if_missing {
                    let created = self
                        .destination
                        .create_playlist(&group.playlist_title, "", PrivacyStatus::default())
                        .await?;
                    return Ok(created.id);
                }
                Err(MigrateError::DestinationNotFound {
                    title: group.playlist_title.clone(),
                })
            }
            DestinationMode::Create => {
                let created = self
                    .destination
                    .create_playlist(&group.playlist_title, "", self.options.privacy)
                    .await?;
                Ok(created.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::model::{DryRunItem, MatchMethod, PlaylistSummary, Provider};
    use crate::ports::catalog::MockCatalogClient;

    fn item(source_id: &str, destination_id: Option<&str>) -> DryRunItem {
        DryRunItem {
            source_id: source_id.into(),
            destination_id: destination_id.map(String::from),
            title: source_id.into(),
            method: if destination_id.is_some() {
                MatchMethod::Query
            } else {
                MatchMethod::None
            },
        }
    }

    fn group(title: &str, items: Vec<DryRunItem>) -> PlaylistGroup {
        let matched = items.iter().filter(|i| i.destination_id.is_some()).count();
        PlaylistGroup {
            playlist_id: "src-pl".into(),
            playlist_title: title.into(),
            total: items.len(),
            matched,
            items,
        }
    }

    fn summary(id: &str, title: &str) -> PlaylistSummary {
        PlaylistSummary {
            id: id.into(),
            title: title.into(),
            description: None,
            track_count: None,
        }
    }

    fn options(mode: DestinationMode) -> MigrateOptions {
        MigrateOptions {
            mode,
            ..MigrateOptions::default()
        }
    }

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let ids: Vec<String> = ["a", "b", "a", "c"].iter().map(|s| s.to_string()).collect();
        let deduped = dedupe_first_occurrence(ids);
        assert_eq!(deduped, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let ids: Vec<String> = ["a", "b", "a", "c", "b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let once = dedupe_first_occurrence(ids);
        let twice = dedupe_first_occurrence(once.clone());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_merge_by_name_missing_without_create_fails_before_any_write() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_find_playlist_by_title()
            .times(1)
            .returning(|_| Ok(None));
        // No create/add expectations: any write attempt would panic.

        let executor = MigrationExecutor::new(
            &destination,
            MigrateOptions {
                mode: DestinationMode::MergeByName,
                allow_create_if_missing: false,
                ..MigrateOptions::default()
            },
        );
        let err = executor
            .migrate_group(&group("Mix", vec![item("s1", Some("d1"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::DestinationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_merge_by_name_missing_creates_exactly_once_then_writes() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_find_playlist_by_title()
            .times(1)
            .returning(|_| Ok(None));
        destination
            .expect_create_playlist()
            .times(1)
            .withf(|title, _description, privacy| {
                title == "Mix" && *privacy == PrivacyStatus::Private
            })
            .returning(|_, _, _| Ok(summary("new1", "Mix")));
        destination
            .expect_list_playlist_member_ids()
            .times(1)
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .times(1)
            .withf(|playlist_id, ids| playlist_id == "new1" && ids == ["d1"])
            .returning(|_, _| Ok(()));

        let executor = MigrationExecutor::new(
            &destination,
            MigrateOptions {
                mode: DestinationMode::MergeByName,
                // Merge-by-name fallback creation ignores the create-mode
                // privacy and uses the destination default.
                privacy: PrivacyStatus::Public,
                ..MigrateOptions::default()
            },
        );
        let outcome = executor
            .migrate_group(&group("Mix", vec![item("s1", Some("d1"))]))
            .await
            .unwrap();
        assert_eq!(outcome.destination_id, "new1");
        assert_eq!(outcome.written, 1);
    }

    #[tokio::test]
    async fn test_merge_by_name_uses_existing_playlist() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_find_playlist_by_title()
            .times(1)
            .returning(|_| Ok(Some(summary("existing1", "Mix"))));
        destination
            .expect_list_playlist_member_ids()
            .times(1)
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .times(1)
            .withf(|playlist_id, _| playlist_id == "existing1")
            .returning(|_, _| Ok(()));

        let executor =
            MigrationExecutor::new(&destination, options(DestinationMode::MergeByName));
        let outcome = executor
            .migrate_group(&group("Mix", vec![item("s1", Some("d1"))]))
            .await
            .unwrap();
        assert_eq!(outcome.destination_id, "existing1");
    }

    #[tokio::test]
    async fn test_merge_into_id_is_used_verbatim() {
        let mut destination = MockCatalogClient::new();
        // No lookup or create expectations: resolution must not touch them.
        destination
            .expect_list_playlist_member_ids()
            .times(1)
            .withf(|playlist_id| playlist_id == "target1")
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .times(1)
            .withf(|playlist_id, _| playlist_id == "target1")
            .returning(|_, _| Ok(()));

        let executor = MigrationExecutor::new(
            &destination,
            options(DestinationMode::MergeInto("target1".into())),
        );
        let outcome = executor
            .migrate_group(&group("Mix", vec![item("s1", Some("d1"))]))
            .await
            .unwrap();
        assert_eq!(outcome.destination_id, "target1");
    }

    #[tokio::test]
    async fn test_input_dedupe_and_unmatched_skip() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok(summary("new1", "Mix")));
        destination
            .expect_list_playlist_member_ids()
            .times(1)
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .times(1)
            .withf(|_, ids| ids == ["d1", "d2"])
            .returning(|_, _| Ok(()));

        let executor = MigrationExecutor::new(&destination, options(DestinationMode::Create));
        let outcome = executor
            .migrate_group(&group(
                "Mix",
                vec![
                    item("s1", Some("d1")),
                    item("s2", None),
                    item("s3", Some("d1")),
                    item("s4", Some("d2")),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.skipped_unmatched, 1);
        assert_eq!(outcome.skipped_duplicates, 1);
    }

    #[tokio::test]
    async fn test_dedupe_against_existing_members() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok(summary("new1", "Mix")));
        destination
            .expect_list_playlist_member_ids()
            .times(1)
            .returning(|_| Ok(HashSet::from(["d1".to_string()])));
        destination
            .expect_add_items()
            .times(1)
            .withf(|_, ids| ids == ["d2"])
            .returning(|_, _| Ok(()));

        let executor = MigrationExecutor::new(&destination, options(DestinationMode::Create));
        let outcome = executor
            .migrate_group(&group(
                "Mix",
                vec![item("s1", Some("d1")), item("s2", Some("d2"))],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.skipped_duplicates, 1);
    }

    #[tokio::test]
    async fn test_empty_write_list_is_success_without_write() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok(summary("new1", "Mix")));
        // Neither member listing nor add_items may be called for an empty
        // write list.

        let executor = MigrationExecutor::new(&destination, options(DestinationMode::Create));
        let outcome = executor
            .migrate_group(&group("Mix", vec![item("s1", None), item("s2", None)]))
            .await
            .unwrap();
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.skipped_unmatched, 2);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_catalog_error() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_list_playlist_member_ids()
            .returning(|_| Ok(HashSet::new()));
        destination.expect_add_items().returning(|_, _| {
            Err(CatalogError::Http {
                provider: Provider::YouTube,
                status: 404,
                body: "playlistNotFound".into(),
            })
        });

        let executor = MigrationExecutor::new(
            &destination,
            options(DestinationMode::MergeInto("gone".into())),
        );
        let err = executor
            .migrate_group(&group("Mix", vec![item("s1", Some("d1"))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Catalog(CatalogError::Http { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_progress_events_cover_every_group() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_create_playlist()
            .times(2)
            .returning(|title, _, _| Ok(summary("new1", title)));
        destination
            .expect_list_playlist_member_ids()
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .returning(|_, _| Ok(()));

        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let executor = MigrationExecutor::new(&destination, options(DestinationMode::Create))
            .with_progress(sender);
        executor
            .migrate_all(&[
                group("First", vec![item("s1", Some("d1"))]),
                group("Second", vec![item("s2", Some("d2"))]),
            ])
            .await;
        drop(executor);

        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[0],
            MigrateProgress::GroupStarted { index: 0, of: 2, .. }
        ));
        assert!(matches!(
            &events[1],
            MigrateProgress::GroupFinished {
                written: 1,
                failed: false,
                ..
            }
        ));
        assert!(matches!(
            &events[2],
            MigrateProgress::GroupStarted { index: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_migrate_all_continues_past_failing_group() {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_find_playlist_by_title()
            .withf(|title| title == "Broken")
            .returning(|_| Ok(None));
        destination
            .expect_find_playlist_by_title()
            .withf(|title| title == "Fine")
            .returning(|_| Ok(Some(summary("dest2", "Fine"))));
        destination
            .expect_list_playlist_member_ids()
            .returning(|_| Ok(HashSet::new()));
        destination
            .expect_add_items()
            .times(1)
            .withf(|playlist_id, _| playlist_id == "dest2")
            .returning(|_, _| Ok(()));

        let executor = MigrationExecutor::new(
            &destination,
            MigrateOptions {
                mode: DestinationMode::MergeByName,
                allow_create_if_missing: false,
                ..MigrateOptions::default()
            },
        );
        let outcomes = executor
            .migrate_all(&[
                group("Broken", vec![item("s1", Some("d1"))]),
                group("Fine", vec![item("s2", Some("d2"))]),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_err());
        assert_eq!(outcomes[1].as_ref().unwrap().written, 1);
    }
}
