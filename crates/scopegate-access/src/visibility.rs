//! Visibility transitions and their cascades.
//!
//! Planning is pure: given the resource as last read, [`plan_visibility_change`]
//! builds the whole change set. The change set is guarded on the visibility
//! that was read, so a concurrent transition makes the commit fail instead of
//! applying a stale cascade. Context pruning is keyed on the document and
//! resolved by the store inside the commit, never from a list read earlier.

use serde::{Deserialize, Serialize};

use scopegate_core::{Resource, ResourceKind, Visibility};
use scopegate_store::{ApplyReport, ChangeSet, Guard, Mutation};

/// Build the change set that moves `resource` to `to`.
///
/// Returns `None` when the visibility does not change. Cascades:
///
/// - leaving `private` removes every explicit share
/// - documents entering `private` drop out of every area context; the area
///   shares themselves stay
/// - documents entering `area` drop out of the context of every area they are
///   not shared into
/// - documents entering `space` lose their area shares and drop out of the
///   context of areas outside their space
pub fn plan_visibility_change(resource: &Resource, to: Visibility, at: i64) -> Option<ChangeSet> {
    let from = resource.visibility;
    if from == to {
        return None;
    }

    let mut changes = ChangeSet::new()
        .guard(Guard::Visibility {
            resource_id: resource.id,
            expected: from,
        })
        .push(Mutation::SetVisibility {
            resource_id: resource.id,
            visibility: to,
            at,
        });

    if from == Visibility::Private {
        changes = changes.push(Mutation::DeleteAllShares {
            resource_id: resource.id,
        });
    }

    if resource.kind() == ResourceKind::Document {
        let document_id = resource.id;
        changes = match to {
            Visibility::Private => changes.push(Mutation::RemoveFromAllContexts { document_id }),
            Visibility::Area => changes.push(Mutation::PruneUnsharedContext { document_id }),
            Visibility::Space => changes
                .push(Mutation::DeleteAllAreaShares { document_id })
                .push(Mutation::PruneContextOutsideSpace { document_id }),
        };
    }

    Some(changes)
}

/// What a committed visibility change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub from: Visibility,
    pub to: Visibility,
    /// Explicit shares removed.
    pub shares_removed: usize,
    /// Area shares removed.
    pub area_shares_removed: usize,
    /// Context references pruned.
    pub context_pruned: usize,
}

impl VisibilityChange {
    pub fn new(from: Visibility, to: Visibility) -> Self {
        Self {
            from,
            to,
            shares_removed: 0,
            area_shares_removed: 0,
            context_pruned: 0,
        }
    }

    /// A change that did nothing.
    pub fn unchanged(visibility: Visibility) -> Self {
        Self::new(visibility, visibility)
    }

    /// Tally a committed plan.
    pub fn from_report(from: Visibility, to: Visibility, plan: &ChangeSet, report: &ApplyReport) -> Self {
        let mut change = Self::new(from, to);
        for (index, mutation) in plan.mutations.iter().enumerate() {
            let affected = report.affected_at(index);
            match mutation {
                Mutation::DeleteAllShares { .. } => change.shares_removed += affected,
                Mutation::DeleteAllAreaShares { .. } => change.area_shares_removed += affected,
                Mutation::RemoveFromAllContexts { .. }
                | Mutation::PruneUnsharedContext { .. }
                | Mutation::PruneContextOutsideSpace { .. } => change.context_pruned += affected,
                _ => {}
            }
        }
        change
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegate_core::{AreaId, Placement, ResourceId, UserId};

    fn resource(placement: Placement, visibility: Visibility) -> Resource {
        Resource {
            id: ResourceId::generate(),
            owner_id: UserId::generate(),
            title: "Plan".into(),
            placement,
            visibility,
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
        }
    }

    fn document(visibility: Visibility) -> Resource {
        resource(Placement::Document { space_id: None }, visibility)
    }

    #[test]
    fn test_unchanged_visibility_is_noop() {
        let doc = document(Visibility::Area);
        assert!(plan_visibility_change(&doc, Visibility::Area, 1).is_none());
    }

    #[test]
    fn test_plan_is_guarded_on_observed_visibility() {
        let doc = document(Visibility::Area);
        let plan = plan_visibility_change(&doc, Visibility::Space, 1).unwrap();
        assert_eq!(
            plan.guards,
            vec![Guard::Visibility {
                resource_id: doc.id,
                expected: Visibility::Area,
            }]
        );
        assert!(matches!(
            plan.mutations[0],
            Mutation::SetVisibility {
                visibility: Visibility::Space,
                ..
            }
        ));
    }

    #[test]
    fn test_leaving_private_removes_shares() {
        let page = resource(
            Placement::Page {
                area_id: AreaId::generate(),
            },
            Visibility::Private,
        );
        let plan = plan_visibility_change(&page, Visibility::Area, 1).unwrap();
        assert!(plan
            .mutations
            .contains(&Mutation::DeleteAllShares { resource_id: page.id }));
        assert_eq!(plan.mutations.len(), 2);
    }

    #[test]
    fn test_document_to_private_leaves_every_context() {
        let doc = document(Visibility::Space);
        let plan = plan_visibility_change(&doc, Visibility::Private, 1).unwrap();

        assert!(plan
            .mutations
            .contains(&Mutation::RemoveFromAllContexts { document_id: doc.id }));
        assert!(!plan
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::DeleteAllAreaShares { .. } | Mutation::DeleteAllShares { .. })));
    }

    #[test]
    fn test_document_to_area_prunes_unshared_context() {
        let doc = document(Visibility::Space);
        let plan = plan_visibility_change(&doc, Visibility::Area, 1).unwrap();
        assert_eq!(
            plan.mutations[1..],
            [Mutation::PruneUnsharedContext { document_id: doc.id }]
        );
    }

    #[test]
    fn test_document_to_space_clears_area_shares() {
        let doc = document(Visibility::Private);
        let plan = plan_visibility_change(&doc, Visibility::Space, 1).unwrap();

        assert!(plan
            .mutations
            .contains(&Mutation::DeleteAllAreaShares { document_id: doc.id }));
        assert!(plan
            .mutations
            .contains(&Mutation::DeleteAllShares { resource_id: doc.id }));
        assert!(plan
            .mutations
            .contains(&Mutation::PruneContextOutsideSpace { document_id: doc.id }));
    }

    #[test]
    fn test_from_report_tallies_cascade() {
        let doc = document(Visibility::Private);
        let plan = plan_visibility_change(&doc, Visibility::Space, 1).unwrap();
        // SetVisibility, DeleteAllShares, DeleteAllAreaShares, PruneContextOutsideSpace
        let report = ApplyReport {
            affected: vec![1, 3, 2, 1],
        };

        let change = VisibilityChange::from_report(Visibility::Private, Visibility::Space, &plan, &report);
        assert_eq!(change.shares_removed, 3);
        assert_eq!(change.area_shares_removed, 2);
        assert_eq!(change.context_pruned, 1);
        assert!(!change.is_noop());
    }
}
