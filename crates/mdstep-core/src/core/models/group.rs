use super::particle::ParticleStore;
use crate::core::domain::Communicator;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GroupError {
    #[error("Group '{group}' lists particle {index} more than once")]
    DuplicateIndex { group: String, index: usize },
    #[error("Group '{group}' references particle {index}, but the store holds {len}")]
    IndexOutOfRange {
        group: String,
        index: usize,
        len: usize,
    },
    #[error("Group '{group}' has an inverted index range {start}..{end}")]
    InvalidRange {
        group: String,
        start: usize,
        end: usize,
    },
}

/// A rule selecting local particle indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelector {
    All,
    Type(u32),
    /// Half-open range of local indices.
    IndexRange { start: usize, end: usize },
    /// Explicit list; every index must be in range and appear once.
    Indices(Vec<usize>),
    Union(Box<GroupSelector>, Box<GroupSelector>),
    Intersection(Box<GroupSelector>, Box<GroupSelector>),
}

impl GroupSelector {
    pub fn union(self, other: GroupSelector) -> Self {
        GroupSelector::Union(Box::new(self), Box::new(other))
    }

    pub fn intersection(self, other: GroupSelector) -> Self {
        GroupSelector::Intersection(Box::new(self), Box::new(other))
    }

    fn resolve(&self, name: &str, store: &ParticleStore) -> Result<BTreeSet<usize>, GroupError> {
        let len = store.len();
        match self {
            GroupSelector::All => Ok((0..len).collect()),
            GroupSelector::Type(type_id) => Ok(store
                .types()
                .iter()
                .enumerate()
                .filter(|(_, t)| *t == type_id)
                .map(|(i, _)| i)
                .collect()),
            GroupSelector::IndexRange { start, end } => {
                if start > end {
                    return Err(GroupError::InvalidRange {
                        group: name.to_string(),
                        start: *start,
                        end: *end,
                    });
                }
                if *end > len {
                    return Err(GroupError::IndexOutOfRange {
                        group: name.to_string(),
                        index: end - 1,
                        len,
                    });
                }
                Ok((*start..*end).collect())
            }
            GroupSelector::Indices(indices) => {
                let mut set = BTreeSet::new();
                for &index in indices {
                    if index >= len {
                        return Err(GroupError::IndexOutOfRange {
                            group: name.to_string(),
                            index,
                            len,
                        });
                    }
                    if !set.insert(index) {
                        return Err(GroupError::DuplicateIndex {
                            group: name.to_string(),
                            index,
                        });
                    }
                }
                Ok(set)
            }
            GroupSelector::Union(a, b) => {
                let mut set = a.resolve(name, store)?;
                set.extend(b.resolve(name, store)?);
                Ok(set)
            }
            GroupSelector::Intersection(a, b) => {
                let left = a.resolve(name, store)?;
                let right = b.resolve(name, store)?;
                Ok(left.intersection(&right).copied().collect())
            }
        }
    }
}

/// An ordered, duplicate-free subset of the particles owned by this domain.
///
/// Members are stored in ascending local-index order. The global size is the sum of the
/// local sizes over all domains and is fixed when the group is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGroup {
    name: String,
    members: Vec<usize>,
    membership: Vec<bool>,
    global_size: u64,
}

impl ParticleGroup {
    pub fn new(
        name: impl Into<String>,
        store: &ParticleStore,
        selector: &GroupSelector,
        communicator: &dyn Communicator,
    ) -> Result<Self, GroupError> {
        let name = name.into();
        let members: Vec<usize> = selector.resolve(&name, store)?.into_iter().collect();
        let mut membership = vec![false; store.len()];
        for &index in &members {
            membership[index] = true;
        }
        let global_size = communicator.all_reduce_count(members.len() as u64);

        Ok(Self {
            name,
            members,
            membership,
            global_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of members owned by this domain.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn global_size(&self) -> u64 {
        self.global_size
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Local particle index of the `i`-th member.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.size()`.
    #[inline]
    pub fn member_local_index(&self, i: usize) -> usize {
        self.members[i]
    }

    #[inline]
    pub fn is_member(&self, index: usize) -> bool {
        self.membership.get(index).copied().unwrap_or(false)
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SingleDomain;
    use crate::core::models::particle::Particle;
    use nalgebra::Point3;

    fn store_with_types(types: &[u32]) -> ParticleStore {
        ParticleStore::from_particles(
            types
                .iter()
                .map(|&t| Particle::new(Point3::origin()).with_type(t))
                .collect(),
        )
    }

    #[test]
    fn all_selects_every_particle_in_order() {
        let store = store_with_types(&[0, 1, 0]);
        let group = ParticleGroup::new("all", &store, &GroupSelector::All, &SingleDomain).unwrap();
        assert_eq!(group.members(), &[0, 1, 2]);
        assert_eq!(group.global_size(), 3);
        assert_eq!(group.member_local_index(2), 2);
    }

    #[test]
    fn type_selector_matches_membership() {
        let store = store_with_types(&[0, 1, 0, 1]);
        let group =
            ParticleGroup::new("b", &store, &GroupSelector::Type(1), &SingleDomain).unwrap();
        assert_eq!(group.members(), &[1, 3]);
        assert!(group.is_member(3));
        assert!(!group.is_member(2));
        assert!(!group.is_member(99));
    }

    #[test]
    fn explicit_indices_are_sorted() {
        let store = store_with_types(&[0; 5]);
        let group = ParticleGroup::new(
            "picked",
            &store,
            &GroupSelector::Indices(vec![4, 0, 2]),
            &SingleDomain,
        )
        .unwrap();
        assert_eq!(group.members(), &[0, 2, 4]);
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let store = store_with_types(&[0; 3]);
        let result = ParticleGroup::new(
            "dup",
            &store,
            &GroupSelector::Indices(vec![1, 1]),
            &SingleDomain,
        );
        assert_eq!(
            result,
            Err(GroupError::DuplicateIndex {
                group: "dup".to_string(),
                index: 1
            })
        );
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let store = store_with_types(&[0; 3]);
        let by_list = ParticleGroup::new(
            "far",
            &store,
            &GroupSelector::Indices(vec![3]),
            &SingleDomain,
        );
        let by_range = ParticleGroup::new(
            "far",
            &store,
            &GroupSelector::IndexRange { start: 0, end: 4 },
            &SingleDomain,
        );
        assert!(matches!(by_list, Err(GroupError::IndexOutOfRange { index: 3, .. })));
        assert!(matches!(by_range, Err(GroupError::IndexOutOfRange { .. })));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let store = store_with_types(&[0; 3]);
        let result = ParticleGroup::new(
            "bad",
            &store,
            &GroupSelector::IndexRange { start: 2, end: 1 },
            &SingleDomain,
        );
        assert!(matches!(result, Err(GroupError::InvalidRange { .. })));
    }

    #[test]
    fn union_of_overlapping_selectors_has_no_duplicates() {
        let store = store_with_types(&[0, 1, 0, 1]);
        let selector = GroupSelector::Type(1).union(GroupSelector::IndexRange { start: 0, end: 2 });
        let group = ParticleGroup::new("u", &store, &selector, &SingleDomain).unwrap();
        assert_eq!(group.members(), &[0, 1, 3]);
    }

    #[test]
    fn intersection_keeps_common_members() {
        let store = store_with_types(&[0, 1, 0, 1]);
        let selector =
            GroupSelector::Type(1).intersection(GroupSelector::IndexRange { start: 2, end: 4 });
        let group = ParticleGroup::new("i", &store, &selector, &SingleDomain).unwrap();
        assert_eq!(group.members(), &[3]);
    }

    #[test]
    fn empty_group_is_legal() {
        let store = store_with_types(&[0, 0]);
        let group =
            ParticleGroup::new("none", &store, &GroupSelector::Type(7), &SingleDomain).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.global_size(), 0);
    }
}
