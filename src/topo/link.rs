//! Twin groups: sets of entities considered geometrically identical, each
//! with one canonical "active" member.
//!
//! Groups are stored in a flat table keyed by entity handle. Entities never
//! point at each other; they resolve their twins and their active
//! representative through the table.

use super::ids::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkGroup<I, D = ()> {
    twins: Vec<I>,
    active: I,
    data: D,
}

impl<I: EntityId, D> LinkGroup<I, D> {
    #[must_use]
    pub fn twins(&self) -> &[I] {
        &self.twins
    }

    #[must_use]
    pub fn active(&self) -> I {
        self.active
    }

    #[must_use]
    pub fn twin_count(&self) -> usize {
        self.twins.len()
    }

    #[must_use]
    pub fn data(&self) -> &D {
        &self.data
    }

    #[must_use]
    pub fn contains(&self, id: I) -> bool {
        self.twins.contains(&id)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LinkTable<I, D = ()> {
    groups: Vec<LinkGroup<I, D>>,
    group_of: Vec<usize>,
}

impl<I: EntityId, D> LinkTable<I, D> {
    pub(crate) fn new() -> Self {
        Self { groups: Vec::new(), group_of: Vec::new() }
    }

    /// Opens a singleton group for a freshly created entity.
    pub(crate) fn register(&mut self, id: I, data: D) {
        let group = self.groups.len();
        self.groups.push(LinkGroup { twins: vec![id], active: id, data });
        if self.group_of.len() <= id.index() {
            self.group_of.resize(id.index() + 1, usize::MAX);
        }
        self.group_of[id.index()] = group;
    }

    pub(crate) fn group_index(&self, id: I) -> usize {
        self.group_of[id.index()]
    }

    pub(crate) fn group(&self, id: I) -> &LinkGroup<I, D> {
        &self.groups[self.group_index(id)]
    }

    pub(crate) fn same_group(&self, a: I, b: I) -> bool {
        self.group_index(a) == self.group_index(b)
    }

    pub(crate) fn set_active(&mut self, member: I, active: I) {
        let g = self.group_index(member);
        self.groups[g].active = active;
    }

    pub(crate) fn set_data(&mut self, member: I, data: D) {
        let g = self.group_index(member);
        self.groups[g].data = data;
    }

    /// Moves every twin of `b`'s group into `a`'s group. Returns `false` when
    /// the two were already linked.
    pub(crate) fn merge(&mut self, a: I, b: I) -> bool {
        let ga = self.group_index(a);
        let gb = self.group_index(b);
        if ga == gb {
            return false;
        }
        let moved = std::mem::take(&mut self.groups[gb].twins);
        for twin in &moved {
            self.group_of[twin.index()] = ga;
        }
        self.groups[ga].twins.extend(moved);
        true
    }

    /// Splits the group holding both `a` and `b` in two, seeded by `a` and `b`.
    /// Every other twin goes to `b`'s new group when `goes_to_b` says so.
    /// Returns `false` when `a` and `b` are not linked.
    pub(crate) fn split(&mut self, a: I, b: I, data_b: D, mut goes_to_b: impl FnMut(I) -> bool) -> bool {
        let ga = self.group_index(a);
        if ga != self.group_index(b) || a == b {
            return false;
        }
        let twins = std::mem::take(&mut self.groups[ga].twins);
        let mut keep = Vec::with_capacity(twins.len());
        let mut moved = Vec::new();
        for twin in twins {
            if twin == b || (twin != a && goes_to_b(twin)) {
                moved.push(twin);
            } else {
                keep.push(twin);
            }
        }
        self.groups[ga].twins = keep;
        if !self.groups[ga].twins.contains(&self.groups[ga].active) {
            self.groups[ga].active = a;
        }

        let gb = self.groups.len();
        for twin in &moved {
            self.group_of[twin.index()] = gb;
        }
        self.groups.push(LinkGroup { twins: moved, active: b, data: data_b });
        true
    }
}
