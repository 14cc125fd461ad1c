use alloc::vec::Vec;

use crate::key::{KeyMap, NodeKey};
use crate::{ContractViolation, LayoutInfo, NodeRef, ReusableView, ViewId, ViewKey, ViewType};

/// Arena of reusable views with one LIFO free list per view type.
#[derive(Clone, Debug)]
pub(crate) struct ViewPool<K, T, V> {
    views: Vec<Option<ReusableView<K, T, V>>>,
    live: KeyMap<ViewKey<K>, ViewId>,
    free: [Vec<ViewId>; 6],
    vacant: Vec<usize>,
    created: usize,
}

impl<K: NodeKey, T, V> ViewPool<K, T, V> {
    pub(crate) fn new() -> Self {
        Self {
            views: Vec::new(),
            live: KeyMap::default(),
            free: Default::default(),
            vacant: Vec::new(),
            created: 0,
        }
    }

    pub(crate) fn get(&self, id: ViewId) -> Option<&ReusableView<K, T, V>> {
        self.views.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: ViewId) -> Option<&mut ReusableView<K, T, V>> {
        self.views.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(crate) fn live_id(&self, key: &ViewKey<K>) -> Option<ViewId> {
        self.live.get(key).copied()
    }

    pub(crate) fn live_keys(&self) -> impl Iterator<Item = &ViewKey<K>> {
        self.live.keys()
    }

    pub(crate) fn live_ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.live.values().copied()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn free_count(&self, view_type: ViewType) -> usize {
        self.free[view_type.slot()].len()
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created
    }

    /// Pops a free view of `view_type` or creates one. The view is not bound yet.
    pub(crate) fn acquire(&mut self, view_type: ViewType) -> ViewId {
        if let Some(id) = self.free[view_type.slot()].pop() {
            return id;
        }
        self.created += 1;
        match self.vacant.pop() {
            Some(slot) => {
                let id = ViewId(slot);
                self.views[slot] = Some(ReusableView::new(id, view_type));
                id
            }
            None => {
                let id = ViewId(self.views.len());
                self.views.push(Some(ReusableView::new(id, view_type)));
                id
            }
        }
    }

    /// Binds an acquired view to `info`. Rebinding across view types is a contract violation.
    pub(crate) fn bind(
        &mut self,
        id: ViewId,
        info: LayoutInfo<K>,
        node: Option<NodeRef<K, T>>,
        content: V,
    ) -> Result<(), ContractViolation> {
        let Some(view) = self.views.get_mut(id.0).and_then(Option::as_mut) else {
            return Ok(());
        };
        if view.view_type() != info.view_type {
            return Err(ContractViolation::ViewTypeMismatch {
                key: alloc::format!("{:?}", info.key),
                expected: view.view_type(),
                actual: info.view_type,
            });
        }
        self.live.insert(info.key.clone(), id);
        view.key = Some(info.key.clone());
        view.layout_info = Some(info);
        view.node = node;
        view.content = Some(content);
        Ok(())
    }

    /// Unbinds the live view for `key` and returns it to its free list.
    pub(crate) fn release(&mut self, key: &ViewKey<K>) -> Option<ViewId> {
        let id = self.live.remove(key)?;
        let view = self.views.get_mut(id.0).and_then(Option::as_mut)?;
        view.key = None;
        view.layout_info = None;
        view.node = None;
        view.content = None;
        self.free[view.view_type().slot()].push(id);
        Some(id)
    }

    /// Destroys free views, keeping at most `keep_per_type` of each type. Returns how many were
    /// destroyed.
    pub(crate) fn shrink(&mut self, keep_per_type: usize) -> usize {
        let mut destroyed = 0;
        for list in self.free.iter_mut() {
            while list.len() > keep_per_type {
                let Some(id) = list.pop() else {
                    break;
                };
                self.views[id.0] = None;
                self.vacant.push(id.0);
                destroyed += 1;
            }
        }
        destroyed
    }
}
