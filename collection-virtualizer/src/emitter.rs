use alloc::format;

use crate::key::KeySet;
use crate::{Collection, ContractViolation, LayoutInfo, NodeRef, ViewKey, ViewType};

/// Checks layout output against the collection it was computed from, forwarding valid infos.
///
/// It enforces the layout contract:
/// - `ViewKey::Node` keys must exist in the collection.
/// - A key is emitted at most once per query.
/// - The view type matches the node type (and `Loader`/`Placeholder` keys carry their own type).
///
/// The first violation is kept and every later emission is dropped.
pub struct LayoutInfoEmitter<'a, C: Collection> {
    collection: &'a C,
    seen: KeySet<ViewKey<C::Key>>,
    violation: Option<ContractViolation>,
    emit: &'a mut dyn FnMut(LayoutInfo<C::Key>, Option<&'a NodeRef<C::Key, C::Value>>),
}

impl<'a, C: Collection> LayoutInfoEmitter<'a, C> {
    pub fn new(
        collection: &'a C,
        emit: &'a mut dyn FnMut(LayoutInfo<C::Key>, Option<&'a NodeRef<C::Key, C::Value>>),
    ) -> Self {
        Self {
            collection,
            seen: KeySet::default(),
            violation: None,
            emit,
        }
    }

    /// Resolves the node behind `info` without emitting it.
    pub fn check(
        &self,
        info: &LayoutInfo<C::Key>,
    ) -> Result<Option<&'a NodeRef<C::Key, C::Value>>, ContractViolation> {
        let expected = match &info.key {
            ViewKey::Node(key) => {
                let Some(node) = self.collection.item(key) else {
                    return Err(ContractViolation::UnknownKey {
                        key: format!("{key:?}"),
                    });
                };
                let expected = ViewType::from(node.node_type);
                if expected == info.view_type {
                    return Ok(Some(node));
                }
                expected
            }
            ViewKey::Loader if info.view_type == ViewType::Loader => return Ok(None),
            ViewKey::Placeholder if info.view_type == ViewType::Placeholder => return Ok(None),
            ViewKey::Loader => ViewType::Loader,
            ViewKey::Placeholder => ViewType::Placeholder,
        };
        Err(ContractViolation::ViewTypeMismatch {
            key: format!("{:?}", info.key),
            expected,
            actual: info.view_type,
        })
    }

    pub fn emit(&mut self, info: LayoutInfo<C::Key>) {
        if self.violation.is_some() {
            return;
        }
        if self.seen.contains(&info.key) {
            vwarn!(key = ?info.key, "LayoutInfoEmitter: duplicate key");
            self.violation = Some(ContractViolation::DuplicateKey {
                key: format!("{:?}", info.key),
            });
            return;
        }
        match self.check(&info) {
            Ok(node) => {
                self.seen.insert(info.key.clone());
                (self.emit)(info, node);
            }
            Err(violation) => {
                vwarn!(%violation, "LayoutInfoEmitter: contract violation");
                self.violation = Some(violation);
            }
        }
    }

    pub fn contains(&self, key: &ViewKey<C::Key>) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns the first violation, if any.
    pub fn finish(self) -> Result<(), ContractViolation> {
        match self.violation {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }
}
