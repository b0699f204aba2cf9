// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Local representation of a managed resource.

use serde::{Deserialize, Serialize};

/// Opaque identifier plus the last observed remote state.
///
/// A handle starts empty at the beginning of a create, is populated once the
/// identifier is known, and is cleared when a delete confirms removal. Operations
/// that fail leave the identifier as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle<S> {
    id: Option<String>,
    state: Option<S>,
}

impl<S> Default for ResourceHandle<S> {
    fn default() -> Self {
        Self {
            id: None,
            state: None,
        }
    }
}

impl<S> ResourceHandle<S> {
    /// An empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that only knows its identifier (e.g. an imported resource).
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            state: None,
        }
    }

    /// The identifier, if known and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The last observed state.
    #[must_use]
    pub fn state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    /// Whether the handle holds neither identifier nor state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id().is_none() && self.state.is_none()
    }

    /// Set the identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Replace the observed state, keeping the identifier.
    pub fn observe(&mut self, state: S) {
        self.state = Some(state);
    }

    /// Mutable access to the observed state.
    pub fn state_mut(&mut self) -> Option<&mut S> {
        self.state.as_mut()
    }

    /// Forget the resource: it no longer exists remotely.
    pub fn clear(&mut self) {
        self.id = None;
        self.state = None;
    }
}
