//! Permissions slice: what the current caller may do in this workspace.

use crate::types::Permissions;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionsState {
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PermissionsAction {
    Set(Permissions),
    Restore(PermissionsState),
}

pub(crate) fn apply(state: &mut PermissionsState, action: PermissionsAction) {
    match action {
        PermissionsAction::Set(permissions) => state.permissions = permissions,
        PermissionsAction::Restore(prior) => *state = prior,
    }
}
