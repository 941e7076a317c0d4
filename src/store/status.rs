//! Status slice: coarse lifecycle flags the host renders spinners off.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusState {
    /// Initialize has completed successfully at least once.
    pub initialized: bool,
    pub loading: bool,
    pub saving: bool,
    pub exporting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusAction {
    SetInitialized(bool),
    SetLoading(bool),
    SetSaving(bool),
    SetExporting(bool),
    Restore(StatusState),
}

pub(crate) fn apply(state: &mut StatusState, action: StatusAction) {
    match action {
        StatusAction::SetInitialized(value) => state.initialized = value,
        StatusAction::SetLoading(value) => state.loading = value,
        StatusAction::SetSaving(value) => state.saving = value,
        StatusAction::SetExporting(value) => state.exporting = value,
        StatusAction::Restore(prior) => *state = prior,
    }
}
