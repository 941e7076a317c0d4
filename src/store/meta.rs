//! Dashboard identity slice: reference, title, and the last persisted
//! definition (the baseline `Reset` rolls back to).

use crate::backend::DashboardDefinition;
use crate::types::ObjRef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaState {
    /// Reference of the persisted dashboard; `None` until first save.
    pub dashboard: Option<ObjRef>,
    pub title: String,
    /// Definition as last loaded or saved; `Reset` re-applies it.
    pub persisted: Option<DashboardDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaAction {
    SetIdentity {
        dashboard: Option<ObjRef>,
        title: String,
    },
    SetTitle(String),
    SetReference(ObjRef),
    SetPersisted(Option<DashboardDefinition>),
    Restore(MetaState),
}

pub(crate) fn apply(state: &mut MetaState, action: MetaAction) {
    match action {
        MetaAction::SetIdentity { dashboard, title } => {
            state.dashboard = dashboard;
            state.title = title;
        }
        MetaAction::SetTitle(title) => state.title = title,
        MetaAction::SetReference(reference) => state.dashboard = Some(reference),
        MetaAction::SetPersisted(definition) => state.persisted = definition,
        MetaAction::Restore(prior) => *state = prior,
    }
}
