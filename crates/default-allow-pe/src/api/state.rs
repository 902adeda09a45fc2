use crate::scheme::Scheme;

pub(crate) struct ApiServerState {
    pub(crate) scheme: Scheme,
    pub(crate) default_allow_privilege_escalation: bool,
}
