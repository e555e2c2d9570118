//! 菜单智能体：菜品、价格、过敏原与饮食需求

use crate::agents::capability::Capability;
use crate::agents::AgentKind;
use crate::tools::catalog::GET_MENU;

pub struct MenuCapability;

impl Capability for MenuCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Menu
    }

    fn tools(&self) -> &'static [&'static str] {
        &[GET_MENU]
    }

    fn clarify_message(&self) -> &'static str {
        "Which dish or dietary requirement would you like me to check on our menu?"
    }
}
