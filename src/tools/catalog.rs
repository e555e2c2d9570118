//! 内置工具目录
//!
//! 七个工具在进程启动时注册；clarify_and_respond 是所有智能体共享的兜底工具。

use crate::tools::{ParamFormat, ParamSpec, ToolDefinition, ToolRegistry};

pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const GET_MENU: &str = "get_menu";
pub const GET_RESTAURANT_INFO: &str = "get_restaurant_info";
pub const GET_CELEBRATION_OPTIONS: &str = "get_celebration_options";
pub const CREATE_RESERVATION: &str = "create_reservation";
pub const HANDLE_SUPPORT: &str = "handle_support";
pub const CLARIFY_AND_RESPOND: &str = "clarify_and_respond";

pub const MAX_PARTY_SIZE: i64 = 20;

pub const MENU_CATEGORIES: &[&str] = &["starters", "mains", "desserts", "drinks", "specials"];
pub const DIETARY_TAGS: &[&str] = &[
    "vegetarian",
    "vegan",
    "gluten_free",
    "dairy_free",
    "nut_free",
];
pub const INFO_TOPICS: &[&str] = &[
    "hours",
    "location",
    "parking",
    "contact",
    "policies",
    "accessibility",
    "general",
];
pub const OCCASIONS: &[&str] = &["birthday", "anniversary", "proposal", "corporate", "other"];
pub const SUPPORT_TOPICS: &[&str] = &[
    "cancellation",
    "modification",
    "complaint",
    "refund",
    "general",
];

fn check_availability() -> ToolDefinition {
    ToolDefinition::new(
        CHECK_AVAILABILITY,
        "List the table types still free for a date, time and party size.",
    )
    .param(
        ParamSpec::string("date", "Reservation date, YYYY-MM-DD")
            .required()
            .format(ParamFormat::Date),
    )
    .param(
        ParamSpec::string("time", "Reservation time, HH:MM 24h")
            .required()
            .format(ParamFormat::Time),
    )
    .param(
        ParamSpec::integer("party_size", "Number of guests")
            .required()
            .range(1, MAX_PARTY_SIZE),
    )
}

fn get_menu() -> ToolDefinition {
    ToolDefinition::new(
        GET_MENU,
        "Look up dishes, prices, ingredients and dietary information.",
    )
    .param(ParamSpec::string("query", "Free-text dish or ingredient"))
    .param(ParamSpec::string("category", "Menu section").one_of(MENU_CATEGORIES))
    .param(ParamSpec::string("dietary", "Dietary requirement").one_of(DIETARY_TAGS))
}

fn get_restaurant_info() -> ToolDefinition {
    ToolDefinition::new(
        GET_RESTAURANT_INFO,
        "Opening hours, location, parking, contact details and house policies.",
    )
    .param(
        ParamSpec::string("topic", "Information topic")
            .required()
            .one_of(INFO_TOPICS),
    )
    .param(ParamSpec::string("query", "The guest's exact question"))
}

fn get_celebration_options() -> ToolDefinition {
    ToolDefinition::new(
        GET_CELEBRATION_OPTIONS,
        "Packages and extras for birthdays, anniversaries and other occasions.",
    )
    .param(
        ParamSpec::string("occasion", "Kind of celebration")
            .required()
            .one_of(OCCASIONS),
    )
    .param(ParamSpec::integer("party_size", "Number of guests").range(1, 50))
}

fn create_reservation() -> ToolDefinition {
    ToolDefinition::new(
        CREATE_RESERVATION,
        "Create a confirmed reservation once every detail is known.",
    )
    .param(
        ParamSpec::string("date", "Reservation date, YYYY-MM-DD")
            .required()
            .format(ParamFormat::Date),
    )
    .param(
        ParamSpec::string("time", "Reservation time, HH:MM 24h")
            .required()
            .format(ParamFormat::Time),
    )
    .param(
        ParamSpec::integer("party_size", "Number of guests")
            .required()
            .range(1, MAX_PARTY_SIZE),
    )
    .param(ParamSpec::string("table_type", "Chosen table type").required())
    .param(ParamSpec::string("customer_name", "Guest full name").required())
    .param(
        ParamSpec::string("customer_email", "Guest email")
            .required()
            .format(ParamFormat::Email),
    )
    .param(ParamSpec::string("customer_phone", "Guest phone number").required())
    .param(ParamSpec::string("special_requests", "Allergies, seating wishes, etc."))
    .param(ParamSpec::string("occasion", "Occasion being celebrated").one_of(OCCASIONS))
}

fn handle_support() -> ToolDefinition {
    ToolDefinition::new(
        HANDLE_SUPPORT,
        "Open a support request: cancellations, changes, complaints, refunds.",
    )
    .param(
        ParamSpec::string("topic", "Support topic")
            .required()
            .one_of(SUPPORT_TOPICS),
    )
    .param(ParamSpec::string("message", "What the guest needs").required())
    .param(ParamSpec::string("reservation_id", "Existing reservation reference"))
}

fn clarify_and_respond() -> ToolDefinition {
    ToolDefinition::new(
        CLARIFY_AND_RESPOND,
        "Ask the guest a clarifying question or reply without looking anything up.",
    )
    .param(ParamSpec::string("message", "Text shown to the guest").required())
}

/// 构建包含全部内置工具的注册表
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(check_availability());
    registry.register(get_menu());
    registry.register(get_restaurant_info());
    registry.register(get_celebration_options());
    registry.register(create_reservation());
    registry.register(handle_support());
    registry.register(clarify_and_respond());
    registry
}
