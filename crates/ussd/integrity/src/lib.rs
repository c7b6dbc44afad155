//! USSD Integrity
//!
//! Types for the carrier USSD channel:
//! - Gateway requests and `CON`/`END` responses
//! - The declarative menu tree (prompt, children, terminal action)
//! - Structural validation of a menu tree
//! - Request validation against the accepted service codes

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tujali_shared::{string_enum, validate_phone_number, ValidationErrorCode, ValidationResult};

/// Separator between selections in the accumulated input
pub const SEPARATOR: char = '*';

/// Selection that jumps back to the root menu
pub const BACK_TO_ROOT: &str = "00";

/// Carrier screen limit for confirmation screens
pub const MAX_SCREEN_CHARS: usize = 160;

pub const RETRY_HEADER: &str = "Invalid option. Please try again.";

pub const FAILURE_TEXT: &str = "Sorry, we could not complete your request. Please try again later.";

// ============================================================================
// Gateway messages
// ============================================================================

/// Callback body sent by the USSD gateway on every round trip
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub service_code: String,
    #[serde(default)]
    pub phone_number: String,
    /// Every selection so far joined by `*`; empty on the first request
    #[serde(default)]
    pub text: String,
}

/// Reject requests the menu should never see
pub fn validate_ussd_request(request: &UssdRequest, service_codes: &[String]) -> ValidationResult {
    let mut result = ValidationResult::new();
    if request.session_id.trim().is_empty() {
        result.add_error("sessionId", "Session id is required", ValidationErrorCode::Required);
    }
    if request.service_code.trim().is_empty() {
        result.add_error("serviceCode", "Service code is required", ValidationErrorCode::Required);
    } else if !service_codes.iter().any(|c| c == request.service_code.trim()) {
        result.add_error(
            "serviceCode",
            &format!("Unknown service code '{}'", request.service_code.trim()),
            ValidationErrorCode::InvalidReference,
        );
    }
    result.merge(validate_phone_number(&request.phone_number));
    result
}

/// Screen returned to the gateway
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum UssdResponse {
    /// Keeps the session open for another selection
    Continue(String),
    /// Closes the session
    End(String),
}

impl UssdResponse {
    pub fn text(&self) -> &str {
        match self {
            UssdResponse::Continue(text) | UssdResponse::End(text) => text,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, UssdResponse::End(_))
    }

    pub fn failure() -> Self {
        UssdResponse::End(FAILURE_TEXT.to_string())
    }

    /// Plain-text body in the gateway's `CON`/`END` convention
    pub fn to_wire(&self) -> String {
        match self {
            UssdResponse::Continue(text) => format!("CON {}", text),
            UssdResponse::End(text) => format!("END {}", text),
        }
    }
}

// ============================================================================
// Menu tree
// ============================================================================

string_enum! {
    /// Named values collected on the way to a terminal action
    pub enum Param {
        /// Town, landmark or coordinates the provider listing is ranked from
        NearLocation => "near_location",
        VisitType => "visit_type",
        ProviderId => "provider_id",
        DayOffset => "day_offset",
        Slot => "slot",
        SymptomText => "symptom_text",
        Severity => "severity",
        Name => "name",
        Age => "age",
        Gender => "gender",
        Location => "location",
    }
}

string_enum! {
    pub enum HealthTopic {
        Symptoms => "symptoms",
        Medication => "medication",
        Prevention => "prevention",
        Vaccination => "vaccination",
    }
}

/// Side effect or final screen at a leaf of the tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "topic", rename_all = "snake_case")]
pub enum TerminalAction {
    RegisterPatient,
    LogSymptom,
    BookAppointment,
    CancelBooking,
    ListAppointments,
    HealthTip(HealthTopic),
    Emergency,
    Exit,
}

impl TerminalAction {
    /// Whether the action writes to the data layer
    pub fn writes(&self) -> bool {
        matches!(
            self,
            TerminalAction::RegisterPatient | TerminalAction::LogSymptom | TerminalAction::BookAppointment
        )
    }
}

/// One fixed choice: typed `key`, stored as `value`, shown as `label`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MenuOption {
    pub key: String,
    pub label: String,
    pub value: String,
}

impl MenuOption {
    pub fn new(key: &str, label: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// How a capture edge validates the segment it consumes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum InputRule {
    /// Free text, length counted in characters after trimming
    Text { min: usize, max: usize },
    Number { min: i64, max: i64 },
    OneOf(Vec<MenuOption>),
    /// 1-based index into the provider listing
    ProviderPick,
    /// Like `OneOf`, but options whose value is already booked for the
    /// chosen provider and day are hidden and refused. Keys stay stable.
    OpenSlot(Vec<MenuOption>),
}

impl InputRule {
    /// Validate a segment against the static rules. [`InputRule::ProviderPick`]
    /// and [`InputRule::OpenSlot`] need live data and never accept here.
    /// Returns the value to store.
    pub fn accept(&self, segment: &str) -> Option<String> {
        let segment = segment.trim();
        match self {
            InputRule::Text { min, max } => {
                let len = segment.chars().count();
                (len >= *min && len <= *max).then(|| segment.to_string())
            }
            InputRule::Number { min, max } => segment
                .parse::<i64>()
                .ok()
                .filter(|n| n >= min && n <= max)
                .map(|n| n.to_string()),
            InputRule::OneOf(options) => options.iter().find(|o| o.key == segment).map(|o| o.value.clone()),
            InputRule::ProviderPick | InputRule::OpenSlot(_) => None,
        }
    }
}

/// A keyed child of a menu
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MenuEntry {
    pub key: String,
    pub label: String,
    pub node: MenuNode,
}

/// Edge that consumes one segment as a named parameter
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Capture {
    pub param: Param,
    pub rule: InputRule,
    pub next: MenuNode,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Children {
    Menu(Vec<MenuEntry>),
    Capture(Box<Capture>),
}

/// Node of the static menu tree
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MenuNode {
    /// Stable identifier, unique within the tree
    pub id: String,
    pub prompt: String,
    pub children: Option<Children>,
    pub action: Option<TerminalAction>,
}

impl MenuNode {
    pub fn menu(id: &str, prompt: &str, entries: Vec<MenuEntry>) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            children: Some(Children::Menu(entries)),
            action: None,
        }
    }

    pub fn capture(id: &str, prompt: &str, param: Param, rule: InputRule, next: MenuNode) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            children: Some(Children::Capture(Box::new(Capture { param, rule, next }))),
            action: None,
        }
    }

    pub fn leaf(id: &str, action: TerminalAction) -> Self {
        Self {
            id: id.to_string(),
            prompt: String::new(),
            children: None,
            action: Some(action),
        }
    }

    /// Wrap as a keyed child
    pub fn under(self, key: &str, label: &str) -> MenuEntry {
        MenuEntry {
            key: key.to_string(),
            label: label.to_string(),
            node: self,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.action.is_some()
    }

    /// Depth of the deepest leaf, counting this node as 1
    pub fn depth(&self) -> usize {
        1 + match &self.children {
            Some(Children::Menu(entries)) => entries.iter().map(|e| e.node.depth()).max().unwrap_or(0),
            Some(Children::Capture(capture)) => capture.next.depth(),
            None => 0,
        }
    }

    /// Static screen text: the prompt followed by the numbered choices.
    /// Provider picks list providers at request time and render only the
    /// prompt; open slots render every slot.
    pub fn render(&self) -> String {
        let mut lines = vec![self.prompt.clone()];
        match &self.children {
            Some(Children::Menu(entries)) => {
                lines.extend(entries.iter().map(|e| format!("{}. {}", e.key, e.label)));
            }
            Some(Children::Capture(capture)) => {
                if let InputRule::OneOf(options) | InputRule::OpenSlot(options) = &capture.rule {
                    lines.extend(options.iter().map(|o| format!("{}. {}", o.key, o.label)));
                }
            }
            None => {}
        }
        lines.join("\n")
    }
}

/// Check the structural rules of a menu tree.
///
/// Every node must have children or a terminal action but not both, ids
/// must be unique, and keys must be non-empty, distinct among siblings and
/// never the back-to-root selection.
pub fn validate_menu_tree(root: &MenuNode) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut ids = HashSet::new();
    check_node(root, &mut ids, &mut result);
    result
}

fn check_node<'a>(node: &'a MenuNode, ids: &mut HashSet<&'a str>, result: &mut ValidationResult) {
    if !ids.insert(node.id.as_str()) {
        result.add_error(&node.id, "Duplicate node id", ValidationErrorCode::DuplicateValue);
    }
    match (&node.children, &node.action) {
        (Some(_), Some(_)) => {
            result.add_error(&node.id, "Node has both children and an action", ValidationErrorCode::InvalidFormat);
        }
        (None, None) => {
            result.add_error(&node.id, "Node has neither children nor an action", ValidationErrorCode::Required);
        }
        _ => {}
    }

    match &node.children {
        Some(Children::Menu(entries)) => {
            if entries.is_empty() {
                result.add_error(&node.id, "Menu has no entries", ValidationErrorCode::Required);
            }
            check_keys(&node.id, entries.iter().map(|e| e.key.as_str()), result);
            for entry in entries {
                check_node(&entry.node, ids, result);
            }
        }
        Some(Children::Capture(capture)) => {
            match &capture.rule {
                InputRule::Text { min, max } if min > max || *max == 0 => {
                    result.add_error(&node.id, "Text range is empty", ValidationErrorCode::OutOfRange);
                }
                InputRule::Number { min, max } if min > max => {
                    result.add_error(&node.id, "Number range is empty", ValidationErrorCode::OutOfRange);
                }
                InputRule::OneOf(options) | InputRule::OpenSlot(options) => {
                    if options.is_empty() {
                        result.add_error(&node.id, "Choice has no options", ValidationErrorCode::Required);
                    }
                    check_keys(&node.id, options.iter().map(|o| o.key.as_str()), result);
                }
                _ => {}
            }
            check_node(&capture.next, ids, result);
        }
        None => {}
    }
}

fn check_keys<'a>(node_id: &str, keys: impl Iterator<Item = &'a str>, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for key in keys {
        if key.is_empty() || key == BACK_TO_ROOT || key.contains(SEPARATOR) {
            result.add_error(node_id, &format!("Invalid key '{}'", key), ValidationErrorCode::InvalidFormat);
        } else if !seen.insert(key) {
            result.add_error(node_id, &format!("Duplicate key '{}'", key), ValidationErrorCode::DuplicateValue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> Vec<String> {
        vec!["*384*123#".to_string()]
    }

    fn request(service_code: &str) -> UssdRequest {
        UssdRequest {
            session_id: "ATUid_1".to_string(),
            service_code: service_code.to_string(),
            phone_number: "+254712345678".to_string(),
            text: String::new(),
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(validate_ussd_request(&request("*384*123#"), &codes()).is_valid());

        let unknown = validate_ussd_request(&request("*999#"), &codes());
        assert!(unknown.has_error_for("serviceCode"));

        let mut missing = request("*384*123#");
        missing.session_id.clear();
        missing.phone_number.clear();
        let result = validate_ussd_request(&missing, &codes());
        assert!(result.has_error_for("sessionId"));
        assert!(result.has_error_for("phone_number"));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: UssdRequest =
            serde_json::from_str(r#"{"sessionId":"s1","serviceCode":"*384#","phoneNumber":"+254700000000"}"#).unwrap();
        assert_eq!(request.session_id, "s1");
        assert_eq!(request.text, "");
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(UssdResponse::Continue("Hi".to_string()).to_wire(), "CON Hi");
        assert_eq!(UssdResponse::failure().to_wire(), format!("END {}", FAILURE_TEXT));
        assert!(UssdResponse::failure().is_end());
    }

    #[test]
    fn test_input_rules() {
        let text = InputRule::Text { min: 2, max: 5 };
        assert_eq!(text.accept(" Amos "), Some("Amos".to_string()));
        assert_eq!(text.accept("A"), None);

        let number = InputRule::Number { min: 1, max: 120 };
        assert_eq!(number.accept("034"), Some("34".to_string()));
        assert_eq!(number.accept("0"), None);
        assert_eq!(number.accept("x"), None);

        let choice = InputRule::OneOf(vec![MenuOption::new("1", "Male", "male")]);
        assert_eq!(choice.accept("1"), Some("male".to_string()));
        assert_eq!(choice.accept("2"), None);
        assert_eq!(InputRule::ProviderPick.accept("1"), None);
        let slots = InputRule::OpenSlot(vec![MenuOption::new("1", "09:00", "09:00")]);
        assert_eq!(slots.accept("1"), None);
    }

    #[test]
    fn test_tree_validation() {
        let good = MenuNode::menu(
            "root",
            "Welcome",
            vec![
                MenuNode::leaf("exit", TerminalAction::Exit).under("0", "Exit"),
                MenuNode::capture(
                    "age",
                    "Enter age",
                    Param::Age,
                    InputRule::Number { min: 1, max: 120 },
                    MenuNode::leaf("register", TerminalAction::RegisterPatient),
                )
                .under("1", "Register"),
            ],
        );
        assert!(validate_menu_tree(&good).is_valid());
        assert_eq!(good.depth(), 3);
        assert_eq!(good.render(), "Welcome\n0. Exit\n1. Register");

        let mut both = MenuNode::leaf("x", TerminalAction::Exit);
        both.children = Some(Children::Menu(vec![MenuNode::leaf("y", TerminalAction::Exit).under("1", "Y")]));
        assert!(validate_menu_tree(&both).has_error_for("x"));

        let neither = MenuNode {
            id: "empty".to_string(),
            prompt: "Nothing".to_string(),
            children: None,
            action: None,
        };
        assert!(!validate_menu_tree(&neither).is_valid());

        let clash = MenuNode::menu(
            "root",
            "Menu",
            vec![
                MenuNode::leaf("a", TerminalAction::Exit).under("1", "A"),
                MenuNode::leaf("b", TerminalAction::Exit).under("1", "B"),
                MenuNode::leaf("c", TerminalAction::Exit).under("00", "C"),
                MenuNode::leaf("a", TerminalAction::Exit).under("2", "Again"),
            ],
        );
        let result = validate_menu_tree(&clash);
        assert!(result.has_error_for("root"));
        assert!(result.has_error_for("a"));
    }

    #[test]
    fn test_action_serializes_with_topic() {
        let json = serde_json::to_value(TerminalAction::HealthTip(HealthTopic::Prevention)).unwrap();
        assert_eq!(json["action"], "health_tip");
        assert_eq!(json["topic"], "prevention");
        assert!(TerminalAction::BookAppointment.writes());
        assert!(!TerminalAction::ListAppointments.writes());
    }

    #[test]
    fn test_open_slot_options_are_checked_like_choices() {
        let node = MenuNode::capture(
            "slot",
            "Select a time:",
            Param::Slot,
            InputRule::OpenSlot(vec![
                MenuOption::new("1", "09:00", "09:00"),
                MenuOption::new("1", "11:00", "11:00"),
            ]),
            MenuNode::leaf("done", TerminalAction::BookAppointment),
        );
        assert!(validate_menu_tree(&node).has_error_for("slot"));
        assert_eq!(node.render(), "Select a time:\n1. 09:00\n1. 11:00");
    }
}
