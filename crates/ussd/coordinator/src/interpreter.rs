//! Menu tree interpreter.
//!
//! Every round trip carries the whole accumulated input, so the walk is a
//! pure function of the tree, the input text and what the [`Directory`]
//! reports. Each segment advances at most one level, which bounds the walk
//! by the number of segments.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tujali_shared::{HealthError, HealthResult};
use ussd_integrity::*;

/// Provider as listed on the pick screen
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProviderChoice {
    pub id: i64,
    pub name: String,
    pub specialization: String,
    /// From the place the caller typed; `None` when the provider's place is unknown
    pub distance_km: Option<f64>,
}

/// Live data a walk consults
pub trait Directory {
    /// Providers to offer, nearest to `near` first
    fn providers(&self, near: Option<&str>) -> HealthResult<Vec<ProviderChoice>>;

    /// Start times already held for `provider_id` on the day `day_offset`
    /// days from today
    fn taken_slots(&self, provider_id: i64, day_offset: i64) -> HealthResult<Vec<String>>;
}

/// Values collected along the path
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selections(HashMap<Param, String>);

impl Selections {
    pub fn get(&self, param: Param) -> Option<&str> {
        self.0.get(&param).map(String::as_str)
    }

    /// A value the menu guarantees on the way to the current action
    pub fn require(&self, param: Param) -> HealthResult<&str> {
        self.get(param)
            .ok_or_else(|| HealthError::InternalError(format!("missing menu selection '{}'", param)))
    }

    pub fn parse<T: std::str::FromStr>(&self, param: Param) -> HealthResult<T> {
        self.require(param)?
            .parse()
            .map_err(|_| HealthError::InternalError(format!("malformed menu selection '{}'", param)))
    }

    pub fn insert(&mut self, param: Param, value: String) {
        self.0.insert(param, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

/// Where the input leads
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Render a screen and wait for the next selection
    Prompt { node_id: String, screen: String, retry: bool },
    /// A provider pick with nobody to pick
    NoProviders { node_id: String },
    /// A slot pick with every slot of the day taken
    NoSlots { node_id: String },
    /// A leaf was reached
    Action {
        node_id: String,
        action: TerminalAction,
        selections: Selections,
    },
}

/// Result of walking one request's input
#[derive(Clone, Debug, PartialEq)]
pub struct Walk {
    /// Segments that were accepted, in order
    pub path: Vec<String>,
    pub outcome: Outcome,
}

/// Split accumulated input into selections, dropping empty segments
pub fn segments(text: &str) -> Vec<&str> {
    text.split(SEPARATOR).map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Walk the tree for `text`.
///
/// The directory is asked for providers the first time a provider pick is
/// reached and for taken slots the first time a slot pick is, then again
/// only if the place or the provider and day change. A leaf fires as soon
/// as it is reached; later segments are ignored.
pub fn walk<D>(root: &MenuNode, text: &str, directory: &D) -> HealthResult<Walk>
where
    D: Directory + ?Sized,
{
    let segments = segments(text);
    let mut lookups = Lookups::new(directory);
    let mut node = root;
    let mut selections = Selections::default();
    let mut path: Vec<String> = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let is_last = index + 1 == segments.len();

        if *segment == BACK_TO_ROOT {
            node = root;
            selections.clear();
            path.clear();
            continue;
        }

        let next = match &node.children {
            Some(Children::Menu(entries)) => entries.iter().find(|e| e.key == *segment).map(|e| &e.node),
            Some(Children::Capture(capture)) => {
                let value = match &capture.rule {
                    InputRule::ProviderPick => pick(lookups.providers(&selections)?, segment),
                    InputRule::OpenSlot(options) => open_slots(options, lookups.taken(&selections)?)
                        .find(|o| o.key == *segment)
                        .map(|o| o.value.clone()),
                    rule => rule.accept(segment),
                };
                value.map(|v| {
                    selections.insert(capture.param, v);
                    &capture.next
                })
            }
            None => None,
        };

        match next {
            Some(next) => {
                path.push(segment.to_string());
                node = next;
                if let Some(action) = node.action {
                    return Ok(Walk {
                        path,
                        outcome: Outcome::Action {
                            node_id: node.id.clone(),
                            action,
                            selections,
                        },
                    });
                }
            }
            // Earlier rounds already answered this with a retry screen
            None if !is_last => continue,
            None => {
                let outcome = prompt(node, &mut lookups, &selections, true)?;
                return Ok(Walk { path, outcome });
            }
        }
    }

    let outcome = prompt(node, &mut lookups, &selections, false)?;
    Ok(Walk { path, outcome })
}

fn pick(choices: &[ProviderChoice], segment: &str) -> Option<String> {
    let index: usize = segment.parse().ok()?;
    index
        .checked_sub(1)
        .and_then(|i| choices.get(i))
        .map(|p| p.id.to_string())
}

fn open_slots<'a>(options: &'a [MenuOption], taken: &'a [String]) -> impl Iterator<Item = &'a MenuOption> {
    options.iter().filter(move |o| !taken.contains(&o.value))
}

/// Short distance label for a pick line
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        "<1km".to_string()
    } else {
        format!("{:.0}km", km)
    }
}

fn prompt<D>(node: &MenuNode, lookups: &mut Lookups<'_, D>, selections: &Selections, retry: bool) -> HealthResult<Outcome>
where
    D: Directory + ?Sized,
{
    let mut screen = match node.children.as_ref() {
        Some(Children::Capture(capture)) => match &capture.rule {
            InputRule::ProviderPick => {
                let choices = lookups.providers(selections)?;
                if choices.is_empty() {
                    return Ok(Outcome::NoProviders {
                        node_id: node.id.clone(),
                    });
                }
                let header = match selections.get(Param::NearLocation) {
                    Some(near) => format!("Providers near {}:", near),
                    None => node.prompt.clone(),
                };
                let mut lines = vec![header];
                lines.extend(choices.iter().enumerate().map(|(i, p)| {
                    let distance = p.distance_km.map(|km| format!(" {}", format_distance(km)));
                    format!("{}. {} ({}){}", i + 1, p.name, p.specialization, distance.unwrap_or_default())
                }));
                lines.join("\n")
            }
            InputRule::OpenSlot(options) => {
                let taken = lookups.taken(selections)?;
                let mut open = open_slots(options, taken).peekable();
                if open.peek().is_none() {
                    return Ok(Outcome::NoSlots {
                        node_id: node.id.clone(),
                    });
                }
                let mut lines = vec![node.prompt.clone()];
                lines.extend(open.map(|o| format!("{}. {}", o.key, o.label)));
                lines.join("\n")
            }
            _ => node.render(),
        },
        _ => node.render(),
    };
    if retry {
        screen = format!("{}\n{}", RETRY_HEADER, screen);
    }
    Ok(Outcome::Prompt {
        node_id: node.id.clone(),
        screen,
        retry,
    })
}

/// Directory answers memoized for one walk
struct Lookups<'d, D: ?Sized> {
    directory: &'d D,
    providers: Option<(Option<String>, Vec<ProviderChoice>)>,
    taken: Option<((i64, i64), Vec<String>)>,
}

impl<'d, D> Lookups<'d, D>
where
    D: Directory + ?Sized,
{
    fn new(directory: &'d D) -> Self {
        Self {
            directory,
            providers: None,
            taken: None,
        }
    }

    fn providers(&mut self, selections: &Selections) -> HealthResult<&[ProviderChoice]> {
        let near = selections.get(Param::NearLocation);
        if self.providers.as_ref().map_or(true, |(cached, _)| cached.as_deref() != near) {
            let choices = self.directory.providers(near)?;
            self.providers = Some((near.map(str::to_string), choices));
        }
        Ok(self.providers.as_ref().map(|(_, c)| c.as_slice()).unwrap_or_default())
    }

    fn taken(&mut self, selections: &Selections) -> HealthResult<&[String]> {
        let key = (
            selections.parse::<i64>(Param::ProviderId)?,
            selections.parse::<i64>(Param::DayOffset)?,
        );
        if self.taken.as_ref().map_or(true, |(cached, _)| *cached != key) {
            let times = self.directory.taken_slots(key.0, key.1)?;
            self.taken = Some((key, times));
        }
        Ok(self.taken.as_ref().map(|(_, t)| t.as_slice()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::build_menu;
    use proptest::prelude::*;
    use std::cell::Cell;

    /// Two providers, with `taken` booked on every provider and day
    #[derive(Default)]
    struct Fixed {
        taken: Vec<String>,
        empty: bool,
        provider_calls: Cell<usize>,
        slot_calls: Cell<usize>,
    }

    impl Fixed {
        fn with_taken(times: &[&str]) -> Self {
            Self {
                taken: times.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl Directory for Fixed {
        fn providers(&self, _near: Option<&str>) -> HealthResult<Vec<ProviderChoice>> {
            self.provider_calls.set(self.provider_calls.get() + 1);
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(vec![
                ProviderChoice {
                    id: 11,
                    name: "Dr. Achieng".to_string(),
                    specialization: "General Practice".to_string(),
                    distance_km: Some(2.4),
                },
                ProviderChoice {
                    id: 12,
                    name: "Dr. Mwangi".to_string(),
                    specialization: "Paediatrics".to_string(),
                    distance_km: None,
                },
            ])
        }

        fn taken_slots(&self, _provider_id: i64, _day_offset: i64) -> HealthResult<Vec<String>> {
            self.slot_calls.set(self.slot_calls.get() + 1);
            Ok(self.taken.clone())
        }
    }

    struct Unreachable;

    impl Directory for Unreachable {
        fn providers(&self, _near: Option<&str>) -> HealthResult<Vec<ProviderChoice>> {
            Err(HealthError::StorageError("down".to_string()))
        }

        fn taken_slots(&self, _provider_id: i64, _day_offset: i64) -> HealthResult<Vec<String>> {
            Err(HealthError::StorageError("down".to_string()))
        }
    }

    fn run(text: &str) -> Walk {
        walk(&build_menu(), text, &Fixed::default()).unwrap()
    }

    fn screen(walk: &Walk) -> (&str, &str, bool) {
        match &walk.outcome {
            Outcome::Prompt { node_id, screen, retry } => (node_id.as_str(), screen.as_str(), *retry),
            other => panic!("expected a prompt, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_renders_root() {
        let walk = run("");
        let (node, text, retry) = screen(&walk);
        assert_eq!(node, "root");
        assert!(text.starts_with("Welcome to Tujali Health"));
        assert!(!retry);
        assert!(walk.path.is_empty());
    }

    #[test]
    fn test_booking_starts_with_location() {
        let walk = run("1");
        assert_eq!(screen(&walk).0, "book.location");

        let walk = run("1*Kisumu");
        let (node, text, _) = screen(&walk);
        assert_eq!(node, "book.visit_type");
        assert!(text.contains("1. Physical visit"));

        let walk = run("1*K");
        let (node, _, retry) = screen(&walk);
        assert_eq!(node, "book.location");
        assert!(retry);
    }

    #[test]
    fn test_trailing_separator_is_exhausted_input() {
        assert_eq!(run("1*"), run("1"));
        assert_eq!(run("1**Kisumu"), run("1*Kisumu"));
    }

    #[test]
    fn test_provider_pick_lists_providers_with_distance() {
        let walk = run("1*Kisumu*2");
        let (node, text, _) = screen(&walk);
        assert_eq!(node, "book.provider");
        assert_eq!(
            text,
            "Providers near Kisumu:\n1. Dr. Achieng (General Practice) 2km\n2. Dr. Mwangi (Paediatrics)"
        );
    }

    #[test]
    fn test_distance_labels() {
        assert_eq!(format_distance(0.4), "<1km");
        assert_eq!(format_distance(12.46), "12km");
    }

    #[test]
    fn test_unknown_last_segment_retries_same_node() {
        let walk = run("1*Kisumu*2*9");
        let (node, text, retry) = screen(&walk);
        assert_eq!(node, "book.provider");
        assert!(retry);
        assert!(text.starts_with(RETRY_HEADER));
        assert_eq!(walk.path, vec!["1", "Kisumu", "2"]);
    }

    #[test]
    fn test_retry_continues_after_invalid_segment() {
        let walk = run("1*Kisumu*2*9*2*1*3*1");
        match walk.outcome {
            Outcome::Action { action, selections, .. } => {
                assert_eq!(action, TerminalAction::BookAppointment);
                assert_eq!(selections.get(Param::NearLocation), Some("Kisumu"));
                assert_eq!(selections.get(Param::VisitType), Some("teleconsult"));
                assert_eq!(selections.get(Param::ProviderId), Some("12"));
                assert_eq!(selections.get(Param::DayOffset), Some("0"));
                assert_eq!(selections.get(Param::Slot), Some("14:00"));
            }
            other => panic!("expected booking, got {:?}", other),
        }
    }

    #[test]
    fn test_taken_slots_are_hidden_and_refused() {
        let directory = Fixed::with_taken(&["09:00", "14:00"]);
        let menu = build_menu();

        let listed = walk(&menu, "1*Kisumu*1*1*2", &directory).unwrap();
        let (node, text, _) = screen(&listed);
        assert_eq!(node, "book.slot");
        assert_eq!(text, "Select a time:\n2. 11:00\n4. 16:00");

        let refused = walk(&menu, "1*Kisumu*1*1*2*1", &directory).unwrap();
        let (node, text, retry) = screen(&refused);
        assert_eq!(node, "book.slot");
        assert!(retry);
        assert!(!text.contains("09:00"));

        let booked = walk(&menu, "1*Kisumu*1*1*2*1*2*1", &directory).unwrap();
        match booked.outcome {
            Outcome::Action { selections, .. } => assert_eq!(selections.get(Param::Slot), Some("11:00")),
            other => panic!("expected booking, got {:?}", other),
        }
    }

    #[test]
    fn test_fully_booked_day() {
        let directory = Fixed::with_taken(&["09:00", "11:00", "14:00", "16:00"]);
        let full = walk(&build_menu(), "1*Kisumu*1*1*3", &directory).unwrap();
        assert!(matches!(full.outcome, Outcome::NoSlots { ref node_id } if node_id == "book.slot"));
    }

    #[test]
    fn test_back_to_root_discards_selections() {
        let walk = run("4*Amina Hassan*00");
        assert_eq!(screen(&walk).0, "root");
        assert!(walk.path.is_empty());

        let walk = run("4*Amina Hassan*00*3");
        assert!(matches!(
            walk.outcome,
            Outcome::Action {
                action: TerminalAction::ListAppointments,
                ref selections,
                ..
            } if selections.is_empty()
        ));
    }

    #[test]
    fn test_registration_collects_values() {
        let walk = run("4*Amina Hassan*29*2*Garissa");
        match walk.outcome {
            Outcome::Action { action, selections, .. } => {
                assert_eq!(action, TerminalAction::RegisterPatient);
                assert_eq!(selections.get(Param::Name), Some("Amina Hassan"));
                assert_eq!(selections.parse::<u32>(Param::Age).unwrap(), 29);
                assert_eq!(selections.get(Param::Gender), Some("female"));
                assert_eq!(selections.get(Param::Location), Some("Garissa"));
            }
            other => panic!("expected registration, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_age_retries() {
        let walk = run("4*Amina*130");
        let (node, _, retry) = screen(&walk);
        assert_eq!(node, "register.age");
        assert!(retry);
    }

    #[test]
    fn test_leaf_fires_immediately() {
        let walk = run("0*1*2");
        assert!(matches!(
            walk.outcome,
            Outcome::Action {
                action: TerminalAction::Exit,
                ..
            }
        ));
        assert_eq!(walk.path, vec!["0"]);
    }

    #[test]
    fn test_lookups_are_lazy_and_failures_propagate() {
        // No provider pick on this path, so the directory is never asked
        assert!(walk(&build_menu(), "2*fever", &Unreachable).is_ok());
        assert!(walk(&build_menu(), "1*Kisumu*1", &Unreachable).is_err());
    }

    #[test]
    fn test_lookups_happen_once_per_walk() {
        let directory = Fixed::default();
        walk(&build_menu(), "1*Kisumu*1*9*8*1*1*7*6*1", &directory).unwrap();
        assert_eq!(directory.provider_calls.get(), 1);
        assert_eq!(directory.slot_calls.get(), 1);
    }

    #[test]
    fn test_no_providers() {
        let directory = Fixed {
            empty: true,
            ..Default::default()
        };
        let nobody = walk(&build_menu(), "1*Kisumu*1", &directory).unwrap();
        assert!(matches!(nobody.outcome, Outcome::NoProviders { .. }));
    }

    proptest! {
        #[test]
        fn test_walk_terminates_within_segment_count(
            parts in proptest::collection::vec(prop_oneof![
                "[0-9]{1,2}",
                Just("00".to_string()),
                "[a-z ]{0,12}",
            ], 0..30)
        ) {
            let text = parts.join("*");
            let directory = Fixed::with_taken(&["11:00"]);
            let first = walk(&build_menu(), &text, &directory).unwrap();
            prop_assert!(first.path.len() <= segments(&text).len());
            // Replaying the same input gives the same result
            prop_assert_eq!(walk(&build_menu(), &text, &directory).unwrap(), first);
        }
    }
}
