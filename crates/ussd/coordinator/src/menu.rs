//! The Tujali Health USSD menu.

use ussd_integrity::*;

/// Appointment slots offered on every day
pub const SLOTS: [&str; 4] = ["09:00", "11:00", "14:00", "16:00"];

pub const EMERGENCY_TEXT: &str = "EMERGENCY SERVICES\nCall 999 or 112 (free).\nOr go to your nearest district hospital or health centre.\nStay safe!";

pub const EXIT_TEXT: &str = "Thank you for using Tujali Health. Stay healthy!";

pub const SLOT_TAKEN_TEXT: &str = "Sorry, that time was just booked by someone else. Please dial again and pick another time.";

pub const NO_SLOTS_TEXT: &str = "No open times left on that day. Please dial again and choose another day.";

pub const CANCELLED_TEXT: &str = "Booking cancelled. No appointment was made. Thank you for using Tujali Health.";

pub fn health_tip(topic: HealthTopic) -> &'static str {
    match topic {
        HealthTopic::Symptoms => {
            "Fever, cough or diarrhoea lasting more than 2 days needs a check-up. Drink plenty of clean water and rest."
        }
        HealthTopic::Medication => {
            "Take medicine at the same time each day and finish the full course, even when you feel better."
        }
        HealthTopic::Prevention => {
            "Wash hands with soap, sleep under a treated net and boil or treat drinking water."
        }
        HealthTopic::Vaccination => {
            "Children need vaccines at birth, 6, 10 and 14 weeks, 9 and 18 months. Ask your clinic for the schedule."
        }
    }
}

fn options(list: &[(&str, &str, &str)]) -> InputRule {
    InputRule::OneOf(list.iter().map(|(k, l, v)| MenuOption::new(k, l, v)).collect())
}

fn booking_branch() -> MenuNode {
    let confirm = MenuNode::menu(
        "book.confirm",
        "Confirm your appointment:",
        vec![
            MenuNode::leaf("book.confirmed", TerminalAction::BookAppointment).under("1", "Confirm"),
            MenuNode::leaf("book.cancelled", TerminalAction::CancelBooking).under("2", "Cancel"),
        ],
    );
    let slot_options: Vec<(String, &str)> = SLOTS.iter().enumerate().map(|(i, s)| ((i + 1).to_string(), *s)).collect();
    let slot = MenuNode::capture(
        "book.slot",
        "Select a time:",
        Param::Slot,
        InputRule::OpenSlot(slot_options.iter().map(|(k, s)| MenuOption::new(k, s, s)).collect()),
        confirm,
    );
    let day = MenuNode::capture(
        "book.day",
        "Select a day:",
        Param::DayOffset,
        options(&[("1", "Today", "0"), ("2", "Tomorrow", "1"), ("3", "In 2 days", "2")]),
        slot,
    );
    let provider = MenuNode::capture("book.provider", "Select a provider:", Param::ProviderId, InputRule::ProviderPick, day);
    let visit_type = MenuNode::capture(
        "book.visit_type",
        "Choose visit type:",
        Param::VisitType,
        options(&[("1", "Physical visit", "physical"), ("2", "Teleconsultation", "teleconsult")]),
        provider,
    );
    MenuNode::capture(
        "book.location",
        "Enter your town or a nearby landmark:",
        Param::NearLocation,
        InputRule::Text { min: 2, max: 40 },
        visit_type,
    )
}

fn symptom_branch() -> MenuNode {
    let severity = MenuNode::capture(
        "symptom.severity",
        "How severe is it?",
        Param::Severity,
        options(&[("1", "Mild", "mild"), ("2", "Moderate", "moderate"), ("3", "Severe", "severe")]),
        MenuNode::leaf("symptom.logged", TerminalAction::LogSymptom),
    );
    MenuNode::capture(
        "symptom.text",
        "Describe your symptoms:",
        Param::SymptomText,
        InputRule::Text { min: 3, max: 100 },
        severity,
    )
}

fn registration_branch() -> MenuNode {
    let location = MenuNode::capture(
        "register.location",
        "Enter your town or village:",
        Param::Location,
        InputRule::Text { min: 2, max: 60 },
        MenuNode::leaf("register.done", TerminalAction::RegisterPatient),
    );
    let gender = MenuNode::capture(
        "register.gender",
        "Select gender:",
        Param::Gender,
        options(&[("1", "Male", "male"), ("2", "Female", "female"), ("3", "Other", "other")]),
        location,
    );
    let age = MenuNode::capture(
        "register.age",
        "Enter your age:",
        Param::Age,
        InputRule::Number { min: 1, max: 120 },
        gender,
    );
    MenuNode::capture(
        "register.name",
        "Enter your full name:",
        Param::Name,
        InputRule::Text { min: 2, max: 60 },
        age,
    )
}

fn information_branch() -> MenuNode {
    MenuNode::menu(
        "info",
        "Health Information",
        vec![
            MenuNode::leaf("info.symptoms", TerminalAction::HealthTip(HealthTopic::Symptoms)).under("1", "Common symptoms"),
            MenuNode::leaf("info.medication", TerminalAction::HealthTip(HealthTopic::Medication)).under("2", "Medication"),
            MenuNode::leaf("info.prevention", TerminalAction::HealthTip(HealthTopic::Prevention)).under("3", "Prevention"),
            MenuNode::leaf("info.vaccination", TerminalAction::HealthTip(HealthTopic::Vaccination))
                .under("4", "Vaccination"),
        ],
    )
}

/// Build the full menu tree
pub fn build_menu() -> MenuNode {
    MenuNode::menu(
        "root",
        "Welcome to Tujali Health",
        vec![
            booking_branch().under("1", "Book Appointment"),
            symptom_branch().under("2", "Report Symptom"),
            MenuNode::leaf("appointments", TerminalAction::ListAppointments).under("3", "My Appointments"),
            registration_branch().under("4", "Register"),
            information_branch().under("5", "Health Information"),
            MenuNode::leaf("emergency", TerminalAction::Emergency).under("6", "Emergency Services"),
            MenuNode::leaf("exit", TerminalAction::Exit).under("0", "Exit"),
        ],
    )
}
