//! Preset queries for the interactive session.

use ensemble_orchestrator::TaskCategory;
use std::fmt::Write;

/// A canned query offered in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub label: &'static str,
    pub query: &'static str,
    pub category: TaskCategory,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        label: "Luxury hotel recommendations (search)",
        query: "Recommend some luxury hotels for business travellers",
        category: TaskCategory::Search,
    },
    Preset {
        label: "Transaction averages (analytics)",
        query: "What was the average transaction value over the last week?",
        category: TaskCategory::Analysis,
    },
    Preset {
        label: "Taxi trips on holidays vs weekdays (business intelligence)",
        query: "Compare the trip count on public holidays with regular weekdays",
        category: TaskCategory::Analysis,
    },
    Preset {
        label: "Send a test email (workflow)",
        query: "Send a test email to my inbox",
        category: TaskCategory::Simple,
    },
    Preset {
        label: "Current time (workflow)",
        query: "What is the current time? Format it nicely",
        category: TaskCategory::Simple,
    },
    Preset {
        label: "Digital transformation best practices (search)",
        query: "Search for documents on digital transformation best practices",
        category: TaskCategory::Search,
    },
    Preset {
        label: "Hotels + booking trends + email report",
        query: "Find luxury hotels, analyze the booking trend data, then email the analysis report to me",
        category: TaskCategory::MultiAgent,
    },
    Preset {
        label: "API docs + performance data + team summary",
        query: "Search the technical docs for API best practices, query system performance data, and send the combined results to the team",
        category: TaskCategory::MultiAgent,
    },
    Preset {
        label: "Taxi peak hours + nearby hotels + confirmation email",
        query: "Analyze the taxi data to find peak hours, recommend business hotels near those pickups, and send a booking confirmation email",
        category: TaskCategory::MultiAgent,
    },
    Preset {
        label: "Anomalies + security policy + management notice",
        query: "Find anomalous transactions, search the related security policy documents, draft a handling procedure and notify management",
        category: TaskCategory::Complex,
    },
];

/// Menu input, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    Custom,
    Preset(&'static Preset),
    Invalid,
}

pub fn parse_choice(input: &str) -> MenuChoice {
    match input.trim() {
        "0" => MenuChoice::Exit,
        "99" => MenuChoice::Custom,
        other => other
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| PRESETS.get(i))
            .map_or(MenuChoice::Invalid, MenuChoice::Preset),
    }
}

pub fn render_menu(participants: &[(String, String)]) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "Ensemble - multi-participant assistant");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "\nParticipants:");
    for (identity, description) in participants {
        let _ = writeln!(out, "  {identity:<28} {description}");
    }
    let _ = writeln!(out, "\nPreset queries:");
    for (i, preset) in PRESETS.iter().enumerate() {
        let _ = writeln!(out, "  {:2}. {} [{}]", i + 1, preset.label, preset.category);
    }
    let _ = writeln!(out, "\nOther options:");
    let _ = writeln!(out, "   0. Exit");
    let _ = writeln!(out, "  99. Custom query");
    let _ = write!(out, "{rule}");
    out
}
